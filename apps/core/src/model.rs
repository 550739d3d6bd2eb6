use serde::{Deserialize, Serialize};

use crate::sort_key::SortKey;

/// One tracked application as held by the registry and the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub package_id: String,
    pub label: String,
    pub icon: Vec<u8>,
    pub enabled: bool,
    pub sort_key: SortKey,
    normalized_label: String,
    normalized_package_id: String,
}

impl AppEntry {
    /// Builds an entry and derives its sort key from the label.
    pub fn new(package_id: &str, label: &str, icon: Vec<u8>, enabled: bool) -> Self {
        let sort_key = SortKey::for_label(label);
        Self::with_sort_key(package_id.to_string(), label.to_string(), icon, enabled, sort_key)
    }

    pub fn with_sort_key(
        package_id: String,
        label: String,
        icon: Vec<u8>,
        enabled: bool,
        sort_key: SortKey,
    ) -> Self {
        let normalized_label = normalize_for_filter(&label);
        let normalized_package_id = normalize_for_filter(&package_id);
        Self {
            package_id,
            label,
            icon,
            enabled,
            sort_key,
            normalized_label,
            normalized_package_id,
        }
    }

    pub fn normalized_label(&self) -> &str {
        &self.normalized_label
    }

    pub fn refresh_sort_key(&mut self) {
        self.sort_key = SortKey::for_label(&self.label);
    }

    /// Case-insensitive substring match against the label or the package id.
    pub fn matches(&self, normalized_query: &str) -> bool {
        self.normalized_label.contains(normalized_query)
            || self.normalized_package_id.contains(normalized_query)
    }
}

/// An application as reported by the live inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub icon: Vec<u8>,
    #[serde(default)]
    pub is_system: bool,
}

impl InstalledApp {
    pub fn new(id: &str, label: &str, is_system: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon: Vec::new(),
            is_system,
        }
    }

    pub fn with_icon(mut self, icon: Vec<u8>) -> Self {
        self.icon = icon;
        self
    }
}

/// Metadata for a single resolved package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMetadata {
    pub label: String,
    pub icon: Vec<u8>,
}

impl From<&InstalledApp> for AppMetadata {
    fn from(value: &InstalledApp) -> Self {
        Self {
            label: value.label.clone(),
            icon: value.icon.clone(),
        }
    }
}

pub fn normalize_for_filter(input: &str) -> String {
    input.chars().flat_map(|c| c.to_lowercase()).collect()
}
