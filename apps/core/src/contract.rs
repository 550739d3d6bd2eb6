use serde::{Deserialize, Serialize};

use crate::model::AppEntry;
use crate::sync_engine::{SyncOutcome, SyncReport};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JumpRequest {
    pub letter: char,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum InventoryRequest {
    Sync,
    List(ListRequest),
    Sections,
    Jump(JumpRequest),
    Toggle(AppRequest),
    IgnoreAll,
    IgnoreNone,
    Find(AppRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppDto {
    pub id: String,
    pub label: String,
    pub enabled: bool,
    pub sort_key: char,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    /// A pass was already running; nothing was reconciled.
    pub busy: bool,
    pub cold_start: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub store_failures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListResponse {
    pub apps: Vec<AppDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionsResponse {
    pub letters: Vec<char>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JumpResponse {
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToggleResponse {
    pub id: String,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MassToggleResponse {
    pub enabled: bool,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload")]
pub enum InventoryResponse {
    Sync(SyncResponse),
    List(ListResponse),
    Sections(SectionsResponse),
    Jump(JumpResponse),
    Toggle(ToggleResponse),
    MassToggle(MassToggleResponse),
    Find(AppDto),
}

impl From<&AppEntry> for AppDto {
    fn from(value: &AppEntry) -> Self {
        Self {
            id: value.package_id.clone(),
            label: value.label.clone(),
            enabled: value.enabled,
            sort_key: value.sort_key.as_char(),
        }
    }
}

impl From<SyncOutcome> for SyncResponse {
    fn from(value: SyncOutcome) -> Self {
        match value {
            SyncOutcome::Completed(SyncReport {
                cold_start,
                removed,
                added,
                store_failures,
            }) => Self {
                busy: false,
                cold_start,
                added,
                removed,
                store_failures: store_failures.len(),
            },
            SyncOutcome::Busy(_) => Self {
                busy: true,
                cold_start: false,
                added: Vec::new(),
                removed: Vec::new(),
                store_failures: 0,
            },
        }
    }
}
