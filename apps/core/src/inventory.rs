use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::model::{AppMetadata, InstalledApp};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid inventory file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Unavailable(String),
}

/// Read-only view of what is installed on the host.
pub trait LiveInventory: Send + Sync {
    fn provider_name(&self) -> &'static str;
    /// Every installed application, system apps included. No ordering guarantee.
    fn list_installed(&self) -> Result<Vec<InstalledApp>, InventoryError>;
    /// Metadata for one package, `None` when it is not installed.
    fn resolve(&self, package_id: &str) -> Result<Option<AppMetadata>, InventoryError>;
}

pub struct StaticInventory {
    apps: Vec<InstalledApp>,
}

impl StaticInventory {
    pub fn from_apps(apps: Vec<InstalledApp>) -> Self {
        Self { apps }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, InventoryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let apps = serde_json::from_str(&raw).map_err(|source| InventoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { apps })
    }

    pub fn deterministic_fixture() -> Self {
        Self {
            apps: vec![
                InstalledApp::new("org.mozilla.firefox", "Firefox", false),
                InstalledApp::new("com.tencent.mm", "微信", false),
                InstalledApp::new("net.osmand.plus", "Étude Maps", false),
                InstalledApp::new("com.android.systemui", "System UI", true),
            ],
        }
    }
}

impl LiveInventory for StaticInventory {
    fn provider_name(&self) -> &'static str {
        "static"
    }

    fn list_installed(&self) -> Result<Vec<InstalledApp>, InventoryError> {
        Ok(self.apps.clone())
    }

    fn resolve(&self, package_id: &str) -> Result<Option<AppMetadata>, InventoryError> {
        Ok(self
            .apps
            .iter()
            .find(|app| app.id == package_id)
            .map(AppMetadata::from))
    }
}

/// Installed applications taken from freedesktop `.desktop` entries.
///
/// Entry paths are indexed by desktop id. The directories are walked again only
/// when `list_installed` runs or a lookup misses the index.
pub struct DesktopEntryInventory {
    dirs: Vec<PathBuf>,
    index: Mutex<Option<HashMap<String, PathBuf>>>,
}

impl DesktopEntryInventory {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            index: Mutex::new(None),
        }
    }

    fn entry_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.dirs
            .iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| {
                WalkDir::new(dir)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path())
                    .filter(|path| path.extension().is_some_and(|ext| ext == "desktop"))
            })
    }

    /// Id -> path of every entry; the first directory listing an id wins.
    fn scan(&self) -> HashMap<String, PathBuf> {
        let mut paths = HashMap::new();
        for path in self.entry_paths() {
            if let Some(id) = desktop_id(&path) {
                paths.entry(id).or_insert(path);
            }
        }
        debug!(count = paths.len(), "indexed desktop entries");
        paths
    }

    fn indexed_path(&self, package_id: &str) -> Option<PathBuf> {
        let mut index = self.index.lock();
        let cached = index
            .as_ref()
            .and_then(|paths| paths.get(package_id))
            .filter(|path| path.is_file())
            .cloned();
        if cached.is_some() {
            return cached;
        }
        let paths = self.scan();
        let found = paths.get(package_id).cloned();
        *index = Some(paths);
        found
    }
}

impl LiveInventory for DesktopEntryInventory {
    fn provider_name(&self) -> &'static str {
        "desktop-entry"
    }

    fn list_installed(&self) -> Result<Vec<InstalledApp>, InventoryError> {
        let paths = self.scan();
        let mut apps = Vec::with_capacity(paths.len());
        for (id, path) in &paths {
            match read_desktop_entry(path, id) {
                Ok(Some(app)) => apps.push(app),
                Ok(None) => {}
                Err(error) => debug!(%error, "skipping unreadable desktop entry"),
            }
        }
        *self.index.lock() = Some(paths);
        Ok(apps)
    }

    fn resolve(&self, package_id: &str) -> Result<Option<AppMetadata>, InventoryError> {
        let Some(path) = self.indexed_path(package_id) else {
            return Ok(None);
        };
        Ok(read_desktop_entry(&path, package_id)?.map(|app| AppMetadata::from(&app)))
    }
}

fn desktop_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

fn read_desktop_entry(path: &Path, id: &str) -> Result<Option<InstalledApp>, InventoryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fields = parse_desktop_entry(&raw);
    let Some(label) = fields.get("Name").filter(|name| !name.trim().is_empty()) else {
        return Ok(None);
    };

    let hidden = is_true(fields.get("NoDisplay")) || is_true(fields.get("Hidden"));
    let icon = fields
        .get("Icon")
        .map(PathBuf::from)
        .filter(|icon_path| icon_path.is_absolute())
        .and_then(|icon_path| std::fs::read(icon_path).ok())
        .unwrap_or_default();

    Ok(Some(
        InstalledApp::new(id, label.trim(), hidden).with_icon(icon),
    ))
}

fn is_true(value: Option<&String>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Keys of the `[Desktop Entry]` group. Localized keys (`Name[de]`) are ignored.
fn parse_desktop_entry(raw: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut in_main_group = false;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.contains('[') {
                fields
                    .entry(key.to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }
    fields
}
