#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use appshelf_core::cache_store::{AppCache, SqliteCacheStore, StoreError};
use appshelf_core::events::EventBus;
use appshelf_core::inventory::{InventoryError, LiveInventory};
use appshelf_core::model::{AppEntry, AppMetadata, InstalledApp};
use appshelf_core::sync_engine::SyncEngine;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCall {
    LoadAll,
    ReplaceAll(Vec<String>),
    Upsert(String),
    UpdateEnabled(String),
    Remove(String),
}

/// SQLite cache that records every call made through `AppCache`.
pub struct RecordingCache {
    pub inner: SqliteCacheStore,
    calls: Mutex<Vec<CacheCall>>,
    fail_writes: AtomicBool,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self {
            inner: SqliteCacheStore::open_memory().unwrap(),
            calls: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seeds rows without recording the write.
    pub fn seeded(entries: &[AppEntry]) -> Self {
        let cache = Self::new();
        cache.inner.replace_all(entries).unwrap();
        cache
    }

    pub fn calls(&self) -> Vec<CacheCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: CacheCall) -> Result<(), StoreError> {
        self.calls.lock().push(call);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("cache offline")));
        }
        Ok(())
    }
}

impl AppCache for RecordingCache {
    fn load_all(&self) -> Result<Vec<AppEntry>, StoreError> {
        self.calls.lock().push(CacheCall::LoadAll);
        self.inner.load_all()
    }

    fn replace_all(&self, entries: &[AppEntry]) -> Result<(), StoreError> {
        self.record(CacheCall::ReplaceAll(
            entries.iter().map(|e| e.package_id.clone()).collect(),
        ))?;
        self.inner.replace_all(entries)
    }

    fn upsert(&self, entry: &AppEntry) -> Result<(), StoreError> {
        self.record(CacheCall::Upsert(entry.package_id.clone()))?;
        self.inner.upsert(entry)
    }

    fn update_enabled(&self, entry: &AppEntry) -> Result<(), StoreError> {
        self.record(CacheCall::UpdateEnabled(entry.package_id.clone()))?;
        self.inner.update_enabled(entry)
    }

    fn remove(&self, package_id: &str) -> Result<(), StoreError> {
        self.record(CacheCall::Remove(package_id.to_string()))?;
        self.inner.remove(package_id)
    }
}

/// Live inventory whose installed set can change between passes.
#[derive(Default)]
pub struct MutableInventory {
    apps: Mutex<Vec<InstalledApp>>,
    broken_probes: Mutex<Vec<String>>,
}

impl MutableInventory {
    pub fn with_apps(apps: Vec<InstalledApp>) -> Self {
        Self {
            apps: Mutex::new(apps),
            broken_probes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_apps(&self, apps: Vec<InstalledApp>) {
        *self.apps.lock() = apps;
    }

    /// Makes `resolve` fail for `package_id` even though it is listed.
    pub fn break_probe(&self, package_id: &str) {
        self.broken_probes.lock().push(package_id.to_string());
    }
}

impl LiveInventory for MutableInventory {
    fn provider_name(&self) -> &'static str {
        "mutable"
    }

    fn list_installed(&self) -> Result<Vec<InstalledApp>, InventoryError> {
        Ok(self.apps.lock().clone())
    }

    fn resolve(&self, package_id: &str) -> Result<Option<AppMetadata>, InventoryError> {
        if self.broken_probes.lock().iter().any(|id| id == package_id) {
            return Err(InventoryError::Unavailable("probe failed".into()));
        }
        Ok(self
            .apps
            .lock()
            .iter()
            .find(|app| app.id == package_id)
            .map(AppMetadata::from))
    }
}

/// Inventory whose listing blocks until the test releases it.
pub struct BlockingInventory {
    apps: Vec<InstalledApp>,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl BlockingInventory {
    pub fn new(apps: Vec<InstalledApp>) -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        (
            Self {
                apps,
                entered: entered_tx,
                release: release_rx,
            },
            entered_rx,
            release_tx,
        )
    }
}

impl LiveInventory for BlockingInventory {
    fn provider_name(&self) -> &'static str {
        "blocking"
    }

    fn list_installed(&self) -> Result<Vec<InstalledApp>, InventoryError> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
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

pub fn engine_with(
    cache: Arc<RecordingCache>,
    inventory: Arc<dyn LiveInventory>,
    default_enable: bool,
) -> SyncEngine {
    SyncEngine::new(cache, inventory, default_enable, EventBus::new())
}

pub fn ids(entries: &[AppEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.package_id.as_str()).collect()
}

pub fn app(id: &str, label: &str) -> InstalledApp {
    InstalledApp::new(id, label, false)
}

pub fn entry(id: &str, label: &str, enabled: bool) -> AppEntry {
    AppEntry::new(id, label, Vec::new(), enabled)
}
