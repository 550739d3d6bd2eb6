//! Reconciles the cached app registry against the live inventory.
//!
//! At most one pass runs at a time. The registry lock is held only while the
//! registry is read or mutated; live-inventory probes run outside of it, so
//! readers may observe a partially reconciled registry while a pass is running.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache_store::{AppCache, StoreError};
use crate::events::{EventBus, InventoryEvent};
use crate::icon;
use crate::inventory::{InventoryError, LiveInventory};
use crate::model::AppEntry;
use crate::sort_key::{insertion_point, sort_entries, SectionIndex};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("live inventory unavailable: {0}")]
    Inventory(#[from] InventoryError),
    #[error("failed to spawn sync worker: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// A cache write that failed during a pass. The registry keeps the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub package_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub cold_start: bool,
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub store_failures: Vec<StoreFailure>,
}

#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was running; carries the registry as it stood.
    Busy(Vec<AppEntry>),
}

pub enum SyncRequest {
    Started(JoinHandle<Result<SyncReport, SyncError>>),
    AlreadyRunning(Vec<AppEntry>),
}

#[derive(Default)]
struct Registry {
    entries: Vec<AppEntry>,
    sections: SectionIndex,
    loaded: bool,
}

impl Registry {
    fn position(&self, package_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.package_id == package_id)
    }
}

pub struct SyncEngine {
    cache: Arc<dyn AppCache>,
    inventory: Arc<dyn LiveInventory>,
    registry: Mutex<Registry>,
    syncing: AtomicBool,
    default_enable: AtomicBool,
    events: EventBus,
}

/// Returns the engine to `Idle` when a pass ends, including by panic.
struct PassGuard<'a> {
    syncing: &'a AtomicBool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.syncing.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    pub fn new(
        cache: Arc<dyn AppCache>,
        inventory: Arc<dyn LiveInventory>,
        default_enable: bool,
        events: EventBus,
    ) -> Self {
        Self {
            cache,
            inventory,
            registry: Mutex::new(Registry::default()),
            syncing: AtomicBool::new(false),
            default_enable: AtomicBool::new(default_enable),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::Acquire) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    pub fn default_enable(&self) -> bool {
        self.default_enable.load(Ordering::Relaxed)
    }

    pub fn set_default_enable(&self, enable: bool) {
        self.default_enable.store(enable, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Vec<AppEntry> {
        self.registry.lock().entries.clone()
    }

    pub fn section_index(&self) -> SectionIndex {
        self.registry.lock().sections.clone()
    }

    pub fn get(&self, package_id: &str) -> Option<AppEntry> {
        let registry = self.registry.lock();
        registry
            .position(package_id)
            .map(|idx| registry.entries[idx].clone())
    }

    /// Runs a pass on a background thread unless one is already running.
    pub fn request_sync(self: &Arc<Self>) -> Result<SyncRequest, SyncError> {
        if !self.try_claim() {
            debug!("sync already running; serving current registry");
            return Ok(SyncRequest::AlreadyRunning(self.snapshot()));
        }

        let engine = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("inventory-sync".into())
            .spawn(move || {
                let guard = PassGuard {
                    syncing: &engine.syncing,
                };
                engine.run_pass(guard)
            });
        match spawned {
            Ok(handle) => Ok(SyncRequest::Started(handle)),
            Err(error) => {
                self.syncing.store(false, Ordering::Release);
                Err(SyncError::Spawn(error))
            }
        }
    }

    /// Runs a pass on the calling thread unless one is already running.
    pub fn sync_now(&self) -> Result<SyncOutcome, SyncError> {
        if !self.try_claim() {
            debug!("sync already running; serving current registry");
            return Ok(SyncOutcome::Busy(self.snapshot()));
        }
        let guard = PassGuard {
            syncing: &self.syncing,
        };
        self.run_pass(guard).map(SyncOutcome::Completed)
    }

    /// `Idle -> Syncing`, only if currently idle.
    fn try_claim(&self) -> bool {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Observers of `UpdateCompleted` see the engine `Idle` and may start the
    /// next pass right away.
    fn run_pass(&self, guard: PassGuard<'_>) -> Result<SyncReport, SyncError> {
        let result = self.reconcile();
        drop(guard);
        self.events.publish(InventoryEvent::UpdateCompleted);
        match &result {
            Ok(report) => info!(
                cold_start = report.cold_start,
                added = report.added.len(),
                removed = report.removed.len(),
                store_failures = report.store_failures.len(),
                "sync pass completed"
            ),
            Err(error) => warn!(%error, "sync pass failed"),
        }
        result
    }

    fn reconcile(&self) -> Result<SyncReport, SyncError> {
        let cold_start = {
            let mut registry = self.registry.lock();
            self.ensure_loaded(&mut registry)?;
            registry.entries.is_empty()
        };
        self.events.publish(InventoryEvent::ListUpdated);

        let mut report = SyncReport {
            cold_start,
            ..SyncReport::default()
        };

        self.prune_uninstalled(cold_start, &mut report);
        self.add_discovered(cold_start, &mut report)?;

        {
            let mut registry = self.registry.lock();
            for entry in registry.entries.iter_mut() {
                entry.refresh_sort_key();
            }
            sort_entries(&mut registry.entries);
            registry.sections = SectionIndex::build(&registry.entries);
            if cold_start {
                if let Err(error) = self.cache.replace_all(&registry.entries) {
                    record_failure(&mut report, None, error);
                }
            }
        }
        self.events.publish(InventoryEvent::ListUpdated);

        Ok(report)
    }

    fn ensure_loaded(&self, registry: &mut Registry) -> Result<(), SyncError> {
        if registry.loaded {
            return Ok(());
        }
        let mut entries = self.cache.load_all()?;
        // Package ids are unique in the registry.
        let mut seen = HashSet::new();
        entries.retain(|entry| seen.insert(entry.package_id.clone()));
        sort_entries(&mut entries);
        registry.sections = SectionIndex::build(&entries);
        registry.entries = entries;
        registry.loaded = true;
        debug!(count = registry.entries.len(), "registry loaded from cache");
        Ok(())
    }

    fn prune_uninstalled(&self, cold_start: bool, report: &mut SyncReport) {
        let cached_ids: Vec<String> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|entry| entry.package_id.clone())
            .collect();

        for package_id in cached_ids {
            match self.inventory.resolve(&package_id) {
                Ok(Some(_)) => continue,
                Ok(None) => debug!(%package_id, "app no longer installed"),
                Err(error) => debug!(%package_id, %error, "probe failed; treating app as uninstalled"),
            }

            {
                let mut registry = self.registry.lock();
                let Some(idx) = registry.position(&package_id) else {
                    continue;
                };
                registry.entries.remove(idx);
            }
            if !cold_start {
                if let Err(error) = self.cache.remove(&package_id) {
                    record_failure(report, Some(&package_id), error);
                }
            }
            report.removed.push(package_id);
            self.events.publish(InventoryEvent::ListUpdated);
        }
    }

    fn add_discovered(&self, cold_start: bool, report: &mut SyncReport) -> Result<(), SyncError> {
        let installed = self.inventory.list_installed()?;
        let default_enable = self.default_enable();

        for app in installed.into_iter().filter(|app| !app.is_system) {
            let entry = {
                let mut registry = self.registry.lock();
                if registry.position(&app.id).is_some() {
                    continue;
                }
                let entry = AppEntry::new(
                    &app.id,
                    &app.label,
                    icon::normalize(&app.icon),
                    default_enable,
                );
                registry.entries.push(entry.clone());
                entry
            };
            self.events.publish(InventoryEvent::ListUpdated);

            if !cold_start {
                if let Err(error) = self.cache.upsert(&entry) {
                    record_failure(report, Some(&entry.package_id), error);
                }
            }
            report.added.push(entry.package_id);
        }
        Ok(())
    }

    /// Returns the registry entry for `package_id`, creating and persisting it
    /// from the live inventory when it is missing. `None` when not installed.
    pub fn find_or_create(&self, package_id: &str) -> Result<Option<AppEntry>, SyncError> {
        {
            let mut registry = self.registry.lock();
            self.ensure_loaded(&mut registry)?;
            if let Some(idx) = registry.position(package_id) {
                return Ok(Some(registry.entries[idx].clone()));
            }
        }

        let Some(metadata) = self.inventory.resolve(package_id)? else {
            return Ok(None);
        };

        let entry = {
            let mut registry = self.registry.lock();
            // A pass may have added it while the lock was released.
            if let Some(idx) = registry.position(package_id) {
                return Ok(Some(registry.entries[idx].clone()));
            }
            let entry = AppEntry::new(
                package_id,
                &metadata.label,
                icon::normalize(&metadata.icon),
                self.default_enable(),
            );
            let at = insertion_point(&registry.entries, &entry);
            registry.entries.insert(at, entry.clone());
            registry.sections.insert(entry.sort_key);
            self.cache.upsert(&entry)?;
            entry
        };
        debug!(%package_id, "registered app on demand");
        Ok(Some(entry))
    }

    /// Sets one entry's enabled flag and persists only that flag.
    pub fn set_enabled(&self, package_id: &str, enabled: bool) -> Result<Option<AppEntry>, SyncError> {
        let mut registry = self.registry.lock();
        let Some(idx) = registry.position(package_id) else {
            return Ok(None);
        };
        registry.entries[idx].enabled = enabled;
        let entry = registry.entries[idx].clone();
        self.cache.update_enabled(&entry)?;
        Ok(Some(entry))
    }

    /// Sets every entry's enabled flag and the default for new apps, then
    /// rewrites the cache in bulk.
    pub fn set_all_enabled(&self, enabled: bool) -> Result<usize, SyncError> {
        let mut registry = self.registry.lock();
        for entry in registry.entries.iter_mut() {
            entry.enabled = enabled;
        }
        self.cache.replace_all(&registry.entries)?;
        self.set_default_enable(enabled);
        Ok(registry.entries.len())
    }
}

fn record_failure(report: &mut SyncReport, package_id: Option<&str>, error: StoreError) {
    warn!(package_id = package_id.unwrap_or("*"), %error, "cache write failed during sync");
    report.store_failures.push(StoreFailure {
        package_id: package_id.map(str::to_string),
        message: error.to_string(),
    });
}
