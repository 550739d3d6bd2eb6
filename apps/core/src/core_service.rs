use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::cache_store::{AppCache, SqliteCacheStore, StoreError};
use crate::config::{self, validate, Config, ConfigError};
use crate::contract::{
    AppDto, InventoryRequest, InventoryResponse, JumpResponse, ListResponse, MassToggleResponse,
    SectionsResponse, SyncResponse, ToggleResponse,
};
use crate::events::{EventBus, InventoryEvent};
use crate::inventory::{DesktopEntryInventory, LiveInventory};
use crate::model::AppEntry;
use crate::sync_engine::{SyncEngine, SyncError, SyncOutcome, SyncRequest};
use crate::view::{FilterableView, ToggleOutcome};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("app not found: {0}")]
    ItemNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Wires the cache, the live inventory, the sync engine and the view together.
pub struct InventoryService {
    config: Mutex<Config>,
    engine: Arc<SyncEngine>,
    view: Mutex<FilterableView>,
    events: EventBus,
}

impl InventoryService {
    pub fn new(config: Config, inventory: Arc<dyn LiveInventory>) -> Result<Self, ServiceError> {
        validate(&config)?;
        let cache = SqliteCacheStore::open_from_config(&config)?;
        Self::with_cache(config, Arc::new(cache), inventory)
    }

    pub fn with_cache(
        config: Config,
        cache: Arc<dyn AppCache>,
        inventory: Arc<dyn LiveInventory>,
    ) -> Result<Self, ServiceError> {
        validate(&config)?;
        let events = EventBus::new();
        let engine = SyncEngine::new(cache, inventory, config.default_enable, events.clone());
        Ok(Self {
            config: Mutex::new(config),
            engine: Arc::new(engine),
            view: Mutex::new(FilterableView::new(events.clone())),
            events,
        })
    }

    /// Service backed by the host's desktop entries.
    pub fn with_desktop_inventory(config: Config) -> Result<Self, ServiceError> {
        let inventory = DesktopEntryInventory::new(config.application_dirs.clone());
        Self::new(config, Arc::new(inventory))
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn subscribe(&self) -> Receiver<InventoryEvent> {
        self.events.subscribe()
    }

    pub fn default_enable(&self) -> bool {
        self.engine.default_enable()
    }

    /// Runs a pass on the calling thread and refreshes the view.
    pub fn sync(&self) -> Result<SyncOutcome, ServiceError> {
        let outcome = self.engine.sync_now()?;
        match &outcome {
            SyncOutcome::Completed(_) => self.refresh_view(),
            SyncOutcome::Busy(snapshot) => self.show(snapshot.clone()),
        }
        Ok(outcome)
    }

    /// Starts a background pass. The view is refreshed right away from the
    /// current registry; callers refresh again on `UpdateCompleted`.
    pub fn request_sync(&self) -> Result<SyncRequest, ServiceError> {
        let request = self.engine.request_sync()?;
        match &request {
            SyncRequest::Started(_) => self.refresh_view(),
            SyncRequest::AlreadyRunning(snapshot) => self.show(snapshot.clone()),
        }
        Ok(request)
    }

    pub fn refresh_view(&self) {
        self.show(self.engine.snapshot());
    }

    fn show(&self, entries: Vec<AppEntry>) {
        let mut view = self.view.lock();
        let query = view.query().to_string();
        view.set_source(entries);
        if !query.is_empty() {
            view.apply_filter(&query);
        }
    }

    pub fn list(&self, query: &str) -> Vec<AppEntry> {
        let mut view = self.view.lock();
        view.apply_filter(query);
        view.entries().to_vec()
    }

    pub fn sections(&self) -> Vec<char> {
        self.engine.section_index().letters()
    }

    pub fn position_for_section(&self, letter: char) -> Option<usize> {
        self.view.lock().position_for_section(letter)
    }

    pub fn toggle(&self, package_id: &str) -> Result<ToggleOutcome, ServiceError> {
        self.view
            .lock()
            .toggle_enabled(&self.engine, package_id)?
            .ok_or_else(|| ServiceError::ItemNotFound(package_id.to_string()))
    }

    pub fn ignore_all(&self) -> Result<usize, ServiceError> {
        self.set_all_enabled(false)
    }

    pub fn ignore_none(&self) -> Result<usize, ServiceError> {
        self.set_all_enabled(true)
    }

    fn set_all_enabled(&self, enabled: bool) -> Result<usize, ServiceError> {
        let updated = {
            let mut view = self.view.lock();
            if enabled {
                view.ignore_none(&self.engine)?
            } else {
                view.ignore_all(&self.engine)?
            }
        };
        {
            let mut config = self.config.lock();
            config.default_enable = enabled;
            config::save(&config)?;
        }
        info!(enabled, updated, "applied enabled flag to all apps");
        Ok(updated)
    }

    /// Looks up or registers `package_id`; a newly registered app joins the view
    /// under the current filter.
    pub fn find_or_create(&self, package_id: &str) -> Result<AppEntry, ServiceError> {
        let entry = self
            .engine
            .find_or_create(package_id)?
            .ok_or_else(|| ServiceError::ItemNotFound(package_id.to_string()))?;
        self.refresh_view();
        Ok(entry)
    }

    pub fn handle_command(
        &self,
        request: InventoryRequest,
    ) -> Result<InventoryResponse, ServiceError> {
        match request {
            InventoryRequest::Sync => Ok(InventoryResponse::Sync(SyncResponse::from(self.sync()?))),
            InventoryRequest::List(request) => {
                let apps = self.list(&request.query).iter().map(AppDto::from).collect();
                Ok(InventoryResponse::List(ListResponse { apps }))
            }
            InventoryRequest::Sections => Ok(InventoryResponse::Sections(SectionsResponse {
                letters: self.sections(),
            })),
            InventoryRequest::Jump(request) => Ok(InventoryResponse::Jump(JumpResponse {
                position: self.position_for_section(request.letter),
            })),
            InventoryRequest::Toggle(request) => {
                let id = require_id(&request.id)?;
                let (label, enabled) = match self.toggle(id)? {
                    ToggleOutcome::Allowed { label } => (label, true),
                    ToggleOutcome::Ignored { label } => (label, false),
                };
                Ok(InventoryResponse::Toggle(ToggleResponse {
                    id: id.to_string(),
                    label,
                    enabled,
                }))
            }
            InventoryRequest::IgnoreAll => Ok(InventoryResponse::MassToggle(MassToggleResponse {
                enabled: false,
                updated: self.ignore_all()?,
            })),
            InventoryRequest::IgnoreNone => Ok(InventoryResponse::MassToggle(MassToggleResponse {
                enabled: true,
                updated: self.ignore_none()?,
            })),
            InventoryRequest::Find(request) => {
                let id = require_id(&request.id)?;
                let entry = self.find_or_create(id)?;
                Ok(InventoryResponse::Find(AppDto::from(&entry)))
            }
        }
    }
}

fn require_id(raw: &str) -> Result<&str, ServiceError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ServiceError::InvalidRequest("app id is required".into()));
    }
    Ok(id)
}
