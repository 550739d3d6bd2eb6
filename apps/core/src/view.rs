use crate::events::{EventBus, InventoryEvent};
use crate::model::{normalize_for_filter, AppEntry};
use crate::sort_key::SortKey;
use crate::sync_engine::{SyncEngine, SyncError};

/// Result of flipping one entry, for the caller to report to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Ignored { label: String },
    Allowed { label: String },
}

/// Position-addressable view over a registry snapshot, optionally filtered.
pub struct FilterableView {
    base: Vec<AppEntry>,
    active: Vec<AppEntry>,
    query: String,
    events: EventBus,
}

impl FilterableView {
    pub fn new(events: EventBus) -> Self {
        Self {
            base: Vec::new(),
            active: Vec::new(),
            query: String::new(),
            events,
        }
    }

    /// Replaces the base view and shows all of it.
    pub fn set_source(&mut self, entries: Vec<AppEntry>) {
        self.base = entries;
        self.active = self.base.clone();
        self.query.clear();
        self.events.publish(InventoryEvent::ViewChanged);
    }

    pub fn apply_filter(&mut self, query: &str) {
        self.query = query.to_string();
        let normalized = normalize_for_filter(query);
        self.active = if normalized.is_empty() {
            self.base.clone()
        } else {
            self.base
                .iter()
                .filter(|entry| entry.matches(&normalized))
                .cloned()
                .collect()
        };

        if self.active.is_empty() {
            self.events.publish(InventoryEvent::ViewInvalidated);
        } else {
            self.events.publish(InventoryEvent::ViewChanged);
        }
    }

    /// First position in the active view whose section key is `letter`.
    pub fn position_for_section(&self, letter: char) -> Option<usize> {
        let key = SortKey::from_char(letter)?;
        self.active.iter().position(|entry| entry.sort_key == key)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn entries(&self) -> &[AppEntry] {
        &self.active
    }

    pub fn get(&self, position: usize) -> Option<&AppEntry> {
        self.active.get(position)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Section letters present in the active view, in display order.
    pub fn section_letters(&self) -> Vec<char> {
        let mut keys: Vec<SortKey> = self.active.iter().map(|entry| entry.sort_key).collect();
        keys.sort();
        keys.dedup();
        keys.into_iter().map(SortKey::as_char).collect()
    }

    /// Flips the enabled flag of `package_id` and persists the single flag.
    pub fn toggle_enabled(
        &mut self,
        engine: &SyncEngine,
        package_id: &str,
    ) -> Result<Option<ToggleOutcome>, SyncError> {
        let Some(current) = self
            .base
            .iter()
            .find(|entry| entry.package_id == package_id)
        else {
            return Ok(None);
        };
        let Some(updated) = engine.set_enabled(package_id, !current.enabled)? else {
            return Ok(None);
        };

        for entry in self
            .base
            .iter_mut()
            .chain(self.active.iter_mut())
            .filter(|entry| entry.package_id == package_id)
        {
            entry.enabled = updated.enabled;
        }
        self.events.publish(InventoryEvent::ViewChanged);

        let label = updated.label;
        Ok(Some(if updated.enabled {
            ToggleOutcome::Allowed { label }
        } else {
            ToggleOutcome::Ignored { label }
        }))
    }

    pub fn ignore_all(&mut self, engine: &SyncEngine) -> Result<usize, SyncError> {
        self.set_all_enabled(engine, false)
    }

    pub fn ignore_none(&mut self, engine: &SyncEngine) -> Result<usize, SyncError> {
        self.set_all_enabled(engine, true)
    }

    fn set_all_enabled(&mut self, engine: &SyncEngine, enabled: bool) -> Result<usize, SyncError> {
        let count = engine.set_all_enabled(enabled)?;
        for entry in self.base.iter_mut().chain(self.active.iter_mut()) {
            entry.enabled = enabled;
        }
        self.events.publish(InventoryEvent::ViewChanged);
        Ok(count)
    }
}
