//! Demo Catalog store.
//!
//! Holds the in-memory demo list fetched from the backend and applies
//! add/update/delete/feature/view mutations after each round trip.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::services::backend_gateway::BackendGateway;
use crate::services::object_storage::ObjectStorage;
use crate::types::demo::{Demo, DemoUpdate, NewDemo};
use crate::types::errors::CatalogError;
use crate::types::mutation::MutationState;

/// Trait defining demo catalog operations.
pub trait DemoCatalogTrait {
    /// Replaces the local list with the backend's. Prior state survives a failed load.
    fn load(&mut self) -> Result<usize, CatalogError>;
    fn demos(&self) -> &[Demo];
    fn get(&self, id: &str) -> Option<&Demo>;
    fn add_demo(&mut self, demo: &NewDemo) -> Result<Demo, CatalogError>;
    fn update_demo(&mut self, id: &str, update: &DemoUpdate) -> Result<Demo, CatalogError>;
    fn delete_demo(&mut self, id: &str) -> Result<(), CatalogError>;
    fn toggle_featured(&mut self, id: &str) -> Result<bool, CatalogError>;
    /// Optimistically bumps the local counter, then confirms with the backend's value.
    fn increment_views(&mut self, id: &str) -> Result<i64, CatalogError>;
    fn attach_screenshot(&mut self, id: &str, key: &str, bytes: &[u8]) -> Result<Demo, CatalogError>;
    fn search(&self, query: &str) -> Vec<&Demo>;
    fn filter_by_tag(&self, tag: &str) -> Vec<&Demo>;
    fn all_tags(&self) -> Vec<String>;
    fn mutation_state(&self, key: &str) -> Option<&MutationState>;
}

pub struct DemoCatalog {
    gateway: Arc<dyn BackendGateway>,
    demos: Vec<Demo>,
    mutations: HashMap<String, MutationState>,
}

impl DemoCatalog {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self {
            gateway,
            demos: Vec::new(),
            mutations: HashMap::new(),
        }
    }

    /// Mutation key used for page-view increments of a demo.
    pub fn views_key(id: &str) -> String {
        format!("views:{}", id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.demos.iter().position(|d| d.id == id)
    }

    /// Replaces the local copy of a demo, or puts it first when not loaded yet.
    fn upsert(&mut self, demo: Demo) {
        match self.position(&demo.id) {
            Some(idx) => self.demos[idx] = demo,
            None => self.demos.insert(0, demo),
        }
    }

    fn validate(title: &str, owner: &str) -> Result<(), CatalogError> {
        if title.trim().is_empty() {
            return Err(CatalogError::Validation("title is required".to_string()));
        }
        if owner.trim().is_empty() {
            return Err(CatalogError::Validation("owner is required".to_string()));
        }
        Ok(())
    }
}

impl DemoCatalogTrait for DemoCatalog {
    fn load(&mut self) -> Result<usize, CatalogError> {
        let demos = self.gateway.list_demos()?;
        debug!(count = demos.len(), "demo catalog loaded");
        self.demos = demos;
        Ok(self.demos.len())
    }

    fn demos(&self) -> &[Demo] {
        &self.demos
    }

    fn get(&self, id: &str) -> Option<&Demo> {
        self.demos.iter().find(|d| d.id == id)
    }

    fn add_demo(&mut self, demo: &NewDemo) -> Result<Demo, CatalogError> {
        Self::validate(&demo.title, &demo.owner)?;
        let created = self.gateway.insert_demo(demo)?;
        self.demos.insert(0, created.clone());
        Ok(created)
    }

    fn update_demo(&mut self, id: &str, update: &DemoUpdate) -> Result<Demo, CatalogError> {
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(CatalogError::Validation("title is required".to_string()));
            }
        }
        if let Some(owner) = &update.owner {
            if owner.trim().is_empty() {
                return Err(CatalogError::Validation("owner is required".to_string()));
            }
        }
        let updated = self.gateway.update_demo(id, update)?;
        self.upsert(updated.clone());
        Ok(updated)
    }

    fn delete_demo(&mut self, id: &str) -> Result<(), CatalogError> {
        let screenshot = match self.get(id) {
            Some(demo) => demo.links.screenshot_url.clone(),
            None => self.gateway.get_demo(id)?.links.screenshot_url,
        };

        self.gateway.delete_demo(id)?;
        self.demos.retain(|d| d.id != id);
        self.mutations.remove(&Self::views_key(id));

        if let Some(key) = screenshot.as_deref().and_then(ObjectStorage::key_from_url) {
            if let Err(e) = self.gateway.delete_screenshot(key) {
                warn!(demo_id = %id, error = %e, "failed to delete screenshot of removed demo");
            }
        }
        Ok(())
    }

    fn toggle_featured(&mut self, id: &str) -> Result<bool, CatalogError> {
        let current = self
            .get(id)
            .map(|d| d.is_featured)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let update = DemoUpdate {
            is_featured: Some(!current),
            ..DemoUpdate::default()
        };
        let updated = self.update_demo(id, &update)?;
        Ok(updated.is_featured)
    }

    fn increment_views(&mut self, id: &str) -> Result<i64, CatalogError> {
        let key = Self::views_key(id);
        let previous = self.position(id).map(|idx| {
            let demo = &mut self.demos[idx];
            demo.page_views += 1;
            demo.page_views - 1
        });
        self.mutations.insert(key.clone(), MutationState::Pending);

        match self.gateway.increment_page_views(id) {
            Ok(count) => {
                if let Some(idx) = self.position(id) {
                    self.demos[idx].page_views = count;
                }
                self.mutations.insert(key, MutationState::Confirmed);
                Ok(count)
            }
            Err(e) => {
                if let (Some(idx), Some(prev)) = (self.position(id), previous) {
                    self.demos[idx].page_views = prev;
                }
                warn!(demo_id = %id, error = %e, "view increment reverted");
                self.mutations.insert(key, MutationState::Failed(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn attach_screenshot(&mut self, id: &str, key: &str, bytes: &[u8]) -> Result<Demo, CatalogError> {
        let url = self.gateway.upload_screenshot(key, bytes)?;
        let update = DemoUpdate {
            screenshot_url: Some(Some(url)),
            ..DemoUpdate::default()
        };
        match self.update_demo(id, &update) {
            Ok(demo) => Ok(demo),
            Err(e) => {
                if let Err(cleanup) = self.gateway.delete_screenshot(key) {
                    warn!(key = %key, error = %cleanup, "orphaned screenshot left in storage");
                }
                Err(e)
            }
        }
    }

    fn search(&self, query: &str) -> Vec<&Demo> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.demos.iter().collect();
        }
        self.demos
            .iter()
            .filter(|d| {
                d.title.to_lowercase().contains(&needle)
                    || d.description.to_lowercase().contains(&needle)
                    || d.owner.to_lowercase().contains(&needle)
                    || d.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    }

    fn filter_by_tag(&self, tag: &str) -> Vec<&Demo> {
        self.demos
            .iter()
            .filter(|d| d.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    fn all_tags(&self) -> Vec<String> {
        self.demos
            .iter()
            .flat_map(|d| d.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn mutation_state(&self, key: &str) -> Option<&MutationState> {
        self.mutations.get(key)
    }
}
