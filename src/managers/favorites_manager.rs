//! Favorites Aggregator.
//!
//! Keeps the raw rows fetched from the backend (own favorites, personal
//! folders, global folders and every user's global-folder favorites) and
//! derives the folder views from them after every change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::services::backend_gateway::BackendGateway;
use crate::types::demo::Demo;
use crate::types::errors::FavoritesError;
use crate::types::favorite::{
    normalize_folder_id, FavoriteEntry, FavoriteFolder, FavoriteLink, FolderUpdate, FolderView,
    NewFolder, MAX_FOLDER_NAME_LEN, UNORGANIZED_FOLDER_ID,
};
use crate::types::mutation::MutationState;

const UNORGANIZED_NAME: &str = "Unorganized";
const UNORGANIZED_COLOR: &str = "#9ca3af";

/// Trait defining favorites and folder operations for one user.
pub trait FavoritesManagerTrait {
    fn load_favorites_and_folders(&mut self, user_id: &str) -> Result<(), FavoritesError>;
    fn create_folder(&mut self, folder: &NewFolder) -> Result<FavoriteFolder, FavoritesError>;
    fn create_global_folder(&mut self, folder: &NewFolder) -> Result<FavoriteFolder, FavoritesError>;
    fn update_folder(&mut self, folder_id: &str, update: &FolderUpdate) -> Result<FavoriteFolder, FavoritesError>;
    fn delete_folder(&mut self, folder_id: &str) -> Result<(), FavoritesError>;
    fn reorder_folders(&mut self, ordered_ids: &[String]) -> Result<(), FavoritesError>;
    fn move_to_folder(&mut self, demo_id: &str, folder_id: Option<&str>) -> Result<(), FavoritesError>;
    /// Returns `true` when the demo is favorited after the call.
    fn toggle_favorite(&mut self, demo_id: &str) -> Result<bool, FavoritesError>;
    fn is_favorited(&self, demo_id: &str) -> bool;
    fn favorites(&self) -> &[Demo];
    fn folders(&self) -> &[FolderView];
    fn global_folders(&self) -> &[FolderView];
    fn mutation_state(&self, key: &str) -> Option<&MutationState>;
}

pub struct FavoritesManager {
    gateway: Arc<dyn BackendGateway>,
    user_id: String,
    entries: Vec<FavoriteEntry>,
    personal: Vec<FavoriteFolder>,
    global: Vec<FavoriteFolder>,
    global_entries: Vec<FavoriteEntry>,
    favorites: Vec<Demo>,
    folders: Vec<FolderView>,
    global_folders: Vec<FolderView>,
    mutations: HashMap<String, MutationState>,
}

fn validate_name(name: &str) -> Result<(), FavoritesError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FavoritesError::Validation("folder name is required".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(FavoritesError::Validation(format!(
            "folder name exceeds {} characters",
            MAX_FOLDER_NAME_LEN
        )));
    }
    Ok(())
}

impl FavoritesManager {
    pub fn new(gateway: Arc<dyn BackendGateway>, user_id: &str) -> Self {
        let mut manager = Self {
            gateway,
            user_id: user_id.to_string(),
            entries: Vec::new(),
            personal: Vec::new(),
            global: Vec::new(),
            global_entries: Vec::new(),
            favorites: Vec::new(),
            folders: Vec::new(),
            global_folders: Vec::new(),
            mutations: HashMap::new(),
        };
        manager.rebuild();
        manager
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Mutation key used for favorite toggles of a demo.
    pub fn favorite_key(demo_id: &str) -> String {
        format!("favorite:{}", demo_id)
    }

    /// Personal folder, global folder, or the unorganized bucket by id.
    pub fn folder(&self, folder_id: &str) -> Option<&FolderView> {
        self.folders
            .iter()
            .chain(self.global_folders.iter())
            .find(|f| f.folder.id == folder_id)
    }

    fn unorganized_folder(&self) -> FavoriteFolder {
        FavoriteFolder {
            id: UNORGANIZED_FOLDER_ID.to_string(),
            name: UNORGANIZED_NAME.to_string(),
            description: Some("Favorites not filed into a folder".to_string()),
            color: UNORGANIZED_COLOR.to_string(),
            is_global: false,
            created_by: self.user_id.clone(),
            sort_order: i32::MAX,
            created_at: DateTime::<Utc>::default(),
        }
    }

    fn is_known_folder(&self, folder_id: &str) -> bool {
        self.personal.iter().any(|f| f.id == folder_id) || self.global.iter().any(|f| f.id == folder_id)
    }

    fn is_global_folder(&self, folder_id: &str) -> bool {
        self.global.iter().any(|f| f.id == folder_id)
    }

    fn is_own_entry(&self, entry: &FavoriteEntry, demo_id: &str) -> bool {
        entry.link.user_id == self.user_id && entry.link.demo_id == demo_id
    }

    /// Recomputes the flat list and every folder view from the raw rows.
    fn rebuild(&mut self) {
        self.favorites = self.entries.iter().map(|e| e.demo.clone()).collect();

        let personal_ids: HashSet<&str> = self.personal.iter().map(|f| f.id.as_str()).collect();
        let global_ids: HashSet<&str> = self.global.iter().map(|f| f.id.as_str()).collect();

        let mut by_folder: HashMap<&str, Vec<Demo>> = HashMap::new();
        let mut unorganized = Vec::new();
        for entry in &self.entries {
            match entry.link.folder_id.as_deref() {
                Some(fid) if personal_ids.contains(fid) => {
                    by_folder.entry(fid).or_default().push(entry.demo.clone())
                }
                // Shown through the global aggregation instead.
                Some(fid) if global_ids.contains(fid) => {}
                _ => unorganized.push(entry.demo.clone()),
            }
        }

        let mut folders: Vec<FolderView> = self
            .personal
            .iter()
            .map(|f| FolderView {
                folder: f.clone(),
                demos: by_folder.remove(f.id.as_str()).unwrap_or_default(),
            })
            .collect();
        folders.push(FolderView {
            folder: self.unorganized_folder(),
            demos: unorganized,
        });

        let mut pooled: HashMap<&str, Vec<Demo>> = HashMap::new();
        for entry in &self.global_entries {
            if let Some(fid) = entry.link.folder_id.as_deref() {
                let demos = pooled.entry(fid).or_default();
                // Several users may file the same demo into one global folder.
                if !demos.iter().any(|d| d.id == entry.demo.id) {
                    demos.push(entry.demo.clone());
                }
            }
        }
        let global_folders = self
            .global
            .iter()
            .map(|f| FolderView {
                folder: f.clone(),
                demos: pooled.remove(f.id.as_str()).unwrap_or_default(),
            })
            .collect();

        self.folders = folders;
        self.global_folders = global_folders;
    }

    fn insert_folder(&mut self, folder: &NewFolder, is_global: bool) -> Result<FavoriteFolder, FavoritesError> {
        validate_name(&folder.name)?;
        let created = self.gateway.insert_folder(folder, is_global)?;
        if is_global {
            self.global.push(created.clone());
        } else {
            self.personal.push(created.clone());
        }
        self.rebuild();
        Ok(created)
    }
}

impl FavoritesManagerTrait for FavoritesManager {
    fn load_favorites_and_folders(&mut self, user_id: &str) -> Result<(), FavoritesError> {
        // Everything is fetched before any state is replaced.
        let entries = self.gateway.list_user_favorites(user_id)?;
        let personal = self.gateway.list_personal_folders(user_id)?;
        let global = self.gateway.list_global_folders()?;
        let global_entries = self.gateway.list_global_folder_favorites()?;

        self.user_id = user_id.to_string();
        self.entries = entries;
        self.personal = personal;
        self.global = global;
        self.global_entries = global_entries;
        self.rebuild();

        debug!(
            user_id = %user_id,
            favorites = self.entries.len(),
            folders = self.personal.len(),
            global_folders = self.global.len(),
            "favorites loaded"
        );
        Ok(())
    }

    fn create_folder(&mut self, folder: &NewFolder) -> Result<FavoriteFolder, FavoritesError> {
        self.insert_folder(folder, false)
    }

    fn create_global_folder(&mut self, folder: &NewFolder) -> Result<FavoriteFolder, FavoritesError> {
        self.insert_folder(folder, true)
    }

    fn update_folder(&mut self, folder_id: &str, update: &FolderUpdate) -> Result<FavoriteFolder, FavoritesError> {
        if folder_id == UNORGANIZED_FOLDER_ID {
            return Err(FavoritesError::Validation("the unorganized folder cannot be edited".to_string()));
        }
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if !self.is_known_folder(folder_id) {
            return Err(FavoritesError::FolderNotFound(folder_id.to_string()));
        }

        let updated = self.gateway.update_folder(folder_id, update)?;
        for folder in self.personal.iter_mut().chain(self.global.iter_mut()) {
            if folder.id == folder_id {
                *folder = updated.clone();
            }
        }
        self.rebuild();
        Ok(updated)
    }

    fn delete_folder(&mut self, folder_id: &str) -> Result<(), FavoritesError> {
        if folder_id == UNORGANIZED_FOLDER_ID {
            return Err(FavoritesError::Validation("the unorganized folder cannot be deleted".to_string()));
        }
        if !self.is_known_folder(folder_id) {
            return Err(FavoritesError::FolderNotFound(folder_id.to_string()));
        }

        self.gateway.delete_folder(folder_id)?;

        for entry in &mut self.entries {
            if entry.link.folder_id.as_deref() == Some(folder_id) {
                entry.link.folder_id = None;
            }
        }
        self.global_entries
            .retain(|e| e.link.folder_id.as_deref() != Some(folder_id));
        self.personal.retain(|f| f.id != folder_id);
        self.global.retain(|f| f.id != folder_id);
        self.rebuild();
        Ok(())
    }

    fn reorder_folders(&mut self, ordered_ids: &[String]) -> Result<(), FavoritesError> {
        if let Some(unknown) = ordered_ids
            .iter()
            .find(|id| !self.personal.iter().any(|f| &f.id == *id))
        {
            return Err(FavoritesError::FolderNotFound(unknown.clone()));
        }

        self.gateway.reorder_folders(ordered_ids)?;

        for folder in &mut self.personal {
            if let Some(pos) = ordered_ids.iter().position(|id| *id == folder.id) {
                folder.sort_order = pos as i32;
            }
        }
        self.personal.sort_by_key(|f| f.sort_order);
        self.rebuild();
        Ok(())
    }

    fn move_to_folder(&mut self, demo_id: &str, folder_id: Option<&str>) -> Result<(), FavoritesError> {
        let target = normalize_folder_id(folder_id).map(str::to_string);
        let idx = self
            .entries
            .iter()
            .position(|e| e.link.demo_id == demo_id)
            .ok_or_else(|| FavoritesError::NotFavorited(demo_id.to_string()))?;

        if self.entries[idx].link.folder_id == target {
            return Ok(());
        }
        if let Some(fid) = target.as_deref() {
            if !self.is_known_folder(fid) {
                return Err(FavoritesError::FolderNotFound(fid.to_string()));
            }
        }

        self.gateway
            .set_favorite_folder(&self.user_id, demo_id, target.as_deref())?;

        self.entries[idx].link.folder_id = target.clone();
        let user_id = self.user_id.clone();
        self.global_entries
            .retain(|e| !(e.link.user_id == user_id && e.link.demo_id == demo_id));
        if target.as_deref().is_some_and(|fid| self.is_global_folder(fid)) {
            self.global_entries.push(self.entries[idx].clone());
        }
        self.rebuild();
        Ok(())
    }

    fn toggle_favorite(&mut self, demo_id: &str) -> Result<bool, FavoritesError> {
        let key = Self::favorite_key(demo_id);

        if let Some(pos) = self.entries.iter().position(|e| e.link.demo_id == demo_id) {
            let removed = self.entries.remove(pos);
            let global_snapshot = self.global_entries.clone();
            let user_id = self.user_id.clone();
            self.global_entries
                .retain(|e| !(e.link.user_id == user_id && e.link.demo_id == demo_id));
            self.rebuild();
            self.mutations.insert(key.clone(), MutationState::Pending);

            return match self.gateway.remove_favorite(&self.user_id, demo_id) {
                Ok(()) => {
                    self.mutations.insert(key, MutationState::Confirmed);
                    Ok(false)
                }
                Err(e) => {
                    self.entries.insert(pos, removed);
                    self.global_entries = global_snapshot;
                    self.rebuild();
                    warn!(demo_id = %demo_id, error = %e, "unfavorite reverted");
                    self.mutations.insert(key, MutationState::Failed(e.to_string()));
                    Err(e.into())
                }
            };
        }

        let demo = self.gateway.get_demo(demo_id)?;
        self.entries.insert(
            0,
            FavoriteEntry {
                link: FavoriteLink {
                    user_id: self.user_id.clone(),
                    demo_id: demo_id.to_string(),
                    folder_id: None,
                    created_at: Utc::now(),
                },
                demo,
            },
        );
        self.rebuild();
        self.mutations.insert(key.clone(), MutationState::Pending);

        match self.gateway.add_favorite(&self.user_id, demo_id) {
            Ok(link) => {
                if let Some(entry) = self.entries.iter_mut().find(|e| e.link.demo_id == demo_id) {
                    entry.link = link;
                }
                self.mutations.insert(key, MutationState::Confirmed);
                Ok(true)
            }
            Err(e) => {
                let user_id = self.user_id.clone();
                self.entries
                    .retain(|entry| !(entry.link.user_id == user_id && entry.link.demo_id == demo_id));
                self.rebuild();
                warn!(demo_id = %demo_id, error = %e, "favorite reverted");
                self.mutations.insert(key, MutationState::Failed(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn is_favorited(&self, demo_id: &str) -> bool {
        self.entries.iter().any(|e| self.is_own_entry(e, demo_id))
    }

    fn favorites(&self) -> &[Demo] {
        &self.favorites
    }

    fn folders(&self) -> &[FolderView] {
        &self.folders
    }

    fn global_folders(&self) -> &[FolderView] {
        &self.global_folders
    }

    fn mutation_state(&self, key: &str) -> Option<&MutationState> {
        self.mutations.get(key)
    }
}
