use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::demo::{double_option, Demo};

/// Folder id of the synthetic bucket that holds favorites without a folder.
pub const UNORGANIZED_FOLDER_ID: &str = "unorganized";

/// Color assigned to folders created without one.
pub const DEFAULT_FOLDER_COLOR: &str = "#6366f1";

/// Longest accepted folder name, in characters.
pub const MAX_FOLDER_NAME_LEN: usize = 64;

/// A per-user bookmark of a demo, optionally filed into a folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteLink {
    pub user_id: String,
    pub demo_id: String,
    pub folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A favorite link joined with its demo record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteEntry {
    pub link: FavoriteLink,
    pub demo: Demo,
}

/// A named grouping of favorites, personal or global.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteFolder {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_global: bool,
    pub created_by: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewFolder {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Partial update of a folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FolderUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
}

/// A folder populated with the demos filed into it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderView {
    pub folder: FavoriteFolder,
    pub demos: Vec<Demo>,
}

impl FolderView {
    pub fn contains(&self, demo_id: &str) -> bool {
        self.demos.iter().any(|d| d.id == demo_id)
    }

    pub fn is_unorganized(&self) -> bool {
        self.folder.id == UNORGANIZED_FOLDER_ID
    }
}

/// Maps the `unorganized` sentinel to "no folder".
pub fn normalize_folder_id(folder_id: Option<&str>) -> Option<&str> {
    folder_id.filter(|id| *id != UNORGANIZED_FOLDER_ID)
}
