use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Publication state of a demo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DemoStatus {
    #[default]
    Published,
    Draft,
}

impl DemoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoStatus::Published => "published",
            DemoStatus::Draft => "draft",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, DemoStatus::Published)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "published" => Some(DemoStatus::Published),
            "draft" => Some(DemoStatus::Draft),
            _ => None,
        }
    }
}

/// Optional outbound links attached to a demo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DemoLinks {
    pub app_url: Option<String>,
    pub design_url: Option<String>,
    pub docs_url: Option<String>,
    pub resource_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub video_url: Option<String>,
}

/// A catalog entry representing a showcased application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Demo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub owner: String,
    /// Monotonic counter, only ever raised through the backend increment.
    pub page_views: i64,
    pub is_featured: bool,
    pub status: DemoStatus,
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub links: DemoLinks,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a demo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewDemo {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub status: DemoStatus,
    #[serde(flatten, default)]
    pub links: DemoLinks,
}

/// Partial update of a demo. `None` leaves the field untouched.
///
/// Link fields use a nested option: `Some(None)` clears the link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DemoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub owner: Option<String>,
    pub is_featured: Option<bool>,
    pub status: Option<DemoStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub app_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub design_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub docs_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub resource_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub screenshot_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_url: Option<Option<String>>,
}

impl DemoUpdate {
    /// Applies this update to a demo in place.
    pub fn apply_to(&self, demo: &mut Demo) {
        if let Some(title) = &self.title {
            demo.title = title.clone();
        }
        if let Some(description) = &self.description {
            demo.description = description.clone();
        }
        if let Some(tags) = &self.tags {
            demo.tags = tags.clone();
        }
        if let Some(owner) = &self.owner {
            demo.owner = owner.clone();
        }
        if let Some(featured) = self.is_featured {
            demo.is_featured = featured;
        }
        if let Some(status) = self.status {
            demo.status = status;
        }
        let links = &mut demo.links;
        if let Some(v) = &self.app_url {
            links.app_url = v.clone();
        }
        if let Some(v) = &self.design_url {
            links.design_url = v.clone();
        }
        if let Some(v) = &self.docs_url {
            links.docs_url = v.clone();
        }
        if let Some(v) = &self.resource_url {
            links.resource_url = v.clone();
        }
        if let Some(v) = &self.screenshot_url {
            links.screenshot_url = v.clone();
        }
        if let Some(v) = &self.video_url {
            links.video_url = v.clone();
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
pub(crate) fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Normalizes a tag list: trims, drops blanks and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let t = tag.trim();
        if !t.is_empty() && !out.iter().any(|existing| existing == t) {
            out.push(t.to_string());
        }
    }
    out
}
