use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseKindError;

/// Kind of local object tracked by the synchronizer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Module,
    Course,
    Grouping,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Course => "course",
            Self::Grouping => "grouping",
        }
    }

    /// Remote collection a local object of this kind is pushed to.
    pub fn resource_type(self) -> ResourceType {
        match self {
            Self::Module | Self::Course => ResourceType::Content,
            Self::Grouping => ResourceType::Playlist,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "module" => Ok(Self::Module),
            "course" => Ok(Self::Course),
            "grouping" => Ok(Self::Grouping),
            other => Err(ParseKindError(other.to_owned())),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Content,
    Playlist,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

/// Identity of a local object: numeric id plus kind.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub local_id: i64,
    pub kind: ObjectKind,
}

impl ObjectKey {
    pub fn new(local_id: i64, kind: ObjectKind) -> Self {
        Self { local_id, kind }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.local_id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub object_id: i64,

    pub parent_id: i64,
    pub actor_id: i64,
    pub kind: ObjectKind,
    pub action: ChangeAction,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Maps a source log event name onto a kind and action.
    ///
    /// Accepts both fully qualified names (`\core\event\course_module_created`)
    /// and bare ones (`course_module_created`). Anything else yields `None`.
    pub fn classify(event_name: &str) -> Option<(ObjectKind, ChangeAction)> {
        let name = event_name.rsplit('\\').next().unwrap_or(event_name);

        let (kind, action) = if let Some(action) = name.strip_prefix("course_module_") {
            (ObjectKind::Module, action)
        } else if let Some(action) = name.strip_prefix("course_") {
            (ObjectKind::Course, action)
        } else {
            return None;
        };

        let action = match action {
            "created" => ChangeAction::Created,
            "updated" => ChangeAction::Updated,
            "deleted" => ChangeAction::Deleted,
            _ => return None,
        };

        Some((kind, action))
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.object_id, self.kind)
    }
}

/// Durable memory of one local object already pushed to the catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MappingRecord {
    pub local_id: i64,
    pub local_kind: ObjectKind,

    pub remote_id: i64,
    pub remote_global_id: String,
    pub display_name: String,
    pub content_hash: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl MappingRecord {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.local_id, self.local_kind)
    }
}

/// Full body of a content item as sent to the catalog.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentDraft {
    pub name: String,
    pub description: String,
    pub summary: String,
    pub copyright: String,
    pub author_id: String,
    pub tags: Vec<String>,
    pub url: String,
    pub logo_url: String,
    pub hover_url: String,
    pub thumbnail_url: String,
    pub trailer_url: String,
    pub settings: String,
    pub order: i64,
    pub publisher_id: String,
    pub is_disabled: bool,
    pub is_recommended: bool,
    pub is_featured: bool,
    pub featured_order: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
}

/// Full body of a playlist as sent to the catalog.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDraft {
    pub name: String,
    pub description: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub global_id: String,
    pub url: String,
    pub is_public: bool,
    pub is_default: bool,
    pub logo_url: String,
    pub trailer_url: String,
    pub is_recommended: bool,
    pub is_featured: bool,
    pub featured_order: i64,
    pub copyright: String,
    pub publisher_id: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Draft {
    Content(ContentDraft),
    Playlist(PlaylistDraft),
}

impl Draft {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Content(_) => ResourceType::Content,
            Self::Playlist(_) => ResourceType::Playlist,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Content(content) => &content.name,
            Self::Playlist(playlist) => &playlist.name,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Content(content) => &content.url,
            Self::Playlist(playlist) => &playlist.url,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Content(content) => &content.tags,
            Self::Playlist(playlist) => &playlist.tags,
        }
    }

    /// Stable fingerprint of the draft body.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();

        match serde_json::to_vec(self) {
            Ok(bytes) => {
                hasher.update(&bytes);
            }
            Err(_) => {
                hasher.update(self.name().as_bytes());
                hasher.update(self.url().as_bytes());
            }
        }

        hasher.finalize().to_string()
    }
}

/// A resource as confirmed by the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteResource {
    pub id: i64,

    pub global_id: String,
    pub body: Draft,
}

impl RemoteResource {
    pub fn name(&self) -> &str {
        self.body.name()
    }

    pub fn url(&self) -> &str {
        self.body.url()
    }
}

/// One ordered section of a playlist.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub name: String,
    pub content_ids: Vec<i64>,
}
