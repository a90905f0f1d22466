use serde::{Deserialize, Serialize};

use crate::data::{ContentDraft, Draft, PlaylistDraft, RemoteResource};

/// A tag as returned by the catalog: usually `{ "name": ... }`, sometimes a bare string.
#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum RawTag {
    Named { name: String },
    Plain(String),
}

impl From<RawTag> for String {
    fn from(raw: RawTag) -> Self {
        match raw {
            RawTag::Named { name } => name,
            RawTag::Plain(name) => name,
        }
    }
}

fn flatten_tags(raw: Vec<RawTag>) -> Vec<String> {
    raw.into_iter().map(Into::into).collect()
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawContent {
    pub id: Option<i64>,
    pub global_id: Option<String>,

    pub name: String,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub copyright: Option<String>,
    pub author_id: Option<String>,
    pub tags: Vec<RawTag>,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub hover_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub trailer_url: Option<String>,
    pub settings: Option<String>,
    pub order: Option<i64>,
    pub publisher_id: Option<String>,
    pub is_disabled: bool,
    pub is_recommended: bool,
    pub is_featured: bool,
    pub featured_order: Option<i64>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
}

impl From<RawContent> for ContentDraft {
    fn from(raw: RawContent) -> Self {
        Self {
            name: raw.name,
            description: raw.description.unwrap_or_default(),
            summary: raw.summary.unwrap_or_default(),
            copyright: raw.copyright.unwrap_or_default(),
            author_id: raw.author_id.unwrap_or_default(),
            tags: flatten_tags(raw.tags),
            url: raw.url.unwrap_or_default(),
            logo_url: raw.logo_url.unwrap_or_default(),
            hover_url: raw.hover_url.unwrap_or_default(),
            thumbnail_url: raw.thumbnail_url.unwrap_or_default(),
            trailer_url: raw.trailer_url.unwrap_or_default(),
            settings: raw.settings.unwrap_or_default(),
            order: raw.order.unwrap_or_default(),
            publisher_id: raw.publisher_id.unwrap_or_default(),
            is_disabled: raw.is_disabled,
            is_recommended: raw.is_recommended,
            is_featured: raw.is_featured,
            featured_order: raw.featured_order.unwrap_or_default(),
            content_type: raw.content_type.unwrap_or_default(),
            start_date: raw.start_date.unwrap_or_default(),
            start_time: raw.start_time.unwrap_or_default(),
            end_date: raw.end_date.unwrap_or_default(),
            end_time: raw.end_time.unwrap_or_default(),
        }
    }
}

impl RawContent {
    /// Converts into a confirmed resource, falling back to `known_id` when the
    /// body omits its own id.
    pub fn into_resource(mut self, known_id: Option<i64>) -> Option<RemoteResource> {
        let id = self.id.or(known_id)?;
        let global_id = self.global_id.take().unwrap_or_default();

        Some(RemoteResource {
            id,
            global_id,
            body: Draft::Content(self.into()),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPlaylist {
    pub id: Option<i64>,
    pub global_id: Option<String>,

    pub name: String,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<RawTag>,
    pub url: Option<String>,
    pub is_public: bool,
    pub is_default: bool,
    pub logo_url: Option<String>,
    pub trailer_url: Option<String>,
    pub is_recommended: bool,
    pub is_featured: bool,
    pub featured_order: Option<i64>,
    pub copyright: Option<String>,
    pub publisher_id: Option<String>,
}

impl RawPlaylist {
    pub fn into_resource(self, known_id: Option<i64>) -> Option<RemoteResource> {
        let id = self.id.or(known_id)?;
        let global_id = self.global_id.unwrap_or_default();

        let body = PlaylistDraft {
            name: self.name,
            description: self.description.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            tags: flatten_tags(self.tags),
            global_id: global_id.clone(),
            url: self.url.unwrap_or_default(),
            is_public: self.is_public,
            is_default: self.is_default,
            logo_url: self.logo_url.unwrap_or_default(),
            trailer_url: self.trailer_url.unwrap_or_default(),
            is_recommended: self.is_recommended,
            is_featured: self.is_featured,
            featured_order: self.featured_order.unwrap_or_default(),
            copyright: self.copyright.unwrap_or_default(),
            publisher_id: self.publisher_id.unwrap_or_default(),
        };

        Some(RemoteResource {
            id,
            global_id,
            body: Draft::Playlist(body),
        })
    }
}

/// Paged search response: `{ total, results }`.
#[derive(Deserialize, Debug)]
pub struct RawSearchResults<T> {
    #[serde(default)]
    pub total: i64,

    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Request body for create and update calls; `id` is only sent on update.
#[derive(Serialize, Debug)]
pub struct RawDraftRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(flatten)]
    pub draft: &'a Draft,
}
