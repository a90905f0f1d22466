//! Local drafts: what the source system knows about an object, and how that
//! becomes a full catalog body on create or on update.
//!
//! On update, fields the source system owns (name, description, url,
//! visibility) come from local data; everything operators manage in the
//! catalog is carried over from the existing resource.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::data::{ContentDraft, Draft, PlaylistDraft, ResourceType};
use crate::source::{SourceCourse, SourceModule};

pub const DEFAULT_ORDER: i64 = 0;
pub const DEFAULT_FEATURED_ORDER: i64 = 0;
pub const DEFAULT_DISABLED: bool = false;
pub const DEFAULT_RECOMMENDED: bool = false;
pub const DEFAULT_FEATURED: bool = false;
pub const DEFAULT_PLAYLIST_IS_DEFAULT: bool = false;
pub const COURSE_CONTENT_TYPE: &str = "Course";

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static VIDEO_POSTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"video poster="(.*)" controls"#).expect("poster pattern"));
static VIDEO_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"src=.*</video").expect("video source pattern"));
static HTTP_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"http[^"]*"#).expect("link pattern"));
static VIDEO_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r".*video>").expect("video pattern"));

/// Local view of a content item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalContent {
    pub name: String,
    pub description: String,
    pub url: String,
    pub author_id: Option<String>,
    pub content_type: String,
    pub tags: Vec<String>,
    pub copyright: String,
    /// Image chosen in the source system; replaces the remote one on update.
    pub logo_url: Option<String>,
    /// Image used on create when the source system has none.
    pub default_logo_url: String,
    pub trailer_url: Option<String>,
}

impl LocalContent {
    pub fn create_draft(&self) -> ContentDraft {
        let logo_url = self
            .logo_url
            .clone()
            .unwrap_or_else(|| self.default_logo_url.clone());

        ContentDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            summary: String::new(),
            copyright: self.copyright.clone(),
            author_id: self.author_id.clone().unwrap_or_default(),
            tags: self.tags.clone(),
            url: self.url.clone(),
            logo_url: logo_url.clone(),
            hover_url: logo_url.clone(),
            thumbnail_url: logo_url,
            trailer_url: self.trailer_url.clone().unwrap_or_default(),
            settings: String::new(),
            order: DEFAULT_ORDER,
            publisher_id: String::new(),
            is_disabled: DEFAULT_DISABLED,
            is_recommended: DEFAULT_RECOMMENDED,
            is_featured: DEFAULT_FEATURED,
            featured_order: DEFAULT_FEATURED_ORDER,
            content_type: self.content_type.clone(),
            start_date: String::new(),
            start_time: String::new(),
            end_date: String::new(),
            end_time: String::new(),
        }
    }

    pub fn update_draft(&self, existing: &ContentDraft) -> ContentDraft {
        let (logo_url, hover_url, thumbnail_url) = match &self.logo_url {
            Some(logo) => (logo.clone(), logo.clone(), logo.clone()),
            None => (
                existing.logo_url.clone(),
                existing.hover_url.clone(),
                existing.thumbnail_url.clone(),
            ),
        };

        let author_id = if existing.author_id.is_empty() {
            self.author_id.clone().unwrap_or_default()
        } else {
            existing.author_id.clone()
        };

        ContentDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            author_id,
            logo_url,
            hover_url,
            thumbnail_url,
            trailer_url: self
                .trailer_url
                .clone()
                .unwrap_or_else(|| existing.trailer_url.clone()),
            ..existing.clone()
        }
    }
}

/// Local view of a playlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPlaylist {
    pub name: String,
    pub description: String,
    pub url: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub copyright: String,
    pub logo_url: Option<String>,
    pub default_logo_url: String,
    pub trailer_url: Option<String>,
}

impl LocalPlaylist {
    pub fn create_draft(&self) -> PlaylistDraft {
        PlaylistDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            summary: String::new(),
            tags: self.tags.clone(),
            global_id: Uuid::new_v4().to_string(),
            url: self.url.clone(),
            is_public: self.is_public,
            is_default: DEFAULT_PLAYLIST_IS_DEFAULT,
            logo_url: self
                .logo_url
                .clone()
                .unwrap_or_else(|| self.default_logo_url.clone()),
            trailer_url: self.trailer_url.clone().unwrap_or_default(),
            is_recommended: DEFAULT_RECOMMENDED,
            is_featured: DEFAULT_FEATURED,
            featured_order: DEFAULT_FEATURED_ORDER,
            copyright: self.copyright.clone(),
            publisher_id: String::new(),
        }
    }

    pub fn update_draft(&self, existing: &PlaylistDraft) -> PlaylistDraft {
        PlaylistDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            is_public: self.is_public,
            logo_url: self
                .logo_url
                .clone()
                .unwrap_or_else(|| existing.logo_url.clone()),
            trailer_url: self
                .trailer_url
                .clone()
                .unwrap_or_else(|| existing.trailer_url.clone()),
            ..existing.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalDraft {
    Content(LocalContent),
    Playlist(LocalPlaylist),
}

impl LocalDraft {
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

    pub fn create_draft(&self) -> Draft {
        match self {
            Self::Content(content) => Draft::Content(content.create_draft()),
            Self::Playlist(playlist) => Draft::Playlist(playlist.create_draft()),
        }
    }

    /// Merges local data onto an existing body; `None` when the kinds differ.
    pub fn update_draft(&self, existing: &Draft) -> Option<Draft> {
        match (self, existing) {
            (Self::Content(local), Draft::Content(existing)) => {
                Some(Draft::Content(local.update_draft(existing)))
            }
            (Self::Playlist(local), Draft::Playlist(existing)) => {
                Some(Draft::Playlist(local.update_draft(existing)))
            }
            _ => None,
        }
    }
}

/// Media and text pulled out of a course summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CourseMedia {
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    pub description: String,
}

impl CourseMedia {
    /// Reads an embedded `<video poster=... src=...>` block, if any.
    pub fn extract(summary: &str) -> Self {
        let mut media = Self::default();

        if let Some(found) = VIDEO_POSTER.find(summary) {
            media.poster_url = first_link(found.as_str());

            let without_video = VIDEO_BLOCK.replace_all(summary, "");
            media.description = strip_tags(&without_video);
        }

        if let Some(found) = VIDEO_SOURCE.find(summary) {
            media.trailer_url = first_link(found.as_str());
        }

        if media.description.is_empty() {
            media.description = strip_tags(summary);
        }

        media
    }
}

fn first_link(fragment: &str) -> Option<String> {
    HTTP_LINK
        .find(fragment)
        .map(|link| link.as_str().to_owned())
        .filter(|link| !link.is_empty())
}

/// Removes markup and non-breaking space entities.
pub fn strip_tags(html: &str) -> String {
    HTML_TAG
        .replace_all(html, "")
        .replace("&nbsp;", " ")
        .trim()
        .to_owned()
}

/// Catalog content type for a source module type.
pub fn module_type_name(module_name: &str) -> String {
    match module_name {
        "url" | "page" | "feedback" | "forum" | "chat" | "hvp" | "assign" => "Webpage",
        "quiz" => "Quiz",
        "vpl" => "Lab",
        "game" => "Game",
        other => other,
    }
    .to_owned()
}

/// Builds local drafts from source records.
#[derive(Clone, Copy, Debug)]
pub struct DraftBuilder<'a> {
    config: &'a SyncConfig,
}

impl<'a> DraftBuilder<'a> {
    pub fn new(config: &'a SyncConfig) -> Self {
        Self { config }
    }

    pub fn module_url(&self, module: &SourceModule) -> String {
        match (module.module_name.as_str(), &module.external_url) {
            ("url", Some(external)) if !external.trim().is_empty() => external.trim().to_owned(),
            _ => format!(
                "{}/mod/{}/view.php?id={}",
                self.config.site_root(),
                module.module_name,
                module.id
            ),
        }
    }

    pub fn course_url(&self, course_id: i64) -> String {
        format!("{}/course/view.php?id={course_id}", self.config.site_root())
    }

    fn site_logo_url(&self) -> String {
        format!("{}/pix/moodlelogo.svg", self.config.site_root())
    }

    pub fn module(&self, module: &SourceModule, author_id: Option<String>) -> LocalContent {
        let type_name = module_type_name(&module.module_name);

        LocalContent {
            name: module.name.clone(),
            description: strip_tags(&module.intro),
            url: self.module_url(module),
            author_id,
            tags: vec![self.config.source_tag.clone(), type_name.clone()],
            content_type: type_name,
            copyright: self.config.copyright.clone(),
            logo_url: None,
            default_logo_url: format!(
                "{}/mod/{}/pix/icon.svg",
                self.config.site_root(),
                module.module_name
            ),
            trailer_url: None,
        }
    }

    pub fn course_content(&self, course: &SourceCourse, author_id: Option<String>) -> LocalContent {
        let media = CourseMedia::extract(&course.summary);

        LocalContent {
            name: course.fullname.clone(),
            description: media.description,
            url: self.course_url(course.id),
            author_id,
            content_type: COURSE_CONTENT_TYPE.to_owned(),
            tags: vec![self.config.source_tag.clone()],
            copyright: self.config.copyright.clone(),
            logo_url: media.poster_url,
            default_logo_url: self.site_logo_url(),
            trailer_url: media.trailer_url,
        }
    }

    pub fn course_playlist(&self, course: &SourceCourse) -> LocalPlaylist {
        let media = CourseMedia::extract(&course.summary);

        LocalPlaylist {
            name: course.fullname.clone(),
            description: media.description,
            url: self.course_url(course.id),
            is_public: course.visible,
            tags: vec![self.config.source_tag.clone()],
            copyright: self.config.copyright.clone(),
            logo_url: media.poster_url,
            default_logo_url: self.site_logo_url(),
            trailer_url: media.trailer_url,
        }
    }
}
