//! Source-side collaborators: the change feed and local metadata lookups.
//!
//! [`SourceSnapshot`] is a JSON export of the source learning system that
//! implements both traits; the synchronizer itself only sees the traits.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::ChangeEvent;
use crate::error::SourceError;
use crate::helpers::read_data;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceCourse {
    pub id: i64,

    pub fullname: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceModule {
    pub id: i64,

    pub course_id: i64,
    /// Module type, e.g. `page`, `quiz`, `url`.
    pub module_name: String,
    /// Name of the module instance as shown to learners.
    pub name: String,
    #[serde(default)]
    pub intro: String,
    /// Target of `url` modules.
    #[serde(default)]
    pub external_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceSection {
    pub course_id: i64,

    /// Position of the section in its course; 0 is the general section.
    pub section: u32,
    #[serde(default)]
    pub name: Option<String>,
    /// Module ids in display order.
    #[serde(default)]
    pub sequence: Vec<i64>,
}

/// Per-course routing flags.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSyncSettings {
    #[serde(default)]
    pub sync_as_grouping: bool,
    #[serde(default)]
    pub sync_as_content: bool,
}

/// Supplies the change notifications of one lookback window.
pub trait ChangeFeed: Send + Sync {
    /// Events at or after `threshold`, oldest first.
    fn changes_since(&self, threshold: DateTime<Utc>) -> Result<Vec<ChangeEvent>, SourceError>;
}

/// Read access to the source learning system.
pub trait SourceCatalog: Send + Sync {
    fn course(&self, course_id: i64) -> Option<SourceCourse>;

    fn module(&self, module_id: i64) -> Option<SourceModule>;

    fn course_modules(&self, course_id: i64) -> Vec<SourceModule>;

    /// Sections of a course in section order.
    fn course_sections(&self, course_id: i64) -> Vec<SourceSection>;

    /// Institutional id number of a user, used as the catalog author id.
    fn author_id_number(&self, user_id: i64) -> Option<String>;

    fn course_settings(&self, course_id: i64) -> CourseSyncSettings;
}

/// One row of the source event log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawLogRow {
    pub object_id: i64,

    pub course_id: i64,
    pub user_id: i64,
    pub event_name: String,
    /// Unix seconds.
    pub time_created: i64,
}

impl RawLogRow {
    pub fn into_event(self) -> Option<ChangeEvent> {
        let (kind, action) = ChangeEvent::classify(&self.event_name)?;
        let timestamp = Utc.timestamp_opt(self.time_created, 0).single()?;

        Some(ChangeEvent {
            object_id: self.object_id,
            parent_id: self.course_id,
            actor_id: self.user_id,
            kind,
            action,
            timestamp,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceUser {
    pub id: i64,

    #[serde(default)]
    pub idnumber: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawCourseSettings {
    pub course_id: i64,

    #[serde(flatten)]
    pub settings: CourseSyncSettings,
}

/// JSON export of the source system.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceSnapshot {
    pub log: Vec<RawLogRow>,

    pub courses: Vec<SourceCourse>,
    pub modules: Vec<SourceModule>,
    pub sections: Vec<SourceSection>,
    pub users: Vec<SourceUser>,
    pub course_settings: Vec<RawCourseSettings>,

    #[serde(skip)]
    settings_index: HashMap<i64, CourseSyncSettings>,
}

impl SourceSnapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let raw = read_data(path.as_ref())?;
        let snapshot = Self::from_slice(&raw)?;

        debug!(
            path = %path.as_ref().display(),
            log_rows = snapshot.log.len(),
            courses = snapshot.courses.len(),
            modules = snapshot.modules.len(),
            "source snapshot loaded"
        );

        Ok(snapshot)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, SourceError> {
        let mut snapshot: Self = serde_json::from_slice(raw)?;
        snapshot.index();

        Ok(snapshot)
    }

    fn index(&mut self) {
        self.settings_index = self
            .course_settings
            .iter()
            .map(|entry| (entry.course_id, entry.settings))
            .collect();
    }
}

impl ChangeFeed for SourceSnapshot {
    fn changes_since(&self, threshold: DateTime<Utc>) -> Result<Vec<ChangeEvent>, SourceError> {
        let mut events = self
            .log
            .iter()
            .cloned()
            .filter_map(RawLogRow::into_event)
            .filter(|event| event.timestamp >= threshold)
            .collect::<Vec<_>>();

        events.sort_by_key(|event| event.timestamp);

        Ok(events)
    }
}

impl SourceCatalog for SourceSnapshot {
    fn course(&self, course_id: i64) -> Option<SourceCourse> {
        self.courses
            .iter()
            .find(|course| course.id == course_id)
            .cloned()
    }

    fn module(&self, module_id: i64) -> Option<SourceModule> {
        self.modules
            .iter()
            .find(|module| module.id == module_id)
            .cloned()
    }

    fn course_modules(&self, course_id: i64) -> Vec<SourceModule> {
        self.modules
            .iter()
            .filter(|module| module.course_id == course_id)
            .cloned()
            .collect()
    }

    fn course_sections(&self, course_id: i64) -> Vec<SourceSection> {
        let mut sections = self
            .sections
            .iter()
            .filter(|section| section.course_id == course_id)
            .cloned()
            .collect::<Vec<_>>();

        sections.sort_by_key(|section| section.section);

        sections
    }

    fn author_id_number(&self, user_id: i64) -> Option<String> {
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.idnumber.trim().to_owned())
            .filter(|idnumber| !idnumber.is_empty())
    }

    fn course_settings(&self, course_id: i64) -> CourseSyncSettings {
        self.settings_index
            .get(&course_id)
            .copied()
            .unwrap_or_default()
    }
}
