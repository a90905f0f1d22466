use url::Url;

pub const DEFAULT_INTERVAL_MINUTES: u32 = 15;
pub const DEFAULT_COPYRIGHT: &str = "Carnegie Mellon University";
pub const DEFAULT_SOURCE_TAG: &str = "moodle";

/// Settings shared by every component of one synchronizer run.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Root of the source learning system; object URLs are built from it.
    pub site_url: Url,

    /// Lookback window of the change feed, in minutes.
    pub interval_minutes: u32,
    /// Course that always syncs as a grouping, regardless of its own settings.
    pub grouping_course: Option<i64>,
    pub copyright: String,
    /// Tag attached to every resource created by this system.
    pub source_tag: String,
    /// Skip the remote update when the merged draft matches the last pushed one.
    pub skip_unchanged: bool,
}

impl SyncConfig {
    pub fn new(site_url: Url) -> Self {
        Self {
            site_url,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            grouping_course: None,
            copyright: DEFAULT_COPYRIGHT.to_owned(),
            source_tag: DEFAULT_SOURCE_TAG.to_owned(),
            skip_unchanged: false,
        }
    }

    /// Site root without a trailing slash.
    pub fn site_root(&self) -> &str {
        self.site_url.as_str().trim_end_matches('/')
    }

    pub fn lookback(&self) -> chrono::Duration {
        let minutes = match self.interval_minutes {
            0 => DEFAULT_INTERVAL_MINUTES,
            minutes => minutes,
        };

        chrono::Duration::minutes(i64::from(minutes))
    }
}
