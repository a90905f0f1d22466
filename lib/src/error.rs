//! Error taxonomy for the synchronizer.
//!
//! Remote "not found" and ambiguous search results are outcomes, not errors:
//! see [`crate::catalog::SearchOutcome`] and [`crate::CatalogClient::get_by_id`].

use thiserror::Error;

use crate::data::{ObjectKey, ObjectKind, ResourceType};

/// Failures reported by a catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Connection-level failure: DNS, refused connection, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The catalog answered with a status code other than the expected one.
    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },

    /// The response body could not be decoded.
    #[error("could not decode catalog response: {0}")]
    Decode(String),

    /// An authenticated session could not be established.
    #[error("catalog session unavailable: {0}")]
    Session(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failures of the local mapping store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },

    #[error("invalid persisted mapping data: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reading source-side data.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed source document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a file, found a directory: {0}")]
    NotAFile(String),
}

#[derive(Debug, Error)]
#[error("unknown object kind `{0}`; expected module|course|grouping")]
pub struct ParseKindError(pub String);

/// Failure of one reconciliation step, caught at the single-event boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{operation} failed: {source}")]
    Catalog {
        operation: &'static str,
        #[source]
        source: CatalogError,
    },

    #[error("mapping store failed: {0}")]
    Store(#[from] StoreError),

    #[error("source lookup failed: {0}")]
    Source(#[from] SourceError),

    #[error("{key} cannot be pushed as {found:?}")]
    KindMismatch { key: ObjectKey, found: ResourceType },

    #[error("no source record for {kind} {id}")]
    MissingSource { kind: ObjectKind, id: i64 },
}

impl SyncError {
    pub fn catalog(operation: &'static str) -> impl FnOnce(CatalogError) -> Self {
        move |source| Self::Catalog { operation, source }
    }

    /// Short label of the failed operation, used in run reports.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Catalog { operation, .. } => operation,
            Self::Store(_) => "store",
            Self::Source(_) | Self::MissingSource { .. } => "source",
            Self::KindMismatch { .. } => "draft",
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
