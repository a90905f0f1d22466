//! Keeps a remote course catalog in step with a polled learning-system
//! change feed.
//!
//! Change events are routed by [`Synchronizer`] to the [`Reconciler`], which
//! resolves each local object to its remote counterpart through the
//! [`MappingStore`] (or an exact name and url search) and creates, updates or
//! deletes it through a [`CatalogClient`]. Courses synchronized as groupings
//! are then ordered by the [`GroupingOrganizer`].

pub mod catalog;
pub mod config;
pub mod data;
pub mod draft;
pub mod error;
pub mod helpers;
pub mod organizer;
pub mod raw_data;
pub mod reconciler;
pub mod source;
pub mod store;
pub mod sync;

pub use catalog::{CatalogClient, DeleteAck, HttpCatalogClient, SearchOutcome};
pub use config::SyncConfig;
pub use data::{
    ChangeAction, ChangeEvent, Draft, MappingRecord, ObjectKey, ObjectKind, RemoteResource,
    ResourceType, Section,
};
pub use draft::{DraftBuilder, LocalContent, LocalDraft, LocalPlaylist};
pub use error::{CatalogError, SourceError, StoreError, SyncError, SyncResult};
pub use organizer::{GroupingOrganizer, OrganizeOutcome};
pub use reconciler::{DeleteOutcome, ReconcileAction, Reconciler, Reconciliation};
pub use source::{ChangeFeed, SourceCatalog, SourceSnapshot};
pub use store::{MappingStore, SqliteMappingStore};
pub use sync::{SyncFailure, SyncReport, Synchronizer};
