//! Per-object create, update and delete against the catalog.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogClient, DeleteAck, SearchOutcome};
use crate::data::{MappingRecord, ObjectKey, RemoteResource};
use crate::draft::LocalDraft;
use crate::error::{SyncError, SyncResult};
use crate::store::MappingStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    /// A matching remote resource was found by search and taken over.
    Adopted,
    /// The merged body matched the last pushed one; no remote call was made.
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub action: ReconcileAction,

    pub record: MappingRecord,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No mapping existed, so nothing was sent to the catalog.
    NoMapping,
    Deleted,
    AlreadyAbsent,
}

enum Resolution {
    Mapped(RemoteResource),
    Adopted(RemoteResource),
    Missing,
}

pub struct Reconciler {
    store: Arc<dyn MappingStore>,

    catalog: Arc<dyn CatalogClient>,
    skip_unchanged: bool,
}

impl Reconciler {
    pub fn new(store: Arc<dyn MappingStore>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self {
            store,
            catalog,
            skip_unchanged: false,
        }
    }

    /// Skip remote updates whose merged body equals the last pushed one.
    pub fn with_skip_unchanged(mut self, skip_unchanged: bool) -> Self {
        self.skip_unchanged = skip_unchanged;
        self
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogClient> {
        &self.catalog
    }

    #[instrument(skip_all, fields(object_id = key.local_id, kind = %key.kind))]
    pub async fn reconcile(&self, key: ObjectKey, local: &LocalDraft) -> SyncResult<Reconciliation> {
        let resource = key.kind.resource_type();
        if local.resource_type() != resource {
            return Err(SyncError::KindMismatch {
                key,
                found: local.resource_type(),
            });
        }

        let mapping = self.store.find(key.local_id, key.kind)?;
        let resolution = self.resolve(key, mapping.as_ref(), local).await?;

        let (existing, adopted) = match resolution {
            Resolution::Mapped(existing) => (Some(existing), false),
            Resolution::Adopted(existing) => (Some(existing), true),
            Resolution::Missing => (None, false),
        };

        let (action, confirmed, pushed) = match existing {
            Some(existing) => {
                let draft = local
                    .update_draft(&existing.body)
                    .ok_or(SyncError::KindMismatch {
                        key,
                        found: existing.body.resource_type(),
                    })?;

                let fingerprint = draft.fingerprint();
                if let Some(record) = self.unchanged(mapping.as_ref(), &existing, &fingerprint) {
                    debug!(remote_id = existing.id, "remote resource already up to date");
                    return Ok(Reconciliation {
                        action: ReconcileAction::Unchanged,
                        record,
                    });
                }

                let updated = self
                    .catalog
                    .update(existing.id, &draft)
                    .await
                    .map_err(SyncError::catalog("update"))?;

                let confirmed = RemoteResource {
                    global_id: if updated.global_id.is_empty() {
                        existing.global_id
                    } else {
                        updated.global_id
                    },
                    ..updated
                };

                let action = if adopted {
                    ReconcileAction::Adopted
                } else {
                    ReconcileAction::Updated
                };

                (action, confirmed, fingerprint)
            }
            None => {
                let draft = local.create_draft();
                let fingerprint = draft.fingerprint();

                let created = self
                    .catalog
                    .create(&draft)
                    .await
                    .map_err(SyncError::catalog("create"))?;

                (ReconcileAction::Created, created, fingerprint)
            }
        };

        let record = MappingRecord {
            local_id: key.local_id,
            local_kind: key.kind,
            remote_id: confirmed.id,
            remote_global_id: confirmed.global_id,
            display_name: local.name().to_owned(),
            content_hash: Some(pushed),
            last_synced_at: Utc::now(),
        };
        self.store.upsert(&record)?;

        info!(
            remote_id = record.remote_id,
            outcome = ?action,
            name = %record.display_name,
            "reconciled"
        );

        Ok(Reconciliation { action, record })
    }

    async fn resolve(
        &self,
        key: ObjectKey,
        mapping: Option<&MappingRecord>,
        local: &LocalDraft,
    ) -> SyncResult<Resolution> {
        let resource = key.kind.resource_type();

        if let Some(record) = mapping {
            let found = self
                .catalog
                .get_by_id(resource, record.remote_id)
                .await
                .map_err(SyncError::catalog("get"))?;

            match found {
                Some(existing) => return Ok(Resolution::Mapped(existing)),
                None => warn!(
                    remote_id = record.remote_id,
                    "mapped remote resource is gone; resolving again"
                ),
            }
        }

        let outcome = self
            .catalog
            .search_exact(resource, local.name(), local.url())
            .await
            .map_err(SyncError::catalog("search"))?;

        match outcome {
            SearchOutcome::Match(existing) => {
                info!(remote_id = existing.id, "adopting existing remote resource");
                Ok(Resolution::Adopted(existing))
            }
            SearchOutcome::NotFound => {
                debug!("no remote resource matches name and url");
                Ok(Resolution::Missing)
            }
            SearchOutcome::Ambiguous { total } => {
                warn!(
                    candidates = total,
                    name = local.name(),
                    "search is ambiguous; not adopting any candidate"
                );
                Ok(Resolution::Missing)
            }
        }
    }

    /// The stored record, when change detection is on and nothing changed.
    fn unchanged(
        &self,
        mapping: Option<&MappingRecord>,
        existing: &RemoteResource,
        fingerprint: &str,
    ) -> Option<MappingRecord> {
        if !self.skip_unchanged {
            return None;
        }

        mapping
            .filter(|record| record.remote_id == existing.id)
            .filter(|record| record.content_hash.as_deref() == Some(fingerprint))
            .filter(|_| existing.body.fingerprint() == fingerprint)
            .cloned()
    }

    /// Removes the remote counterpart of `key`, then its mapping.
    #[instrument(skip_all, fields(object_id = key.local_id, kind = %key.kind))]
    pub async fn delete(&self, key: ObjectKey) -> SyncResult<DeleteOutcome> {
        let Some(record) = self.store.find(key.local_id, key.kind)? else {
            info!("no mapping for deleted object; nothing to remove remotely");
            return Ok(DeleteOutcome::NoMapping);
        };

        let ack = self
            .catalog
            .delete(key.kind.resource_type(), record.remote_id)
            .await
            .map_err(SyncError::catalog("delete"))?;

        self.store.remove(key.local_id, key.kind)?;

        let outcome = match ack {
            DeleteAck::Deleted => DeleteOutcome::Deleted,
            DeleteAck::AlreadyAbsent => DeleteOutcome::AlreadyAbsent,
        };
        info!(remote_id = record.remote_id, outcome = ?outcome, "deleted");

        Ok(outcome)
    }
}
