//! Batch driver: routes the change events of one lookback window to the
//! reconciler and the grouping organizer.
//!
//! Events run strictly one after another. Course events go first so that a
//! course switched to grouping mode is known before its module events are
//! routed; grouping passes run last, after every module event of the batch.
//! A failure is recorded against its event and the batch moves on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::CatalogClient;
use crate::config::SyncConfig;
use crate::data::{ChangeAction, ChangeEvent, ObjectKey, ObjectKind};
use crate::draft::{DraftBuilder, LocalDraft};
use crate::error::{SyncError, SyncResult};
use crate::organizer::GroupingOrganizer;
use crate::reconciler::{DeleteOutcome, ReconcileAction, Reconciler};
use crate::source::{ChangeFeed, SourceCatalog, SourceCourse, SourceModule};
use crate::store::MappingStore;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub object_id: i64,

    pub kind: ObjectKind,
    pub operation: String,
    pub message: String,
}

/// Outcome counters of one batch.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub events: usize,

    pub created: usize,
    pub updated: usize,
    pub adopted: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub already_absent: usize,
    pub skipped: usize,
    pub organized: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_reconcile(&mut self, action: ReconcileAction) {
        match action {
            ReconcileAction::Created => self.created += 1,
            ReconcileAction::Updated => self.updated += 1,
            ReconcileAction::Adopted => self.adopted += 1,
            ReconcileAction::Unchanged => self.unchanged += 1,
        }
    }

    fn record_delete(&mut self, outcome: DeleteOutcome) {
        match outcome {
            DeleteOutcome::NoMapping => self.skipped += 1,
            DeleteOutcome::Deleted => self.deleted += 1,
            DeleteOutcome::AlreadyAbsent => self.already_absent += 1,
        }
    }

    /// Books a failed step; missing source records count as skipped.
    fn record_error(&mut self, key: ObjectKey, err: SyncError) {
        if let SyncError::MissingSource { kind, id } = err {
            warn!(object_id = id, kind = %kind, "source record is gone; skipping");
            self.skipped += 1;
            return;
        }

        error!(
            object_id = key.local_id,
            kind = %key.kind,
            operation = err.operation(),
            error = %err,
            "sync step failed"
        );

        self.failures.push(SyncFailure {
            object_id: key.local_id,
            kind: key.kind,
            operation: err.operation().to_owned(),
            message: err.to_string(),
        });
    }
}

/// Course waiting for a grouping pass, with the actor of the first event
/// that scheduled it.
#[derive(Clone, Copy, Debug)]
struct PendingGrouping {
    course_id: i64,
    actor_id: i64,
}

pub struct Synchronizer {
    config: SyncConfig,

    source: Arc<dyn SourceCatalog>,
    reconciler: Arc<Reconciler>,
    organizer: GroupingOrganizer,
}

impl Synchronizer {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SourceCatalog>,
        store: Arc<dyn MappingStore>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Self {
        let reconciler =
            Arc::new(Reconciler::new(store, catalog).with_skip_unchanged(config.skip_unchanged));
        let organizer = GroupingOrganizer::new(reconciler.clone());

        Self {
            config,
            source,
            reconciler,
            organizer,
        }
    }

    /// Pulls the events of the lookback window ending at `now` and processes
    /// them.
    pub async fn run(&self, feed: &dyn ChangeFeed, now: DateTime<Utc>) -> SyncResult<SyncReport> {
        let threshold = now - self.config.lookback();
        let events = feed.changes_since(threshold)?;

        info!(%threshold, events = events.len(), "change feed polled");

        Ok(self.run_batch(&events).await)
    }

    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn run_batch(&self, events: &[ChangeEvent]) -> SyncReport {
        let mut report = SyncReport {
            events: events.len(),
            ..SyncReport::default()
        };
        let mut pending = Vec::new();

        let (courses, rest): (Vec<&ChangeEvent>, Vec<&ChangeEvent>) = events
            .iter()
            .partition(|event| event.kind == ObjectKind::Course);

        for event in courses {
            if let Err(err) = self.course_event(event, &mut report, &mut pending).await {
                report.record_error(event.key(), err);
            }
        }

        for event in rest {
            match event.kind {
                ObjectKind::Module => {
                    if let Err(err) = self.module_event(event, &mut report, &mut pending).await {
                        report.record_error(event.key(), err);
                    }
                }
                _ => {
                    debug!(object_id = event.object_id, kind = %event.kind, "event kind is not routed");
                    report.skipped += 1;
                }
            }
        }

        for grouping in pending {
            self.grouping_pass(grouping, &mut report).await;
        }

        info!(
            created = report.created,
            updated = report.updated,
            adopted = report.adopted,
            deleted = report.deleted,
            organized = report.organized,
            failures = report.failures.len(),
            "batch finished"
        );

        report
    }

    fn syncs_as_grouping(&self, course_id: i64) -> bool {
        self.config.grouping_course == Some(course_id)
            || self.source.course_settings(course_id).sync_as_grouping
    }

    fn course(&self, course_id: i64) -> SyncResult<SourceCourse> {
        self.source.course(course_id).ok_or(SyncError::MissingSource {
            kind: ObjectKind::Course,
            id: course_id,
        })
    }

    fn module(&self, module_id: i64) -> SyncResult<SourceModule> {
        self.source.module(module_id).ok_or(SyncError::MissingSource {
            kind: ObjectKind::Module,
            id: module_id,
        })
    }

    async fn course_event(
        &self,
        event: &ChangeEvent,
        report: &mut SyncReport,
        pending: &mut Vec<PendingGrouping>,
    ) -> SyncResult<()> {
        let course_id = event.object_id;

        if event.action == ChangeAction::Deleted {
            for kind in [ObjectKind::Course, ObjectKind::Grouping] {
                let key = ObjectKey::new(course_id, kind);
                match self.reconciler.delete(key).await {
                    Ok(outcome) => report.record_delete(outcome),
                    Err(err) => report.record_error(key, err),
                }
            }
            return Ok(());
        }

        let settings = self.source.course_settings(course_id);
        let as_grouping = self.syncs_as_grouping(course_id);

        if !settings.sync_as_content && !as_grouping {
            debug!(course_id, "course is not synchronized");
            report.skipped += 1;
            return Ok(());
        }

        // The grouping pass does not depend on the content push.
        if as_grouping {
            schedule(pending, course_id, event.actor_id);
        }

        if settings.sync_as_content {
            let course = self.course(course_id)?;
            let author = self.source.author_id_number(event.actor_id);
            let local = LocalDraft::Content(DraftBuilder::new(&self.config).course_content(&course, author));

            let reconciled = self
                .reconciler
                .reconcile(ObjectKey::new(course_id, ObjectKind::Course), &local)
                .await?;
            report.record_reconcile(reconciled.action);
        }

        Ok(())
    }

    async fn module_event(
        &self,
        event: &ChangeEvent,
        report: &mut SyncReport,
        pending: &mut Vec<PendingGrouping>,
    ) -> SyncResult<()> {
        let as_grouping = self.syncs_as_grouping(event.parent_id);

        if as_grouping {
            schedule(pending, event.parent_id, event.actor_id);
        }

        if event.action == ChangeAction::Deleted {
            let outcome = self.reconciler.delete(event.key()).await?;
            report.record_delete(outcome);
            return Ok(());
        }

        if as_grouping {
            return Ok(());
        }

        let module = self.module(event.object_id)?;
        let author = self.source.author_id_number(event.actor_id);
        let local = LocalDraft::Content(DraftBuilder::new(&self.config).module(&module, author));

        let reconciled = self.reconciler.reconcile(event.key(), &local).await?;
        report.record_reconcile(reconciled.action);

        Ok(())
    }

    /// Reconciles every module of the course, then organizes its grouping.
    #[instrument(skip_all, fields(course_id = grouping.course_id))]
    async fn grouping_pass(&self, grouping: PendingGrouping, report: &mut SyncReport) {
        let key = ObjectKey::new(grouping.course_id, ObjectKind::Grouping);
        let course = match self.course(grouping.course_id) {
            Ok(course) => course,
            Err(err) => return report.record_error(key, err),
        };

        let builder = DraftBuilder::new(&self.config);
        let author = self.source.author_id_number(grouping.actor_id);

        for module in self.source.course_modules(course.id) {
            let module_key = ObjectKey::new(module.id, ObjectKind::Module);
            let local = LocalDraft::Content(builder.module(&module, author.clone()));

            match self.reconciler.reconcile(module_key, &local).await {
                Ok(reconciled) => report.record_reconcile(reconciled.action),
                Err(err) => report.record_error(module_key, err),
            }
        }

        let playlist = LocalDraft::Playlist(builder.course_playlist(&course));
        let sections = self.source.course_sections(course.id);

        match self.organizer.organize(course.id, &playlist, &sections).await {
            Ok(outcome) => {
                report.record_reconcile(outcome.grouping.action);
                report.organized += 1;
            }
            Err(err) => report.record_error(key, err),
        }
    }
}

fn schedule(pending: &mut Vec<PendingGrouping>, course_id: i64, actor_id: i64) {
    if pending.iter().all(|grouping| grouping.course_id != course_id) {
        pending.push(PendingGrouping { course_id, actor_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groupings_are_scheduled_once_in_first_seen_order() {
        let mut pending = Vec::new();

        schedule(&mut pending, 4, 1);
        schedule(&mut pending, 3, 1);
        schedule(&mut pending, 4, 2);

        let order = pending.iter().map(|grouping| grouping.course_id).collect::<Vec<_>>();
        assert_eq!(order, vec![4, 3]);
        assert_eq!(pending[0].actor_id, 1);
    }

    #[test]
    fn missing_sources_count_as_skipped() {
        let mut report = SyncReport::default();

        report.record_error(
            ObjectKey::new(9, ObjectKind::Module),
            SyncError::MissingSource {
                kind: ObjectKind::Module,
                id: 9,
            },
        );

        assert_eq!(report.skipped, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn failures_keep_the_attempted_operation() {
        let mut report = SyncReport::default();

        report.record_error(
            ObjectKey::new(77, ObjectKind::Module),
            SyncError::catalog("create")(crate::error::CatalogError::Status {
                code: 500,
                body: "boom".to_owned(),
            }),
        );

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].operation, "create");
        assert_eq!(report.failures[0].object_id, 77);
    }
}
