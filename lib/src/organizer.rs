//! Builds the ordered section list of a grouping and pushes it to the
//! catalog as a full replace.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::data::{ObjectKey, ObjectKind, Section};
use crate::draft::LocalDraft;
use crate::error::{SyncError, SyncResult};
use crate::reconciler::{Reconciler, Reconciliation};
use crate::source::SourceSection;

pub const GENERAL_SECTION_NAME: &str = "General";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrganizeOutcome {
    pub grouping: Reconciliation,

    pub sections: Vec<Section>,
    /// Module ids that had no mapping and were left out of the ordering.
    pub skipped_members: Vec<i64>,
}

pub struct GroupingOrganizer {
    reconciler: Arc<Reconciler>,
}

impl GroupingOrganizer {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Reconciles the grouping of `course_id`, then replaces its remote
    /// ordering with one built from `sections`.
    ///
    /// Members are expected to be reconciled already; any member without a
    /// module mapping is left out.
    #[instrument(skip_all, fields(object_id = course_id, kind = %ObjectKind::Grouping))]
    pub async fn organize(
        &self,
        course_id: i64,
        playlist: &LocalDraft,
        sections: &[SourceSection],
    ) -> SyncResult<OrganizeOutcome> {
        let key = ObjectKey::new(course_id, ObjectKind::Grouping);
        let grouping = self.reconciler.reconcile(key, playlist).await?;

        let (sections, skipped_members) = self.build_sections(sections)?;

        self.reconciler
            .catalog()
            .organize_grouping(grouping.record.remote_id, &sections)
            .await
            .map_err(SyncError::catalog("organize"))?;

        info!(
            remote_id = grouping.record.remote_id,
            sections = sections.len(),
            skipped = skipped_members.len(),
            "grouping organized"
        );

        Ok(OrganizeOutcome {
            grouping,
            sections,
            skipped_members,
        })
    }

    /// Maps source sections to catalog sections, resolving members through
    /// their module mappings.
    pub fn build_sections(
        &self,
        sections: &[SourceSection],
    ) -> SyncResult<(Vec<Section>, Vec<i64>)> {
        let mut ordered = sections.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|section| section.section);

        let store = self.reconciler.store();
        let mut skipped = Vec::new();
        let mut built = Vec::with_capacity(ordered.len());

        for section in ordered {
            let mut content_ids = Vec::with_capacity(section.sequence.len());

            for &module_id in &section.sequence {
                match store.find(module_id, ObjectKind::Module)? {
                    Some(record) => content_ids.push(record.remote_id),
                    None => {
                        warn!(
                            module_id,
                            section = section.section,
                            "member has no mapping; leaving it out of the grouping"
                        );
                        skipped.push(module_id);
                    }
                }
            }

            built.push(Section {
                name: section_title(section.section, section.name.as_deref()),
                content_ids,
            });
        }

        Ok((built, skipped))
    }
}

/// Display title of a section: its own name when set, otherwise a
/// positional default.
pub fn section_title(section: u32, name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ if section == 0 => GENERAL_SECTION_NAME.to_owned(),
        _ => format!("Section {section}"),
    }
}
