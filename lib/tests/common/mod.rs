//! Shared fixtures: an in-memory catalog that records every call, plus
//! source records and stores for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use course_catalog_sync::catalog::CatalogResult;
use course_catalog_sync::source::{SourceCourse, SourceModule, SourceSection};
use course_catalog_sync::store::MappingStore;
use course_catalog_sync::{
    CatalogClient, CatalogError, DeleteAck, Draft, MappingRecord, ObjectKind, RemoteResource,
    ResourceType, SearchOutcome, Section, SqliteMappingStore, StoreError, SyncConfig,
};
use url::Url;

pub const SITE: &str = "https://lms.example.edu";
pub const FIRST_REMOTE_ID: i64 = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Get(ResourceType, i64),
    Search(ResourceType, String, String),
    Create(Draft),
    Update(i64, Draft),
    Delete(ResourceType, i64),
    Organize(i64, Vec<Section>),
}

impl Call {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Get(..) => "get",
            Self::Search(..) => "search",
            Self::Create(_) => "create",
            Self::Update(..) => "update",
            Self::Delete(..) => "delete",
            Self::Organize(..) => "organize",
        }
    }
}

#[derive(Default)]
struct State {
    resources: Vec<RemoteResource>,
    next_id: i64,
    calls: Vec<Call>,
    failing: Vec<&'static str>,
    failing_types: Vec<&'static str>,
    organized: HashMap<i64, Vec<Section>>,
}

/// Catalog double keeping resources in memory.
///
/// Search follows the real catalog: candidates are the resources whose name
/// contains the term, and the strict match rule is applied on top.
pub struct FakeCatalog {
    state: Mutex<State>,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: FIRST_REMOTE_ID,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Seeds a resource that the synchronizer never created.
    pub fn insert(&self, resource: RemoteResource) {
        let mut state = self.state();
        state.next_id = state.next_id.max(resource.id + 1);
        state.resources.push(resource);
    }

    /// Drops a resource behind the synchronizer's back.
    pub fn forget(&self, resource: ResourceType, id: i64) {
        self.state()
            .resources
            .retain(|existing| !(existing.id == id && existing.body.resource_type() == resource));
    }

    /// Makes every later call of `operation` fail with a 500.
    pub fn fail(&self, operation: &'static str) {
        self.state().failing.push(operation);
    }

    /// Makes creates of content with the given `type` fail with a 500.
    pub fn fail_create_of(&self, content_type: &'static str) {
        self.state().failing_types.push(content_type);
    }

    pub fn heal(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.failing_types.clear();
    }

    pub fn resource(&self, resource: ResourceType, id: i64) -> Option<RemoteResource> {
        self.state()
            .resources
            .iter()
            .find(|existing| existing.id == id && existing.body.resource_type() == resource)
            .cloned()
    }

    pub fn resources(&self) -> Vec<RemoteResource> {
        self.state().resources.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn organized(&self, grouping_id: i64) -> Option<Vec<Section>> {
        self.state().organized.get(&grouping_id).cloned()
    }

    fn enter(&self, call: Call) -> CatalogResult<MutexGuard<'_, State>> {
        let mut state = self.state();
        let operation = call.operation();
        state.calls.push(call);

        if state.failing.contains(&operation) {
            return Err(CatalogError::Status {
                code: 500,
                body: format!("{operation} is failing"),
            });
        }

        Ok(state)
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn get_by_id(
        &self,
        resource: ResourceType,
        id: i64,
    ) -> CatalogResult<Option<RemoteResource>> {
        let state = self.enter(Call::Get(resource, id))?;

        Ok(state
            .resources
            .iter()
            .find(|existing| existing.id == id && existing.body.resource_type() == resource)
            .cloned())
    }

    async fn search_exact(
        &self,
        resource: ResourceType,
        name: &str,
        url: &str,
    ) -> CatalogResult<SearchOutcome> {
        let state = self.enter(Call::Search(resource, name.to_owned(), url.to_owned()))?;

        let candidates = state
            .resources
            .iter()
            .filter(|existing| existing.body.resource_type() == resource)
            .filter(|existing| existing.name().contains(name))
            .cloned()
            .collect::<Vec<_>>();

        Ok(SearchOutcome::from_candidates(
            candidates.len() as i64,
            candidates,
            name,
            url,
        ))
    }

    async fn create(&self, draft: &Draft) -> CatalogResult<RemoteResource> {
        let mut state = self.enter(Call::Create(draft.clone()))?;

        if let Draft::Content(content) = draft {
            if state.failing_types.contains(&content.content_type.as_str()) {
                return Err(CatalogError::Status {
                    code: 500,
                    body: format!("cannot create {}", content.content_type),
                });
            }
        }

        let id = state.next_id;
        state.next_id += 1;

        let created = RemoteResource {
            id,
            global_id: format!("g-{id}"),
            body: draft.clone(),
        };
        state.resources.push(created.clone());

        Ok(created)
    }

    async fn update(&self, id: i64, draft: &Draft) -> CatalogResult<RemoteResource> {
        let mut state = self.enter(Call::Update(id, draft.clone()))?;
        let resource = draft.resource_type();

        let existing = state
            .resources
            .iter_mut()
            .find(|existing| existing.id == id && existing.body.resource_type() == resource)
            .ok_or(CatalogError::Status {
                code: 404,
                body: "not found".to_owned(),
            })?;
        existing.body = draft.clone();

        Ok(existing.clone())
    }

    async fn delete(&self, resource: ResourceType, id: i64) -> CatalogResult<DeleteAck> {
        let mut state = self.enter(Call::Delete(resource, id))?;

        let before = state.resources.len();
        state
            .resources
            .retain(|existing| !(existing.id == id && existing.body.resource_type() == resource));

        if state.resources.len() == before {
            Ok(DeleteAck::AlreadyAbsent)
        } else {
            Ok(DeleteAck::Deleted)
        }
    }

    async fn organize_grouping(&self, grouping_id: i64, sections: &[Section]) -> CatalogResult<()> {
        let mut state = self.enter(Call::Organize(grouping_id, sections.to_vec()))?;
        state.organized.insert(grouping_id, sections.to_vec());

        Ok(())
    }
}

/// SQLite store whose upserts can be switched to fail.
pub struct FlakyStore {
    inner: SqliteMappingStore,
    failing: AtomicBool,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteMappingStore::open_in_memory().unwrap(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_upserts(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl MappingStore for FlakyStore {
    fn find(&self, local_id: i64, kind: ObjectKind) -> Result<Option<MappingRecord>, StoreError> {
        self.inner.find(local_id, kind)
    }

    fn upsert(&self, record: &MappingRecord) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidData("upsert is failing".to_owned()));
        }

        self.inner.upsert(record)
    }

    fn remove(&self, local_id: i64, kind: ObjectKind) -> Result<bool, StoreError> {
        self.inner.remove(local_id, kind)
    }

    fn list(&self, kind: Option<ObjectKind>) -> Result<Vec<MappingRecord>, StoreError> {
        self.inner.list(kind)
    }
}

pub fn config() -> SyncConfig {
    SyncConfig::new(Url::parse(SITE).unwrap())
}

pub fn memory_store() -> Arc<SqliteMappingStore> {
    Arc::new(SqliteMappingStore::open_in_memory().unwrap())
}

pub fn page(id: i64, course_id: i64, name: &str) -> SourceModule {
    SourceModule {
        id,
        course_id,
        module_name: "page".to_owned(),
        name: name.to_owned(),
        intro: String::new(),
        external_url: None,
    }
}

pub fn course(id: i64, fullname: &str) -> SourceCourse {
    SourceCourse {
        id,
        fullname: fullname.to_owned(),
        summary: String::new(),
        visible: true,
    }
}

pub fn section(course_id: i64, number: u32, name: Option<&str>, sequence: &[i64]) -> SourceSection {
    SourceSection {
        course_id,
        section: number,
        name: name.map(str::to_owned),
        sequence: sequence.to_vec(),
    }
}

pub fn module_url(id: i64) -> String {
    format!("{SITE}/mod/page/view.php?id={id}")
}
