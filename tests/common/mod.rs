#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasksync::auth::{AuthError, TokenGrant, TokenGuard, TokenLease, TokenService};
use tasksync::entities::task;
use tasksync::provider::{
    ExternalList, ExternalTask, Importance, Provider, ProviderError, RemoteStatus, TaskBody, TaskWrite,
};
use tasksync::storage::{LocalStorage, NewTask, TaskPatch, TaskStore};
use tasksync::sync::{SyncOptions, SyncService, SyncStores};

pub const USER: i64 = 1;
pub const SOURCE: &str = "microsoft_todo";

#[derive(Default)]
struct FakeState {
    lists: Vec<ExternalList>,
    tasks: HashMap<String, Vec<ExternalTask>>,
    clock: Option<DateTime<Utc>>,
    next_id: usize,
    failing_lists: HashSet<String>,
    unauthorized: bool,
    enumeration_fails: bool,
    created_tasks: usize,
    patches: Vec<(String, TaskWrite)>,
    hang_on_title: Option<String>,
}

impl FakeState {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.clock {
            Some(previous) if previous >= now => previous + chrono::Duration::milliseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

fn apply_write(task: &mut ExternalTask, write: &TaskWrite) {
    if let Some(title) = &write.title {
        task.title = title.clone();
    }
    if let Some(body) = &write.body {
        task.body = (!body.content.is_empty()).then(|| body.clone());
    }
    if let Some(status) = &write.status {
        task.status = status.clone();
    }
    if let Some(importance) = write.importance {
        task.importance = importance;
    }
    if let Some(due) = &write.due {
        task.due = due.clone();
    }
    if let Some(completed) = &write.completed {
        task.completed = completed.clone();
    }
}

/// In-memory provider with failure injection.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_list(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("list");
        state.lists.push(ExternalList {
            id: id.clone(),
            display_name: name.to_string(),
        });
        state.tasks.insert(id.clone(), Vec::new());
        id
    }

    pub fn add_task(&self, list_id: &str, title: &str) -> ExternalTask {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("task");
        let last_modified = state.tick();
        let task = ExternalTask {
            id,
            list_id: list_id.to_string(),
            title: title.to_string(),
            body: None,
            status: RemoteStatus::NotStarted,
            importance: Importance::Normal,
            due: None,
            completed: None,
            last_modified: Some(last_modified),
            decode_error: None,
        };
        state.tasks.entry(list_id.to_string()).or_default().push(task.clone());
        task
    }

    /// Edit a remote task the way another client would, moving its stamp.
    pub fn edit_task(&self, list_id: &str, task_id: &str, edit: impl FnOnce(&mut ExternalTask)) {
        let mut state = self.state.lock().unwrap();
        let stamp = state.tick();
        let task = state
            .tasks
            .get_mut(list_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
            .expect("remote task exists");
        edit(task);
        task.last_modified = Some(stamp);
    }

    /// Move a remote task to another list, keeping its id.
    pub fn move_task(&self, from: &str, to: &str, task_id: &str) {
        let mut state = self.state.lock().unwrap();
        let stamp = state.tick();
        let tasks = state.tasks.get_mut(from).expect("source list exists");
        let position = tasks.iter().position(|t| t.id == task_id).expect("remote task exists");
        let mut task = tasks.remove(position);
        task.list_id = to.to_string();
        task.last_modified = Some(stamp);
        state.tasks.entry(to.to_string()).or_default().push(task);
    }

    pub fn task(&self, list_id: &str, task_id: &str) -> Option<ExternalTask> {
        let state = self.state.lock().unwrap();
        state.tasks.get(list_id)?.iter().find(|t| t.id == task_id).cloned()
    }

    pub fn tasks(&self, list_id: &str) -> Vec<ExternalTask> {
        let state = self.state.lock().unwrap();
        state.tasks.get(list_id).cloned().unwrap_or_default()
    }

    pub fn lists(&self) -> Vec<ExternalList> {
        self.state.lock().unwrap().lists.clone()
    }

    pub fn fail_list(&self, list_id: &str) {
        self.state.lock().unwrap().failing_lists.insert(list_id.to_string());
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.state.lock().unwrap().unauthorized = unauthorized;
    }

    pub fn set_enumeration_fails(&self, fails: bool) {
        self.state.lock().unwrap().enumeration_fails = fails;
    }

    pub fn hang_on_title(&self, title: &str) {
        self.state.lock().unwrap().hang_on_title = Some(title.to_string());
    }

    pub fn created_tasks(&self) -> usize {
        self.state.lock().unwrap().created_tasks
    }

    pub fn patches(&self) -> Vec<(String, TaskWrite)> {
        self.state.lock().unwrap().patches.clone()
    }

    fn check_auth(&self) -> Result<(), ProviderError> {
        if self.state.lock().unwrap().unauthorized {
            return Err(ProviderError::Unauthorized);
        }
        Ok(())
    }

    fn should_hang(&self, write: &TaskWrite) -> bool {
        let state = self.state.lock().unwrap();
        matches!((&state.hang_on_title, &write.title), (Some(hang), Some(title)) if hang == title)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn source_tag(&self) -> &str {
        SOURCE
    }

    async fn fetch_lists(&self, _token: &str) -> Result<Vec<ExternalList>, ProviderError> {
        self.check_auth()?;
        let state = self.state.lock().unwrap();
        if state.enumeration_fails {
            return Err(ProviderError::Unavailable("enumeration down".to_string()));
        }
        Ok(state.lists.clone())
    }

    async fn fetch_tasks(&self, _token: &str, list_id: &str) -> Result<Vec<ExternalTask>, ProviderError> {
        self.check_auth()?;
        let state = self.state.lock().unwrap();
        if state.failing_lists.contains(list_id) {
            return Err(ProviderError::Unavailable(format!("list {list_id} down")));
        }
        state
            .tasks
            .get(list_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(list_id.to_string()))
    }

    async fn create_list(&self, _token: &str, display_name: &str) -> Result<ExternalList, ProviderError> {
        self.check_auth()?;
        let id = self.add_list(display_name);
        Ok(ExternalList {
            id,
            display_name: display_name.to_string(),
        })
    }

    async fn create_task(&self, _token: &str, list_id: &str, write: &TaskWrite) -> Result<ExternalTask, ProviderError> {
        self.check_auth()?;
        if self.should_hang(write) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("task");
        let last_modified = state.tick();
        let mut task = ExternalTask {
            id,
            list_id: list_id.to_string(),
            title: String::new(),
            body: None,
            status: RemoteStatus::NotStarted,
            importance: Importance::Normal,
            due: None,
            completed: None,
            last_modified: Some(last_modified),
            decode_error: None,
        };
        apply_write(&mut task, write);
        state.created_tasks += 1;
        state.tasks.entry(list_id.to_string()).or_default().push(task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        _token: &str,
        list_id: &str,
        task_id: &str,
        patch: &TaskWrite,
    ) -> Result<ExternalTask, ProviderError> {
        self.check_auth()?;
        let mut state = self.state.lock().unwrap();
        let stamp = state.tick();
        state.patches.push((task_id.to_string(), patch.clone()));
        let task = state
            .tasks
            .get_mut(list_id)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
            .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))?;
        apply_write(task, patch);
        task.last_modified = Some(stamp);
        Ok(task.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Grant,
    Reject,
    Unavailable,
}

/// Token service counting its calls.
pub struct FakeTokenService {
    pub refresh_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    delay: Duration,
    outcome: Mutex<RefreshOutcome>,
}

impl FakeTokenService {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            delay,
            outcome: Mutex::new(RefreshOutcome::Grant),
        }
    }

    pub fn set_outcome(&self, outcome: RefreshOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenService for FakeTokenService {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(AuthError::Rejected("invalid_grant".to_string()));
        }
        Ok(TokenGrant {
            access_token: format!("access-from-{code}"),
            refresh_token: Some(format!("refresh-from-{code}")),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        match *self.outcome.lock().unwrap() {
            RefreshOutcome::Grant => Ok(TokenGrant {
                access_token: format!("access-{n}"),
                refresh_token: Some(format!("{refresh_token}-r{n}")),
                expires_in: 3600,
            }),
            RefreshOutcome::Reject => Err(AuthError::Rejected("invalid_grant".to_string())),
            RefreshOutcome::Unavailable => Err(AuthError::Unavailable("token endpoint down".to_string())),
        }
    }
}

pub fn lease_expiring_in(minutes: i64) -> TokenLease {
    TokenLease {
        access_token: "access-0".to_string(),
        refresh_token: Some("refresh-0".to_string()),
        expires_at: Utc::now() + chrono::Duration::minutes(minutes),
    }
}

pub fn guard_for(user_id: i64, tokens: Arc<FakeTokenService>) -> TokenGuard {
    TokenGuard::new(user_id, SOURCE, lease_expiring_in(60), chrono::Duration::minutes(10), tokens)
}

/// Task store that fails every write touching a task with one of the given names.
pub struct FailingTaskStore {
    inner: LocalStorage,
    poisoned: HashSet<String>,
    stalled: HashSet<String>,
}

impl FailingTaskStore {
    pub fn new(inner: LocalStorage, poisoned: &[&str]) -> Self {
        Self {
            inner,
            poisoned: poisoned.iter().map(|s| s.to_string()).collect(),
            stalled: HashSet::new(),
        }
    }

    /// Creating a task with one of these names never completes.
    pub fn stalling(mut self, names: &[&str]) -> Self {
        self.stalled = names.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl TaskStore for FailingTaskStore {
    async fn get(&self, id: i64) -> Result<Option<task::Model>> {
        TaskStore::get(&self.inner, id).await
    }

    async fn find_by_external_id(&self, user_id: i64, source: &str, external_id: &str) -> Result<Option<task::Model>> {
        self.inner.find_by_external_id(user_id, source, external_id).await
    }

    async fn create(&self, fields: NewTask) -> Result<task::Model> {
        if self.poisoned.contains(&fields.name) {
            bail!("disk full while creating {}", fields.name);
        }
        if self.stalled.contains(&fields.name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        TaskStore::create(&self.inner, fields).await
    }

    async fn update(&self, id: i64, patch: TaskPatch) -> Result<task::Model> {
        if let Some(existing) = TaskStore::get(&self.inner, id).await? {
            if self.poisoned.contains(&existing.name) {
                bail!("disk full while updating {}", existing.name);
            }
        }
        self.inner.update(id, patch).await
    }

    async fn list_export_candidates(&self, user_id: i64, source: &str, include_unbound: bool) -> Result<Vec<task::Model>> {
        self.inner.list_export_candidates(user_id, source, include_unbound).await
    }
}

pub struct Harness {
    pub storage: LocalStorage,
    pub provider: Arc<FakeProvider>,
    pub tokens: Arc<FakeTokenService>,
    pub service: SyncService,
    pub guard: TokenGuard,
}

pub fn test_options() -> SyncOptions {
    SyncOptions {
        item_timeout: Duration::from_secs(5),
        ..SyncOptions::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(test_options()).await
}

pub async fn harness_with(options: SyncOptions) -> Harness {
    let storage = LocalStorage::in_memory().await.unwrap();
    let stores = SyncStores::local(&storage);
    harness_with_stores(storage, stores, options)
}

pub fn harness_with_stores(storage: LocalStorage, stores: SyncStores, options: SyncOptions) -> Harness {
    let provider = Arc::new(FakeProvider::new());
    let tokens = Arc::new(FakeTokenService::new());
    let service = SyncService::new(provider.clone(), stores, options);
    let guard = guard_for(USER, tokens.clone());
    Harness {
        storage,
        provider,
        tokens,
        service,
        guard,
    }
}

pub fn text_body(content: &str) -> Option<TaskBody> {
    Some(TaskBody::text(content))
}

/// Create a purely local task, as the surrounding application would.
pub async fn local_task(storage: &LocalStorage, name: &str) -> task::Model {
    TaskStore::create(storage, NewTask::local(USER, name)).await.unwrap()
}

/// Edit a local task, as the surrounding application would.
pub async fn edit_local(storage: &LocalStorage, id: i64, patch: TaskPatch) -> task::Model {
    storage.update(id, patch).await.unwrap()
}
