//! Synchronization service module for the tasksync engine.
//!
//! This module provides the [`SyncService`] struct which reconciles the local
//! task store with the remote provider. A pass runs in one direction
//! ([`SyncService::import_pass`], [`SyncService::export_pass`]) or in both
//! ([`SyncService::bidirectional_pass`]).
//!
//! Supporting pieces live in submodules:
//! - [`mapping`] - field translation between both sides
//! - [`reconcile`] - per-task merge decisions
//! - [`recorder`] - timeline entries for every applied change
//! - [`lists`] - collection to project resolution
//! - [`result`] - counters and diagnostics of a pass

mod export;
mod import;
pub mod lists;
pub mod locks;
pub mod mapping;
pub mod reconcile;
pub mod recorder;
pub mod result;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use uuid::Uuid;

use crate::auth::TokenGuard;
use crate::constants::{DEFAULT_ITEM_TIMEOUT_SECS, DEFAULT_LIST_NAME, SYNC_ACTOR};
use crate::error::SyncError;
use crate::provider::{ExternalTask, Provider, ProviderError};
use crate::storage::{LocalStorage, ProjectStore, TaskStore, TimelineSink};

pub use locks::UserLocks;
pub use mapping::{FieldMapper, LocalFields, MappingError};
pub use recorder::{ChangeRecorder, ChangeSet};
pub use result::{FailureKind, ItemFailure, PassState, SyncResult, SyncWarning};

/// Tunables of the sync engine.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Upper bound on the work spent on one task.
    pub item_timeout: Duration,
    /// Collection receiving exported tasks that belong to no project.
    pub default_list_name: String,
    /// Also export purely local tasks that were never bound.
    pub export_unbound_tasks: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            item_timeout: Duration::from_secs(DEFAULT_ITEM_TIMEOUT_SECS),
            default_list_name: DEFAULT_LIST_NAME.to_string(),
            export_unbound_tasks: false,
        }
    }
}

/// Local collaborators of the engine.
#[derive(Clone)]
pub struct SyncStores {
    pub tasks: Arc<dyn TaskStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub timeline: Arc<dyn TimelineSink>,
}

impl SyncStores {
    /// All three stores backed by the same database.
    pub fn local(storage: &LocalStorage) -> Self {
        let storage = Arc::new(storage.clone());
        Self {
            tasks: storage.clone(),
            projects: storage.clone(),
            timeline: storage,
        }
    }
}

/// Failure of a single item, before it is folded into the result.
#[derive(Debug)]
pub(crate) enum ItemError {
    Provider(ProviderError),
    Store(anyhow::Error),
    Validation(String),
    Timeout,
}

impl ItemError {
    fn kind(&self) -> FailureKind {
        match self {
            ItemError::Provider(_) => FailureKind::Provider,
            ItemError::Store(_) => FailureKind::Store,
            ItemError::Validation(_) => FailureKind::Validation,
            ItemError::Timeout => FailureKind::Timeout,
        }
    }

    fn message(&self) -> String {
        match self {
            ItemError::Provider(e) => e.to_string(),
            ItemError::Store(e) => format!("{e:#}"),
            ItemError::Validation(reason) => reason.clone(),
            ItemError::Timeout => "timed out".to_string(),
        }
    }
}

impl From<ProviderError> for ItemError {
    fn from(err: ProviderError) -> Self {
        ItemError::Provider(err)
    }
}

impl From<anyhow::Error> for ItemError {
    fn from(err: anyhow::Error) -> Self {
        ItemError::Store(err)
    }
}

impl From<MappingError> for ItemError {
    fn from(err: MappingError) -> Self {
        ItemError::Validation(err.to_string())
    }
}

/// Identifiers attached to a per-item failure.
#[derive(Default)]
pub(crate) struct ItemRef {
    task_id: Option<i64>,
    external_id: Option<String>,
    collection: Option<String>,
}

/// Mutable state of one running pass.
pub(crate) struct PassContext<'g> {
    user_id: i64,
    guard: &'g TokenGuard,
    state: PassState,
    result: SyncResult,
    /// Remote tasks per collection id, fetched at most once per pass.
    snapshots: HashMap<String, HashMap<String, ExternalTask>>,
}

impl<'g> PassContext<'g> {
    fn new(user_id: i64, guard: &'g TokenGuard) -> Self {
        Self {
            user_id,
            guard,
            state: PassState::Idle,
            result: SyncResult::new(Uuid::new_v4()),
            snapshots: HashMap::new(),
        }
    }

    fn enter(&mut self, state: PassState) {
        debug!("Pass {}: {} -> {}", self.result.pass_id, self.state, state);
        self.state = state;
    }

    fn record_failure(&mut self, error: ItemError, item: ItemRef) {
        let kind = error.kind();
        let message = error.message();
        error!(
            "Pass {}: {:?} failure (task {:?}, external {:?}, collection {:?}): {message}",
            self.result.pass_id, kind, item.task_id, item.external_id, item.collection
        );
        self.result.record_failure(ItemFailure {
            kind,
            task_id: item.task_id,
            external_id: item.external_id,
            collection: item.collection,
            message,
        });
    }

    fn remember(&mut self, list_id: &str, task: ExternalTask) {
        self.snapshots
            .entry(list_id.to_string())
            .or_default()
            .insert(task.id.clone(), task);
    }
}

/// Service that reconciles the local store with the remote provider.
///
/// Collaborators are injected at construction; the service holds no global
/// state. Passes for the same user are serialized, passes for different
/// users run concurrently.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use tasksync::provider::MsTodoClient;
/// use tasksync::storage::LocalStorage;
/// use tasksync::sync::{SyncOptions, SyncService, SyncStores};
///
/// # async fn example(guard: tasksync::auth::TokenGuard) -> anyhow::Result<()> {
/// let storage = LocalStorage::new("sqlite::memory:").await?;
/// let provider = Arc::new(MsTodoClient::new(
///     "https://graph.microsoft.com/v1.0",
///     std::time::Duration::from_secs(30),
/// )?);
/// let service = SyncService::new(provider, SyncStores::local(&storage), SyncOptions::default());
///
/// let result = service.bidirectional_pass(guard.user_id(), &guard, false).await?;
/// println!("{}", result.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SyncService {
    provider: Arc<dyn Provider>,
    stores: SyncStores,
    recorder: ChangeRecorder,
    options: SyncOptions,
    locks: UserLocks,
}

impl SyncService {
    pub fn new(provider: Arc<dyn Provider>, stores: SyncStores, options: SyncOptions) -> Self {
        let recorder = ChangeRecorder::new(stores.timeline.clone(), SYNC_ACTOR, provider.source_tag());
        Self {
            provider,
            stores,
            recorder,
            options,
            locks: UserLocks::new(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Whether a pass for `user_id` is running.
    pub async fn is_syncing(&self, user_id: i64) -> bool {
        self.locks.is_locked(user_id).await
    }

    /// Pull remote changes into the local store.
    pub async fn import_pass(&self, user_id: i64, guard: &TokenGuard, force_update: bool) -> Result<SyncResult, SyncError> {
        check_guard(user_id, guard)?;
        let _lock = self.locks.acquire(user_id).await;
        let mut ctx = PassContext::new(user_id, guard);
        info!("🔄 Pass {} (import) for user {user_id}", ctx.result.pass_id);

        let outcome = self.run_import(&mut ctx, force_update).await;
        finish(ctx, outcome)
    }

    /// Push local changes to the provider.
    pub async fn export_pass(&self, user_id: i64, guard: &TokenGuard) -> Result<SyncResult, SyncError> {
        check_guard(user_id, guard)?;
        let _lock = self.locks.acquire(user_id).await;
        let mut ctx = PassContext::new(user_id, guard);
        info!("🔄 Pass {} (export) for user {user_id}", ctx.result.pass_id);

        let outcome = self.run_export(&mut ctx, None).await;
        finish(ctx, outcome)
    }

    /// Export, then import, then export what the import found newer locally.
    ///
    /// Exporting first pushes pending local edits before the import could
    /// overwrite them with older remote content.
    pub async fn bidirectional_pass(
        &self,
        user_id: i64,
        guard: &TokenGuard,
        force_update: bool,
    ) -> Result<SyncResult, SyncError> {
        check_guard(user_id, guard)?;
        let _lock = self.locks.acquire(user_id).await;
        let mut ctx = PassContext::new(user_id, guard);
        info!("🔄 Pass {} (bidirectional) for user {user_id}", ctx.result.pass_id);

        let outcome = self.run_bidirectional(&mut ctx, force_update).await;
        finish(ctx, outcome)
    }

    async fn run_bidirectional(&self, ctx: &mut PassContext<'_>, force_update: bool) -> Result<(), SyncError> {
        self.run_export(ctx, None).await?;
        self.run_import(ctx, force_update).await?;

        let queued = ctx.result.queued_for_export.clone();
        if !queued.is_empty() {
            info!("Pass {}: exporting {} queued tasks", ctx.result.pass_id, queued.len());
            self.run_export(ctx, Some(&queued)).await?;
        }
        Ok(())
    }

    async fn token(&self, ctx: &mut PassContext<'_>) -> Result<String, SyncError> {
        ctx.enter(PassState::FetchingToken);
        Ok(ctx.guard.get_valid_token().await?)
    }

    /// Convert a provider failure that ends the pass. A refused token is
    /// invalidated so the next pass refreshes it.
    async fn fatal(&self, ctx: &PassContext<'_>, err: ProviderError) -> SyncError {
        if err == ProviderError::Unauthorized {
            ctx.guard.invalidate().await;
        }
        SyncError::from(err)
    }

    /// Fold an item failure into the result, or end the pass when the
    /// provider refused the token.
    async fn absorb(&self, ctx: &mut PassContext<'_>, err: ItemError, item: ItemRef) -> Result<(), SyncError> {
        if let ItemError::Provider(ProviderError::Unauthorized) = err {
            return Err(self.fatal(ctx, ProviderError::Unauthorized).await);
        }
        ctx.record_failure(err, item);
        Ok(())
    }

    async fn bounded<T>(&self, work: impl Future<Output = Result<T, ItemError>>) -> Result<T, ItemError> {
        match tokio::time::timeout(self.options.item_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ItemError::Timeout),
        }
    }
}

fn check_guard(user_id: i64, guard: &TokenGuard) -> Result<(), SyncError> {
    if guard.user_id() != user_id {
        return Err(SyncError::AuthExpired(format!(
            "token guard of user {} used for user {user_id}",
            guard.user_id()
        )));
    }
    Ok(())
}

fn finish(mut ctx: PassContext<'_>, outcome: Result<(), SyncError>) -> Result<SyncResult, SyncError> {
    match outcome {
        Ok(()) => {
            ctx.enter(PassState::Aggregating);
            ctx.enter(PassState::Done);
            ctx.result.state = PassState::Done;
            info!(
                "✅ Pass {} for user {}: {} ({} skipped)",
                ctx.result.pass_id,
                ctx.user_id,
                ctx.result.summary(),
                ctx.result.skipped
            );
            Ok(ctx.result)
        }
        Err(e) => {
            let failed_in = ctx.state;
            ctx.enter(PassState::Failed);
            error!(
                "❌ Pass {} for user {} failed while {failed_in}: {e}",
                ctx.result.pass_id, ctx.user_id
            );
            Err(e)
        }
    }
}
