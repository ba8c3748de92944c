//! Export direction: local tasks onto remote collections.

use std::collections::HashMap;

use chrono::Utc;
use log::{debug, info, warn};

use super::lists::CollectionResolver;
use super::mapping::{diff_fields, FieldChange, FieldMapper, LocalFields, FIELD_COMPLETED_AT};
use super::recorder::ChangeSet;
use super::{ItemError, ItemRef, PassContext, PassState, SyncService};
use crate::constants::ACTION_EXPORT;
use crate::entities::{task, TaskPriority, TaskStatus};
use crate::error::SyncError;
use crate::provider::{ExternalTask, ProviderError};
use crate::storage::TaskPatch;

enum Exported {
    Created,
    Patched,
    Skipped,
}

/// Changes describing the first transmission of a task: every field that
/// differs from an empty task.
fn creation_changes(fields: &LocalFields) -> Vec<FieldChange> {
    let blank = LocalFields {
        name: String::new(),
        note: None,
        status: TaskStatus::NotStarted,
        priority: TaskPriority::Medium,
        due_date: None,
        completed_at: None,
    };
    diff_fields(&blank, fields)
}

impl SyncService {
    /// Export candidates, or only the tasks in `only` when given.
    pub(super) async fn run_export(&self, ctx: &mut PassContext<'_>, only: Option<&[i64]>) -> Result<(), SyncError> {
        let token = self.token(ctx).await?;

        ctx.enter(PassState::EnumeratingCollections);
        let lists = match self.provider.fetch_lists(&token).await {
            Ok(lists) => lists,
            Err(e) => return Err(self.fatal(ctx, e).await),
        };
        let mut resolver = CollectionResolver::new(&lists);

        ctx.enter(PassState::Reconciling);
        let source = self.provider.source_tag();
        let candidates = match only {
            None => {
                self.stores
                    .tasks
                    .list_export_candidates(ctx.user_id, source, self.options.export_unbound_tasks)
                    .await?
            }
            Some(ids) => {
                let mut tasks = Vec::with_capacity(ids.len());
                for &id in ids {
                    match self.stores.tasks.get(id).await {
                        Ok(Some(task)) => tasks.push(task),
                        Ok(None) => warn!("Queued task {id} disappeared before export"),
                        Err(e) => ctx.record_failure(
                            e.into(),
                            ItemRef {
                                task_id: Some(id),
                                ..Default::default()
                            },
                        ),
                    }
                }
                tasks
            }
        };
        info!("Exporting up to {} tasks for user {}", candidates.len(), ctx.user_id);

        ctx.enter(PassState::Applying);
        let queued = only.is_some();
        for task in &candidates {
            let item_ref = ItemRef {
                task_id: Some(task.id),
                external_id: task.external_id.clone(),
                collection: task
                    .external_list_id
                    .as_deref()
                    .and_then(|id| resolver.display_name(id))
                    .map(str::to_string),
            };
            match self
                .bounded(self.export_task(ctx, &mut resolver, &token, task, queued))
                .await
            {
                Ok(Exported::Created) | Ok(Exported::Patched) => ctx.result.exported += 1,
                Ok(Exported::Skipped) => ctx.result.skipped += 1,
                Err(e) => self.absorb(ctx, e, item_ref).await?,
            }
        }

        Ok(())
    }

    async fn export_task(
        &self,
        ctx: &mut PassContext<'_>,
        resolver: &mut CollectionResolver,
        token: &str,
        task: &task::Model,
        queued: bool,
    ) -> Result<Exported, ItemError> {
        let source = self.provider.source_tag();
        if task.external_id.is_some() && !task.is_bound_to(source) {
            debug!("Task {} is bound to another provider", task.id);
            return Ok(Exported::Skipped);
        }

        match task.external_id.as_deref() {
            None => self.export_new(ctx, resolver, token, task).await,
            Some(external_id) => {
                let pending = match (task.updated_at, task.external_last_modified) {
                    (Some(updated_at), Some(synced_at)) => updated_at > synced_at,
                    (_, None) => true,
                    (None, Some(_)) => false,
                };
                if !pending && !queued {
                    return Ok(Exported::Skipped);
                }
                let collection = task
                    .external_list_id
                    .as_deref()
                    .and_then(|id| resolver.display_name(id))
                    .map(str::to_string);
                self.export_existing(ctx, token, task, external_id, collection).await
            }
        }
    }

    async fn export_new(
        &self,
        ctx: &mut PassContext<'_>,
        resolver: &mut CollectionResolver,
        token: &str,
        task: &task::Model,
    ) -> Result<Exported, ItemError> {
        let project_name = match task.project_id {
            Some(project_id) => self.stores.projects.get(project_id).await?.map(|p| p.name),
            None => None,
        };
        let list_name = project_name.unwrap_or_else(|| self.options.default_list_name.clone());

        let fields = LocalFields::of_task(task);
        let write = FieldMapper::to_remote(&fields)?;
        let list = resolver.resolve(self.provider.as_ref(), token, &list_name).await?;
        let created = self.provider.create_task(token, &list.id, &write).await?;

        let stamp = created.last_modified.unwrap_or_else(Utc::now);
        self.stores
            .tasks
            .update(
                task.id,
                TaskPatch {
                    external_id: Some(created.id.clone()),
                    external_source: Some(self.provider.source_tag().to_string()),
                    external_list_id: Some(list.id.clone()),
                    external_last_modified: Some(stamp),
                    updated_at: Some(stamp),
                    ..Default::default()
                },
            )
            .await?;
        info!("Exported task {} to '{}' as {}", task.id, list.display_name, created.id);
        ctx.remember(&list.id, created);

        let mut events = ChangeSet::new(task.id, ctx.user_id, ACTION_EXPORT, Some(list.display_name));
        events.extend(&creation_changes(&fields));
        self.recorder.flush(events).await?;
        Ok(Exported::Created)
    }

    async fn export_existing(
        &self,
        ctx: &mut PassContext<'_>,
        token: &str,
        task: &task::Model,
        external_id: &str,
        collection: Option<String>,
    ) -> Result<Exported, ItemError> {
        let Some(list_id) = task.external_list_id.clone() else {
            return Err(ItemError::Validation(format!(
                "task {} is bound to {external_id} without a collection",
                task.id
            )));
        };

        let remote = self
            .remote_copy(ctx, token, &list_id, external_id)
            .await?
            .ok_or_else(|| ItemError::Provider(ProviderError::NotFound(format!("remote task {external_id}"))))?;

        if let (Some(remote_modified), Some(updated_at)) = (remote.last_modified, task.updated_at) {
            if remote_modified > updated_at {
                debug!("Remote copy of task {} is newer; leaving it to the import", task.id);
                return Ok(Exported::Skipped);
            }
        }

        let local_fields = LocalFields::of_task(task);
        let remote_fields = FieldMapper::to_local(&remote)?;
        let patch = FieldMapper::remote_patch(&local_fields, &remote_fields)?;

        if patch.is_empty() {
            let stamp = remote.last_modified.unwrap_or_else(Utc::now);
            self.stores
                .tasks
                .update(
                    task.id,
                    TaskPatch {
                        external_last_modified: Some(stamp),
                        updated_at: Some(stamp),
                        ..Default::default()
                    },
                )
                .await?;
            debug!("Task {} already matches {external_id}; stamps realigned", task.id);
            return Ok(Exported::Skipped);
        }

        let updated = self.provider.update_task(token, &list_id, external_id, &patch).await?;
        let stamp = updated.last_modified.unwrap_or_else(Utc::now);
        self.stores
            .tasks
            .update(
                task.id,
                TaskPatch {
                    external_last_modified: Some(stamp),
                    updated_at: Some(stamp),
                    ..Default::default()
                },
            )
            .await?;
        debug!("Patched {external_id} with {:?}", patch.field_names());
        ctx.remember(&list_id, updated);

        let changes: Vec<FieldChange> = diff_fields(&remote_fields, &local_fields)
            .into_iter()
            .filter(|c| c.field != FIELD_COMPLETED_AT || patch.completed.is_some())
            .collect();
        let mut events = ChangeSet::new(task.id, ctx.user_id, ACTION_EXPORT, collection.or(Some(list_id)));
        events.extend(&changes);
        self.recorder.flush(events).await?;
        Ok(Exported::Patched)
    }

    /// The remote copy of a task from the per-pass snapshot of its
    /// collection, fetching the collection on first use.
    async fn remote_copy(
        &self,
        ctx: &mut PassContext<'_>,
        token: &str,
        list_id: &str,
        external_id: &str,
    ) -> Result<Option<ExternalTask>, ItemError> {
        if !ctx.snapshots.contains_key(list_id) {
            let items = self.provider.fetch_tasks(token, list_id).await?;
            let by_id: HashMap<String, ExternalTask> = items.into_iter().map(|t| (t.id.clone(), t)).collect();
            ctx.snapshots.insert(list_id.to_string(), by_id);
        }
        Ok(ctx
            .snapshots
            .get(list_id)
            .and_then(|tasks| tasks.get(external_id))
            .cloned())
    }
}
