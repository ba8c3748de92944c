//! Import direction: remote collections into local projects and tasks.

use chrono::Utc;
use log::{debug, info, warn};

use super::lists::ListMapper;
use super::mapping::{
    FieldMapper, LocalFields, FIELD_COMPLETED_AT, FIELD_DUE_DATE, FIELD_NAME, FIELD_NOTE, FIELD_PRIORITY, FIELD_STATUS,
};
use super::reconcile::{self, Decision};
use super::recorder::ChangeSet;
use super::{ItemError, ItemRef, PassContext, PassState, SyncService};
use crate::constants::{ACTION_CREATE, ACTION_IMPORT};
use crate::entities::{project, task};
use crate::error::SyncError;
use crate::provider::{ExternalList, ExternalTask, ProviderError};
use crate::storage::{NewTask, TaskPatch};

/// A remote task together with what the reconciliation decided for it.
struct Planned<'i> {
    item: &'i ExternalTask,
    fields: LocalFields,
    bound: Option<task::Model>,
    decision: Decision,
}

enum Applied {
    Created,
    Updated,
    Realigned,
    Queued,
    Skipped,
}

impl SyncService {
    pub(super) async fn run_import(&self, ctx: &mut PassContext<'_>, force_update: bool) -> Result<(), SyncError> {
        let token = self.token(ctx).await?;

        ctx.enter(PassState::EnumeratingCollections);
        let lists = match self.provider.fetch_lists(&token).await {
            Ok(lists) => lists,
            Err(e) => return Err(self.fatal(ctx, e).await),
        };
        info!("✅ Fetched {} collections for user {}", lists.len(), ctx.user_id);

        let source = self.provider.source_tag();
        let mut mapper = ListMapper::new(
            self.stores.projects.as_ref(),
            ctx.user_id,
            source,
            &self.options.default_list_name,
        );

        for list in &lists {
            self.import_collection(ctx, &mut mapper, &token, list, force_update).await?;
        }

        ctx.result.warnings.extend(mapper.take_warnings());
        Ok(())
    }

    async fn import_collection(
        &self,
        ctx: &mut PassContext<'_>,
        mapper: &mut ListMapper<'_>,
        token: &str,
        list: &ExternalList,
        force_update: bool,
    ) -> Result<(), SyncError> {
        let collection = || ItemRef {
            collection: Some(list.display_name.clone()),
            ..Default::default()
        };

        ctx.enter(PassState::FetchingItems);
        let items = match self.provider.fetch_tasks(token, &list.id).await {
            Ok(items) => items,
            Err(ProviderError::Unauthorized) => return Err(self.fatal(ctx, ProviderError::Unauthorized).await),
            Err(e) => {
                warn!("Skipping collection '{}': {e}", list.display_name);
                ctx.record_failure(e.into(), collection());
                return Ok(());
            }
        };
        debug!("Collection '{}' holds {} tasks", list.display_name, items.len());
        for item in &items {
            ctx.remember(&list.id, item.clone());
        }

        let resolved = self
            .bounded(async { mapper.resolve_project(&list.display_name).await.map_err(ItemError::from) })
            .await;
        let project = match resolved {
            Ok(project) => project,
            Err(e) => {
                ctx.record_failure(e, collection());
                return Ok(());
            }
        };

        ctx.enter(PassState::Reconciling);
        let mut plan = Vec::with_capacity(items.len());
        for item in &items {
            match self.bounded(self.plan_item(ctx.user_id, item, force_update)).await {
                Ok(planned) => plan.push(planned),
                Err(e) => {
                    let item_ref = ItemRef {
                        task_id: None,
                        external_id: Some(item.id.clone()),
                        collection: Some(list.display_name.clone()),
                    };
                    self.absorb(ctx, e, item_ref).await?;
                }
            }
        }

        ctx.enter(PassState::Applying);
        for planned in plan {
            let item_ref = ItemRef {
                task_id: planned.bound.as_ref().map(|t| t.id),
                external_id: Some(planned.item.id.clone()),
                collection: Some(list.display_name.clone()),
            };
            match self.bounded(self.apply_item(ctx.user_id, &project, list, &planned)).await {
                Ok(Applied::Created) => ctx.result.created += 1,
                Ok(Applied::Updated) => ctx.result.updated += 1,
                Ok(Applied::Realigned) | Ok(Applied::Skipped) => ctx.result.skipped += 1,
                Ok(Applied::Queued) => {
                    ctx.result.skipped += 1;
                    if let Some(task_id) = item_ref.task_id {
                        if !ctx.result.queued_for_export.contains(&task_id) {
                            ctx.result.queued_for_export.push(task_id);
                        }
                    }
                }
                Err(e) => self.absorb(ctx, e, item_ref).await?,
            }
        }

        Ok(())
    }

    async fn plan_item<'i>(&self, user_id: i64, item: &'i ExternalTask, force_update: bool) -> Result<Planned<'i>, ItemError> {
        let fields = FieldMapper::to_local(item)?;
        let bound = self
            .stores
            .tasks
            .find_by_external_id(user_id, self.provider.source_tag(), &item.id)
            .await?;
        let decision = reconcile::decide(&fields, item.last_modified, bound.as_ref(), force_update);

        Ok(Planned {
            item,
            fields,
            bound,
            decision,
        })
    }

    async fn apply_item(
        &self,
        user_id: i64,
        project: &project::Model,
        list: &ExternalList,
        planned: &Planned<'_>,
    ) -> Result<Applied, ItemError> {
        let item = planned.item;
        let stamp = item.last_modified.unwrap_or_else(Utc::now);

        match (&planned.decision, &planned.bound) {
            (Decision::Create, _) => {
                let fields = &planned.fields;
                let created = self
                    .stores
                    .tasks
                    .create(NewTask {
                        user_id,
                        project_id: Some(project.id),
                        name: fields.name.clone(),
                        note: fields.note.clone(),
                        status: fields.status,
                        priority: fields.priority,
                        due_date: fields.due_date,
                        completed_at: fields.completed_at,
                        external_id: Some(item.id.clone()),
                        external_source: Some(self.provider.source_tag().to_string()),
                        external_list_id: Some(list.id.clone()),
                        external_last_modified: Some(stamp),
                        updated_at: Some(stamp),
                    })
                    .await?;

                let events = ChangeSet::created(
                    created.id,
                    user_id,
                    ACTION_CREATE,
                    Some(list.display_name.clone()),
                    &fields.snapshot(),
                );
                self.recorder.flush(events).await?;
                debug!("Imported '{}' as task {}", created.name, created.id);
                Ok(Applied::Created)
            }
            (Decision::UpdateLocal { changes }, Some(local)) => {
                let moved = local.external_list_id.as_deref() != Some(list.id.as_str());
                let in_sync = local.updated_at == Some(stamp) && local.external_last_modified == Some(stamp);
                if changes.is_empty() && !moved && in_sync {
                    return Ok(Applied::Skipped);
                }

                let fields = &planned.fields;
                let mut patch = TaskPatch {
                    external_last_modified: Some(stamp),
                    updated_at: Some(stamp),
                    ..Default::default()
                };
                for change in changes {
                    match change.field {
                        FIELD_NAME => patch.name = Some(fields.name.clone()),
                        FIELD_NOTE => patch.note = Some(fields.note.clone()),
                        FIELD_DUE_DATE => patch.due_date = Some(fields.due_date),
                        FIELD_PRIORITY => patch.priority = Some(fields.priority),
                        FIELD_STATUS => patch.status = Some(fields.status),
                        FIELD_COMPLETED_AT => patch.completed_at = Some(fields.completed_at),
                        _ => {}
                    }
                }

                let mut events = ChangeSet::new(local.id, user_id, ACTION_IMPORT, Some(list.display_name.clone()));
                events.extend(changes);
                if moved {
                    patch.external_list_id = Some(list.id.clone());
                    if local.project_id != Some(project.id) {
                        patch.project_id = Some(Some(project.id));
                        events.push(
                            "project_id",
                            local.project_id.map(|id| id.to_string()),
                            Some(project.id.to_string()),
                        );
                    }
                }

                self.stores.tasks.update(local.id, patch).await?;
                let applied = if events.is_empty() {
                    Applied::Realigned
                } else {
                    Applied::Updated
                };
                self.recorder.flush(events).await?;
                Ok(applied)
            }
            (Decision::UpdateLocal { .. }, None) => {
                Err(ItemError::Validation(format!("no local task bound to {}", item.id)))
            }
            (Decision::QueueExport, _) => Ok(Applied::Queued),
            (Decision::Skip, _) => Ok(Applied::Skipped),
        }
    }
}
