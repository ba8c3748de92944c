//! Field-level provenance written to the task timeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use super::mapping::FieldChange;
use crate::constants::FIELD_CREATED;
use crate::storage::{NewChangeEvent, TimelineSink};

/// Changes made to one task by one sync action, accumulated until the
/// mutation they describe has been persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet {
    pub task_id: i64,
    pub user_id: i64,
    pub action: &'static str,
    pub collection: Option<String>,
    entries: Vec<(String, Option<String>, Option<String>)>,
}

impl ChangeSet {
    pub fn new(task_id: i64, user_id: i64, action: &'static str, collection: Option<String>) -> Self {
        Self {
            task_id,
            user_id,
            action,
            collection,
            entries: Vec::new(),
        }
    }

    /// Single `created` entry holding the initial snapshot.
    pub fn created(
        task_id: i64,
        user_id: i64,
        action: &'static str,
        collection: Option<String>,
        snapshot: &serde_json::Value,
    ) -> Self {
        let mut set = Self::new(task_id, user_id, action, collection);
        set.push(FIELD_CREATED, None, Some(snapshot.to_string()));
        set
    }

    pub fn push(&mut self, field: &str, old_value: Option<String>, new_value: Option<String>) {
        self.entries.push((field.to_string(), old_value, new_value));
    }

    pub fn extend(&mut self, changes: &[FieldChange]) {
        for change in changes {
            self.push(change.field, change.old_value.clone(), change.new_value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_events(self, actor: &str, source: &str) -> Vec<NewChangeEvent> {
        let metadata = json!({
            "source": source,
            "action": self.action,
            "collection": self.collection,
        });

        self.entries
            .into_iter()
            .map(|(field, old_value, new_value)| NewChangeEvent {
                task_id: self.task_id,
                user_id: self.user_id,
                field,
                old_value,
                new_value,
                actor: actor.to_string(),
                metadata: metadata.clone(),
            })
            .collect()
    }
}

/// Flushes change sets to the timeline under a fixed actor tag.
#[derive(Clone)]
pub struct ChangeRecorder {
    sink: Arc<dyn TimelineSink>,
    actor: String,
    source: String,
}

impl ChangeRecorder {
    pub fn new(sink: Arc<dyn TimelineSink>, actor: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            sink,
            actor: actor.into(),
            source: source.into(),
        }
    }

    /// Append all entries of `set` atomically. Empty sets are a no-op.
    pub async fn flush(&self, set: ChangeSet) -> Result<()> {
        if set.is_empty() {
            return Ok(());
        }
        let task_id = set.task_id;
        self.sink
            .record(set.into_events(&self.actor, &self.source))
            .await
            .with_context(|| format!("Failed to record timeline of task {task_id}"))
    }
}
