//! Mapping between provider collections and local projects.

use std::collections::HashMap;

use anyhow::Result;
use log::{info, warn};

use super::result::SyncWarning;
use crate::entities::project;
use crate::provider::{ExternalList, Provider, ProviderError};
use crate::storage::ProjectStore;

fn cache_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolves collection names to local projects for one import pass.
pub struct ListMapper<'a> {
    projects: &'a dyn ProjectStore,
    user_id: i64,
    source: &'a str,
    fallback_name: &'a str,
    cache: HashMap<String, project::Model>,
    warnings: Vec<SyncWarning>,
}

impl<'a> ListMapper<'a> {
    pub fn new(projects: &'a dyn ProjectStore, user_id: i64, source: &'a str, fallback_name: &'a str) -> Self {
        Self {
            projects,
            user_id,
            source,
            fallback_name,
            cache: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// The local project for a collection, created on first sight.
    ///
    /// Matching ignores case. When several projects match, the earliest
    /// created one wins and a [`SyncWarning::MappingAmbiguity`] is kept.
    pub async fn resolve_project(&mut self, collection_name: &str) -> Result<project::Model> {
        let name = match collection_name.trim() {
            "" => self.fallback_name,
            trimmed => trimmed,
        };
        let key = cache_key(name);
        if let Some(project) = self.cache.get(&key) {
            return Ok(project.clone());
        }

        let mut matches = self.projects.find_by_name_case_insensitive(self.user_id, name).await?;
        let project = if matches.is_empty() {
            let created = self.projects.create(self.user_id, name, Some(self.source)).await?;
            info!("Created project '{}' ({}) for collection '{name}'", created.name, created.id);
            created
        } else {
            matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            let candidates = matches.len();
            let chosen = matches.swap_remove(0);
            if candidates > 1 {
                warn!(
                    "Collection '{name}' matches {candidates} projects of user {}; using project {}",
                    self.user_id, chosen.id
                );
                self.warnings.push(SyncWarning::MappingAmbiguity {
                    collection: name.to_string(),
                    chosen_project_id: chosen.id,
                    candidates,
                });
            }
            chosen
        };

        self.cache.insert(key, project.clone());
        Ok(project)
    }

    pub fn take_warnings(&mut self) -> Vec<SyncWarning> {
        std::mem::take(&mut self.warnings)
    }
}

/// Resolves project names to provider collections for one export pass,
/// creating collections that do not exist yet.
pub struct CollectionResolver {
    by_name: HashMap<String, ExternalList>,
}

impl CollectionResolver {
    /// Seed with the collections enumerated at the start of the pass. The
    /// first collection wins when names collide.
    pub fn new(lists: &[ExternalList]) -> Self {
        let mut by_name = HashMap::new();
        for list in lists {
            by_name
                .entry(cache_key(&list.display_name))
                .or_insert_with(|| list.clone());
        }
        Self { by_name }
    }

    pub fn display_name(&self, list_id: &str) -> Option<&str> {
        self.by_name
            .values()
            .find(|l| l.id == list_id)
            .map(|l| l.display_name.as_str())
    }

    pub async fn resolve(&mut self, provider: &dyn Provider, token: &str, name: &str) -> Result<ExternalList, ProviderError> {
        let key = cache_key(name);
        if let Some(list) = self.by_name.get(&key) {
            return Ok(list.clone());
        }

        let created = provider.create_list(token, name.trim()).await?;
        info!("Created collection '{}' ({})", created.display_name, created.id);
        self.by_name.insert(key, created.clone());
        Ok(created)
    }
}
