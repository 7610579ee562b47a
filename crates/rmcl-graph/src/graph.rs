use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rmcl_api::ApiClient;
use rmcl_cache::{DataCache, DocumentCache};
use rmcl_core::domain::{MODE_ID, ROOT_ID, TRASH_ID};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::GraphError;
use crate::item::Item;

/// How long a refresh stays valid before the next `get_by_id` triggers another.
const FILE_LIST_VALIDITY: Duration = Duration::minutes(5);

/// The item graph: a flat id-keyed map plus the single-flight refresh
/// protocol that keeps it in sync with the remote document list.
pub struct ItemGraph {
    by_id: DashMap<String, Arc<Item>>,
    refresh_deadline: Mutex<Option<DateTime<Utc>>>,
    update_lock: Mutex<()>,
    api: Arc<ApiClient>,
    data_cache: Arc<DataCache>,
    document_cache: Arc<DocumentCache>,
}

impl ItemGraph {
    /// Builds a graph preinserted with root, trash, and the mode file
    /// singleton. No refresh has run yet; the first `get_by_id`
    /// call triggers one.
    pub fn new(
        api: Arc<ApiClient>,
        data_cache: Arc<DataCache>,
        document_cache: Arc<DocumentCache>,
    ) -> Self {
        let by_id = DashMap::new();
        by_id.insert(ROOT_ID.to_string(), Arc::new(Item::new_root()));
        by_id.insert(TRASH_ID.to_string(), Arc::new(Item::new_trash()));
        by_id.insert(MODE_ID.to_string(), Arc::new(Item::new_mode_file()));

        ItemGraph {
            by_id,
            refresh_deadline: Mutex::new(None),
            update_lock: Mutex::new(()),
            api,
            data_cache,
            document_cache,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn data_cache(&self) -> &DataCache {
        &self.data_cache
    }

    pub fn document_cache(&self) -> &DocumentCache {
        &self.document_cache
    }

    /// Forces the next `get_by_id` to refresh, regardless of the current
    /// deadline. Used by the mode file's `refresh` command.
    ///
    /// Sets the deadline to an already-expired instant rather than clearing
    /// it to absent — externally
    /// indistinguishable from "never refreshed" for triggering purposes.
    pub async fn invalidate_deadline(&self) {
        *self.refresh_deadline.lock().await = Some(rmcl_core::time::now() - Duration::seconds(1));
    }

    /// Looks up an item by id, refreshing first if the deadline is absent
    /// or has passed.
    pub async fn get_by_id(&self, id: &str) -> Result<Arc<Item>, GraphError> {
        self.ensure_fresh().await?;
        self.by_id
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }

    /// A snapshot of every currently-known item. Used by `readdir`.
    pub async fn children_of(&self, id: &str) -> Result<Vec<Arc<Item>>, GraphError> {
        let parent = self.get_by_id(id).await?;
        let ids = parent.children();
        Ok(ids
            .into_iter()
            .filter_map(|child_id| self.by_id.get(&child_id).map(|e| Arc::clone(e.value())))
            .collect())
    }

    async fn ensure_fresh(&self) -> Result<(), GraphError> {
        if let Some(deadline) = *self.refresh_deadline.lock().await {
            if deadline > rmcl_core::time::now() {
                return Ok(());
            }
        }

        let _guard = self.update_lock.lock().await;
        // Re-check after acquiring: another task may have just refreshed.
        if let Some(deadline) = *self.refresh_deadline.lock().await {
            if deadline > rmcl_core::time::now() {
                return Ok(());
            }
        }

        self.refresh().await
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(), GraphError> {
        let metadata = self.api.update_items().await?;

        let mut old_ids: HashSet<String> = self
            .by_id
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| id != ROOT_ID && id != TRASH_ID && id != MODE_ID)
            .collect();

        if let Some(root) = self.by_id.get(ROOT_ID) {
            root.clear_children();
        }
        if let Some(trash) = self.by_id.get(TRASH_ID) {
            trash.clear_children();
        }

        for entry in metadata {
            let id = entry.id.clone();
            let version = entry.version;
            old_ids.remove(&id);

            let needs_replace = match self.by_id.get(&id) {
                None => true,
                Some(existing) => existing.version() != Some(version),
            };

            if needs_replace {
                self.by_id.insert(id, Arc::new(Item::from_metadata(entry)));
            } else if let Some(existing) = self.by_id.get(&id) {
                existing.clear_children();
            }
        }

        for id in &old_ids {
            self.by_id.remove(id);
        }

        let all_ids: Vec<String> = self.by_id.iter().map(|e| e.key().clone()).collect();
        for id in all_ids {
            let Some(item) = self.by_id.get(&id).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            if let Some(parent_id) = item.parent() {
                if let Some(parent) = self.by_id.get(parent_id) {
                    parent.push_child(id);
                }
            }
        }

        *self.refresh_deadline.lock().await = Some(rmcl_core::time::now() + FILE_LIST_VALIDITY);
        tracing::debug!(count = self.by_id.len(), "refreshed item graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcl_core::config::Config;
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn graph_against(server: &MockServer) -> ItemGraph {
        let config = Config {
            devicetoken: Some("device".to_string()),
            usertoken: Some("user".to_string()),
            extra: Default::default(),
        };
        let api = ApiClient::with_base_url(config, PathBuf::from("/tmp/rmcl-test.json"), server.uri());
        let pool = rmcl_cache::DatabasePool::in_memory().await.unwrap();
        ItemGraph::new(
            Arc::new(api),
            Arc::new(DataCache::new(pool)),
            Arc::new(DocumentCache::new()),
        )
    }

    fn doc_entry(id: &str, parent: &str, version: i64) -> serde_json::Value {
        json!({
            "ID": id,
            "Version": version,
            "Type": "DocumentType",
            "VissibleName": format!("doc-{id}"),
            "Parent": parent,
            "ModifiedClient": "2026-01-02T03:04:05Z",
        })
    }

    #[tokio::test]
    async fn preinserts_root_trash_and_mode_file() {
        let server = MockServer::start().await;
        let graph = graph_against(&server).await;
        assert_eq!(graph.by_id.len(), 3);
        assert!(graph.by_id.contains_key(ROOT_ID));
        assert!(graph.by_id.contains_key(TRASH_ID));
        assert!(graph.by_id.contains_key(MODE_ID));
    }

    #[tokio::test]
    async fn refresh_populates_children_of_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-storage/json/2/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![doc_entry("a", "", 1)]))
            .mount(&server)
            .await;

        let graph = graph_against(&server).await;
        let root = graph.get_by_id(ROOT_ID).await.unwrap();
        assert_eq!(root.children(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn second_call_within_validity_window_does_not_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-storage/json/2/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![doc_entry("a", "", 1)]))
            .expect(1)
            .mount(&server)
            .await;

        let graph = graph_against(&server).await;
        graph.get_by_id(ROOT_ID).await.unwrap();
        graph.get_by_id(ROOT_ID).await.unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn removed_remote_entries_are_deleted_on_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-storage/json/2/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![doc_entry("a", "", 1)]))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/document-storage/json/2/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
            .mount(&server)
            .await;

        let graph = graph_against(&server).await;
        graph.get_by_id("a").await.unwrap();
        graph.invalidate_deadline().await;
        let result = graph.get_by_id("a").await;
        assert!(matches!(result, Err(GraphError::NotFound(_))));
    }
}
