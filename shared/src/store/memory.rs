//! In-process document store.
//!
//! Used for local development (`DATABASE_URL=memory://`) and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{matches_filter, Document, DocumentBody, DocumentId, DocumentStore, Filter};
use crate::Result;

/// Document store backed by a map of collections kept in insertion order.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    name: String,
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, collection: &str, document: DocumentBody) -> Result<DocumentId> {
        let id = Uuid::new_v4();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Document { id, body: document });
        Ok(id)
    }

    async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let limit = if limit == 0 { usize::MAX } else { limit };
        Ok(documents
            .iter()
            .filter(|doc| matches_filter(&doc.body, filter))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_one(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn set_fields(&self, collection: &str, id: DocumentId, fields: DocumentBody) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|doc| doc.id == id))
        else {
            return Ok(false);
        };

        document.body.extend(fields);
        Ok(true)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn body(value: Value) -> DocumentBody {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_find_keeps_insertion_order_and_limit() {
        let store = MemoryDocumentStore::default();
        for n in 0..5 {
            store.insert("calendar", body(json!({"n": n}))).await.unwrap();
        }

        let all = store.find("calendar", &Filter::new(), 0).await.unwrap();
        let ns: Vec<i64> = all.iter().map(|d| d.body["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);

        let limited = store.find("calendar", &Filter::new(), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].body["n"], 0);
    }

    #[tokio::test]
    async fn test_find_with_filter() {
        let store = MemoryDocumentStore::default();
        store.insert("calendar", body(json!({"owner": "ana"}))).await.unwrap();
        store.insert("calendar", body(json!({"owner": "bo"}))).await.unwrap();

        let found = store
            .find("calendar", &body(json!({"owner": "bo"})), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body["owner"], "bo");
    }

    #[tokio::test]
    async fn test_set_fields_merges_top_level() {
        let store = MemoryDocumentStore::default();
        let id = store
            .insert("calendar", body(json!({"title": "t", "pages": []})))
            .await
            .unwrap();

        let updated = store
            .set_fields("calendar", id, body(json!({"pages": [{"month": 1}]})))
            .await
            .unwrap();
        assert!(updated);

        let doc = store.find_one("calendar", id).await.unwrap().unwrap();
        assert_eq!(doc.body["title"], "t");
        assert_eq!(doc.body["pages"], json!([{"month": 1}]));
    }

    #[tokio::test]
    async fn test_missing_documents() {
        let store = MemoryDocumentStore::default();
        let id = Uuid::new_v4();
        assert!(store.find_one("calendar", id).await.unwrap().is_none());
        assert!(!store.set_fields("calendar", id, DocumentBody::new()).await.unwrap());
        assert!(store.collection_names().await.unwrap().is_empty());
    }
}
