//! Document store boundary.
//!
//! Documents are JSON objects grouped into named collections. The identifier
//! is assigned by the store on insert and kept outside the document body.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::{Error, Result};

pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// Store-assigned document identifier.
pub type DocumentId = Uuid;

/// JSON object body of a document.
pub type DocumentBody = Map<String, Value>;

/// Top-level field equality filter. An empty filter matches everything.
pub type Filter = Map<String, Value>;

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub body: DocumentBody,
}

/// Parse a client-supplied identifier.
pub fn parse_document_id(raw: &str) -> Result<DocumentId> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::InvalidIdentifier("Invalid calendar id".to_string()))
}

/// Operations the calendar backend needs from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Database name reported by diagnostics.
    fn name(&self) -> &str;

    /// Insert a new document and return its assigned identifier.
    async fn insert(&self, collection: &str, document: DocumentBody) -> Result<DocumentId>;

    /// Documents matching `filter`, in insertion order. `limit == 0` means no limit.
    async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Document>>;

    /// Single document by identifier.
    async fn find_one(&self, collection: &str, id: DocumentId) -> Result<Option<Document>>;

    /// Overwrite the given top-level fields of a document, leaving the rest.
    ///
    /// Returns `false` when no document has that identifier.
    async fn set_fields(&self, collection: &str, id: DocumentId, fields: DocumentBody) -> Result<bool>;

    /// Names of the collections holding at least one document.
    async fn collection_names(&self) -> Result<Vec<String>>;
}

/// Handle to the document store, injected into services.
///
/// An unavailable store is a normal state: requests that need it fail with
/// `StoreUnavailable` while the rest of the API keeps working.
#[derive(Clone)]
pub enum Store {
    Available(Arc<dyn DocumentStore>),
    Unavailable { reason: String },
}

impl Store {
    pub fn available(store: impl DocumentStore + 'static) -> Self {
        Store::Available(Arc::new(store))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Store::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Store::Available(_))
    }

    /// The connected client, or `StoreUnavailable`.
    pub fn client(&self) -> Result<&dyn DocumentStore> {
        match self {
            Store::Available(store) => Ok(store.as_ref()),
            Store::Unavailable { reason } => Err(Error::StoreUnavailable(reason.clone())),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Available(store) => f.debug_tuple("Available").field(&store.name()).finish(),
            Store::Unavailable { reason } => f.debug_struct("Unavailable").field("reason", reason).finish(),
        }
    }
}

/// Whether `body` has every field of `filter` with an equal value.
pub(crate) fn matches_filter(body: &DocumentBody, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| body.get(key) == Some(expected))
}
