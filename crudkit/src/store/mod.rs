// Backing-collection abstraction: a minimal document store interface with
// flat equality filtering. The model layer delegates all synchronization to
// the backend; no locking happens above this seam.

mod id;
mod memory;

pub use id::{DocumentId, IdStrategy};
pub use memory::MemoryBackend;

use crate::error::Result;
use serde_json::{Map, Value};

/// The key/value payload of a document, excluding its identifier.
pub type Fields = Map<String, Value>;

/// A stored document: system identifier plus schema fields.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: DocumentId,
    pub fields: Fields,
}

/// A flat equality filter. No ranges, no ordering, no logical OR.
///
/// `excluding` supports the uniqueness check during an in-place update: the
/// document being updated must not count as a conflict with itself.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
    id: Option<DocumentId>,
    exclude_id: Option<DocumentId>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// Require the document identifier to match.
    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.id = Some(id);
        self
    }

    /// Exclude the document with this identifier from matches.
    pub fn excluding(mut self, id: DocumentId) -> Self {
        self.exclude_id = Some(id);
        self
    }

    /// Whether a document satisfies every clause of this filter.
    pub fn matches(&self, doc: &RawDocument) -> bool {
        if let Some(id) = &self.id {
            if doc.id != *id {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_id {
            if doc.id == *excluded {
                return false;
            }
        }
        self.clauses
            .iter()
            .all(|(field, value)| doc.fields.get(field) == Some(value))
    }
}

/// A document store backend. Implementations must support safe concurrent
/// reads and writes; they are the single shared mutable resource.
pub trait Backend: Send + Sync {
    /// All documents matching the filter, in insertion order.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<RawDocument>>;

    /// Number of documents matching the filter.
    fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Insert a new document and return its generated identifier.
    fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId>;

    /// Merge-update: only the supplied keys change, all others keep their
    /// prior values.
    fn update_one(&self, collection: &str, id: &DocumentId, fields: Fields) -> Result<()>;

    /// Remove a document.
    fn delete_one(&self, collection: &str, id: &DocumentId) -> Result<()>;

    /// The identifier strategy this backend generates and accepts.
    fn id_strategy(&self) -> IdStrategy;
}

/// A handle to one collection within a backend.
pub struct Collection<'a> {
    backend: &'a dyn Backend,
    name: &'a str,
}

impl<'a> Collection<'a> {
    pub fn new(backend: &'a dyn Backend, name: &'a str) -> Self {
        Collection { backend, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn find(&self, filter: &Filter) -> Result<Vec<RawDocument>> {
        self.backend.find(self.name, filter)
    }

    pub fn count(&self, filter: &Filter) -> Result<u64> {
        self.backend.count(self.name, filter)
    }

    pub fn insert(&self, fields: Fields) -> Result<DocumentId> {
        self.backend.insert(self.name, fields)
    }

    pub fn update_one(&self, id: &DocumentId, fields: Fields) -> Result<()> {
        self.backend.update_one(self.name, id, fields)
    }

    pub fn delete_one(&self, id: &DocumentId) -> Result<()> {
        self.backend.delete_one(self.name, id)
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.backend.id_strategy()
    }
}
