//! The catalog contract consumed by the similarity engine.
//!
//! A gateway stores JSON documents in named relations and offers cursor-based
//! reads, batched writes and an explicit visibility barrier. Writes are not
//! guaranteed to be readable until [`CatalogGateway::make_visible`] returns.

use featsim_core::{Document, FieldSpec, FilterCondition, RelationRef, Result};
use serde_json::Value;

/// Opaque position in a paginated read: the id of the last document returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub String);

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub documents: Vec<Document>,
    /// `None` once the relation is exhausted
    pub next: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    /// Insert (or replace) a document. A missing id is generated by the catalog.
    Index {
        relation: RelationRef,
        id: Option<String>,
        source: Value,
    },
    /// Set a single field on an existing document, leaving the rest untouched.
    Update {
        relation: RelationRef,
        id: String,
        field: String,
        value: Value,
    },
}

impl BulkOp {
    pub fn relation(&self) -> &RelationRef {
        match self {
            BulkOp::Index { relation, .. } | BulkOp::Update { relation, .. } => relation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    /// Position of the op inside the batch
    pub position: usize,
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub written: usize,
    pub failures: Vec<BulkItemFailure>,
}

pub trait CatalogGateway: Send + Sync {
    /// Declare the field layout of a relation. Idempotent.
    fn declare_schema(&self, relation: &RelationRef, fields: &[FieldSpec]) -> Result<()>;

    fn schema(&self, relation: &RelationRef) -> Result<Option<Vec<FieldSpec>>>;

    /// Drop a relation with all of its documents. Returns whether it existed.
    fn delete_relation(&self, relation: &RelationRef) -> Result<bool>;

    /// Read up to `page_size` visible documents after `after`, in id order.
    fn read_page(
        &self,
        relation: &RelationRef,
        filter: Option<&FilterCondition>,
        after: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page>;

    /// Apply a batch of writes. Item-level problems are reported in the
    /// response; `Err` means the batch as a whole was not applied.
    fn bulk_write(&self, ops: &[BulkOp]) -> Result<BulkResponse>;

    /// Barrier: once this returns, reads observe every acknowledged write.
    fn make_visible(&self, relation: &RelationRef) -> Result<()>;

    /// Exhaust the cursor and return every matching document.
    fn read_all(
        &self,
        relation: &RelationRef,
        filter: Option<&FilterCondition>,
        page_size: usize,
    ) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = self.read_page(relation, filter, cursor.as_ref(), page_size)?;
            documents.extend(page.documents);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(documents)
    }
}

pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Set `field` on an object document.
pub(crate) fn apply_update(
    source: &mut Value,
    field: &str,
    value: &Value,
) -> std::result::Result<(), String> {
    match source {
        Value::Object(map) => {
            map.insert(field.to_string(), value.clone());
            Ok(())
        }
        _ => Err("document is not an object".to_string()),
    }
}
