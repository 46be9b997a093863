// LMDB-backed catalog for persistent runs
use anyhow::Result;
use featsim_core::{Document, Error, FieldSpec, Filter, FilterCondition, RelationRef};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RwTxn};
use serde_json::Value;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use crate::gateway::{
    apply_update, generate_id, BulkItemFailure, BulkOp, BulkResponse, CatalogGateway, Cursor, Page,
};

const DB_RELATIONS: &str = "relations";
const DB_DOCUMENTS: &str = "documents";

/// Separates the relation from the document id inside a key. Keys of one
/// relation are therefore contiguous and ordered by id.
const KEY_SEPARATOR: char = '\u{0}';

pub struct LmdbCatalog {
    env: Arc<Env>,
    relations_db: Database<Str, Bytes>,
    documents_db: Database<Str, Bytes>,
}

/// Length-prefixed so that no two (index, kind) pairs share a key,
/// whatever characters the names contain.
fn relation_key(relation: &RelationRef) -> String {
    format!(
        "{}:{}{}:{}",
        relation.index.len(),
        relation.index,
        relation.kind.len(),
        relation.kind
    )
}

fn relation_prefix(relation: &RelationRef) -> String {
    format!("{}{}", relation_key(relation), KEY_SEPARATOR)
}

fn document_key(relation: &RelationRef, id: &str) -> String {
    format!("{}{}", relation_prefix(relation), id)
}

fn store_error(e: anyhow::Error) -> Error {
    Error::Store(e.to_string())
}

impl LmdbCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(10 * 1024 * 1024 * 1024) // 10GB
                .max_dbs(4)
                .open(path)?
        });

        let mut wtxn = env.write_txn()?;
        let relations_db = env.create_database(&mut wtxn, Some(DB_RELATIONS))?;
        let documents_db = env.create_database(&mut wtxn, Some(DB_DOCUMENTS))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            relations_db,
            documents_db,
        })
    }

    fn ensure_relation(&self, wtxn: &mut RwTxn, relation: &RelationRef) -> Result<()> {
        let name = relation_key(relation);
        if self.relations_db.get(wtxn, &name)?.is_none() {
            self.relations_db.put(wtxn, &name, b"null")?;
        }
        Ok(())
    }

    fn relation_exists(&self, relation: &RelationRef) -> Result<bool> {
        let rtxn = self.env.read_txn()?;
        Ok(self.relations_db.get(&rtxn, &relation_key(relation))?.is_some())
    }

    fn declare_schema_inner(&self, relation: &RelationRef, fields: &[FieldSpec]) -> Result<()> {
        let data = serde_json::to_vec(fields)?;
        let mut wtxn = self.env.write_txn()?;
        self.relations_db.put(&mut wtxn, &relation_key(relation), &data)?;
        wtxn.commit()?;
        Ok(())
    }

    fn schema_inner(&self, relation: &RelationRef) -> Result<Option<Vec<FieldSpec>>> {
        let rtxn = self.env.read_txn()?;
        match self.relations_db.get(&rtxn, &relation_key(relation))? {
            Some(data) => Ok(serde_json::from_slice::<Option<Vec<FieldSpec>>>(data)?),
            None => Ok(None),
        }
    }

    fn delete_relation_inner(&self, relation: &RelationRef) -> Result<bool> {
        let prefix = relation_prefix(relation);
        let mut wtxn = self.env.write_txn()?;

        let mut keys = Vec::new();
        for item in self.documents_db.prefix_iter(&wtxn, &prefix)? {
            let (key, _) = item?;
            keys.push(key.to_string());
        }
        for key in &keys {
            self.documents_db.delete(&mut wtxn, key)?;
        }

        let existed = self.relations_db.delete(&mut wtxn, &relation_key(relation))?;
        wtxn.commit()?;
        Ok(existed || !keys.is_empty())
    }

    fn read_page_inner(
        &self,
        relation: &RelationRef,
        filter: Option<&FilterCondition>,
        after: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page> {
        let prefix = relation_prefix(relation);
        let start = match after {
            Some(cursor) => document_key(relation, &cursor.0),
            None => prefix.clone(),
        };
        let lower = if after.is_some() {
            Bound::Excluded(start.as_str())
        } else {
            Bound::Included(start.as_str())
        };
        let range = (lower, Bound::Unbounded);

        let rtxn = self.env.read_txn()?;
        let mut documents = Vec::new();
        let mut more = false;
        for item in self.documents_db.range(&rtxn, &range)? {
            let (key, data) = item?;
            let Some(id) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            let doc = Document::new(id, serde_json::from_slice::<Value>(data)?);
            if filter.map_or(true, |f| f.matches(&doc)) {
                if documents.len() == page_size {
                    more = true;
                    break;
                }
                documents.push(doc);
            }
        }

        let next = if more {
            documents.last().map(|doc: &Document| Cursor(doc.id.clone()))
        } else {
            None
        };
        Ok(Page { documents, next })
    }

    fn bulk_write_inner(&self, ops: &[BulkOp]) -> Result<BulkResponse> {
        let mut wtxn = self.env.write_txn()?;
        let mut response = BulkResponse::default();

        for (position, op) in ops.iter().enumerate() {
            match op {
                BulkOp::Index { relation, id, source } => {
                    self.ensure_relation(&mut wtxn, relation)?;
                    let id = id.clone().unwrap_or_else(generate_id);
                    let data = serde_json::to_vec(source)?;
                    self.documents_db.put(&mut wtxn, &document_key(relation, &id), &data)?;
                    response.written += 1;
                }
                BulkOp::Update { relation, id, field, value } => {
                    let key = document_key(relation, id);
                    let current = match self.documents_db.get(&wtxn, &key)? {
                        Some(data) => Some(serde_json::from_slice::<Value>(data)?),
                        None => None,
                    };
                    let outcome = match current {
                        Some(mut doc) => apply_update(&mut doc, field, value).map(|_| doc),
                        None => Err("document missing".to_string()),
                    };
                    match outcome {
                        Ok(doc) => {
                            let data = serde_json::to_vec(&doc)?;
                            self.documents_db.put(&mut wtxn, &key, &data)?;
                            response.written += 1;
                        }
                        Err(reason) => response.failures.push(BulkItemFailure {
                            position,
                            id: Some(id.clone()),
                            reason,
                        }),
                    }
                }
            }
        }

        wtxn.commit()?;
        Ok(response)
    }
}

impl CatalogGateway for LmdbCatalog {
    fn declare_schema(&self, relation: &RelationRef, fields: &[FieldSpec]) -> featsim_core::Result<()> {
        self.declare_schema_inner(relation, fields).map_err(store_error)
    }

    fn schema(&self, relation: &RelationRef) -> featsim_core::Result<Option<Vec<FieldSpec>>> {
        self.schema_inner(relation).map_err(store_error)
    }

    fn delete_relation(&self, relation: &RelationRef) -> featsim_core::Result<bool> {
        self.delete_relation_inner(relation).map_err(store_error)
    }

    fn read_page(
        &self,
        relation: &RelationRef,
        filter: Option<&FilterCondition>,
        after: Option<&Cursor>,
        page_size: usize,
    ) -> featsim_core::Result<Page> {
        if !self.relation_exists(relation).map_err(store_error)? {
            return Err(Error::RelationNotFound(relation.to_string()));
        }
        self.read_page_inner(relation, filter, after, page_size)
            .map_err(store_error)
    }

    fn bulk_write(&self, ops: &[BulkOp]) -> featsim_core::Result<BulkResponse> {
        self.bulk_write_inner(ops).map_err(store_error)
    }

    fn make_visible(&self, _relation: &RelationRef) -> featsim_core::Result<()> {
        // committed transactions are already readable; force them to disk
        self.env
            .force_sync()
            .map_err(|e| Error::Store(e.to_string()))
    }
}
