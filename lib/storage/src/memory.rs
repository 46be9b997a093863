// In-memory catalog with refresh semantics: writes are staged per relation and
// only become readable after make_visible.
use ahash::AHashMap;
use featsim_core::{Document, Error, FieldSpec, Filter, FilterCondition, RelationRef, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use crate::gateway::{
    apply_update, generate_id, BulkItemFailure, BulkOp, BulkResponse, CatalogGateway, Cursor, Page,
};

#[derive(Debug, Default)]
struct RelationData {
    schema: Option<Vec<FieldSpec>>,
    visible: BTreeMap<String, Value>,
    staged: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    relations: RwLock<AHashMap<RelationRef, RelationData>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently readable in `relation`.
    pub fn visible_count(&self, relation: &RelationRef) -> usize {
        self.relations
            .read()
            .get(relation)
            .map_or(0, |data| data.visible.len())
    }

    /// Number of acknowledged writes not yet made visible.
    pub fn staged_count(&self, relation: &RelationRef) -> usize {
        self.relations
            .read()
            .get(relation)
            .map_or(0, |data| data.staged.len())
    }
}

impl CatalogGateway for MemoryCatalog {
    fn declare_schema(&self, relation: &RelationRef, fields: &[FieldSpec]) -> Result<()> {
        let mut relations = self.relations.write();
        relations.entry(relation.clone()).or_default().schema = Some(fields.to_vec());
        Ok(())
    }

    fn schema(&self, relation: &RelationRef) -> Result<Option<Vec<FieldSpec>>> {
        Ok(self
            .relations
            .read()
            .get(relation)
            .and_then(|data| data.schema.clone()))
    }

    fn delete_relation(&self, relation: &RelationRef) -> Result<bool> {
        Ok(self.relations.write().remove(relation).is_some())
    }

    fn read_page(
        &self,
        relation: &RelationRef,
        filter: Option<&FilterCondition>,
        after: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page> {
        let relations = self.relations.read();
        let data = relations
            .get(relation)
            .ok_or_else(|| Error::RelationNotFound(relation.to_string()))?;

        let lower = match after {
            Some(cursor) => Bound::Excluded(cursor.0.clone()),
            None => Bound::Unbounded,
        };

        let mut documents = Vec::with_capacity(page_size.min(data.visible.len()));
        let mut more = false;
        for (id, source) in data.visible.range((lower, Bound::Unbounded)) {
            let doc = Document::new(id.clone(), source.clone());
            if filter.map_or(true, |f| f.matches(&doc)) {
                if documents.len() == page_size {
                    more = true;
                    break;
                }
                documents.push(doc);
            }
        }

        let next = if more {
            documents.last().map(|doc| Cursor(doc.id.clone()))
        } else {
            None
        };
        Ok(Page { documents, next })
    }

    fn bulk_write(&self, ops: &[BulkOp]) -> Result<BulkResponse> {
        let mut relations = self.relations.write();
        let mut response = BulkResponse::default();

        for (position, op) in ops.iter().enumerate() {
            match op {
                BulkOp::Index { relation, id, source } => {
                    let id = id.clone().unwrap_or_else(generate_id);
                    relations
                        .entry(relation.clone())
                        .or_default()
                        .staged
                        .insert(id, source.clone());
                    response.written += 1;
                }
                BulkOp::Update { relation, id, field, value } => {
                    let Some(data) = relations.get_mut(relation) else {
                        response.failures.push(BulkItemFailure {
                            position,
                            id: Some(id.clone()),
                            reason: format!("relation {} not found", relation),
                        });
                        continue;
                    };

                    let current = data.staged.get(id).or_else(|| data.visible.get(id)).cloned();
                    let outcome = match current {
                        Some(mut doc) => apply_update(&mut doc, field, value).map(|_| doc),
                        None => Err("document missing".to_string()),
                    };
                    match outcome {
                        Ok(doc) => {
                            data.staged.insert(id.clone(), doc);
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

        Ok(response)
    }

    fn make_visible(&self, relation: &RelationRef) -> Result<()> {
        let mut relations = self.relations.write();
        if let Some(data) = relations.get_mut(relation) {
            let staged = std::mem::take(&mut data.staged);
            data.visible.extend(staged);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relation() -> RelationRef {
        RelationRef::new("mudrod", "RecomMetadata")
    }

    fn index(id: &str, source: Value) -> BulkOp {
        BulkOp::Index {
            relation: relation(),
            id: Some(id.to_string()),
            source,
        }
    }

    #[test]
    fn test_writes_hidden_until_visible() {
        let catalog = MemoryCatalog::new();
        catalog.bulk_write(&[index("a", json!({"x": 1}))]).unwrap();

        assert_eq!(catalog.staged_count(&relation()), 1);
        assert!(catalog.read_all(&relation(), None, 10).unwrap().is_empty());

        catalog.make_visible(&relation()).unwrap();
        let docs = catalog.read_all(&relation(), None, 10).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
    }

    #[test]
    fn test_pagination_exhausts_cursor() {
        let catalog = MemoryCatalog::new();
        let ops: Vec<BulkOp> = (0..25)
            .map(|i| index(&format!("doc{:02}", i), json!({"n": i})))
            .collect();
        catalog.bulk_write(&ops).unwrap();
        catalog.make_visible(&relation()).unwrap();

        let first = catalog.read_page(&relation(), None, None, 10).unwrap();
        assert_eq!(first.documents.len(), 10);
        assert_eq!(first.next, Some(Cursor("doc09".to_string())));

        let all = catalog.read_all(&relation(), None, 10).unwrap();
        assert_eq!(all.len(), 25);

        // exact multiple of the page size terminates without an empty tail page
        let page = catalog.read_page(&relation(), None, Some(&Cursor("doc14".into())), 10).unwrap();
        assert_eq!(page.documents.len(), 10);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_filtered_read() {
        let catalog = MemoryCatalog::new();
        catalog
            .bulk_write(&[
                index("a", json!({"kind": "ocean"})),
                index("b", json!({"kind": "land"})),
                index("c", json!({"kind": "ocean"})),
            ])
            .unwrap();
        catalog.make_visible(&relation()).unwrap();

        let filter = FilterCondition::equals("kind", "ocean");
        let docs = catalog.read_all(&relation(), Some(&filter), 1).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_update_sets_single_field() {
        let catalog = MemoryCatalog::new();
        catalog.bulk_write(&[index("a", json!({"concept_A": "x", "s_Sim": 0.5}))]).unwrap();
        catalog.make_visible(&relation()).unwrap();

        let response = catalog
            .bulk_write(&[
                BulkOp::Update {
                    relation: relation(),
                    id: "a".into(),
                    field: "weight".into(),
                    value: json!(0.25),
                },
                BulkOp::Update {
                    relation: relation(),
                    id: "missing".into(),
                    field: "weight".into(),
                    value: json!(1.0),
                },
            ])
            .unwrap();
        assert_eq!(response.written, 1);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].position, 1);

        catalog.make_visible(&relation()).unwrap();
        let docs = catalog.read_all(&relation(), None, 10).unwrap();
        assert_eq!(docs[0].source, json!({"concept_A": "x", "s_Sim": 0.5, "weight": 0.25}));
    }

    #[test]
    fn test_generated_ids_and_missing_relation() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(
            catalog.read_page(&relation(), None, None, 10),
            Err(Error::RelationNotFound(_))
        ));

        let op = BulkOp::Index { relation: relation(), id: None, source: json!({}) };
        catalog.bulk_write(&[op.clone(), op]).unwrap();
        catalog.make_visible(&relation()).unwrap();
        assert_eq!(catalog.visible_count(&relation()), 2);
    }

    #[test]
    fn test_delete_and_declare() {
        let catalog = MemoryCatalog::new();
        let fields = vec![FieldSpec::keyword("concept_A")];
        catalog.declare_schema(&relation(), &fields).unwrap();
        catalog.declare_schema(&relation(), &fields).unwrap();
        assert_eq!(catalog.schema(&relation()).unwrap(), Some(fields));

        // declared but empty relations are readable
        assert!(catalog.read_all(&relation(), None, 10).unwrap().is_empty());

        assert!(catalog.delete_relation(&relation()).unwrap());
        assert!(!catalog.delete_relation(&relation()).unwrap());
        assert!(catalog.schema(&relation()).unwrap().is_none());
    }
}
