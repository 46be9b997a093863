use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::{Error, Result};

/// A relation in the catalog: an index plus the record type stored in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationRef {
    pub index: String,
    pub kind: String,
}

impl RelationRef {
    pub fn new(index: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for RelationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index, self.kind)
    }
}

/// A stored document: catalog-assigned id plus its JSON source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: Value,
}

impl Document {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    #[inline]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source.get(field)
    }
}

/// Field type used when declaring an output relation's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Exact-match string, never tokenized
    Keyword,
    Text,
    Double,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Keyword)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Double)
    }
}

/// One catalog record as seen by the similarity engine.
///
/// Read-only for the duration of a run. Feature values are kept as raw JSON;
/// the feature model decides how to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl MetadataRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a record from a catalog document, taking the identifier from `id_field`.
    ///
    /// String and integer identifiers are accepted; anything else is rejected.
    pub fn from_document(doc: &Document, id_field: &str) -> Result<Self> {
        let fields = match &doc.source {
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::RecordSerialization(format!(
                    "document {} is not an object: {}",
                    doc.id, other
                )))
            }
        };

        let id = match fields.get(id_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            _ => {
                return Err(Error::RecordSerialization(format!(
                    "document {} has no usable '{}' identifier",
                    doc.id, id_field
                )))
            }
        };

        Ok(Self { id, fields })
    }

    /// Feature value, treating an explicit `null` as absent.
    #[inline]
    pub fn value(&self, feature: &str) -> Option<&Value> {
        match self.fields.get(feature) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_document() {
        let doc = Document::new("doc-1", json!({"ShortName": "AVHRR_L4", "level": "4"}));
        let record = MetadataRecord::from_document(&doc, "ShortName").unwrap();
        assert_eq!(record.id, "AVHRR_L4");
        assert_eq!(record.value("level"), Some(&json!("4")));
    }

    #[test]
    fn test_integer_identifier() {
        let doc = Document::new("doc-1", json!({"id": 42}));
        let record = MetadataRecord::from_document(&doc, "id").unwrap();
        assert_eq!(record.id, "42");
    }

    #[test]
    fn test_missing_identifier_rejected() {
        let doc = Document::new("doc-1", json!({"level": "4"}));
        assert!(matches!(
            MetadataRecord::from_document(&doc, "ShortName"),
            Err(Error::RecordSerialization(_))
        ));

        let not_object = Document::new("doc-2", json!([1, 2]));
        assert!(MetadataRecord::from_document(&not_object, "ShortName").is_err());
    }

    #[test]
    fn test_null_value_is_missing() {
        let doc = Document::new("d", json!({"id": "a", "sensor": null}));
        let record = MetadataRecord::from_document(&doc, "id").unwrap();
        assert!(record.value("sensor").is_none());
        assert!(record.value("absent").is_none());
    }

    #[test]
    fn test_relation_display() {
        let relation = RelationRef::new("mudrod", "MetadataSim");
        assert_eq!(relation.to_string(), "mudrod/MetadataSim");
    }
}
