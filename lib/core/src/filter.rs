// Document filters applied by catalog reads
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::Document;

pub trait Filter {
    fn matches(&self, doc: &Document) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCondition {
    Exists { field: String },
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    GreaterThan { field: String, value: f64 },
    LessThan { field: String, value: f64 },
    Contains { field: String, value: String },
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl FilterCondition {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterCondition::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    fn field_value<'a>(doc: &'a Document, field: &str) -> Option<&'a Value> {
        doc.get(field.strip_prefix('.').unwrap_or(field))
    }

    fn number(doc: &Document, field: &str) -> Option<f64> {
        Self::field_value(doc, field).and_then(Value::as_f64)
    }
}

impl Filter for FilterCondition {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            FilterCondition::Exists { field } => {
                !matches!(Self::field_value(doc, field), None | Some(Value::Null))
            }
            FilterCondition::Equals { field, value } => {
                Self::field_value(doc, field).map_or(false, |v| v == value)
            }
            FilterCondition::NotEquals { field, value } => {
                Self::field_value(doc, field).map_or(true, |v| v != value)
            }
            FilterCondition::GreaterThan { field, value } => {
                Self::number(doc, field).map_or(false, |v| v > *value)
            }
            FilterCondition::LessThan { field, value } => {
                Self::number(doc, field).map_or(false, |v| v < *value)
            }
            FilterCondition::Contains { field, value } => Self::field_value(doc, field)
                .and_then(Value::as_str)
                .map_or(false, |v| v.contains(value.as_str())),
            FilterCondition::And(conditions) => conditions.iter().all(|c| c.matches(doc)),
            FilterCondition::Or(conditions) => conditions.iter().any(|c| c.matches(doc)),
            FilterCondition::Not(condition) => !condition.matches(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::new(
            "1",
            json!({"concept_A": "AVHRR", "weight": 0.7, "title": "Sea surface temperature"}),
        )
    }

    #[test]
    fn test_equals_and_exists() {
        assert!(FilterCondition::equals("concept_A", "AVHRR").matches(&doc()));
        assert!(!FilterCondition::equals("concept_A", "MODIS").matches(&doc()));
        assert!(FilterCondition::Exists { field: "weight".into() }.matches(&doc()));
        assert!(!FilterCondition::Exists { field: "missing".into() }.matches(&doc()));
    }

    #[test]
    fn test_range_and_contains() {
        let gt = FilterCondition::GreaterThan { field: "weight".into(), value: 0.5 };
        let lt = FilterCondition::LessThan { field: "weight".into(), value: 0.5 };
        let contains = FilterCondition::Contains { field: "title".into(), value: "surface".into() };
        assert!(gt.matches(&doc()));
        assert!(!lt.matches(&doc()));
        assert!(contains.matches(&doc()));
    }

    #[test]
    fn test_boolean_combinators() {
        let cond = FilterCondition::And(vec![
            FilterCondition::equals("concept_A", "AVHRR"),
            FilterCondition::Not(Box::new(FilterCondition::Exists { field: "missing".into() })),
        ]);
        assert!(cond.matches(&doc()));

        let either = FilterCondition::Or(vec![
            FilterCondition::equals("concept_A", "MODIS"),
            FilterCondition::NotEquals { field: "missing".into(), value: json!(1) },
        ]);
        assert!(either.matches(&doc()));
    }

    #[test]
    fn test_deserialize_from_config() {
        let cond: FilterCondition =
            serde_json::from_value(json!({"equals": {"field": "concept_A", "value": "AVHRR"}})).unwrap();
        assert!(cond.matches(&doc()));
    }
}
