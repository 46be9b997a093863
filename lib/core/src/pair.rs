//! Per-ordered-pair similarity records and their document encoding.
//!
//! A pair document carries the two concept ids, one `<feature>_Sim` field per
//! feature both records supplied, and (after normalization) a single `weight`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use crate::{Error, Result};

pub const CONCEPT_A: &str = "concept_A";
pub const CONCEPT_B: &str = "concept_B";
pub const WEIGHT_FIELD: &str = "weight";
pub const SIM_SUFFIX: &str = "_Sim";

/// Name of the document field holding the similarity of `feature`.
#[inline]
pub fn sim_field(feature: &str) -> String {
    format!("{}{}", feature, SIM_SUFFIX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityPair {
    pub concept_a: String,
    pub concept_b: String,
    /// Per-feature similarity, present only where both records had a value
    pub similarities: BTreeMap<String, f64>,
    /// Aggregate score, attached once by the normalizer
    pub weight: Option<f64>,
}

impl SimilarityPair {
    pub fn new(concept_a: impl Into<String>, concept_b: impl Into<String>) -> Self {
        Self {
            concept_a: concept_a.into(),
            concept_b: concept_b.into(),
            similarities: BTreeMap::new(),
            weight: None,
        }
    }

    #[inline]
    pub fn similarity(&self, feature: &str) -> Option<f64> {
        self.similarities.get(feature).copied()
    }

    pub fn is_self_pair(&self) -> bool {
        self.concept_a == self.concept_b
    }

    /// Encode as a catalog document source.
    pub fn to_source(&self) -> Result<Value> {
        let mut map = Map::new();
        map.insert(CONCEPT_A.to_string(), Value::String(self.concept_a.clone()));
        map.insert(CONCEPT_B.to_string(), Value::String(self.concept_b.clone()));

        for (feature, sim) in &self.similarities {
            let number = serde_json::Number::from_f64(*sim).ok_or_else(|| {
                Error::RecordSerialization(format!(
                    "non-finite similarity {} for feature '{}' in pair ({}, {})",
                    sim, feature, self.concept_a, self.concept_b
                ))
            })?;
            map.insert(sim_field(feature), Value::Number(number));
        }

        if let Some(weight) = self.weight {
            let number = serde_json::Number::from_f64(weight).ok_or_else(|| {
                Error::RecordSerialization(format!("non-finite weight {}", weight))
            })?;
            map.insert(WEIGHT_FIELD.to_string(), Value::Number(number));
        }

        Ok(Value::Object(map))
    }

    /// Decode a pair document written by [`SimilarityPair::to_source`].
    pub fn from_source(source: &Value) -> Result<Self> {
        let map = source.as_object().ok_or_else(|| {
            Error::RecordSerialization("pair document is not an object".to_string())
        })?;

        let concept = |key: &str| -> Result<String> {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::RecordSerialization(format!("pair document missing '{}'", key)))
        };

        let mut pair = SimilarityPair::new(concept(CONCEPT_A)?, concept(CONCEPT_B)?);

        for (key, value) in map {
            if let Some(feature) = key.strip_suffix(SIM_SUFFIX) {
                let sim = value.as_f64().ok_or_else(|| {
                    Error::RecordSerialization(format!("field '{}' is not a number", key))
                })?;
                pair.similarities.insert(feature.to_string(), sim);
            }
        }

        pair.weight = map.get(WEIGHT_FIELD).and_then(Value::as_f64);
        Ok(pair)
    }
}
