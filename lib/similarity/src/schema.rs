//! Feature model definitions
//!
//! A feature model declares, for one catalog, which record fields take part in
//! similarity, how each one is compared, and how much each one weighs. Models
//! are loaded once per run and never mutated afterwards.

use featsim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use crate::distance::{
    BooleanSimilarity, CategoricalSimilarity, FeatureSimilarity, NumericDistance, NumericSimilarity,
    OrdinalSimilarity, SetSimilarity, TextMethod, TextSimilarity,
};

fn default_separator() -> String {
    ",".to_string()
}

/// Feature type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeatureType {
    /// Exact match, case-insensitive
    Categorical,
    Numeric {
        #[serde(default)]
        distance: NumericDistance,
    },
    /// Jaccard over elements
    Set {
        #[serde(default = "default_separator")]
        separator: String,
    },
    Text {
        #[serde(default)]
        method: TextMethod,
    },
    /// Ranked levels, most basic first
    Ordinal { levels: Vec<String> },
    Boolean,
}

impl FeatureType {
    pub fn numeric() -> Self {
        FeatureType::Numeric {
            distance: NumericDistance::default(),
        }
    }

    pub fn set() -> Self {
        FeatureType::Set {
            separator: default_separator(),
        }
    }

    pub fn text() -> Self {
        FeatureType::Text {
            method: TextMethod::default(),
        }
    }

    /// Reject type parameters no value could ever match.
    pub fn validate(&self, feature: &str) -> Result<()> {
        if let FeatureType::Ordinal { levels } = self {
            if levels.is_empty() {
                return Err(Error::Configuration(format!(
                    "ordinal feature '{}' declares no levels",
                    feature
                )));
            }
        }
        Ok(())
    }

    /// The similarity function for this type.
    pub fn evaluator(&self) -> Arc<dyn FeatureSimilarity> {
        match self {
            FeatureType::Categorical => Arc::new(CategoricalSimilarity),
            FeatureType::Numeric { distance } => Arc::new(NumericSimilarity { distance: *distance }),
            FeatureType::Set { separator } => Arc::new(SetSimilarity {
                separator: separator.clone(),
            }),
            FeatureType::Text { method } => Arc::new(TextSimilarity { method: *method }),
            FeatureType::Ordinal { levels } => Arc::new(OrdinalSimilarity::new(levels)),
            FeatureType::Boolean => Arc::new(BooleanSimilarity),
        }
    }
}

/// One declared feature: its type, weight and the function that compares it.
#[derive(Clone)]
pub struct Feature {
    pub name: String,
    pub feature_type: FeatureType,
    pub weight: f64,
    evaluator: Arc<dyn FeatureSimilarity>,
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("name", &self.name)
            .field("feature_type", &self.feature_type)
            .field("weight", &self.weight)
            .finish()
    }
}

impl Feature {
    pub fn new(name: impl Into<String>, feature_type: FeatureType, weight: f64) -> Self {
        let evaluator = feature_type.evaluator();
        Self {
            name: name.into(),
            feature_type,
            weight,
            evaluator,
        }
    }

    /// Override the comparison function, e.g. for a catalog-specific measure.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn FeatureSimilarity>) -> Self {
        self.evaluator = evaluator;
        self
    }

    #[inline]
    pub fn similarity(&self, a: &Value, b: &Value) -> Result<f64> {
        self.evaluator.similarity(&self.name, a, b)
    }

    pub fn is_symmetric(&self) -> bool {
        self.evaluator.is_symmetric()
    }
}

/// Per-catalog declaration of feature types and weights.
pub trait FeatureModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Declared features, ordered by name
    fn features(&self) -> &[Feature];

    fn feature(&self, name: &str) -> Option<&Feature> {
        self.features().iter().find(|f| f.name == name)
    }

    /// Weight of `name`, 0 for undeclared features
    fn weight(&self, name: &str) -> f64 {
        self.feature(name).map_or(0.0, |f| f.weight)
    }

    fn total_weight(&self) -> f64 {
        self.features().iter().map(|f| f.weight).sum()
    }
}

/// Declarative model file: separate type and weight tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureModelSpec {
    pub name: String,
    pub types: BTreeMap<String, FeatureType>,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl FeatureModelSpec {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid feature model: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read feature model {:?}: {}", path, e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check the weight table against the type table
    /// - every weighted feature must have a type
    /// - weights must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in &self.weights {
            if !self.types.contains_key(name) {
                return Err(Error::Configuration(format!(
                    "feature '{}' has a weight but no type",
                    name
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::Configuration(format!(
                    "feature '{}' has invalid weight {}",
                    name, weight
                )));
            }
        }

        for (name, feature_type) in &self.types {
            feature_type.validate(name)?;
        }
        Ok(())
    }
}

/// Feature model built from a [`FeatureModelSpec`].
#[derive(Debug, Clone)]
pub struct SchemaFeatureModel {
    name: String,
    features: Vec<Feature>,
}

impl SchemaFeatureModel {
    pub fn from_spec(spec: FeatureModelSpec) -> Result<Self> {
        spec.validate()?;
        let features = spec
            .types
            .into_iter()
            .map(|(name, feature_type)| {
                // typed but unweighted features are scored and weigh nothing
                let weight = spec.weights.get(&name).copied().unwrap_or(0.0);
                Feature::new(name, feature_type, weight)
            })
            .collect();
        Ok(Self {
            name: spec.name,
            features,
        })
    }

    /// Build from explicit features; they are sorted by name.
    pub fn from_features(name: impl Into<String>, mut features: Vec<Feature>) -> Result<Self> {
        features.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in features.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::Configuration(format!(
                    "feature '{}' declared twice",
                    pair[0].name
                )));
            }
        }
        if let Some(bad) = features.iter().find(|f| !f.weight.is_finite() || f.weight < 0.0) {
            return Err(Error::Configuration(format!(
                "feature '{}' has invalid weight {}",
                bad.name, bad.weight
            )));
        }
        for feature in &features {
            feature.feature_type.validate(&feature.name)?;
        }
        Ok(Self {
            name: name.into(),
            features,
        })
    }
}

impl FeatureModel for SchemaFeatureModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec_json() -> &'static str {
        r#"{
            "name": "files",
            "types": {
                "sizeMB": {"type": "numeric"},
                "category": {"type": "categorical"},
                "tags": {"type": "set", "separator": ";"},
                "summary": {"type": "text", "method": "trigram"}
            },
            "weights": {"sizeMB": 2, "category": 1, "tags": 0.5}
        }"#
    }

    #[test]
    fn test_model_from_spec() {
        let spec = FeatureModelSpec::from_json_str(spec_json()).unwrap();
        let model = SchemaFeatureModel::from_spec(spec).unwrap();

        assert_eq!(model.name(), "files");
        let names: Vec<_> = model.features().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["category", "sizeMB", "summary", "tags"]);
        assert_eq!(model.weight("sizeMB"), 2.0);
        assert_eq!(model.weight("summary"), 0.0);
        assert_eq!(model.weight("unknown"), 0.0);
        assert!((model.total_weight() - 3.5).abs() < 1e-12);

        let tags = model.feature("tags").unwrap();
        assert_eq!(tags.feature_type, FeatureType::Set { separator: ";".into() });
        assert_eq!(tags.similarity(&json!("a;b"), &json!("b;a")).unwrap(), 1.0);
    }

    #[test]
    fn test_weight_without_type_rejected() {
        let spec = FeatureModelSpec {
            name: "bad".into(),
            types: BTreeMap::from([("a".to_string(), FeatureType::Categorical)]),
            weights: BTreeMap::from([("a".to_string(), 1.0), ("b".to_string(), 1.0)]),
        };
        assert!(matches!(
            SchemaFeatureModel::from_spec(spec),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let spec = FeatureModelSpec {
            name: "bad".into(),
            types: BTreeMap::from([("a".to_string(), FeatureType::numeric())]),
            weights: BTreeMap::from([("a".to_string(), -0.5)]),
        };
        assert!(matches!(spec.validate(), Err(Error::Configuration(_))));

        let features = vec![Feature::new("a", FeatureType::Boolean, f64::NAN)];
        assert!(SchemaFeatureModel::from_features("bad", features).is_err());
    }

    #[test]
    fn test_empty_model_is_valid() {
        let spec = FeatureModelSpec {
            name: "empty".into(),
            types: BTreeMap::new(),
            weights: BTreeMap::new(),
        };
        let model = SchemaFeatureModel::from_spec(spec).unwrap();
        assert!(model.features().is_empty());
        assert_eq!(model.total_weight(), 0.0);
    }

    #[test]
    fn test_empty_ordinal_levels_rejected() {
        let features = vec![
            Feature::new("a", FeatureType::Boolean, 1.0),
            Feature::new("level", FeatureType::Ordinal { levels: vec![] }, 1.0),
        ];
        assert!(matches!(
            SchemaFeatureModel::from_features("bad", features),
            Err(Error::Configuration(_))
        ));

        let spec = FeatureModelSpec {
            name: "bad".into(),
            types: BTreeMap::from([("level".to_string(), FeatureType::Ordinal { levels: vec![] })]),
            weights: BTreeMap::new(),
        };
        assert!(matches!(spec.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_features_rejected() {
        let features = vec![
            Feature::new("a", FeatureType::Boolean, 1.0),
            Feature::new("a", FeatureType::Categorical, 1.0),
        ];
        assert!(SchemaFeatureModel::from_features("dup", features).is_err());
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        assert!(matches!(
            FeatureModelSpec::from_json_str("{\"name\": 1}"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            FeatureModelSpec::from_file("/nonexistent/model.json"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let spec = FeatureModelSpec::from_json_str(spec_json()).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(FeatureModelSpec::from_json_str(&json).unwrap(), spec);
    }
}
