//! Built-in feature models and the model factory.

use featsim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use crate::distance::NumericDistance;
use crate::schema::{FeatureModel, FeatureModelSpec, FeatureType, SchemaFeatureModel};

pub const PODAAC: &str = "podaac";
pub const PODAAC_UNIFORM: &str = "podaac-uniform";

/// Names accepted by [`FeatureModelSource::Builtin`]
pub const BUILTIN_MODELS: &[&str] = &[PODAAC, PODAAC_UNIFORM];

/// Where the feature model for a run comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureModelSource {
    Builtin(String),
    /// A JSON [`FeatureModelSpec`] on disk
    File(PathBuf),
}

impl Default for FeatureModelSource {
    fn default() -> Self {
        FeatureModelSource::Builtin(PODAAC.to_string())
    }
}

const PROCESSING_LEVELS: &[&str] = &["0", "1", "1A", "1B", "1C", "2", "2P", "3", "3U", "3C", "3S", "4"];

/// PO.DAAC dataset metadata: instrument, coverage and product characteristics.
fn podaac_types() -> BTreeMap<String, FeatureType> {
    let mut types = BTreeMap::new();
    types.insert("DatasetParameter-Variable".to_string(), FeatureType::set());
    types.insert("DatasetRegion-Region".to_string(), FeatureType::set());
    types.insert("DatasetSource-Sensor-ShortName".to_string(), FeatureType::set());
    types.insert("DatasetSource-Source-Type".to_string(), FeatureType::Categorical);
    types.insert(
        "Dataset-ProcessingLevel".to_string(),
        FeatureType::Ordinal {
            levels: PROCESSING_LEVELS.iter().map(|l| l.to_string()).collect(),
        },
    );
    types.insert("Dataset-ProjectionType".to_string(), FeatureType::Categorical);
    types.insert("DatasetPolicy-DataFormat".to_string(), FeatureType::Categorical);
    types.insert("Dataset-TemporalResolution".to_string(), FeatureType::Categorical);
    types.insert(
        "Dataset-AcrossTrackResolution".to_string(),
        FeatureType::Numeric { distance: NumericDistance::Relative },
    );
    types.insert(
        "Dataset-AlongTrackResolution".to_string(),
        FeatureType::Numeric { distance: NumericDistance::Relative },
    );
    types.insert("Dataset-Description".to_string(), FeatureType::text());
    types
}

fn podaac_weights() -> BTreeMap<String, f64> {
    [
        ("DatasetParameter-Variable", 5.0),
        ("DatasetRegion-Region", 3.0),
        ("DatasetSource-Sensor-ShortName", 2.0),
        ("Dataset-ProcessingLevel", 2.0),
        ("Dataset-TemporalResolution", 2.0),
        ("DatasetSource-Source-Type", 1.0),
        ("Dataset-ProjectionType", 1.0),
        ("DatasetPolicy-DataFormat", 1.0),
        ("Dataset-AcrossTrackResolution", 1.0),
        ("Dataset-AlongTrackResolution", 1.0),
        ("Dataset-Description", 1.0),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

/// Spec of a built-in model, `None` for unknown names.
pub fn builtin_spec(name: &str) -> Option<FeatureModelSpec> {
    match name {
        PODAAC => Some(FeatureModelSpec {
            name: PODAAC.to_string(),
            types: podaac_types(),
            weights: podaac_weights(),
        }),
        PODAAC_UNIFORM => {
            let types = podaac_types();
            let weights = types.keys().map(|name| (name.clone(), 1.0)).collect();
            Some(FeatureModelSpec {
                name: PODAAC_UNIFORM.to_string(),
                types,
                weights,
            })
        }
        _ => None,
    }
}

/// Load the feature model selected by configuration.
pub fn load_feature_model(source: &FeatureModelSource) -> Result<Arc<dyn FeatureModel>> {
    let spec = match source {
        FeatureModelSource::Builtin(name) => builtin_spec(name).ok_or_else(|| {
            Error::Configuration(format!(
                "unknown feature model '{}', expected one of {:?}",
                name, BUILTIN_MODELS
            ))
        })?,
        FeatureModelSource::File(path) => FeatureModelSpec::from_file(path)?,
    };

    let model = SchemaFeatureModel::from_spec(spec)?;
    info!(
        model = model.name(),
        features = model.features().len(),
        total_weight = model.total_weight(),
        "Loaded feature model"
    );
    Ok(Arc::new(model))
}
