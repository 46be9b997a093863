//! Pipeline configuration.

use featsim_core::{Error, FilterCondition, RelationRef, Result};
use featsim_storage::BulkConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::models::FeatureModelSource;

/// Settings for one similarity rebuild. Immutable once handed to a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Catalog index holding both the input records and the output pairs
    pub index_name: String,
    /// Record type of the input metadata
    pub metadata_type: String,
    /// Record type of the output similarity pairs
    pub similarity_type: String,
    /// Field carrying each record's identifier
    pub id_field: String,
    pub feature_model: FeatureModelSource,
    /// Applied to the input read; `None` reads every record
    pub input_filter: Option<FilterCondition>,
    pub page_size: usize,
    pub bulk: BulkConfig,
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_name: "mudrod".to_string(),
            metadata_type: "RecomMetadata".to_string(),
            similarity_type: "MetadataSim".to_string(),
            id_field: "Dataset-ShortName".to_string(),
            feature_model: FeatureModelSource::default(),
            input_filter: None,
            page_size: 100,
            bulk: BulkConfig::default(),
            parallel: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read pipeline config {:?}: {}", path, e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn input_relation(&self) -> RelationRef {
        RelationRef::new(self.index_name.as_str(), self.metadata_type.as_str())
    }

    pub fn output_relation(&self) -> RelationRef {
        RelationRef::new(self.index_name.as_str(), self.similarity_type.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("index_name", &self.index_name),
            ("metadata_type", &self.metadata_type),
            ("similarity_type", &self.similarity_type),
            ("id_field", &self.id_field),
        ];
        if let Some((key, _)) = names.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::Configuration(format!("{} must not be empty", key)));
        }
        if self.metadata_type == self.similarity_type {
            return Err(Error::Configuration(format!(
                "input and output relations are both '{}'",
                self.output_relation()
            )));
        }
        if self.page_size == 0 {
            return Err(Error::Configuration("page_size must be positive".to_string()));
        }
        if self.bulk.bulk_actions == 0 || self.bulk.concurrent_requests == 0 {
            return Err(Error::Configuration(
                "bulk_actions and concurrent_requests must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
