//! Application configuration: catalog backend, pipeline settings, HTTP port.

use featsim_core::{Error, Result};
use featsim_similarity::PipelineConfig;
use featsim_storage::CatalogBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogBackend,
    pub pipeline: PipelineConfig,
    pub http_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogBackend::default(),
            pipeline: PipelineConfig::default(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file; every field is optional.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("cannot read config {:?}: {}", path, e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Configuration(format!("invalid config {:?}: {}", path, e)))?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
