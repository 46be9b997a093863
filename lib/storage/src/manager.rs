use featsim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use crate::gateway::CatalogGateway;
use crate::lmdb_storage::LmdbCatalog;
use crate::memory::MemoryCatalog;

/// Which catalog implementation backs a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CatalogBackend {
    /// Process-local, lost on exit
    Memory,
    Lmdb { path: PathBuf },
}

impl Default for CatalogBackend {
    fn default() -> Self {
        CatalogBackend::Lmdb {
            path: PathBuf::from("./data/catalog"),
        }
    }
}

/// Open the configured catalog.
pub fn open_catalog(backend: &CatalogBackend) -> Result<Arc<dyn CatalogGateway>> {
    match backend {
        CatalogBackend::Memory => {
            info!("Using in-memory catalog");
            Ok(Arc::new(MemoryCatalog::new()))
        }
        CatalogBackend::Lmdb { path } => {
            let catalog = LmdbCatalog::new(path).map_err(|e| {
                Error::Configuration(format!("cannot open catalog at {:?}: {}", path, e))
            })?;
            info!("Opened LMDB catalog at {:?}", path);
            Ok(Arc::new(catalog))
        }
    }
}
