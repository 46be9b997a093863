//! # featsim
//!
//! Feature-weighted pairwise similarity for metadata catalogs.
//!
//! featsim compares every record of a catalog with every other record,
//! feature by feature, and stores one similarity document per ordered pair
//! with an aggregate weight. The result backs "items similar to X"
//! recommendations.
//!
//! ## Quick Start
//!
//! ### As a Command-Line Tool
//!
//! ```bash
//! featsim load datasets.jsonl
//! featsim run
//! featsim similar AVHRR_OI-NCEI-L4-GLOB-v2.0 --limit 5
//! featsim serve --http-port 8080
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use featsim::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(MemoryCatalog::new());
//! let config = PipelineConfig {
//!     id_field: "name".to_string(),
//!     ..PipelineConfig::default()
//! };
//!
//! let input = config.input_relation();
//! let ops: Vec<BulkOp> = [json!({"name": "A", "sizeMB": 10}), json!({"name": "B", "sizeMB": 8})]
//!     .into_iter()
//!     .map(|source| BulkOp::Index { relation: input.clone(), id: None, source })
//!     .collect();
//! catalog.bulk_write(&ops).unwrap();
//! catalog.make_visible(&input).unwrap();
//!
//! let model = Arc::new(SchemaFeatureModel::from_features(
//!     "files",
//!     vec![Feature::new("sizeMB", FeatureType::numeric(), 1.0)],
//! ).unwrap());
//! let pipeline = SimilarityPipeline::with_model(config, catalog, model).unwrap();
//! let report = pipeline.run().unwrap();
//! assert_eq!(report.pairs_emitted, 4);
//! ```
//!
//! ## Crate Structure
//!
//! - `featsim-core` - records, pairs, filters, errors
//! - `featsim-storage` - the catalog gateway, in-memory and LMDB catalogs, bulk writer
//! - `featsim-similarity` - feature models, pairwise computation, normalization, queries
//! - `featsim-api` - REST endpoints

pub mod config;
pub mod ingest;

pub use config::AppConfig;
pub use ingest::{ingest_jsonl, IngestReport};

// Re-export core types
pub use featsim_core::{
    Document, Error, FieldKind, FieldSpec, Filter, FilterCondition, MetadataRecord, RelationRef,
    Result, SimilarityPair,
};

// Re-export storage
pub use featsim_storage::{
    open_catalog, BulkConfig, BulkOp, BulkProcessor, BulkStats, CatalogBackend, CatalogGateway,
    LmdbCatalog, MemoryCatalog,
};

// Re-export similarity
pub use featsim_similarity::{
    load_feature_model, Feature, FeatureModel, FeatureModelSource, FeatureModelSpec, FeatureType,
    PairwiseSimilarityComputer, PipelineConfig, RunReport, RunState, SchemaFeatureModel,
    SimilarityPipeline, WeightNormalizer,
};

// Re-export API
pub use featsim_api::RestApi;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AppConfig, BulkOp, CatalogGateway, Error, Feature, FeatureModel, FeatureType,
        MemoryCatalog, MetadataRecord, PipelineConfig, Result, SchemaFeatureModel,
        SimilarityPair, SimilarityPipeline,
    };
}
