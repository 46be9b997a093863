//! # featsim Similarity
//!
//! Feature-weighted pairwise similarity for catalog metadata.
//!
//! Every record of a catalog is compared with every other record (and with
//! itself), feature by feature, and each ordered pair gets one aggregate
//! weight: the weighted mean of its per-feature similarities over the total
//! declared weight.
//!
//! ## Features
//!
//! - **Feature models**: per-catalog declaration of feature types and weights,
//!   built-in (`podaac`, `podaac-uniform`) or loaded from a JSON file
//! - **Per-feature similarity**: categorical, numeric, set, text, ordinal and
//!   boolean comparisons behind the [`FeatureSimilarity`] trait
//! - **Pairwise computation**: the full N × N matrix, optionally on the rayon pool
//! - **Normalization**: one aggregate weight per pair, written back in place
//! - **Explainability**: ranked neighbours and per-feature contributions
//!
//! ## Example
//!
//! ```rust
//! use featsim_core::MetadataRecord;
//! use featsim_similarity::{Feature, FeatureType, PairwiseSimilarityComputer, SchemaFeatureModel, WeightNormalizer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let model = Arc::new(SchemaFeatureModel::from_features("files", vec![
//!     Feature::new("sizeMB", FeatureType::numeric(), 2.0),
//!     Feature::new("category", FeatureType::Categorical, 1.0),
//! ]).unwrap());
//!
//! let record = |id: &str, fields: serde_json::Value| {
//!     MetadataRecord::new(id, fields.as_object().cloned().unwrap())
//! };
//! let a = record("A", json!({"sizeMB": 10, "category": "ocean"}));
//! let b = record("B", json!({"sizeMB": 8, "category": "land"}));
//!
//! let pair = PairwiseSimilarityComputer::new(model.clone()).compute_pair(&a, &b).unwrap();
//! let weight = WeightNormalizer::new(model).aggregate(&pair);
//! assert!((weight - 1.6 / 3.0).abs() < 1e-12);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Catalog   │────>│  Pairwise   │────>│  Bulk write │
//! │  (records)  │     │  computer   │     │   + barrier │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐            │
//!                     │ Normalizer  │<───────────┘
//!                     │  (weights)  │
//!                     └─────────────┘
//!                            │
//!                     ┌─────────────┐
//!                     │  Explain    │
//!                     │  (queries)  │
//!                     └─────────────┘
//! ```

pub mod config;
pub mod distance;
pub mod explain;
pub mod models;
pub mod normalize;
pub mod pairwise;
pub mod pipeline;
pub mod schema;

pub use config::PipelineConfig;
pub use distance::{
    BooleanSimilarity, CategoricalSimilarity, FeatureSimilarity, NumericDistance, NumericSimilarity,
    OrdinalSimilarity, SetSimilarity, TextMethod, TextSimilarity,
};
pub use explain::{explain_pair, similar_to, FeatureContribution, PairExplanation, SimilarItem};
pub use models::{builtin_spec, load_feature_model, FeatureModelSource, BUILTIN_MODELS, PODAAC, PODAAC_UNIFORM};
pub use normalize::{NormalizeStats, WeightNormalizer};
pub use pairwise::{ComputeStats, PairSink, PairwiseSimilarityComputer};
pub use pipeline::{RelationWriter, RunReport, RunState, SimilarityPipeline};
pub use schema::{Feature, FeatureModel, FeatureModelSpec, FeatureType, SchemaFeatureModel};
