//! # featsim Core
//!
//! Core types shared by the featsim crates:
//!
//! - [`MetadataRecord`] - a catalog record (identifier + heterogeneous feature values)
//! - [`SimilarityPair`] - per-ordered-pair feature similarities and aggregate weight
//! - [`Document`] / [`RelationRef`] / [`FieldSpec`] - what the catalog stores and where
//! - [`FilterCondition`] - payload filters for catalog reads
//!
//! ## Example
//!
//! ```rust
//! use featsim_core::{SimilarityPair, sim_field};
//!
//! let mut pair = SimilarityPair::new("AVHRR_L4", "MODIS_L3");
//! pair.similarities.insert("Dataset-ProcessingLevel".to_string(), 0.0);
//!
//! let source = pair.to_source().unwrap();
//! assert!(source.get(sim_field("Dataset-ProcessingLevel").as_str()).is_some());
//! ```

pub mod error;
pub mod filter;
pub mod pair;
pub mod record;

pub use error::{Error, Result};
pub use filter::{Filter, FilterCondition};
pub use pair::{sim_field, SimilarityPair, CONCEPT_A, CONCEPT_B, SIM_SUFFIX, WEIGHT_FIELD};
pub use record::{Document, FieldKind, FieldSpec, MetadataRecord, RelationRef};
