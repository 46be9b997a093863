//! Pairwise similarity computation
//!
//! Every ordered pair `(i, j)` of the record set, the self-pair included, is
//! scored feature by feature and handed to a [`PairSink`]. A feature only
//! appears in a pair when both records carry a value for it.
//!
//! Cost is O(N² · F). A pair that cannot be built is logged and skipped; the
//! rest of the matrix is still produced.

use featsim_core::{Error, MetadataRecord, Result, SimilarityPair};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use crate::schema::FeatureModel;

/// Outbound buffer for pair records and their aggregate weights.
pub trait PairSink: Sync {
    fn insert(&self, pair: &SimilarityPair) -> Result<()>;

    /// Attach the aggregate weight to an already stored pair document.
    fn update_weight(&self, document_id: &str, weight: f64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComputeStats {
    pub records: usize,
    pub pairs_emitted: u64,
    pub pairs_skipped: u64,
}

#[derive(Debug, Clone)]
pub struct PairwiseSimilarityComputer {
    model: Arc<dyn FeatureModel>,
    parallel: bool,
}

impl PairwiseSimilarityComputer {
    pub fn new(model: Arc<dyn FeatureModel>) -> Self {
        Self {
            model,
            parallel: false,
        }
    }

    /// Spread rows of the matrix over the rayon pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn model(&self) -> &Arc<dyn FeatureModel> {
        &self.model
    }

    /// Score one ordered pair.
    pub fn compute_pair(&self, a: &MetadataRecord, b: &MetadataRecord) -> Result<SimilarityPair> {
        let mut pair = SimilarityPair::new(a.id.as_str(), b.id.as_str());

        for feature in self.model.features() {
            let (Some(value_a), Some(value_b)) = (a.value(&feature.name), b.value(&feature.name)) else {
                continue;
            };

            let sim = feature.similarity(value_a, value_b)?;
            if !(0.0..=1.0).contains(&sim) {
                return Err(Error::invalid_value(
                    feature.name.as_str(),
                    format!("similarity {} outside [0, 1]", sim),
                ));
            }
            pair.similarities.insert(feature.name.clone(), sim);
        }

        Ok(pair)
    }

    /// Score the full matrix, emitting every pair into `sink`.
    pub fn compute(&self, records: &[MetadataRecord], sink: &dyn PairSink) -> ComputeStats {
        let emitted = AtomicU64::new(0);
        let skipped = AtomicU64::new(0);

        let row = |i: usize| {
            let a = &records[i];
            for b in records {
                match self.compute_pair(a, b).and_then(|pair| sink.insert(&pair)) {
                    Ok(()) => {
                        emitted.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        warn!(concept_a = %a.id, concept_b = %b.id, error = %e, "Skipping pair");
                    }
                }
            }
        };

        if self.parallel {
            (0..records.len()).into_par_iter().for_each(row);
        } else {
            (0..records.len()).for_each(row);
        }

        let stats = ComputeStats {
            records: records.len(),
            pairs_emitted: emitted.into_inner(),
            pairs_skipped: skipped.into_inner(),
        };
        info!(
            records = stats.records,
            emitted = stats.pairs_emitted,
            skipped = stats.pairs_skipped,
            "Pairwise similarity computed"
        );
        stats
    }
}
