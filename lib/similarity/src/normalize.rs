//! Aggregate weight normalization
//!
//! The aggregate score of a pair is the weighted mean of its feature
//! similarities:
//!
//! ```text
//! weight(A, B) = Σ_f w_f · sim_f(A, B) / Σ_f w_f
//! ```
//!
//! The numerator runs over declared features present in the pair; the
//! denominator is the model's total weight, so a feature missing from either
//! record contributes zero rather than being dropped from the mean.

use featsim_core::{SimilarityPair, WEIGHT_FIELD};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use crate::pairwise::PairSink;
use crate::schema::FeatureModel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub pairs: usize,
    pub updated: u64,
    pub failed: u64,
}

#[derive(Debug, Clone)]
pub struct WeightNormalizer {
    model: Arc<dyn FeatureModel>,
    total_weight: f64,
    parallel: bool,
}

impl WeightNormalizer {
    pub fn new(model: Arc<dyn FeatureModel>) -> Self {
        let total_weight = model.total_weight();
        if total_weight == 0.0 {
            warn!(model = model.name(), "Feature model has zero total weight; every aggregate will be 0");
        }
        Self {
            model,
            total_weight,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Weighted aggregate of one pair, in [0, 1].
    pub fn aggregate(&self, pair: &SimilarityPair) -> f64 {
        if self.total_weight == 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .model
            .features()
            .iter()
            .filter_map(|f| pair.similarity(&f.name).map(|sim| f.weight * sim))
            .sum();
        (weighted / self.total_weight).clamp(0.0, 1.0)
    }

    /// Attach a `weight` to every stored pair. `pairs` holds the catalog
    /// document id next to the decoded pair.
    pub fn normalize(&self, pairs: &[(String, SimilarityPair)], sink: &dyn PairSink) -> NormalizeStats {
        let updated = AtomicU64::new(0);
        let failed = AtomicU64::new(0);

        let apply = |(document_id, pair): &(String, SimilarityPair)| {
            let weight = self.aggregate(pair);
            match sink.update_weight(document_id, weight) {
                Ok(()) => {
                    updated.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        document = %document_id,
                        field = WEIGHT_FIELD,
                        error = %e,
                        "Failed to queue weight update"
                    );
                }
            }
        };

        if self.parallel {
            pairs.par_iter().for_each(apply);
        } else {
            pairs.iter().for_each(apply);
        }

        let stats = NormalizeStats {
            pairs: pairs.len(),
            updated: updated.into_inner(),
            failed: failed.into_inner(),
        };
        info!(pairs = stats.pairs, updated = stats.updated, failed = stats.failed, "Weights normalized");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairwise::tests::CollectingSink;
    use crate::schema::{Feature, FeatureType, SchemaFeatureModel};

    fn model(weights: &[(&str, f64)]) -> Arc<dyn FeatureModel> {
        let features = weights
            .iter()
            .map(|(name, w)| Feature::new(*name, FeatureType::numeric(), *w))
            .collect();
        Arc::new(SchemaFeatureModel::from_features("test", features).unwrap())
    }

    fn pair(a: &str, b: &str, sims: &[(&str, f64)]) -> SimilarityPair {
        let mut pair = SimilarityPair::new(a, b);
        for (feature, sim) in sims {
            pair.similarities.insert(feature.to_string(), *sim);
        }
        pair
    }

    #[test]
    fn test_weighted_mean() {
        let normalizer = WeightNormalizer::new(model(&[("sizeMB", 2.0), ("category", 1.0)]));
        let p = pair("A", "B", &[("sizeMB", 0.8), ("category", 0.5)]);
        // (2 * 0.8 + 1 * 0.5) / 3
        assert!((normalizer.aggregate(&p) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_missing_feature_keeps_full_denominator() {
        let normalizer = WeightNormalizer::new(model(&[("sizeMB", 2.0), ("category", 1.0)]));
        let p = pair("A", "C", &[("category", 1.0)]);
        assert!((normalizer.aggregate(&p) - 1.0 / 3.0).abs() < 1e-12);

        let empty = pair("A", "D", &[]);
        assert_eq!(normalizer.aggregate(&empty), 0.0);
    }

    #[test]
    fn test_undeclared_feature_ignored() {
        let normalizer = WeightNormalizer::new(model(&[("sizeMB", 1.0)]));
        let p = pair("A", "B", &[("sizeMB", 0.5), ("legacy", 1.0)]);
        assert_eq!(normalizer.aggregate(&p), 0.5);
    }

    #[test]
    fn test_zero_total_weight() {
        let normalizer = WeightNormalizer::new(model(&[("sizeMB", 0.0)]));
        assert_eq!(normalizer.total_weight(), 0.0);
        let p = pair("A", "B", &[("sizeMB", 1.0)]);
        assert_eq!(normalizer.aggregate(&p), 0.0);
    }

    #[test]
    fn test_self_pair_with_all_features_is_one() {
        let normalizer = WeightNormalizer::new(model(&[("x", 3.0), ("y", 0.5)]));
        let p = pair("A", "A", &[("x", 1.0), ("y", 1.0)]);
        assert_eq!(normalizer.aggregate(&p), 1.0);
    }

    #[test]
    fn test_normalize_updates_every_document() {
        let normalizer = WeightNormalizer::new(model(&[("sizeMB", 2.0), ("category", 1.0)])).parallel(true);
        let pairs = vec![
            ("doc-1".to_string(), pair("A", "B", &[("sizeMB", 0.8), ("category", 0.5)])),
            ("doc-2".to_string(), pair("B", "A", &[("sizeMB", 0.8), ("category", 0.5)])),
            ("doc-3".to_string(), pair("A", "A", &[("sizeMB", 1.0), ("category", 1.0)])),
        ];

        let sink = CollectingSink::default();
        let stats = normalizer.normalize(&pairs, &sink);
        assert_eq!(stats, NormalizeStats { pairs: 3, updated: 3, failed: 0 });

        let mut weights = sink.weights.lock().clone();
        weights.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(weights.len(), 3);
        assert!((weights[0].1 - 0.7).abs() < 1e-12);
        assert!((weights[1].1 - 0.7).abs() < 1e-12);
        assert_eq!(weights[2], ("doc-3".to_string(), 1.0));
    }
}
