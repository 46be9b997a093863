//! Queries over a finished similarity relation
//!
//! Ranked neighbours for one concept, and a per-feature breakdown of how a
//! stored pair got its aggregate weight.

use featsim_core::{FilterCondition, RelationRef, Result, SimilarityPair, CONCEPT_A, CONCEPT_B};
use featsim_storage::CatalogGateway;
use serde::Serialize;
use tracing::warn;
use crate::schema::FeatureModel;

/// One neighbour of a concept, ranked by aggregate weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarItem {
    pub concept: String,
    pub weight: f64,
}

/// Items most similar to `concept`, best first. The self-pair is excluded;
/// ties are broken by concept id so the order is stable across runs.
pub fn similar_to(
    gateway: &dyn CatalogGateway,
    relation: &RelationRef,
    concept: &str,
    limit: usize,
    page_size: usize,
) -> Result<Vec<SimilarItem>> {
    let filter = FilterCondition::equals(CONCEPT_A, concept);
    let documents = gateway.read_all(relation, Some(&filter), page_size)?;

    let mut items = Vec::with_capacity(documents.len());
    for doc in &documents {
        let pair = match SimilarityPair::from_source(&doc.source) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(document = %doc.id, error = %e, "Ignoring unreadable pair document");
                continue;
            }
        };
        if pair.is_self_pair() {
            continue;
        }
        items.push(SimilarItem {
            concept: pair.concept_b,
            weight: pair.weight.unwrap_or(0.0),
        });
    }

    items.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.concept.cmp(&b.concept)));
    items.truncate(limit);
    Ok(items)
}

/// Weighted share of one feature in a pair's aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub similarity: f64,
    /// Declared feature weight
    pub weight: f64,
    /// `weight · similarity / total_weight`
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairExplanation {
    pub concept_a: String,
    pub concept_b: String,
    /// Aggregate as stored, `None` until normalization ran
    pub weight: Option<f64>,
    /// Aggregate recomputed from the contributions
    pub aggregate: f64,
    pub total_weight: f64,
    /// Present features, largest contribution first
    pub features: Vec<FeatureContribution>,
    /// Declared features absent from the pair
    pub missing: Vec<String>,
}

impl PairExplanation {
    pub fn from_pair(pair: &SimilarityPair, model: &dyn FeatureModel) -> Self {
        let total_weight = model.total_weight();
        let mut features = Vec::new();
        let mut missing = Vec::new();

        for feature in model.features() {
            match pair.similarity(&feature.name) {
                Some(similarity) => {
                    let contribution = if total_weight == 0.0 {
                        0.0
                    } else {
                        feature.weight * similarity / total_weight
                    };
                    features.push(FeatureContribution {
                        feature: feature.name.clone(),
                        similarity,
                        weight: feature.weight,
                        contribution,
                    });
                }
                None => missing.push(feature.name.clone()),
            }
        }

        let aggregate = features.iter().map(|f| f.contribution).sum::<f64>().clamp(0.0, 1.0);
        features.sort_by(|a, b| {
            b.contribution
                .total_cmp(&a.contribution)
                .then_with(|| a.feature.cmp(&b.feature))
        });

        Self {
            concept_a: pair.concept_a.clone(),
            concept_b: pair.concept_b.clone(),
            weight: pair.weight,
            aggregate,
            total_weight,
            features,
            missing,
        }
    }

    /// Feature contributing most to the aggregate
    pub fn top_feature(&self) -> Option<&FeatureContribution> {
        self.features.first().filter(|f| f.contribution > 0.0)
    }
}

/// Explain the stored pair `(a, b)`; `None` when no such pair exists.
pub fn explain_pair(
    gateway: &dyn CatalogGateway,
    relation: &RelationRef,
    model: &dyn FeatureModel,
    a: &str,
    b: &str,
    page_size: usize,
) -> Result<Option<PairExplanation>> {
    let filter = FilterCondition::And(vec![
        FilterCondition::equals(CONCEPT_A, a),
        FilterCondition::equals(CONCEPT_B, b),
    ]);
    let documents = gateway.read_all(relation, Some(&filter), page_size)?;
    let Some(doc) = documents.first() else {
        return Ok(None);
    };
    if documents.len() > 1 {
        warn!(concept_a = a, concept_b = b, count = documents.len(), "Pair stored more than once");
    }

    let pair = SimilarityPair::from_source(&doc.source)?;
    Ok(Some(PairExplanation::from_pair(&pair, model)))
}
