//! Full similarity rebuild
//!
//! ```text
//! Idle → SchemaReset → Computing → Barrier → Normalizing → Done
//!                        (any stage) ──fatal──> Failed
//! ```
//!
//! Input records are read completely before the output relation is touched,
//! so an unreadable catalog leaves the previous result in place. Every run
//! drops and re-declares the output relation: there is no incremental mode.

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use featsim_core::{
    sim_field, Error, FieldSpec, MetadataRecord, RelationRef, Result, SimilarityPair, CONCEPT_A,
    CONCEPT_B, WEIGHT_FIELD,
};
use featsim_storage::{BulkOp, BulkProcessor, BulkStats, CatalogGateway};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use crate::config::PipelineConfig;
use crate::explain::{explain_pair, similar_to, PairExplanation, SimilarItem};
use crate::models::load_feature_model;
use crate::normalize::WeightNormalizer;
use crate::pairwise::{PairSink, PairwiseSimilarityComputer};
use crate::schema::FeatureModel;

/// [`PairSink`] that turns pairs into bulk ops against one relation.
pub struct RelationWriter<'a> {
    bulk: &'a BulkProcessor,
    relation: &'a RelationRef,
}

impl<'a> RelationWriter<'a> {
    pub fn new(bulk: &'a BulkProcessor, relation: &'a RelationRef) -> Self {
        Self { bulk, relation }
    }
}

impl PairSink for RelationWriter<'_> {
    fn insert(&self, pair: &SimilarityPair) -> Result<()> {
        let source = pair.to_source()?;
        self.bulk.add(BulkOp::Index {
            relation: self.relation.clone(),
            id: None,
            source,
        });
        Ok(())
    }

    fn update_weight(&self, document_id: &str, weight: f64) -> Result<()> {
        let number = serde_json::Number::from_f64(weight).ok_or_else(|| {
            Error::RecordSerialization(format!("non-finite weight {} for {}", weight, document_id))
        })?;
        self.bulk.add(BulkOp::Update {
            relation: self.relation.clone(),
            id: document_id.to_string(),
            field: WEIGHT_FIELD.to_string(),
            value: Value::Number(number),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    SchemaReset,
    Computing,
    Barrier,
    Normalizing,
    Done,
    Failed,
}

/// Outcome of one rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub model: String,
    pub input_relation: String,
    pub output_relation: String,
    pub records: usize,
    /// Input documents without a usable identifier, or repeating one
    pub records_skipped: u64,
    pub pairs_emitted: u64,
    pub pairs_skipped: u64,
    pub pairs_normalized: u64,
    pub compute_writes: BulkStats,
    pub normalize_writes: BulkStats,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Whether every emitted pair and weight reached the catalog.
    pub fn is_complete(&self) -> bool {
        let clean = |s: &BulkStats| s.failed_batches == 0 && s.item_failures == 0;
        self.pairs_skipped == 0 && clean(&self.compute_writes) && clean(&self.normalize_writes)
    }
}

pub struct SimilarityPipeline {
    config: PipelineConfig,
    gateway: Arc<dyn CatalogGateway>,
    model: Arc<dyn FeatureModel>,
    state: RwLock<RunState>,
    run_lock: Mutex<()>,
}

impl SimilarityPipeline {
    /// Build a pipeline, loading the feature model named by `config`.
    pub fn new(config: PipelineConfig, gateway: Arc<dyn CatalogGateway>) -> Result<Self> {
        config.validate()?;
        let model = load_feature_model(&config.feature_model)?;
        Self::with_model(config, gateway, model)
    }

    /// Build a pipeline around an already constructed model.
    pub fn with_model(
        config: PipelineConfig,
        gateway: Arc<dyn CatalogGateway>,
        model: Arc<dyn FeatureModel>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            gateway,
            model,
            state: RwLock::new(RunState::Idle),
            run_lock: Mutex::new(()),
        })
    }

    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    pub fn model(&self) -> &Arc<dyn FeatureModel> {
        &self.model
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn CatalogGateway> {
        &self.gateway
    }

    fn set_state(&self, state: RunState) {
        debug!(state = ?state, "Pipeline state change");
        *self.state.write() = state;
    }

    /// Layout of the output relation.
    pub fn output_schema(&self) -> Vec<FieldSpec> {
        let mut fields = vec![
            FieldSpec::keyword(CONCEPT_A),
            FieldSpec::keyword(CONCEPT_B),
            FieldSpec::double(WEIGHT_FIELD),
        ];
        fields.extend(self.model.features().iter().map(|f| FieldSpec::double(sim_field(&f.name))));
        fields
    }

    /// Run a full rebuild. Concurrent calls are serialized.
    pub fn run(&self) -> Result<RunReport> {
        let _guard = self.run_lock.lock();
        let started_at = Utc::now();
        let timer = Instant::now();
        self.set_state(RunState::Idle);

        info!(
            model = self.model.name(),
            input = %self.config.input_relation(),
            output = %self.config.output_relation(),
            "Starting similarity rebuild"
        );

        match self.execute(started_at, timer) {
            Ok(report) => {
                self.set_state(RunState::Done);
                info!(
                    records = report.records,
                    pairs = report.pairs_emitted,
                    normalized = report.pairs_normalized,
                    elapsed_ms = report.elapsed_ms,
                    "Similarity rebuild finished"
                );
                if !report.is_complete() {
                    warn!("Similarity rebuild finished with lost writes; see run report");
                }
                Ok(report)
            }
            Err(e) => {
                self.set_state(RunState::Failed);
                error!(error = %e, "Similarity rebuild failed");
                Err(e)
            }
        }
    }

    fn execute(&self, started_at: DateTime<Utc>, timer: Instant) -> Result<RunReport> {
        let input = self.config.input_relation();
        let output = self.config.output_relation();

        let (records, records_skipped) = self.load_records(&input)?;

        self.set_state(RunState::SchemaReset);
        if self.gateway.delete_relation(&output)? {
            info!(relation = %output, "Dropped previous similarity relation");
        }
        self.gateway.declare_schema(&output, &self.output_schema())?;

        self.set_state(RunState::Computing);
        let bulk = BulkProcessor::new(self.gateway.clone(), self.config.bulk)?;
        let computer = PairwiseSimilarityComputer::new(self.model.clone()).parallel(self.config.parallel);
        let compute = computer.compute(&records, &RelationWriter::new(&bulk, &output));

        self.set_state(RunState::Barrier);
        let compute_writes = bulk.close();
        self.gateway.make_visible(&output)?;

        self.set_state(RunState::Normalizing);
        let pairs = self.load_pairs(&output)?;
        let bulk = BulkProcessor::new(self.gateway.clone(), self.config.bulk)?;
        let normalizer = WeightNormalizer::new(self.model.clone()).parallel(self.config.parallel);
        let normalized = normalizer.normalize(&pairs, &RelationWriter::new(&bulk, &output));
        let normalize_writes = bulk.close();
        self.gateway.make_visible(&output)?;

        Ok(RunReport {
            model: self.model.name().to_string(),
            input_relation: input.to_string(),
            output_relation: output.to_string(),
            records: records.len(),
            records_skipped,
            pairs_emitted: compute.pairs_emitted,
            pairs_skipped: compute.pairs_skipped,
            pairs_normalized: normalized.updated,
            compute_writes,
            normalize_writes,
            started_at,
            elapsed_ms: timer.elapsed().as_millis() as u64,
        })
    }

    /// Exhaust the input cursor. Documents without a usable id, or repeating
    /// an id already seen, are skipped.
    fn load_records(&self, input: &RelationRef) -> Result<(Vec<MetadataRecord>, u64)> {
        let documents = self.gateway.read_all(
            input,
            self.config.input_filter.as_ref(),
            self.config.page_size,
        )?;

        let mut seen = AHashSet::with_capacity(documents.len());
        let mut records = Vec::with_capacity(documents.len());
        let mut skipped = 0u64;
        for doc in &documents {
            match MetadataRecord::from_document(doc, &self.config.id_field) {
                Ok(record) if seen.insert(record.id.clone()) => records.push(record),
                Ok(record) => {
                    skipped += 1;
                    warn!(document = %doc.id, id = %record.id, "Skipping record with duplicate id");
                }
                Err(e) => {
                    skipped += 1;
                    warn!(document = %doc.id, error = %e, "Skipping record");
                }
            }
        }

        info!(relation = %input, records = records.len(), skipped, "Loaded metadata records");
        Ok((records, skipped))
    }

    fn load_pairs(&self, output: &RelationRef) -> Result<Vec<(String, SimilarityPair)>> {
        let documents = self.gateway.read_all(output, None, self.config.page_size)?;
        let mut pairs = Vec::with_capacity(documents.len());
        for doc in documents {
            match SimilarityPair::from_source(&doc.source) {
                Ok(pair) => pairs.push((doc.id, pair)),
                Err(e) => warn!(document = %doc.id, error = %e, "Ignoring unreadable pair document"),
            }
        }
        debug!(relation = %output, pairs = pairs.len(), "Loaded pairs for normalization");
        Ok(pairs)
    }

    /// Neighbours of `concept` in the last finished run.
    pub fn similar_to(&self, concept: &str, limit: usize) -> Result<Vec<SimilarItem>> {
        similar_to(
            self.gateway.as_ref(),
            &self.config.output_relation(),
            concept,
            limit,
            self.config.page_size,
        )
    }

    pub fn explain(&self, a: &str, b: &str) -> Result<Option<PairExplanation>> {
        explain_pair(
            self.gateway.as_ref(),
            &self.config.output_relation(),
            self.model.as_ref(),
            a,
            b,
            self.config.page_size,
        )
    }
}
