//! Bulk-load metadata records from JSON Lines into the input relation.

use featsim_core::{FieldSpec, Result};
use featsim_similarity::PipelineConfig;
use featsim_storage::{BulkOp, BulkProcessor, BulkStats, CatalogGateway};
use serde::Serialize;
use serde_json::Value;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestReport {
    pub lines: u64,
    pub ingested: u64,
    pub skipped: u64,
    pub writes: BulkStats,
}

/// Write one document per non-blank line. A record whose identifier field is
/// a string keeps it as document id, so reloading the same file replaces
/// rather than duplicates.
pub fn ingest_jsonl<R: BufRead>(
    gateway: Arc<dyn CatalogGateway>,
    config: &PipelineConfig,
    reader: R,
) -> Result<IngestReport> {
    let relation = config.input_relation();
    gateway.declare_schema(&relation, &[FieldSpec::keyword(config.id_field.as_str())])?;

    let bulk = BulkProcessor::new(gateway.clone(), config.bulk)?;
    let mut report = IngestReport::default();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        report.lines += 1;

        let source: Value = match serde_json::from_str(&line) {
            Ok(source @ Value::Object(_)) => source,
            Ok(_) => {
                report.skipped += 1;
                warn!(line = number + 1, "Skipping line: not a JSON object");
                continue;
            }
            Err(e) => {
                report.skipped += 1;
                warn!(line = number + 1, error = %e, "Skipping line: invalid JSON");
                continue;
            }
        };

        let id = source
            .get(&config.id_field)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        bulk.add(BulkOp::Index {
            relation: relation.clone(),
            id,
            source,
        });
        report.ingested += 1;
    }

    report.writes = bulk.close();
    gateway.make_visible(&relation)?;
    info!(
        relation = %relation,
        ingested = report.ingested,
        skipped = report.skipped,
        "Metadata records loaded"
    );
    Ok(report)
}
