use std::sync::Arc;

use tokio::task::JoinSet;
use uuid::Uuid;

use crate::models::{ExtractedReceipt, ImagePayload, UploadCandidate};
use crate::services::claude::{ClaudeExtractor, ExtractError};

/// Per-receipt result of a batch run, keyed by the candidate's identity
/// rather than by completion order.
#[derive(Debug)]
pub struct ReceiptOutcome {
    pub receipt_id: Uuid,
    pub file_name: String,
    pub result: Result<ExtractedReceipt, ExtractError>,
}

pub async fn process_receipt(
    extractor: &ClaudeExtractor,
    candidate: &UploadCandidate,
) -> Result<ExtractedReceipt, ExtractError> {
    tracing::info!(receipt_id = %candidate.id, file = %candidate.name, "processing receipt");
    let payload = ImagePayload::from_candidate(candidate);
    extractor.extract(&payload).await
}

/// Runs one independent extraction per candidate. Outcomes are collected as
/// the calls complete, in no particular order; a failed item never aborts
/// the rest of the batch.
pub async fn process_batch(
    extractor: Arc<ClaudeExtractor>,
    candidates: Vec<UploadCandidate>,
) -> Vec<ReceiptOutcome> {
    let mut tasks = JoinSet::new();
    for candidate in candidates {
        let extractor = extractor.clone();
        tasks.spawn(async move {
            let result = process_receipt(&extractor, &candidate).await;
            ReceiptOutcome {
                receipt_id: candidate.id,
                file_name: candidate.name,
                result,
            }
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => {
                if let Err(err) = &outcome.result {
                    tracing::warn!(receipt_id = %outcome.receipt_id, file = %outcome.file_name, error = %err, "receipt extraction failed");
                }
                outcomes.push(outcome);
            }
            Err(err) => tracing::error!(error = %err, "extraction task aborted"),
        }
    }
    outcomes
}
