//! Receipt validation pipeline.

use crate::config::PipelineConfig;
use crate::model::resolve_model;
use crate::outcome::ValidationVerdict;
use crate::parse::parse_verdict;
use crate::prompts::{self, VALIDATION_SYSTEM_PROMPT};
use crate::request::{Attachment, PurchaseRequest};
use tracing::{debug, info, warn};

/// Validate `receipt` against `request` and return a verdict.
///
/// Total: every failure mode maps onto a fail-closed
/// [`ValidationVerdict`] rather than an error. The short-circuit order
/// matters for cost — an unreadable receipt never spends a model call.
pub async fn validate_receipt(
    request: &PurchaseRequest,
    receipt: &Attachment,
    config: &PipelineConfig,
) -> ValidationVerdict {
    let extractor = config.extractor();

    let receipt_text = extractor.extract(&receipt.data, &receipt.file_name);
    if !receipt_text.is_usable() {
        warn!(
            request_id = request.id,
            file = %receipt.file_name,
            error = receipt_text.error.as_deref().unwrap_or("no text"),
            "receipt unreadable, skipping model call"
        );
        return ValidationVerdict::extraction_failure("Could not extract text from receipt");
    }

    // Proforma context is best-effort: a missing or unreadable proforma
    // degrades the prompt, never the run.
    let proforma_text = request.proforma.as_ref().and_then(|p| {
        let extracted = extractor.extract(&p.data, &p.file_name);
        if extracted.is_usable() {
            Some(extracted.content)
        } else {
            debug!(
                file = %p.file_name,
                "proforma context unavailable: {}",
                extracted.error.as_deref().unwrap_or("no text")
            );
            None
        }
    });

    let prompt = prompts::validation_prompt(request, &receipt_text.content, proforma_text.as_deref());

    let model = match resolve_model(config) {
        Ok(model) => model,
        Err(e) => return ValidationVerdict::system_failure(e),
    };

    info!(request_id = request.id, "validating receipt");
    match model
        .complete(
            VALIDATION_SYSTEM_PROMPT,
            &prompt,
            config.max_validation_tokens,
            config.temperature,
        )
        .await
    {
        Ok(raw) => parse_verdict(&raw),
        Err(e) => {
            warn!(request_id = request.id, "model call failed: {e}");
            ValidationVerdict::system_failure(e)
        }
    }
}
