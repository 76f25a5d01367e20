//! Purchase-order generation pipeline.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::resolve_model;
use crate::outcome::{GenerationOutcome, PoExtraction};
use crate::parse::parse_po_draft;
use crate::pipeline::render::render_purchase_order;
use crate::prompts::{self, EXTRACTION_SYSTEM_PROMPT};
use crate::request::{AttachmentStore, PurchaseRequest};
use tracing::{info, warn};

/// Generate a purchase-order PDF for an approved `request` and save it
/// through `store`.
///
/// Failure policy:
/// * no proforma, unreadable proforma, render or store failure —
///   infrastructure problems, reported as `success=false`;
/// * model call or parse failure — AI-quality problems, the run still
///   renders a degraded document and reports `success=true` so the
///   approval itself is never blocked on model quality.
pub async fn generate_purchase_order(
    request: &PurchaseRequest,
    store: &dyn AttachmentStore,
    config: &PipelineConfig,
) -> GenerationOutcome {
    let Some(proforma) = &request.proforma else {
        return GenerationOutcome::failure(PipelineError::MissingProforma.to_string());
    };

    let proforma_text = config.extractor().extract(&proforma.data, &proforma.file_name);
    if !proforma_text.is_usable() {
        warn!(
            request_id = request.id,
            file = %proforma.file_name,
            error = proforma_text.error.as_deref().unwrap_or("no text"),
            "proforma unreadable"
        );
        return GenerationOutcome::failure("Could not extract text from proforma");
    }

    info!(request_id = request.id, "extracting purchase-order data");
    let extraction = extract_draft(request, &proforma_text.content, config).await;

    let pdf = match render_purchase_order(&extraction, request) {
        Ok(bytes) => bytes,
        Err(e) => return GenerationOutcome::failure(format!("PO generation failed: {e}")),
    };

    let file_name = format!(
        "PO_{}_{}.pdf",
        request.id,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    match store.save(&file_name, &pdf) {
        Ok(stored) => {
            info!(request_id = request.id, file = %stored, "purchase order saved");
            GenerationOutcome::completed(stored, extraction)
        }
        Err(e) => GenerationOutcome::failure(format!("PO generation failed: {e}")),
    }
}

/// Run the model over the proforma text. Call and parse failures both
/// fold into [`PoExtraction::Failed`]; the caller renders a degraded
/// document from it.
async fn extract_draft(
    request: &PurchaseRequest,
    proforma_text: &str,
    config: &PipelineConfig,
) -> PoExtraction {
    let model = match resolve_model(config) {
        Ok(model) => model,
        Err(e) => {
            return PoExtraction::Failed {
                error: format!("AI extraction failed: {e}"),
                raw_response: None,
            }
        }
    };

    let prompt = prompts::extraction_prompt(request, proforma_text);
    match model
        .complete(
            EXTRACTION_SYSTEM_PROMPT,
            &prompt,
            config.max_extraction_tokens,
            config.temperature,
        )
        .await
    {
        Ok(raw) => parse_po_draft(&raw),
        Err(e) => {
            warn!(request_id = request.id, "model call failed: {e}");
            PoExtraction::Failed {
                error: format!("AI extraction failed: {e}"),
                raw_response: None,
            }
        }
    }
}
