//! Error types for the proforma2po library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — a pipeline *component* failed (unreadable file,
//!   unrenderable document, misconfigured client). Components return these
//!   as ordinary `Err` values; the pipeline boundary converts every one of
//!   them into a structured verdict or outcome record, so callers of
//!   [`crate::pipeline::validate::validate_receipt`] and
//!   [`crate::pipeline::generate::generate_purchase_order`] never see them.
//!
//! * [`ModelCallError`] — the remote completion endpoint misbehaved
//!   (network, auth, quota, timeout). Kept separate so callers of
//!   [`crate::model::CompletionModel`] can distinguish "retry later" from
//!   "fix your key" without string matching.
//!
//! The fail-closed rule: an error anywhere in a pipeline run produces a
//! well-formed negative result, never a crash of the triggering workflow
//! step.

use std::path::PathBuf;
use thiserror::Error;

/// Component-level errors raised inside the pipelines.
///
/// These never escape [`crate::pipeline`]'s public functions — they are
/// folded into [`crate::outcome::ValidationVerdict`] or
/// [`crate::outcome::GenerationOutcome`] at the boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The purchase request carries no proforma attachment.
    #[error("No proforma invoice attached")]
    MissingProforma,

    /// Attachment file could not be read from disk.
    #[error("Failed to read attachment '{path}': {source}")]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// OCR was requested but no backend is configured, or the backend failed.
    #[error("OCR failed: {detail}")]
    Ocr { detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The remote completion call failed; see [`ModelCallError`].
    #[error(transparent)]
    Model(#[from] ModelCallError),

    /// No API key and no injected model — the client cannot be built.
    #[error("model is not configured: {hint}")]
    ModelNotConfigured { hint: String },

    // ── Rendering / persistence errors ────────────────────────────────────
    /// The purchase-order document could not be assembled.
    #[error("failed to render purchase order document: {detail}")]
    Render { detail: String },

    /// The generated document could not be written to the attachment slot.
    #[error("failed to save '{file_name}': {source}")]
    Store {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Classified failures of one round-trip to the completion endpoint.
///
/// The client performs no automatic retries (the pipelines degrade
/// gracefully instead), so each variant describes exactly one attempt.
#[derive(Debug, Clone, Error)]
pub enum ModelCallError {
    /// HTTP 401/403 — the key is wrong or lacks access; retry will not help.
    #[error("authentication rejected by model endpoint (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// HTTP 429 — caller should back off. `retry_after_secs` carries the
    /// server-specified delay when one was sent.
    #[error("rate limit exceeded at model endpoint")]
    RateLimit { retry_after_secs: Option<u64> },

    /// Any other non-2xx response.
    #[error("model endpoint returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The configured request timeout elapsed before a full response.
    #[error("model call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("network error talking to model endpoint: {detail}")]
    Network { detail: String },

    /// A 2xx response with no usable completion in it.
    #[error("model returned an empty response")]
    EmptyResponse,
}
