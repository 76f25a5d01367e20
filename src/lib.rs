//! # proforma2po
//!
//! Document automation for purchase-request approval workflows: validate
//! expense receipts against approved requests with an LLM, and turn
//! proforma invoices into purchase-order PDFs.
//!
//! ## Why this crate?
//!
//! Approval workflows collect messy attachments — scanned receipts,
//! vendor quotes, phone photos — and somebody has to check them against
//! what was actually approved. This crate does the mechanical part: it
//! pulls text out of the attachment, asks a completion model to compare
//! or extract, and refuses to trust anything the model says that is not
//! exactly the JSON it was asked for. Every failure becomes a structured,
//! serialisable record, so the surrounding workflow never blocks on a
//! flaky model or an unreadable scan.
//!
//! ## Pipeline Overview
//!
//! ```text
//! receipt.pdf / .jpg
//!  │
//!  ├─ 1. Extract  lopdf page text, or OCR for raster images
//!  ├─ 2. Prompt   request fields + receipt text (+ proforma context)
//!  ├─ 3. Model    one chat completion, temperature 0.3
//!  ├─ 4. Parse    strict JSON or fail-closed fallback
//!  └─ 5. Verdict  ValidationVerdict (always — never an Err)
//!
//! proforma.pdf
//!  │
//!  ├─ 1-4. as above, extracting a PurchaseOrderDraft
//!  ├─ 5. Render   paginated PO PDF (degraded document on AI failure)
//!  └─ 6. Store    PO_{id}_{timestamp}.pdf via AttachmentStore
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use proforma2po::{
//!     generate_purchase_order, validate_receipt, Attachment, DirStore,
//!     PipelineConfig, PurchaseRequest, RequestStatus,
//! };
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env()?; // reads OPENAI_API_KEY
//!     let request = PurchaseRequest {
//!         id: 42,
//!         title: "Office chairs".into(),
//!         description: "10 ergonomic chairs from Acme Seating".into(),
//!         amount: Decimal::new(50000, 2),
//!         status: RequestStatus::Approved,
//!         proforma: Some(Attachment::from_path("quote.pdf")?),
//!     };
//!
//!     let receipt = Attachment::from_path("receipt.pdf")?;
//!     let verdict = validate_receipt(&request, &receipt, &config).await;
//!     println!("valid: {} ({}%)", verdict.is_valid, verdict.confidence_score);
//!
//!     let store = DirStore::new("./purchase_orders");
//!     let outcome = generate_purchase_order(&request, &store, &config).await;
//!     println!("PO: {:?}", outcome.po_file);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `proforma2po` binary (clap + anyhow + tracing-subscriber) |
//! | `ocr`   | off     | Raster-image receipts via `pure-onnx-ocr` (needs model files on disk) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! proforma2po = { version = "0.1", default-features = false }
//! ```
//!
//! ## Failure policy
//!
//! The two entry points never panic and never bubble a model problem up
//! as an `Err`:
//!
//! * [`validate_receipt`] is total — unreadable receipt, model outage, or
//!   unparseable output each map onto a distinct fail-closed
//!   [`ValidationVerdict`] with `is_valid=false` and confidence 0.
//! * [`generate_purchase_order`] reports `success=false` only for
//!   infrastructure problems (no proforma, unreadable file, render/store
//!   failure). Bad model output still yields a PDF flagged for manual
//!   review, because document generation must not gate the approval.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod outcome;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use error::{ModelCallError, PipelineError};
pub use extract::{OcrBackend, TextExtractor};
pub use model::{resolve_model, CompletionModel, OpenAiChatClient};
pub use outcome::{
    Discrepancy, DiscrepancyKind, ExtractedText, GenerationOutcome, LineItem, PoExtraction,
    Pricing, PurchaseOrderDraft, ReceiptData, SourceKind, Terms, ValidationVerdict, VendorInfo,
};
pub use parse::{parse_po_draft, parse_verdict};
pub use pipeline::generate::generate_purchase_order;
pub use pipeline::render::{render_purchase_order, render_with_stamp};
pub use pipeline::validate::validate_receipt;
pub use request::{Attachment, AttachmentStore, DirStore, PurchaseRequest, RequestStatus};

#[cfg(feature = "ocr")]
pub use extract::PureOcr;
