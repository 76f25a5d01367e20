//! End-to-end pipeline tests with an in-memory model double and store.
//!
//! No network, no API key: the completion model is injected through
//! `model_override`, and every attachment is a small PDF built in-process.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use proforma2po::{
    generate_purchase_order, validate_receipt, Attachment, AttachmentStore, CompletionModel,
    DiscrepancyKind, ModelCallError, PipelineConfig, PipelineError, PoExtraction, PurchaseRequest,
    RequestStatus,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fixtures ─────────────────────────────────────────────────────────────

/// Build a one-page PDF whose only content is `text`, so extraction has
/// something real to chew on.
fn make_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("fixture content must encode"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture must serialise");
    bytes
}

fn request(proforma: Option<Attachment>) -> PurchaseRequest {
    PurchaseRequest {
        id: 42,
        title: "Office chairs".into(),
        description: "10 ergonomic chairs from Acme Seating".into(),
        amount: Decimal::new(50000, 2),
        status: RequestStatus::Approved,
        proforma,
    }
}

/// Canned-response model that counts calls and records the last prompt.
struct StubModel {
    response: Result<String, ModelCallError>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl StubModel {
    fn replying(json: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(json.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    fn failing(error: ModelCallError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for StubModel {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(user.to_string());
        self.response.clone()
    }
}

/// In-memory store capturing every save.
#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStore {
    fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }
}

impl AttachmentStore for MemoryStore {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String, PipelineError> {
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.to_vec()));
        Ok(file_name.to_string())
    }
}

/// Store that always fails, for exercising the infrastructure-error path.
struct BrokenStore;

impl AttachmentStore for BrokenStore {
    fn save(&self, file_name: &str, _bytes: &[u8]) -> Result<String, PipelineError> {
        Err(PipelineError::Store {
            file_name: file_name.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "disk full"),
        })
    }
}

fn config_with(model: Arc<StubModel>) -> PipelineConfig {
    PipelineConfig::builder()
        .model_override(model)
        .build()
        .expect("test config must build")
}

const VERDICT_JSON: &str = r#"{
    "is_valid": true,
    "confidence_score": 95,
    "discrepancies": [],
    "extracted_data": {
        "vendor": "Acme Seating",
        "total_amount": "500.00",
        "items": ["Ergonomic chair x10"]
    },
    "summary": "Receipt matches the approved request."
}"#;

const DRAFT_JSON: &str = r#"{
    "vendor": {"name": "Acme Seating", "address": "1 Factory Road", "contact": "sales@acme.test"},
    "items": [{"description": "Ergonomic chair", "quantity": "10", "unit_price": "50.00", "total": "500.00"}],
    "pricing": {"subtotal": "500.00", "tax": "0.00", "shipping": "0.00", "total": "500.00"},
    "terms": {"payment": "Net 30", "delivery": "2 weeks", "validity": "30 days"},
    "notes": "N/A"
}"#;

// ── Validation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn validation_happy_path() {
    let model = StubModel::replying(VERDICT_JSON);
    let config = config_with(Arc::clone(&model));
    let receipt = Attachment::new(
        "receipt.pdf",
        make_pdf("ACME SEATING - 10x Ergonomic chair - TOTAL $500.00"),
    );

    let verdict = validate_receipt(&request(None), &receipt, &config).await;

    assert!(verdict.is_valid);
    assert_eq!(verdict.confidence_score, 95);
    assert_eq!(verdict.extracted_data.vendor, "Acme Seating");
    assert_eq!(model.call_count(), 1);

    let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Office chairs"));
    assert!(prompt.contains("$500.00"));
    assert!(prompt.contains("Ergonomic chair"));
}

#[tokio::test]
async fn unreadable_receipt_skips_the_model_entirely() {
    let model = StubModel::replying(VERDICT_JSON);
    let config = config_with(Arc::clone(&model));
    let receipt = Attachment::new("receipt.pdf", b"not a pdf".to_vec());

    let verdict = validate_receipt(&request(None), &receipt, &config).await;

    assert!(!verdict.is_valid);
    assert_eq!(verdict.confidence_score, 0);
    assert_eq!(verdict.summary, "Receipt text extraction failed");
    assert_eq!(verdict.discrepancies.len(), 1);
    assert_eq!(
        verdict.discrepancies[0].kind,
        DiscrepancyKind::ExtractionError
    );
    assert_eq!(
        verdict.discrepancies[0].description,
        "Could not extract text from receipt"
    );
    assert_eq!(model.call_count(), 0, "no tokens spent on empty input");
}

#[tokio::test]
async fn unsupported_receipt_format_fails_closed() {
    let model = StubModel::replying(VERDICT_JSON);
    let config = config_with(Arc::clone(&model));
    let receipt = Attachment::new("receipt.docx", b"PK...".to_vec());

    let verdict = validate_receipt(&request(None), &receipt, &config).await;

    assert!(!verdict.is_valid);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn proforma_context_reaches_the_prompt() {
    let model = StubModel::replying(VERDICT_JSON);
    let config = config_with(Arc::clone(&model));
    let proforma = Attachment::new("quote.pdf", make_pdf("QUOTE: 10 chairs at $50 each"));
    let receipt = Attachment::new("receipt.pdf", make_pdf("TOTAL $500.00"));

    validate_receipt(&request(Some(proforma)), &receipt, &config).await;

    let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Proforma Invoice Context"));
    assert!(prompt.contains("10 chairs at $50 each"));
}

#[tokio::test]
async fn unreadable_proforma_context_degrades_silently() {
    let model = StubModel::replying(VERDICT_JSON);
    let config = config_with(Arc::clone(&model));
    let proforma = Attachment::new("quote.pdf", b"corrupted".to_vec());
    let receipt = Attachment::new("receipt.pdf", make_pdf("TOTAL $500.00"));

    let verdict = validate_receipt(&request(Some(proforma)), &receipt, &config).await;

    // The run still completes on the receipt alone.
    assert!(verdict.is_valid);
    let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(!prompt.contains("Proforma Invoice Context"));
}

#[tokio::test]
async fn prose_model_output_becomes_fallback_verdict() {
    let model = StubModel::replying("The receipt looks fine to me!");
    let config = config_with(model);
    let receipt = Attachment::new("receipt.pdf", make_pdf("TOTAL $500.00"));

    let verdict = validate_receipt(&request(None), &receipt, &config).await;

    assert!(!verdict.is_valid);
    assert_eq!(verdict.confidence_score, 0);
    assert_eq!(verdict.summary, "AI validation failed");
    assert_eq!(
        verdict.raw_response.as_deref(),
        Some("The receipt looks fine to me!")
    );
}

#[tokio::test]
async fn model_outage_becomes_system_failure_verdict() {
    let model = StubModel::failing(ModelCallError::Timeout { elapsed_ms: 60_000 });
    let config = config_with(model);
    let receipt = Attachment::new("receipt.pdf", make_pdf("TOTAL $500.00"));

    let verdict = validate_receipt(&request(None), &receipt, &config).await;

    assert!(!verdict.is_valid);
    assert!(verdict.summary.starts_with("Validation error:"));
    assert_eq!(verdict.discrepancies[0].kind, DiscrepancyKind::SystemError);
}

// ── Generation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn generation_happy_path() {
    let model = StubModel::replying(DRAFT_JSON);
    let config = config_with(Arc::clone(&model));
    let store = MemoryStore::default();
    let proforma = Attachment::new("quote.pdf", make_pdf("PROFORMA: 10 chairs, total $500.00"));

    let outcome = generate_purchase_order(&request(Some(proforma)), &store, &config).await;

    assert!(outcome.success);
    assert!(outcome.error.is_none());
    assert_eq!(model.call_count(), 1);
    assert!(matches!(
        outcome.extracted_data,
        Some(PoExtraction::Draft(_))
    ));

    let files = store.files();
    assert_eq!(files.len(), 1);
    let (name, bytes) = &files[0];
    assert!(name.starts_with("PO_42_"), "got: {name}");
    assert!(name.ends_with(".pdf"));
    assert!(bytes.starts_with(b"%PDF"));

    // The stored document must carry the extracted vendor and total.
    let doc = Document::load_mem(bytes).expect("stored PO must be a valid PDF");
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let text = doc.extract_text(&pages).unwrap();
    assert!(text.contains("PURCHASE ORDER"));
    assert!(text.contains("Acme Seating"));
    assert!(text.contains("$500.00"));
}

#[tokio::test]
async fn missing_proforma_fails_before_any_work() {
    let model = StubModel::replying(DRAFT_JSON);
    let config = config_with(Arc::clone(&model));
    let store = MemoryStore::default();

    let outcome = generate_purchase_order(&request(None), &store, &config).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("No proforma invoice attached"));
    assert!(outcome.po_file.is_none());
    assert_eq!(model.call_count(), 0);
    assert!(store.files().is_empty());
}

#[tokio::test]
async fn unreadable_proforma_is_an_infrastructure_failure() {
    let model = StubModel::replying(DRAFT_JSON);
    let config = config_with(Arc::clone(&model));
    let store = MemoryStore::default();
    let proforma = Attachment::new("quote.pdf", b"garbage".to_vec());

    let outcome = generate_purchase_order(&request(Some(proforma)), &store, &config).await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Could not extract text from proforma")
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn unparseable_extraction_still_produces_a_document() {
    let model = StubModel::replying("I couldn't find structured data, sorry.");
    let config = config_with(model);
    let store = MemoryStore::default();
    let proforma = Attachment::new("quote.pdf", make_pdf("PROFORMA text"));

    let outcome = generate_purchase_order(&request(Some(proforma)), &store, &config).await;

    // AI-quality failure: degraded document, but the run succeeds.
    assert!(outcome.success);
    assert!(outcome.po_file.is_some());
    match outcome.extracted_data {
        Some(PoExtraction::Failed {
            ref error,
            ref raw_response,
        }) => {
            assert_eq!(error, "Failed to parse AI response");
            assert!(raw_response.is_some());
        }
        ref other => panic!("expected a failure record, got {other:?}"),
    }

    let files = store.files();
    assert_eq!(files.len(), 1);
    let doc = Document::load_mem(&files[0].1).unwrap();
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let text = doc.extract_text(&pages).unwrap();
    assert!(text.contains("Manual review required."));
}

#[tokio::test]
async fn model_outage_still_produces_a_document() {
    let model = StubModel::failing(ModelCallError::Api {
        status: 500,
        detail: "Internal Server Error".into(),
    });
    let config = config_with(model);
    let store = MemoryStore::default();
    let proforma = Attachment::new("quote.pdf", make_pdf("PROFORMA text"));

    let outcome = generate_purchase_order(&request(Some(proforma)), &store, &config).await;

    assert!(outcome.success);
    match outcome.extracted_data {
        Some(PoExtraction::Failed { ref error, .. }) => {
            assert!(error.starts_with("AI extraction failed:"), "got: {error}");
        }
        ref other => panic!("expected a failure record, got {other:?}"),
    }
    assert_eq!(store.files().len(), 1);
}

#[tokio::test]
async fn store_failure_is_an_infrastructure_failure() {
    let model = StubModel::replying(DRAFT_JSON);
    let config = config_with(model);
    let proforma = Attachment::new("quote.pdf", make_pdf("PROFORMA text"));

    let outcome = generate_purchase_order(&request(Some(proforma)), &BrokenStore, &config).await;

    assert!(!outcome.success);
    assert!(outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("PO generation failed:"));
    assert!(outcome.po_file.is_none());
}
