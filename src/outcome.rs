//! Result records produced by the pipelines.
//!
//! Everything here is serde-backed because these records cross the process
//! boundary: the surrounding application persists a
//! [`ValidationVerdict`] as the request's `receipt_validation_result` and
//! returns a [`GenerationOutcome`] in the approval response body. The wire
//! shapes deliberately match what the workflow's consumers already expect
//! (`is_valid`, `confidence_score`, `discrepancies`, …).
//!
//! A second reason to keep these types strict: they double as the *expected
//! shape* the model's JSON output is parsed against. A response that does
//! not deserialise into [`ValidationVerdict`] or [`PurchaseOrderDraft`] is
//! rejected wholesale — see [`crate::parse`].

use serde::{Deserialize, Deserializer, Serialize};

// ── Extraction ───────────────────────────────────────────────────────────

/// What kind of source a text extraction read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Image,
}

/// Plain text pulled out of one attachment.
///
/// Never constructed as an error value — extraction failures are recorded
/// in `error` and the struct is still returned, so the pipelines can apply
/// their own short-circuit policy instead of unwinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Concatenated text content; empty when nothing was readable.
    pub content: String,
    /// `None` when the extension was not recognised at all.
    pub source_kind: Option<SourceKind>,
    /// Set when extraction failed; `content` is then best-effort or empty.
    pub error: Option<String>,
}

impl ExtractedText {
    pub fn ok(kind: SourceKind, content: String) -> Self {
        Self {
            content,
            source_kind: Some(kind),
            error: None,
        }
    }

    pub fn failed(kind: Option<SourceKind>, error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            source_kind: kind,
            error: Some(error.into()),
        }
    }

    /// Usable means: some non-whitespace content and no recorded error.
    /// Both pipelines short-circuit on `!is_usable()` before spending a
    /// model call on empty input.
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.content.trim().is_empty()
    }
}

// ── Validation verdict ───────────────────────────────────────────────────

/// Category of a flagged mismatch between receipt and purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    Vendor,
    Items,
    Price,
    Amount,
    ExtractionError,
    SystemError,
    ValidationError,
}

/// One flagged mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    #[serde(rename = "type")]
    pub kind: DiscrepancyKind,
    pub description: String,
}

/// Fields the model read off the receipt, echoed back for the operator.
///
/// Every field is defaulted: the model is allowed to omit what it could
/// not find without failing the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptData {
    #[serde(default)]
    pub vendor: String,
    #[serde(default, deserialize_with = "stringy")]
    pub total_amount: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Outcome of validating a receipt against a purchase order.
///
/// Invariants after [`ValidationVerdict::normalise`]:
/// `confidence_score` ∈ 0..=100. `discrepancies` is informational —
/// `is_valid` is authoritative even when the model reports a positive
/// verdict alongside listed discrepancies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub confidence_score: u8,
    #[serde(default)]
    pub discrepancies: Vec<Discrepancy>,
    #[serde(default)]
    pub extracted_data: ReceiptData,
    #[serde(default)]
    pub summary: String,
    /// Raw model text, preserved verbatim when parsing failed so an
    /// operator can see what the model actually said.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ValidationVerdict {
    /// Verdict for a receipt whose text could not be extracted.
    /// No model call was made.
    pub fn extraction_failure(description: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence_score: 0,
            discrepancies: vec![Discrepancy {
                kind: DiscrepancyKind::ExtractionError,
                description: description.into(),
            }],
            extracted_data: ReceiptData::default(),
            summary: "Receipt text extraction failed".into(),
            raw_response: None,
        }
    }

    /// Verdict for model output that was not valid JSON.
    pub fn parse_failure(raw: &str) -> Self {
        Self {
            is_valid: false,
            confidence_score: 0,
            discrepancies: vec![Discrepancy {
                kind: DiscrepancyKind::ValidationError,
                description: "Failed to parse AI response".into(),
            }],
            extracted_data: ReceiptData::default(),
            summary: "AI validation failed".into(),
            raw_response: Some(raw.to_string()),
        }
    }

    /// Verdict for an infrastructure failure (model call, configuration).
    pub fn system_failure(detail: impl std::fmt::Display) -> Self {
        Self {
            is_valid: false,
            confidence_score: 0,
            discrepancies: vec![Discrepancy {
                kind: DiscrepancyKind::SystemError,
                description: detail.to_string(),
            }],
            extracted_data: ReceiptData::default(),
            summary: format!("Validation error: {detail}"),
            raw_response: None,
        }
    }

    /// Clamp model-supplied values into their documented ranges.
    pub fn normalise(mut self) -> Self {
        if self.confidence_score > 100 {
            self.confidence_score = 100;
        }
        self
    }
}

// ── Purchase-order draft ─────────────────────────────────────────────────

/// Vendor block of a purchase-order draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact: String,
}

/// One ordered line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "stringy")]
    pub quantity: String,
    #[serde(default, deserialize_with = "stringy")]
    pub unit_price: String,
    #[serde(default, deserialize_with = "stringy")]
    pub total: String,
}

/// Pricing block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default, deserialize_with = "stringy")]
    pub subtotal: String,
    #[serde(default, deserialize_with = "stringy")]
    pub tax: String,
    #[serde(default, deserialize_with = "stringy")]
    pub shipping: String,
    #[serde(default, deserialize_with = "stringy")]
    pub total: String,
}

/// Terms block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    #[serde(default)]
    pub payment: String,
    #[serde(default)]
    pub delivery: String,
    #[serde(default)]
    pub validity: String,
}

/// Structured purchase-order data extracted from a proforma invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderDraft {
    #[serde(default)]
    pub vendor: VendorInfo,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub terms: Terms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Either a usable draft or a record of why extraction produced none.
///
/// Untagged: a draft serialises as its own object, a failure as
/// `{"error": ..., "raw_response": ...}` — the two shapes downstream
/// consumers already distinguish by probing for `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PoExtraction {
    Draft(PurchaseOrderDraft),
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
    },
}

impl PoExtraction {
    pub fn is_draft(&self) -> bool {
        matches!(self, PoExtraction::Draft(_))
    }
}

// ── Generation outcome ───────────────────────────────────────────────────

/// Result of one purchase-order generation run.
///
/// `success=false` means infrastructure failure (no proforma, unreadable
/// file, render/store error). An AI-quality failure still reports
/// `success=true` with a degraded document and `extracted_data` carrying
/// the failure record — document generation is an enhancement, not a gate
/// on the approval itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub success: bool,
    pub po_file: Option<String>,
    pub extracted_data: Option<PoExtraction>,
    pub error: Option<String>,
}

impl GenerationOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            po_file: None,
            extracted_data: None,
            error: Some(error.into()),
        }
    }

    pub fn completed(po_file: String, extracted_data: PoExtraction) -> Self {
        Self {
            success: true,
            po_file: Some(po_file),
            extracted_data: Some(extracted_data),
            error: None,
        }
    }
}

// ── Serde helpers ────────────────────────────────────────────────────────

/// Accept a string, number, or null where a string is expected.
///
/// Models asked for `"quantity": "2"` will happily send `"quantity": 2`;
/// rejecting the whole draft over that would be needlessly strict. This is
/// type coercion of *valid* JSON, not repair of invalid JSON.
fn stringy<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn discrepancy_kind_wire_form_is_snake_case() {
        let d = Discrepancy {
            kind: DiscrepancyKind::ExtractionError,
            description: "x".into(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["type"], "extraction_error");
    }

    #[test]
    fn verdict_defaults_tolerate_sparse_model_output() {
        let v: ValidationVerdict =
            serde_json::from_str(r#"{"is_valid": true, "confidence_score": 95}"#).unwrap();
        assert!(v.is_valid);
        assert!(v.discrepancies.is_empty());
        assert_eq!(v.summary, "");
    }

    #[test]
    fn verdict_normalise_clamps_confidence() {
        let v: ValidationVerdict =
            serde_json::from_str(r#"{"is_valid": true, "confidence_score": 150}"#).unwrap();
        assert_eq!(v.normalise().confidence_score, 100);
    }

    #[test]
    fn line_item_accepts_numeric_fields() {
        let item: LineItem = serde_json::from_str(
            r#"{"description": "Chair", "quantity": 2, "unit_price": 250.0, "total": "500.00"}"#,
        )
        .unwrap();
        assert_eq!(item.quantity, "2");
        assert_eq!(item.unit_price, "250.0");
        assert_eq!(item.total, "500.00");
    }

    #[test]
    fn failed_extraction_serialises_with_error_key() {
        let f = PoExtraction::Failed {
            error: "Failed to parse AI response".into(),
            raw_response: Some("not json".into()),
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["error"], "Failed to parse AI response");
        assert_eq!(json["raw_response"], "not json");
    }

    #[test]
    fn draft_serialises_without_error_key() {
        let d = PoExtraction::Draft(PurchaseOrderDraft::default());
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("vendor").is_some());
    }

    #[test]
    fn extraction_failure_shape_matches_contract() {
        let v = ValidationVerdict::extraction_failure("Could not extract text from receipt");
        assert!(!v.is_valid);
        assert_eq!(v.confidence_score, 0);
        assert_eq!(v.discrepancies.len(), 1);
        assert_eq!(v.discrepancies[0].kind, DiscrepancyKind::ExtractionError);
        assert_eq!(v.summary, "Receipt text extraction failed");
    }

    #[test]
    fn usable_requires_content_and_no_error() {
        assert!(ExtractedText::ok(SourceKind::Pdf, "hello".into()).is_usable());
        assert!(!ExtractedText::ok(SourceKind::Pdf, "   ".into()).is_usable());
        assert!(!ExtractedText::failed(Some(SourceKind::Image), "boom").is_usable());
    }
}
