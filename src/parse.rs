//! Fail-closed interpretation of untrusted model output.
//!
//! The prompts demand "JSON only, no prose", but that is a request, not a
//! guarantee: models wrap output in markdown fences, prepend "Sure, here's
//! the analysis:", or truncate mid-object when the token budget runs out.
//!
//! Policy: one strict `serde_json` parse of the trimmed text. No fence
//! stripping, no bracket balancing, no other heuristic repair — a response
//! we cannot parse exactly is a response we refuse to trust, and it
//! becomes an explicit negative record with the raw text preserved for the
//! operator. An unparseable AI response must never silently count as a
//! pass.
//!
//! Both functions are total and idempotent: same input, same record, no
//! panics, no `Err`.

use crate::outcome::{PoExtraction, PurchaseOrderDraft, ValidationVerdict};
use tracing::warn;

/// Parse raw model text as a [`ValidationVerdict`].
///
/// On parse failure, returns the fallback verdict: `is_valid=false`,
/// confidence 0, one `validation_error` discrepancy, raw text attached.
pub fn parse_verdict(raw: &str) -> ValidationVerdict {
    match serde_json::from_str::<ValidationVerdict>(raw.trim()) {
        Ok(verdict) => verdict.normalise(),
        Err(e) => {
            warn!("model verdict was not valid JSON: {e}");
            ValidationVerdict::parse_failure(raw)
        }
    }
}

/// Parse raw model text as a [`PurchaseOrderDraft`].
///
/// On parse failure, returns [`PoExtraction::Failed`] — the generation
/// pipeline still renders a degraded document from it.
pub fn parse_po_draft(raw: &str) -> PoExtraction {
    match serde_json::from_str::<PurchaseOrderDraft>(raw.trim()) {
        Ok(draft) => PoExtraction::Draft(draft),
        Err(e) => {
            warn!("model draft was not valid JSON: {e}");
            PoExtraction::Failed {
                error: "Failed to parse AI response".into(),
                raw_response: Some(raw.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::DiscrepancyKind;
    use pretty_assertions::assert_eq;

    const GOOD_VERDICT: &str = r#"{
        "is_valid": true,
        "confidence_score": 92,
        "discrepancies": [],
        "extracted_data": {
            "vendor": "Acme Seating",
            "total_amount": "500.00",
            "items": ["Office chair x10"]
        },
        "summary": "Receipt matches the purchase order."
    }"#;

    #[test]
    fn valid_verdict_passes_through() {
        let v = parse_verdict(GOOD_VERDICT);
        assert!(v.is_valid);
        assert_eq!(v.confidence_score, 92);
        assert_eq!(v.extracted_data.vendor, "Acme Seating");
        assert!(v.raw_response.is_none());
    }

    #[test]
    fn parse_is_idempotent() {
        assert_eq!(parse_verdict(GOOD_VERDICT), parse_verdict(GOOD_VERDICT));
    }

    #[test]
    fn prose_becomes_fallback_verdict() {
        let raw = "Sure, here's the analysis: the receipt looks fine to me!";
        let v = parse_verdict(raw);
        assert!(!v.is_valid);
        assert_eq!(v.confidence_score, 0);
        assert_eq!(v.discrepancies.len(), 1);
        assert_eq!(v.discrepancies[0].kind, DiscrepancyKind::ValidationError);
        assert_eq!(v.summary, "AI validation failed");
        assert_eq!(v.raw_response.as_deref(), Some(raw));
    }

    #[test]
    fn fenced_json_is_not_repaired() {
        // A fenced block is prose from the parser's point of view.
        let raw = "```json\n{\"is_valid\": true, \"confidence_score\": 90}\n```";
        let v = parse_verdict(raw);
        assert!(!v.is_valid);
        assert_eq!(v.raw_response.as_deref(), Some(raw));
    }

    #[test]
    fn truncated_json_fails_closed() {
        let v = parse_verdict(r#"{"is_valid": true, "confidence_sco"#);
        assert!(!v.is_valid);
    }

    #[test]
    fn overflowing_confidence_is_clamped() {
        let v = parse_verdict(r#"{"is_valid": true, "confidence_score": 120}"#);
        assert_eq!(v.confidence_score, 100);
    }

    #[test]
    fn valid_draft_parses() {
        let raw = r#"{
            "vendor": {"name": "Acme", "address": "1 Road", "contact": "a@acme.test"},
            "items": [{"description": "Chair", "quantity": "10", "unit_price": "50.00", "total": "500.00"}],
            "pricing": {"subtotal": "500.00", "tax": "0.00", "shipping": "0.00", "total": "500.00"},
            "terms": {"payment": "Net 30", "delivery": "2 weeks", "validity": "30 days"},
            "notes": "N/A"
        }"#;
        match parse_po_draft(raw) {
            PoExtraction::Draft(d) => {
                assert_eq!(d.vendor.name, "Acme");
                assert_eq!(d.items.len(), 1);
                assert_eq!(d.pricing.total, "500.00");
            }
            PoExtraction::Failed { .. } => panic!("expected a draft"),
        }
    }

    #[test]
    fn prose_draft_becomes_failed_record() {
        match parse_po_draft("I could not find any invoice data.") {
            PoExtraction::Failed {
                error,
                raw_response,
            } => {
                assert_eq!(error, "Failed to parse AI response");
                assert_eq!(
                    raw_response.as_deref(),
                    Some("I could not find any invoice data.")
                );
            }
            PoExtraction::Draft(_) => panic!("expected failure"),
        }
    }
}
