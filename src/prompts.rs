//! Prompt templates for receipt validation and proforma extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the demanded JSON shape means
//!    editing exactly one place, next to the matching serde type in
//!    [`crate::outcome`].
//!
//! 2. **Testability** — unit tests inspect the built prompts directly
//!    without a live model, so a template regression (a dropped field, a
//!    renamed key) is caught immediately.
//!
//! Both templates end with a "JSON only, no prose" instruction. That is a
//! *soft* constraint: models violate it often enough that
//! [`crate::parse`] treats any non-JSON response as a first-class outcome.

use crate::request::PurchaseRequest;

/// System role for receipt validation.
pub const VALIDATION_SYSTEM_PROMPT: &str = "You are a financial auditor validating receipts \
against purchase orders. Always respond in valid JSON format.";

/// System role for purchase-order extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a procurement specialist. Extract structured \
data from proforma invoices and respond in valid JSON format only.";

/// Build the receipt-validation prompt.
///
/// `proforma_text` is best-effort context: when the request still has its
/// proforma attached and readable, the original quote is shown to the
/// model alongside the receipt so vendor/item comparisons have something
/// concrete to anchor on.
pub fn validation_prompt(
    request: &PurchaseRequest,
    receipt_text: &str,
    proforma_text: Option<&str>,
) -> String {
    let proforma_section = match proforma_text {
        Some(text) => format!("\n**Proforma Invoice Context:**\n{text}\n"),
        None => String::new(),
    };

    format!(
        r#"You are a financial auditor validating a receipt against a purchase order (PO).

**Purchase Order Information:**
- Title: {title}
- Description: {description}
- Approved Amount: ${amount}
- Status: {status}

**Receipt Text Extracted:**
{receipt_text}
{proforma_section}
**Task:**
Compare the receipt with the PO and validate the following:
1. **Vendor/Seller**: Does the seller on the receipt match the vendor mentioned in the PO description or title?
2. **Items**: Do the items on the receipt match the items described in the PO?
3. **Prices**: Are the prices on the receipt consistent with the approved amount?
4. **Total Amount**: Does the total on the receipt match or is close to the approved PO amount?

**Output Format (JSON):**
{{
    "is_valid": true/false,
    "confidence_score": 0-100,
    "discrepancies": [
        {{"type": "vendor/items/price/amount", "description": "details of mismatch"}}
    ],
    "extracted_data": {{
        "vendor": "vendor name from receipt",
        "total_amount": "total from receipt",
        "items": ["list of items"]
    }},
    "summary": "brief validation summary"
}}

Provide only the JSON output, no additional text."#,
        title = request.title,
        description = request.description,
        amount = request.amount,
        status = request.status,
    )
}

/// Build the proforma-to-purchase-order extraction prompt.
pub fn extraction_prompt(request: &PurchaseRequest, proforma_text: &str) -> String {
    format!(
        r#"You are a procurement specialist extracting information from a proforma invoice to create a Purchase Order.

**Purchase Request Information:**
- Title: {title}
- Description: {description}
- Approved Amount: ${amount}

**Proforma Invoice Text:**
{proforma_text}

**Task:**
Extract the following information to generate a Purchase Order:
1. **Vendor Information**: Company name, address, contact details
2. **Items**: List of items with descriptions, quantities, and unit prices
3. **Pricing**: Subtotal, taxes, shipping, total amount
4. **Terms**: Payment terms, delivery terms, validity period

**Output Format (JSON):**
{{
    "vendor": {{
        "name": "Vendor company name",
        "address": "Vendor address",
        "contact": "Phone/email"
    }},
    "items": [
        {{
            "description": "Item name/description",
            "quantity": "quantity",
            "unit_price": "price per unit",
            "total": "total price"
        }}
    ],
    "pricing": {{
        "subtotal": "subtotal amount",
        "tax": "tax amount",
        "shipping": "shipping cost",
        "total": "total amount"
    }},
    "terms": {{
        "payment": "payment terms",
        "delivery": "delivery terms",
        "validity": "validity period"
    }},
    "notes": "Any additional notes or special instructions"
}}

Provide only the JSON output, no additional text. If information is not available, use "N/A"."#,
        title = request.title,
        description = request.description,
        amount = request.amount,
    )
}
