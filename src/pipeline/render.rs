//! Purchase-order document rendering.
//!
//! Turns a [`PoExtraction`] into a paginated PDF: title block, PO
//! number/date table, then — for a full draft — vendor, line items,
//! pricing, and terms tables plus optional notes. A failed extraction
//! renders a minimal document flagging manual review instead, so the
//! approval workflow still produces *something* reviewable.
//!
//! The layout engine is deliberately small: a cursor walking down the
//! page, breaking to a new page when a block would cross the bottom
//! margin. Output is byte-for-byte deterministic for a fixed timestamp;
//! only the PO number and date vary between runs
//! ([`render_with_stamp`] pins them for tests).

use crate::error::PipelineError;
use crate::outcome::{PoExtraction, PurchaseOrderDraft};
use crate::request::PurchaseRequest;
use chrono::NaiveDateTime;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

// US Letter, 0.75" margins.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;
const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 12.0;
const TITLE_SIZE: f32 = 18.0;
const LINE_HEIGHT: f32 = 14.0;
const LABEL_COLUMN: f32 = MARGIN + 110.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

/// Render a purchase order stamped with the current local time.
pub fn render_purchase_order(
    extraction: &PoExtraction,
    request: &PurchaseRequest,
) -> Result<Vec<u8>, PipelineError> {
    render_with_stamp(extraction, request, chrono::Local::now().naive_local())
}

/// Render with an explicit timestamp. Identical inputs produce identical
/// bytes, which is what regression tests pin against.
pub fn render_with_stamp(
    extraction: &PoExtraction,
    request: &PurchaseRequest,
    stamp: NaiveDateTime,
) -> Result<Vec<u8>, PipelineError> {
    let mut page = Composer::new();

    // ── Title ────────────────────────────────────────────────────────────
    let title = "PURCHASE ORDER";
    let title_x = (PAGE_WIDTH - estimate_width(title, TITLE_SIZE)) / 2.0;
    page.text_at(title_x, Font::Bold, TITLE_SIZE, title);
    page.advance(30.0);

    // ── PO details ───────────────────────────────────────────────────────
    let po_number = format!("PO-{}", stamp.format("%Y%m%d-%H%M%S"));
    let po_date = stamp.format("%B %d, %Y").to_string();
    page.labelled_row("PO Number:", &po_number, true);
    page.labelled_row("PO Date:", &po_date, true);
    page.labelled_row("Request:", &request.title, true);
    page.labelled_row("Amount:", &format!("${}", request.amount), true);
    page.advance(12.0);

    match extraction {
        PoExtraction::Draft(draft) => render_draft(&mut page, draft),
        PoExtraction::Failed { .. } => render_degraded(&mut page, request),
    }

    let pages = page.finish();
    debug!("rendered purchase order: {} page(s)", pages.len());
    build_document(pages)
}

fn render_draft(page: &mut Composer, draft: &PurchaseOrderDraft) {
    // ── Vendor ───────────────────────────────────────────────────────────
    page.section_heading("VENDOR INFORMATION");
    page.labelled_row("Vendor:", or_na(&draft.vendor.name), false);
    page.labelled_row("Address:", or_na(&draft.vendor.address), false);
    page.labelled_row("Contact:", or_na(&draft.vendor.contact), false);
    page.advance(12.0);

    // ── Items ────────────────────────────────────────────────────────────
    if !draft.items.is_empty() {
        page.section_heading("ITEMS");
        page.items_header();
        for item in &draft.items {
            page.item_row(
                or_na(&item.description),
                &item.quantity,
                &prefix_dollar(&item.unit_price),
                &prefix_dollar(&item.total),
            );
        }
        page.advance(12.0);
    }

    // ── Pricing ──────────────────────────────────────────────────────────
    page.section_heading("PRICING");
    page.pricing_row("Subtotal:", &prefix_dollar(&draft.pricing.subtotal), false);
    page.pricing_row("Tax:", &prefix_dollar(&draft.pricing.tax), false);
    page.pricing_row("Shipping:", &prefix_dollar(&draft.pricing.shipping), false);
    page.total_rule();
    page.pricing_row("Total:", &prefix_dollar(&draft.pricing.total), true);
    page.advance(12.0);

    // ── Terms ────────────────────────────────────────────────────────────
    page.section_heading("TERMS & CONDITIONS");
    page.labelled_row("Payment Terms:", or_na(&draft.terms.payment), false);
    page.labelled_row("Delivery Terms:", or_na(&draft.terms.delivery), false);
    page.labelled_row("Validity:", or_na(&draft.terms.validity), false);

    // ── Notes ────────────────────────────────────────────────────────────
    if let Some(notes) = &draft.notes {
        if !notes.is_empty() && notes != "N/A" {
            page.advance(10.0);
            page.labelled_row("Notes:", "", false);
            page.paragraph(notes);
        }
    }
}

fn render_degraded(page: &mut Composer, request: &PurchaseRequest) {
    page.labelled_row(
        "Note:",
        "Automated extraction unavailable. Manual review required.",
        true,
    );
    page.advance(6.0);
    page.labelled_row("Request Description:", "", false);
    page.paragraph(&request.description);
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Prefix `$` unless the model already included one (or gave nothing).
fn prefix_dollar(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        "$0.00".to_string()
    } else if v.starts_with('$') || v.eq_ignore_ascii_case("n/a") {
        v.to_string()
    } else {
        format!("${v}")
    }
}

/// Crude Helvetica width estimate — good enough for centring a title and
/// truncating overlong cells; exact metrics are not worth a font table.
fn estimate_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.55
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Greedy word wrap by character count.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// ── Layout engine ────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Cursor-based page composer. Collects content-stream operations per
/// page and breaks to a new page when a block would cross the bottom
/// margin.
struct Composer {
    finished: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl Composer {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.finished.push(std::mem::take(&mut self.ops));
        self.finished
    }

    fn advance(&mut self, dy: f32) {
        self.y -= dy;
    }

    /// Break to a new page if `height` points do not fit above the margin.
    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN {
            self.finished.push(std::mem::take(&mut self.ops));
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text_at(&mut self, x: f32, font: Font, size: f32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.name().into(), size.into()]));
        self.ops
            .push(Operation::new("Td", vec![x.into(), self.y.into()]));
        self.ops
            .push(Operation::new("Tj", vec![Object::string_literal(text)]));
        self.ops.push(Operation::new("ET", vec![]));
    }

    /// Set the fill grey level (0 = black, 1 = white).
    fn fill_grey(&mut self, level: f32) {
        self.ops.push(Operation::new("g", vec![level.into()]));
    }

    /// Horizontal rule at the cursor from `x1` to `x2`.
    fn rule(&mut self, x1: f32, x2: f32, width: f32) {
        self.ops.push(Operation::new("w", vec![width.into()]));
        self.ops
            .push(Operation::new("m", vec![x1.into(), self.y.into()]));
        self.ops
            .push(Operation::new("l", vec![x2.into(), self.y.into()]));
        self.ops.push(Operation::new("S", vec![]));
    }

    /// Grey label at the left margin, value in the second column. Long
    /// values wrap onto continuation lines instead of running off the
    /// right page edge.
    fn labelled_row(&mut self, label: &str, value: &str, bold_value: bool) {
        let lines = wrap(value, VALUE_WRAP_CHARS);
        self.ensure_room(lines.len().max(1) as f32 * LINE_HEIGHT);
        self.fill_grey(0.45);
        self.text_at(MARGIN, Font::Regular, BODY_SIZE, label);
        self.fill_grey(0.0);
        if lines.is_empty() {
            self.advance(LINE_HEIGHT);
            return;
        }
        let font = if bold_value { Font::Bold } else { Font::Regular };
        for line in &lines {
            self.text_at(LABEL_COLUMN, font, BODY_SIZE, line);
            self.advance(LINE_HEIGHT);
        }
    }

    fn section_heading(&mut self, heading: &str) {
        // Keep the heading attached to at least one row of its section.
        self.ensure_room(3.0 * LINE_HEIGHT);
        self.text_at(MARGIN, Font::Bold, HEADING_SIZE, heading);
        self.advance(LINE_HEIGHT + 4.0);
    }

    fn items_header(&mut self) {
        self.ensure_room(2.0 * LINE_HEIGHT);
        // Grey banner behind white header text.
        self.fill_grey(0.45);
        self.ops.push(Operation::new(
            "re",
            vec![
                MARGIN.into(),
                (self.y - 4.0).into(),
                CONTENT_WIDTH.into(),
                (LINE_HEIGHT + 2.0).into(),
            ],
        ));
        self.ops.push(Operation::new("f", vec![]));
        self.fill_grey(1.0);
        self.text_at(MARGIN + 4.0, Font::Bold, BODY_SIZE - 1.0, "Description");
        self.text_at(ITEM_QTY_X, Font::Bold, BODY_SIZE - 1.0, "Quantity");
        self.text_at(ITEM_UNIT_X, Font::Bold, BODY_SIZE - 1.0, "Unit Price");
        self.text_at(ITEM_TOTAL_X, Font::Bold, BODY_SIZE - 1.0, "Total");
        self.fill_grey(0.0);
        self.advance(LINE_HEIGHT + 2.0);
    }

    fn item_row(&mut self, description: &str, quantity: &str, unit_price: &str, total: &str) {
        self.ensure_room(LINE_HEIGHT + 2.0);
        let description = truncate(description, 46);
        self.text_at(MARGIN + 4.0, Font::Regular, BODY_SIZE - 1.0, &description);
        self.text_at(ITEM_QTY_X, Font::Regular, BODY_SIZE - 1.0, quantity);
        self.text_at(ITEM_UNIT_X, Font::Regular, BODY_SIZE - 1.0, unit_price);
        self.text_at(ITEM_TOTAL_X, Font::Regular, BODY_SIZE - 1.0, total);
        self.advance(LINE_HEIGHT - 2.0);
        self.rule(MARGIN, PAGE_WIDTH - MARGIN, 0.5);
        self.advance(6.0);
    }

    fn pricing_row(&mut self, label: &str, value: &str, bold: bool) {
        self.ensure_room(LINE_HEIGHT);
        let font = if bold { Font::Bold } else { Font::Regular };
        self.text_at(PRICING_LABEL_X, font, BODY_SIZE, label);
        self.text_at(ITEM_TOTAL_X, font, BODY_SIZE, value);
        self.advance(LINE_HEIGHT);
    }

    /// Heavy rule above the total row.
    fn total_rule(&mut self) {
        self.ensure_room(LINE_HEIGHT);
        self.advance(2.0);
        self.rule(PRICING_LABEL_X, PAGE_WIDTH - MARGIN, 1.5);
        self.advance(LINE_HEIGHT - 2.0);
    }

    /// Wrapped free-text block in the value column.
    fn paragraph(&mut self, text: &str) {
        for line in wrap(text, VALUE_WRAP_CHARS) {
            self.ensure_room(LINE_HEIGHT);
            self.text_at(LABEL_COLUMN, Font::Regular, BODY_SIZE, &line);
            self.advance(LINE_HEIGHT);
        }
    }
}

// The value column spans LABEL_COLUMN..(PAGE_WIDTH - MARGIN); ~70 body
// characters fit by the Helvetica width estimate.
const VALUE_WRAP_CHARS: usize = 70;

const ITEM_QTY_X: f32 = 330.0;
const ITEM_UNIT_X: f32 = 405.0;
const ITEM_TOTAL_X: f32 = 488.0;
const PRICING_LABEL_X: f32 = 370.0;

// ── Document assembly ────────────────────────────────────────────────────

fn build_document(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, PipelineError> {
    let render_err = |detail: String| PipelineError::Render { detail };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| render_err(format!("content stream encoding failed: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| render_err(format!("PDF serialisation failed: {e}")))?;
    Ok(bytes)
}
