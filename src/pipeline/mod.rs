//! The two document pipelines.
//!
//! Both stage chains share a shape: extract text, build a prompt, call
//! the model, interpret untrusted output, and fold every failure into a
//! structured record instead of an `Err`:
//!
//! ```text
//! validate: receipt ─► extract ─► prompt ─► model ─► parse ─► ValidationVerdict
//! generate: proforma ─► extract ─► prompt ─► model ─► parse ─► render ─► store ─► GenerationOutcome
//! ```
//!
//! [`validate::validate_receipt`] is *total* — it always returns a
//! verdict. [`generate::generate_purchase_order`] distinguishes
//! infrastructure failures (`success=false`) from AI-quality failures,
//! which still produce a reviewable degraded document (`success=true`).

pub mod generate;
pub mod render;
pub mod validate;
