//! Manual-review triage over extracted field confidences.
//!
//! A document needs a human if any single field came back `unsure`. The
//! decision ignores document type and field values, and an empty field set
//! never needs review.

use crate::schema::FieldExtraction;

/// True iff at least one field has confidence `unsure`.
pub fn needs_manual_review<'a>(fields: impl IntoIterator<Item = &'a FieldExtraction>) -> bool {
    fields.into_iter().any(FieldExtraction::is_unsure)
}
