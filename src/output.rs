//! Result types produced by the processing pipeline.
//!
//! A [`ProcessingOutcome`] is built fresh for every invocation and never
//! mutated after it is returned. Expected terminal classifications are
//! ordinary variants here, not errors; callers that prefer `?` can turn
//! them into typed errors with [`ProcessingOutcome::into_result`].

use crate::error::IdScanError;
use crate::pipeline::triage::needs_manual_review;
use crate::schema::{
    ClassificationResult, DocumentType, FieldExtraction, LicenseData, LicenseResponse,
    PassportData, PassportResponse,
};
use serde::{Deserialize, Serialize};

// ── Extracted data ───────────────────────────────────────────────────────

/// The field set of a supported document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedData {
    Passport(PassportData),
    License(LicenseData),
}

impl ExtractedData {
    /// All fields with their wire names, in schema order.
    pub fn fields(&self) -> Vec<(&'static str, &FieldExtraction)> {
        match self {
            ExtractedData::Passport(d) => d.fields().to_vec(),
            ExtractedData::License(d) => d.fields().to_vec(),
        }
    }

    pub fn unsure_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, f)| f.is_unsure())
            .map(|(name, _)| name)
            .collect()
    }
}

/// The extractor's full answer, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResponse {
    Passport(PassportResponse),
    License(LicenseResponse),
}

impl ExtractionResponse {
    pub fn image_analysis(&self) -> &str {
        match self {
            ExtractionResponse::Passport(r) => &r.image_analysis,
            ExtractionResponse::License(r) => &r.image_analysis,
        }
    }

    pub fn data(&self) -> ExtractedData {
        match self {
            ExtractionResponse::Passport(r) => ExtractedData::Passport(r.passport_data.clone()),
            ExtractionResponse::License(r) => ExtractedData::License(r.license_data.clone()),
        }
    }
}

// ── Processing result ────────────────────────────────────────────────────

/// Diagnostics carried alongside the extracted fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub classification: ClassificationResult,
    pub extraction: ExtractionResponse,
}

/// A successfully processed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub document_type: DocumentType,
    pub extracted_data: ExtractedData,
    pub metadata: ProcessingMetadata,
}

impl ProcessingResult {
    pub fn new(classification: ClassificationResult, extraction: ExtractionResponse) -> Self {
        Self {
            document_type: classification.document_type,
            extracted_data: extraction.data(),
            metadata: ProcessingMetadata {
                classification,
                extraction,
            },
        }
    }

    /// Shape handed to the persistence collaborator.
    pub fn to_record(&self, needs_manual_review: bool) -> ExtractionRecord {
        ExtractionRecord {
            document_type: self.document_type,
            extracted_data: self.extracted_data.clone(),
            needs_manual_review,
            manual_review_completed: false,
            metadata: self.metadata.clone(),
        }
    }
}

/// Outcome of one pipeline invocation that did not fail fatally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    /// Classified as a supported type and extracted.
    Processed {
        result: ProcessingResult,
        /// Computed once from the field confidences when the result is built.
        needs_manual_review: bool,
    },
    /// Classified as `indecipherable` or `not_a_document`.
    NotRecognized(ClassificationResult),
    /// Classified as a real document type that has no extractor.
    Unsupported(ClassificationResult),
}

impl ProcessingOutcome {
    /// Wrap an extraction result, deriving its review flag.
    pub fn processed(result: ProcessingResult) -> Self {
        let needs_manual_review = needs_manual_review(
            result
                .extracted_data
                .fields()
                .into_iter()
                .map(|(_, f)| f),
        );
        ProcessingOutcome::Processed {
            result,
            needs_manual_review,
        }
    }

    pub fn document_type(&self) -> DocumentType {
        self.classification().document_type
    }

    pub fn classification(&self) -> &ClassificationResult {
        match self {
            ProcessingOutcome::Processed { result, .. } => &result.metadata.classification,
            ProcessingOutcome::NotRecognized(c) | ProcessingOutcome::Unsupported(c) => c,
        }
    }

    /// Terminal outcomes have no fields and are never flagged.
    pub fn needs_manual_review(&self) -> bool {
        matches!(
            self,
            ProcessingOutcome::Processed {
                needs_manual_review: true,
                ..
            }
        )
    }

    pub fn result(&self) -> Option<&ProcessingResult> {
        match self {
            ProcessingOutcome::Processed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Persistence record; `None` for terminal outcomes.
    pub fn to_record(&self) -> Option<ExtractionRecord> {
        match self {
            ProcessingOutcome::Processed {
                result,
                needs_manual_review,
            } => Some(result.to_record(*needs_manual_review)),
            _ => None,
        }
    }

    /// Convert terminal classifications into their typed errors.
    pub fn into_result(self) -> Result<ProcessingResult, IdScanError> {
        match self {
            ProcessingOutcome::Processed { result, .. } => Ok(result),
            ProcessingOutcome::NotRecognized(c) => Err(IdScanError::DocumentNotRecognized {
                document_type: c.document_type,
                image_analysis: c.image_analysis,
            }),
            ProcessingOutcome::Unsupported(c) => Err(IdScanError::UnsupportedDocumentType {
                document_type: c.document_type,
                image_analysis: c.image_analysis,
            }),
        }
    }

    /// One-line description for logs and progress output.
    pub fn summary(&self) -> String {
        match self {
            ProcessingOutcome::Processed {
                result,
                needs_manual_review,
            } => {
                if *needs_manual_review {
                    format!(
                        "{}: needs review ({})",
                        result.document_type,
                        result.extracted_data.unsure_fields().join(", ")
                    )
                } else {
                    format!("{}: all fields high confidence", result.document_type)
                }
            }
            ProcessingOutcome::NotRecognized(c) => format!("not recognized ({})", c.document_type),
            ProcessingOutcome::Unsupported(c) => format!("unsupported ({})", c.document_type),
        }
    }
}

/// The record stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub document_type: DocumentType,
    pub extracted_data: ExtractedData,
    pub needs_manual_review: bool,
    pub manual_review_completed: bool,
    pub metadata: ProcessingMetadata,
}

// ── Batch output ─────────────────────────────────────────────────────────

/// One input of a batch and what became of it.
#[derive(Debug)]
pub struct BatchItem {
    /// 1-indexed position in the batch.
    pub index: usize,
    pub input: String,
    pub outcome: Result<ProcessingOutcome, IdScanError>,
}

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub not_recognized: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub flagged_for_review: usize,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn from_items(items: &[BatchItem], duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            total: items.len(),
            duration_ms,
            ..Default::default()
        };
        for item in items {
            match &item.outcome {
                Ok(o @ ProcessingOutcome::Processed { .. }) => {
                    stats.processed += 1;
                    if o.needs_manual_review() {
                        stats.flagged_for_review += 1;
                    }
                }
                Ok(ProcessingOutcome::NotRecognized(_)) => stats.not_recognized += 1,
                Ok(ProcessingOutcome::Unsupported(_)) => stats.unsupported += 1,
                Err(_) => stats.failed += 1,
            }
        }
        stats
    }
}

/// Everything a batch run produced, in input order.
#[derive(Debug)]
pub struct BatchOutput {
    pub items: Vec<BatchItem>,
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::passport;

    fn classification(document_type: DocumentType, analysis: &str) -> ClassificationResult {
        ClassificationResult {
            image_analysis: analysis.to_string(),
            document_type,
        }
    }

    fn processed(unsure: &[&str]) -> ProcessingOutcome {
        let extraction = ExtractionResponse::Passport(PassportResponse {
            image_analysis: "US passport photo page".into(),
            passport_data: passport(unsure),
        });
        ProcessingOutcome::processed(ProcessingResult::new(
            classification(DocumentType::AmericanPassport, "US passport"),
            extraction,
        ))
    }

    #[test]
    fn two_unsure_fields_flag_the_passport() {
        let outcome = processed(&["surname", "birth_date"]);
        assert_eq!(outcome.document_type(), DocumentType::AmericanPassport);
        assert!(outcome.needs_manual_review());
        let result = outcome.result().unwrap();
        assert_eq!(result.extracted_data.fields().len(), 11);
        assert_eq!(result.extracted_data.unsure_fields(), ["surname", "birth_date"]);
        assert!(outcome.summary().contains("surname, birth_date"));
    }

    #[test]
    fn all_high_passport_is_not_flagged() {
        let outcome = processed(&[]);
        assert!(!outcome.needs_manual_review());
        let record = outcome.to_record().unwrap();
        assert!(!record.needs_manual_review);
        assert!(!record.manual_review_completed);
    }

    #[test]
    fn terminal_outcomes_are_never_flagged_and_have_no_record() {
        for outcome in [
            ProcessingOutcome::NotRecognized(classification(
                DocumentType::NotADocument,
                "a photo of a cat",
            )),
            ProcessingOutcome::Unsupported(classification(
                DocumentType::OtherValidDocument,
                "a library card",
            )),
        ] {
            assert!(!outcome.needs_manual_review());
            assert!(outcome.to_record().is_none());
            assert!(outcome.result().is_none());
        }
    }

    #[test]
    fn into_result_keeps_analysis_for_diagnostics() {
        let err = ProcessingOutcome::NotRecognized(classification(
            DocumentType::NotADocument,
            "a photo of a cat",
        ))
        .into_result()
        .unwrap_err();
        assert!(matches!(err, IdScanError::DocumentNotRecognized { .. }));
        assert_eq!(err.image_analysis(), Some("a photo of a cat"));

        let err = ProcessingOutcome::Unsupported(classification(
            DocumentType::ForeignDriversLicense,
            "an Ontario licence",
        ))
        .into_result()
        .unwrap_err();
        assert!(matches!(err, IdScanError::UnsupportedDocumentType { .. }));
    }

    #[test]
    fn record_serialises_fields_by_name() {
        let record = processed(&["sex"]).to_record().unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["document_type"], "american_passport");
        assert_eq!(json["needs_manual_review"], true);
        assert_eq!(json["extracted_data"]["sex"]["confidence"], "unsure");
        assert_eq!(json["extracted_data"]["passport_number"]["value"], "963545637");
        assert_eq!(
            json["metadata"]["classification"]["image_analysis"],
            "US passport"
        );
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let json = serde_json::to_value(ProcessingOutcome::Unsupported(classification(
            DocumentType::ForeignPassport,
            "a French passport",
        )))
        .unwrap();
        assert_eq!(json["status"], "unsupported");
        assert_eq!(json["document_type"], "foreign_passport");
    }

    #[test]
    fn batch_stats_count_each_outcome_kind() {
        let items = vec![
            BatchItem {
                index: 1,
                input: "a.png".into(),
                outcome: Ok(processed(&["sex"])),
            },
            BatchItem {
                index: 2,
                input: "b.png".into(),
                outcome: Ok(processed(&[])),
            },
            BatchItem {
                index: 3,
                input: "c.png".into(),
                outcome: Ok(ProcessingOutcome::NotRecognized(classification(
                    DocumentType::Indecipherable,
                    "too blurry",
                ))),
            },
            BatchItem {
                index: 4,
                input: "d.png".into(),
                outcome: Err(IdScanError::Processing("boom".into())),
            },
        ];
        let stats = BatchStats::from_items(&items, 42);
        assert_eq!(
            stats,
            BatchStats {
                total: 4,
                processed: 2,
                not_recognized: 1,
                unsupported: 0,
                failed: 1,
                flagged_for_review: 1,
                duration_ms: 42,
            }
        );
    }
}
