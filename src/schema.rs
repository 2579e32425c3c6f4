//! Closed response schemas exchanged with the vision models.
//!
//! Every structure the pipeline asks a model to produce is declared here as
//! a fixed Rust type. The same type serves three roles:
//!
//! 1. its [`schemars`] description is embedded in the system instruction so
//!    the model knows the exact shape to emit,
//! 2. `serde` deserialisation with `deny_unknown_fields` is the validation
//!    step at the inference boundary (missing, extra, mistyped fields and
//!    out-of-set enum values all fail),
//! 3. it is the in-memory result handed to callers.
//!
//! There is no "any schema" abstraction: [`ResponseSchema`] is implemented
//! only by the handful of types below.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ── Enumerations ─────────────────────────────────────────────────────────

/// The closed set of categories the classifier may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    AmericanPassport,
    ForeignPassport,
    AmericanDriversLicense,
    ForeignDriversLicense,
    OtherValidDocument,
    Indecipherable,
    NotADocument,
}

impl DocumentType {
    pub const ALL: [DocumentType; 7] = [
        DocumentType::AmericanPassport,
        DocumentType::ForeignPassport,
        DocumentType::AmericanDriversLicense,
        DocumentType::ForeignDriversLicense,
        DocumentType::OtherValidDocument,
        DocumentType::Indecipherable,
        DocumentType::NotADocument,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::AmericanPassport => "american_passport",
            DocumentType::ForeignPassport => "foreign_passport",
            DocumentType::AmericanDriversLicense => "american_drivers_license",
            DocumentType::ForeignDriversLicense => "foreign_drivers_license",
            DocumentType::OtherValidDocument => "other_valid_document",
            DocumentType::Indecipherable => "indecipherable",
            DocumentType::NotADocument => "not_a_document",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field extraction confidence. Never assigned to a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Unsure,
}

// ── Field extraction ─────────────────────────────────────────────────────

/// One extracted field as reported by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldExtraction {
    /// Whether the field could be located on the document at all.
    pub visible: bool,
    /// The value exactly as read; passed through without normalisation.
    pub value: String,
    pub confidence: Confidence,
}

/// A field that is reported invisible yet extracted with high confidence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field}' is marked not visible but has confidence 'high'")]
pub struct ContractViolation {
    pub field: &'static str,
}

impl FieldExtraction {
    /// `visible == false` must come with `confidence == unsure`.
    pub fn satisfies_visibility_contract(&self) -> bool {
        self.visible || self.confidence == Confidence::Unsure
    }

    pub fn is_unsure(&self) -> bool {
        self.confidence == Confidence::Unsure
    }
}

fn check_fields<'a>(
    fields: impl IntoIterator<Item = (&'static str, &'a FieldExtraction)>,
) -> Result<(), ContractViolation> {
    fields
        .into_iter()
        .find(|(_, f)| !f.satisfies_visibility_contract())
        .map_or(Ok(()), |(field, _)| Err(ContractViolation { field }))
}

// ── Classification ───────────────────────────────────────────────────────

/// Classifier answer: a free-text rationale plus the chosen category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClassificationResult {
    /// Short rationale, always produced; used for diagnostics on terminal
    /// classifications.
    pub image_analysis: String,
    pub document_type: DocumentType,
}

// ── Passport ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PassportData {
    pub issuing_country: FieldExtraction,
    pub passport_number: FieldExtraction,
    pub surname: FieldExtraction,
    pub given_names: FieldExtraction,
    pub nationality: FieldExtraction,
    pub birth_date: FieldExtraction,
    pub sex: FieldExtraction,
    pub place_of_birth: FieldExtraction,
    pub date_of_issue: FieldExtraction,
    pub date_of_expiry: FieldExtraction,
    pub authority: FieldExtraction,
}

impl PassportData {
    /// All fields with their wire names, in schema order.
    pub fn fields(&self) -> [(&'static str, &FieldExtraction); 11] {
        [
            ("issuing_country", &self.issuing_country),
            ("passport_number", &self.passport_number),
            ("surname", &self.surname),
            ("given_names", &self.given_names),
            ("nationality", &self.nationality),
            ("birth_date", &self.birth_date),
            ("sex", &self.sex),
            ("place_of_birth", &self.place_of_birth),
            ("date_of_issue", &self.date_of_issue),
            ("date_of_expiry", &self.date_of_expiry),
            ("authority", &self.authority),
        ]
    }
}

/// Full passport extraction answer, kept verbatim in the result metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PassportResponse {
    pub image_analysis: String,
    pub passport_data: PassportData,
}

// ── Driver's license ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LicenseData {
    pub issuing_state: FieldExtraction,
    pub license_number: FieldExtraction,
    pub surname: FieldExtraction,
    pub given_names: FieldExtraction,
    pub address: FieldExtraction,
    pub birth_date: FieldExtraction,
    pub sex: FieldExtraction,
    pub date_of_issue: FieldExtraction,
    pub date_of_expiry: FieldExtraction,
    pub license_class: FieldExtraction,
    pub restrictions: FieldExtraction,
}

impl LicenseData {
    pub fn fields(&self) -> [(&'static str, &FieldExtraction); 11] {
        [
            ("issuing_state", &self.issuing_state),
            ("license_number", &self.license_number),
            ("surname", &self.surname),
            ("given_names", &self.given_names),
            ("address", &self.address),
            ("birth_date", &self.birth_date),
            ("sex", &self.sex),
            ("date_of_issue", &self.date_of_issue),
            ("date_of_expiry", &self.date_of_expiry),
            ("license_class", &self.license_class),
            ("restrictions", &self.restrictions),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LicenseResponse {
    pub image_analysis: String,
    pub license_data: LicenseData,
}

// ── Schema trait ─────────────────────────────────────────────────────────

/// A closed response structure the structured inference client can request.
pub trait ResponseSchema: DeserializeOwned + JsonSchema + Send + 'static {
    /// Name used in logs and in the schema instruction.
    const NAME: &'static str;

    /// Machine-checkable structural description sent with the request.
    fn response_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Self)).unwrap_or_default()
    }

    /// Consistency rules the type system cannot express.
    fn check_contract(&self) -> Result<(), ContractViolation> {
        Ok(())
    }
}

impl ResponseSchema for ClassificationResult {
    const NAME: &'static str = "DocumentClassification";
}

impl ResponseSchema for PassportResponse {
    const NAME: &'static str = "PassportExtraction";

    fn check_contract(&self) -> Result<(), ContractViolation> {
        check_fields(self.passport_data.fields())
    }
}

impl ResponseSchema for LicenseResponse {
    const NAME: &'static str = "LicenseExtraction";

    fn check_contract(&self) -> Result<(), ContractViolation> {
        check_fields(self.license_data.fields())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn document_type_wire_names_match_serde() {
        for ty in DocumentType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
            let back: DocumentType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn out_of_set_document_type_is_rejected() {
        let json = r#"{"image_analysis": "a library card", "document_type": "library_card"}"#;
        assert!(serde_json::from_str::<ClassificationResult>(json).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = r#"{"visible": true, "value": "X", "confidence": "high", "note": "extra"}"#;
        assert!(serde_json::from_str::<FieldExtraction>(json).is_err());
    }

    #[test]
    fn confidence_outside_closed_set_is_rejected() {
        let json = r#"{"visible": true, "value": "X", "confidence": "medium"}"#;
        assert!(serde_json::from_str::<FieldExtraction>(json).is_err());
    }

    #[test]
    fn visibility_contract() {
        let hidden_unsure = FieldExtraction {
            visible: false,
            value: String::new(),
            confidence: Confidence::Unsure,
        };
        let hidden_high = FieldExtraction {
            confidence: Confidence::High,
            ..hidden_unsure.clone()
        };
        assert!(hidden_unsure.satisfies_visibility_contract());
        assert!(!hidden_high.satisfies_visibility_contract());
        assert!(field("M", Confidence::High).satisfies_visibility_contract());
        assert!(field("M", Confidence::Unsure).satisfies_visibility_contract());
    }

    #[test]
    fn passport_contract_names_the_offending_field() {
        let mut data = passport(&[]);
        data.place_of_birth.visible = false;
        let response = PassportResponse {
            image_analysis: "US passport, slight glare".into(),
            passport_data: data,
        };
        assert_eq!(
            response.check_contract(),
            Err(ContractViolation {
                field: "place_of_birth"
            })
        );
    }

    #[test]
    fn license_contract_accepts_hidden_unsure_fields() {
        let mut data = license(&["restrictions"]);
        data.restrictions.visible = false;
        let response = LicenseResponse {
            image_analysis: "California license".into(),
            license_data: data,
        };
        assert!(response.check_contract().is_ok());
    }

    #[test]
    fn response_schema_lists_every_passport_field() {
        let schema = PassportResponse::response_schema().to_string();
        for (name, _) in passport(&[]).fields() {
            assert!(schema.contains(name), "schema is missing {name}");
        }
    }

    #[test]
    fn classification_schema_lists_every_document_type() {
        let schema = ClassificationResult::response_schema().to_string();
        for ty in DocumentType::ALL {
            assert!(schema.contains(ty.as_str()), "schema is missing {ty}");
        }
    }
}
