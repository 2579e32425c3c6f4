//! System instructions and task texts for classification and extraction.
//!
//! Centralising every prompt here keeps the inference code free of prose
//! and lets unit tests inspect the instructions directly, so a prompt
//! regression (e.g. a dropped confidence rule) is caught without a model.
//!
//! Confidence policy is communicated to the model only. Nothing in the
//! pipeline re-scores or corrects the values that come back.

use crate::schema::DocumentType;

/// System instruction for the document classifier.
pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"You are a precise document scanner specialized in identifying identification documents. You must determine if the provided image depicts a valid identification document and classify it accordingly.

Choose exactly one document_type:
- american_passport: a passport issued by the United States of America
- foreign_passport: a passport issued by any other country
- american_drivers_license: a driver's license issued by a U.S. state or territory
- foreign_drivers_license: a driver's license issued outside the United States
- other_valid_document: any other legible identification document (ID card, permit, visa, ...)
- indecipherable: a document is present but too blurry, dark, cropped or damaged to classify
- not_a_document: the image does not show a document at all

Before classifying, write a short 1 sentence image_analysis describing what the image shows."#;

/// Task text sent alongside the image for classification.
pub const CLASSIFICATION_TASK: &str = "Classify the following image of a document.";

/// Confidence policy shared by every extractor.
pub const CONFIDENCE_POLICY: &str = r#"For each field, you must:
1. Determine if the field is visible or not.
2. Extract the value of the field.
3. Provide a confidence level in the extraction. If a field is not visible, the confidence level should be 'unsure'.

Mark a field as 'unsure' if:
- Any part of the text is unclear or ambiguous
- There are multiple possible interpretations
- The field is partially obscured or damaged
- The text is too blurry to read with certainty
- There is glare or other visual interference that makes the text unclear

Otherwise mark the field as 'high'."#;

/// Passport-specific extraction rules.
pub const PASSPORT_RULES: &str = r#"Special considerations:
- All dates should be in DD/MM/YYYY format (international standard for passports)
- Passport numbers may contain both letters and numbers
- Names should be extracted exactly as shown, including special characters and diacritical marks
- For the sex field, use 'M', 'F', or 'X' only

Fields to extract: issuing_country, passport_number, surname, given_names, nationality, birth_date, sex, place_of_birth, date_of_issue, date_of_expiry, authority.

Carefully examine the image and analyze all relevant fields and provide a short 1 sentence image_analysis of the image before extracting the data."#;

/// Driver's-license-specific extraction rules.
pub const LICENSE_RULES: &str = r#"Special considerations:
- All dates should be in MM/DD/YYYY format (U.S. standard for driver's licenses)
- License numbers may contain both letters and numbers
- Names should be extracted exactly as shown, including special characters and diacritical marks
- issuing_state is the two-letter postal abbreviation of the issuing state or territory
- For the sex field, use 'M', 'F', or 'X' only
- If the license shows no restrictions, extract 'NONE'

Fields to extract: issuing_state, license_number, surname, given_names, address, birth_date, sex, date_of_issue, date_of_expiry, license_class, restrictions.

Carefully examine the image and analyze all relevant fields and provide a short 1 sentence image_analysis of the image before extracting the data."#;

pub const PASSPORT_TASK: &str =
    "Extract the passport information and mark your confidence for each field.";

pub const LICENSE_TASK: &str =
    "Extract the driver's license information and mark your confidence for each field.";

/// Full system instruction for passport extraction.
pub fn passport_system_prompt() -> String {
    extraction_prompt("passports", PASSPORT_RULES)
}

/// Full system instruction for driver's license extraction.
pub fn license_system_prompt() -> String {
    extraction_prompt("U.S. driver's licenses", LICENSE_RULES)
}

fn extraction_prompt(subject: &str, rules: &str) -> String {
    format!(
        "You are a precise document scanner specialized in extracting information from {subject}.\n\n{CONFIDENCE_POLICY}\n\n{rules}"
    )
}

/// Instruction appended to every system message describing the exact JSON
/// shape the answer must have.
pub fn schema_instruction(schema_name: &str, schema: &serde_json::Value) -> String {
    format!(
        "\n\nRespond with a single JSON object that conforms to the {schema_name} JSON schema below. \
Do not add fields, commentary, or markdown fences.\n\n{schema}"
    )
}

/// Human description of a document type, used in CLI output.
pub fn describe(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::AmericanPassport => "U.S. passport",
        DocumentType::ForeignPassport => "foreign passport",
        DocumentType::AmericanDriversLicense => "U.S. driver's license",
        DocumentType::ForeignDriversLicense => "foreign driver's license",
        DocumentType::OtherValidDocument => "other identification document",
        DocumentType::Indecipherable => "indecipherable document",
        DocumentType::NotADocument => "not a document",
    }
}
