//! Boundary parsing: raw model text → validated schema instance.
//!
//! Even when told to emit bare JSON, models sometimes wrap the object in a
//! ` ```json ` fence or pad it with whitespace. Those wrappers are removed
//! before parsing; nothing else about the text is altered. The JSON itself
//! must then deserialize into the closed schema (unknown fields, missing
//! fields, wrong types and out-of-set enum values all fail) and, when
//! enabled, satisfy the schema's contract checks.

use crate::schema::{ContractViolation, ResponseSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Why a model response could not be accepted.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty response")]
    Empty,

    #[error("response does not match the {schema} schema: {source}")]
    Schema {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("response violates the {schema} contract: {source}")]
    Contract {
        schema: &'static str,
        #[source]
        source: ContractViolation,
    },
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*(.*?)\s*```$").unwrap());

/// Remove an outer markdown code fence, if present, and surrounding whitespace.
pub fn strip_json_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_JSON_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Parse and validate a model response against `T`.
pub fn parse_response<T: ResponseSchema>(
    raw: &str,
    enforce_contract: bool,
) -> Result<T, ParseError> {
    let body = strip_json_fences(raw);
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let parsed: T = serde_json::from_str(body).map_err(|source| ParseError::Schema {
        schema: T::NAME,
        source,
    })?;

    if enforce_contract {
        parsed
            .check_contract()
            .map_err(|source| ParseError::Contract {
                schema: T::NAME,
                source,
            })?;
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ClassificationResult, DocumentType, PassportResponse};

    const CAT: &str = r#"{"image_analysis": "a photo of a cat", "document_type": "not_a_document"}"#;

    #[test]
    fn strips_json_fence() {
        let fenced = format!("```json\n{CAT}\n```");
        assert_eq!(strip_json_fences(&fenced), CAT);
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        let fenced = format!("\n  ```\n{CAT}\n```  \n");
        assert_eq!(strip_json_fences(&fenced), CAT);
    }

    #[test]
    fn strips_single_line_fence() {
        let fenced = format!("```json {CAT}```");
        assert_eq!(strip_json_fences(&fenced), CAT);
        let parsed: ClassificationResult = parse_response(&fenced, true).unwrap();
        assert_eq!(parsed.document_type, DocumentType::NotADocument);
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_json_fences(CAT), CAT);
    }

    #[test]
    fn parses_classification() {
        let parsed: ClassificationResult = parse_response(CAT, true).unwrap();
        assert_eq!(parsed.document_type, DocumentType::NotADocument);
        assert_eq!(parsed.image_analysis, "a photo of a cat");
    }

    #[test]
    fn empty_response_is_rejected() {
        let err = parse_response::<ClassificationResult>("   ", true).unwrap_err();
        assert!(matches!(err, ParseError::Empty));
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        let err = parse_response::<ClassificationResult>("{\"image_analysis\": ", true)
            .unwrap_err();
        assert!(matches!(err, ParseError::Schema { .. }));
        assert!(err.to_string().contains("DocumentClassification"));
    }

    #[test]
    fn missing_field_is_a_schema_error() {
        let err =
            parse_response::<ClassificationResult>(r#"{"image_analysis": "x"}"#, true).unwrap_err();
        assert!(err.to_string().contains("document_type"), "got: {err}");
    }

    fn passport_json(place_of_birth: &str) -> String {
        let field = r#"{"visible": true, "value": "X", "confidence": "high"}"#;
        let names = [
            "issuing_country",
            "passport_number",
            "surname",
            "given_names",
            "nationality",
            "birth_date",
            "sex",
            "date_of_issue",
            "date_of_expiry",
            "authority",
        ];
        let mut fields: Vec<String> = names.iter().map(|n| format!("\"{n}\": {field}")).collect();
        fields.push(format!("\"place_of_birth\": {place_of_birth}"));
        format!(
            "{{\"image_analysis\": \"US passport\", \"passport_data\": {{{}}}}}",
            fields.join(", ")
        )
    }

    #[test]
    fn contract_violation_rejected_when_enforced() {
        let json = passport_json(r#"{"visible": false, "value": "", "confidence": "high"}"#);
        let err = parse_response::<PassportResponse>(&json, true).unwrap_err();
        assert!(matches!(err, ParseError::Contract { .. }));
        assert!(err.to_string().contains("place_of_birth"), "got: {err}");
    }

    #[test]
    fn contract_violation_passes_through_when_not_enforced() {
        let json = passport_json(r#"{"visible": false, "value": "", "confidence": "high"}"#);
        let parsed = parse_response::<PassportResponse>(&json, false).unwrap();
        assert!(!parsed.passport_data.place_of_birth.visible);
    }

    #[test]
    fn hidden_unsure_field_is_accepted() {
        let json = passport_json(r#"{"visible": false, "value": "", "confidence": "unsure"}"#);
        assert!(parse_response::<PassportResponse>(&json, true).is_ok());
    }
}
