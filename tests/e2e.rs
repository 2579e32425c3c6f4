//! End-to-end integration tests for idscan.
//!
//! These tests use real document images in `./test_images/` and make live
//! LLM API calls. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_us_passport -- --nocapture

use idscan::{
    classify_only, process_document, DocumentType, ExtractedData, ProcessingConfig,
    ProcessingOutcome,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_images_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_images")
}

/// Skip this test if E2E_ENABLED is not set *or* no image at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test image not found: {}", p.display());
            return;
        }
        p
    }};
}

fn config() -> ProcessingConfig {
    ProcessingConfig::builder()
        .api_timeout_secs(90)
        .build()
        .expect("default config is valid")
}

/// Every field must be present and consistent with the visibility contract.
fn assert_fields_well_formed(data: &ExtractedData, context: &str) {
    for (name, field) in data.fields() {
        assert!(
            field.satisfies_visibility_contract(),
            "[{context}] field {name} is invisible but high confidence"
        );
        if field.visible && !field.is_unsure() {
            assert!(
                !field.value.trim().is_empty(),
                "[{context}] visible high-confidence field {name} is empty"
            );
        }
        println!("[{context}] {name:<16} {:?} {}", field.confidence, field.value);
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_us_passport() {
    let path = e2e_skip_unless_ready!(test_images_dir().join("us_passport.jpg"));

    let outcome = process_document(path.to_str().unwrap(), &config())
        .await
        .expect("process_document() should succeed");

    assert_eq!(outcome.document_type(), DocumentType::AmericanPassport);
    let result = outcome.result().expect("passport should be extracted");
    assert!(matches!(result.extracted_data, ExtractedData::Passport(_)));
    assert_fields_well_formed(&result.extracted_data, "us_passport");
    println!("needs review: {}", outcome.needs_manual_review());
}

#[tokio::test]
async fn test_us_drivers_license() {
    let path = e2e_skip_unless_ready!(test_images_dir().join("us_drivers_license.jpg"));

    let outcome = process_document(path.to_str().unwrap(), &config())
        .await
        .expect("process_document() should succeed");

    assert_eq!(outcome.document_type(), DocumentType::AmericanDriversLicense);
    let result = outcome.result().expect("license should be extracted");
    assert!(matches!(result.extracted_data, ExtractedData::License(_)));
    assert_fields_well_formed(&result.extracted_data, "us_drivers_license");
}

// ── Terminal classifications ─────────────────────────────────────────────────

#[tokio::test]
async fn test_cat_photo_is_not_recognized() {
    let path = e2e_skip_unless_ready!(test_images_dir().join("cat.jpg"));

    let outcome = process_document(path.to_str().unwrap(), &config())
        .await
        .expect("process_document() should succeed");

    assert!(
        matches!(outcome, ProcessingOutcome::NotRecognized(_)),
        "got {}",
        outcome.summary()
    );
    assert!(!outcome.classification().image_analysis.is_empty());
}

#[tokio::test]
async fn test_foreign_passport_is_unsupported() {
    let path = e2e_skip_unless_ready!(test_images_dir().join("foreign_passport.jpg"));

    let c = classify_only(path.to_str().unwrap(), &config())
        .await
        .expect("classify_only() should succeed");

    assert_eq!(c.document_type, DocumentType::ForeignPassport);
    println!("analysis: {}", c.image_analysis);
}
