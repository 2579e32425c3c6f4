//! Pipeline stages for identity-document processing.
//!
//! Each submodule implements exactly one step, so every step can be tested
//! on its own and the inference backend can be swapped without touching
//! the orchestration in [`crate::process`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ classify ──▶ extract ──▶ triage
//! (path/URL) (base64)   (VLM chain)  (VLM chain)  (confidences)
//! ```
//!
//! 1. [`input`]   : canonicalise the user-supplied path or URL to a local image
//! 2. [`encode`]  : base64-wrap the image bytes for the multimodal request body
//! 3. [`classify`]: pick a document type through the classification chain
//! 4. [`extract`] : route the type to an extractor and run its chain
//! 5. [`triage`]  : decide whether a human must review the fields
//!
//! [`llm`], [`parse`] and [`fallback`] are the shared inference plumbing
//! used by `classify` and `extract`.

pub mod classify;
pub mod encode;
pub mod extract;
pub mod fallback;
pub mod input;
pub mod llm;
pub mod parse;
pub mod triage;
