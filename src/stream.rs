//! Streaming batch API: emit each document's outcome as it completes.
//!
//! Unlike [`crate::process::process_batch`], which returns only after every
//! input has been attempted, [`process_stream`] yields a [`BatchItem`] as
//! soon as its invocation finishes. Items arrive in completion order; sort
//! by `index` if input order matters.

use crate::config::ProcessingConfig;
use crate::error::IdScanError;
use crate::output::BatchItem;
use crate::process::{run_item, DocumentProcessor};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document batch items.
pub type DocumentStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Process many documents, streaming outcomes as they are ready.
///
/// Up to `config.concurrency` invocations run at once. Per-document failures
/// are carried inside the yielded [`BatchItem`]; they never end the stream.
///
/// # Returns
/// - `Ok(DocumentStream)`: one item per input
/// - `Err(IdScanError)`: the inference backend could not be built
///
/// # Example
/// ```rust,no_run
/// use idscan::{process_stream, ProcessingConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ProcessingConfig::default();
/// let mut stream = process_stream(["front.jpg", "passport.png"], &config)?;
/// while let Some(item) = stream.next().await {
///     match item.outcome {
///         Ok(o) => println!("{}: {}", item.input, o.summary()),
///         Err(e) => eprintln!("{}: {e}", item.input),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn process_stream<I, S>(
    inputs: I,
    config: &ProcessingConfig,
) -> Result<DocumentStream, IdScanError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let processor = DocumentProcessor::from_config(config)?;
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    let total = inputs.len();
    info!("Starting streaming batch of {} documents", total);

    let s = stream::iter(inputs.into_iter().enumerate())
        .map(move |(i, input_str)| {
            let processor = processor.clone();
            async move { run_item(&processor, i + 1, total, input_str).await }
        })
        .buffer_unordered(config.concurrency);

    Ok(Box::pin(s))
}
