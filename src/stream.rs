//! Streaming batch API: emit documents as they complete.
//!
//! Unlike the eager [`crate::clean::clean_batch`], which returns only after
//! every document is done, [`clean_stream`] yields each
//! `Result<CleaningResult, DocumentError>` as soon as that document's output
//! files are written. Documents arrive in completion order; sort by `index`
//! if order matters.
//!
//! Output and archive files are written exactly as in the eager API.
//! `on_batch_complete` is not fired, since the caller decides when the
//! stream is finished.

use crate::archive::RemovalArchiver;
use crate::clean::{prepare_batch, run_document};
use crate::config::BatchConfig;
use crate::error::{CleanError, DocumentError};
use crate::output::CleaningResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document results.
pub type DocumentStream =
    Pin<Box<dyn Stream<Item = Result<CleaningResult, DocumentError>> + Send>>;

/// Clean the selected documents, streaming results as they are ready.
///
/// # Returns
/// - `Ok(DocumentStream)` — a stream of `Result<CleaningResult, DocumentError>`
/// - `Err(CleanError)` — fatal error (raw directory missing, nothing selected)
///
/// # Example
/// ```rust,no_run
/// use edgequake_mdclean::{clean_stream, BatchConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::builder().raw_dir("mineru_raw").build()?;
/// let mut stream = clean_stream(&config).await?;
/// while let Some(doc) = stream.next().await {
///     match doc {
///         Ok(r) => println!("{}: {} chars", r.index, r.markdown.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn clean_stream(config: &BatchConfig) -> Result<DocumentStream, CleanError> {
    info!("Starting streaming batch: {}", config.raw_dir.display());

    let indices = prepare_batch(config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(indices.len());
    }

    let concurrency = config.concurrency;
    let config = config.clone();
    let archiver = RemovalArchiver::new(config.archive_dir.clone());

    let s = stream::iter(indices.into_iter().map(move |index| {
        let config = config.clone();
        let archiver = archiver.clone();
        async move { run_document(&config, &archiver, index).await }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
