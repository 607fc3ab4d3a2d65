//! Streaming batch API: observe a batch as a `Stream` of typed events.
//!
//! [`convert_batch_stream`] runs [`crate::convert::convert_batch`] on a
//! spawned task and forwards its progress callbacks through a channel. The
//! stream ends after exactly one [`BatchEvent::Finished`] or
//! [`BatchEvent::Failed`].
//!
//! A progress callback already present in the config keeps receiving events
//! as well.

use crate::config::FlattenConfig;
use crate::convert::convert_batch;
use crate::error::FlattenError;
use crate::output::{BatchOutput, SourceFile};
use crate::progress::{BatchProgressCallback, ProgressCallback, ProgressEvent};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// One step of a running batch.
#[derive(Debug)]
pub enum BatchEvent {
    /// Pre-scan finished.
    Started {
        documents_total: usize,
        pages_total: usize,
    },
    /// The page counter advanced.
    Progress(ProgressEvent),
    /// A document reached a terminal state.
    DocumentFinished {
        index: usize,
        /// Output name on success, source name on failure.
        name: String,
        page_count: usize,
        payload_bytes: usize,
        /// `None` when the document was flattened.
        error: Option<String>,
    },
    /// The batch and its archive are done.
    Finished(Box<BatchOutput>),
    /// The batch could not be delivered.
    Failed(FlattenError),
}

/// A boxed stream of batch events.
pub type BatchEventStream = Pin<Box<dyn Stream<Item = BatchEvent> + Send>>;

/// Start a batch and return its event stream.
///
/// Must be called from within a tokio runtime. Dropping the stream does not
/// stop the batch; raise the config's cancel flag for that.
pub fn convert_batch_stream(files: Vec<SourceFile>, config: &FlattenConfig) -> BatchEventStream {
    let (tx, rx) = mpsc::unbounded_channel();

    let forwarder = ChannelCallback {
        tx: tx.clone(),
        inner: config.progress_callback.clone(),
    };
    let mut cfg = config.clone();
    cfg.progress_callback = Some(Arc::new(forwarder));

    tokio::spawn(async move {
        let last = match convert_batch(files, &cfg).await {
            Ok(output) => BatchEvent::Finished(Box::new(output)),
            Err(e) => BatchEvent::Failed(e),
        };
        if tx.send(last).is_err() {
            debug!("Batch finished after its event stream was dropped");
        }
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}

/// Forwards callbacks into the event channel, then to the caller's callback.
struct ChannelCallback {
    tx: mpsc::UnboundedSender<BatchEvent>,
    inner: Option<ProgressCallback>,
}

impl ChannelCallback {
    fn send(&self, event: BatchEvent) {
        // A closed channel only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl BatchProgressCallback for ChannelCallback {
    fn on_batch_start(&self, documents_total: usize, pages_total: usize) {
        self.send(BatchEvent::Started {
            documents_total,
            pages_total,
        });
        if let Some(ref cb) = self.inner {
            cb.on_batch_start(documents_total, pages_total);
        }
    }

    fn on_document_start(&self, index: usize, name: &str, page_count: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_document_start(index, name, page_count);
        }
    }

    fn on_progress(&self, event: ProgressEvent) {
        self.send(BatchEvent::Progress(event));
        if let Some(ref cb) = self.inner {
            cb.on_progress(event);
        }
    }

    fn on_document_complete(
        &self,
        index: usize,
        output_name: &str,
        page_count: usize,
        payload_bytes: usize,
    ) {
        self.send(BatchEvent::DocumentFinished {
            index,
            name: output_name.to_string(),
            page_count,
            payload_bytes,
            error: None,
        });
        if let Some(ref cb) = self.inner {
            cb.on_document_complete(index, output_name, page_count, payload_bytes);
        }
    }

    fn on_document_error(&self, index: usize, name: &str, error: &str) {
        self.send(BatchEvent::DocumentFinished {
            index,
            name: name.to_string(),
            page_count: 0,
            payload_bytes: 0,
            error: Some(error.to_string()),
        });
        if let Some(ref cb) = self.inner {
            cb.on_document_error(index, name, error);
        }
    }

    fn on_archive_start(&self, entries: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_archive_start(entries);
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_complete(succeeded, failed);
        }
    }
}
