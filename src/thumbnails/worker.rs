//! Background thumbnail generation
//!
//! One thread per document. It opens its own handle through the
//! [`SourceFactory`], so the UI thread's handle is never shared, and sends
//! one message per finished page over a flume channel. The cancel flag is
//! checked before every decode and again before every send; once the
//! worker is abandoned nothing more is delivered.

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::strip::render_thumbnail;
use crate::cancel::CancelToken;
use crate::document::SourceFactory;
use crate::render::Bitmap;

#[derive(Debug)]
pub enum ThumbnailMessage {
    Ready { page: usize, bitmap: Bitmap },
    Failed { page: usize, error: String },
    /// The worker could not open its own handle
    OpenFailed(String),
    /// Every page has been attempted
    Finished,
}

pub struct ThumbnailWorker {
    rx: Receiver<ThumbnailMessage>,
    cancel: CancelToken,
    finished: bool,
}

impl ThumbnailWorker {
    /// Start generating thumbnails for pages `0..page_count` in order.
    #[must_use]
    pub fn spawn(factory: SourceFactory, page_count: usize) -> Self {
        let (tx, rx) = flume::unbounded();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        std::thread::spawn(move || {
            thumbnail_worker(&factory, page_count, &tx, &worker_cancel);
        });

        Self {
            rx,
            cancel,
            finished: false,
        }
    }

    /// Take every message that has arrived so far without blocking.
    pub fn poll(&mut self) -> Vec<ThumbnailMessage> {
        if self.cancel.is_cancelled() {
            return vec![];
        }
        let messages: Vec<_> = self.rx.try_iter().collect();
        self.note_finished(&messages);
        if self.rx.is_disconnected() && self.rx.is_empty() {
            self.finished = true;
        }
        messages
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ThumbnailMessage> {
        if self.cancel.is_cancelled() {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => {
                self.note_finished(std::slice::from_ref(&message));
                Some(message)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// True once `Finished` or `OpenFailed` has been received, or the
    /// worker went away.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop the worker. Results still in flight are dropped.
    pub fn abandon(&self) {
        self.cancel.cancel();
    }

    fn note_finished(&mut self, messages: &[ThumbnailMessage]) {
        if messages.iter().any(|m| {
            matches!(
                m,
                ThumbnailMessage::Finished | ThumbnailMessage::OpenFailed(_)
            )
        }) {
            self.finished = true;
        }
    }
}

impl Drop for ThumbnailWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn thumbnail_worker(
    factory: &SourceFactory,
    page_count: usize,
    tx: &Sender<ThumbnailMessage>,
    cancel: &CancelToken,
) {
    let source = match factory() {
        Ok(source) => source,
        Err(e) => {
            warn!("Thumbnail worker could not open document: {e}");
            let _ = tx.send(ThumbnailMessage::OpenFailed(e.to_string()));
            return;
        }
    };

    let page_count = page_count.min(source.page_count());
    for page in 0..page_count {
        if cancel.is_cancelled() {
            debug!("Thumbnail worker cancelled at page {page}");
            return;
        }

        let message = match render_thumbnail(source.as_ref(), page) {
            Ok(bitmap) => ThumbnailMessage::Ready { page, bitmap },
            Err(e) => ThumbnailMessage::Failed {
                page,
                error: e.to_string(),
            },
        };

        // A decode that raced with teardown is discarded here.
        if cancel.is_cancelled() || tx.send(message).is_err() {
            debug!("Thumbnail worker stopped after page {page}");
            return;
        }
    }

    let _ = tx.send(ThumbnailMessage::Finished);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentError, DocumentKind, DocumentSource, PageSize};
    use crate::test_utils::SyntheticSource;
    use crate::thumbnails::ThumbnailStrip;

    fn collect(worker: &mut ThumbnailWorker, strip: &mut ThumbnailStrip) -> Vec<usize> {
        let mut failed = Vec::new();
        while !worker.is_finished() {
            match worker.recv_timeout(Duration::from_secs(5)) {
                Some(ThumbnailMessage::Ready { page, bitmap }) => strip.insert(page, bitmap),
                Some(ThumbnailMessage::Failed { page, .. }) => failed.push(page),
                Some(_) => {}
                None => break,
            }
        }
        failed
    }

    #[test]
    fn delivers_every_page() {
        let source = SyntheticSource::new(DocumentKind::Pdf, 6, PageSize::new(160.0, 240.0));
        let mut worker = ThumbnailWorker::spawn(source.reopen(), source.page_count());
        let mut strip = ThumbnailStrip::new(6, None);

        let failed = collect(&mut worker, &mut strip);
        assert!(failed.is_empty());
        assert!(worker.is_finished());
        assert!(strip.is_complete());
        assert_eq!(strip.get(5).unwrap().original.size(), (80, 120));
    }

    #[test]
    fn failures_are_reported_per_page() {
        let source =
            SyntheticSource::new(DocumentKind::Pdf, 3, PageSize::new(80.0, 80.0)).failing_page(1);
        let mut worker = ThumbnailWorker::spawn(source.reopen(), 3);
        let mut strip = ThumbnailStrip::new(3, None);

        assert_eq!(collect(&mut worker, &mut strip), vec![1]);
        assert_eq!(strip.filled(), 2);
    }

    #[test]
    fn abandoned_worker_delivers_nothing() {
        let source = SyntheticSource::new(DocumentKind::Pdf, 50, PageSize::new(80.0, 80.0))
            .with_decode_delay(Duration::from_millis(20));
        let mut worker = ThumbnailWorker::spawn(source.reopen(), 50);

        std::thread::sleep(Duration::from_millis(30));
        worker.abandon();
        assert!(worker.poll().is_empty());
        assert!(worker.recv_timeout(Duration::from_millis(50)).is_none());

        // The thread notices the flag within one decode.
        std::thread::sleep(Duration::from_millis(100));
        let decoded = source.decode_count();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(source.decode_count(), decoded);
        assert!(decoded < 50);
    }

    #[test]
    fn open_failure_finishes_worker() {
        let factory: SourceFactory = std::sync::Arc::new(
            || -> Result<Box<dyn DocumentSource>, DocumentError> { Err(DocumentError::Empty) },
        );
        let mut worker = ThumbnailWorker::spawn(factory, 4);
        let message = worker.recv_timeout(Duration::from_secs(5));
        assert!(matches!(message, Some(ThumbnailMessage::OpenFailed(_))));
        assert!(worker.is_finished());
    }

    #[test]
    fn polling_notices_a_dead_worker() {
        let factory: SourceFactory = std::sync::Arc::new(
            || -> Result<Box<dyn DocumentSource>, DocumentError> { panic!("decoder crashed") },
        );
        let mut worker = ThumbnailWorker::spawn(factory, 4);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !worker.is_finished() && std::time::Instant::now() < deadline {
            assert!(worker.poll().is_empty());
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.is_finished());
    }
}
