//! Transfer plumbing shared by uploads and downloads
//!
//! Cancellation is cooperative: the host answers [`TransferProgress::cancel_requested`]
//! before every chunk, and a cancelled transfer ends with a
//! [`TransferOutcome`] rather than an error.

use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::classify::{StoreCode, StoreFailure, classify, into_error};
use crate::config::RetryConfig;
use crate::error::Result;
use crate::store::{BucketAddress, StoreClient, timed};

/// How the host asked to stop a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancel {
    /// Skip this item; the surrounding operation continues
    Skip,
    /// Stop the whole operation
    Abort,
}

/// Outcome of a transfer that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome<T> {
    Completed(T),
    Skipped,
    Aborted,
}

impl<T> TransferOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }

    pub(crate) fn cancelled(cancel: Cancel) -> Self {
        match cancel {
            Cancel::Skip => TransferOutcome::Skipped,
            Cancel::Abort => TransferOutcome::Aborted,
        }
    }
}

/// Host-side progress and cancellation hooks
pub trait TransferProgress: Send {
    /// Polled before each chunk is read or written
    fn cancel_requested(&mut self) -> Option<Cancel>;

    /// Bytes confirmed so far
    fn set_transferred(&mut self, bytes: u64);
}

/// Progress hook that ignores updates and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransferProgress;

impl TransferProgress for NoTransferProgress {
    fn cancel_requested(&mut self) -> Option<Cancel> {
        None
    }

    fn set_transferred(&mut self, _bytes: u64) {}
}

/// Delay before retry number `attempt` (1-based)
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    let millis = retry
        .initial_backoff_ms
        .saturating_mul(factor)
        .min(retry.max_backoff_ms);
    Duration::from_millis(millis)
}

/// Whether a failed attempt should be repeated
pub(crate) fn should_retry(retry: &RetryConfig, attempt: u32, failure: &StoreFailure) -> bool {
    attempt < retry.max_attempts.max(1) && classify(failure).is_transient()
}

/// Summary of a finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub bytes: u64,
    /// Attempts that were resumed after a failure
    pub resumed: u32,
}

/// Stream an object into `sink`
///
/// A failed attempt resumes from the bytes already written. Data written
/// before a failure or cancellation is left in the sink.
pub async fn download<W>(
    store: &dyn StoreClient,
    addr: &BucketAddress,
    key: &str,
    sink: &mut W,
    timeout: Duration,
    retry: &RetryConfig,
    progress: &mut dyn TransferProgress,
) -> Result<TransferOutcome<DownloadReceipt>>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut written: u64 = 0;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if let Some(cancel) = progress.cancel_requested() {
            return Ok(TransferOutcome::cancelled(cancel));
        }

        let failure = match timed(timeout, store.get_object(addr, key, written)).await {
            Ok(mut chunks) => loop {
                if let Some(cancel) = progress.cancel_requested() {
                    sink.flush().await?;
                    return Ok(TransferOutcome::cancelled(cancel));
                }
                match tokio::time::timeout(timeout, chunks.next()).await {
                    Ok(Some(Ok(chunk))) => {
                        sink.write_all(&chunk).await?;
                        written += chunk.len() as u64;
                        progress.set_transferred(written);
                    }
                    Ok(Some(Err(failure))) => break failure,
                    Ok(None) => {
                        sink.flush().await?;
                        tracing::debug!(key, bytes = written, "Download finished");
                        return Ok(TransferOutcome::Completed(DownloadReceipt {
                            bytes: written,
                            resumed: attempt - 1,
                        }));
                    }
                    Err(_) => {
                        break StoreFailure::new(StoreCode::ConnectionFailed)
                            .with_message(format!("Timeout after {} s", timeout.as_secs()));
                    }
                }
            },
            Err(failure) => failure,
        };

        if !should_retry(retry, attempt, &failure) {
            return Err(into_error(failure, &addr.host, false));
        }
        let delay = backoff_delay(retry, attempt);
        tracing::warn!(
            key,
            offset = written,
            attempt,
            error = %failure,
            "Download interrupted, resuming after {:?}",
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
