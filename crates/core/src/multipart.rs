//! Multipart upload support
//!
//! Objects larger than one minimum-size part are uploaded as a multipart
//! session: initiate, upload parts 1..N from their stream offsets, then commit
//! a manifest of part receipts. Anything going wrong after initiation aborts
//! the session so no orphaned parts stay behind on the store.

use std::io::{self, SeekFrom};
use std::time::Duration;

use quick_xml::Writer;
use quick_xml::events::BytesText;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::classify::{StoreFailure, into_error};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::store::{BucketAddress, CompletedPart, PutProperties, StoreClient, timed};
use crate::transfer::{TransferOutcome, TransferProgress, backoff_delay, should_retry};

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// How an object of a given size is cut into parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub size: u64,
    pub parts: u64,
    pub chunk_size: u64,
}

impl ChunkPlan {
    /// One part means a plain single-request upload
    pub fn is_single(&self) -> bool {
        self.parts == 1
    }

    /// Byte range `[start, end)` of a 1-based part
    pub fn range(&self, part_number: i32) -> (u64, u64) {
        part_byte_range(part_number, self.chunk_size, self.size)
    }
}

/// Plan the parts for an object of `size` bytes
///
/// `parts = clamp(ceil(size / 5 MiB), 1, 10000)` and
/// `chunk_size = max(5 MiB, ceil(size / parts))`.
pub fn plan_chunks(size: u64) -> ChunkPlan {
    let parts = size.div_ceil(MIN_PART_SIZE).clamp(1, MAX_PARTS);
    let chunk_size = size.div_ceil(parts).max(MIN_PART_SIZE);
    ChunkPlan {
        size,
        parts,
        chunk_size,
    }
}

/// Get byte range for a part
pub fn part_byte_range(part_number: i32, part_size: u64, total_size: u64) -> (u64, u64) {
    let start = (part_number as u64 - 1) * part_size;
    let end = (start + part_size).min(total_size);
    (start, end)
}

/// Where an upload is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    NotStarted,
    Initiated,
    Uploading(i32),
    Committing,
    Committed,
    Aborting,
    Aborted,
}

/// A multipart session on the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartSession {
    pub key: String,
    pub upload_id: String,
    pub chunk_size: u64,
    pub part_count: u64,
    /// Receipts, contiguous from part 1
    pub parts: Vec<CompletedPart>,
}

impl MultipartSession {
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>, plan: &ChunkPlan) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
            chunk_size: plan.chunk_size,
            part_count: plan.parts,
            parts: Vec::with_capacity(plan.parts as usize),
        }
    }

    /// Part number expected next
    pub fn next_part_number(&self) -> i32 {
        self.parts.len() as i32 + 1
    }

    /// Record a part receipt; parts must arrive in order
    pub fn add_completed_part(&mut self, part_number: i32, etag: String) -> Result<()> {
        if part_number != self.next_part_number() {
            return Err(Error::General(format!(
                "Part {part_number} completed out of order, expected {}",
                self.next_part_number()
            )));
        }
        self.parts.push(CompletedPart { part_number, etag });
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.parts.len() as u64 == self.part_count
    }

    /// Commit manifest: every `(PartNumber, ETag)` in ascending order
    pub fn manifest_xml(&self) -> io::Result<String> {
        let mut buf = Vec::with_capacity(64 + self.parts.len() * 96);
        let mut writer = Writer::new(&mut buf);
        writer
            .create_element("CompleteMultipartUpload")
            .write_inner_content(|w| {
                for part in &self.parts {
                    w.create_element("Part").write_inner_content(|w| {
                        w.create_element("PartNumber")
                            .write_text_content(BytesText::new(&part.part_number.to_string()))?;
                        w.create_element("ETag")
                            .write_text_content(BytesText::new(&part.etag))?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// What a finished upload produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub bytes: u64,
    pub parts: u64,
    /// Set for multipart uploads
    pub upload_id: Option<String>,
}

/// Everything an upload needs besides its source
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub key: String,
    pub size: u64,
    pub properties: PutProperties,
}

/// Drives single-shot and multipart uploads against one bucket
pub struct Uploader<'a> {
    store: &'a dyn StoreClient,
    addr: &'a BucketAddress,
    timeout: Duration,
    retry: RetryConfig,
    phase: UploadPhase,
}

impl<'a> Uploader<'a> {
    pub fn new(
        store: &'a dyn StoreClient,
        addr: &'a BucketAddress,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            addr,
            timeout,
            retry,
            phase: UploadPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    fn fail(&self, failure: StoreFailure) -> Error {
        into_error(failure, &self.addr.host, false)
    }

    /// Upload `request.size` bytes read from the start of `source`
    pub async fn upload<R>(
        &mut self,
        source: &mut R,
        request: &UploadRequest,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferOutcome<UploadReceipt>>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let plan = plan_chunks(request.size);
        if plan.is_single() {
            return self.upload_single(source, request, progress).await;
        }

        tracing::info!(
            key = %request.key,
            parts = plan.parts,
            chunk_size = plan.chunk_size,
            "Initiating multipart upload"
        );
        let upload_id = timed(
            self.timeout,
            self.store
                .initiate_multipart(self.addr, &request.key, &request.properties),
        )
        .await
        .map_err(|failure| self.fail(failure))?;
        self.phase = UploadPhase::Initiated;
        tracing::info!(key = %request.key, %upload_id, parts = plan.parts, "Initiated multipart upload");

        let mut session = MultipartSession::new(&request.key, upload_id, &plan);
        let result = self.upload_parts(source, &plan, &mut session, progress).await;

        let result = match result {
            Ok(None) => self.commit(&session).await.map(|()| {
                TransferOutcome::Completed(UploadReceipt {
                    key: request.key.clone(),
                    bytes: request.size,
                    parts: plan.parts,
                    upload_id: Some(session.upload_id.clone()),
                })
            }),
            Ok(Some(cancelled)) => Ok(cancelled),
            Err(err) => Err(err),
        };

        if !matches!(result, Ok(TransferOutcome::Completed(_))) {
            self.abort(&session).await;
        }
        result
    }

    /// Upload every part; `Some` carries a cancellation outcome
    async fn upload_parts<R>(
        &mut self,
        source: &mut R,
        plan: &ChunkPlan,
        session: &mut MultipartSession,
        progress: &mut dyn TransferProgress,
    ) -> Result<Option<TransferOutcome<UploadReceipt>>>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        // Stream offset confirmed by the last successful part
        let mut position: u64 = 0;

        for part_number in 1..=plan.parts as i32 {
            self.phase = UploadPhase::Uploading(part_number);
            let (start, end) = plan.range(part_number);
            let mut attempt: u32 = 0;

            let etag = loop {
                attempt += 1;
                if let Some(cancel) = progress.cancel_requested() {
                    tracing::info!(key = %session.key, part_number, "Upload cancelled");
                    return Ok(Some(TransferOutcome::cancelled(cancel)));
                }

                source.seek(SeekFrom::Start(position)).await?;
                progress.set_transferred(position);
                let body = read_exact_len(source, end - start).await?;

                tracing::debug!(part_number, bytes = end - start, attempt, "Uploading part");
                let outcome = timed(
                    self.timeout,
                    self.store.upload_part(
                        self.addr,
                        &session.key,
                        &session.upload_id,
                        part_number,
                        body,
                    ),
                )
                .await;

                match outcome {
                    Ok(etag) => break etag,
                    Err(failure) if should_retry(&self.retry, attempt, &failure) => {
                        let delay = backoff_delay(&self.retry, attempt);
                        tracing::warn!(
                            part_number,
                            attempt,
                            offset = position,
                            error = %failure,
                            "Part upload failed, retrying after {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(failure) => return Err(self.fail(failure)),
                }
            };

            session.add_completed_part(part_number, etag)?;
            position = end;
            progress.set_transferred(position);
        }
        Ok(None)
    }

    async fn commit(&mut self, session: &MultipartSession) -> Result<()> {
        if !session.is_complete() {
            return Err(Error::General(format!(
                "Cannot commit upload of '{}' with {} of {} parts",
                session.key,
                session.parts.len(),
                session.part_count
            )));
        }
        self.phase = UploadPhase::Committing;
        tracing::info!(
            key = %session.key,
            upload_id = %session.upload_id,
            parts = session.part_count,
            "Committing multipart upload"
        );
        if let Ok(manifest) = session.manifest_xml() {
            tracing::debug!(%manifest, "Commit manifest");
        }
        timed(
            self.timeout,
            self.store.complete_multipart(
                self.addr,
                &session.key,
                &session.upload_id,
                &session.parts,
            ),
        )
        .await
        .map_err(|failure| self.fail(failure))?;
        self.phase = UploadPhase::Committed;
        Ok(())
    }

    /// Best-effort abort; its own failure is logged and dropped
    async fn abort(&mut self, session: &MultipartSession) {
        if matches!(self.phase, UploadPhase::Aborting | UploadPhase::Aborted) {
            return;
        }
        self.phase = UploadPhase::Aborting;
        tracing::info!(
            key = %session.key,
            upload_id = %session.upload_id,
            parts = session.part_count,
            "Aborting multipart upload"
        );
        let outcome = timed(
            self.timeout,
            self.store
                .abort_multipart(self.addr, &session.key, &session.upload_id),
        )
        .await;
        if let Err(failure) = outcome {
            tracing::debug!(error = %failure, "Abort of multipart upload failed");
        }
        self.phase = UploadPhase::Aborted;
    }

    async fn upload_single<R>(
        &mut self,
        source: &mut R,
        request: &UploadRequest,
        progress: &mut dyn TransferProgress,
    ) -> Result<TransferOutcome<UploadReceipt>>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if let Some(cancel) = progress.cancel_requested() {
                return Ok(TransferOutcome::cancelled(cancel));
            }
            source.seek(SeekFrom::Start(0)).await?;
            progress.set_transferred(0);
            let body = read_exact_len(source, request.size).await?;
            self.phase = UploadPhase::Uploading(1);

            let outcome = timed(
                self.timeout,
                self.store
                    .put_object(self.addr, &request.key, body, &request.properties),
            )
            .await;
            match outcome {
                Ok(()) => {
                    self.phase = UploadPhase::Committed;
                    progress.set_transferred(request.size);
                    return Ok(TransferOutcome::Completed(UploadReceipt {
                        key: request.key.clone(),
                        bytes: request.size,
                        parts: 1,
                        upload_id: None,
                    }));
                }
                Err(failure) if should_retry(&self.retry, attempt, &failure) => {
                    let delay = backoff_delay(&self.retry, attempt);
                    tracing::warn!(attempt, error = %failure, "Upload failed, retrying after {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(self.fail(failure)),
            }
        }
    }
}

/// Read exactly `len` bytes; a short source is an error
async fn read_exact_len<R>(source: &mut R, len: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut body = Vec::with_capacity(len as usize);
    (&mut *source).take(len).read_to_end(&mut body).await?;
    if (body.len() as u64) < len {
        return Err(Error::General(format!(
            "Source ended after {} of {} bytes",
            body.len(),
            len
        )));
    }
    Ok(body)
}
