// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Streaming ingestion: reassembles a length-declared payload from chunks.
//!
//! The decoder owns one buffer that grows with the bytes actually received, up
//! to the declared total. Any failure drops the decoder and with it the
//! partially filled buffer; only a payload whose length matches the
//! declaration exactly is handed out.

use futures::{Stream, StreamExt};
use model::{Photo, RegionSizes};
use thiserror::Error;
use tier_types::{Blob, ErrorCode, Tag};
use tracing::{debug, warn};

use crate::frame::FrameError;
use crate::protocol::{RequestHeader, StreamFrame};

pub const DEFAULT_MAX_CHUNK_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("first message carries no request metadata")]
    MissingMetadata,
    #[error("request metadata repeated mid-stream")]
    UnexpectedHeader,
    #[error("classification needs a tag")]
    NoTags,
    #[error("{0} tags in one classification are not supported")]
    UnsupportedMultiTag(usize),
    #[error("declared region sizes overflow")]
    InvalidSizes,
    #[error("declared payload of {declared} bytes exceeds limit of {limit}")]
    PayloadTooLarge { declared: u64, limit: u64 },
    #[error("chunk of {len} bytes exceeds limit of {limit}")]
    ChunkTooLarge { len: usize, limit: usize },
    #[error("received more than the declared {declared} bytes")]
    PayloadOverflow { declared: u64 },
    #[error("stream ended after {received} of {declared} bytes")]
    PayloadTruncated { declared: u64, received: u64 },
    #[error("transport error: {0}")]
    Transport(String),
}

impl IngestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IngestError::PayloadTooLarge { .. } | IngestError::PayloadOverflow { .. } => {
                ErrorCode::PayloadOverflow
            }
            IngestError::PayloadTruncated { .. } => ErrorCode::PayloadTruncated,
            _ => ErrorCode::MalformedRequest,
        }
    }
}

impl From<FrameError> for IngestError {
    fn from(err: FrameError) -> Self {
        IngestError::Transport(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_chunk_bytes: usize,
    pub max_payload_bytes: u64,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Accumulates chunks of one payload of known length.
#[derive(Debug)]
pub struct IngestDecoder {
    declared: u64,
    max_chunk_bytes: usize,
    buffer: Vec<u8>,
}

impl IngestDecoder {
    pub fn new(declared: u64, limits: &IngestLimits) -> Result<Self, IngestError> {
        if declared > limits.max_payload_bytes {
            return Err(IngestError::PayloadTooLarge {
                declared,
                limit: limits.max_payload_bytes,
            });
        }
        let declared_len = usize::try_from(declared).map_err(|_| IngestError::PayloadTooLarge {
            declared,
            limit: limits.max_payload_bytes,
        })?;
        // reserve at most one chunk up front; the rest arrives with the data
        let capacity = declared_len.min(limits.max_chunk_bytes);
        Ok(Self {
            declared,
            max_chunk_bytes: limits.max_chunk_bytes,
            buffer: Vec::with_capacity(capacity),
        })
    }

    pub fn declared(&self) -> u64 {
        self.declared
    }

    pub fn received(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), IngestError> {
        if chunk.len() > self.max_chunk_bytes {
            return Err(IngestError::ChunkTooLarge {
                len: chunk.len(),
                limit: self.max_chunk_bytes,
            });
        }
        if self.received() + chunk.len() as u64 > self.declared {
            return Err(IngestError::PayloadOverflow {
                declared: self.declared,
            });
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    pub fn finish(self) -> Result<Blob, IngestError> {
        if self.received() != self.declared {
            return Err(IngestError::PayloadTruncated {
                declared: self.declared,
                received: self.received(),
            });
        }
        Ok(Blob::from(self.buffer))
    }
}

/// A fully received client request, ready for routing.
#[derive(Clone, Debug)]
pub enum IngestedRequest {
    Install {
        tag: Tag,
        sizes: RegionSizes,
        bytes: Blob,
    },
    Classify(Photo),
    Remove {
        tag: Tag,
    },
}

impl IngestedRequest {
    pub fn tag(&self) -> Tag {
        match self {
            IngestedRequest::Install { tag, .. } | IngestedRequest::Remove { tag } => *tag,
            IngestedRequest::Classify(photo) => photo.tag,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            IngestedRequest::Install { .. } => "install",
            IngestedRequest::Classify(_) => "classify",
            IngestedRequest::Remove { .. } => "remove",
        }
    }
}

/// Reads a whole request off `frames`: the metadata header, then for install
/// and classify the payload it declares. The stream ending without `Finish` is
/// treated as the end of the payload.
///
/// A classification naming zero or several tags is rejected from the header
/// alone; its photo is left unread on the stream.
pub async fn ingest_request<S>(
    frames: &mut S,
    limits: &IngestLimits,
) -> Result<IngestedRequest, IngestError>
where
    S: Stream<Item = Result<StreamFrame, FrameError>> + Unpin,
{
    let header = match frames.next().await {
        Some(Ok(StreamFrame::Header(header))) => header,
        Some(Ok(_)) | None => return Err(IngestError::MissingMetadata),
        Some(Err(err)) => return Err(err.into()),
    };
    debug!(operation = header.operation(), "request header received");

    match header {
        RequestHeader::Remove { tag } => Ok(IngestedRequest::Remove { tag }),
        RequestHeader::Install { tag, sizes } => {
            let declared = sizes.total().ok_or(IngestError::InvalidSizes)?;
            let bytes = receive_payload(frames, declared, limits).await?;
            Ok(IngestedRequest::Install { tag, sizes, bytes })
        }
        RequestHeader::Classify { tags, photo_size } => {
            let tag = match tags.as_slice() {
                [] => return Err(IngestError::NoTags),
                [tag] => *tag,
                many => {
                    warn!(tags = many.len(), "multi-tag classification is not implemented");
                    return Err(IngestError::UnsupportedMultiTag(many.len()));
                }
            };
            let bytes = receive_payload(frames, photo_size, limits).await?;
            Ok(IngestedRequest::Classify(Photo::new(tag, bytes)))
        }
    }
}

async fn receive_payload<S>(
    frames: &mut S,
    declared: u64,
    limits: &IngestLimits,
) -> Result<Blob, IngestError>
where
    S: Stream<Item = Result<StreamFrame, FrameError>> + Unpin,
{
    let mut decoder = IngestDecoder::new(declared, limits)?;
    while let Some(frame) = frames.next().await {
        match frame? {
            StreamFrame::Chunk(chunk) => decoder.push(&chunk)?,
            StreamFrame::Finish => break,
            StreamFrame::Header(_) => return Err(IngestError::UnexpectedHeader),
        }
    }
    decoder.finish()
}
