// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Front-tier client: one connection per call, payloads uploaded in fixed-size chunks.

use std::io;
use std::path::{Path, PathBuf};

use model::RegionSizes;
use thiserror::Error;
use tier_types::Tag;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::frame::{read_message, write_message, FrameError, FRAME_OVERHEAD_BYTES};
use crate::protocol::{Reply, RequestHeader, StreamFrame};

pub const UPLOAD_CHUNK_BYTES: usize = 32 * 1024;

const MAX_REPLY_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to reach {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is empty")]
    EmptyFile(PathBuf),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("server closed the connection without replying")]
    NoReply,
}

#[derive(Clone, Debug)]
pub struct FrontTierClient {
    server: String,
    chunk_bytes: usize,
}

impl FrontTierClient {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            chunk_bytes: UPLOAD_CHUNK_BYTES,
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub async fn install(
        &self,
        tag: Tag,
        label_list: &[u8],
        topology: &[u8],
        weights: &[u8],
    ) -> Result<Reply, ClientError> {
        let sizes = RegionSizes::new(
            label_list.len() as u64,
            topology.len() as u64,
            weights.len() as u64,
        );
        self.call(
            RequestHeader::Install { tag, sizes },
            &[label_list, topology, weights],
        )
        .await
    }

    /// Installs a model from its label list, topology and weights files.
    pub async fn install_files(
        &self,
        tag: Tag,
        labels: &Path,
        topology: &Path,
        weights: &Path,
    ) -> Result<Reply, ClientError> {
        let label_list = read_nonempty(labels).await?;
        let topology = read_nonempty(topology).await?;
        let weights = read_nonempty(weights).await?;
        self.install(tag, &label_list, &topology, &weights).await
    }

    pub async fn classify(&self, tags: &[Tag], photo: &[u8]) -> Result<Reply, ClientError> {
        self.call(
            RequestHeader::Classify {
                tags: tags.to_vec(),
                photo_size: photo.len() as u64,
            },
            &[photo],
        )
        .await
    }

    pub async fn classify_file(&self, tags: &[Tag], photo: &Path) -> Result<Reply, ClientError> {
        let bytes = read_nonempty(photo).await?;
        self.classify(tags, &bytes).await
    }

    pub async fn remove(&self, tag: Tag) -> Result<Reply, ClientError> {
        self.call(RequestHeader::Remove { tag }, &[]).await
    }

    /// Sends `header` and, if there are regions, their bytes followed by
    /// `Finish`. The server may cancel mid-upload; its reply still wins over
    /// the resulting write error.
    pub async fn call(&self, header: RequestHeader, regions: &[&[u8]]) -> Result<Reply, ClientError> {
        let mut stream = TcpStream::connect(&self.server)
            .await
            .map_err(|source| ClientError::Connect {
                server: self.server.clone(),
                source,
            })?;
        let operation = header.operation();
        let sent = self.send(&mut stream, header, regions).await;
        if let Err(err) = &sent {
            debug!(operation, error = %err, "upload interrupted");
        }

        match read_message::<Reply, _>(&mut stream, MAX_REPLY_BYTES).await {
            Ok(Some(reply)) => {
                info!(operation, code = %reply.code(), "reply received");
                Ok(reply)
            }
            Ok(None) => Err(sent.err().map(ClientError::from).unwrap_or(ClientError::NoReply)),
            Err(err) => Err(sent.err().map(ClientError::from).unwrap_or(err.into())),
        }
    }

    async fn send(
        &self,
        stream: &mut TcpStream,
        header: RequestHeader,
        regions: &[&[u8]],
    ) -> Result<(), FrameError> {
        let max_frame = self.chunk_bytes as u64 + FRAME_OVERHEAD_BYTES;
        let streaming = !matches!(header, RequestHeader::Remove { .. });
        write_message(stream, &StreamFrame::Header(header), max_frame).await?;
        if !streaming {
            return Ok(());
        }
        for chunk in regions.iter().flat_map(|region| region.chunks(self.chunk_bytes)) {
            write_message(stream, &StreamFrame::Chunk(chunk.to_vec()), max_frame).await?;
        }
        write_message(stream, &StreamFrame::Finish, max_frame).await
    }
}

async fn read_nonempty(path: &Path) -> Result<Vec<u8>, ClientError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::File {
            path: path.to_path_buf(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(ClientError::EmptyFile(path.to_path_buf()));
    }
    Ok(bytes)
}
