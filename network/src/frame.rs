// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Length-prefixed frames: an 8-byte big-endian length followed by a bincode body.

use std::io;

use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tier_types::ErrorCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes a frame may carry beyond its payload (enum tags, length prefixes).
pub const FRAME_OVERHEAD_BYTES: u64 = 64;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: u64, max: u64 },
    #[error("connection closed inside a frame")]
    UnexpectedEof,
    #[error("codec error: {0}")]
    Codec(String),
}

impl FrameError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::MalformedRequest
    }
}

/// Reads one frame. Returns `None` if the peer closed the connection cleanly
/// before the next length prefix.
pub async fn read_frame<T>(io: &mut T, max_len: u64) -> Result<Option<Vec<u8>>, FrameError>
where
    T: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 8];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = io.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::UnexpectedEof)
            };
        }
        filled += n;
    }

    let len = u64::from_be_bytes(len_buf);
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }
    let len_usize = usize::try_from(len).map_err(|_| FrameError::TooLarge { len, max: max_len })?;
    let mut data = vec![0u8; len_usize];
    io.read_exact(&mut data).await.map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::UnexpectedEof
        } else {
            FrameError::Io(err)
        }
    })?;
    Ok(Some(data))
}

pub async fn write_frame<T>(io: &mut T, data: &[u8], max_len: u64) -> Result<(), FrameError>
where
    T: AsyncWrite + Unpin,
{
    let len = data.len() as u64;
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }
    io.write_all(&len.to_be_bytes()).await?;
    io.write_all(data).await?;
    Ok(())
}

pub async fn read_message<M, T>(io: &mut T, max_len: u64) -> Result<Option<M>, FrameError>
where
    M: DeserializeOwned,
    T: AsyncRead + Unpin,
{
    match read_frame(io, max_len).await? {
        Some(data) => bincode::deserialize(&data)
            .map(Some)
            .map_err(|e| FrameError::Codec(e.to_string())),
        None => Ok(None),
    }
}

pub async fn write_message<M, T>(io: &mut T, message: &M, max_len: u64) -> Result<(), FrameError>
where
    M: Serialize,
    T: AsyncWrite + Unpin,
{
    let data = bincode::serialize(message).map_err(|e| FrameError::Codec(e.to_string()))?;
    write_frame(io, &data, max_len).await?;
    io.flush().await?;
    Ok(())
}

/// Decodes frames from `io` until the peer closes the connection. The stream
/// ends after the first error.
pub fn message_stream<M, T>(io: T, max_len: u64) -> impl Stream<Item = Result<M, FrameError>>
where
    M: DeserializeOwned,
    T: AsyncRead + Unpin,
{
    stream::unfold(Some(io), move |state| async move {
        let mut io = state?;
        match read_message::<M, T>(&mut io, max_len).await {
            Ok(Some(message)) => Some((Ok(message), Some(io))),
            Ok(None) => None,
            Err(err) => Some((Err(err), None)),
        }
    })
}
