// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Types shared between the front tier, the backend replicas and the wire protocol.

use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifies one installed model and, through routing, the partition owning it.
pub type Tag = u32;

/// Index of a backend partition inside the partition table.
pub type PartitionId = usize;

/// Address of one member of a backend partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberAddr(pub String);

impl MemberAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Address used for replica `replica` of partition `partition` in an in-process cluster.
    pub fn local(partition: PartitionId, replica: usize) -> Self {
        Self(format!("p{partition}-r{replica}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result codes reported to clients. `Ok` is zero, every failure is nonzero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    TagAlreadyExists = 1,
    TagNotFound = 2,
    PayloadOverflow = 3,
    PayloadTruncated = 4,
    MalformedRequest = 5,
    PartitionUnavailable = 6,
    EngineBuildFailed = 7,
    ReplicationFailed = 8,
    InferenceFailed = 9,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ErrorCode::Ok),
            1 => Some(ErrorCode::TagAlreadyExists),
            2 => Some(ErrorCode::TagNotFound),
            3 => Some(ErrorCode::PayloadOverflow),
            4 => Some(ErrorCode::PayloadTruncated),
            5 => Some(ErrorCode::MalformedRequest),
            6 => Some(ErrorCode::PartitionUnavailable),
            7 => Some(ErrorCode::EngineBuildFailed),
            8 => Some(ErrorCode::ReplicationFailed),
            9 => Some(ErrorCode::InferenceFailed),
            _ => None,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::TagAlreadyExists => "a model is already installed under this tag",
            ErrorCode::TagNotFound => "no model is installed under this tag",
            ErrorCode::PayloadOverflow => "received more data than declared",
            ErrorCode::PayloadTruncated => "received less data than declared",
            ErrorCode::MalformedRequest => "malformed request",
            ErrorCode::PartitionUnavailable => "partition unavailable",
            ErrorCode::EngineBuildFailed => "inference engine could not be built",
            ErrorCode::ReplicationFailed => "replication substrate failure",
            ErrorCode::InferenceFailed => "inference engine failed to answer",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_i32(), self.description())
    }
}

/// Immutable, cheaply clonable byte buffer. The unit of transfer for model files and photos.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Blob {
    bytes: Arc<[u8]>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Bounds-checked view of `range`; `None` if it falls outside the blob.
    pub fn region(&self, range: Range<usize>) -> Option<&[u8]> {
        self.bytes.get(range)
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.bytes.len())
    }
}
