//! Front-tier wire messages.
//!
//! A call is one connection: the client sends `StreamFrame::Header`, then for
//! streaming operations any number of `StreamFrame::Chunk` frames and a final
//! `StreamFrame::Finish`. The server answers with exactly one [`Reply`].

use model::RegionSizes;
use serde::{Deserialize, Serialize};
use tier_types::{ErrorCode, Tag};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestHeader {
    Install { tag: Tag, sizes: RegionSizes },
    Classify { tags: Vec<Tag>, photo_size: u64 },
    Remove { tag: Tag },
}

impl RequestHeader {
    pub fn operation(&self) -> &'static str {
        match self {
            RequestHeader::Install { .. } => "install",
            RequestHeader::Classify { .. } => "classify",
            RequestHeader::Remove { .. } => "remove",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamFrame {
    Header(RequestHeader),
    Chunk(Vec<u8>),
    Finish,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Result of an install or remove.
    Model { code: ErrorCode, desc: String },
    /// Result of a classification, always a description.
    Photo { desc: String },
    /// The request was cancelled before reaching the backend.
    Cancelled { code: ErrorCode, desc: String },
}

impl Reply {
    pub fn code(&self) -> ErrorCode {
        match self {
            Reply::Model { code, .. } | Reply::Cancelled { code, .. } => *code,
            Reply::Photo { .. } => ErrorCode::Ok,
        }
    }

    pub fn desc(&self) -> &str {
        match self {
            Reply::Model { desc, .. } | Reply::Photo { desc } | Reply::Cancelled { desc, .. } => desc,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Reply::Cancelled { .. })
    }
}

pub const MULTI_TAG_UNSUPPORTED: &str = "Multiple tags support to be implemented.";
