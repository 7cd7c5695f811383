// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use tier_types::ErrorCode;

use crate::substrate::MemberReply;

/// Aggregate outcome of one ordered mutation across a partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationReply {
    pub code: ErrorCode,
    pub desc: String,
    pub replies: Vec<MemberReply>,
}

impl MutationReply {
    /// A mutation that never reached the substrate.
    pub fn rejected(code: ErrorCode, desc: impl Into<String>) -> Self {
        Self {
            code,
            desc: desc.into(),
            replies: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

/// Success only if every member succeeded; otherwise the first nonzero code in
/// delivery order. Members that applied the mutation keep it either way.
pub fn reduce_replies(replies: Vec<MemberReply>) -> MutationReply {
    if replies.is_empty() {
        return MutationReply {
            code: ErrorCode::PartitionUnavailable,
            desc: "no partition member applied the mutation".to_string(),
            replies,
        };
    }

    let failed = replies.iter().find(|reply| !reply.code.is_ok());
    let (code, desc) = match failed {
        None => (ErrorCode::Ok, ErrorCode::Ok.description().to_string()),
        Some(reply) => {
            let diverged = replies.iter().any(|other| other.code != reply.code);
            let desc = if diverged {
                format!(
                    "{} (member {}; partition members disagree)",
                    reply.code.description(),
                    reply.member
                )
            } else {
                reply.code.description().to_string()
            };
            (reply.code, desc)
        }
    };

    MutationReply {
        code,
        desc,
        replies,
    }
}
