// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Total-order broadcast capability the backend replicas are built on.

use std::sync::Arc;

use async_trait::async_trait;
use model::ModelEntry;
use thiserror::Error;
use tier_types::{ErrorCode, MemberAddr, PartitionId, Tag};

/// A registry change replicated to every member of a partition.
#[derive(Clone, Debug)]
pub enum Mutation {
    Install(Arc<ModelEntry>),
    Remove(Tag),
}

impl Mutation {
    pub fn tag(&self) -> Tag {
        match self {
            Mutation::Install(entry) => entry.tag(),
            Mutation::Remove(tag) => *tag,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Install(_) => "install",
            Mutation::Remove(_) => "remove",
        }
    }
}

/// Local result of applying one delivered mutation on one member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberReply {
    pub member: MemberAddr,
    pub code: ErrorCode,
}

impl MemberReply {
    pub fn new(member: MemberAddr, code: ErrorCode) -> Self {
        Self { member, code }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    #[error("unknown partition {0}")]
    UnknownPartition(PartitionId),
    #[error("partition {0} has no live members")]
    NoLiveMembers(PartitionId),
    #[error("member {0} already joined")]
    MemberAlreadyJoined(MemberAddr),
}

impl ReplicationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ReplicationError::NoLiveMembers(_) => ErrorCode::PartitionUnavailable,
            ReplicationError::UnknownPartition(_) | ReplicationError::MemberAlreadyJoined(_) => {
                ErrorCode::ReplicationFailed
            }
        }
    }
}

/// Receives mutations in delivery order. Implemented by every partition member.
pub trait MutationHandler: Send + Sync {
    fn deliver(&self, seq: u64, mutation: &Mutation) -> ErrorCode;
}

#[async_trait]
pub trait ReplicationSubstrate: Send + Sync {
    /// Delivers `mutation` to every live member of `partition`, in the same
    /// relative order on all of them, and returns each member's local result.
    async fn broadcast_ordered(
        &self,
        partition: PartitionId,
        mutation: Mutation,
    ) -> Result<Vec<MemberReply>, ReplicationError>;

    /// Members of `partition` currently able to receive deliveries.
    fn current_members(&self, partition: PartitionId) -> Vec<MemberAddr>;
}
