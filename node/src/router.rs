// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Front-tier routing: tag to partition, partition to one live member.
//!
//! Writes are handed to the chosen member, which replicates them through the
//! ordered mutation protocol. Reads are answered by that member alone. A member
//! that cannot be reached fails the call; there is no retry on another member.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use model::{Guess, Photo, RegionSizes};
use rand::seq::SliceRandom;
use replication::{MutationReply, PartitionTable, ReplicationSubstrate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tier_types::{Blob, ErrorCode, MemberAddr, PartitionId, Tag};
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("partition {0} has no live members")]
    PartitionUnavailable(PartitionId),
    #[error("member {0} is unreachable")]
    MemberUnreachable(MemberAddr),
}

impl RouteError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::PartitionUnavailable
    }
}

/// Direct calls to one partition member.
#[async_trait]
pub trait PartitionClient: Send + Sync {
    async fn install(
        &self,
        member: &MemberAddr,
        tag: Tag,
        sizes: RegionSizes,
        bytes: Blob,
    ) -> Result<MutationReply, RouteError>;

    async fn remove(&self, member: &MemberAddr, tag: Tag) -> Result<MutationReply, RouteError>;

    async fn classify(&self, member: &MemberAddr, photo: Photo) -> Result<Guess, RouteError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberPolicy {
    #[default]
    First,
    Random,
}

impl FromStr for MemberPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MemberPolicy::First),
            "random" => Ok(MemberPolicy::Random),
            other => Err(format!("unknown member policy '{other}'")),
        }
    }
}

impl fmt::Display for MemberPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberPolicy::First => f.write_str("first"),
            MemberPolicy::Random => f.write_str("random"),
        }
    }
}

pub struct Router {
    table: PartitionTable,
    substrate: Arc<dyn ReplicationSubstrate>,
    client: Arc<dyn PartitionClient>,
    policy: MemberPolicy,
}

impl Router {
    pub fn new(
        table: PartitionTable,
        substrate: Arc<dyn ReplicationSubstrate>,
        client: Arc<dyn PartitionClient>,
        policy: MemberPolicy,
    ) -> Self {
        Self {
            table,
            substrate,
            client,
            policy,
        }
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    pub fn policy(&self) -> MemberPolicy {
        self.policy
    }

    pub fn route(&self, tag: Tag) -> PartitionId {
        self.table.route(tag)
    }

    pub fn pick_member(&self, partition: PartitionId) -> Result<MemberAddr, RouteError> {
        let members = self.substrate.current_members(partition);
        let chosen = match self.policy {
            MemberPolicy::First => members.first(),
            MemberPolicy::Random => members.choose(&mut rand::thread_rng()),
        };
        chosen.cloned().ok_or_else(|| {
            warn!(partition, "no live member to route to");
            RouteError::PartitionUnavailable(partition)
        })
    }

    pub async fn install(
        &self,
        tag: Tag,
        sizes: RegionSizes,
        bytes: Blob,
    ) -> Result<MutationReply, RouteError> {
        let member = self.target(tag)?;
        self.client.install(&member, tag, sizes, bytes).await
    }

    pub async fn remove(&self, tag: Tag) -> Result<MutationReply, RouteError> {
        let member = self.target(tag)?;
        self.client.remove(&member, tag).await
    }

    pub async fn classify(&self, photo: Photo) -> Result<Guess, RouteError> {
        let member = self.target(photo.tag)?;
        self.client.classify(&member, photo).await
    }

    fn target(&self, tag: Tag) -> Result<MemberAddr, RouteError> {
        let partition = self.route(tag);
        let member = self.pick_member(partition)?;
        debug!(tag, partition, member = %member, "routed");
        Ok(member)
    }
}
