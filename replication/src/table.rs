// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Static partition layout: which partition owns a tag and who its members are.

use std::collections::HashSet;

use thiserror::Error;
use tier_types::{ErrorCode, MemberAddr, PartitionId, Tag};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("partition table has no partitions")]
    NoPartitions,
    #[error("partition {0} has no members")]
    EmptyPartition(PartitionId),
    #[error("unknown partition {0}")]
    UnknownPartition(PartitionId),
    #[error("member {0} listed more than once")]
    DuplicateMember(MemberAddr),
}

impl TopologyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TopologyError::UnknownPartition(_) => ErrorCode::PartitionUnavailable,
            _ => ErrorCode::ReplicationFailed,
        }
    }
}

/// Partition layout fixed for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionTable {
    partitions: Vec<Vec<MemberAddr>>,
}

impl PartitionTable {
    pub fn new(partitions: Vec<Vec<MemberAddr>>) -> Result<Self, TopologyError> {
        if partitions.is_empty() {
            return Err(TopologyError::NoPartitions);
        }
        let mut seen = HashSet::new();
        for (partition, members) in partitions.iter().enumerate() {
            if members.is_empty() {
                return Err(TopologyError::EmptyPartition(partition));
            }
            for member in members {
                if !seen.insert(member.clone()) {
                    return Err(TopologyError::DuplicateMember(member.clone()));
                }
            }
        }
        Ok(Self { partitions })
    }

    /// `partition_count` partitions of `replicas` in-process members each.
    pub fn uniform(partition_count: usize, replicas: usize) -> Result<Self, TopologyError> {
        let partitions = (0..partition_count)
            .map(|partition| {
                (0..replicas)
                    .map(|replica| MemberAddr::local(partition, replica))
                    .collect()
            })
            .collect();
        Self::new(partitions)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Owning partition of `tag`. Pure in `tag` for a given table.
    pub fn route(&self, tag: Tag) -> PartitionId {
        route(tag, self.partitions.len())
    }

    pub fn members(&self, partition: PartitionId) -> Result<&[MemberAddr], TopologyError> {
        self.partitions
            .get(partition)
            .map(Vec::as_slice)
            .ok_or(TopologyError::UnknownPartition(partition))
    }

    pub fn partition_of(&self, member: &MemberAddr) -> Option<PartitionId> {
        self.partitions
            .iter()
            .position(|members| members.contains(member))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartitionId, &[MemberAddr])> {
        self.partitions
            .iter()
            .enumerate()
            .map(|(partition, members)| (partition, members.as_slice()))
    }
}

/// `tag mod partition_count`; callers guarantee a nonzero count.
pub fn route(tag: Tag, partition_count: usize) -> PartitionId {
    tag as usize % partition_count
}
