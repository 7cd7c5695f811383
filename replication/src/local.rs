// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! In-process total-order substrate.
//!
//! Each partition owns a sequencer. A broadcast holds the sequencer while it
//! assigns the next sequence number and delivers the mutation to every live
//! member, so two broadcasts to the same partition can never interleave and
//! every member observes them in the same order. Broadcasts to different
//! partitions proceed independently.
//!
//! Members that join late start from an empty registry; no state transfer is
//! performed.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use tier_types::{MemberAddr, PartitionId};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, warn};

use crate::substrate::{MemberReply, Mutation, MutationHandler, ReplicationError, ReplicationSubstrate};

struct Member {
    addr: MemberAddr,
    handler: Weak<dyn MutationHandler>,
    alive: bool,
}

#[derive(Default)]
struct PartitionGroup {
    sequencer: TokioMutex<u64>,
    members: RwLock<Vec<Member>>,
}

pub struct LocalSubstrate {
    partitions: Vec<PartitionGroup>,
}

impl LocalSubstrate {
    pub fn new(partition_count: usize) -> Self {
        Self {
            partitions: (0..partition_count).map(|_| PartitionGroup::default()).collect(),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Adds `handler` as a live member of `partition`. The substrate only keeps a
    /// weak reference; a dropped handler silently stops receiving deliveries.
    pub fn join<H>(
        &self,
        partition: PartitionId,
        addr: MemberAddr,
        handler: &Arc<H>,
    ) -> Result<(), ReplicationError>
    where
        H: MutationHandler + 'static,
    {
        let group = self.group(partition)?;
        let mut members = group.members.write();
        if members.iter().any(|member| member.addr == addr) {
            return Err(ReplicationError::MemberAlreadyJoined(addr));
        }
        let handler: Weak<dyn MutationHandler> = Arc::downgrade(handler) as Weak<H>;
        debug!(partition, member = %addr, "member joined");
        members.push(Member {
            addr,
            handler,
            alive: true,
        });
        Ok(())
    }

    /// Marks `addr` up or down. Down members are skipped by deliveries and hidden
    /// from `current_members`. Returns false if no partition knows `addr`.
    pub fn set_alive(&self, addr: &MemberAddr, alive: bool) -> bool {
        for (partition, group) in self.partitions.iter().enumerate() {
            let mut members = group.members.write();
            if let Some(member) = members.iter_mut().find(|member| &member.addr == addr) {
                if member.alive != alive {
                    debug!(partition, member = %addr, alive, "member liveness changed");
                }
                member.alive = alive;
                return true;
            }
        }
        false
    }

    pub fn is_alive(&self, addr: &MemberAddr) -> bool {
        self.partitions.iter().any(|group| {
            group
                .members
                .read()
                .iter()
                .any(|member| &member.addr == addr && member.alive && member.handler.strong_count() > 0)
        })
    }

    fn group(&self, partition: PartitionId) -> Result<&PartitionGroup, ReplicationError> {
        self.partitions
            .get(partition)
            .ok_or(ReplicationError::UnknownPartition(partition))
    }
}

#[async_trait]
impl ReplicationSubstrate for LocalSubstrate {
    async fn broadcast_ordered(
        &self,
        partition: PartitionId,
        mutation: Mutation,
    ) -> Result<Vec<MemberReply>, ReplicationError> {
        let group = self.group(partition)?;
        let mut sequence = group.sequencer.lock().await;

        let targets: Vec<(MemberAddr, Arc<dyn MutationHandler>)> = group
            .members
            .read()
            .iter()
            .filter(|member| member.alive)
            .filter_map(|member| {
                member
                    .handler
                    .upgrade()
                    .map(|handler| (member.addr.clone(), handler))
            })
            .collect();
        if targets.is_empty() {
            warn!(partition, mutation = mutation.kind(), tag = mutation.tag(), "no live members");
            return Err(ReplicationError::NoLiveMembers(partition));
        }

        *sequence += 1;
        let seq = *sequence;
        let replies = targets
            .into_iter()
            .map(|(addr, handler)| {
                let code = handler.deliver(seq, &mutation);
                debug!(partition, seq, member = %addr, %code, "mutation delivered");
                MemberReply::new(addr, code)
            })
            .collect();
        Ok(replies)
    }

    fn current_members(&self, partition: PartitionId) -> Vec<MemberAddr> {
        self.partitions
            .get(partition)
            .map(|group| {
                group
                    .members
                    .read()
                    .iter()
                    .filter(|member| member.alive && member.handler.strong_count() > 0)
                    .map(|member| member.addr.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
