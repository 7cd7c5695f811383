// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! One member of a backend partition.
//!
//! Writes go through the substrate and come back to every member, this one
//! included, through [`MutationHandler::deliver`]. Reads are answered from the
//! local registry and engine cache without any coordination.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use model::{
    EngineCache, Guess, InferenceError, InferenceLibrary, ModelEntry, Photo, PartitionRegistry,
    RegionSizes,
};
use tier_types::{Blob, ErrorCode, MemberAddr, PartitionId, Tag};
use tracing::{debug, info, warn};

use crate::ordered::{reduce_replies, MutationReply};
use crate::substrate::{Mutation, MutationHandler, ReplicationSubstrate};

pub struct PartitionReplica {
    addr: MemberAddr,
    partition: PartitionId,
    registry: Arc<PartitionRegistry>,
    cache: EngineCache,
    substrate: Arc<dyn ReplicationSubstrate>,
    applied_seq: AtomicU64,
}

impl PartitionReplica {
    pub fn new(
        addr: MemberAddr,
        partition: PartitionId,
        library: Arc<dyn InferenceLibrary>,
        substrate: Arc<dyn ReplicationSubstrate>,
    ) -> Self {
        let registry = Arc::new(PartitionRegistry::new(partition));
        let cache = EngineCache::new(registry.clone(), library);
        Self {
            addr,
            partition,
            registry,
            cache,
            substrate,
            applied_seq: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> &MemberAddr {
        &self.addr
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &EngineCache {
        &self.cache
    }

    /// Sequence number of the last mutation delivered to this member.
    pub fn applied_seq(&self) -> u64 {
        self.applied_seq.load(Ordering::Acquire)
    }

    /// Validates the assembled payload and replicates the install to the partition.
    pub async fn install(&self, tag: Tag, sizes: RegionSizes, bytes: Blob) -> MutationReply {
        let entry = match ModelEntry::new(tag, sizes, bytes) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(tag, member = %self.addr, error = %err, "install rejected before replication");
                return MutationReply::rejected(err.code(), err.to_string());
            }
        };
        self.propose(Mutation::Install(Arc::new(entry))).await
    }

    pub async fn remove(&self, tag: Tag) -> MutationReply {
        self.propose(Mutation::Remove(tag)).await
    }

    /// Classifies a photo against the local replica state. Missing models and
    /// engines that cannot be built are answered with a descriptive guess.
    pub async fn classify(&self, photo: &Photo) -> Guess {
        match self.cache.infer(photo.tag, &photo.bytes).await {
            Ok(guess) => guess,
            Err(InferenceError::ModelNotFound(tag)) => {
                debug!(tag, member = %self.addr, "classify for unknown tag");
                Guess::model_not_found()
            }
            Err(InferenceError::EngineBuildFailed(_)) => Guess::engine_unavailable(),
            Err(err) => Guess::new(format!("Inference failed: {err}"), 0.0),
        }
    }

    async fn propose(&self, mutation: Mutation) -> MutationReply {
        let tag = mutation.tag();
        let kind = mutation.kind();
        let reply = match self.substrate.broadcast_ordered(self.partition, mutation).await {
            Ok(replies) => reduce_replies(replies),
            Err(err) => MutationReply::rejected(err.code(), err.to_string()),
        };
        info!(
            tag,
            partition = self.partition,
            mutation = kind,
            code = %reply.code,
            members = reply.replies.len(),
            "mutation completed"
        );
        reply
    }

    fn apply(&self, mutation: &Mutation) -> ErrorCode {
        match mutation {
            Mutation::Install(entry) => match self.registry.insert(entry.clone()) {
                Ok(()) => ErrorCode::Ok,
                Err(err) => err.code(),
            },
            Mutation::Remove(tag) => match self.registry.remove(*tag) {
                Ok(_) => {
                    self.cache.evict(*tag);
                    ErrorCode::Ok
                }
                Err(err) => err.code(),
            },
        }
    }
}

impl MutationHandler for PartitionReplica {
    fn deliver(&self, seq: u64, mutation: &Mutation) -> ErrorCode {
        let code = self.apply(mutation);
        self.applied_seq.store(seq, Ordering::Release);
        debug!(
            member = %self.addr,
            seq,
            mutation = mutation.kind(),
            tag = mutation.tag(),
            %code,
            "applied mutation"
        );
        code
    }
}
