// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Backend tier hosted inside the node process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use model::{Guess, InferenceLibrary, Photo, RegionSizes};
use parking_lot::RwLock;
use replication::{
    LocalSubstrate, MutationReply, PartitionReplica, PartitionTable, ReplicationError,
    ReplicationSubstrate, TopologyError,
};
use thiserror::Error;
use tier_types::{Blob, MemberAddr, Tag};
use tracing::{info, warn};

use crate::router::{PartitionClient, RouteError};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Every partition member of the table, joined to one in-process substrate.
pub struct LocalCluster {
    table: PartitionTable,
    substrate: Arc<LocalSubstrate>,
    replicas: HashMap<MemberAddr, Arc<PartitionReplica>>,
    unreachable: RwLock<HashSet<MemberAddr>>,
}

impl LocalCluster {
    pub fn start(
        partitions: usize,
        replicas: usize,
        library: Arc<dyn InferenceLibrary>,
    ) -> Result<Self, ClusterError> {
        let table = PartitionTable::uniform(partitions, replicas)?;
        let substrate = Arc::new(LocalSubstrate::new(table.partition_count()));
        let shared: Arc<dyn ReplicationSubstrate> = substrate.clone();

        let mut members = HashMap::new();
        for (partition, addrs) in table.iter() {
            for addr in addrs {
                let replica = Arc::new(PartitionReplica::new(
                    addr.clone(),
                    partition,
                    library.clone(),
                    shared.clone(),
                ));
                substrate.join(partition, addr.clone(), &replica)?;
                members.insert(addr.clone(), replica);
            }
        }
        info!(partitions, replicas, "backend tier started");

        Ok(Self {
            table,
            substrate,
            replicas: members,
            unreachable: RwLock::new(HashSet::new()),
        })
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    pub fn substrate(&self) -> Arc<LocalSubstrate> {
        self.substrate.clone()
    }

    pub fn replica(&self, addr: &MemberAddr) -> Option<Arc<PartitionReplica>> {
        self.replicas.get(addr).cloned()
    }

    pub fn replicas(&self) -> impl Iterator<Item = &Arc<PartitionReplica>> {
        self.replicas.values()
    }

    /// Makes direct calls to `addr` fail without changing its membership.
    pub fn set_reachable(&self, addr: &MemberAddr, reachable: bool) {
        let mut unreachable = self.unreachable.write();
        if reachable {
            unreachable.remove(addr);
        } else {
            unreachable.insert(addr.clone());
        }
    }

    fn connect(&self, addr: &MemberAddr) -> Result<Arc<PartitionReplica>, RouteError> {
        if self.unreachable.read().contains(addr) {
            warn!(member = %addr, "member unreachable");
            return Err(RouteError::MemberUnreachable(addr.clone()));
        }
        self.replica(addr)
            .ok_or_else(|| RouteError::MemberUnreachable(addr.clone()))
    }
}

#[async_trait]
impl PartitionClient for LocalCluster {
    async fn install(
        &self,
        member: &MemberAddr,
        tag: Tag,
        sizes: RegionSizes,
        bytes: Blob,
    ) -> Result<MutationReply, RouteError> {
        let replica = self.connect(member)?;
        Ok(replica.install(tag, sizes, bytes).await)
    }

    async fn remove(&self, member: &MemberAddr, tag: Tag) -> Result<MutationReply, RouteError> {
        let replica = self.connect(member)?;
        Ok(replica.remove(tag).await)
    }

    async fn classify(&self, member: &MemberAddr, photo: Photo) -> Result<Guess, RouteError> {
        let replica = self.connect(member)?;
        Ok(replica.classify(&photo).await)
    }
}
