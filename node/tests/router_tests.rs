// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::collections::HashSet;
use std::sync::Arc;

use categorizer_node::{LocalCluster, MemberPolicy, RouteError, Router};
use model::{Engine, Guess, InferenceError, InferenceLibrary, ModelRegions, Photo, RegionSizes};
use tier_types::{Blob, ErrorCode, MemberAddr};

struct ConstantEngine;

impl Engine for ConstantEngine {
    fn query(&self, _photo: &[u8]) -> Result<Guess, InferenceError> {
        Ok(Guess::new("daisy", 0.75))
    }
}

struct ConstantLibrary;

impl InferenceLibrary for ConstantLibrary {
    fn build_engine(&self, _regions: ModelRegions<'_>) -> Result<Box<dyn Engine>, InferenceError> {
        Ok(Box::new(ConstantEngine))
    }
}

fn setup(partitions: usize, replicas: usize, policy: MemberPolicy) -> (Arc<LocalCluster>, Router) {
    let cluster = Arc::new(
        LocalCluster::start(partitions, replicas, Arc::new(ConstantLibrary)).expect("cluster"),
    );
    let router = Router::new(
        cluster.table().clone(),
        cluster.substrate(),
        cluster.clone(),
        policy,
    );
    (cluster, router)
}

fn payload() -> (RegionSizes, Blob) {
    (RegionSizes::new(10, 20, 30), Blob::from(vec![1u8; 60]))
}

#[test]
fn test_routing_is_deterministic() {
    let (_cluster, router) = setup(3, 2, MemberPolicy::First);
    for tag in 0..100u32 {
        assert_eq!(router.route(tag), tag as usize % 3);
        assert_eq!(router.route(tag), router.route(tag));
    }
}

#[test]
fn test_first_policy_picks_first_live_member() {
    let (cluster, router) = setup(2, 3, MemberPolicy::First);
    assert_eq!(router.pick_member(1).expect("member"), MemberAddr::local(1, 0));

    cluster.substrate().set_alive(&MemberAddr::local(1, 0), false);
    assert_eq!(router.pick_member(1).expect("member"), MemberAddr::local(1, 1));
}

#[test]
fn test_random_policy_stays_within_live_members() {
    let (cluster, router) = setup(1, 3, MemberPolicy::Random);
    cluster.substrate().set_alive(&MemberAddr::local(0, 2), false);

    let picked: HashSet<MemberAddr> = (0..64)
        .map(|_| router.pick_member(0).expect("member"))
        .collect();
    assert!(!picked.contains(&MemberAddr::local(0, 2)));
    assert!(!picked.is_empty());
}

#[test]
fn test_partition_without_members_is_unavailable() {
    let (cluster, router) = setup(2, 1, MemberPolicy::First);
    cluster.substrate().set_alive(&MemberAddr::local(0, 0), false);

    let err = router.pick_member(0).unwrap_err();
    assert_eq!(err, RouteError::PartitionUnavailable(0));
    assert_eq!(err.code(), ErrorCode::PartitionUnavailable);
    assert!(router.pick_member(1).is_ok());
}

#[tokio::test]
async fn test_install_reaches_every_member_of_owning_partition_only() {
    let (cluster, router) = setup(2, 3, MemberPolicy::First);
    let (sizes, bytes) = payload();

    let reply = router.install(7, sizes, bytes).await.expect("routed");
    assert_eq!(reply.code, ErrorCode::Ok);
    assert_eq!(reply.replies.len(), 3);

    for replica in cluster.replicas() {
        assert_eq!(replica.registry().contains(7), replica.partition() == 1);
    }
}

#[tokio::test]
async fn test_classify_reads_one_member_without_ordering() {
    let (cluster, router) = setup(1, 2, MemberPolicy::First);
    let (sizes, bytes) = payload();
    router.install(4, sizes, bytes).await.expect("routed");

    let guess = router
        .classify(Photo::new(4, Blob::from(vec![0u8; 8])))
        .await
        .expect("guess");
    assert_eq!(guess.label, "daisy");

    let first = cluster.replica(&MemberAddr::local(0, 0)).expect("replica");
    let second = cluster.replica(&MemberAddr::local(0, 1)).expect("replica");
    assert!(first.cache().is_cached(4));
    assert!(!second.cache().is_cached(4));
    assert_eq!(first.applied_seq(), second.applied_seq());
}

#[tokio::test]
async fn test_unreachable_member_fails_without_retry() {
    let (cluster, router) = setup(1, 2, MemberPolicy::First);
    let first = MemberAddr::local(0, 0);
    cluster.set_reachable(&first, false);

    let err = router.remove(3).await.unwrap_err();
    assert_eq!(err, RouteError::MemberUnreachable(first.clone()));
    assert_eq!(err.code(), ErrorCode::PartitionUnavailable);

    let (sizes, bytes) = payload();
    assert!(router.install(3, sizes, bytes).await.is_err());
    for replica in cluster.replicas() {
        assert!(!replica.registry().contains(3));
    }

    cluster.set_reachable(&first, true);
    let reply = router.remove(3).await.expect("routed");
    assert_eq!(reply.code, ErrorCode::TagNotFound);
}
