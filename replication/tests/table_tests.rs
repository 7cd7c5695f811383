use replication::{reduce_replies, route, MemberReply, PartitionTable, TopologyError};
use tier_types::{ErrorCode, MemberAddr};

#[test]
fn test_route_is_tag_modulo_partition_count() {
    let table = PartitionTable::uniform(4, 3).expect("table");
    assert_eq!(table.partition_count(), 4);
    for tag in [0u32, 1, 7, 8, 1023, u32::MAX] {
        assert_eq!(table.route(tag), tag as usize % 4);
        assert_eq!(table.route(tag), table.route(tag));
    }
    assert_eq!(route(7, 3), 1);
}

#[test]
fn test_uniform_table_lists_local_members() {
    let table = PartitionTable::uniform(2, 2).expect("table");
    assert_eq!(
        table.members(1).expect("members"),
        &[MemberAddr::local(1, 0), MemberAddr::local(1, 1)]
    );
    assert_eq!(table.partition_of(&MemberAddr::local(1, 1)), Some(1));
    assert_eq!(table.iter().count(), 2);
    assert_eq!(
        table.members(5).unwrap_err(),
        TopologyError::UnknownPartition(5)
    );
}

#[test]
fn test_invalid_tables_are_rejected() {
    assert_eq!(
        PartitionTable::new(Vec::new()).unwrap_err(),
        TopologyError::NoPartitions
    );
    assert_eq!(
        PartitionTable::uniform(2, 0).unwrap_err(),
        TopologyError::EmptyPartition(0)
    );
    let shared = MemberAddr::new("node-a");
    let err = PartitionTable::new(vec![vec![shared.clone()], vec![shared.clone()]]).unwrap_err();
    assert_eq!(err, TopologyError::DuplicateMember(shared));
}

#[test]
fn test_reduce_takes_first_failure_in_delivery_order() {
    let reply = reduce_replies(vec![
        MemberReply::new(MemberAddr::new("a"), ErrorCode::Ok),
        MemberReply::new(MemberAddr::new("b"), ErrorCode::TagNotFound),
        MemberReply::new(MemberAddr::new("c"), ErrorCode::TagAlreadyExists),
    ]);
    assert_eq!(reply.code, ErrorCode::TagNotFound);
    assert!(reply.desc.contains("b"));
    assert_eq!(reply.replies.len(), 3);

    let all_ok = reduce_replies(vec![MemberReply::new(MemberAddr::new("a"), ErrorCode::Ok)]);
    assert!(all_ok.is_ok());

    let empty = reduce_replies(Vec::new());
    assert_eq!(empty.code, ErrorCode::PartitionUnavailable);
}
