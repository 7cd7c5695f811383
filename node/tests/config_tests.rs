use std::collections::HashMap;
use std::net::SocketAddr;

use categorizer_node::cli::{Cli, ClientCommand, Commands, ServeArgs};
use clap::Parser;
use categorizer_node::{MemberPolicy, NodeConfiguration};

#[test]
fn test_toml_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = NodeConfiguration::default();
    cfg.cluster.partitions = 5;
    cfg.front.member_policy = MemberPolicy::Random;
    cfg.save_to_file(&path).expect("save");

    let loaded = NodeConfiguration::load_from_file(&path).expect("load");
    assert_eq!(loaded, cfg);
}

#[test]
fn test_json_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");

    let mut cfg = NodeConfiguration::default();
    cfg.front.listen_addr = "0.0.0.0:7000".parse().expect("addr");
    cfg.save_to_file(&path).expect("save");

    let raw = std::fs::read_to_string(&path).expect("read");
    assert!(raw.contains("\"listen_addr\""));
    assert_eq!(NodeConfiguration::load_from_file(&path).expect("load"), cfg);
}

#[test]
fn test_missing_sections_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[cluster]\npartitions = 4\nreplicas = 1\n").expect("write");

    let loaded = NodeConfiguration::load_from_file(&path).expect("load");
    assert_eq!(loaded.cluster.partitions, 4);
    assert_eq!(loaded.cluster.replicas, 1);
    assert_eq!(loaded.front, NodeConfiguration::default().front);
}

#[test]
fn test_env_then_cli_overrides() {
    let vars: HashMap<&str, &str> = [
        ("CATEGORIZER_PARTITIONS", "8"),
        ("CATEGORIZER_REPLICAS", "2"),
        ("CATEGORIZER_MEMBER_POLICY", "random"),
        ("CATEGORIZER_MAX_CHUNK_BYTES", "not-a-number"),
    ]
    .into_iter()
    .collect();
    let cfg = NodeConfiguration::default()
        .merge_with_vars(|key| vars.get(key).map(|v| v.to_string()));
    assert_eq!(cfg.cluster.partitions, 8);
    assert_eq!(cfg.cluster.replicas, 2);
    assert_eq!(cfg.front.member_policy, MemberPolicy::Random);
    assert_eq!(
        cfg.front.max_chunk_bytes,
        NodeConfiguration::default().front.max_chunk_bytes
    );

    let listen: SocketAddr = "127.0.0.1:6000".parse().expect("addr");
    let cli = Cli {
        command: Commands::Serve(ServeArgs {
            config: None,
            listen: Some(listen),
            partitions: Some(3),
            replicas: None,
        }),
    };
    let cfg = cfg.merge_with_cli(&cli);
    assert_eq!(cfg.front.listen_addr, listen);
    assert_eq!(cfg.cluster.partitions, 3);
    assert_eq!(cfg.cluster.replicas, 2);
}

#[test]
fn test_validation_rejects_unusable_settings() {
    assert!(NodeConfiguration::default().validate().is_ok());

    let mut cfg = NodeConfiguration::default();
    cfg.cluster.partitions = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = NodeConfiguration::default();
    cfg.cluster.replicas = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = NodeConfiguration::default();
    cfg.front.listen_addr = "127.0.0.1:0".parse().expect("addr");
    assert!(cfg.validate().is_err());

    let mut cfg = NodeConfiguration::default();
    cfg.front.max_chunk_bytes = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = NodeConfiguration::default();
    cfg.front.max_payload_bytes = 16;
    cfg.front.max_chunk_bytes = 32;
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("max_chunk_bytes"));
}

#[test]
fn test_cli_parses_serve_overrides_and_tag_lists() {
    let cli = Cli::try_parse_from([
        "categorizer-node",
        "serve",
        "--listen",
        "0.0.0.0:9000",
        "--replicas",
        "5",
    ])
    .expect("serve");
    let cfg = NodeConfiguration::default().merge_with_cli(&cli);
    assert_eq!(cfg.front.listen_addr.port(), 9000);
    assert_eq!(cfg.cluster.replicas, 5);
    assert_eq!(cfg.cluster.partitions, 2);

    let cli = Cli::try_parse_from([
        "categorizer-node",
        "client",
        "--server",
        "127.0.0.1:50051",
        "classify",
        "3,8",
        "cat.jpg",
    ])
    .expect("client");
    match cli.command {
        Commands::Client(args) => match args.command {
            ClientCommand::Classify { tags, photo } => {
                assert_eq!(tags, vec![3, 8]);
                assert_eq!(photo.to_str(), Some("cat.jpg"));
            }
            other => panic!("unexpected command: {other:?}"),
        },
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(Cli::try_parse_from(["categorizer-node", "client", "--server", "x", "remove"]).is_err());
}
