//! Categorizer node: the front tier and an in-process backend tier.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod router;
pub mod server;

pub use crate::cluster::{ClusterError, LocalCluster};
pub use crate::config::{ClusterConfig, FrontConfig, LibraryKind, ModelConfig, NodeConfiguration};
pub use crate::router::{MemberPolicy, PartitionClient, RouteError, Router};
pub use crate::server::FrontTierServer;
