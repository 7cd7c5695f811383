//! Replicated partition state for the categorizer backend.
//!
//! Install and remove travel through a total-order broadcast so every member of
//! a partition applies them in the same order; classification reads only the
//! local member.

pub mod local;
pub mod ordered;
pub mod replica;
pub mod substrate;
pub mod table;

pub use local::LocalSubstrate;
pub use ordered::{reduce_replies, MutationReply};
pub use replica::PartitionReplica;
pub use substrate::{MemberReply, Mutation, MutationHandler, ReplicationError, ReplicationSubstrate};
pub use table::{route, PartitionTable, TopologyError};
