//! Per-partition model registry and inference engine cache for the categorizer backend.
//!
//! The registry holds the raw bytes of every installed model, keyed by tag. The
//! engine cache turns a registered model into a query-ready engine on first use,
//! once per tag, through the pluggable [`InferenceLibrary`].

pub mod engine;
pub mod inference;
pub mod linear;
pub mod registry;

pub use engine::{Engine, EngineHandle, Guess, InferenceLibrary, Photo};
pub use inference::{CacheMetrics, CacheStats, EngineCache, InferenceError};
pub use linear::{encode_linear_model, LinearEngine, LinearLibrary, LinearTopology};
pub use registry::{ModelEntry, ModelError, ModelRegions, PartitionRegistry, RegionSizes};
