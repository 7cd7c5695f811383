// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Lazily materialized inference engines, one per installed tag.
//!
//! Engines are built from the partition registry on first use and cached until
//! the model is removed. Concurrent first requests for the same tag share one
//! build through a per-tag build ticket; builds for different tags never wait on
//! each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tier_types::{ErrorCode, Tag};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::engine::{EngineHandle, Guess, InferenceLibrary};
use crate::registry::{ModelEntry, PartitionRegistry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("model not found for tag {0}")]
    ModelNotFound(Tag),
    #[error("engine build failed: {0}")]
    EngineBuildFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl InferenceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            InferenceError::ModelNotFound(_) => ErrorCode::TagNotFound,
            InferenceError::EngineBuildFailed(_) => ErrorCode::EngineBuildFailed,
            InferenceError::InferenceFailed(_) => ErrorCode::InferenceFailed,
            InferenceError::InvalidInput(_) => ErrorCode::MalformedRequest,
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub engines_built: AtomicU64,
    pub build_failures: AtomicU64,
    pub evictions: AtomicU64,
    pub inference_runs: AtomicU64,
    pub inference_failures: AtomicU64,
    pub total_inference_time_us: AtomicU64,
}

impl CacheMetrics {
    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_engines_built(&self) {
        self.engines_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_build_failures(&self) {
        self.build_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_inference(&self, elapsed_us: u64, ok: bool) {
        if ok {
            self.inference_runs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inference_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_inference_time_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            engines_built: self.engines_built.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            inference_runs: self.inference_runs.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            total_inference_time_us: self.total_inference_time_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub engines_built: u64,
    pub build_failures: u64,
    pub evictions: u64,
    pub inference_runs: u64,
    pub inference_failures: u64,
    pub total_inference_time_us: u64,
}

/// One in-flight build. Every request that misses the cache while the ticket is
/// live awaits the same result instead of starting its own build.
struct BuildTicket {
    entry: Arc<ModelEntry>,
    result: OnceCell<Result<EngineHandle, InferenceError>>,
}

impl BuildTicket {
    fn new(entry: Arc<ModelEntry>) -> Self {
        Self {
            entry,
            result: OnceCell::new(),
        }
    }
}

pub struct EngineCache {
    registry: Arc<PartitionRegistry>,
    library: Arc<dyn InferenceLibrary>,
    engines: RwLock<HashMap<Tag, EngineHandle>>,
    builds: DashMap<Tag, Arc<BuildTicket>>,
    metrics: CacheMetrics,
}

impl EngineCache {
    pub fn new(registry: Arc<PartitionRegistry>, library: Arc<dyn InferenceLibrary>) -> Self {
        Self {
            registry,
            library,
            engines: RwLock::new(HashMap::new()),
            builds: DashMap::new(),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn registry(&self) -> Arc<PartitionRegistry> {
        self.registry.clone()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    pub fn is_cached(&self, tag: Tag) -> bool {
        self.engines.read().contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }

    /// Classifies `photo` with the engine for `tag`, building it first if needed.
    pub async fn infer(&self, tag: Tag, photo: &[u8]) -> Result<Guess, InferenceError> {
        let engine = self.engine_for(tag).await?;
        let start = Instant::now();
        let result = engine.query(photo);
        self.metrics
            .observe_inference(start.elapsed().as_micros() as u64, result.is_ok());
        if let Err(err) = &result {
            warn!(tag, error = %err, "inference failed");
        }
        result
    }

    /// Returns the cached engine for `tag`, or builds one from the registered model.
    pub async fn engine_for(&self, tag: Tag) -> Result<EngineHandle, InferenceError> {
        if let Some(engine) = self.cached(tag) {
            self.metrics.inc_cache_hit();
            return Ok(engine);
        }
        self.metrics.inc_cache_miss();

        let entry = self
            .registry
            .get(tag)
            .map_err(|_| InferenceError::ModelNotFound(tag))?;

        let ticket = {
            let mut slot = self
                .builds
                .entry(tag)
                .or_insert_with(|| Arc::new(BuildTicket::new(entry.clone())));
            if !Arc::ptr_eq(&slot.entry, &entry) {
                // ticket left over from a model that has since been replaced
                *slot = Arc::new(BuildTicket::new(entry.clone()));
            }
            slot.clone()
        };

        let result = ticket
            .result
            .get_or_init(|| self.build_and_install(ticket.entry.clone()))
            .await
            .clone();
        self.builds
            .remove_if(&tag, |_, current| Arc::ptr_eq(current, &ticket));
        result
    }

    /// Drops the engine for `tag`. Called when the model is removed from the registry.
    pub fn evict(&self, tag: Tag) -> bool {
        let removed = self.engines.write().remove(&tag).is_some();
        self.builds.remove(&tag);
        if removed {
            self.metrics.inc_evictions();
            debug!(tag, "evicted inference engine");
        }
        removed
    }

    fn cached(&self, tag: Tag) -> Option<EngineHandle> {
        self.engines
            .read()
            .get(&tag)
            .cloned()
    }

    async fn build_and_install(
        &self,
        entry: Arc<ModelEntry>,
    ) -> Result<EngineHandle, InferenceError> {
        let tag = entry.tag();
        // A build that finished between our miss and taking the ticket already cached it.
        if let Some(engine) = self.cached(tag) {
            return Ok(engine);
        }

        info!(tag, bytes = entry.len(), "building inference engine");
        let start = Instant::now();
        let library = self.library.clone();
        let building = entry.clone();
        let built = tokio::task::spawn_blocking(move || library.build_engine(building.regions()))
            .await
            .map_err(|err| InferenceError::EngineBuildFailed(format!("build task failed: {err}")))
            .and_then(|result| result);

        let engine: EngineHandle = match built {
            Ok(engine) => Arc::from(engine),
            Err(err) => {
                self.metrics.inc_build_failures();
                warn!(tag, error = %err, "failed to build inference engine");
                return Err(err);
            }
        };
        self.metrics.inc_engines_built();

        let mut engines = self.engines.write();
        match self.registry.get(tag) {
            Ok(current) if Arc::ptr_eq(&current, &entry) => {
                engines.insert(tag, engine.clone());
                info!(
                    tag,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "inference engine ready"
                );
            }
            _ => {
                debug!(tag, "model changed during build; engine not cached");
            }
        }
        Ok(engine)
    }
}
