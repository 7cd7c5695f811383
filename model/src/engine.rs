// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Boundary to the numerical inference library.
//!
//! An [`InferenceLibrary`] turns the raw regions of a model into a query-ready
//! [`Engine`]. Building is expensive and may be slow; querying is cheap and may
//! run concurrently from many requests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tier_types::{Blob, Tag};

use crate::inference::InferenceError;
use crate::registry::ModelRegions;

/// A photo submitted for classification against the model under `tag`.
#[derive(Clone, Debug)]
pub struct Photo {
    pub tag: Tag,
    pub bytes: Blob,
}

impl Photo {
    pub fn new(tag: Tag, bytes: Blob) -> Self {
        Self { tag, bytes }
    }
}

/// Result of one classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Guess {
    pub label: String,
    pub confidence: f32,
}

impl Guess {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn model_not_found() -> Self {
        Self::new(MODEL_NOT_FOUND, 0.0)
    }

    pub fn engine_unavailable() -> Self {
        Self::new(ENGINE_UNAVAILABLE, 0.0)
    }

    pub fn is_model_not_found(&self) -> bool {
        self.label == MODEL_NOT_FOUND
    }
}

pub const MODEL_NOT_FOUND: &str = "Cannot find model for photo tag.";
pub const ENGINE_UNAVAILABLE: &str = "Cannot load model for photo tag.";

pub trait Engine: Send + Sync {
    fn query(&self, photo: &[u8]) -> Result<Guess, InferenceError>;
}

pub trait InferenceLibrary: Send + Sync {
    fn build_engine(&self, regions: ModelRegions<'_>) -> Result<Box<dyn Engine>, InferenceError>;
}

/// A built engine shared between the cache and in-flight queries.
pub type EngineHandle = Arc<dyn Engine>;
