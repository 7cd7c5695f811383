// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tier_types::{Blob, ErrorCode, PartitionId, Tag};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("tag {0} has been taken")]
    TagAlreadyExists(Tag),
    #[error("tag {0} is not taken")]
    TagNotFound(Tag),
    #[error("model data is {actual} bytes but regions declare {declared}")]
    SizeMismatch { declared: u64, actual: usize },
    #[error("declared region sizes overflow")]
    RegionSizeOverflow,
}

impl ModelError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ModelError::TagAlreadyExists(_) => ErrorCode::TagAlreadyExists,
            ModelError::TagNotFound(_) => ErrorCode::TagNotFound,
            ModelError::SizeMismatch { declared, actual } => {
                if *actual as u64 > *declared {
                    ErrorCode::PayloadOverflow
                } else {
                    ErrorCode::PayloadTruncated
                }
            }
            ModelError::RegionSizeOverflow => ErrorCode::MalformedRequest,
        }
    }
}

/// Lengths of the three regions a model payload is made of, in payload order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSizes {
    pub label_list: u64,
    pub topology: u64,
    pub weights: u64,
}

impl RegionSizes {
    pub fn new(label_list: u64, topology: u64, weights: u64) -> Self {
        Self {
            label_list,
            topology,
            weights,
        }
    }

    /// Sum of the three regions, `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        self.label_list
            .checked_add(self.topology)?
            .checked_add(self.weights)
    }
}

/// Borrowed views of the three regions of one model.
#[derive(Clone, Copy, Debug)]
pub struct ModelRegions<'a> {
    pub label_list: &'a [u8],
    pub topology: &'a [u8],
    pub weights: &'a [u8],
}

/// Raw, unparsed bytes of one installed model. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct ModelEntry {
    tag: Tag,
    sizes: RegionSizes,
    bytes: Blob,
}

impl ModelEntry {
    pub fn new(tag: Tag, sizes: RegionSizes, bytes: Blob) -> Result<Self, ModelError> {
        let declared = sizes.total().ok_or(ModelError::RegionSizeOverflow)?;
        if declared != bytes.len() as u64 {
            return Err(ModelError::SizeMismatch {
                declared,
                actual: bytes.len(),
            });
        }
        Ok(Self { tag, sizes, bytes })
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn sizes(&self) -> RegionSizes {
        self.sizes
    }

    pub fn bytes(&self) -> &Blob {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn regions(&self) -> ModelRegions<'_> {
        // lengths were validated against the blob in `new`
        let labels_end = self.sizes.label_list as usize;
        let topology_end = labels_end + self.sizes.topology as usize;
        let bytes = &self.bytes;
        ModelRegions {
            label_list: bytes.region(0..labels_end).unwrap_or_default(),
            topology: bytes.region(labels_end..topology_end).unwrap_or_default(),
            weights: bytes.region(topology_end..bytes.len()).unwrap_or_default(),
        }
    }
}

/// Authoritative tag -> model mapping held by one replica of a partition.
///
/// Mutated only by ordered delivery; reads take the shared side of the lock.
#[derive(Debug)]
pub struct PartitionRegistry {
    partition: PartitionId,
    models: RwLock<HashMap<Tag, Arc<ModelEntry>>>,
}

impl PartitionRegistry {
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn insert(&self, entry: Arc<ModelEntry>) -> Result<(), ModelError> {
        let mut models = self.models.write();
        if models.contains_key(&entry.tag()) {
            return Err(ModelError::TagAlreadyExists(entry.tag()));
        }
        models.insert(entry.tag(), entry);
        Ok(())
    }

    pub fn remove(&self, tag: Tag) -> Result<Arc<ModelEntry>, ModelError> {
        self.models
            .write()
            .remove(&tag)
            .ok_or(ModelError::TagNotFound(tag))
    }

    pub fn get(&self, tag: Tag) -> Result<Arc<ModelEntry>, ModelError> {
        self.models
            .read()
            .get(&tag)
            .cloned()
            .ok_or(ModelError::TagNotFound(tag))
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.models.read().contains_key(&tag)
    }

    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.models.read().keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.models
            .read()
            .values()
            .map(|entry| entry.len() as u64)
            .sum()
    }
}
