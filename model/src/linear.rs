// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Categorizer project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Reference inference library: a linear classifier over a byte histogram.
//!
//! Model layout:
//! - label list: newline separated UTF-8 labels, one per class
//! - topology: JSON `{"features": N}`
//! - weights: little-endian `f32`, for each label `N` weights followed by a bias

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, Guess, InferenceLibrary};
use crate::inference::InferenceError;
use crate::registry::ModelRegions;

const MAX_FEATURES: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearTopology {
    pub features: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearLibrary;

impl LinearLibrary {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceLibrary for LinearLibrary {
    fn build_engine(&self, regions: ModelRegions<'_>) -> Result<Box<dyn Engine>, InferenceError> {
        let labels = parse_labels(regions.label_list)?;
        let topology: LinearTopology = serde_json::from_slice(regions.topology)
            .map_err(|err| InferenceError::EngineBuildFailed(format!("invalid topology: {err}")))?;
        if topology.features == 0 || topology.features > MAX_FEATURES {
            return Err(InferenceError::EngineBuildFailed(format!(
                "feature count {} outside 1..={MAX_FEATURES}",
                topology.features
            )));
        }

        let weights = parse_weights(regions.weights)?;
        let row = topology.features + 1;
        if weights.len() != labels.len() * row {
            return Err(InferenceError::EngineBuildFailed(format!(
                "expected {} weights for {} labels, found {}",
                labels.len() * row,
                labels.len(),
                weights.len()
            )));
        }

        Ok(Box::new(LinearEngine {
            labels,
            features: topology.features,
            weights,
        }))
    }
}

pub struct LinearEngine {
    labels: Vec<String>,
    features: usize,
    weights: Vec<f32>,
}

impl LinearEngine {
    fn histogram(&self, photo: &[u8]) -> Vec<f32> {
        let mut buckets = vec![0f32; self.features];
        for &byte in photo {
            let bucket = (byte as usize * self.features) / 256;
            buckets[bucket] += 1.0;
        }
        let total = photo.len() as f32;
        for value in buckets.iter_mut() {
            *value /= total;
        }
        buckets
    }
}

impl Engine for LinearEngine {
    fn query(&self, photo: &[u8]) -> Result<Guess, InferenceError> {
        if photo.is_empty() {
            return Err(InferenceError::InvalidInput("empty photo".to_string()));
        }
        let input = self.histogram(photo);
        let row = self.features + 1;

        let scores: Vec<f32> = self
            .weights
            .chunks_exact(row)
            .map(|weights| {
                let (coefficients, bias) = weights.split_at(self.features);
                coefficients
                    .iter()
                    .zip(&input)
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + bias[0]
            })
            .collect();

        let probabilities = softmax(&scores);
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| InferenceError::InferenceFailed("model has no labels".to_string()))?;

        Ok(Guess::new(self.labels[index].clone(), confidence))
    }
}

fn parse_labels(region: &[u8]) -> Result<Vec<String>, InferenceError> {
    let text = std::str::from_utf8(region)
        .map_err(|err| InferenceError::EngineBuildFailed(format!("label list is not UTF-8: {err}")))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(InferenceError::EngineBuildFailed("label list is empty".to_string()));
    }
    Ok(labels)
}

fn parse_weights(region: &[u8]) -> Result<Vec<f32>, InferenceError> {
    if region.len() % 4 != 0 {
        return Err(InferenceError::EngineBuildFailed(format!(
            "weights region length {} is not a multiple of 4",
            region.len()
        )));
    }
    Ok(region
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Serializes a linear model into its three regions, in payload order.
pub fn encode_linear_model(
    labels: &[&str],
    features: usize,
    weights: &[f32],
) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let label_list = labels.join("\n").into_bytes();
    let topology = format!("{{\"features\":{features}}}").into_bytes();
    let weights = weights.iter().flat_map(|w| w.to_le_bytes()).collect();
    (label_list, topology, weights)
}
