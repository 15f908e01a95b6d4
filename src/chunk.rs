//! Chunk records: one unit of inferred data.
//!
//! A chunk pairs a slice of source text with exactly one embedding. Chunks
//! are constructed while parsing an inference payload, validated against the
//! field's model settings, consumed by the document builder, and never
//! retained afterwards.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SemanticTextError;
use crate::settings::{ModelSettings, TaskType};

/// Embedding produced by the inference step for one chunk.
///
/// The variant is the single source of truth for the storage representation;
/// it must match the field's declared task type at every boundary. Sparse
/// weights live in a `BTreeMap` so posting emission order is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    /// Bag-of-features vector: unique tokens mapped to weights.
    Sparse(BTreeMap<String, f32>),
    /// Fixed-length float vector.
    Dense(Vec<f32>),
}

impl Embedding {
    /// Task type this embedding's shape corresponds to.
    pub fn task_type(&self) -> TaskType {
        match self {
            Embedding::Sparse(_) => TaskType::SparseEmbedding,
            Embedding::Dense(_) => TaskType::TextEmbedding,
        }
    }

    /// Number of (token, weight) pairs or vector components.
    pub fn len(&self) -> usize {
        match self {
            Embedding::Sparse(weights) => weights.len(),
            Embedding::Dense(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One unit of inferred data: source text plus its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// The chunk of source text the embedding was computed from.
    pub text: String,
    /// The embedding, sparse or dense per the field's task type.
    pub embeddings: Embedding,
}

impl ChunkRecord {
    pub fn sparse(text: impl Into<String>, weights: BTreeMap<String, f32>) -> Self {
        ChunkRecord {
            text: text.into(),
            embeddings: Embedding::Sparse(weights),
        }
    }

    pub fn dense(text: impl Into<String>, values: Vec<f32>) -> Self {
        ChunkRecord {
            text: text.into(),
            embeddings: Embedding::Dense(values),
        }
    }

    /// Validates the embedding against the field's settings: the variant
    /// must match the declared task type, and dense vectors must have
    /// exactly the declared number of dimensions.
    pub fn validate_against(&self, settings: &ModelSettings) -> Result<(), SemanticTextError> {
        let actual = self.embeddings.task_type();
        if actual != settings.task_type {
            let shape = |task_type: TaskType| match task_type {
                TaskType::SparseEmbedding => "a map of token weights",
                TaskType::TextEmbedding => "an array of floats",
            };
            return Err(SemanticTextError::Validation(format!(
                "[embeddings] must be {} for task_type [{}], got {}",
                shape(settings.task_type),
                settings.task_type,
                shape(actual)
            )));
        }
        if let (Embedding::Dense(values), Some(dimensions)) =
            (&self.embeddings, settings.dimensions)
        {
            if values.len() != dimensions as usize {
                return Err(SemanticTextError::Validation(format!(
                    "[embeddings] has {} dimensions, the field is mapped with [{dimensions}]",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}
