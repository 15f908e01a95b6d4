//! Model settings: the immutable-once-set embedding schema for a field.
//!
//! A field's settings are established exactly once, either declared in the
//! mapping or discovered from the first document carrying inference results,
//! and every later occurrence must be structurally identical. The merge
//! functions here are the single decision point for that rule; callers
//! persist only a successful merge result, never partial field updates.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SemanticTextError;

/// Wire key for the task type inside `model_settings`.
pub const TASK_TYPE_FIELD: &str = "task_type";
/// Wire key for the dense dimension count.
pub const DIMENSIONS_FIELD: &str = "dimensions";
/// Wire key for the dense similarity function.
pub const SIMILARITY_FIELD: &str = "similarity";

/// Kind of embedding an inference service produces for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Bag-of-features (token, weight) sets.
    SparseEmbedding,
    /// Fixed-width float vectors.
    TextEmbedding,
}

impl TaskType {
    /// Parses a wire value. Matching is case-insensitive; inference services
    /// emit both `sparse_embedding` and `SPARSE_EMBEDDING`.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "sparse_embedding" => Some(TaskType::SparseEmbedding),
            "text_embedding" => Some(TaskType::TextEmbedding),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SparseEmbedding => "sparse_embedding",
            TaskType::TextEmbedding => "text_embedding",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Similarity function attached to dense embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSimilarity {
    Cosine,
    DotProduct,
    L2Norm,
}

impl VectorSimilarity {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "cosine" => Some(VectorSimilarity::Cosine),
            "dot_product" => Some(VectorSimilarity::DotProduct),
            "l2_norm" => Some(VectorSimilarity::L2Norm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorSimilarity::Cosine => "cosine",
            VectorSimilarity::DotProduct => "dot_product",
            VectorSimilarity::L2Norm => "l2_norm",
        }
    }
}

impl fmt::Display for VectorSimilarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding schema for one semantic text field.
///
/// Invariant: `dimensions` and `similarity` are present if and only if
/// `task_type` is [`TaskType::TextEmbedding`]. [`ModelSettings::validate`]
/// enforces this; the parsing and merge paths call it before anything is
/// persisted.
///
/// The `Display` form, `task_type=<k>[, dimensions=<d>, similarity=<s>]`, is
/// embedded verbatim in merge conflict diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<VectorSimilarity>,
}

impl ModelSettings {
    /// Settings for a sparse (token, weight) embedding field.
    pub fn sparse() -> Self {
        ModelSettings {
            task_type: TaskType::SparseEmbedding,
            dimensions: None,
            similarity: None,
        }
    }

    /// Settings for a dense fixed-width vector field.
    pub fn dense(dimensions: u32, similarity: VectorSimilarity) -> Self {
        ModelSettings {
            task_type: TaskType::TextEmbedding,
            dimensions: Some(dimensions),
            similarity: Some(similarity),
        }
    }

    /// Checks the sparse/dense structural invariant.
    pub fn validate(&self) -> Result<(), SemanticTextError> {
        match self.task_type {
            TaskType::SparseEmbedding => {
                if self.dimensions.is_some() {
                    return Err(SemanticTextError::Validation(format!(
                        "[{DIMENSIONS_FIELD}] is not allowed for task_type [{}]",
                        self.task_type
                    )));
                }
                if self.similarity.is_some() {
                    return Err(SemanticTextError::Validation(format!(
                        "[{SIMILARITY_FIELD}] is not allowed for task_type [{}]",
                        self.task_type
                    )));
                }
            }
            TaskType::TextEmbedding => {
                match self.dimensions {
                    None => {
                        return Err(SemanticTextError::Validation(format!(
                            "required [{DIMENSIONS_FIELD}] field is missing for task_type [{}]",
                            self.task_type
                        )));
                    }
                    Some(0) => {
                        return Err(SemanticTextError::Validation(format!(
                            "[{DIMENSIONS_FIELD}] must be a positive integer"
                        )));
                    }
                    Some(_) => {}
                }
                if self.similarity.is_none() {
                    return Err(SemanticTextError::Validation(format!(
                        "required [{SIMILARITY_FIELD}] field is missing for task_type [{}]",
                        self.task_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parses the `model_settings` wire object.
    ///
    /// `task_type` is the only mandatory key; its absence is reported as
    /// `Required [task_type]`. The caller wraps failures as a parse failure
    /// of the `model_settings` field.
    pub fn from_value(value: &Value) -> Result<Self, SemanticTextError> {
        let object = value.as_object().ok_or_else(|| {
            SemanticTextError::Validation("model settings must be an object".into())
        })?;

        let task_type = match object.get(TASK_TYPE_FIELD) {
            None => {
                return Err(SemanticTextError::RequiredFields {
                    fields: vec![TASK_TYPE_FIELD.to_string()],
                });
            }
            Some(raw) => {
                let raw = raw.as_str().ok_or_else(|| {
                    SemanticTextError::Validation(format!(
                        "[{TASK_TYPE_FIELD}] must be a string"
                    ))
                })?;
                TaskType::from_wire(raw).ok_or_else(|| {
                    SemanticTextError::Validation(format!(
                        "unknown task_type [{raw}], expected [sparse_embedding] or [text_embedding]"
                    ))
                })?
            }
        };

        let dimensions = match object.get(DIMENSIONS_FIELD) {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_dimensions(raw)?),
        };

        let similarity = match object.get(SIMILARITY_FIELD) {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let raw = raw.as_str().ok_or_else(|| {
                    SemanticTextError::Validation(format!(
                        "[{SIMILARITY_FIELD}] must be a string"
                    ))
                })?;
                Some(VectorSimilarity::from_wire(raw).ok_or_else(|| {
                    SemanticTextError::Validation(format!("unknown similarity [{raw}]"))
                })?)
            }
        };

        let settings = ModelSettings {
            task_type,
            dimensions,
            similarity,
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn parse_dimensions(raw: &Value) -> Result<u32, SemanticTextError> {
    let parsed = raw
        .as_u64()
        .and_then(|dims| u32::try_from(dims).ok())
        .filter(|dims| *dims > 0);
    parsed.ok_or_else(|| {
        SemanticTextError::Validation(format!(
            "[{DIMENSIONS_FIELD}] must be a positive integer, got [{raw}]"
        ))
    })
}

impl fmt::Display for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_type={}", self.task_type)?;
        if let Some(dimensions) = self.dimensions {
            write!(f, ", dimensions={dimensions}")?;
        }
        if let Some(similarity) = self.similarity {
            write!(f, ", similarity={similarity}")?;
        }
        Ok(())
    }
}

/// Renders optional settings for merge diagnostics; absent settings print as
/// `null`.
pub fn settings_repr(settings: Option<&ModelSettings>) -> String {
    match settings {
        Some(settings) => settings.to_string(),
        None => "null".to_string(),
    }
}

/// Merges stored settings with newly-observed ones.
///
/// First write wins: absent stored settings are established by `incoming`.
/// Re-observing structurally identical settings is idempotent. Any
/// difference fails with the fixed conflict template and leaves stored state
/// untouched. `incoming` is validated before the merge so an invalid payload
/// can never establish a schema.
pub fn merge(
    existing: Option<&ModelSettings>,
    incoming: &ModelSettings,
) -> Result<ModelSettings, SemanticTextError> {
    incoming.validate()?;
    match existing {
        None => Ok(incoming.clone()),
        Some(existing) if existing == incoming => Ok(existing.clone()),
        Some(existing) => Err(SemanticTextError::ModelSettingsUpdate {
            from: existing.to_string(),
            to: incoming.to_string(),
        }),
    }
}

/// Mapping-merge variant where the incoming declaration may omit settings.
///
/// Once set, settings cannot be removed: existing-set with incoming-absent
/// conflicts with `to [null]`. Absent on both sides stays absent.
pub fn merge_optional(
    existing: Option<&ModelSettings>,
    incoming: Option<&ModelSettings>,
) -> Result<Option<ModelSettings>, SemanticTextError> {
    match (existing, incoming) {
        (None, None) => Ok(None),
        (existing, Some(incoming)) => merge(existing, incoming).map(Some),
        (Some(existing), None) => Err(SemanticTextError::ModelSettingsUpdate {
            from: existing.to_string(),
            to: "null".to_string(),
        }),
    }
}
