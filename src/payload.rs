//! Parsing of a semantic field's inference payload.
//!
//! This module turns the wire representation of a field value into a
//! [`ParsedField`] suitable for document building, enforcing the envelope's
//! required-key and shape rules along the way.
//!
//! # Responsibilities
//!
//! - **Requirement validation**: batch all missing envelope keys into one
//!   `Required [...]` error per parse attempt
//! - **Settings parsing**: decode and validate `model_settings`, wrapping
//!   failures as `failed to parse field [model_settings]`
//! - **Chunk decoding**: `text` + `embeddings` per chunk, sparse map or
//!   dense array chosen by the declared task type
//! - **Shape validation**: embedding variant and dense dimensionality must
//!   match the payload's own settings
//!
//! # Payload flow
//!
//! ```text
//! raw field value (JSON)
//!        │
//!        ▼
//! ┌──────────────────────────────┐
//! │ 1. Envelope classification   │
//! │    - string/null → inert     │
//! │    - object → inference data │
//! ├──────────────────────────────┤
//! │ 2. Required keys             │
//! │    - inference_id            │
//! │    - model_settings, chunks  │
//! ├──────────────────────────────┤
//! │ 3. Decode + validate         │
//! │    - settings invariants     │
//! │    - chunk shapes vs task    │
//! └──────────────────────────────┘
//!        │
//!        ▼
//! ParsedField
//! ```
//!
//! A field that appears as plain text (or null) is a valid, inert document:
//! it parses to [`ParsedField::Inert`] and produces no indexable content.
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::chunk::{ChunkRecord, Embedding};
use crate::error::SemanticTextError;
use crate::settings::ModelSettings;

/// Wire key for the inference endpoint identifier.
pub const INFERENCE_ID_FIELD: &str = "inference_id";
/// Wire key for the embedding schema object.
pub const MODEL_SETTINGS_FIELD: &str = "model_settings";
/// Wire key for the chunk list.
pub const CHUNKS_FIELD: &str = "chunks";
/// Wire key for a chunk's source text.
pub const CHUNK_TEXT_FIELD: &str = "text";
/// Wire key for a chunk's embedding.
pub const CHUNK_EMBEDDINGS_FIELD: &str = "embeddings";

/// Result of parsing one semantic field value out of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedField {
    /// The field carried no inference envelope: plain text or an absent
    /// value. Valid, but contributes no indexable content.
    Inert { text: Option<String> },
    /// The field carried inference results.
    Inference(SemanticFieldPayload),
}

impl ParsedField {
    /// Convenience accessor for the inference payload, if any.
    pub fn payload(&self) -> Option<&SemanticFieldPayload> {
        match self {
            ParsedField::Inference(payload) => Some(payload),
            ParsedField::Inert { .. } => None,
        }
    }
}

/// A parsed inference envelope for one field of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticFieldPayload {
    /// Name of the semantic field this payload belongs to.
    #[serde(skip)]
    pub field_name: String,
    /// Identifier of the inference endpoint that produced the chunks.
    pub inference_id: String,
    /// Embedding schema declared by the payload. Present whenever `chunks`
    /// is non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_settings: Option<ModelSettings>,
    /// Inferred chunks in insertion order. May be empty.
    pub chunks: Vec<ChunkRecord>,
}

impl SemanticFieldPayload {
    /// Serializes the payload back to its wire envelope. Used by tests and
    /// by callers that replay dynamic-update flows.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parses the raw value of a semantic field.
///
/// Total over well-formed input: plain strings and null values are inert,
/// objects must be complete envelopes. Partially-shaped envelopes (chunks
/// without settings, missing identifiers) are rejected with the batched
/// `Required [...]` diagnostics described in the module docs.
pub fn parse_field(field_name: &str, value: &Value) -> Result<ParsedField, SemanticTextError> {
    let envelope = match value {
        Value::Null => return Ok(ParsedField::Inert { text: None }),
        Value::String(text) => {
            return Ok(ParsedField::Inert {
                text: Some(text.clone()),
            });
        }
        Value::Object(envelope) => envelope,
        other => {
            return Err(SemanticTextError::Validation(format!(
                "field [{field_name}] must be text or an inference envelope, got {}",
                value_kind(other)
            )));
        }
    };

    let inference_id = envelope.get(INFERENCE_ID_FIELD);
    let settings_value = envelope.get(MODEL_SETTINGS_FIELD);
    let chunks_value = envelope.get(CHUNKS_FIELD);
    check_required_keys(inference_id, settings_value, chunks_value)?;

    let inference_id = match inference_id {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::String(_)) => {
            return Err(SemanticTextError::Validation(format!(
                "[{INFERENCE_ID_FIELD}] must not be empty"
            )));
        }
        _ => {
            return Err(SemanticTextError::Validation(format!(
                "[{INFERENCE_ID_FIELD}] must be a string"
            )));
        }
    };

    let model_settings = settings_value
        .map(|value| ModelSettings::from_value(value).map_err(|err| err.for_field(MODEL_SETTINGS_FIELD)))
        .transpose()?;

    let chunks = parse_chunks(chunks_value, model_settings.as_ref())?;

    Ok(ParsedField::Inference(SemanticFieldPayload {
        field_name: field_name.to_string(),
        inference_id,
        model_settings,
        chunks,
    }))
}

/// Batches missing envelope keys into one error, in declared order:
/// `inference_id`, `model_settings`, `chunks`. `model_settings` is only
/// mandatory when the chunk list is non-empty (or wholly absent, in which
/// case both keys are reported together).
fn check_required_keys(
    inference_id: Option<&Value>,
    settings: Option<&Value>,
    chunks: Option<&Value>,
) -> Result<(), SemanticTextError> {
    let mut fields = Vec::new();
    if inference_id.is_none() {
        fields.push(INFERENCE_ID_FIELD.to_string());
    }
    let chunks_known_empty = matches!(chunks, Some(Value::Array(items)) if items.is_empty());
    if settings.is_none() && !chunks_known_empty {
        fields.push(MODEL_SETTINGS_FIELD.to_string());
    }
    if chunks.is_none() {
        fields.push(CHUNKS_FIELD.to_string());
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(SemanticTextError::RequiredFields { fields })
    }
}

fn parse_chunks(
    chunks_value: Option<&Value>,
    settings: Option<&ModelSettings>,
) -> Result<Vec<ChunkRecord>, SemanticTextError> {
    let items = match chunks_value {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(SemanticTextError::Validation(format!(
                "[{CHUNKS_FIELD}] must be an array of objects, got {}",
                value_kind(other)
            )));
        }
        // Unreachable after check_required_keys; kept total anyway.
        None => return Ok(Vec::new()),
    };

    let mut chunks = Vec::with_capacity(items.len());
    for item in items {
        let chunk = parse_chunk(item)?;
        if let Some(settings) = settings {
            chunk.validate_against(settings)?;
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn parse_chunk(value: &Value) -> Result<ChunkRecord, SemanticTextError> {
    let object = value.as_object().ok_or_else(|| {
        SemanticTextError::Validation(format!(
            "each [{CHUNKS_FIELD}] entry must be an object, got {}",
            value_kind(value)
        ))
    })?;

    let text_value = object.get(CHUNK_TEXT_FIELD);
    let embeddings_value = object.get(CHUNK_EMBEDDINGS_FIELD);
    let mut fields = Vec::new();
    if text_value.is_none() {
        fields.push(CHUNK_TEXT_FIELD.to_string());
    }
    if embeddings_value.is_none() {
        fields.push(CHUNK_EMBEDDINGS_FIELD.to_string());
    }
    if !fields.is_empty() {
        return Err(SemanticTextError::RequiredFields { fields });
    }

    let text = text_value.and_then(Value::as_str).ok_or_else(|| {
        SemanticTextError::Validation(format!("[{CHUNK_TEXT_FIELD}] must be a string"))
    })?;

    let embeddings = match embeddings_value {
        Some(Value::Object(weights)) => Embedding::Sparse(parse_sparse_weights(weights)?),
        Some(Value::Array(values)) => Embedding::Dense(parse_dense_values(values)?),
        other => {
            return Err(SemanticTextError::Validation(format!(
                "[{CHUNK_EMBEDDINGS_FIELD}] must be a map of token weights or an array \
                 of floats, got {}",
                other.map_or("nothing", value_kind)
            )));
        }
    };

    Ok(ChunkRecord {
        text: text.to_string(),
        embeddings,
    })
}

fn parse_sparse_weights(
    weights: &serde_json::Map<String, Value>,
) -> Result<BTreeMap<String, f32>, SemanticTextError> {
    let mut parsed = BTreeMap::new();
    for (token, weight) in weights {
        let weight = weight.as_f64().ok_or_else(|| {
            SemanticTextError::Validation(format!(
                "weight for token [{token}] must be a number, got {}",
                value_kind(weight)
            ))
        })?;
        parsed.insert(token.clone(), weight as f32);
    }
    Ok(parsed)
}

fn parse_dense_values(values: &[Value]) -> Result<Vec<f32>, SemanticTextError> {
    values
        .iter()
        .map(|value| {
            value.as_f64().map(|v| v as f32).ok_or_else(|| {
                SemanticTextError::Validation(format!(
                    "dense embedding values must be numbers, got {}",
                    value_kind(value)
                ))
            })
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
