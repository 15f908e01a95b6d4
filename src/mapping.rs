//! The persistent field definition for a `semantic_text` field.
//!
//! A mapping declaration pins the field's `inference_id` at creation time
//! and optionally its model settings. Updates are one-directional merges:
//! `inference_id` is immutable, settings follow the schema-merge rules in
//! [`crate::settings`]. The chunk substructure names derived here are the
//! nesting convention shared by the document builder and query support.
use serde_json::Value;

use crate::error::SemanticTextError;
use crate::settings::{self, ModelSettings};

/// Declared mapping type of this field.
pub const SEMANTIC_TEXT_TYPE: &str = "semantic_text";
/// Mapping key carrying the field type.
pub const TYPE_FIELD: &str = "type";
/// Mapping key for a multi-field group.
pub const MULTI_FIELDS_FIELD: &str = "fields";

/// Name of the nested chunk level under `field_name`.
pub fn chunks_field_name(field_name: &str) -> String {
    format!("{field_name}.chunks")
}

/// Name of the embeddings field shared by every chunk of `field_name`.
pub fn embeddings_field_name(field_name: &str) -> String {
    format!("{field_name}.chunks.embeddings")
}

/// Name of the stored-only chunk text field of `field_name`.
pub fn chunk_text_field_name(field_name: &str) -> String {
    format!("{field_name}.chunks.text")
}

/// Persistent, mergeable definition of one semantic text field.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticTextMapping {
    /// Full name of the field.
    pub field_name: String,
    /// Inference endpoint identifier. Immutable once set.
    pub inference_id: String,
    /// Embedding schema. Absent until declared or discovered from data;
    /// merges per the schema-merge rules afterwards.
    pub model_settings: Option<ModelSettings>,
}

impl SemanticTextMapping {
    pub fn new(field_name: impl Into<String>, inference_id: impl Into<String>) -> Self {
        SemanticTextMapping {
            field_name: field_name.into(),
            inference_id: inference_id.into(),
            model_settings: None,
        }
    }

    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = Some(settings);
        self
    }

    /// Parses a mapping declaration of the shape
    /// `{ "type": "semantic_text", "inference_id": "...", "model_settings": {...} }`.
    ///
    /// `inference_id` is mandatory at declaration time. A declaration that
    /// carries its own multi-field group is rejected; `semantic_text`
    /// cannot participate in multi-fields in either direction.
    pub fn parse(field_name: &str, declaration: &Value) -> Result<Self, SemanticTextError> {
        let object = declaration.as_object().ok_or_else(|| {
            SemanticTextError::Validation(format!(
                "mapping for field [{field_name}] must be an object"
            ))
        })?;

        if let Some(declared_type) = object.get(TYPE_FIELD).and_then(Value::as_str) {
            if declared_type != SEMANTIC_TEXT_TYPE {
                return Err(SemanticTextError::Validation(format!(
                    "mapping for field [{field_name}] declares type [{declared_type}], \
                     expected [{SEMANTIC_TEXT_TYPE}]"
                )));
            }
        }

        if object.contains_key(MULTI_FIELDS_FIELD) {
            return Err(SemanticTextError::MultiField {
                field: field_name.to_string(),
            });
        }

        let inference_id = object
            .get(crate::payload::INFERENCE_ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(SemanticTextError::MissingInferenceId)?;

        let model_settings = object
            .get(crate::payload::MODEL_SETTINGS_FIELD)
            .map(|value| {
                ModelSettings::from_value(value)
                    .map_err(|err| err.for_field(crate::payload::MODEL_SETTINGS_FIELD))
            })
            .transpose()?;

        Ok(SemanticTextMapping {
            field_name: field_name.to_string(),
            inference_id: inference_id.to_string(),
            model_settings,
        })
    }

    /// Rejects `semantic_text` declarations nested inside another field's
    /// multi-field group. `mapping` is the enclosing field's declaration.
    pub fn check_multi_fields(mapping: &Value) -> Result<(), SemanticTextError> {
        let Some(sub_fields) = mapping.get(MULTI_FIELDS_FIELD).and_then(Value::as_object) else {
            return Ok(());
        };
        for (sub_name, sub_mapping) in sub_fields {
            let sub_type = sub_mapping.get(TYPE_FIELD).and_then(Value::as_str);
            if sub_type == Some(SEMANTIC_TEXT_TYPE) {
                return Err(SemanticTextError::MultiField {
                    field: sub_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Merges an updated declaration into this one.
    ///
    /// `inference_id` changes are rejected with the fixed update template.
    /// Settings merge one-directionally: establish once, identical
    /// re-declarations are idempotent, removal or change conflicts. On any
    /// failure `self` is untouched; callers persist only the returned value.
    pub fn merge(&self, incoming: &SemanticTextMapping) -> Result<Self, SemanticTextError> {
        if self.inference_id != incoming.inference_id {
            return Err(SemanticTextError::InferenceIdUpdate {
                from: self.inference_id.clone(),
                to: incoming.inference_id.clone(),
            });
        }
        let model_settings = settings::merge_optional(
            self.model_settings.as_ref(),
            incoming.model_settings.as_ref(),
        )?;
        Ok(SemanticTextMapping {
            field_name: self.field_name.clone(),
            inference_id: self.inference_id.clone(),
            model_settings,
        })
    }

    /// Serializes the declaration back to its mapping shape.
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert(
            TYPE_FIELD.to_string(),
            Value::String(SEMANTIC_TEXT_TYPE.to_string()),
        );
        object.insert(
            crate::payload::INFERENCE_ID_FIELD.to_string(),
            Value::String(self.inference_id.clone()),
        );
        if let Some(settings) = &self.model_settings {
            object.insert(
                crate::payload::MODEL_SETTINGS_FIELD.to_string(),
                serde_json::to_value(settings).unwrap_or(Value::Null),
            );
        }
        Value::Object(object)
    }
}
