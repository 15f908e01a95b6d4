//! Nested document building: one child record per inferred chunk.
//!
//! The builder turns a parsed payload into index-facing records. Children
//! are addressed by `(parent_id, path, offset)` rather than live back
//! references, so they can be serialized independently of the parent. The
//! block layout convention is children in chunk insertion order followed by
//! the parent; an external reader can verify linkage from the identities
//! alone.
use serde::Serialize;

use crate::chunk::Embedding;
use crate::config::SemanticTextConfig;
use crate::error::SemanticTextError;
use crate::mapping::{chunk_text_field_name, chunks_field_name, embeddings_field_name};
use crate::payload::{ParsedField, MODEL_SETTINGS_FIELD};
use crate::settings::{self, ModelSettings, TaskType, VectorSimilarity};

/// Value of one index-facing field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// One weighted-term posting, usable for scored term matching. Every
    /// posting of a chunk shares the field's embeddings field name.
    WeightedToken { token: String, weight: f32 },
    /// A fixed-width vector record for nearest-neighbor search, with the
    /// similarity function fixed by the field's model settings.
    Vector {
        values: Vec<f32>,
        similarity: VectorSimilarity,
    },
    /// Stored-only text: kept for retrieval by the source layer, never
    /// searchable, no column-store entry.
    StoredText(String),
}

/// An abstract indexable field handed to the index engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexableField {
    pub name: String,
    pub value: FieldValue,
}

/// Structural address of a child record beneath its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NestedIdentity {
    /// The nested level the child belongs to, e.g. `field.chunks`.
    pub path: String,
    /// Zero-based chunk position within the parent's payload.
    pub offset: usize,
}

/// One indexable child record, parented to a root document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildRecord {
    pub parent_id: String,
    pub identity: NestedIdentity,
    pub fields: Vec<IndexableField>,
}

impl ChildRecord {
    /// The embedding postings/vector of this child, if any.
    pub fn embedding_fields(&self) -> impl Iterator<Item = &IndexableField> {
        self.fields
            .iter()
            .filter(|field| !matches!(field.value, FieldValue::StoredText(_)))
    }
}

/// Everything the index engine needs to persist for one field of one
/// document, plus the schema update to apply alongside the write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDocument {
    pub root_id: String,
    /// Fields on the root document itself. Always empty for this field
    /// type: all content lives in the children.
    pub root_fields: Vec<IndexableField>,
    /// Child records in chunk insertion order. The on-disk convention puts
    /// these before the parent (block adjacency).
    pub children: Vec<ChildRecord>,
    /// Set when this document established the field's schema from data;
    /// the caller persists it transactionally with the document write.
    pub updated_settings: Option<ModelSettings>,
}

impl IndexedDocument {
    fn inert(root_id: &str) -> Self {
        IndexedDocument {
            root_id: root_id.to_string(),
            root_fields: Vec::new(),
            children: Vec::new(),
            updated_settings: None,
        }
    }

    /// Total records in the block: children plus the root.
    pub fn record_count(&self) -> usize {
        self.children.len() + 1
    }
}

/// Builds the indexable records for one semantic field of one document.
///
/// Merges the stored settings with the payload's (when chunks are present),
/// propagating conflict and validation errors unchanged; on any failure no
/// records are produced (all-or-nothing per document). Inert fields and
/// zero-chunk payloads build an empty block: no root fields, no children.
pub fn build_document(
    root_id: &str,
    parsed: &ParsedField,
    stored_settings: Option<&ModelSettings>,
    config: &SemanticTextConfig,
) -> Result<IndexedDocument, SemanticTextError> {
    let payload = match parsed {
        ParsedField::Inert { .. } => return Ok(IndexedDocument::inert(root_id)),
        ParsedField::Inference(payload) => payload,
    };
    if payload.chunks.is_empty() {
        return Ok(IndexedDocument::inert(root_id));
    }

    // The parser enforces this; kept total for payloads built by hand.
    let payload_settings =
        payload
            .model_settings
            .as_ref()
            .ok_or_else(|| SemanticTextError::RequiredFields {
                fields: vec![MODEL_SETTINGS_FIELD.to_string()],
            })?;

    let merged = settings::merge(stored_settings, payload_settings)?;
    let updated_settings = match stored_settings {
        Some(_) => None,
        None if config.settings_from_data => Some(merged.clone()),
        None => {
            return Err(SemanticTextError::Validation(format!(
                "field [{}] has no declared model settings and establishing them \
                 from data is disabled",
                payload.field_name
            )));
        }
    };

    if let Some(max_chunks) = config.max_chunks {
        if payload.chunks.len() > max_chunks {
            return Err(SemanticTextError::Validation(format!(
                "field [{}] has {} chunks, the limit is [{max_chunks}]",
                payload.field_name,
                payload.chunks.len()
            )));
        }
    }
    if let (TaskType::TextEmbedding, Some(dimensions)) = (merged.task_type, merged.dimensions) {
        if dimensions > config.max_dimensions {
            return Err(SemanticTextError::Validation(format!(
                "field [{}] declares [{dimensions}] dimensions, the limit is [{}]",
                payload.field_name, config.max_dimensions
            )));
        }
    }

    let chunks_path = chunks_field_name(&payload.field_name);
    let text_field = chunk_text_field_name(&payload.field_name);
    let embeddings_field = embeddings_field_name(&payload.field_name);

    let mut children = Vec::with_capacity(payload.chunks.len());
    for (offset, chunk) in payload.chunks.iter().enumerate() {
        chunk.validate_against(&merged)?;

        let mut fields = Vec::new();
        fields.push(IndexableField {
            name: text_field.clone(),
            value: FieldValue::StoredText(chunk.text.clone()),
        });
        match &chunk.embeddings {
            Embedding::Sparse(weights) => {
                for (token, weight) in weights {
                    fields.push(IndexableField {
                        name: embeddings_field.clone(),
                        value: FieldValue::WeightedToken {
                            token: token.clone(),
                            weight: *weight,
                        },
                    });
                }
            }
            Embedding::Dense(values) => {
                let similarity = merged
                    .similarity
                    .unwrap_or(VectorSimilarity::Cosine);
                fields.push(IndexableField {
                    name: embeddings_field.clone(),
                    value: FieldValue::Vector {
                        values: values.clone(),
                        similarity,
                    },
                });
            }
        }

        children.push(ChildRecord {
            parent_id: root_id.to_string(),
            identity: NestedIdentity {
                path: chunks_path.clone(),
                offset,
            },
            fields,
        });
    }

    Ok(IndexedDocument {
        root_id: root_id.to_string(),
        root_fields: Vec::new(),
        children,
        updated_settings,
    })
}
