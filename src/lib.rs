//! Semantic Text Field Core
//!
//! This is where inference output enters the index. An external inference
//! step turns raw text into chunks paired with embeddings; we take that
//! payload, validate its shape, settle the field's embedding schema, and
//! spit out the nested records an index engine can persist and query.
//!
//! ## What we do here
//!
//! - **Parse the wire envelope** - `inference_id`, `model_settings`, and
//!   `chunks`, with all missing keys batched into one error
//! - **Settle the schema** - model settings are established exactly once
//!   per field and never silently changed; conflicting writes fail with
//!   both sides rendered in the diagnostic
//! - **Build nested records** - one child per chunk, parented to the root
//!   document, sparse postings or a dense vector chosen by the task type
//! - **Scope queries** - term and vector queries confined to a field's
//!   chunk level, with matches re-projected onto parent documents
//! - **Log everything** - structured logs via tracing for debugging
//!   production ingest issues
//!
//! ## Main entry point
//!
//! Call [`process_field`] with a field value, a [`MappingRegistry`], and a
//! [`SemanticTextConfig`], get back an [`IndexedDocument`]. Errors are
//! typed so you can actually handle them.
//!
//! ## Example
//!
//! ```
//! use semtext::{
//!     process_field, MappingRegistry, SemanticTextConfig, SemanticTextMapping,
//! };
//! use serde_json::json;
//!
//! let registry = MappingRegistry::new();
//! registry
//!     .declare(SemanticTextMapping::new("semantic", "test_model"))
//!     .unwrap();
//!
//! let value = json!({
//!     "inference_id": "test_model",
//!     "model_settings": { "task_type": "sparse_embedding" },
//!     "chunks": [ { "text": "a b", "embeddings": { "a": 0.5, "b": 0.25 } } ]
//! });
//!
//! let config = SemanticTextConfig::default();
//! let doc = process_field("doc-1", "semantic", &value, &registry, &config).unwrap();
//!
//! assert_eq!(doc.children.len(), 1);
//! assert!(doc.updated_settings.is_some());
//! ```
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn, Level};

pub mod chunk;
pub mod config;
pub mod document;
pub mod error;
pub mod mapping;
pub mod payload;
pub mod query;
pub mod registry;
pub mod settings;

pub use crate::chunk::{ChunkRecord, Embedding};
pub use crate::config::{ConfigError, SemanticTextConfig};
pub use crate::document::{
    build_document, ChildRecord, FieldValue, IndexableField, IndexedDocument, NestedIdentity,
};
pub use crate::error::SemanticTextError;
pub use crate::mapping::{
    chunk_text_field_name, chunks_field_name, embeddings_field_name, SemanticTextMapping,
    SEMANTIC_TEXT_TYPE,
};
pub use crate::payload::{parse_field, ParsedField, SemanticFieldPayload};
pub use crate::query::{
    child_term_query, child_vector_query, ChunkIndex, ParentHit, QueryClause, ScopedQuery,
    TokenMatch,
};
pub use crate::registry::MappingRegistry;
pub use crate::settings::{settings_repr, ModelSettings, TaskType, VectorSimilarity};

/// Parse, merge, and build one semantic field of one document, persisting a
/// data-discovered schema back to the registry.
///
/// The schema update and the returned document succeed or fail together:
/// when a concurrent writer established conflicting settings first, the
/// conflict is returned and none of this document's records may be
/// persisted.
pub fn process_field(
    root_id: &str,
    field_name: &str,
    value: &Value,
    registry: &MappingRegistry,
    config: &SemanticTextConfig,
) -> Result<IndexedDocument, SemanticTextError> {
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "semtext.process_field",
        root_id = %root_id,
        field = %field_name
    );
    let _guard = span.enter();

    match process_field_inner(root_id, field_name, value, registry, config) {
        Ok(doc) => {
            let elapsed_micros = start.elapsed().as_micros();
            info!(
                children = doc.children.len(),
                dynamic_update = doc.updated_settings.is_some(),
                elapsed_micros,
                "semantic_field_indexed"
            );
            Ok(doc)
        }
        Err(err) => {
            let elapsed_micros = start.elapsed().as_micros();
            warn!(error = %err, elapsed_micros, "semantic_field_rejected");
            Err(err)
        }
    }
}

fn process_field_inner(
    root_id: &str,
    field_name: &str,
    value: &Value,
    registry: &MappingRegistry,
    config: &SemanticTextConfig,
) -> Result<IndexedDocument, SemanticTextError> {
    let mapping = registry.get(field_name).ok_or_else(|| {
        SemanticTextError::Validation(format!(
            "field [{field_name}] is not mapped as [{SEMANTIC_TEXT_TYPE}]"
        ))
    })?;

    let parsed = parse_field(field_name, value)?;
    if let Some(payload) = parsed.payload() {
        if payload.inference_id != mapping.inference_id {
            return Err(SemanticTextError::Validation(format!(
                "field [{field_name}] expects inference results from [{}], got [{}]",
                mapping.inference_id, payload.inference_id
            )));
        }
    }

    let doc = build_document(root_id, &parsed, mapping.model_settings.as_ref(), config)?;
    if let Some(updated) = &doc.updated_settings {
        registry.apply_settings_update(field_name, updated)?;
    }
    Ok(doc)
}
