//! Error types produced by the semantic text core.
//!
//! All errors are typed, cloneable, and comparable so callers can handle
//! specific cases, map them onto transport-level responses, and assert on
//! them in tests. The message templates for mapping-facing errors are part
//! of the wire contract and must not be reworded:
//!
//! | Template | Produced by |
//! |----------|-------------|
//! | `field [inference_id] must be specified` | mapping declaration parse |
//! | `Required [<keys>]` | envelope / chunk / settings parse |
//! | `Cannot update parameter [inference_id] from [<old>] to [<new>]` | mapping merge |
//! | `Cannot update parameter [model_settings] from [<old>] to [<new>]` | schema merge |
//! | `Field [<name>] of type [semantic_text] can't be used in multifields` | mapping parse |
//! | `failed to parse field [model_settings]` | nested settings parse |
use thiserror::Error;

/// Errors surfaced by parsing, schema merging, document building, and query
/// construction.
///
/// Every failure is local to a single document or mapping operation and
/// non-retriable at this layer; the ingestion layer above decides whether to
/// retry, report, or drop. Nothing here aborts the process.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SemanticTextError {
    /// A `semantic_text` mapping was declared without its `inference_id`.
    #[error("field [inference_id] must be specified")]
    MissingInferenceId,

    /// One or more mandatory keys were absent from a parsed object.
    ///
    /// Missing keys for a single parse attempt are batched into one error,
    /// joined by `, ` in declared order.
    #[error("Required [{}]", .fields.join(", "))]
    RequiredFields {
        /// The missing keys, in the order the object declares them.
        fields: Vec<String>,
    },

    /// Attempt to change a field's `inference_id` after creation.
    #[error("Cannot update parameter [inference_id] from [{from}] to [{to}]")]
    InferenceIdUpdate { from: String, to: String },

    /// Schema merge disagreement: stored model settings differ from the
    /// incoming ones. Both sides are rendered as
    /// `task_type=<k>[, dimensions=<d>, similarity=<s>]`, or `null` when
    /// absent. Stored state is never mutated by this failure.
    #[error("Cannot update parameter [model_settings] from [{from}] to [{to}]")]
    ModelSettingsUpdate { from: String, to: String },

    /// A `semantic_text` field was declared inside a multi-field group.
    #[error("Field [{field}] of type [semantic_text] can't be used in multifields")]
    MultiField { field: String },

    /// A nested object failed to parse; carries the inner failure as source.
    #[error("failed to parse field [{field}]")]
    FieldParse {
        field: String,
        #[source]
        source: Box<SemanticTextError>,
    },

    /// Malformed or inconsistent single payload: wrong embedding shape for
    /// the declared task type, non-positive dimensions, bad value types.
    #[error("invalid semantic_text field: {0}")]
    Validation(String),
}

impl SemanticTextError {
    /// Wrap this error as a parse failure of the named nested field.
    pub fn for_field(self, field: impl Into<String>) -> Self {
        SemanticTextError::FieldParse {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// True for schema merge disagreements across documents or mappings.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SemanticTextError::ModelSettingsUpdate { .. })
    }

    /// True for malformed or inconsistent single-payload failures.
    pub fn is_validation(&self) -> bool {
        match self {
            SemanticTextError::Validation(_) => true,
            SemanticTextError::FieldParse { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// True when one or more mandatory keys were absent.
    pub fn is_required(&self) -> bool {
        match self {
            SemanticTextError::RequiredFields { .. } | SemanticTextError::MissingInferenceId => {
                true
            }
            SemanticTextError::FieldParse { source, .. } => source.is_required(),
            _ => false,
        }
    }

    /// True for attempts to change an immutable-once-set parameter.
    pub fn is_immutable_update(&self) -> bool {
        matches!(self, SemanticTextError::InferenceIdUpdate { .. })
    }
}
