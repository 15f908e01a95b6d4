//! Structurally-scoped queries over a field's chunk records.
//!
//! Queries built here are confined to the chunk nesting level of one field
//! via a structural filter, and child matches are re-projected onto their
//! parent document before results leave this module. [`ChunkIndex`] is the
//! in-memory executor used by tests and embedding callers; a production
//! index engine consumes the [`ScopedQuery`] description instead.
use std::cmp::Ordering;

use hashbrown::HashSet;

use crate::document::{ChildRecord, FieldValue, IndexedDocument};
use crate::error::SemanticTextError;
use crate::mapping::{chunks_field_name, embeddings_field_name, SemanticTextMapping};
use crate::settings::{TaskType, VectorSimilarity};

/// How term clauses combine across the supplied tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenMatch {
    /// Conjunctive: every token must be present in the same chunk.
    #[default]
    All,
    /// Disjunctive: any matching token qualifies the chunk.
    Any,
}

/// Content clause of a scoped query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryClause {
    /// Weighted-term matching against a sparse embeddings field.
    Terms {
        field: String,
        tokens: Vec<String>,
        token_match: TokenMatch,
    },
    /// Similarity search against a dense embeddings field.
    Vector {
        field: String,
        vector: Vec<f32>,
        similarity: VectorSimilarity,
    },
}

/// A query scoped to the chunk records of one field.
///
/// `nested_path` is the structural filter: only children addressed at that
/// nesting level are considered, independent of field content.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery {
    pub nested_path: String,
    pub clause: QueryClause,
}

impl ScopedQuery {
    /// Switches a term query to disjunctive token matching.
    pub fn match_any(mut self) -> Self {
        if let QueryClause::Terms { token_match, .. } = &mut self.clause {
            *token_match = TokenMatch::Any;
        }
        self
    }
}

/// Builds a term query over the chunks of `mapping`'s field.
///
/// Tokens combine conjunctively by default; use [`ScopedQuery::match_any`]
/// for disjunctive matching. Chunks without a sparse embedding never match.
pub fn child_term_query(
    mapping: &SemanticTextMapping,
    tokens: impl IntoIterator<Item = impl Into<String>>,
) -> ScopedQuery {
    ScopedQuery {
        nested_path: chunks_field_name(&mapping.field_name),
        clause: QueryClause::Terms {
            field: embeddings_field_name(&mapping.field_name),
            tokens: tokens.into_iter().map(Into::into).collect(),
            token_match: TokenMatch::All,
        },
    }
}

/// Builds a vector query over the chunks of `mapping`'s field.
///
/// Fails fast when the field has no declared settings, is not a dense
/// field, or the query vector's dimensionality differs from the mapping.
/// A mismatched query is an error, never a silent zero-result search.
pub fn child_vector_query(
    mapping: &SemanticTextMapping,
    vector: Vec<f32>,
) -> Result<ScopedQuery, SemanticTextError> {
    let field_name = &mapping.field_name;
    let settings = mapping.model_settings.as_ref().ok_or_else(|| {
        SemanticTextError::Validation(format!(
            "cannot build a vector query for field [{field_name}]: model settings \
             are not declared"
        ))
    })?;
    if settings.task_type != TaskType::TextEmbedding {
        return Err(SemanticTextError::Validation(format!(
            "field [{field_name}] has task_type [{}], vector queries require \
             task_type [text_embedding]",
            settings.task_type
        )));
    }
    let dimensions = settings.dimensions.unwrap_or_default() as usize;
    if vector.len() != dimensions {
        return Err(SemanticTextError::Validation(format!(
            "query vector has {} dimensions, field [{field_name}] is mapped \
             with [{dimensions}]",
            vector.len()
        )));
    }
    let similarity = settings.similarity.unwrap_or(VectorSimilarity::Cosine);
    Ok(ScopedQuery {
        nested_path: chunks_field_name(field_name),
        clause: QueryClause::Vector {
            field: embeddings_field_name(field_name),
            vector,
            similarity,
        },
    })
}

/// A child-level match re-projected onto its parent document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentHit {
    pub root_id: String,
    pub score: f32,
}

/// In-memory executor over built documents.
#[derive(Debug, Default)]
pub struct ChunkIndex {
    docs: Vec<IndexedDocument>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        ChunkIndex::default()
    }

    pub fn insert(&mut self, doc: IndexedDocument) {
        self.docs.push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Runs a scoped query and returns parent hits, best first.
    ///
    /// Child scores within one parent sum into the parent's score. Ordering
    /// is deterministic: score descending, ties broken by root id. An empty
    /// result is a valid outcome, not an error.
    pub fn search(&self, query: &ScopedQuery, top_k: usize) -> Vec<ParentHit> {
        if top_k == 0 {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for doc in &self.docs {
            let mut total = 0.0_f32;
            let mut matched = false;
            for child in &doc.children {
                if child.identity.path != query.nested_path {
                    continue;
                }
                if let Some(score) = score_child(child, &query.clause) {
                    total += score;
                    matched = true;
                }
            }
            if matched {
                hits.push(ParentHit {
                    root_id: doc.root_id.clone(),
                    score: total,
                });
            }
        }

        hits.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.root_id.cmp(&b.root_id))
        });
        hits.truncate(top_k);
        hits
    }
}

fn score_child(child: &ChildRecord, clause: &QueryClause) -> Option<f32> {
    match clause {
        QueryClause::Terms {
            field,
            tokens,
            token_match,
        } => {
            if tokens.is_empty() {
                return None;
            }
            // Duplicate query tokens count once.
            let wanted: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            let mut score = 0.0_f32;
            let mut matched = 0_usize;
            for indexed in &child.fields {
                if indexed.name != *field {
                    continue;
                }
                if let FieldValue::WeightedToken { token, weight } = &indexed.value {
                    if wanted.contains(token.as_str()) {
                        score += weight;
                        matched += 1;
                    }
                }
            }
            let qualifies = match token_match {
                TokenMatch::All => matched == wanted.len(),
                TokenMatch::Any => matched > 0,
            };
            qualifies.then_some(score)
        }
        QueryClause::Vector {
            field,
            vector,
            similarity,
        } => child.fields.iter().find_map(|indexed| {
            if indexed.name != *field {
                return None;
            }
            let FieldValue::Vector { values, .. } = &indexed.value else {
                return None;
            };
            if values.len() != vector.len() {
                return None;
            }
            Some(similarity_score(*similarity, vector, values))
        }),
    }
}

fn similarity_score(similarity: VectorSimilarity, query: &[f32], candidate: &[f32]) -> f32 {
    match similarity {
        // Shifted into [0, 1] so parent sums stay monotone.
        VectorSimilarity::Cosine => (1.0 + cosine_similarity(query, candidate)) / 2.0,
        VectorSimilarity::DotProduct => dot(query, candidate),
        VectorSimilarity::L2Norm => {
            let squared: f32 = query
                .iter()
                .zip(candidate)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            1.0 / (1.0 + squared)
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}
