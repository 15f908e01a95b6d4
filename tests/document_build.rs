use std::collections::HashSet;

use semtext::{
    build_document, parse_field, FieldValue, IndexedDocument, NestedIdentity, SemanticTextConfig,
};
use serde_json::{json, Value};

fn sparse_envelope(inference_id: &str, chunks: Value) -> Value {
    json!({
        "inference_id": inference_id,
        "model_settings": { "task_type": "sparse_embedding" },
        "chunks": chunks
    })
}

/// Splits whitespace-separated text into unit-weight sparse features, the
/// shape a sparse inference service would hand back for that chunk.
fn chunk_for(text: &str) -> Value {
    let weights: serde_json::Map<String, Value> = text
        .split_whitespace()
        .map(|token| (token.to_string(), json!(1.0)))
        .collect();
    json!({ "text": text, "embeddings": weights })
}

fn build_field(root_id: &str, field: &str, chunks: &[&str]) -> IndexedDocument {
    let chunks: Vec<Value> = chunks.iter().map(|text| chunk_for(text)).collect();
    let envelope = sparse_envelope("test_model", json!(chunks));
    let parsed = parse_field(field, &envelope).expect("parse");
    build_document(root_id, &parsed, None, &SemanticTextConfig::default()).expect("build")
}

fn sparse_posting_count(doc: &IndexedDocument, child: usize, field: &str) -> usize {
    doc.children[child]
        .fields
        .iter()
        .filter(|indexed| {
            indexed.name == field && matches!(indexed.value, FieldValue::WeightedToken { .. })
        })
        .count()
}

#[test]
fn plain_text_document_has_no_indexable_fields() {
    let parsed = parse_field("field", &json!("some plain value")).expect("parse");
    let doc =
        build_document("doc-1", &parsed, None, &SemanticTextConfig::default()).expect("build");
    assert!(doc.root_fields.is_empty());
    assert!(doc.children.is_empty());
}

#[test]
fn two_fields_with_three_chunks_build_four_records() {
    // Field f1 carries chunks "a b" and "c", field f2 carries "d e f"; the
    // block for the document is three children plus the shared root.
    let f1 = build_field("test", "f1", &["a b", "c"]);
    let f2 = build_field("test", "f2", &["d e f"]);

    let total_records = f1.children.len() + f2.children.len() + 1;
    assert_eq!(total_records, 4);

    for child in f1.children.iter().chain(&f2.children) {
        assert_eq!(child.parent_id, "test");
    }

    assert_eq!(sparse_posting_count(&f1, 0, "f1.chunks.embeddings"), 2);
    assert_eq!(sparse_posting_count(&f1, 1, "f1.chunks.embeddings"), 1);
    assert_eq!(sparse_posting_count(&f2, 0, "f2.chunks.embeddings"), 3);
}

#[test]
fn children_are_addressable_by_nested_identity() {
    let f1 = build_field("test", "f1", &["a b", "c"]);
    let f2 = build_field("test", "f2", &["d e f"]);

    let visited: HashSet<NestedIdentity> = f1
        .children
        .iter()
        .chain(&f2.children)
        .map(|child| child.identity.clone())
        .collect();
    let expected: HashSet<NestedIdentity> = [
        NestedIdentity {
            path: "f1.chunks".to_string(),
            offset: 0,
        },
        NestedIdentity {
            path: "f1.chunks".to_string(),
            offset: 1,
        },
        NestedIdentity {
            path: "f2.chunks".to_string(),
            offset: 0,
        },
    ]
    .into_iter()
    .collect();
    assert_eq!(visited, expected);
}

#[test]
fn children_keep_chunk_insertion_order() {
    let doc = build_field("test", "f1", &["first", "second", "third"]);
    let texts: Vec<&str> = doc
        .children
        .iter()
        .map(|child| {
            child
                .fields
                .iter()
                .find_map(|field| match &field.value {
                    FieldValue::StoredText(text) => Some(text.as_str()),
                    _ => None,
                })
                .expect("stored chunk text")
        })
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
    for (offset, child) in doc.children.iter().enumerate() {
        assert_eq!(child.identity.offset, offset);
    }
}

#[test]
fn stored_text_never_shares_the_embeddings_field() {
    let doc = build_field("test", "f1", &["a b"]);
    for child in &doc.children {
        for field in &child.fields {
            match &field.value {
                FieldValue::StoredText(_) => assert_eq!(field.name, "f1.chunks.text"),
                FieldValue::WeightedToken { .. } => {
                    assert_eq!(field.name, "f1.chunks.embeddings");
                }
                FieldValue::Vector { .. } => panic!("sparse field built a vector record"),
            }
        }
    }
}

#[test]
fn zero_chunk_payload_is_a_valid_empty_block() {
    let envelope = json!({ "inference_id": "test_model", "chunks": [] });
    let parsed = parse_field("f1", &envelope).expect("parse");
    let doc = build_document("test", &parsed, None, &SemanticTextConfig::default()).expect("build");
    assert!(doc.children.is_empty());
    assert!(doc.root_fields.is_empty());
    assert!(doc.updated_settings.is_none());
    assert_eq!(doc.record_count(), 1);
}

#[test]
fn every_chunk_of_a_field_uses_the_same_representation() {
    let doc = build_field("test", "f1", &["a b", "c d e", "f"]);
    for child in &doc.children {
        assert!(child
            .embedding_fields()
            .all(|field| matches!(field.value, FieldValue::WeightedToken { .. })));
    }
}
