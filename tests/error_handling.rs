use semtext::settings::merge;
use semtext::{
    build_document, parse_field, ModelSettings, SemanticTextConfig, SemanticTextError,
    VectorSimilarity,
};
use serde_json::json;

#[test]
fn missing_inference_id_lists_exactly_that_key() {
    let envelope = json!({
        "model_settings": { "task_type": "sparse_embedding" },
        "chunks": []
    });
    let err = parse_field("field", &envelope).expect_err("missing inference_id");
    assert_eq!(err.to_string(), "Required [inference_id]");
    assert!(err.is_required());
}

#[test]
fn missing_model_settings_and_chunks_batch_together() {
    let envelope = json!({ "inference_id": "my_id" });
    let err = parse_field("field", &envelope).expect_err("incomplete envelope");
    assert_eq!(err.to_string(), "Required [model_settings, chunks]");
}

#[test]
fn missing_task_type_reports_a_settings_parse_failure() {
    let envelope = json!({
        "inference_id": "my_id",
        "model_settings": {},
        "chunks": []
    });
    let err = parse_field("field", &envelope).expect_err("empty settings");
    assert_eq!(err.to_string(), "failed to parse field [model_settings]");
}

#[test]
fn settings_conflict_carries_both_representations_verbatim() {
    let stored = ModelSettings::sparse();
    let incoming = ModelSettings::dense(10, VectorSimilarity::Cosine);
    let err = merge(Some(&stored), &incoming).expect_err("schema change");
    assert_eq!(
        err.to_string(),
        "Cannot update parameter [model_settings] from [task_type=sparse_embedding] \
         to [task_type=text_embedding, dimensions=10, similarity=cosine]"
    );
}

#[test]
fn embedding_shape_mismatch_is_a_validation_error() {
    // Sparse settings with a dense array payload.
    let envelope = json!({
        "inference_id": "my_id",
        "model_settings": { "task_type": "sparse_embedding" },
        "chunks": [ { "text": "a", "embeddings": [0.1, 0.2] } ]
    });
    let err = parse_field("field", &envelope).expect_err("dense under sparse");
    assert!(err.is_validation());

    // Dense settings with a sparse map payload.
    let envelope = json!({
        "inference_id": "my_id",
        "model_settings": {
            "task_type": "text_embedding",
            "dimensions": 2,
            "similarity": "cosine"
        },
        "chunks": [ { "text": "a", "embeddings": { "a": 1.0 } } ]
    });
    let err = parse_field("field", &envelope).expect_err("sparse under dense");
    assert!(err.is_validation());
}

#[test]
fn failed_documents_produce_no_partial_records() {
    let envelope = json!({
        "inference_id": "my_id",
        "model_settings": { "task_type": "sparse_embedding" },
        "chunks": [
            { "text": "good", "embeddings": { "good": 1.0 } },
            { "text": "bad", "embeddings": [0.1, 0.2] }
        ]
    });
    // The second chunk is malformed; the whole document is rejected rather
    // than indexing the first chunk alone.
    let result = parse_field("field", &envelope);
    assert!(result.is_err());
}

#[test]
fn conflicting_document_builds_no_children() {
    let envelope = json!({
        "inference_id": "my_id",
        "model_settings": { "task_type": "sparse_embedding" },
        "chunks": [ { "text": "a", "embeddings": { "a": 1.0 } } ]
    });
    let parsed = parse_field("field", &envelope).expect("parse");
    let stored = ModelSettings::dense(4, VectorSimilarity::L2Norm);
    let err = build_document("doc", &parsed, Some(&stored), &SemanticTextConfig::default())
        .expect_err("conflict");
    assert!(err.is_conflict());
}

#[test]
fn every_failure_is_a_typed_error() {
    let cases = [
        json!({ "inference_id": "my_id" }),
        json!({ "inference_id": "", "model_settings": { "task_type": "sparse_embedding" }, "chunks": [] }),
        json!({ "inference_id": "my_id", "model_settings": { "task_type": "bogus" }, "chunks": [] }),
        json!({ "inference_id": "my_id", "model_settings": { "task_type": "sparse_embedding" }, "chunks": "nope" }),
        json!(17),
    ];
    for case in cases {
        let err = parse_field("field", &case).expect_err("malformed payload");
        let categorized = err.is_required() || err.is_validation() || err.is_conflict();
        assert!(categorized, "uncategorized error {err:?} for {case}");
    }
}

#[test]
fn sparse_settings_with_dense_parameters_are_invalid() {
    let envelope = json!({
        "inference_id": "my_id",
        "model_settings": {
            "task_type": "sparse_embedding",
            "dimensions": 10,
            "similarity": "cosine"
        },
        "chunks": []
    });
    let err = parse_field("field", &envelope).expect_err("sparse with dims");
    assert!(matches!(err, SemanticTextError::FieldParse { .. }));
    assert!(err.is_validation());
}
