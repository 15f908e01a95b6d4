//! Minimal in-process schema registry.
//!
//! Production deployments own the field registry (it lives wherever the
//! index metadata lives); this one exists so the merge-and-persist
//! discipline is exercisable end to end. All writes go through the write
//! lock and apply only full merge results: two first writers racing to
//! establish a field's schema cannot both succeed with different values,
//! and a failed merge leaves stored state untouched.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::SemanticTextError;
use crate::mapping::SemanticTextMapping;
use crate::settings::{self, ModelSettings};

/// Registry of semantic text field mappings, keyed by field name.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    inner: RwLock<HashMap<String, SemanticTextMapping>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        MappingRegistry::default()
    }

    /// Declares or updates a field mapping.
    ///
    /// First declaration stores the mapping as-is; later declarations are
    /// merged one-directionally (immutable `inference_id`, append-only
    /// settings). Returns the stored mapping after the merge.
    pub fn declare(
        &self,
        mapping: SemanticTextMapping,
    ) -> Result<SemanticTextMapping, SemanticTextError> {
        let mut fields = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let merged = match fields.get(&mapping.field_name) {
            None => mapping,
            Some(existing) => existing.merge(&mapping)?,
        };
        fields.insert(merged.field_name.clone(), merged.clone());
        Ok(merged)
    }

    /// Applies a schema update discovered from document data.
    ///
    /// Re-merges against the currently stored settings under the write lock
    /// (compare-and-set): a concurrent writer that established different
    /// settings in the meantime turns this into a conflict, and the caller
    /// must drop the document it built.
    pub fn apply_settings_update(
        &self,
        field_name: &str,
        update: &ModelSettings,
    ) -> Result<(), SemanticTextError> {
        let mut fields = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mapping = fields.get_mut(field_name).ok_or_else(|| {
            SemanticTextError::Validation(format!(
                "field [{field_name}] is not mapped as [semantic_text]"
            ))
        })?;
        let merged = settings::merge(mapping.model_settings.as_ref(), update)?;
        mapping.model_settings = Some(merged);
        Ok(())
    }

    /// Current mapping for `field_name`, if declared.
    pub fn get(&self, field_name: &str) -> Option<SemanticTextMapping> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field_name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::VectorSimilarity;

    #[test]
    fn declare_then_get_round_trips() {
        let registry = MappingRegistry::new();
        let mapping = SemanticTextMapping::new("field", "test_model");
        registry.declare(mapping.clone()).expect("declare");
        assert_eq!(registry.get("field"), Some(mapping));
        assert_eq!(registry.get("other"), None);
    }

    #[test]
    fn redeclaring_with_another_inference_id_fails_and_keeps_state() {
        let registry = MappingRegistry::new();
        registry
            .declare(SemanticTextMapping::new("field", "test_model"))
            .expect("declare");
        let err = registry
            .declare(SemanticTextMapping::new("field", "another_model"))
            .expect_err("immutable inference_id");
        assert!(err.is_immutable_update());
        assert_eq!(
            registry.get("field").map(|mapping| mapping.inference_id),
            Some("test_model".to_string())
        );
    }

    #[test]
    fn settings_update_establishes_then_conflicts() {
        let registry = MappingRegistry::new();
        registry
            .declare(SemanticTextMapping::new("field", "test_model"))
            .expect("declare");

        registry
            .apply_settings_update("field", &ModelSettings::sparse())
            .expect("first update");
        // Identical update is idempotent.
        registry
            .apply_settings_update("field", &ModelSettings::sparse())
            .expect("idempotent update");

        let err = registry
            .apply_settings_update("field", &ModelSettings::dense(8, VectorSimilarity::Cosine))
            .expect_err("conflicting update");
        assert!(err.is_conflict());
        assert_eq!(
            registry
                .get("field")
                .and_then(|mapping| mapping.model_settings),
            Some(ModelSettings::sparse())
        );
    }

    #[test]
    fn update_for_unknown_field_is_rejected() {
        let registry = MappingRegistry::new();
        let err = registry
            .apply_settings_update("ghost", &ModelSettings::sparse())
            .expect_err("unknown field");
        assert!(err.is_validation());
    }

    #[test]
    fn concurrent_first_writers_cannot_both_establish() {
        let registry = MappingRegistry::new();
        registry
            .declare(SemanticTextMapping::new("field", "test_model"))
            .expect("declare");

        let sparse = ModelSettings::sparse();
        let dense = ModelSettings::dense(16, VectorSimilarity::DotProduct);
        let (sparse_result, dense_result) = std::thread::scope(|scope| {
            let sparse_writer =
                scope.spawn(|| registry.apply_settings_update("field", &sparse));
            let dense_writer = scope.spawn(|| registry.apply_settings_update("field", &dense));
            (
                sparse_writer.join().expect("sparse writer"),
                dense_writer.join().expect("dense writer"),
            )
        });

        // Exactly one writer establishes the schema; the other conflicts.
        assert_ne!(sparse_result.is_ok(), dense_result.is_ok());
        let stored = registry
            .get("field")
            .and_then(|mapping| mapping.model_settings)
            .expect("schema established");
        if sparse_result.is_ok() {
            assert_eq!(stored, sparse);
        } else {
            assert_eq!(stored, dense);
        }
    }
}
