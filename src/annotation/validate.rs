//! Structural validation of annotations before any store mutation

use super::error::{AnnotationError, AnnotationResult};
use super::types::Annotation;

/// Reject annotations without a concept id.
///
/// Every other field is optional; partial provenance is accepted.
pub fn validate(annotation: &Annotation) -> AnnotationResult<()> {
    if annotation.concept.id.is_empty() {
        return Err(AnnotationError::MissingConceptId);
    }
    Ok(())
}
