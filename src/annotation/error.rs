//! Errors surfaced by annotation operations

use crate::ontology::TypeMappingError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("couldn't extract uuid from uri {0}")]
    MalformedUri(String),

    #[error("malformed timestamp {value}: {source}")]
    MalformedTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("concept uuid missing for annotation")]
    MissingConceptId,

    #[error("content uuid is required")]
    EmptyContentId,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    #[error("could not decode suggestion: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid concept type for {concept_uuid}: {source}")]
    TypeResolution {
        concept_uuid: String,
        #[source]
        source: TypeMappingError,
    },
}

impl AnnotationError {
    /// True for errors caused by the caller's input rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedUri(_)
                | Self::MalformedTimestamp { .. }
                | Self::MissingConceptId
                | Self::EmptyContentId
                | Self::Decode(_)
        )
    }
}

/// Result type for annotation operations
pub type AnnotationResult<T> = Result<T, AnnotationError>;
