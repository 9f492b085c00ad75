//! Keyphrase annotations: wire types, validation, graph write building and
//! the service that ties them to a graph gateway.

pub mod builder;
pub mod codec;
mod error;
mod service;
mod types;
pub mod validate;

pub use error::{AnnotationError, AnnotationResult};
pub use service::AnnotationService;
pub use types::{
    Annotation, CoOccurrence, CoOccurrences, Concept, PopularKeyphrase, Provenance, Score, ScoringSystem,
    Suggestion,
};
