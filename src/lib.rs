//! keyphrase-rw: keyphrase annotation writer
//!
//! Consumes concept-suggestion messages, keeps the suggested concepts that
//! are classified as keyphrases, and upserts them with their scored
//! provenance into a graph store. The same data is served back through a
//! small read/write/delete/query API.
//!
//! # Core Concepts
//!
//! - **Annotation**: a link from a content item to a concept, with provenance
//! - **Graph gateway**: executes batches of idempotent statements and typed queries
//! - **Ingest pipeline**: throttled, filtered feed consumption with a bounded write pool
//!
//! # Example
//!
//! ```
//! use keyphrase_rw::{AnnotationService, OpenGateway, SqliteGateway};
//! use std::sync::Arc;
//!
//! let gateway = SqliteGateway::open_in_memory().unwrap();
//! let service = AnnotationService::new(Arc::new(gateway));
//! // Service is ready for use
//! ```

pub mod annotation;
pub mod http;
pub mod ingest;
pub mod ontology;
pub mod storage;

pub use annotation::{
    Annotation, AnnotationError, AnnotationResult, AnnotationService, CoOccurrence, CoOccurrences, Concept,
    PopularKeyphrase, Provenance, Score, ScoringSystem, Suggestion,
};
pub use ontology::{OntologyTypeMapper, TypeMapper, TypeMappingError};
pub use storage::{
    BatchStats, GraphGateway, GraphWrite, OpenGateway, Query, Row, SqliteGateway, Statement, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
