//! Observable outcomes of feed consumption

/// Why a message was skipped before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// `Origin-System-Id` did not name the expected producer
    OriginSystem,
    /// `Content-Type` was not JSON
    ContentType,
}

/// Event published by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// Pipeline loop started.
    PipelineStarted,
    /// A message was skipped by the header filter.
    MessageFiltered {
        transaction_id: String,
        reason: FilterReason,
    },
    /// A message (or feed entry) could not be decoded and was dropped.
    DecodeFailed { transaction_id: String, error: String },
    /// A keyphrase annotation was handed to the worker pool.
    AnnotationDispatched {
        transaction_id: String,
        content_uuid: String,
        concept_id: String,
    },
    /// A keyphrase annotation was written.
    AnnotationWritten {
        transaction_id: String,
        content_uuid: String,
        concept_id: String,
    },
    /// A keyphrase annotation write failed.
    AnnotationFailed {
        transaction_id: String,
        content_uuid: String,
        concept_id: String,
        error: String,
    },
    /// Pipeline loop stopped and in-flight writes have drained.
    PipelineStopped,
}

/// What happened to one message in the consumer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Filtered(FilterReason),
    DecodeFailed,
    /// Number of keyphrase annotations dispatched; zero when none qualified
    Dispatched(usize),
}
