//! Common test utilities for keyphrase-rw integration tests
//!
//! Provides a gateway wrapper that records traffic and can be told to fail
//! or stall, plus fixtures for annotations and feed messages.

#![allow(dead_code)]

use async_trait::async_trait;
use keyphrase_rw::ingest::Message;
use keyphrase_rw::storage::{Properties, PropertyValue};
use keyphrase_rw::{
    Annotation, BatchStats, Concept, GraphGateway, GraphWrite, OpenGateway, Provenance, Query, Row, Score,
    ScoringSystem, SqliteGateway, Statement, StorageError, StorageResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const KEYPHRASE_TYPE: &str = "http://www.ft.com/ontology/extraction/KeyPhrase";
pub const PERSON_TYPE: &str = "http://www.ft.com/ontology/person/Person";
pub const AGENT_URI: &str = "http://api.ft.com/things/0edd3c31-1fd0-4ef6-9230-8d545be3880a";
pub const ANNOTATED_AT: &str = "2016-01-01T19:43:47.314Z";

// ============================================================================
// Recording gateway
// ============================================================================

/// Gateway that forwards to an in-memory store while counting calls.
///
/// Writes can be made to fail, and every write can be delayed to keep it
/// in flight long enough to observe concurrency.
pub struct RecordingGateway {
    inner: SqliteGateway,
    batches: AtomicUsize,
    queries: AtomicUsize,
    failing: AtomicBool,
    write_delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteGateway::open_in_memory().expect("in-memory store"),
            batches: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            write_delay_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn store(&self) -> &SqliteGateway {
        &self.inner
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Highest number of batches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphGateway for RecordingGateway {
    async fn execute_batch(&self, batch: &GraphWrite) -> StorageResult<BatchStats> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".into()));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let result = self.inner.execute_batch(batch).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn execute_query(&self, query: &Query) -> StorageResult<Vec<Row>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".into()));
        }
        self.inner.execute_query(query).await
    }

    async fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".into()));
        }
        self.inner.check().await
    }

    async fn ensure_constraints(&self) -> StorageResult<()> {
        self.inner.ensure_constraints().await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn thing_uri(uuid: &str) -> String {
    format!("http://api.ft.com/things/{}", uuid)
}

/// Keyphrase annotation with a full provenance
pub fn keyphrase_annotation(uuid: &str, label: &str) -> Annotation {
    Annotation {
        concept: Concept {
            id: thing_uri(uuid),
            pref_label: label.to_string(),
            types: vec![KEYPHRASE_TYPE.to_string()],
            predicate: None,
        },
        provenances: vec![Provenance {
            scores: vec![
                Score::new(ScoringSystem::Relevance, 0.9),
                Score::new(ScoringSystem::Confidence, 0.8),
            ],
            agent_role: Some(AGENT_URI.to_string()),
            at_time: Some(ANNOTATED_AT.to_string()),
        }],
    }
}

/// Suggestion body as the producer sends it
pub fn suggestion_body(content_uuid: &str, annotations: &[Annotation]) -> String {
    json!({ "uuid": content_uuid, "suggestions": annotations }).to_string()
}

/// Feed message that passes the header filter
pub fn feed_message(body: impl Into<String>) -> Message {
    Message::new(body)
        .with_header("Origin-System-Id", "concept-suggestor")
        .with_header("Content-Type", "application/json")
}

/// Mark a content node as published at `epoch` seconds
pub async fn seed_content(gateway: &dyn GraphGateway, uuid: &str, published_epoch: i64) {
    let mut properties = Properties::new();
    properties.insert("publishedDateEpoch".to_string(), PropertyValue::Int(published_epoch));
    gateway
        .execute_batch(&GraphWrite::new().with(Statement::MergeNode {
            uuid: uuid.to_string(),
            labels: vec!["Thing".to_string(), "Content".to_string()],
            properties,
        }))
        .await
        .expect("seed content");
}

/// Create a non-keyphrase concept node with the given labels
pub async fn seed_concept(gateway: &dyn GraphGateway, uuid: &str, label: &str, labels: &[&str]) {
    let mut properties = Properties::new();
    properties.insert("prefLabel".to_string(), label.into());
    gateway
        .execute_batch(&GraphWrite::new().with(Statement::MergeNode {
            uuid: uuid.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties,
        }))
        .await
        .expect("seed concept");
}

/// Link content to a concept the way another writer would
pub async fn seed_mention(gateway: &dyn GraphGateway, content_uuid: &str, concept_uuid: &str, rel_type: &str) {
    gateway
        .execute_batch(&GraphWrite::new().with(Statement::MergeRelationship {
            from: content_uuid.to_string(),
            to: concept_uuid.to_string(),
            rel_type: rel_type.to_string(),
            properties: Properties::new(),
        }))
        .await
        .expect("seed mention");
}
