//! Ingestion pipeline
//!
//! One sequential consumer loop per pipeline: receive, throttle, filter by
//! headers, decode, pick keyphrase annotations, and hand each of them to a
//! bounded pool of write tasks. The loop only waits on the pool when
//! `max_in_flight` writes are outstanding.

use super::events::{FilterReason, IngestEvent, MessageOutcome};
use super::feed::{
    FeedConsumer, Message, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, ORIGIN_SYSTEM_HEADER, REQUEST_ID_HEADER,
};
use super::throttle::Throttle;
use crate::annotation::{Annotation, AnnotationService, Suggestion};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Default throttle rate, in messages per second
pub const DEFAULT_THROTTLE_RATE: u32 = 1000;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;
/// Largest write pool the semaphore can hold and `wait_idle` can drain at once
pub const MAX_IN_FLIGHT_LIMIT: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};
/// Producer accepted by the header filter unless configured otherwise
pub const DEFAULT_ORIGIN_SYSTEM: &str = "concept-suggestor";
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Messages consumed per second.
    pub throttle_rate: NonZeroU32,
    /// Maximum number of annotation writes running at once.
    pub max_in_flight: usize,
    /// Expected `Origin-System-Id` header value.
    pub origin_system: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            throttle_rate: NonZeroU32::new(DEFAULT_THROTTLE_RATE).unwrap_or(NonZeroU32::MIN),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            origin_system: DEFAULT_ORIGIN_SYSTEM.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_throttle_rate(mut self, rate: NonZeroU32) -> Self {
        self.throttle_rate = rate;
        self
    }

    /// Set the write pool size, clamped to `1..=MAX_IN_FLIGHT_LIMIT`.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.clamp(1, MAX_IN_FLIGHT_LIMIT);
        self
    }

    pub fn with_origin_system(mut self, origin_system: impl Into<String>) -> Self {
        self.origin_system = origin_system.into();
        self
    }
}

/// Handle for controlling a running pipeline.
///
/// Dropping the handle also stops the loop.
pub struct PipelineHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<IngestEvent>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Ask the loop to stop after its current message.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("pipeline loop already stopped");
        }
    }

    /// Subscribe to pipeline events.
    pub fn events(&self) -> broadcast::Receiver<IngestEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the loop to stop and its in-flight writes to drain.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

pub struct IngestPipeline {
    service: AnnotationService,
    config: PipelineConfig,
    throttle: Throttle,
    permits: Arc<Semaphore>,
    event_tx: broadcast::Sender<IngestEvent>,
}

impl IngestPipeline {
    pub fn new(service: AnnotationService, config: PipelineConfig) -> Self {
        let config = PipelineConfig {
            max_in_flight: config.max_in_flight.clamp(1, MAX_IN_FLIGHT_LIMIT),
            ..config
        };
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            throttle: Throttle::per_second(config.throttle_rate),
            permits: Arc::new(Semaphore::new(config.max_in_flight)),
            config,
            event_tx,
        }
    }

    /// Replace the throttle derived from the config
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Subscribe to pipeline events.
    pub fn events(&self) -> broadcast::Receiver<IngestEvent> {
        self.event_tx.subscribe()
    }

    /// Start consuming `feed` on a background task.
    pub fn start<F>(self, feed: F) -> PipelineHandle
    where
        F: FeedConsumer + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(feed, &mut shutdown_rx).await;
        });

        PipelineHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip_all)]
    async fn run<F: FeedConsumer>(&self, mut feed: F, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            throttle_rate = self.config.throttle_rate.get(),
            max_in_flight = self.config.max_in_flight,
            origin_system = %self.config.origin_system,
            "ingest pipeline started"
        );
        let _ = self.event_tx.send(IngestEvent::PipelineStarted);

        loop {
            let next = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("ingest pipeline received shutdown signal");
                    break;
                }
                next = feed.next_message() => next,
            };

            match next {
                Ok(Some(message)) => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("ingest pipeline received shutdown signal while throttled");
                            break;
                        }
                        _ = self.throttle.tick() => {}
                    }
                    self.handle_message(&message).await;
                }
                Ok(None) => {
                    info!("feed exhausted");
                    break;
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "feed failed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed feed entry");
                    let _ = self.event_tx.send(IngestEvent::DecodeFailed {
                        transaction_id: new_transaction_id(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.wait_idle().await;
        let _ = self.event_tx.send(IngestEvent::PipelineStopped);
        info!("ingest pipeline stopped");
    }

    /// Filter, decode and dispatch one message.
    ///
    /// Returns once every qualifying annotation has been handed to the
    /// write pool, not when the writes finish.
    pub async fn handle_message(&self, message: &Message) -> MessageOutcome {
        let transaction_id = message
            .header(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_transaction_id);
        let span = info_span!("message", transaction_id = %transaction_id);
        self.process(transaction_id, message).instrument(span).await
    }

    async fn process(&self, transaction_id: String, message: &Message) -> MessageOutcome {
        if let Some(reason) = self.filter(message) {
            debug!(?reason, "message filtered");
            let _ = self.event_tx.send(IngestEvent::MessageFiltered {
                transaction_id,
                reason,
            });
            return MessageOutcome::Filtered(reason);
        }

        let suggestion = match Suggestion::from_json(&message.body) {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!(error = %e, "dropping message");
                let _ = self.event_tx.send(IngestEvent::DecodeFailed {
                    transaction_id,
                    error: e.to_string(),
                });
                return MessageOutcome::DecodeFailed;
            }
        };

        let content_uuid = &suggestion.content_uuid;
        let mut dispatched = 0;
        for annotation in suggestion.keyphrases() {
            if self.dispatch(&transaction_id, content_uuid, annotation.clone()).await {
                dispatched += 1;
            }
        }
        debug!(content_uuid = %content_uuid, dispatched, "suggestion processed");
        MessageOutcome::Dispatched(dispatched)
    }

    fn filter(&self, message: &Message) -> Option<FilterReason> {
        if message.header(ORIGIN_SYSTEM_HEADER) != Some(self.config.origin_system.as_str()) {
            return Some(FilterReason::OriginSystem);
        }
        if message.header(CONTENT_TYPE_HEADER) != Some(JSON_CONTENT_TYPE) {
            return Some(FilterReason::ContentType);
        }
        None
    }

    /// Run one write on the pool, waiting for a free slot if it is full.
    async fn dispatch(&self, transaction_id: &str, content_uuid: &str, annotation: Annotation) -> bool {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "write pool closed");
                return false;
            }
        };

        let transaction_id = transaction_id.to_string();
        let content_uuid = content_uuid.to_string();
        let concept_id = annotation.concept.id.clone();
        let _ = self.event_tx.send(IngestEvent::AnnotationDispatched {
            transaction_id: transaction_id.clone(),
            content_uuid: content_uuid.clone(),
            concept_id: concept_id.clone(),
        });

        let service = self.service.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(
            async move {
                let _permit = permit;
                let event = match service.write(&content_uuid, &annotation).await {
                    Ok(()) => IngestEvent::AnnotationWritten {
                        transaction_id,
                        content_uuid,
                        concept_id,
                    },
                    Err(e) => {
                        error!(error = %e, content_uuid = %content_uuid, concept = %concept_id, "annotation write failed");
                        IngestEvent::AnnotationFailed {
                            transaction_id,
                            content_uuid,
                            concept_id,
                            error: e.to_string(),
                        }
                    }
                };
                let _ = event_tx.send(event);
            }
            .in_current_span(),
        );
        true
    }

    /// Wait until no writes are in flight.
    pub async fn wait_idle(&self) {
        let Ok(all) = u32::try_from(self.config.max_in_flight) else {
            error!(max_in_flight = self.config.max_in_flight, "write pool too large to drain");
            return;
        };
        if let Ok(permits) = self.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}

fn new_transaction_id() -> String {
    format!("tid_{}", Uuid::new_v4().simple())
}
