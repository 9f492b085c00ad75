//! Feed ingestion: consume suggestion messages and write their keyphrase
//! annotations through the annotation service.

mod events;
pub mod feed;
mod pipeline;
mod throttle;

pub use events::{FilterReason, IngestEvent, MessageOutcome};
pub use feed::{ChannelFeed, FeedConsumer, FeedError, JsonLinesFeed, Message};
pub use pipeline::{
    IngestPipeline, PipelineConfig, PipelineHandle, DEFAULT_MAX_IN_FLIGHT, DEFAULT_ORIGIN_SYSTEM, MAX_IN_FLIGHT_LIMIT,
    DEFAULT_THROTTLE_RATE,
};
pub use throttle::Throttle;
