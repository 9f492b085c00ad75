//! Message feeds consumed by the ingestion pipeline

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

pub const ORIGIN_SYSTEM_HEADER: &str = "Origin-System-Id";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A single feed message: string headers plus an opaque body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Header value by name. Exact matches win; otherwise names compare
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed feed entry at line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl FeedError {
    /// Fatal errors end consumption; anything else skips one entry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Source of feed messages. `Ok(None)` means the feed is exhausted.
#[async_trait]
pub trait FeedConsumer: Send {
    async fn next_message(&mut self) -> Result<Option<Message>, FeedError>;
}

/// In-process feed backed by a bounded channel
pub struct ChannelFeed {
    rx: mpsc::Receiver<Message>,
}

impl ChannelFeed {
    /// Create a feed and the sender that publishes into it. The feed ends
    /// once every sender is dropped.
    pub fn new(capacity: usize) -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl FeedConsumer for ChannelFeed {
    async fn next_message(&mut self) -> Result<Option<Message>, FeedError> {
        Ok(self.rx.recv().await)
    }
}

/// Feed reading one JSON-encoded [`Message`] per line. Blank lines are skipped.
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R> JsonLinesFeed<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl JsonLinesFeed<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl JsonLinesFeed<BufReader<tokio::fs::File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R> FeedConsumer for JsonLinesFeed<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<Message>, FeedError> {
        while let Some(text) = self.lines.next_line().await? {
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| FeedError::Decode {
                    line: self.line,
                    source,
                });
        }
        Ok(None)
    }
}
