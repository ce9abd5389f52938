//! Remote log streams backed by Redis streams.
//!
//! A log stream URL looks like `redis://host:port/<db>/<stream_key>`: the last
//! path segment names the stream, everything before it addresses the server.
//! Entries carry an `event_type` field (`log` or `disconnect`) and, for logs,
//! the raw `bytes` to forward.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use tracing::{debug, instrument};
use url::Url;

const EVENT_LOG: &str = "log";
const EVENT_DISCONNECT: &str = "disconnect";

/// Opens log streams by URL.
#[async_trait]
pub trait LogStreamConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn LogStream>>;
}

/// A readable log stream.
#[async_trait]
pub trait LogStream: Send {
    /// Next chunk of output, or `None` once the producer disconnected.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Connects to log streams over Redis.
#[derive(Debug, Clone)]
pub struct RedisLogStreams {
    block_timeout: Duration,
}

impl RedisLogStreams {
    pub fn new(block_timeout: Duration) -> Self {
        Self { block_timeout }
    }
}

#[async_trait]
impl LogStreamConnector for RedisLogStreams {
    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> Result<Box<dyn LogStream>> {
        let (server_url, key) = split_stream_url(url)?;
        let client = redis::Client::open(server_url.as_str())
            .with_context(|| format!("open redis client for {server_url}"))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("connect to log stream server")?;
        debug!(stream = %key, "connected to log stream");
        Ok(Box::new(RedisLogStream {
            conn,
            key,
            last_id: "0".to_string(),
            block_timeout: self.block_timeout,
        }))
    }
}

struct RedisLogStream {
    conn: MultiplexedConnection,
    key: String,
    last_id: String,
    block_timeout: Duration,
}

#[async_trait]
impl LogStream for RedisLogStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let block_ms = usize::try_from(self.block_timeout.as_millis()).unwrap_or(usize::MAX);
        let options = StreamReadOptions::default().count(1).block(block_ms);
        loop {
            let reply: Option<StreamReadReply> = self
                .conn
                .xread_options(&[&self.key], &[&self.last_id], &options)
                .await
                .with_context(|| format!("read log stream {}", self.key))?;
            let Some(reply) = reply else {
                return Err(anyhow!(
                    "no output on log stream for {}s",
                    self.block_timeout.as_secs()
                ));
            };
            let Some(entry) = reply.keys.into_iter().flat_map(|key| key.ids).next() else {
                continue;
            };
            self.last_id = entry.id.clone();
            let event_type: Option<String> = entry.get("event_type");
            match event_type.as_deref() {
                Some(EVENT_DISCONNECT) => return Ok(None),
                Some(EVENT_LOG) => {
                    let bytes: Vec<u8> = entry.get("bytes").unwrap_or_default();
                    if !bytes.is_empty() {
                        return Ok(Some(bytes));
                    }
                }
                other => debug!(event_type = ?other, "skipping log stream entry"),
            }
        }
    }
}

/// Split a log stream URL into the server URL and the stream key.
pub fn split_stream_url(url: &str) -> Result<(String, String)> {
    let mut parsed = Url::parse(url).with_context(|| format!("invalid log stream URL: {url}"))?;
    let mut segments: Vec<String> = parsed
        .path_segments()
        .map(|segments| segments.map(str::to_string).collect())
        .unwrap_or_default();
    let key = segments
        .pop()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("log stream URL has no stream key: {url}"))?;
    parsed.set_path(&segments.join("/"));
    Ok((parsed.to_string(), key))
}
