//! JSON Lines file sink.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tweetharvest_core::Tweet;
use tweetharvest_scraper::{SinkError, TweetSink};

/// Appends one JSON object per accepted tweet. Writes are buffered; call
/// [`JsonLinesSink::flush`] before reading the file.
pub(crate) struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed.
    pub(crate) async fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub(crate) async fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().await.flush().await
    }
}

#[async_trait]
impl TweetSink for JsonLinesSink {
    async fn append(&self, tweet: &Tweet) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(tweet)?;
        line.push(b'\n');
        self.writer.lock().await.write_all(&line).await?;
        Ok(())
    }
}
