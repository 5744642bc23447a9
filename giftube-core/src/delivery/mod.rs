use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::duration::NormalizedRange;
use crate::resolver::VideoMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Proof the transport accepted the clip.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub message_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("chat service rejected the upload: {description}")]
    Rejected { description: String },
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

#[async_trait]
pub trait ChatDelivery: Send + Sync {
    async fn send_video(
        &self,
        chat: ChatId,
        video: &Path,
        caption: Option<&str>,
    ) -> DeliveryResult<DeliveryReceipt>;
}

/// Uploads finished clips through the Telegram bot API.
pub struct TelegramDelivery {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SendVideoResponse {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: SentChat,
}

#[derive(Debug, Deserialize)]
struct SentChat {
    id: i64,
    username: Option<String>,
}

impl TelegramDelivery {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl ChatDelivery for TelegramDelivery {
    async fn send_video(
        &self,
        chat: ChatId,
        video: &Path,
        caption: Option<&str>,
    ) -> DeliveryResult<DeliveryReceipt> {
        let bytes = tokio::fs::read(video).await.map_err(|source| DeliveryError::Io {
            path: video.to_path_buf(),
            source,
        })?;
        let file_name = video
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.mp4".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")?;
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat.to_string())
            .part("video", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        let url = format!("{}/bot{}/sendVideo", self.api_base, self.token);
        debug!(chat = %chat, video = %video.display(), "uploading clip");
        let response: SendVideoResponse = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(DeliveryError::Rejected {
                description: response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        let message = response.result.ok_or(DeliveryError::Rejected {
            description: "missing result payload".to_string(),
        })?;
        Ok(DeliveryReceipt {
            message_id: message.message_id,
            chat_id: message.chat.id,
            username: message.chat.username,
        })
    }
}

/// Builds the optional show-info caption. The title line absorbs whatever
/// budget the fixed lines leave under `limit`, measured in characters.
pub fn compose_caption(metadata: &VideoMetadata, range: &NormalizedRange, limit: usize) -> String {
    let duration_line = if metadata.total.is_zero() {
        "Duration: N/A".to_string()
    } else {
        format!("Duration: {}", metadata.total)
    };
    let range_line = format!("{} to {}", range.start, range.end());
    let fixed = duration_line.chars().count() + range_line.chars().count() + "Title: ".len() + 2;
    let budget = limit.saturating_sub(fixed);
    let title: String = if metadata.title.chars().count() > budget {
        let mut cut: String = metadata
            .title
            .chars()
            .take(budget.saturating_sub(1))
            .collect();
        cut.push('…');
        cut
    } else {
        metadata.title.clone()
    };
    format!("{duration_line}\nTitle: {title}\n{range_line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::ClipDuration;

    fn metadata(title: &str, total_ms: u64) -> VideoMetadata {
        VideoMetadata {
            id: "abc".to_string(),
            extractor: Some("youtube".to_string()),
            url: "https://youtu.be/abc".to_string(),
            title: title.to_string(),
            total: ClipDuration::from_millis(total_ms),
        }
    }

    fn range(start_ms: u64, span_ms: u64, total_ms: u64) -> NormalizedRange {
        NormalizedRange {
            start: ClipDuration::from_millis(start_ms),
            span: ClipDuration::from_millis(span_ms),
            total: ClipDuration::from_millis(total_ms),
        }
    }

    #[test]
    fn caption_keeps_short_titles_whole() {
        let caption = compose_caption(&metadata("A short clip", 600_000), &range(8_000, 5_000, 600_000), 200);
        assert_eq!(
            caption,
            "Duration: 00:10:00.000\nTitle: A short clip\n00:00:08.000 to 00:00:13.000"
        );
    }

    #[test]
    fn caption_truncates_long_titles_to_the_limit() {
        let long_title = "x".repeat(250);
        let caption = compose_caption(&metadata(&long_title, 600_000), &range(8_000, 5_000, 600_000), 200);
        assert!(caption.chars().count() <= 200);
        assert!(caption.contains('…'));
        assert!(caption.ends_with("00:00:08.000 to 00:00:13.000"));
    }

    #[test]
    fn caption_reports_unknown_totals_as_na() {
        let caption = compose_caption(&metadata("Live", 0), &range(8_000, 5_000, 0), 200);
        assert!(caption.starts_with("Duration: N/A\n"));
    }
}
