mod error;

use std::process::Output;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::duration::ClipDuration;
use crate::exec::CommandExecutor;

pub use error::{ResolverError, ResolverResult};

/// What the extractor knows about a source video before any download starts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VideoMetadata {
    pub id: String,
    /// Lowercased extractor name, e.g. "youtube". Absent for direct urls.
    pub extractor: Option<String>,
    pub url: String,
    pub title: String,
    /// Zero when the extractor cannot report a total length (live streams).
    pub total: ClipDuration,
}

/// One row of the extractor's format table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    pub format_id: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait VideoResolver: Send + Sync {
    async fn metadata(&self, url: &str) -> ResolverResult<VideoMetadata>;
    async fn suitable_format(&self, url: &str, limit: u32) -> ResolverResult<FormatChoice>;
    async fn stream_url(&self, url: &str, format_id: &str) -> ResolverResult<String>;
}

/// Short-link hosts publish both bare and `www.`-prefixed forms; the
/// extractor only accepts the bare one.
pub fn normalize_source_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.host_str() == Some("www.youtu.be") => {
            url.replacen("www.youtu.be", "youtu.be", 1)
        }
        _ => url.to_string(),
    }
}

fn format_row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<id>\S+)\s+mp4\s+(?P<w>\d+)x(?P<h>\d+)").expect("format row pattern")
    })
}

/// Drives a yt-dlp compatible binary through [`CommandExecutor`].
pub struct YtdlResolver {
    binary: String,
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct YtdlInfo {
    id: String,
    extractor: Option<String>,
    webpage_url: Option<String>,
    title: String,
    duration: Option<f64>,
}

impl YtdlResolver {
    pub fn new(binary: impl Into<String>, executor: Arc<dyn CommandExecutor>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            executor,
            timeout,
        }
    }

    async fn invoke(&self, args: &[&str]) -> ResolverResult<Output> {
        let mut command = Command::new(&self.binary);
        command.args(args);
        let output = tokio::time::timeout(self.timeout, self.executor.run(&mut command))
            .await
            .map_err(|_| ResolverError::Timeout {
                tool: self.binary.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ResolverError::Io {
                tool: self.binary.clone(),
                source,
            })?;
        Ok(output)
    }

    /// The extractor reports lookup failures only through prose on stderr;
    /// map the recognizable phrasings onto structured variants here so the
    /// rest of the pipeline never inspects tool output.
    fn classify_metadata_failure(&self, output: &Output) -> ResolverError {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let lowered = stderr.to_lowercase();
        if lowered.contains("sign in") {
            ResolverError::AuthRequired { stderr }
        } else if lowered.contains("available in your country") || lowered.contains("not available") {
            ResolverError::GeoBlocked { stderr }
        } else {
            ResolverError::NotFound { stderr }
        }
    }
}

#[async_trait]
impl VideoResolver for YtdlResolver {
    async fn metadata(&self, url: &str) -> ResolverResult<VideoMetadata> {
        let output = self.invoke(&["--dump-json", "--no-playlist", url]).await?;
        if !output.status.success() {
            return Err(self.classify_metadata_failure(&output));
        }
        let info: YtdlInfo = serde_json::from_slice(&output.stdout)
            .map_err(|err| ResolverError::InvalidOutput(err.to_string()))?;
        let total = info
            .duration
            .map(ClipDuration::from_secs_f64)
            .unwrap_or(ClipDuration::ZERO);
        debug!(id = %info.id, total = %total, "resolved video metadata");
        Ok(VideoMetadata {
            extractor: info.extractor.map(|name| name.to_lowercase()),
            url: info.webpage_url.unwrap_or_else(|| url.to_string()),
            title: info.title,
            total,
            id: info.id,
        })
    }

    async fn suitable_format(&self, url: &str, limit: u32) -> ResolverResult<FormatChoice> {
        let output = self.invoke(&["--list-formats", "--no-playlist", url]).await?;
        if !output.status.success() {
            return Err(ResolverError::CommandFailure {
                tool: self.binary.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        let table = String::from_utf8_lossy(&output.stdout);
        let row = format_row_pattern();
        let mut best: Option<FormatChoice> = None;
        for line in table.lines() {
            if line.contains("audio only") || line.contains("mp4a") {
                continue;
            }
            let Some(captures) = row.captures(line.trim_start()) else {
                continue;
            };
            let choice = FormatChoice {
                format_id: captures["id"].to_string(),
                width: captures["w"].parse().unwrap_or(0),
                height: captures["h"].parse().unwrap_or(0),
            };
            if choice.width == 0 || choice.width > limit {
                continue;
            }
            if best.as_ref().map_or(true, |held| choice.width > held.width) {
                best = Some(choice);
            }
        }
        best.ok_or(ResolverError::NoSuitableFormat { limit })
    }

    async fn stream_url(&self, url: &str, format_id: &str) -> ResolverResult<String> {
        let output = self
            .invoke(&["--get-url", "--no-playlist", "-f", format_id, url])
            .await?;
        if !output.status.success() {
            return Err(ResolverError::CommandFailure {
                tool: self.binary.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| ResolverError::StreamUrlUnavailable {
                format_id: format_id.to_string(),
            })?;
        url::Url::parse(line)
            .map_err(|err| ResolverError::InvalidOutput(err.to_string()))?;
        Ok(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Replays canned process outputs in the order calls arrive.
    struct ScriptedExecutor {
        outputs: Mutex<Vec<Output>>,
    }

    impl ScriptedExecutor {
        fn new(outputs: Vec<Output>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs),
            })
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn run(&self, _command: &mut Command) -> std::io::Result<Output> {
            Ok(self.outputs.lock().unwrap().remove(0))
        }
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn resolver(outputs: Vec<Output>) -> YtdlResolver {
        YtdlResolver::new(
            "yt-dlp",
            ScriptedExecutor::new(outputs),
            Duration::from_secs(5),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn metadata_parses_dump_json() {
        let info = r#"{"id":"dQw4w","extractor":"Youtube","webpage_url":"https://youtu.be/dQw4w","title":"Never","duration":212.09}"#;
        let resolver = resolver(vec![output(0, info, "")]);
        let metadata = resolver.metadata("https://youtu.be/dQw4w").await.unwrap();
        assert_eq!(metadata.id, "dQw4w");
        assert_eq!(metadata.extractor.as_deref(), Some("youtube"));
        assert_eq!(metadata.total.to_string(), "00:03:32.090");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn metadata_without_duration_reports_zero_total() {
        let info = r#"{"id":"live1","extractor":"Twitch","webpage_url":null,"title":"Live","duration":null}"#;
        let resolver = resolver(vec![output(0, info, "")]);
        let metadata = resolver.metadata("https://example.com/live1").await.unwrap();
        assert!(metadata.total.is_zero());
        assert_eq!(metadata.url, "https://example.com/live1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn metadata_failures_are_classified_from_stderr() {
        let cases = [
            ("ERROR: Sign in to confirm your age", "auth"),
            ("ERROR: video not available in your country", "geo"),
            ("ERROR: Unable to extract video data", "not_found"),
        ];
        for (stderr, expected) in cases {
            let resolver = resolver(vec![output(1, "", stderr)]);
            let err = resolver.metadata("https://example.com/v").await.unwrap_err();
            match (expected, err) {
                ("auth", ResolverError::AuthRequired { .. }) => {}
                ("geo", ResolverError::GeoBlocked { .. }) => {}
                ("not_found", ResolverError::NotFound { .. }) => {}
                (expected, err) => panic!("expected {expected}, got {err:?}"),
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn suitable_format_prefers_widest_mp4_under_limit() {
        let table = "\
ID  EXT  RESOLUTION
140 m4a  audio only mp4a
18  mp4  640x360
22  mp4  1280x720
134 mp4  426x240
";
        let resolver = resolver(vec![output(0, table, "")]);
        let choice = resolver
            .suitable_format("https://example.com/v", 640)
            .await
            .unwrap();
        assert_eq!(choice.format_id, "18");
        assert_eq!(choice.width, 640);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn suitable_format_rejects_audio_only_tables() {
        let table = "140 m4a audio only mp4a\n";
        let resolver = resolver(vec![output(0, table, "")]);
        let err = resolver
            .suitable_format("https://example.com/v", 640)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::NoSuitableFormat { limit: 640 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_url_takes_first_nonempty_line() {
        let resolver = resolver(vec![output(0, "\nhttps://cdn.example.com/seg.mp4\n", "")]);
        let url = resolver
            .stream_url("https://example.com/v", "18")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/seg.mp4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stream_url_rejects_non_url_output() {
        let resolver = resolver(vec![output(0, "not a url", "")]);
        let err = resolver
            .stream_url("https://example.com/v", "18")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidOutput(_)));
    }

    #[test]
    fn short_link_hosts_lose_their_www_prefix() {
        assert_eq!(
            normalize_source_url("https://www.youtu.be/abc"),
            "https://youtu.be/abc"
        );
        assert_eq!(
            normalize_source_url("https://www.youtube.com/watch?v=abc"),
            "https://www.youtube.com/watch?v=abc"
        );
    }
}
