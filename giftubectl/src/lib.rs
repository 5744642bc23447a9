use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use giftube_core::delivery::{ChatId, TelegramDelivery};
use giftube_core::exec::{CommandExecutor, SystemCommandExecutor};
use giftube_core::media::FfmpegEncoder;
use giftube_core::resolver::{normalize_source_url, VideoResolver, YtdlResolver};
use giftube_core::store::ClipStore;
use giftube_core::{
    load_giftube_config, ClipPipeline, ClipReport, ClipRequest, GiftubeConfig, PipelineSettings,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] giftube_core::error::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no bot token; pass --token or set GIFTUBE_BOT_TOKEN")]
    MissingToken,
    #[error("required resource missing: {0}")]
    MissingResource(String),
    #[error("{0}")]
    Clip(String),
    #[error("lookup failed: {0}")]
    Resolver(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "giftube command-line clip interface", long_about = None)]
pub struct Cli {
    /// Path to the main giftube.toml
    #[arg(long, default_value = "configs/giftube.toml")]
    pub config: PathBuf,
    /// Override for the clip working directory (replaces paths.video_dir)
    #[arg(long)]
    pub video_dir: Option<PathBuf>,
    /// Bot token for chat delivery; GIFTUBE_BOT_TOKEN is used when omitted
    #[arg(long)]
    pub token: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce a clip and deliver it to a chat
    Clip(ClipArgs),
    /// Show what the extractor reports for a url
    Inspect(InspectArgs),
    /// Run basic integrity checks
    #[command(name = "health")]
    Health,
}

#[derive(Args, Debug)]
pub struct ClipArgs {
    /// Source video url
    pub url: String,
    /// Start time as hh:mm:ss.sss, or the span when no second value follows
    pub first: String,
    /// Span in seconds
    pub second: Option<String>,
    /// Destination chat id
    #[arg(long)]
    pub chat: i64,
    /// Attach the metadata caption to the delivered clip
    #[arg(long, default_value_t = false)]
    pub show_info: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Source video url
    pub url: String,
}

pub async fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Clip(args) => {
            let token = cli
                .token
                .clone()
                .or_else(|| std::env::var("GIFTUBE_BOT_TOKEN").ok())
                .ok_or(AppError::MissingToken)?;
            let report = context.clip(args, &token).await?;
            render(&report, cli.format)?;
        }
        Commands::Inspect(args) => {
            let report = context.inspect(args).await?;
            render(&report, cli.format)?;
        }
        Commands::Health => {
            let report = context.health_check();
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "one or more checks failed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: GiftubeConfig,
    config_path: PathBuf,
    video_dir: PathBuf,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let config = load_giftube_config(&config_path)?;
        let video_dir = cli
            .video_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.paths.video_dir));
        Ok(Self {
            config,
            config_path,
            video_dir,
        })
    }

    fn resolver(&self, executor: Arc<dyn CommandExecutor>) -> YtdlResolver {
        YtdlResolver::new(
            self.config.tools.ytdl.clone(),
            executor,
            self.config.tool_timeout(),
        )
    }

    async fn clip(&self, args: &ClipArgs, token: &str) -> Result<ClipReport> {
        let executor: Arc<dyn CommandExecutor> = Arc::new(SystemCommandExecutor);
        let resolver = Arc::new(self.resolver(executor.clone()));
        let encoder = Arc::new(FfmpegEncoder::new(
            self.config.tools.ffmpeg.clone(),
            self.config.tools.ffprobe.clone(),
            executor,
            self.config.tool_timeout(),
        ));
        let delivery = Arc::new(TelegramDelivery::new(
            self.config.delivery.api_base.clone(),
            token,
        ));
        let store = Arc::new(ClipStore::new(&self.video_dir)?);
        let pipeline = ClipPipeline::new(
            resolver,
            encoder,
            delivery,
            store,
            PipelineSettings::from_config(&self.config),
        );

        let request = clip_request(args);
        match pipeline.run(&request).await {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(stage = %err.stage(), error = %err, "clip command failed");
                Err(AppError::Clip(err.user_message()))
            }
        }
    }

    async fn inspect(&self, args: &InspectArgs) -> Result<InspectReport> {
        let executor: Arc<dyn CommandExecutor> = Arc::new(SystemCommandExecutor);
        let resolver = self.resolver(executor);
        let metadata = resolver
            .metadata(&normalize_source_url(&args.url))
            .await
            .map_err(|err| AppError::Resolver(err.to_string()))?;
        Ok(InspectReport {
            id: metadata.id,
            extractor: metadata.extractor,
            title: metadata.title,
            total: if metadata.total.is_zero() {
                "N/A".to_string()
            } else {
                metadata.total.to_string()
            },
            url: metadata.url,
        })
    }

    fn health_check(&self) -> Vec<HealthEntry> {
        let mut results = Vec::new();
        results.push(self.check_path("giftube.toml", &self.config_path));
        results.push(self.check_directory("video_dir", &self.video_dir));
        results.push(self.check_directory("assets_dir", Path::new(&self.config.paths.assets_dir)));
        results.push(self.check_file("watermark", &self.config.watermark_path()));
        results.push(self.check_tool("ytdl", &self.config.tools.ytdl));
        results.push(self.check_tool("ffmpeg", &self.config.tools.ffmpeg));
        results.push(self.check_tool("ffprobe", &self.config.tools.ffprobe));
        results
    }

    fn check_path(&self, name: &str, path: &Path) -> HealthEntry {
        if path.exists() {
            HealthEntry::ok(name, format!("{}", path.display()))
        } else {
            HealthEntry::error(name, format!("{} missing", path.display()))
        }
    }

    fn check_file(&self, name: &str, path: &Path) -> HealthEntry {
        if path.is_file() {
            HealthEntry::ok(name, format!("{}", path.display()))
        } else {
            HealthEntry::warn(name, format!("{} not found", path.display()))
        }
    }

    fn check_directory(&self, name: &str, path: &Path) -> HealthEntry {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => HealthEntry::ok(name, format!("{}", path.display())),
            Ok(_) => HealthEntry::warn(name, format!("{} is not a directory", path.display())),
            Err(_) => HealthEntry::warn(name, format!("{} not found", path.display())),
        }
    }

    fn check_tool(&self, name: &str, binary: &str) -> HealthEntry {
        if locate_tool(binary) {
            HealthEntry::ok(name, binary.to_string())
        } else {
            HealthEntry::warn(name, format!("{binary} not found on PATH"))
        }
    }
}

fn locate_tool(binary: &str) -> bool {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

/// The single-value form means "clip this many seconds from the beginning".
fn clip_request(args: &ClipArgs) -> ClipRequest {
    let (start, span) = match &args.second {
        Some(span) => (args.first.clone(), span.clone()),
        None => ("00:00:00.000".to_string(), args.first.clone()),
    };
    ClipRequest {
        chat: ChatId(args.chat),
        url: args.url.clone(),
        raw_start: Some(start),
        raw_span: Some(span),
        show_info: args.show_info,
    }
}

impl DisplayFallback for ClipReport {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Clip {}", self.fingerprint),
            format!("Artifact: {}", self.artifact.display()),
            format!("Range: {} to {}", self.range.start, self.range.end()),
        ];
        match &self.receipt {
            Some(receipt) => lines.push(format!(
                "Delivered: message {} in chat {}",
                receipt.message_id, receipt.chat_id
            )),
            None => lines.push("Delivered: no (delivery failed, artifact kept)".to_string()),
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub id: String,
    pub extractor: Option<String>,
    pub title: String,
    pub total: String,
    pub url: String,
}

impl DisplayFallback for InspectReport {
    fn display(&self) -> String {
        vec![
            format!("Id: {}", self.id),
            format!("Extractor: {}", self.extractor.as_deref().unwrap_or("-")),
            format!("Title: {}", self.title),
            format!("Duration: {}", self.total),
            format!("Url: {}", self.url),
        ]
        .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        for entry in self {
            lines.push(format!(
                "[{status}] {name}: {detail}",
                status = entry.status,
                name = entry.name,
                detail = entry.detail
            ));
        }
        lines.join("\n")
    }
}
