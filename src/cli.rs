//! CLI parsing and orchestration. Parses args, runs one retrieval, writes the text file.
//! Maps errors to exit codes.

use crate::adapter::{
    AdapterRegistry, CancelFlag, HttpClient, RetrievalError, DEFAULT_MAX_CONCURRENT,
    DEFAULT_TIMEOUT_SECS,
};
use crate::config::{self, Config};
use crate::model::{ChapterRange, RetrievalKind, RetrievalRequest};
use crate::service::FanficRetrievalService;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Failed to write output: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliRunError {
    /// 1 bad input, 2 upstream fetch/parse failure, 3 write failure, 130 interrupted.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Retrieval(RetrievalError::Cancelled) => 130,
            CliRunError::Retrieval(e) if e.is_client_error() => 1,
            CliRunError::Retrieval(_) => 2,
            CliRunError::Write { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fanficdl")]
#[command(about = "Download fan fiction from FanFiction.Net or Archive of Our Own as plain text")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, timeout_secs, max_concurrent_fetches) are read from ./fanficdl.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Story, chapter or series URL (fanfiction.net or archiveofourown.org).
    pub url: String,

    /// Download only this chapter range (1-based inclusive), e.g. 2-4.
    #[arg(long, value_parser = parse_chapter_range, conflicts_with_all = ["entire", "series"])]
    pub chapters: Option<(u32, u32)>,

    /// Download every chapter of the story.
    #[arg(long, conflicts_with = "series")]
    pub entire: bool,

    /// Download every work of the series (AO3 only).
    #[arg(long)]
    pub series: bool,

    /// Output path. Default: {output_dir}/{suggested-filename}.txt
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Concurrent chapter fetches, 1 to 8 (overrides config; default 4).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Debug logging and the full error chain.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Use-case selected by the flags; single chapter when none is given.
    pub fn kind(&self) -> RetrievalKind {
        if let Some((start, end)) = self.chapters {
            RetrievalKind::ChapterRange { start, end }
        } else if self.entire {
            RetrievalKind::EntireFanfic
        } else if self.series {
            RetrievalKind::EntireSeries
        } else {
            RetrievalKind::SingleChapter
        }
    }
}

fn parse_chapter_range(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim();
    let (from_str, to_str) = s.split_once('-').ok_or_else(|| {
        format!(
            "Invalid --chapters: expected 'from-to' (e.g. 2-4), got '{}'",
            s
        )
    })?;
    let from_str = from_str.trim();
    let to_str = to_str.trim();
    let from: u32 = from_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid start chapter number",
            from_str
        )
    })?;
    let to: u32 = to_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid end chapter number",
            to_str
        )
    })?;
    ChapterRange::new(from, to).map_err(|e| format!("Invalid --chapters: {}", e))?;
    Ok((from, to))
}

/// Effective settings: CLI flag, then config key, then built-in default.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
    output_dir: PathBuf,
    user_agent: Option<String>,
    timeout_secs: u64,
    jobs: usize,
}

impl Settings {
    fn resolve(args: &Args, config: Option<&Config>) -> Self {
        Settings {
            output_dir: config
                .and_then(|c| c.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            user_agent: args
                .user_agent
                .clone()
                .or_else(|| config.and_then(|c| c.user_agent.clone())),
            timeout_secs: args
                .timeout
                .or_else(|| config.and_then(|c| c.timeout_secs))
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            jobs: args
                .jobs
                .or_else(|| config.and_then(|c| c.max_concurrent_fetches))
                .unwrap_or(DEFAULT_MAX_CONCURRENT),
        }
    }
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliRunError> {
    std::fs::write(path, bytes).map_err(|e| CliRunError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Ctrl-C sets `cancel`; in-flight fetches finish and the retrieval returns Cancelled.
fn install_interrupt_handler(cancel: &CancelFlag) {
    let cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }
}

fn spinner(url: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::default_spinner()
        .template("{spinner} {msg} ({elapsed})")
    {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
    }
    pb.set_message(format!("Fetching {}", url));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let kind = args.kind();
    let registry = AdapterRegistry::new();
    // Reject bad input before reading config or opening connections.
    if let RetrievalKind::ChapterRange { start, end } = kind {
        ChapterRange::new(start, end)?;
    }
    registry.resolve_reference(&args.url)?;

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let settings = Settings::resolve(args, config.as_ref());
    tracing::debug!(?settings, "effective settings");

    let mut builder = HttpClient::builder().timeout_secs(settings.timeout_secs);
    if let Some(ua) = settings.user_agent.clone() {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    let service =
        FanficRetrievalService::new(&registry, Arc::new(client)).max_concurrent(settings.jobs);

    let cancel = CancelFlag::new();
    install_interrupt_handler(&cancel);

    let progress = if args.quiet { None } else { Some(spinner(&args.url)) };
    let request = RetrievalRequest::new(args.url.clone(), kind);
    let result = service.retrieve_with_cancel(&request, &cancel);
    if let Some(pb) = progress {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }
    let result = result?;

    let output_path = match &args.output {
        Some(p) => p.clone(),
        None => settings.output_dir.join(&result.filename),
    };
    validate_output_path(&output_path)?;
    write_output(&output_path, &result.bytes)?;

    if !args.quiet {
        eprintln!(
            "Wrote {} ({} bytes)",
            output_path.display(),
            result.bytes.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Site;

    fn args(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["fanficdl", "https://www.fanfiction.net/s/67890/1/"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn parse_chapter_range_valid() -> Result<(), String> {
        assert_eq!(parse_chapter_range("1-10")?, (1, 10));
        assert_eq!(parse_chapter_range("5-5")?, (5, 5));
        assert_eq!(parse_chapter_range("  3 - 7  ")?, (3, 7));
        Ok(())
    }

    #[test]
    fn parse_chapter_range_rejects_no_dash() {
        assert!(parse_chapter_range("1").is_err());
    }

    #[test]
    fn parse_chapter_range_rejects_non_numeric() {
        assert!(parse_chapter_range("a-b").is_err());
        assert!(parse_chapter_range("1-b").is_err());
    }

    #[test]
    fn parse_chapter_range_rejects_bad_bounds() {
        assert!(parse_chapter_range("10-1").is_err());
        assert!(parse_chapter_range("0-3").is_err());
    }

    #[test]
    fn flags_select_kind() -> Result<(), clap::Error> {
        assert_eq!(args(&[])?.kind(), RetrievalKind::SingleChapter);
        assert_eq!(
            args(&["--chapters", "2-4"])?.kind(),
            RetrievalKind::ChapterRange { start: 2, end: 4 }
        );
        assert_eq!(args(&["--entire"])?.kind(), RetrievalKind::EntireFanfic);
        assert_eq!(args(&["--series"])?.kind(), RetrievalKind::EntireSeries);
        Ok(())
    }

    #[test]
    fn use_case_flags_are_exclusive() {
        assert!(args(&["--entire", "--series"]).is_err());
        assert!(args(&["--chapters", "1-2", "--entire"]).is_err());
        assert!(args(&["-v", "-q"]).is_err());
    }

    #[test]
    fn cli_flags_override_config() -> Result<(), clap::Error> {
        let config = Config {
            output_dir: Some(PathBuf::from("out")),
            user_agent: Some("FromConfig/1.0".to_string()),
            timeout_secs: Some(60),
            max_concurrent_fetches: Some(2),
        };
        let a = args(&["--timeout", "5", "--jobs", "6"])?;
        let s = Settings::resolve(&a, Some(&config));
        assert_eq!(s.output_dir, PathBuf::from("out"));
        assert_eq!(s.user_agent.as_deref(), Some("FromConfig/1.0"));
        assert_eq!(s.timeout_secs, 5);
        assert_eq!(s.jobs, 6);
        Ok(())
    }

    #[test]
    fn defaults_without_config() -> Result<(), clap::Error> {
        let s = Settings::resolve(&args(&[])?, None);
        assert_eq!(s.output_dir, PathBuf::from("."));
        assert_eq!(s.user_agent, None);
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.jobs, 4);
        Ok(())
    }

    #[test]
    fn validate_output_path_parent_exists() {
        let path = std::env::temp_dir().join("fanficdl_cli_test_output.txt");
        assert!(validate_output_path(&path).is_ok());
    }

    #[test]
    fn validate_output_path_parent_missing() {
        let path = PathBuf::from("/nonexistent_dir_fanficdl_xyz/output.txt");
        match validate_output_path(&path) {
            Err(CliRunError::InvalidInput(msg)) => {
                assert!(msg.contains("parent directory does not exist"))
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn write_output_writes_bytes() -> Result<(), CliRunError> {
        let path = std::env::temp_dir().join(format!("fanficdl_cli_{}.txt", std::process::id()));
        write_output(&path, "Chapter 1\n\nText.\n".as_bytes())?;
        let written = std::fs::read_to_string(&path).unwrap_or_default();
        std::fs::remove_file(&path).ok();
        assert_eq!(written, "Chapter 1\n\nText.\n");
        Ok(())
    }

    #[test]
    fn run_rejects_unsupported_site_with_exit_code_one() -> Result<(), clap::Error> {
        let a = Args::try_parse_from(["fanficdl", "https://example.com/story/1", "-q"])?;
        match run(&a) {
            Err(e @ CliRunError::Retrieval(RetrievalError::SiteNotSupported { .. })) => {
                assert_eq!(e.exit_code(), 1)
            }
            other => panic!("expected SiteNotSupported, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            CliRunError::Retrieval(RetrievalError::InvalidRange { start: 3, end: 1 }).exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Retrieval(RetrievalError::UnsupportedOperation {
                site: Site::FanFictionNet,
                operation: "series downloads",
            })
            .exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Retrieval(RetrievalError::parse("u", Some(2), "missing body")).exit_code(),
            2
        );
        assert_eq!(CliRunError::Retrieval(RetrievalError::Cancelled).exit_code(), 130);
        assert_eq!(
            CliRunError::Write {
                path: PathBuf::from("x"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            }
            .exit_code(),
            3
        );
    }
}
