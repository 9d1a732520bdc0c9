use anyhow::{Context, Result};
use clap::Parser;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncRead;

use rssfilter::config::Settings;
use rssfilter::feed::{FeedInput, InputError};

#[derive(Parser, Debug)]
#[command(
    name = "rssfilter",
    version,
    about = "Keep only the RSS items whose title matches a pattern (stdin to stdout)"
)]
struct Args {
    /// Regex pattern to use for filtering (several may follow one -e).
    /// A pattern starting with '-' must be written as --pattern=-PATTERN
    #[arg(short = 'e', long = "pattern", value_name = "PATTERN", num_args = 1..)]
    patterns: Vec<String>,

    /// Time to wait for input from stdin, in seconds [default: 3]
    #[arg(short = 't', long = "timeout", value_name = "SECONDS")]
    timeout: Option<u64>,

    /// TOML config file with `patterns` and `timeout_seconds`
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the feed
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let args = Args::parse();

    match run(args, tokio::io::stdin(), &mut std::io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rssfilter: {}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// Renders an error and its causes on one line, `outer: cause: root`.
fn error_line(err: &anyhow::Error) -> String {
    err.chain()
        .map(|cause| {
            cause
                .to_string()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(": ")
}

fn run<R, W>(args: Args, input: R, out: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let settings = Settings::from_cli(args.config.as_deref(), args.patterns, args.timeout)
        .with_context(|| match &args.config {
            Some(path) => format!("Failed to load config from {}", path.display()),
            None => "Failed to load config".to_string(),
        })?;
    let patterns = settings.pattern_set();
    tracing::debug!(?settings, "Resolved settings");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start async runtime")?;
    let feed = runtime.block_on(read_feed(input, settings.timeout_seconds));
    // A stdin read left pending by a timeout must not block exit
    runtime.shutdown_background();
    let feed = feed?;

    let (output, _report) =
        rssfilter::filter_feed(&feed, &patterns).context("Failed to filter feed")?;

    out.write_all(&output)
        .and_then(|()| out.flush())
        .context("Failed to write feed to stdout")?;
    Ok(())
}

async fn read_feed<R: AsyncRead + Unpin>(input: R, timeout_secs: u64) -> Result<Vec<u8>> {
    let mut input = FeedInput::new(input);
    if !input.wait_ready(timeout_secs).await? {
        return Err(InputError::Timeout(timeout_secs).into());
    }
    Ok(input.read_all().await?)
}
