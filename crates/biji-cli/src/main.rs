//! bijicrawl - incremental crawler for a private notes API.

mod crawl;
mod export;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biji_core::CrawlConfig;

#[derive(Parser)]
#[command(
    name = "bijicrawl",
    version,
    about = "Incrementally harvest notes from the biji web API into a local store"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the notes listing and persist records (default).
    Crawl,
    /// Export stored notes as markdown files.
    Export(ExportArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Output directory for markdown files.
    #[arg(long, default_value = "data/markdown")]
    out: PathBuf,
    /// Only export notes that have resolved details (usually note_type=link).
    #[arg(long)]
    only_details: bool,
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   RUST_LOG    - standard env filter (default: "biji_cli=info,biji_client=info,biji_store=info,biji_core=info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "biji_cli=info,biji_client=info,biji_store=info,biji_core=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("bijicrawl.log");
        let appender = tracing_appender::rolling::daily(dir, file);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    let config = CrawlConfig::from_env();

    match cli.command.unwrap_or(Command::Crawl) {
        Command::Crawl => {
            let summary = crawl::run(&config).await?;
            info!(
                notes = summary.notes,
                link_details = summary.link_details,
                "done"
            );
        }
        Command::Export(args) => {
            let options = export::ExportOptions {
                out_dir: args.out,
                only_with_details: args.only_details,
            };
            let exported = export::run(&config, &options).await?;
            info!(exported, "done");
        }
    }

    Ok(())
}
