mod config_commands;
mod console;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    reelbot_auto_reply::{CommandRouter, install},
    reelbot_config::{ReelbotConfig, Severity, SourceKind},
    reelbot_pipeline::{HttpSource, Pipeline, Source},
    reelbot_sessions::{InMemorySessionStore, SessionStore, SessionSweeper},
};

#[derive(Parser)]
#[command(name = "reelbot", about = "reelbot: search, pick, and receive movies over chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, short, global = true, env = "REELBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot on the console transport (default when no subcommand is provided).
    Run {
        /// Copy delivered files into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Validate the configuration and report problems.
    CheckConfig,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the console transport.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ReelbotConfig> {
    Ok(match &cli.config {
        Some(path) => reelbot_config::load_config(path)?,
        None => reelbot_config::discover_and_load(),
    })
}

async fn run(config: ReelbotConfig, output_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let diagnostics = reelbot_config::validate(&config);
    for d in &diagnostics {
        warn!("{d}");
    }
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        anyhow::bail!("invalid configuration, run `reelbot check-config` for details");
    }

    let source: Arc<dyn Source> = match config.source.kind {
        SourceKind::Http => Arc::new(HttpSource::new(&config.source)?),
    };
    let pipeline = Arc::new(Pipeline::new(source, config.pipeline.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let outbound = Arc::new(console::ConsoleOutbound::new(output_dir));

    let mut router = CommandRouter::new(&config.bot, Arc::clone(&sessions), outbound);
    install(&mut router, pipeline)?;
    let router = Arc::new(router);

    let sweeper = SessionSweeper::spawn(
        Arc::clone(&sessions),
        config.sessions.ttl(),
        config.sessions.sweep_interval(),
    );

    let served = console::serve(router).await;
    sweeper.shutdown().await;
    info!(pending_sessions = sessions.len(), "reelbot stopped");
    served
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "reelbot starting");

    match &cli.command {
        None => run(load_config(&cli)?, None).await,
        Some(Commands::Run { output_dir }) => run(load_config(&cli)?, output_dir.clone()).await,
        Some(Commands::CheckConfig) => config_commands::check(cli.config.as_deref()),
    }
}
