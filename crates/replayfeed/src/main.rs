use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replayfeed::commands::{self, ExportArgs, ListArgs, LoginArgs};
use replayfeed_config::RuntimeConfig;
use std::path::PathBuf;

/// Session replay feed server and client
#[derive(Parser)]
#[command(name = "replayfeed")]
#[command(version)]
#[command(about = "Serve and browse session replay recordings as a prefetched feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Store project credentials locally
    Login(LoginArgs),
    /// Remove stored credentials
    Logout,
    /// Print the filtered recording catalog
    List(ListArgs),
    /// Write reassembled recordings of the feed to disk
    Export(ExportArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    replayfeed::init_tracing(&config);

    match cli.command {
        Some(Commands::Serve) | None => run_server(config),
        Some(Commands::Logout) => commands::logout(&config),
        Some(Commands::Login(args)) => {
            block_on_current_thread(async move { commands::login(&config, args).await })
        }
        Some(Commands::List(args)) => {
            block_on_current_thread(async move { commands::list(&config, args).await })
        }
        Some(Commands::Export(args)) => {
            // Prefetches run as separate tasks
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?
                .block_on(async move { commands::export(&config, args).await })
        }
    }
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // CLI flags have the highest priority
    if let Some(port) = cli.port {
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn block_on_current_thread<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(future)
}

fn run_server(config: RuntimeConfig) -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(config))
}

async fn async_main(config: RuntimeConfig) -> Result<()> {
    // run_with_config initializes tracing again, which is a no-op
    display_startup_info(&config);
    replayfeed::run_with_config(config).await
}

fn display_startup_info(config: &RuntimeConfig) {
    use tracing::info;

    info!("╭─────────────────────────────────────────────────");
    info!("│ replayfeed v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Listen address: http://{}", config.server.listen_addr);
    info!("│ Upstream: {}", config.upstream.base_url);
    info!("│ Log level: {}", config.server.log_level);
    info!("│ Snapshot batch size: {}", config.snapshot.batch_size);
    info!(
        "│ Feed filter: >= {}s, >= {} interactions",
        config.feed.min_duration_secs, config.feed.min_interactions
    );
    info!("╰─────────────────────────────────────────────────");
}
