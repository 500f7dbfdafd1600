//! Synheart Sleep Metrics CLI
//!
//! Computes sleep metrics for completed sleep sessions.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synheart_sleep_metrics::{
    batch::run_batch,
    config::Config,
    core::parse_date,
    pipeline::process_session,
    store::MemoryStore,
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-sleep")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Sleep metrics engine for completed sleep sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute one session from a file of raw sample rows
    Compute {
        /// JSON array or NDJSON file of raw sample rows
        #[arg(long, short)]
        input: PathBuf,

        /// Session (sleep record) id to compute
        #[arg(long)]
        session_id: i64,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Recompute every session with accelerometer data in a file
    Batch {
        /// JSON array or NDJSON file of raw sample rows
        #[arg(long, short)]
        input: PathBuf,

        /// Write all persisted result rows to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Serve the compute endpoint against the configured REST store
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config,

    /// Parse a date with the supported date formats
    ParseDate {
        /// `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
        value: String,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compute {
            input,
            session_id,
            pretty,
        } => {
            cmd_compute(&input, session_id, pretty).await;
        }
        Commands::Batch { input, output } => {
            cmd_batch(&input, output.as_deref()).await;
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            cmd_serve(port).await;
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::ParseDate { value } => {
            cmd_parse_date(&value);
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Could not load configuration: {e}");
            eprintln!("Config file: {:?}", Config::config_path());
            std::process::exit(1);
        }
    }
}

fn load_store(input: &Path) -> MemoryStore {
    match MemoryStore::from_file(input) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: Could not read {}: {e}", input.display());
            std::process::exit(1);
        }
    }
}

async fn cmd_compute(input: &Path, session_id: i64, pretty: bool) {
    let config = load_config();
    let store = load_store(input);

    let report = match process_session(&store, &store, session_id, &config.pipeline).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let json = if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: Could not serialize report: {e}");
            std::process::exit(1);
        }
    }
}

async fn cmd_batch(input: &Path, output: Option<&Path>) {
    let config = load_config();
    let store = load_store(input);

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc_handler(stop.clone());

    let summary = match run_batch(&store, &store, &config.pipeline, &stop).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Batch Summary");
    println!("=============");
    println!("  Sessions:  {}", summary.total);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Invalid:   {}", summary.invalid);
    println!("  Failed:    {}", summary.failed.len());
    for (session_id, message) in &summary.failed {
        println!("    {session_id}: {message}");
    }
    if summary.interrupted {
        println!("  Interrupted after {} sessions", summary.attempted());
    }

    if let Some(path) = output {
        let results = store.all_results().await;
        let written = serde_json::to_string_pretty(&results)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("Results written to {}", path.display()),
            Err(e) => {
                eprintln!("Error: Could not write {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }
}

#[cfg(feature = "server")]
async fn cmd_serve(port: Option<u16>) {
    use synheart_sleep_metrics::server::{run, ServerConfig};
    use synheart_sleep_metrics::store::RestStore;

    let config = load_config();
    let Some(rest) = config.rest.clone() else {
        eprintln!("Error: No `rest` section in {:?}", Config::config_path());
        std::process::exit(1);
    };

    let store = match RestStore::new(rest) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let server_config = ServerConfig::new(port.unwrap_or(config.server_port), config.pipeline);
    let (addr, shutdown_tx) = match run(server_config, store).await {
        Ok(running) => running,
        Err(e) => {
            eprintln!("Error starting server: {e}");
            std::process::exit(1);
        }
    };

    println!("Synheart Sleep Metrics v{VERSION}");
    println!("Listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Warning: Could not listen for Ctrl+C: {e}");
    }
    let _ = shutdown_tx.send(());
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_parse_date(value: &str) {
    match parse_date(value) {
        Ok(ts) => println!("{}", ts.format("%Y-%m-%dT%H:%M:%S")),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(stop: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
