use clap::{Arg, ArgMatches, Command};
use std::env;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod server;
mod utils;

use config::{ConfigOverrides, GatewayConfig};
use server::AppState;
use utils::fetcher::HttpFetcher;
use utils::pdf::PdfTextExtractor;

fn cli() -> Command {
    Command::new("pdf-gateway")
        .version(env!("CARGO_PKG_VERSION"))
        .about("HTTP gateway that converts PDF URLs to text")
        .long_about(
            "Accepts POST requests with a JSON body {\"pdfUrl\": \"...\"}, downloads the PDF \
            (Google Drive share links are rewritten to direct downloads), extracts its text \
            and returns it as JSON. Requests must carry the shared secret in x-api-key.",
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .value_name("KEY")
                .help("Shared secret expected in the x-api-key header (env: API_KEY)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .help("Port to listen on (env: PORT, default: 3000)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_name("ADDR")
                .help("Address to bind (env: BIND_ADDR, default: 0.0.0.0)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("mount-path")
                .long("mount-path")
                .value_name("PATH")
                .help("Path of the convert endpoint, e.g. /api/convert (env: MOUNT_PATH, default: /convert)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("no-error-details")
                .long("no-error-details")
                .help("Omit raw error descriptions from fetch/extraction error responses")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors")
                .action(clap::ArgAction::SetTrue),
        )
}

fn overrides_from(matches: &ArgMatches) -> ConfigOverrides {
    ConfigOverrides {
        api_key: matches.get_one::<String>("api-key").cloned(),
        port: matches.get_one::<String>("port").cloned(),
        bind_addr: matches.get_one::<String>("bind").cloned(),
        mount_path: matches.get_one::<String>("mount-path").cloned(),
        hide_error_details: matches.get_flag("no-error-details"),
    }
}

fn init_tracing(quiet: bool) {
    // RUST_LOG wins; otherwise info, or error in quiet mode
    let default_level = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    // A missing .env file is normal in production
    let dotenv_loaded = dotenv::dotenv().is_ok();

    init_tracing(matches.get_flag("quiet"));

    if dotenv_loaded {
        info!("Loaded environment from .env");
    }

    let config = match GatewayConfig::resolve(overrides_from(&matches), |key| env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // Log configuration status (without exposing secrets)
    if config.api_key.is_none() {
        warn!("API_KEY not set - every request will be answered with a server configuration error");
    }
    if !config.error_details {
        info!("Error details disabled in error responses");
    }

    let fetcher = match HttpFetcher::new(&config.fetch) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            process::exit(1);
        }
    };

    let state = AppState::new(config, Arc::new(fetcher), Arc::new(PdfTextExtractor));

    if let Err(e) = server::serve(state).await {
        error!("Failed to start server: {:#}", e);
        process::exit(1);
    }
}
