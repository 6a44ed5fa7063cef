//! addrstream API - Address Data over HTTP and WebSocket
//!
//! Run modes:
//!   addrstream-api serve             - Start the API server
//!   addrstream-api serve --port N    - Override the listen port
//!   addrstream-api help              - Show usage

use std::env;

use addrstream::api::AppState;
use addrstream::common::{init_logging, AppConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("serve") => run_server(&args[2..]).await,
        Some("help") | Some("--help") | Some("-h") | None => print_usage(),
        _ => print_usage(),
    }
}

fn print_usage() {
    println!("addrstream API - address data over HTTP and WebSocket");
    println!();
    println!("Usage:");
    println!("  addrstream-api serve [--port <port>]    Start the API server");
    println!();
    println!("Environment Variables:");
    println!("  ADDRSTREAM_NETWORK               mainnet | testnet | regtest");
    println!("  ADDRSTREAM_INDEX_URL             Address index base URL");
    println!("  ADDRSTREAM_PORT                  Listen port (default: 3001)");
    println!("  ADDRSTREAM_TRANSLATE_ADDRESSES   1 to enable public-format translation");
    println!("  ADDRSTREAM_LOG_LEVEL             trace | debug | info | warn | error");
    println!("  ADDRSTREAM_LOG_JSON              1 for JSON log output");
}

async fn run_server(args: &[String]) {
    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Parse arguments
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port = args[i + 1].parse().unwrap_or(config.port);
                i += 2;
            }
            _ => i += 1,
        }
    }

    if let Err(e) = init_logging(&config.log_level, config.log_json) {
        eprintln!("Logging error: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        network = ?config.network,
        index_url = %config.index_url,
        port = config.port,
        translate_addresses = config.translate_addresses,
        "starting addrstream API"
    );

    let state = AppState::from_config(&config);
    if let Err(e) = addrstream::api::start_server(state, config.port).await {
        tracing::error!(error = %e, "API server error");
        std::process::exit(1);
    }
}
