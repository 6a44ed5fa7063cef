//! Environment-based Configuration for the Address API
//!
//! All runtime settings come from environment variables (a local `.env`
//! file is honored in development).
//!
//! # Environment Variables
//!
//! ## Network Configuration
//! - `ADDRSTREAM_NETWORK` - "mainnet", "testnet", or "regtest" (default: "mainnet")
//! - `ADDRSTREAM_INDEX_URL` - Base URL of the address index service
//! - `ADDRSTREAM_PORT` - HTTP/WS listen port (default: 3001)
//!
//! ## Address Handling
//! - `ADDRSTREAM_TRANSLATE_ADDRESSES` - "1" to accept/emit the public
//!   address format alongside the native one (default: off)
//!
//! ## Logging
//! - `ADDRSTREAM_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `ADDRSTREAM_LOG_JSON` - "1" for JSON log output (default: plain)

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "livenet" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(ConfigError::InvalidValue(
                "ADDRSTREAM_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Default index endpoint for this network
    pub fn default_index_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "http://127.0.0.1:3101",
            Network::Testnet => "http://127.0.0.1:13101",
            Network::Regtest => "http://127.0.0.1:23101",
        }
    }

    /// Get bitcoin network enum
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: Network,
    /// Base URL of the external address index
    pub index_url: String,
    /// HTTP/WS listen port
    pub port: u16,
    /// Accept and emit the public (translated) address format
    pub translate_addresses: bool,
    /// Log level string passed to the subscriber filter
    pub log_level: String,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            index_url: Network::Mainnet.default_index_url().to_string(),
            port: 3001,
            translate_addresses: false,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let network = match env::var("ADDRSTREAM_NETWORK") {
            Ok(s) => s.parse()?,
            Err(_) => Network::Mainnet,
        };

        let index_url = env::var("ADDRSTREAM_INDEX_URL")
            .unwrap_or_else(|_| network.default_index_url().to_string());

        let port = match env::var("ADDRSTREAM_PORT") {
            Ok(s) => s.parse().map_err(|_| {
                ConfigError::InvalidValue("ADDRSTREAM_PORT".to_string(), s.clone())
            })?,
            Err(_) => 3001,
        };

        let translate_addresses = env::var("ADDRSTREAM_TRANSLATE_ADDRESSES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let log_level = env::var("ADDRSTREAM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("ADDRSTREAM_LOG_JSON")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            network,
            index_url,
            port,
            translate_addresses,
            log_level,
            log_json,
        })
    }
}
