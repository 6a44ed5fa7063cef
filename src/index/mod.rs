//! Address Index Collaborator
//!
//! Interface to the external indexing service that answers single-address
//! queries (summary, unspent outputs, history). This service does not own
//! the index's storage or consistency model; it only combines, orders, and
//! streams what the index returns.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::address::Address;
use crate::stream::cancel::StopFlag;

pub use client::HttpAddressIndex;

/// Index errors
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Transport(String),

    #[error("index not ready, sync at {progress}%")]
    NotReady { progress: f64 },

    #[error("not found")]
    NotFound,

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        IndexError::Transport(err.to_string())
    }
}

/// Per-request query options forwarded to the index.
///
/// `stop` is the request's cancellation flag; the index client honors it
/// between units of result production. `from`/`to` are legacy range
/// paging, superseded by `after`.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    pub after: Option<String>,
    pub mempool_only: Option<bool>,
    pub query_mempool: Option<bool>,
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub no_tx_list: bool,
    pub stop: StopFlag,
}

/// Unspent output as reported by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    pub satoshis: u64,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Address summary as reported by the index. Field names are the public
/// wire names (including the historical `txApperances` spelling) and pass
/// through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSummary {
    #[serde(rename = "addrStr")]
    pub addr_str: String,
    pub balance: f64,
    #[serde(rename = "balanceSat")]
    pub balance_sat: i64,
    #[serde(rename = "totalReceived")]
    pub total_received: f64,
    #[serde(rename = "totalReceivedSat")]
    pub total_received_sat: i64,
    #[serde(rename = "totalSent")]
    pub total_sent: f64,
    #[serde(rename = "totalSentSat")]
    pub total_sent_sat: i64,
    #[serde(rename = "unconfirmedBalance")]
    pub unconfirmed_balance: f64,
    #[serde(rename = "unconfirmedBalanceSat")]
    pub unconfirmed_balance_sat: i64,
    #[serde(rename = "unconfirmedTxApperances")]
    pub unconfirmed_tx_apperances: u64,
    #[serde(rename = "txApperances")]
    pub tx_apperances: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<String>>,
    /// Set when the index stopped early; `last_item` resumes the scan.
    #[serde(default)]
    pub incomplete: bool,
    #[serde(rename = "lastItem", default, skip_serializing_if = "Option::is_none")]
    pub last_item: Option<String>,
}

/// Numeric sub-fields of a summary addressable by the balance endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Balance,
    TotalReceived,
    TotalSent,
    UnconfirmedBalance,
}

impl AddressSummary {
    pub fn field(&self, field: SummaryField) -> f64 {
        match field {
            SummaryField::Balance => self.balance,
            SummaryField::TotalReceived => self.total_received,
            SummaryField::TotalSent => self.total_sent,
            SummaryField::UnconfirmedBalance => self.unconfirmed_balance,
        }
    }
}

/// Raw ledger record from the index history scan. `detail` carries the
/// rest of the transaction untouched; the transform collaborator shapes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub txid: String,
    #[serde(default)]
    pub blockheight: Option<u64>,
    #[serde(flatten)]
    pub detail: serde_json::Value,
}

/// Trailer for a history scan.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

/// External address index.
///
/// `address_history` pushes items into `sink` as the index produces them
/// and returns the trailer once the scan finishes; the caller consumes the
/// sink sequentially while the scan runs. Implementations check
/// `options.stop` periodically during result production.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressIndex: Send + Sync {
    /// Current chain tip height, used to derive confirmation counts.
    async fn tip_height(&self) -> Result<u64, IndexError>;

    /// Summary for a single address.
    async fn address_summary(
        &self,
        address: &Address,
        options: &StreamOptions,
    ) -> Result<AddressSummary, IndexError>;

    /// Unspent outputs for a single address, in index order.
    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, IndexError>;

    /// History scan over a batch of addresses.
    async fn address_history(
        &self,
        addresses: &[Address],
        options: &StreamOptions,
        sink: mpsc::Sender<HistoryItem>,
    ) -> Result<HistoryPage, IndexError>;
}
