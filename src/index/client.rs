//! HTTP Client for the Address Index Service
//!
//! Thin reqwest wrapper over the index's REST surface. The index reports
//! sync-in-progress as 503 with a JSON `{"progress": ...}` body, which
//! maps to [`IndexError::NotReady`] so clients see the sync percentage.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{
    AddressIndex, AddressSummary, HistoryItem, HistoryPage, IndexError, StreamOptions, Utxo,
};
use crate::address::Address;

/// HTTP-backed address index.
#[derive(Debug, Clone)]
pub struct HttpAddressIndex {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SyncProgress {
    #[serde(default)]
    progress: f64,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(rename = "totalCount")]
    total_count: u64,
    items: Vec<HistoryItem>,
}

impl HttpAddressIndex {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Map non-success statuses onto the index error taxonomy.
    async fn check(resp: Response) -> Result<Response, IndexError> {
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(IndexError::NotFound),
            StatusCode::SERVICE_UNAVAILABLE => {
                let progress = resp
                    .json::<SyncProgress>()
                    .await
                    .map(|p| p.progress)
                    .unwrap_or(0.0);
                Err(IndexError::NotReady { progress })
            }
            status => Err(IndexError::Transport(format!(
                "index returned {status}"
            ))),
        }
    }

    fn summary_query(options: &StreamOptions) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if options.no_tx_list {
            query.push(("noTxList", "1".to_string()));
        }
        if let Some(after) = &options.after {
            query.push(("after", after.clone()));
        }
        query
    }

    fn history_query(options: &StreamOptions) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(after) = &options.after {
            query.push(("after", after.clone()));
        }
        if let Some(mempool_only) = options.mempool_only {
            query.push(("mempoolOnly", mempool_only.to_string()));
        }
        if let Some(query_mempool) = options.query_mempool {
            query.push(("queryMempool", query_mempool.to_string()));
        }
        if let Some(from) = options.from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = options.to {
            query.push(("to", to.to_string()));
        }
        query
    }
}

#[async_trait]
impl AddressIndex for HttpAddressIndex {
    async fn tip_height(&self) -> Result<u64, IndexError> {
        let url = format!("{}/tip/height", self.base_url);
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        resp.text()
            .await?
            .trim()
            .parse()
            .map_err(|_| IndexError::Parse("bad tip height from index".to_string()))
    }

    async fn address_summary(
        &self,
        address: &Address,
        options: &StreamOptions,
    ) -> Result<AddressSummary, IndexError> {
        let url = format!("{}/addr/{}/summary", self.base_url, address);
        let resp = self
            .client
            .get(&url)
            .query(&Self::summary_query(options))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, IndexError> {
        let url = format!("{}/addr/{}/utxo", self.base_url, address);
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn address_history(
        &self,
        addresses: &[Address],
        options: &StreamOptions,
        sink: mpsc::Sender<HistoryItem>,
    ) -> Result<HistoryPage, IndexError> {
        let joined = addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/addrs/{}/txs", self.base_url, joined);
        let resp = self
            .client
            .get(&url)
            .query(&Self::history_query(options))
            .send()
            .await?;
        let page: HistoryResponse = Self::check(resp).await?.json().await?;

        for item in page.items {
            // Cooperative cancellation: stop producing once the request
            // has been abandoned.
            if options.stop.is_tripped() {
                break;
            }
            if sink.send(item).await.is_err() {
                break;
            }
        }

        Ok(HistoryPage {
            total_count: page.total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let index = HttpAddressIndex::new("http://127.0.0.1:3101/");
        assert_eq!(index.base_url(), "http://127.0.0.1:3101");
    }

    #[test]
    fn test_summary_query_shape() {
        let options = StreamOptions {
            no_tx_list: true,
            after: Some("abc".to_string()),
            ..Default::default()
        };
        let query = HttpAddressIndex::summary_query(&options);
        assert_eq!(
            query,
            vec![
                ("noTxList", "1".to_string()),
                ("after", "abc".to_string())
            ]
        );
    }

    #[test]
    fn test_history_query_skips_unset_options() {
        let query = HttpAddressIndex::history_query(&StreamOptions::default());
        assert!(query.is_empty());

        let options = StreamOptions {
            mempool_only: Some(true),
            query_mempool: Some(true),
            from: Some(0),
            to: Some(50),
            ..Default::default()
        };
        let query = HttpAddressIndex::history_query(&options);
        assert_eq!(query.len(), 4);
        assert!(query.contains(&("mempoolOnly", "true".to_string())));
    }
}
