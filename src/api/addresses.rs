//! Address Endpoints
//!
//! Single-address lookups are plain mapping code over the index
//! collaborator. The multi-address endpoints are the interesting part:
//! `/addresses/utxo` fans the batch out with bounded concurrency and
//! streams one JSON array back without buffering the batch, and
//! `/addresses/txs` aggregates a history scan across the whole batch.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::address::{Address, AddressBatch, AddressCodec, AddrsParam};
use crate::api::server::SharedAppState;
use crate::common::error::Result;
use crate::common::{generate_correlation_id, ApiError};
use crate::index::{StreamOptions, SummaryField, Utxo};
use crate::stream::{fan_out, stream_json_array, StopFlag};
use crate::transform::TransformOptions;
use crate::units;

// =============================================================================
// Query shapes
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    #[serde(rename = "noTxList")]
    pub no_tx_list: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MultiTxsQuery {
    pub after: Option<String>,
    /// "true" | "false" | "only"; anything else leaves the index default.
    pub mempool: Option<String>,
    /// Legacy range paging, forwarded as-is.
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "noAsm")]
    pub no_asm: Option<String>,
    #[serde(rename = "noScriptSig")]
    pub no_script_sig: Option<String>,
    #[serde(rename = "noSpent")]
    pub no_spent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultiUtxoBody {
    pub addrs: AddrsParam,
}

#[derive(Debug, Deserialize)]
pub struct MultiTxsBody {
    pub addrs: AddrsParam,
    #[serde(flatten)]
    pub query: MultiTxsQuery,
}

/// Express-style truthiness: present and parses to a nonzero integer.
fn int_truthy(value: Option<&str>) -> bool {
    value
        .and_then(|s| s.parse::<i64>().ok())
        .map(|n| n != 0)
        .unwrap_or(false)
}

fn txs_options(q: &MultiTxsQuery) -> StreamOptions {
    let mut options = StreamOptions {
        after: q.after.clone(),
        ..Default::default()
    };
    match q.mempool.as_deref() {
        Some("true") => {
            options.mempool_only = Some(false);
            options.query_mempool = Some(true);
        }
        Some("false") => {
            options.mempool_only = Some(false);
            options.query_mempool = Some(false);
        }
        Some("only") => {
            options.mempool_only = Some(true);
            options.query_mempool = Some(true);
        }
        _ => {}
    }
    options.from = q.from.as_deref().and_then(|s| s.parse().ok());
    options.to = q.to.as_deref().and_then(|s| s.parse().ok());
    options
}

fn transform_options(q: &MultiTxsQuery) -> TransformOptions {
    TransformOptions {
        no_asm: int_truthy(q.no_asm.as_deref()),
        no_script_sig: int_truthy(q.no_script_sig.as_deref()),
        no_spent: int_truthy(q.no_spent.as_deref()),
    }
}

// =============================================================================
// UTXO transform
// =============================================================================

/// Public UTXO shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransformedUtxo {
    pub address: String,
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
    /// BTC-style decimal amount, `satoshis / 1e8`
    pub amount: f64,
    pub satoshis: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    pub confirmations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
}

pub(crate) fn transform_utxo(codec: &AddressCodec, tip_height: u64, utxo: Utxo) -> TransformedUtxo {
    let (height, confirmations) = match utxo.height {
        Some(h) if h > 0 => (Some(h), tip_height.saturating_sub(h) + 1),
        _ => (None, 0),
    };
    TransformedUtxo {
        address: codec.to_public(&utxo.address),
        txid: utxo.txid,
        vout: utxo.vout,
        script_pub_key: utxo.script_pub_key,
        amount: units::sats_to_btc(utxo.satoshis),
        satoshis: utxo.satoshis,
        height,
        confirmations,
        ts: utxo.timestamp,
    }
}

// =============================================================================
// Single-address handlers
// =============================================================================

/// GET /address/:addr
pub async fn show(
    State(state): State<SharedAppState>,
    Path(addr): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Response> {
    let addr = state.codec.parse_input(&addr)?;
    let options = StreamOptions {
        no_tx_list: int_truthy(q.no_tx_list.as_deref()),
        after: q.after,
        ..Default::default()
    };
    // Dropped with the handler future if the client goes away.
    let _guard = options.stop.guard();

    let mut summary = state.index.address_summary(&addr, &options).await?;
    summary.addr_str = state.codec.to_public(&summary.addr_str);
    Ok(Json(summary).into_response())
}

async fn summary_sub_query(
    state: SharedAppState,
    addr: String,
    after: Option<String>,
    field: SummaryField,
) -> Result<Response> {
    let addr = state.codec.parse_input(&addr)?;
    let options = StreamOptions {
        no_tx_list: true,
        after,
        ..Default::default()
    };
    let _guard = options.stop.guard();

    let summary = state.index.address_summary(&addr, &options).await?;
    if summary.incomplete {
        Ok(Json(json!({
            "lastItem": summary.last_item,
            "data": summary.field(field),
        }))
        .into_response())
    } else {
        Ok(Json(summary.field(field)).into_response())
    }
}

/// GET /address/:addr/balance
pub async fn balance(
    State(state): State<SharedAppState>,
    Path(addr): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Response> {
    summary_sub_query(state, addr, q.after, SummaryField::Balance).await
}

/// GET /address/:addr/totalReceived
pub async fn total_received(
    State(state): State<SharedAppState>,
    Path(addr): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Response> {
    summary_sub_query(state, addr, q.after, SummaryField::TotalReceived).await
}

/// GET /address/:addr/totalSent
pub async fn total_sent(
    State(state): State<SharedAppState>,
    Path(addr): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Response> {
    summary_sub_query(state, addr, q.after, SummaryField::TotalSent).await
}

/// GET /address/:addr/unconfirmedBalance
pub async fn unconfirmed_balance(
    State(state): State<SharedAppState>,
    Path(addr): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Response> {
    summary_sub_query(state, addr, q.after, SummaryField::UnconfirmedBalance).await
}

/// GET /address/:addr/utxo
pub async fn utxo(
    State(state): State<SharedAppState>,
    Path(addr): Path<String>,
) -> Result<Json<Vec<TransformedUtxo>>> {
    let addr = state.codec.parse_input(&addr)?;
    let tip = state.index.tip_height().await?;
    let utxos = state.index.address_utxos(&addr).await?;
    let results = utxos
        .into_iter()
        .map(|u| transform_utxo(&state.codec, tip, u))
        .collect();
    Ok(Json(results))
}

// =============================================================================
// Multi-address UTXO streaming
// =============================================================================

/// POST /addresses/utxo
pub async fn multiutxo_post(
    State(state): State<SharedAppState>,
    Json(body): Json<MultiUtxoBody>,
) -> Result<Response> {
    let batch = state.codec.normalize_batch(body.addrs)?;
    multiutxo_stream(state, batch).await
}

/// GET /addresses/:addrs/utxo
pub async fn multiutxo_get(
    State(state): State<SharedAppState>,
    Path(addrs): Path<String>,
) -> Result<Response> {
    let batch = state.codec.normalize_batch(AddrsParam::One(addrs))?;
    multiutxo_stream(state, batch).await
}

/// Streams the combined UTXO set of a batch as one JSON array. Results
/// for any one address can be large and addresses complete out of order,
/// so nothing is buffered beyond the channel capacity.
async fn multiutxo_stream(state: SharedAppState, batch: AddressBatch) -> Result<Response> {
    let correlation_id = generate_correlation_id();
    tracing::info!(
        correlation_id,
        addresses = batch.len(),
        "streaming multi-address utxo batch"
    );

    let stop = StopFlag::new();
    // Resolved up front: a failure here can still become a status code.
    let tip = state.index.tip_height().await?;

    let index = state.index.clone();
    let codec = state.codec.clone();
    let results = fan_out(batch.into_vec(), stop.clone(), move |addr: Address| {
        let index = index.clone();
        let codec = codec.clone();
        async move {
            let utxos = index.address_utxos(&addr).await?;
            Ok(utxos
                .into_iter()
                .map(|u| transform_utxo(&codec, tip, u))
                .collect::<Vec<_>>())
        }
    });

    let (body_tx, body_rx) = mpsc::channel(16);
    let streamer_stop = stop.clone();
    tokio::spawn(async move {
        match stream_json_array(results, body_tx, streamer_stop).await {
            Ok(written) => {
                tracing::debug!(correlation_id, written, "utxo stream complete")
            }
            Err(error) => {
                // Headers are already flushed; the array was closed
                // structurally and the connection ends here.
                tracing::error!(correlation_id, %error, "utxo stream aborted mid-flight")
            }
        }
    });

    // The client disconnecting drops this body stream, which trips the
    // stop flag through the guard and halts the executor.
    let guard = stop.guard();
    let body = Body::from_stream(ReceiverStream::new(body_rx).map(move |chunk| {
        let _bound = &guard;
        chunk
    }));

    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

// =============================================================================
// Multi-address history
// =============================================================================

/// GET /addresses/:addrs/txs
pub async fn multitxs_get(
    State(state): State<SharedAppState>,
    Path(addrs): Path<String>,
    Query(q): Query<MultiTxsQuery>,
) -> Result<Json<serde_json::Value>> {
    let batch = state.codec.normalize_batch(AddrsParam::One(addrs))?;
    multitxs_impl(state, batch, q).await
}

/// POST /addresses/txs
pub async fn multitxs_post(
    State(state): State<SharedAppState>,
    Json(body): Json<MultiTxsBody>,
) -> Result<Json<serde_json::Value>> {
    let batch = state.codec.normalize_batch(body.addrs)?;
    multitxs_impl(state, batch, body.query).await
}

async fn multitxs_impl(
    state: SharedAppState,
    batch: AddressBatch,
    q: MultiTxsQuery,
) -> Result<Json<serde_json::Value>> {
    let options = txs_options(&q);
    let transform_opts = transform_options(&q);
    let _guard = options.stop.guard();

    let tip = state.index.tip_height().await?;

    let (sink_tx, mut sink_rx) = mpsc::channel(64);
    let index = state.index.clone();
    let addrs = batch.into_vec();
    let scan_options = options.clone();
    let scan = tokio::spawn(async move {
        index
            .address_history(&addrs, &scan_options, sink_tx)
            .await
    });

    let mut items = Vec::new();
    while let Some(item) = sink_rx.recv().await {
        let tx = state.transform.transform(item, tip, &transform_opts).await?;
        items.push(tx);
    }

    let page = scan
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

    // Items arrive most-recent-first from the index, so the first
    // confirmed one is the resumption point.
    let last_item = items
        .iter()
        .find(|tx| tx.confirmations != 0)
        .map(|tx| tx.txid.clone());

    Ok(Json(json!({
        "totalItems": page.total_count,
        "lastItem": last_item,
        "items": items,
    })))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::{create_router, AppState};
    use crate::index::{AddressSummary, HistoryItem, HistoryPage, IndexError, MockAddressIndex};
    use crate::transform::LedgerTxTransform;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tower::ServiceExt;

    const ADDR_A: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const ADDR_B: &str = "12higDjoCCNXSA95xZMWUdPvXNmkAduhWv";

    fn raw_utxo(address: &str, txid: &str, satoshis: u64, height: Option<u64>) -> Utxo {
        Utxo {
            address: address.to_string(),
            txid: txid.to_string(),
            vout: 0,
            script_pub_key: "76a914".to_string(),
            satoshis,
            height,
            timestamp: None,
        }
    }

    fn app(index: MockAddressIndex) -> axum::Router {
        create_router(AppState::new(
            Arc::new(index),
            Arc::new(LedgerTxTransform),
            AddressCodec::new(bitcoin::Network::Bitcoin, false),
        ))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_int_truthy() {
        assert!(int_truthy(Some("1")));
        assert!(int_truthy(Some("2")));
        assert!(!int_truthy(Some("0")));
        assert!(!int_truthy(Some("yes")));
        assert!(!int_truthy(None));
    }

    #[test]
    fn test_mempool_option_mapping() {
        let only = txs_options(&MultiTxsQuery {
            mempool: Some("only".to_string()),
            ..Default::default()
        });
        assert_eq!(only.mempool_only, Some(true));
        assert_eq!(only.query_mempool, Some(true));

        let unset = txs_options(&MultiTxsQuery::default());
        assert_eq!(unset.mempool_only, None);
        assert_eq!(unset.query_mempool, None);
    }

    #[test]
    fn test_transform_utxo_confirmations() {
        let codec = AddressCodec::new(bitcoin::Network::Bitcoin, false);
        let confirmed = transform_utxo(&codec, 105, raw_utxo(ADDR_A, "t1", 150_000_000, Some(100)));
        assert_eq!(confirmed.confirmations, 6);
        assert_eq!(confirmed.amount, 1.5);
        assert_eq!(confirmed.height, Some(100));

        let mempool = transform_utxo(&codec, 105, raw_utxo(ADDR_A, "t2", 1, None));
        assert_eq!(mempool.confirmations, 0);
        assert_eq!(mempool.height, None);
    }

    #[tokio::test]
    async fn test_multiutxo_streams_union_of_batch() {
        let mut index = MockAddressIndex::new();
        index.expect_tip_height().returning(|| Ok(105));
        index.expect_address_utxos().returning(|addr| {
            let addr = addr.to_string();
            if addr == ADDR_A {
                Ok(vec![
                    raw_utxo(&addr, "u1", 1000, Some(100)),
                    raw_utxo(&addr, "u2", 2000, Some(101)),
                ])
            } else {
                Ok(vec![])
            }
        });

        let response = app(index)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/addresses/utxo")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "addrs": format!("{ADDR_A},{ADDR_B}") }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        let items = parsed.as_array().expect("well-formed JSON array");
        let txids: BTreeSet<&str> = items
            .iter()
            .map(|u| u["txid"].as_str().unwrap())
            .collect();
        assert_eq!(txids, BTreeSet::from(["u1", "u2"]));
        assert_eq!(items[0]["confirmations"], 6);
    }

    #[tokio::test]
    async fn test_multiutxo_empty_batch_is_validation_error() {
        let response = app(MockAddressIndex::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/addresses/utxo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"addrs": ","}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let parsed = body_json(response).await;
        assert_eq!(parsed["code"], 1);
    }

    #[tokio::test]
    async fn test_multiutxo_mid_stream_failure_still_closes_array() {
        let mut index = MockAddressIndex::new();
        index.expect_tip_height().returning(|| Ok(105));
        index.expect_address_utxos().returning(|addr| {
            if addr.to_string() == ADDR_A {
                Ok(vec![raw_utxo(ADDR_A, "u1", 1000, Some(100))])
            } else {
                Err(IndexError::Transport("index went away".to_string()))
            }
        });

        let response = app(index)
            .oneshot(
                Request::builder()
                    .uri(format!("/addresses/{ADDR_A},{ADDR_B}/utxo"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Status was committed before the failure; the body must still be
        // a syntactically valid array.
        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        assert!(parsed.is_array());
    }

    #[tokio::test]
    async fn test_not_ready_maps_to_503_with_progress() {
        let mut index = MockAddressIndex::new();
        index
            .expect_tip_height()
            .returning(|| Err(IndexError::NotReady { progress: 42.5 }));

        let response = app(index)
            .oneshot(
                Request::builder()
                    .uri(format!("/addresses/{ADDR_A}/utxo"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let parsed = body_json(response).await;
        assert!(parsed["error"]
            .as_str()
            .unwrap()
            .contains("Sync Percentage:42.5"));
    }

    #[tokio::test]
    async fn test_show_translates_output_address() {
        let mut index = MockAddressIndex::new();
        index.expect_address_summary().returning(|addr, options| {
            assert!(!options.no_tx_list);
            Ok(AddressSummary {
                addr_str: addr.to_string(),
                balance: 1.0,
                balance_sat: 100_000_000,
                total_received: 1.0,
                total_received_sat: 100_000_000,
                total_sent: 0.0,
                total_sent_sat: 0,
                unconfirmed_balance: 0.0,
                unconfirmed_balance_sat: 0,
                unconfirmed_tx_apperances: 0,
                tx_apperances: 1,
                transactions: Some(vec!["t1".to_string()]),
                incomplete: false,
                last_item: None,
            })
        });

        let response = app(index)
            .oneshot(
                Request::builder()
                    .uri(format!("/address/{ADDR_A}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        assert_eq!(parsed["addrStr"], ADDR_A);
        assert_eq!(parsed["txApperances"], 1);
    }

    #[tokio::test]
    async fn test_balance_sub_query_incomplete_shape() {
        let mut index = MockAddressIndex::new();
        index.expect_address_summary().returning(|addr, options| {
            assert!(options.no_tx_list);
            Ok(AddressSummary {
                addr_str: addr.to_string(),
                balance: 2.5,
                balance_sat: 250_000_000,
                total_received: 2.5,
                total_received_sat: 250_000_000,
                total_sent: 0.0,
                total_sent_sat: 0,
                unconfirmed_balance: 0.0,
                unconfirmed_balance_sat: 0,
                unconfirmed_tx_apperances: 0,
                tx_apperances: 9,
                transactions: None,
                incomplete: true,
                last_item: Some("t9".to_string()),
            })
        });

        let response = app(index)
            .oneshot(
                Request::builder()
                    .uri(format!("/address/{ADDR_A}/balance"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let parsed = body_json(response).await;
        assert_eq!(parsed["data"], 2.5);
        assert_eq!(parsed["lastItem"], "t9");
    }

    #[tokio::test]
    async fn test_invalid_address_is_400() {
        let response = app(MockAddressIndex::new())
            .oneshot(
                Request::builder()
                    .uri("/address/zzz-junk/balance")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let parsed = body_json(response).await;
        assert!(parsed["error"].as_str().unwrap().contains("zzz-junk"));
    }

    #[tokio::test]
    async fn test_multitxs_aggregates_and_reports_last_item() {
        let mut index = MockAddressIndex::new();
        index.expect_tip_height().returning(|| Ok(200));
        index
            .expect_address_history()
            .returning(|addrs, options, sink| {
                assert_eq!(addrs.len(), 2);
                assert_eq!(options.after.as_deref(), Some("prev-tx"));
                let items = vec![
                    HistoryItem {
                        txid: "mempool-tx".to_string(),
                        blockheight: None,
                        detail: serde_json::json!({}),
                    },
                    HistoryItem {
                        txid: "recent-tx".to_string(),
                        blockheight: Some(199),
                        detail: serde_json::json!({}),
                    },
                    HistoryItem {
                        txid: "old-tx".to_string(),
                        blockheight: Some(150),
                        detail: serde_json::json!({}),
                    },
                ];
                // Capacity is far above three items, try_send cannot fail.
                for item in items {
                    sink.try_send(item).unwrap();
                }
                Ok(HistoryPage { total_count: 3 })
            });

        let response = app(index)
            .oneshot(
                Request::builder()
                    .uri(format!("/addresses/{ADDR_A},{ADDR_B}/txs?after=prev-tx"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        assert_eq!(parsed["totalItems"], 3);
        // First confirmed item in recent-first order.
        assert_eq!(parsed["lastItem"], "recent-tx");
        assert_eq!(parsed["items"].as_array().unwrap().len(), 3);
        assert_eq!(parsed["items"][1]["confirmations"], 2);
    }
}
