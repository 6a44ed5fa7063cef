//! WebSocket Endpoint
//!
//! Message-based rather than path-based: the client connects to `/ws`,
//! sends one query-shaped JSON request, and receives zero or more
//! `{"data": ...}` frames followed by exactly one `{"result": ...}` frame
//! before the server closes. Failures surface as one
//! `{"error": {message, code}}` frame; the transport status is always
//! 200-equivalent once the socket is up.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::address::AddrsParam;
use crate::api::server::SharedAppState;
use crate::common::ApiError;
use crate::index::StreamOptions;
use crate::stream::{CursorTracker, StopFlag};
use crate::transform::TransformOptions;

/// One request per connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "op")]
pub enum WsRequest {
    #[serde(rename = "addressSummary")]
    AddressSummary {
        addr: String,
        #[serde(default)]
        after: Option<String>,
    },
    #[serde(rename = "addressTxs")]
    AddressTxs {
        addrs: AddrsParam,
        #[serde(default)]
        after: Option<String>,
        #[serde(rename = "noAsm", default)]
        no_asm: bool,
        #[serde(rename = "noScriptSig", default)]
        no_script_sig: bool,
        #[serde(rename = "noSpent", default)]
        no_spent: bool,
    },
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedAppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedAppState) {
    let (mut sender, mut receiver) = socket.split();
    let stop = StopFlag::new();

    // First text frame carries the request.
    let request = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => continue,
        }
    };

    // Everything after the request only matters for close detection.
    let watcher_stop = stop.clone();
    let watcher = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
        watcher_stop.trip();
    });

    let (frame_tx, mut frame_rx) = mpsc::channel(16);
    let runner_stop = stop.clone();
    let runner = tokio::spawn(async move {
        dispatch(state, &request, runner_stop, frame_tx).await;
    });

    while let Some(frame) = frame_rx.recv().await {
        if sender.send(Message::Text(frame.to_string())).await.is_err() {
            stop.trip();
            break;
        }
    }

    let _ = runner.await;
    let _ = sender.send(Message::Close(None)).await;
    watcher.abort();
}

/// Parse and run one request, pushing frames into `frames`. The frame
/// channel closing is the connection-close signal for the socket task.
pub(crate) async fn dispatch(
    state: SharedAppState,
    request: &str,
    stop: StopFlag,
    frames: mpsc::Sender<serde_json::Value>,
) {
    let request: WsRequest = match serde_json::from_str(request) {
        Ok(request) => request,
        Err(e) => {
            let err = ApiError::validation(format!("Invalid request: {e}"));
            let _ = frames.send(err.ws_frame()).await;
            return;
        }
    };

    match request {
        WsRequest::AddressSummary { addr, after } => {
            run_address_summary(state, addr, after, stop, frames).await
        }
        WsRequest::AddressTxs {
            addrs,
            after,
            no_asm,
            no_script_sig,
            no_spent,
        } => {
            let transform_opts = TransformOptions {
                no_asm,
                no_script_sig,
                no_spent,
            };
            run_address_txs(state, addrs, after, transform_opts, stop, frames).await
        }
    }
}

async fn run_address_summary(
    state: SharedAppState,
    addr: String,
    after: Option<String>,
    stop: StopFlag,
    frames: mpsc::Sender<serde_json::Value>,
) {
    let result = async {
        let addr = state.codec.parse_input(&addr)?;
        let options = StreamOptions {
            no_tx_list: true,
            after,
            stop,
            ..Default::default()
        };
        let mut summary = state.index.address_summary(&addr, &options).await?;
        summary.addr_str = state.codec.to_public(&summary.addr_str);
        Ok::<_, ApiError>(summary)
    }
    .await;

    match result {
        Ok(summary) => {
            let trailer = json!({
                "incomplete": summary.incomplete,
                "lastItem": summary.last_item,
            });
            if frames.send(json!({ "data": summary })).await.is_ok() {
                let _ = frames.send(json!({ "result": trailer })).await;
            }
        }
        Err(err) => {
            let _ = frames.send(err.ws_frame()).await;
        }
    }
}

async fn run_address_txs(
    state: SharedAppState,
    addrs: AddrsParam,
    after: Option<String>,
    transform_opts: TransformOptions,
    stop: StopFlag,
    frames: mpsc::Sender<serde_json::Value>,
) {
    let batch = match state.codec.normalize_batch(addrs) {
        Ok(batch) => batch,
        Err(err) => {
            let _ = frames.send(err.ws_frame()).await;
            return;
        }
    };

    let options = StreamOptions {
        after,
        no_tx_list: true,
        stop: stop.clone(),
        ..Default::default()
    };

    let tip = match state.index.tip_height().await {
        Ok(tip) => tip,
        Err(err) => {
            let _ = frames.send(ApiError::from(err).ws_frame()).await;
            return;
        }
    };

    let (sink_tx, mut sink_rx) = mpsc::channel(64);
    let index = state.index.clone();
    let scan_addrs = batch.into_vec();
    let scan_options = options.clone();
    let scan = tokio::spawn(async move {
        index
            .address_history(&scan_addrs, &scan_options, sink_tx)
            .await
    });

    // Items arrive in whatever order the index produces them; the tracker
    // compares rather than overwrites.
    let mut tracker = CursorTracker::new();

    while let Some(item) = sink_rx.recv().await {
        if stop.is_tripped() {
            break;
        }
        let tx = match state.transform.transform(item, tip, &transform_opts).await {
            Ok(tx) => tx,
            Err(err) => {
                // Per-item transform failure: report it, keep the stream
                // going for the remaining items.
                let _ = frames.send(ApiError::from(err).ws_frame()).await;
                continue;
            }
        };

        tracker.observe(tx.confirmations, tx.blockheight.unwrap_or(0), &tx.txid);

        if frames.send(json!({ "data": tx })).await.is_err() {
            stop.trip();
            break;
        }
    }

    match scan.await {
        Ok(Ok(page)) => {
            let _ = frames
                .send(json!({
                    "result": {
                        "totalItems": page.total_count,
                        "lastItem": tracker.into_last_item().unwrap_or_default(),
                    }
                }))
                .await;
        }
        Ok(Err(err)) => {
            let _ = frames.send(ApiError::from(err).ws_frame()).await;
        }
        Err(join_err) => {
            let _ = frames
                .send(ApiError::internal(join_err.to_string()).ws_frame())
                .await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
