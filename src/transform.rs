//! Transaction Transform Collaborator
//!
//! Turns a raw ledger record from the index into its public
//! representation. The aggregation core treats transactions as opaque
//! beyond `{txid, blockheight, confirmations}`; everything else rides in
//! `detail` and is only pruned here according to the transform options.

use async_trait::async_trait;
use serde::Serialize;

use crate::index::{HistoryItem, IndexError};

/// Detail-pruning switches from the request (`noAsm`, `noScriptSig`,
/// `noSpent`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    pub no_asm: bool,
    pub no_script_sig: bool,
    pub no_spent: bool,
}

/// Public transaction shape.
#[derive(Debug, Clone, Serialize)]
pub struct PublicTx {
    pub txid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockheight: Option<u64>,
    pub confirmations: u32,
    #[serde(flatten)]
    pub detail: serde_json::Value,
}

/// Transform pipeline interface. The rules themselves are outside this
/// core; handlers only need the confirmed/height view for cursors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxTransform: Send + Sync {
    async fn transform(
        &self,
        item: HistoryItem,
        tip_height: u64,
        options: &TransformOptions,
    ) -> Result<PublicTx, IndexError>;
}

/// Default transform: derives confirmations from the tip and prunes
/// detail fields per the options.
#[derive(Debug, Clone, Default)]
pub struct LedgerTxTransform;

#[async_trait]
impl TxTransform for LedgerTxTransform {
    async fn transform(
        &self,
        item: HistoryItem,
        tip_height: u64,
        options: &TransformOptions,
    ) -> Result<PublicTx, IndexError> {
        let confirmations = match item.blockheight {
            Some(height) if height > 0 => tip_height.saturating_sub(height) as u32 + 1,
            _ => 0,
        };

        let mut detail = item.detail;
        prune_detail(&mut detail, options);

        Ok(PublicTx {
            txid: item.txid,
            blockheight: item.blockheight.filter(|h| *h > 0),
            confirmations,
            detail,
        })
    }
}

fn prune_detail(detail: &mut serde_json::Value, options: &TransformOptions) {
    let Some(obj) = detail.as_object_mut() else {
        return;
    };

    if options.no_script_sig {
        if let Some(vins) = obj.get_mut("vin").and_then(|v| v.as_array_mut()) {
            for vin in vins {
                if let Some(vin) = vin.as_object_mut() {
                    vin.remove("scriptSig");
                }
            }
        }
    }

    if options.no_asm {
        if let Some(vins) = obj.get_mut("vin").and_then(|v| v.as_array_mut()) {
            for vin in vins {
                if let Some(script) = vin.get_mut("scriptSig").and_then(|s| s.as_object_mut()) {
                    script.remove("asm");
                }
            }
        }
        if let Some(vouts) = obj.get_mut("vout").and_then(|v| v.as_array_mut()) {
            for vout in vouts {
                if let Some(script) = vout
                    .get_mut("scriptPubKey")
                    .and_then(|s| s.as_object_mut())
                {
                    script.remove("asm");
                }
            }
        }
    }

    if options.no_spent {
        if let Some(vouts) = obj.get_mut("vout").and_then(|v| v.as_array_mut()) {
            for vout in vouts {
                if let Some(vout) = vout.as_object_mut() {
                    vout.remove("spentTxId");
                    vout.remove("spentIndex");
                    vout.remove("spentHeight");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_item(blockheight: Option<u64>) -> HistoryItem {
        HistoryItem {
            txid: "aa".repeat(32),
            blockheight,
            detail: serde_json::json!({
                "vin": [{"scriptSig": {"asm": "...", "hex": "00"}}],
                "vout": [{
                    "scriptPubKey": {"asm": "...", "hex": "51"},
                    "spentTxId": "bb",
                    "spentIndex": 0,
                }],
            }),
        }
    }

    #[tokio::test]
    async fn test_confirmations_from_tip() {
        let tx = LedgerTxTransform
            .transform(raw_item(Some(100)), 105, &TransformOptions::default())
            .await
            .unwrap();
        assert_eq!(tx.confirmations, 6);
        assert_eq!(tx.blockheight, Some(100));
    }

    #[tokio::test]
    async fn test_mempool_tx_has_zero_confirmations() {
        let tx = LedgerTxTransform
            .transform(raw_item(None), 105, &TransformOptions::default())
            .await
            .unwrap();
        assert_eq!(tx.confirmations, 0);
        assert_eq!(tx.blockheight, None);
    }

    #[tokio::test]
    async fn test_pruning_options() {
        let options = TransformOptions {
            no_asm: true,
            no_spent: true,
            no_script_sig: false,
        };
        let tx = LedgerTxTransform
            .transform(raw_item(Some(1)), 1, &options)
            .await
            .unwrap();
        let vin_script = &tx.detail["vin"][0]["scriptSig"];
        assert!(vin_script.get("asm").is_none());
        assert!(vin_script.get("hex").is_some());
        assert!(tx.detail["vout"][0].get("spentTxId").is_none());
    }

    #[tokio::test]
    async fn test_no_script_sig_drops_whole_script() {
        let options = TransformOptions {
            no_script_sig: true,
            ..Default::default()
        };
        let tx = LedgerTxTransform
            .transform(raw_item(Some(1)), 1, &options)
            .await
            .unwrap();
        assert!(tx.detail["vin"][0].get("scriptSig").is_none());
    }
}
