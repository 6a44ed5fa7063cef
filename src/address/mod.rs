//! Address Parsing and Batch Normalization
//!
//! Everything past this boundary is a validated, native-format address.
//! Requests may carry a single path parameter, a body list, or a
//! comma-joined string; normalization splits, compacts, deduplicates, and
//! translates, failing with a validation error that names the offending
//! input.

pub mod translate;

use std::collections::HashSet;
use std::fmt;

use bitcoin::address::NetworkUnchecked;
use serde::Deserialize;

use crate::common::error::{ApiError, Result};

pub use translate::{AddressTranslator, TranslateError};

/// Validated address in the system's native format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address(bitcoin::Address);

impl Address {
    pub fn inner(&self) -> &bitcoin::Address {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request-shaped address parameter: a comma-joined string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddrsParam {
    One(String),
    Many(Vec<String>),
}

impl AddrsParam {
    /// Split, trim, and drop blank entries. Validation happens later.
    pub fn into_entries(self) -> Vec<String> {
        let raw = match self {
            AddrsParam::One(s) => s.split(',').map(str::to_string).collect(),
            AddrsParam::Many(v) => v,
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Non-empty, deduplicated batch of native addresses.
///
/// Order is request order, but stream output order is completion order;
/// nothing downstream may rely on this ordering surviving.
#[derive(Debug, Clone)]
pub struct AddressBatch {
    addrs: Vec<Address>,
}

impl AddressBatch {
    pub fn first(&self) -> &Address {
        &self.addrs[0]
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.addrs
    }

    pub fn into_vec(self) -> Vec<Address> {
        self.addrs
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }
}

/// Parses request addresses into native form and back out to the public
/// representation.
#[derive(Debug, Clone)]
pub struct AddressCodec {
    network: bitcoin::Network,
    translator: Option<AddressTranslator>,
}

impl AddressCodec {
    pub fn new(network: bitcoin::Network, translate_addresses: bool) -> Self {
        let translator = translate_addresses.then(|| AddressTranslator::new(network));
        Self {
            network,
            translator,
        }
    }

    /// Parse one request address, accepting native format and, when
    /// translation is enabled, the public format.
    pub fn parse_input(&self, raw: &str) -> Result<Address> {
        if let Some(addr) = self.parse_native(raw) {
            return Ok(addr);
        }

        let Some(translator) = &self.translator else {
            return Err(ApiError::validation(format!("Invalid address: {raw}")));
        };

        let native = translator
            .translate_input(raw)
            .map_err(|e| ApiError::validation(format!("Invalid address: {e}")))?;
        self.parse_native(&native)
            .ok_or_else(|| ApiError::validation(format!("Invalid address: {raw}")))
    }

    /// Translate a native address string for output. Passthrough when
    /// translation is disabled.
    pub fn to_public(&self, native: &str) -> String {
        match &self.translator {
            Some(translator) => translator.translate_output(native),
            None => native.to_string(),
        }
    }

    /// Normalize a request's address parameter into a batch.
    pub fn normalize_batch(&self, param: AddrsParam) -> Result<AddressBatch> {
        let entries = param.into_entries();
        if entries.is_empty() {
            return Err(ApiError::validation("Must include address"));
        }

        let mut seen = HashSet::new();
        let mut addrs = Vec::with_capacity(entries.len());
        for entry in entries {
            let addr = self.parse_input(&entry)?;
            if seen.insert(addr.to_string()) {
                addrs.push(addr);
            }
        }

        Ok(AddressBatch { addrs })
    }

    fn parse_native(&self, raw: &str) -> Option<Address> {
        let unchecked: bitcoin::Address<NetworkUnchecked> = raw.parse().ok()?;
        let checked = unchecked.require_network(self.network).ok()?;
        Some(Address(checked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR_A: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const ADDR_B: &str = "12higDjoCCNXSA95xZMWUdPvXNmkAduhWv";

    fn codec() -> AddressCodec {
        AddressCodec::new(bitcoin::Network::Bitcoin, false)
    }

    #[test]
    fn test_comma_string_splits_and_compacts() {
        let param = AddrsParam::One(format!("{ADDR_A},, {ADDR_B} ,"));
        let batch = codec().normalize_batch(param).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.first().to_string(), ADDR_A);
    }

    #[test]
    fn test_list_dedup_preserves_first_occurrence_order() {
        let param = AddrsParam::Many(vec![
            ADDR_B.to_string(),
            ADDR_A.to_string(),
            ADDR_B.to_string(),
        ]);
        let batch = codec().normalize_batch(param).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.first().to_string(), ADDR_B);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = codec()
            .normalize_batch(AddrsParam::One(" , ,".to_string()))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("Must include address"));
    }

    #[test]
    fn test_invalid_entry_named_in_error() {
        let param = AddrsParam::Many(vec![ADDR_A.to_string(), "zzz-junk".to_string()]);
        let err = codec().normalize_batch(param).unwrap_err();
        assert!(err.to_string().contains("zzz-junk"));
    }

    #[test]
    fn test_wrong_network_rejected() {
        let testnet = AddressCodec::new(bitcoin::Network::Testnet, false);
        assert!(testnet.parse_input(ADDR_A).is_err());
    }

    #[test]
    fn test_translated_public_input_accepted() {
        let translating = AddressCodec::new(bitcoin::Network::Bitcoin, true);
        let public = translating.to_public(ADDR_A);
        assert_ne!(public, ADDR_A);
        let parsed = translating.parse_input(&public).unwrap();
        assert_eq!(parsed.to_string(), ADDR_A);
    }
}
