//! Native <-> Public Address Translation
//!
//! The index speaks the native base58 version bytes; some API deployments
//! expose a different public-facing scheme. Translation rewrites the
//! version byte of a base58check payload in either direction. Bech32
//! addresses have no public-scheme equivalent and pass through unchanged.

use bitcoin::base58;
use thiserror::Error;

/// Public-facing base58 version bytes.
pub const PUBLIC_P2PKH_VERSION: u8 = 35;
pub const PUBLIC_P2SH_VERSION: u8 = 94;

/// Translation errors name the offending input so callers can report
/// which address in a batch was malformed.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid address: {0}")]
    InvalidPayload(String),

    #[error("unknown address version {version} in: {input}")]
    UnknownVersion { version: u8, input: String },
}

/// Version-byte translator between the native and public schemes.
#[derive(Debug, Clone)]
pub struct AddressTranslator {
    native_p2pkh: u8,
    native_p2sh: u8,
}

impl AddressTranslator {
    pub fn new(network: bitcoin::Network) -> Self {
        // Version bytes per bitcoin network serialization rules.
        let (native_p2pkh, native_p2sh) = match network {
            bitcoin::Network::Bitcoin => (0x00, 0x05),
            _ => (0x6f, 0xc4),
        };
        Self {
            native_p2pkh,
            native_p2sh,
        }
    }

    /// Public format to native. Inputs already carrying a native version
    /// byte are returned unchanged.
    pub fn translate_input(&self, addr: &str) -> Result<String, TranslateError> {
        let mut payload = base58::decode_check(addr)
            .map_err(|_| TranslateError::InvalidPayload(addr.to_string()))?;
        let version = *payload
            .first()
            .ok_or_else(|| TranslateError::InvalidPayload(addr.to_string()))?;

        let native = if version == PUBLIC_P2PKH_VERSION {
            self.native_p2pkh
        } else if version == PUBLIC_P2SH_VERSION {
            self.native_p2sh
        } else if version == self.native_p2pkh || version == self.native_p2sh {
            return Ok(addr.to_string());
        } else {
            return Err(TranslateError::UnknownVersion {
                version,
                input: addr.to_string(),
            });
        };

        payload[0] = native;
        Ok(base58::encode_check(&payload))
    }

    /// Native format to public. Non-base58 inputs (bech32) pass through.
    pub fn translate_output(&self, addr: &str) -> String {
        let Ok(mut payload) = base58::decode_check(addr) else {
            return addr.to_string();
        };
        let Some(&version) = payload.first() else {
            return addr.to_string();
        };

        let public = if version == self.native_p2pkh {
            PUBLIC_P2PKH_VERSION
        } else if version == self.native_p2sh {
            PUBLIC_P2SH_VERSION
        } else {
            return addr.to_string();
        };

        payload[0] = public;
        base58::encode_check(&payload)
    }
}
