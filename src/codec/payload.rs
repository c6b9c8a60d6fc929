//! Token payload
//!
//! A payload is a 4-byte big-endian token id followed by an 8-byte big-endian
//! amount, carried as 24 lowercase hex characters. The amount is already in
//! base units, see [crate::ledger::amount::Amount] for the decimal scaling.

use super::bytes::{
    bytes_to_hex, bytes_to_integer, hex_to_bytes, integer_to_bytes, ByteCodecError,
};
use crate::constants::{AMOUNT_LEN, PAYLOAD_HEX_LEN, TOKEN_ID_LEN};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload {
    pub token_id: u32,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedPayload(String);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("token id {value} does not fit in {width} bytes")]
    TokenIdOverflow { value: u64, width: usize },

    #[error("amount {value} does not fit in {width} bytes")]
    AmountOverflow { value: u128, width: usize },

    #[error("malformed payload: expected {expected} hex characters, got {actual}")]
    MalformedLength { expected: usize, actual: usize },

    #[error("malformed payload: {0}")]
    Malformed(#[from] ByteCodecError),
}

impl PayloadError {
    /// The input was not a payload at all, as opposed to a payload whose
    /// values are out of range
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedLength { .. } | Self::Malformed(_))
    }
}

impl Payload {
    pub fn new(token_id: u32, amount: u64) -> Self {
        Self { token_id, amount }
    }

    /// Checked construction from wider integers, never truncates
    pub fn try_from_wide(token_id: u64, amount: u128) -> Result<Self, PayloadError> {
        let token_id = u32::try_from(token_id).map_err(|_| PayloadError::TokenIdOverflow {
            value: token_id,
            width: TOKEN_ID_LEN,
        })?;
        let amount = u64::try_from(amount).map_err(|_| PayloadError::AmountOverflow {
            value: amount,
            width: AMOUNT_LEN,
        })?;
        Ok(Self { token_id, amount })
    }

    pub fn encode(&self) -> EncodedPayload {
        let token_id = integer_to_bytes(self.token_id.into(), TOKEN_ID_LEN)
            .expect("u32 token id fits in 4 bytes");
        let amount =
            integer_to_bytes(self.amount, AMOUNT_LEN).expect("u64 amount fits in 8 bytes");
        EncodedPayload(bytes_to_hex(&[token_id, amount].concat()))
    }

    pub fn decode(blob: &str) -> Result<Self, PayloadError> {
        if blob.len() != PAYLOAD_HEX_LEN {
            return Err(PayloadError::MalformedLength {
                expected: PAYLOAD_HEX_LEN,
                actual: blob.len(),
            });
        }

        let bytes = hex_to_bytes(blob)?;
        let (token_id, amount) = bytes.split_at(TOKEN_ID_LEN);
        let token_id = bytes_to_integer(token_id)?;
        let amount = bytes_to_integer(amount)?;
        Self::try_from_wide(token_id, amount.into())
    }
}

/// Encode a token id and base unit amount
pub fn encode(token_id: u32, amount: u64) -> EncodedPayload {
    Payload::new(token_id, amount).encode()
}

/// Decode a 24 hex character blob
pub fn decode(blob: &str) -> Result<Payload, PayloadError> {
    Payload::decode(blob)
}

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/////////////////
// conversions //
/////////////////

impl FromStr for EncodedPayload {
    type Err = PayloadError;

    /// Only well-formed blobs are accepted, normalized to lowercase
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Payload::decode(s)?.encode())
    }
}

impl From<Payload> for EncodedPayload {
    fn from(value: Payload) -> Self {
        value.encode()
    }
}

impl TryFrom<&EncodedPayload> for Payload {
    type Error = PayloadError;

    fn try_from(value: &EncodedPayload) -> Result<Self, Self::Error> {
        Payload::decode(&value.0)
    }
}

impl AsRef<str> for EncodedPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/////////////
// display //
/////////////

impl Display for EncodedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token {} amount {}", self.token_id, self.amount)
    }
}
