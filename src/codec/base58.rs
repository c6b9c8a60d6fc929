//! Base58 text for operator-facing values
//!
//! Uses the Bitcoin alphabet, which leaves out `0`, `O`, `I` and `l`. Each
//! leading zero byte is written as a leading `'1'`, so byte strings that only
//! differ in leading zeros stay distinct.
//!
//! The checksum variant appends the first four bytes of a double SHA-256 of
//! the payload before encoding. Values typed in by hand should go through
//! [decode_check] so transcription mistakes are caught.

use super::bytes::{bytes_to_integer, integer_to_bytes, minimal_bytes, ByteCodecError};
use crate::constants::BASE58_CHECKSUM_LEN;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Base58Error {
    #[error("base58: invalid character {character:?} at index {index}")]
    InvalidAlphabet { character: char, index: usize },

    #[error("base58check: invalid checksum {actual:02x?}, expected {expected:02x?}")]
    Checksum {
        expected: [u8; BASE58_CHECKSUM_LEN],
        actual: [u8; BASE58_CHECKSUM_LEN],
    },

    #[error("base58check: input is too short to carry a checksum")]
    MissingChecksum,

    #[error(transparent)]
    Codec(#[from] ByteCodecError),

    #[error("base58: {0}")]
    Other(String),
}

/// Plain base58, no checksum
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    bs58::encode(bytes).into_string()
}

/// Inverse of [encode]
pub fn decode(text: &str) -> Result<Vec<u8>, Base58Error> {
    bs58::decode(text)
        .into_vec()
        .map_err(|err| from_bs58_error(text, err))
}

/// Base58 with a trailing 4-byte checksum
pub fn encode_check(bytes: impl AsRef<[u8]>) -> String {
    bs58::encode(bytes).with_check().into_string()
}

/// Inverse of [encode_check], verifies and strips the checksum
pub fn decode_check(text: &str) -> Result<Vec<u8>, Base58Error> {
    bs58::decode(text)
        .with_check(None)
        .into_vec()
        .map_err(|err| from_bs58_error(text, err))
}

/// Encodes the minimal big-endian bytes of `value`.
///
/// Leading zero bytes are not part of a minimal representation, so two byte
/// strings that only differ in leading zeros come out the same here. Use
/// [encode_u64_with_width] when the original width matters.
pub fn encode_u64(value: u64) -> String {
    encode(minimal_bytes(value))
}

/// Encodes `value` as exactly `width` big-endian bytes
pub fn encode_u64_with_width(value: u64, width: usize) -> Result<String, Base58Error> {
    Ok(encode(integer_to_bytes(value, width)?))
}

/// Decodes then accumulates the bytes big-endian
pub fn decode_u64(text: &str) -> Result<u64, Base58Error> {
    Ok(bytes_to_integer(&decode(text)?)?)
}

fn from_bs58_error(text: &str, err: bs58::decode::Error) -> Base58Error {
    use bs58::decode::Error;

    match err {
        Error::InvalidCharacter { character, index } => {
            Base58Error::InvalidAlphabet { character, index }
        }
        Error::NonAsciiCharacter { index } => Base58Error::InvalidAlphabet {
            character: text
                .get(index..)
                .and_then(|rest| rest.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
            index,
        },
        Error::InvalidChecksum {
            checksum,
            expected_checksum,
        } => Base58Error::Checksum {
            expected: expected_checksum,
            actual: checksum,
        },
        Error::NoChecksum => Base58Error::MissingChecksum,
        err => Base58Error::Other(err.to_string()),
    }
}
