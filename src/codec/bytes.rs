//! Fixed-width big-endian integers and hex

use crate::constants::U64_LEN;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ByteCodecError {
    #[error("value {value} does not fit in {width} bytes")]
    Overflow { value: u128, width: usize },

    #[error("{len} byte sequence does not fit in 64 bits")]
    IntegerTooLarge { len: usize },

    #[error("malformed hex: {0}")]
    MalformedHex(#[from] hex::FromHexError),
}

/// Big-endian encoding of `value` in exactly `width` bytes
pub fn integer_to_bytes(value: u64, width: usize) -> Result<Vec<u8>, ByteCodecError> {
    let significant = significant_len(value);
    if significant > width {
        return Err(ByteCodecError::Overflow {
            value: value.into(),
            width,
        });
    }

    let mut bytes = vec![0; width];
    bytes[width - significant..].copy_from_slice(&value.to_be_bytes()[U64_LEN - significant..]);
    Ok(bytes)
}

/// Big-endian accumulation, `total = total * 256 + byte`. Empty input is 0.
pub fn bytes_to_integer(bytes: &[u8]) -> Result<u64, ByteCodecError> {
    bytes.iter().try_fold(0u64, |total, byte| {
        total
            .checked_mul(256)
            .and_then(|total| total.checked_add(*byte as u64))
            .ok_or(ByteCodecError::IntegerTooLarge { len: bytes.len() })
    })
}

/// Shortest big-endian representation of `value`, zero is a single `0x00`
pub fn minimal_bytes(value: u64) -> Vec<u8> {
    let significant = significant_len(value).max(1);
    value.to_be_bytes()[U64_LEN - significant..].to_vec()
}

/// Case-insensitive
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, ByteCodecError> {
    Ok(hex::decode(hex)?)
}

/// Lowercase
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

fn significant_len(value: u64) -> usize {
    U64_LEN - value.leading_zeros() as usize / 8
}
