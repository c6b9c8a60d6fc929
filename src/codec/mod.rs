//! Payload, base58 and byte-level codecs
//!
//! Everything in here is pure: no shared state, safe to call from any thread.

pub mod base58;
pub mod bytes;
pub mod payload;

pub use payload::{EncodedPayload, Payload, PayloadError};
