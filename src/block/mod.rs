use crate::{codec::Payload, constants::U32_LEN};
use serde::{Deserialize, Serialize};

pub mod store;

/// A decoded payload and the output that carried it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPayload {
    pub height: u32,
    pub txid: String,
    pub vout: u32,
    pub payload: Payload,
}

impl BlockPayload {
    /// `{height BE}{txid}{vout BE}`, one key per output so re-applying a
    /// block overwrites instead of duplicating
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(U32_LEN + self.txid.len() + U32_LEN);
        key.extend_from_slice(&self.height.to_be_bytes());
        key.extend_from_slice(self.txid.as_bytes());
        key.extend_from_slice(&self.vout.to_be_bytes());
        key
    }
}
