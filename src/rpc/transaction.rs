//! Verbose raw transactions and their data-carrier outputs

use crate::codec::bytes::{bytes_to_hex, hex_to_bytes};
use serde::{Deserialize, Serialize};

pub const OP_RETURN: u8 = 0x6a;
pub const OP_PUSHBYTES_MAX: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const NULL_DATA: &str = "nulldata";

/// `getrawtransaction` with verbosity on, only the fields the scanner reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
    pub hex: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl RawTransaction {
    /// `(vout, hex)` of the data pushed by each `OP_RETURN` output
    pub fn data_carriers(&self) -> impl Iterator<Item = (u32, String)> + '_ {
        self.vout.iter().filter_map(|output| {
            output
                .script_pub_key
                .data_carrier()
                .map(|data| (output.n, bytes_to_hex(&data)))
        })
    }
}

impl ScriptPubKey {
    pub fn is_null_data(&self) -> bool {
        self.kind == NULL_DATA || self.hex.starts_with("6a")
    }

    /// Bytes of the first push after `OP_RETURN`, `None` for any other script
    pub fn data_carrier(&self) -> Option<Vec<u8>> {
        if !self.is_null_data() {
            return None;
        }

        let script = hex_to_bytes(&self.hex).ok()?;
        let (&op_return, rest) = script.split_first()?;
        if op_return != OP_RETURN {
            return None;
        }

        let (&opcode, rest) = rest.split_first()?;
        let (len, data) = match opcode {
            1..=OP_PUSHBYTES_MAX => (opcode as usize, rest),
            OP_PUSHDATA1 => {
                let (&len, data) = rest.split_first()?;
                (len as usize, data)
            }
            OP_PUSHDATA2 => {
                let len = u16::from_le_bytes([*rest.first()?, *rest.get(1)?]);
                (len as usize, rest.get(2..)?)
            }
            _ => return None,
        };
        data.get(..len).map(<[u8]>::to_vec)
    }
}
