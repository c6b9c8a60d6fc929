use crate::{
    codec::{base58, bytes, payload, Payload},
    constants::GENESIS_HEIGHT,
    height::HeightTracker,
    ledger::amount::Amount,
    store::IndexerStore,
};
use anyhow::Context;
use clap::{Args, Parser};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum ClientCli {
    /// Encode a token id and amount as a payload blob
    EncodePayload(EncodePayloadArgs),
    /// Decode a payload blob
    DecodePayload(DecodePayloadArgs),
    /// Encode hex bytes as base58
    Base58Encode(Base58EncodeArgs),
    /// Decode base58 text to hex bytes
    Base58Decode(Base58DecodeArgs),
    /// Encode a number as base58
    Base58EncodeNumber(Base58EncodeNumberArgs),
    /// Decode base58 text to a number
    Base58DecodeNumber(Base58DecodeNumberArgs),
    /// Show the max processed block height
    Height(HeightArgs),
    /// Advance the max processed block height
    AdvanceHeight(AdvanceHeightArgs),
}

#[derive(Args, Debug)]
pub struct EncodePayloadArgs {
    /// Token id
    #[arg(short, long)]
    token_id: u32,
    /// Amount in whole tokens, up to 8 decimal places
    #[arg(short, long)]
    amount: String,
    /// Read the amount as base units instead of whole tokens
    #[arg(long, default_value_t = false)]
    base_units: bool,
}

#[derive(Args, Debug)]
pub struct DecodePayloadArgs {
    /// 24 hex character payload blob
    blob: String,
    /// Output JSON data
    #[arg(short, long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct Base58EncodeArgs {
    /// Bytes to encode, as hex
    hex: String,
    /// Append a checksum
    #[arg(short, long, default_value_t = false)]
    check: bool,
}

#[derive(Args, Debug)]
pub struct Base58DecodeArgs {
    /// Base58 text
    text: String,
    /// Verify and strip a checksum
    #[arg(short, long, default_value_t = false)]
    check: bool,
}

#[derive(Args, Debug)]
pub struct Base58EncodeNumberArgs {
    value: u64,
    /// Encode exactly this many bytes, keeping leading zeros
    #[arg(short, long)]
    width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct Base58DecodeNumberArgs {
    text: String,
}

#[derive(Args, Debug)]
pub struct HeightArgs {
    /// Path to the indexer database
    #[arg(short, long, default_value = concat!(env!("HOME"), "/.overlay-indexer/database"))]
    database_dir: PathBuf,
    /// Height reported when nothing has been processed yet
    #[arg(long, default_value_t = GENESIS_HEIGHT)]
    start_height: u32,
}

#[derive(Args, Debug)]
pub struct AdvanceHeightArgs {
    /// New max processed height
    height: u32,
    /// Path to the indexer database
    #[arg(short, long, default_value = concat!(env!("HOME"), "/.overlay-indexer/database"))]
    database_dir: PathBuf,
    /// Height reported when nothing has been processed yet
    #[arg(long, default_value_t = GENESIS_HEIGHT)]
    start_height: u32,
}

#[derive(Debug, Serialize)]
struct DecodedPayload {
    token_id: u32,
    amount: u64,
    amount_decimal: String,
}

pub fn run(cli: &ClientCli) -> anyhow::Result<()> {
    println!("{}", execute(cli)?);
    Ok(())
}

/// Carry out a client command, returning what it prints
pub fn execute(cli: &ClientCli) -> anyhow::Result<String> {
    match cli {
        ClientCli::EncodePayload(args) => {
            let amount = if args.base_units {
                Amount(args.amount.parse().context("amount in base units")?)
            } else {
                args.amount.parse()?
            };
            Ok(payload::encode(args.token_id, amount.base_units()).into_string())
        }
        ClientCli::DecodePayload(args) => {
            let Payload { token_id, amount } = payload::decode(&args.blob)?;
            let decoded = DecodedPayload {
                token_id,
                amount,
                amount_decimal: Amount(amount).to_string(),
            };

            if args.json {
                Ok(serde_json::to_string_pretty(&decoded)?)
            } else {
                Ok(format!(
                    "token id: {}\namount:   {} ({} base units)",
                    decoded.token_id, decoded.amount_decimal, decoded.amount
                ))
            }
        }
        ClientCli::Base58Encode(args) => {
            let bytes = bytes::hex_to_bytes(&args.hex)?;
            Ok(if args.check {
                base58::encode_check(bytes)
            } else {
                base58::encode(bytes)
            })
        }
        ClientCli::Base58Decode(args) => {
            let bytes = if args.check {
                base58::decode_check(&args.text)?
            } else {
                base58::decode(&args.text)?
            };
            Ok(bytes::bytes_to_hex(&bytes))
        }
        ClientCli::Base58EncodeNumber(args) => match args.width {
            Some(width) => Ok(base58::encode_u64_with_width(args.value, width)?),
            None => Ok(base58::encode_u64(args.value)),
        },
        ClientCli::Base58DecodeNumber(args) => Ok(base58::decode_u64(&args.text)?.to_string()),
        ClientCli::Height(args) => {
            let store = IndexerStore::new_read_only(&args.database_dir)?;
            let tracker = HeightTracker::new(Arc::new(store), args.start_height);
            Ok(tracker.get()?.to_string())
        }
        ClientCli::AdvanceHeight(args) => {
            let store = IndexerStore::new(&args.database_dir)?;
            let tracker = HeightTracker::new(Arc::new(store), args.start_height);
            tracker.advance(args.height)?;
            Ok(tracker.get()?.to_string())
        }
    }
}
