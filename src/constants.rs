// payload layout
pub const TOKEN_ID_LEN: usize = 4;
pub const AMOUNT_LEN: usize = 8;
pub const PAYLOAD_LEN: usize = TOKEN_ID_LEN + AMOUNT_LEN;
pub const PAYLOAD_HEX_LEN: usize = 2 * PAYLOAD_LEN;

// amounts
pub const AMOUNT_DECIMALS: u32 = 8;
pub const AMOUNT_SCALE: u64 = 100_000_000;

// base58
pub const BASE58_CHECKSUM_LEN: usize = 4;

// heights
pub const GENESIS_HEIGHT: u32 = 0;
pub const U32_LEN: usize = 4;
pub const U64_LEN: usize = 8;

// scanner
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8332";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const RPC_MAX_ATTEMPTS: u32 = 5;
pub const RPC_RETRY_DELAY_MILLIS: u64 = 500;
