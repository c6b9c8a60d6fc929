pub mod block;
pub mod client;
pub mod codec;
pub mod constants;
pub mod height;
pub mod ledger;
pub mod rpc;
pub mod scanner;
pub mod server;
pub mod store;
