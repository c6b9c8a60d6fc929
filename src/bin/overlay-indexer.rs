use clap::{Parser, Subcommand};
use overlay_indexer::{client, server};

#[derive(Parser, Debug)]
#[command(name = "overlay-indexer", author, version, about, long_about = Some("Overlay Indexer\n\n\
Track token transfers carried in base chain data outputs"))]
struct Cli {
    #[command(subcommand)]
    command: IndexerCommand,
}

#[derive(Subcommand, Debug)]
enum IndexerCommand {
    /// Scan the base chain for payloads
    Scan(server::ScanArgs),
    /// Offline codec and height commands
    Client {
        #[command(subcommand)]
        args: client::ClientCli,
    },
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        IndexerCommand::Client { args } => client::run(&args),
        IndexerCommand::Scan(args) => server::run(args).await,
    }
}
