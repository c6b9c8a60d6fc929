use crate::{
    block::store::PayloadStore,
    constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RPC_URL, GENESIS_HEIGHT},
    height::store::HeightStore,
    rpc::{connector::JsonRpcConnector, ChainRpc},
    scanner::Scanner,
    store::IndexerStore,
};
use anyhow::{bail, Context};
use clap::Parser;
use reqwest::Url;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info, instrument};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ScanArgs {
    /// URL of the node's JSON-RPC interface
    #[arg(long, default_value = DEFAULT_RPC_URL)]
    rpc_url: Url,
    /// RPC username
    #[arg(long, requires = "rpc_password")]
    rpc_user: Option<String>,
    /// RPC password
    #[arg(long, requires = "rpc_user")]
    rpc_password: Option<String>,
    /// Path to the node's cookie file, used when no username is given
    #[arg(long, conflicts_with = "rpc_user")]
    rpc_cookie_path: Option<PathBuf>,
    /// Path to directory for rocksdb
    #[arg(short, long, default_value = concat!(env!("HOME"), "/.overlay-indexer/database"))]
    database_dir: PathBuf,
    /// Path to directory for logs
    #[arg(short, long, default_value = concat!(env!("HOME"), "/.overlay-indexer/logs"))]
    log_dir: PathBuf,
    /// Max file log level
    #[arg(long, default_value_t = LevelFilter::DEBUG)]
    log_level: LevelFilter,
    /// Max stdout log level
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level_stdout: LevelFilter,
    /// Height treated as already processed on a fresh database
    #[arg(long, default_value_t = GENESIS_HEIGHT)]
    start_height: u32,
    /// Seconds to wait for new blocks once caught up
    #[arg(short, long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcAuth {
    Basic { username: String, password: String },
    Cookie(PathBuf),
}

#[derive(Debug, Clone)]
pub struct IndexerConfiguration {
    pub rpc_url: Url,
    pub rpc_auth: RpcAuth,
    pub database_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    pub log_level_stdout: LevelFilter,
    pub start_height: u32,
    pub poll_interval: Duration,
}

#[instrument(skip(args))]
pub async fn handle_command_line_arguments(
    args: ScanArgs,
) -> anyhow::Result<IndexerConfiguration> {
    debug!("Parsing scan args");
    let rpc_auth = match (args.rpc_user, args.rpc_password, args.rpc_cookie_path) {
        (Some(username), Some(password), _) => RpcAuth::Basic { username, password },
        (None, None, Some(cookie_path)) => RpcAuth::Cookie(cookie_path),
        _ => bail!("Either --rpc-user and --rpc-password or --rpc-cookie-path is required"),
    };

    tokio::fs::create_dir_all(&args.database_dir)
        .await
        .with_context(|| format!("creating {}", args.database_dir.display()))?;
    tokio::fs::create_dir_all(&args.log_dir)
        .await
        .with_context(|| format!("creating {}", args.log_dir.display()))?;

    let mut log_number = 0;
    let mut log_file = args.log_dir.join("overlay-indexer-0.log");
    while tokio::fs::metadata(&log_file).await.is_ok() {
        log_number += 1;
        log_file = args
            .log_dir
            .join(format!("overlay-indexer-{log_number}.log"));
    }

    Ok(IndexerConfiguration {
        rpc_url: args.rpc_url,
        rpc_auth,
        database_dir: args.database_dir,
        log_file,
        log_level: args.log_level,
        log_level_stdout: args.log_level_stdout,
        start_height: args.start_height,
        poll_interval: Duration::from_secs(args.poll_interval),
    })
}

pub fn init_tracing(config: &IndexerConfiguration) -> anyhow::Result<()> {
    let log_file = std::fs::File::create(&config.log_file)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(log_file);

    let stdout_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry()
        .with(stdout_layer.with_filter(config.log_level_stdout))
        .with(file_layer.with_filter(config.log_level))
        .try_init()?;
    Ok(())
}

pub fn connect(config: &IndexerConfiguration) -> anyhow::Result<JsonRpcConnector> {
    let connector = match &config.rpc_auth {
        RpcAuth::Basic { username, password } => JsonRpcConnector::new_with_basic_auth(
            config.rpc_url.clone(),
            username.clone(),
            password.clone(),
        )?,
        RpcAuth::Cookie(cookie_path) => {
            JsonRpcConnector::new_with_cookie_auth(config.rpc_url.clone(), cookie_path)?
        }
    };
    Ok(connector)
}

pub async fn run(args: ScanArgs) -> anyhow::Result<()> {
    let config = handle_command_line_arguments(args).await?;
    init_tracing(&config)?;

    info!("Starting overlay-indexer");
    let store = Arc::new(IndexerStore::new(&config.database_dir)?);
    let rpc = connect(&config)?;
    let chain = rpc.get_blockchain_info().await?;
    info!(
        "Connected to {} on {} chain, tip {} ({})",
        rpc.url(),
        chain.chain,
        chain.blocks,
        chain.best_block_hash
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_handle = tokio::spawn(wait_for_signal(shutdown_tx));

    let scanner = Scanner::new(rpc, store, config.start_height);
    let result = scan(&scanner, config.poll_interval, shutdown_rx).await;
    signal_handle.abort();
    result
}

/// Run `scanner` until shutdown or its first error
pub async fn scan<R, S>(
    scanner: &Scanner<R, S>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    R: ChainRpc,
    S: HeightStore + PayloadStore,
{
    scanner.run(poll_interval, shutdown).await?;

    if let Ok(height) = scanner.tracker().get() {
        info!("Stopped at max processed height {height}");
    }
    Ok(())
}

async fn wait_for_signal(shutdown: watch::Sender<bool>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = term.recv() => info!("Received SIGTERM"),
        _ = int.recv() => info!("Received SIGINT"),
    }
    shutdown.send(true)?;
    Ok(())
}
