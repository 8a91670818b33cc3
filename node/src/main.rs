// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CHROMA Wallet Node
//!
//! Entry point for the `chroma-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the local transaction index,
//! and serves the REST API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the wallet node
//! - `init`    — initialize data directory and generate a wallet key
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use chroma_protocol::asset::AssetRegistry;
use chroma_protocol::compose::{Composer, ComposerConfig};
use chroma_protocol::config::{MAINNET_HRP, TESTNET_HRP};
use chroma_protocol::graph::TxStore;
use chroma_protocol::resolve::{ColorResolver, ResolverConfig};
use chroma_protocol::wallet::{ChromaKeypair, Keychain};

use cli::{ChromaNodeCli, Commands};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ChromaNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full wallet node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "chroma_node=info,chroma_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        network = %args.network,
        data_dir = %args.data_dir.display(),
        "starting chroma-node"
    );

    // --- Persistent transaction index ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = Arc::new(
        TxStore::open(&db_path)
            .with_context(|| format!("failed to open store at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), transactions = store.len(), "store opened");

    // --- Wallet keys ---
    let hrp = hrp_for(&args.network)?;
    let keychain = Arc::new(Keychain::new(hrp));
    let key_path = args.data_dir.join("wallet.key");
    if key_path.exists() {
        let seed = read_seed(&key_path)
            .with_context(|| format!("failed to read wallet key from {}", key_path.display()))?;
        let address = keychain
            .import_seed(&seed)
            .map_err(|e| anyhow::anyhow!("failed to load wallet key: {e}"))?;
        tracing::info!(address = %address, "wallet key loaded");
    } else {
        tracing::warn!(
            path = %key_path.display(),
            "no wallet key found; run `chroma-node init` to create one"
        );
    }

    // --- Asset registry ---
    let registry = Arc::new(AssetRegistry::new());
    if let Some(exported) = store
        .get_meta(api::REGISTRY_META_KEY)
        .context("failed to read persisted registry")?
    {
        let exported = String::from_utf8(exported).context("registry export is not UTF-8")?;
        let restored = registry
            .restore(&exported)
            .map_err(|e| anyhow::anyhow!("failed to restore asset registry: {e}"))?;
        tracing::info!(assets = restored, "asset registry restored");
    }

    // --- Engine ---
    let resolver = ColorResolver::new(Arc::clone(&store), ResolverConfig::default());
    let composer = Composer::new(ComposerConfig::default());

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics.store_transactions.set(store.len() as i64);
    node_metrics.assets_registered.set(registry.len() as i64);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            chroma_protocol::config::PROTOCOL_VERSION,
        ),
        network: args.network.clone(),
        store: Arc::clone(&store),
        registry,
        resolver,
        composer,
        keychain,
        metrics: Arc::clone(&node_metrics),
        persist_guard: Arc::new(parking_lot::Mutex::new(())),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    store.flush().context("failed to flush store on shutdown")?;
    tracing::info!("chroma-node stopped");
    Ok(())
}

/// Initializes a new node data directory and generates a wallet keypair.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("chroma_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), network = %args.network, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let hrp = hrp_for(&args.network)?;
    let keypair = ChromaKeypair::generate();
    let address = keypair
        .address(hrp)
        .map_err(|e| anyhow::anyhow!("failed to derive wallet address: {e}"))?;

    // Write the seed to a file inside the data directory.
    let key_path = data_dir.join("wallet.key");
    std::fs::write(&key_path, hex::encode(keypair.to_seed()))
        .with_context(|| format!("failed to write wallet key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(address = %address, key_path = %key_path.display(), "wallet keypair generated");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Network        : {}", args.network);
    println!("  Wallet key     : {}", key_path.display());
    println!("  Address        : {}", address);

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("chroma-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", chroma_protocol::config::PROTOCOL_VERSION);
    println!("fingerprint {}", chroma_protocol::config::PROTOCOL_FINGERPRINT);
}

/// Maps a network name to its address prefix.
fn hrp_for(network: &str) -> Result<&'static str> {
    match network {
        "mainnet" => Ok(MAINNET_HRP),
        "testnet" => Ok(TESTNET_HRP),
        other => anyhow::bail!("unknown network: {other} (expected mainnet or testnet)"),
    }
}

/// Reads a hex-encoded 32-byte wallet seed.
fn read_seed(path: &std::path::Path) -> Result<[u8; 32]> {
    let hex_seed = std::fs::read_to_string(path)?;
    let bytes = hex::decode(hex_seed.trim()).context("wallet key is not valid hex")?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("wallet key must be exactly 32 bytes"))?;
    Ok(seed)
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
