//! # CLI Interface
//!
//! Defines the command-line argument structure for `chroma-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CHROMA colored-coin wallet node.
///
/// A wallet-side node for the CHROMA overlay asset protocol. Indexes the
/// transactions it is told about, resolves color values over them, serves
/// the REST API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "chroma-node",
    about = "CHROMA colored-coin wallet node",
    version,
    propagate_version = true
)]
pub struct ChromaNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the CHROMA node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the wallet node.
    Run(RunArgs),
    /// Initialize a new node — creates the data directory and generates
    /// a fresh wallet keypair.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory where the transaction index and
    /// wallet keys are stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "CHROMA_DATA_DIR", default_value = "~/.chroma")]
    pub data_dir: PathBuf,

    /// Port for the REST API.
    #[arg(long, env = "CHROMA_RPC_PORT", default_value_t = 9851)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "CHROMA_METRICS_PORT", default_value_t = 9852)]
    pub metrics_port: u16,

    /// Network to run on: mainnet or testnet. Selects the address prefix.
    #[arg(long, env = "CHROMA_NETWORK", default_value = "testnet")]
    pub network: String,

    /// Log output format: pretty or json.
    #[arg(long, env = "CHROMA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "CHROMA_DATA_DIR", default_value = "~/.chroma")]
    pub data_dir: PathBuf,

    /// Network to configure for: mainnet or testnet.
    #[arg(long, default_value = "testnet")]
    pub network: String,
}
