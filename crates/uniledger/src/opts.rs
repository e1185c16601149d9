use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct Opts {
    /// Keep node databases here instead of in memory
    #[arg(long, env = "UNILEDGER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Print a fresh node keypair
    GenKey,
    /// Run an in-process network of nodes and mine transactions on it
    Devnet {
        #[arg(long, default_value = "5")]
        nodes: u16,

        #[arg(long, default_value = "3")]
        transactions: usize,

        #[arg(long, default_value = "1")]
        min_validations: usize,

        /// Number of nodes cut off from the network
        #[arg(long, default_value = "0")]
        unreachable: u16,
    },
}
