// SPDX-License-Identifier: MIT

mod devnet;
mod logging;
mod opts;

use clap::Parser as _;
use opts::{Commands, Opts};
use uniledger_core::keys::Seckey;
use uniledger_mining::MiningConfig;
use tracing::info;
use uniledger_util_error::WhateverResult;

const LOG_TARGET: &str = "uniledger";

pub struct Uniledger;

#[bon::bon]
impl Uniledger {
    #[builder(finish_fn = run, start_fn = builder)]
    pub async fn build(#[builder(default)] mining_config: MiningConfig) -> WhateverResult<()> {
        logging::init_logging()?;

        let opts = Opts::parse();

        match opts.command {
            Commands::GenKey => {
                let seckey = Seckey::generate();
                eprintln!("Pubkey: {}", seckey.pubkey());
                eprintln!();
                println!("{seckey}");
                Ok(())
            }
            Commands::Devnet {
                nodes,
                transactions,
                min_validations,
                unreachable,
            } => {
                let num_stored = devnet::Devnet::builder()
                    .num_nodes(nodes)
                    .num_unreachable(unreachable)
                    .maybe_data_dir(opts.data_dir)
                    .mining_config(mining_config)
                    .build()
                    .await?
                    .run(transactions, min_validations)
                    .await?;
                info!(target: LOG_TARGET, num_stored, transactions, "Devnet finished");
                Ok(())
            }
        }
    }
}
