use anyhow::{bail, Result};
use clap::Parser;
use log::warn;
use tokenproof::{prove_balance, ProofOutcome};

use crate::cli::AppArgs;

mod cli;

/// Prove the token balance of a holder.
///
/// Finds the storage slot of the holder's balance by comparing storage against
/// balanceOf, fetches an eth_getProof for it and verifies the proof against the
/// state root of the block.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = AppArgs::parse();

    let report = match prove_balance(args.web3.as_str(), &args.request(), &args.config()).await {
        Ok(report) => report,
        Err(e) => {
            if e.is_transport() {
                warn!("Node at {} could not serve the request", args.web3);
            }
            return Err(e.into());
        }
    };
    match args.json {
        true => println!("{}", serde_json::to_string_pretty(&report)?),
        false => print!("{report}"),
    }
    if let ProofOutcome::Proven(proven) = &report.outcome {
        if !proven.verdict.valid {
            bail!("Proof is invalid");
        }
    }
    Ok(())
}
