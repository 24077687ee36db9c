//! For Command Line Interface for ethproof

use std::time::Duration;

use clap::Parser;
use tokenproof::{
    config::DEFAULT_TIMEOUT, discovery::DISCOVERY_ITERATIONS, parse_address, Address,
    ProofConfig, ProofRequest, TokenKind,
};
use url::Url;

pub const LOCALHOST: &str = "http://127.0.0.1:8545/";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct AppArgs {
    /// Url of node for eth_call, eth_getStorageAt and eth_getProof requests
    #[clap(short, long, default_value_t = Url::parse(LOCALHOST).expect("Couldn't read node"))]
    pub web3: Url,
    /// Token contract address (0x-prefixed)
    #[clap(short, long, value_parser = parse_address)]
    pub contract: Address,
    /// Holder address whose balance is proven (0x-prefixed)
    #[clap(long, value_parser = parse_address)]
    pub holder: Address,
    /// Storage layout of the token balances: mapbased or minime
    #[clap(short, long, default_value_t = TokenKind::Mapbased)]
    pub kind: TokenKind,
    /// Block number to prove at, 0 for the latest block
    #[clap(long, default_value_t = 0)]
    pub height: u64,
    /// Timeout in seconds for each request to the node
    #[clap(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
    /// Number of mapping positions to try when looking for the balance slot
    #[clap(short, long, default_value_t = DISCOVERY_ITERATIONS)]
    pub iterations: usize,
    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

impl AppArgs {
    pub fn request(&self) -> ProofRequest {
        ProofRequest {
            token: self.contract,
            holder: self.holder,
            kind: self.kind,
            block: Some(self.height),
        }
    }

    pub fn config(&self) -> ProofConfig {
        ProofConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            iterations: self.iterations,
        }
    }
}
