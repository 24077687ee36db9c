//! Locates the storage slot holding an ERC20 holder's balance and proves it
//! against a block state root with `eth_getProof`.
pub mod client;
pub mod config;
pub mod decode;
pub mod discovery;
pub mod pipeline;
pub mod rpc;
pub mod slot;
pub mod token;
pub mod types;
pub mod utils;

pub use client::{ChainDataPort, ChainError, NodeClient, RequestContext};
pub use config::{parse_address, ConfigError, ProofConfig};
pub use discovery::{DiscoveredSlot, DiscoveryError, SlotDiscovery};
pub use ethers::types::Address;
pub use pipeline::{
    prove_balance, PipelineError, ProofOutcome, ProofPipeline, ProofReport, ProofRequest,
};
pub use types::{Balance, BlockRef, TokenKind};
