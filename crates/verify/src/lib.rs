//! Verification of EIP-1186 (`eth_getProof`) account and storage proofs.
pub mod eip1186;
pub mod node;
pub mod path;
pub mod proof;
pub mod utils;

pub use eip1186::{verify_eip1186, verify_proof, ProofComponent, Verdict, VerifyProofError};
