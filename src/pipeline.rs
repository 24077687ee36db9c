//! End to end proof of a holder's token balance.
//!
//! Steps run in order and every step except value decoding is a precondition
//! for the next one:
//! 1. Token metadata (decimals).
//! 2. Holder balance. A zero balance ends the run with nothing to prove.
//! 3. Slot resolution with the token kind's strategy.
//! 4. Block resolution (requested height or latest).
//! 5. Proof retrieval at that block.
//! 6. Decoding of the proven value. Failure is only recorded.
//! 7. Verification of the proof against the block state root.
use std::fmt::Display;

use ethers::types::{Address, EIP1186ProofResponse, H256};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokenproof_verify::{verify_eip1186, ProofComponent, Verdict};

use crate::{
    client::{ChainDataPort, ChainError, NodeClient, RequestContext},
    config::{ConfigError, ProofConfig},
    decode::DecodedValue,
    token::{TokenError, TokenProof},
    types::{Balance, BlockRef, TokenKind, TokenMetadata},
    utils::{hex_encode, u256_to_h256},
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Config error {0}")]
    Config(#[from] ConfigError),
    #[error("Unable to fetch token metadata {0}")]
    Metadata(#[source] ChainError),
    #[error("Token reports {0} decimals, at least 1 is required")]
    InvalidDecimals(u8),
    #[error("Unable to fetch holder balance {0}")]
    Balance(#[source] ChainError),
    #[error("Unable to resolve balance slot {0}")]
    SlotResolution(#[source] TokenError),
    #[error("Unable to fetch block {0}")]
    Block(#[source] ChainError),
    #[error("Unable to fetch proof {0}")]
    Proof(#[source] ChainError),
    #[error("Node returned a proof without storage proofs for {0}")]
    EmptyStorageProof(String),
}

impl PipelineError {
    /// True if the run failed talking to the node and may succeed if repeated.
    pub fn is_transport(&self) -> bool {
        match self {
            PipelineError::Metadata(e)
            | PipelineError::Balance(e)
            | PipelineError::Block(e)
            | PipelineError::Proof(e) => e.is_transport(),
            PipelineError::SlotResolution(e) => e.is_transport(),
            _ => false,
        }
    }
}

/// What to prove.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofRequest {
    pub token: Address,
    pub holder: Address,
    pub kind: TokenKind,
    /// Block height to prove at. `None` or zero means latest.
    pub block: Option<u64>,
}

/// Result of a run that did not fail.
#[derive(Clone, Debug, Serialize)]
pub struct ProofReport {
    pub token: Address,
    pub holder: Address,
    pub kind: TokenKind,
    pub metadata: TokenMetadata,
    /// Balance reported by `balanceOf`.
    pub balance: Balance,
    pub outcome: ProofOutcome,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofOutcome {
    /// The holder has no balance.
    NothingToProve,
    Proven(Box<ProvenBalance>),
}

#[derive(Clone, Debug, Serialize)]
pub struct ProvenBalance {
    /// Declared slot of the balance mapping.
    pub position: usize,
    /// Amount found in storage during discovery.
    pub amount: Balance,
    pub block: BlockRef,
    /// Keys the proof was requested for, the balance key first.
    pub keys: Vec<H256>,
    /// Storage root of the token contract according to the proof.
    pub storage_hash: H256,
    /// Proven value as read by the token kind's decoder.
    pub decoded: Option<DecodedValue>,
    pub verdict: Verdict,
    /// Non-fatal problems met during the run.
    pub diagnostics: Vec<String>,
}

impl ProofReport {
    /// Whether a proof was produced and verified.
    pub fn proof_valid(&self) -> bool {
        match &self.outcome {
            ProofOutcome::NothingToProve => false,
            ProofOutcome::Proven(proven) => proven.verdict.valid,
        }
    }
}

impl Display for ProofReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "token:   {} ({})", hex_encode(self.token), self.kind)?;
        writeln!(f, "holder:  {}", hex_encode(self.holder))?;
        writeln!(f, "balance: {}", self.balance)?;
        let proven = match &self.outcome {
            ProofOutcome::NothingToProve => return writeln!(f, "nothing to prove"),
            ProofOutcome::Proven(proven) => proven,
        };
        writeln!(f, "slot:    {}", proven.position)?;
        writeln!(f, "amount:  {}", proven.amount)?;
        writeln!(f, "block:   {}", proven.block.number)?;
        if let Some(decoded) = &proven.decoded {
            writeln!(f, "decoded: {}", decoded.balance)?;
            if let Some(checkpoint) = decoded.checkpoint_block {
                writeln!(f, "checkpoint block: {checkpoint}")?;
            }
        }
        match (proven.verdict.valid, &proven.verdict.reason) {
            (true, _) => writeln!(f, "proof:   valid")?,
            (false, Some(reason)) => writeln!(f, "proof:   invalid ({reason})")?,
            (false, None) => writeln!(f, "proof:   invalid")?,
        }
        for diagnostic in &proven.diagnostics {
            writeln!(f, "warning: {diagnostic}")?;
        }
        Ok(())
    }
}

/// Runs proof requests against one chain data source.
pub struct ProofPipeline<P> {
    port: P,
    ctx: RequestContext,
    iterations: usize,
}

impl<P: ChainDataPort> ProofPipeline<P> {
    pub fn new(port: P, config: &ProofConfig) -> Self {
        ProofPipeline {
            port,
            ctx: RequestContext::new(config.timeout),
            iterations: config.iterations,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub async fn run(&self, request: &ProofRequest) -> Result<ProofReport, PipelineError> {
        let ProofRequest {
            token,
            holder,
            kind,
            block,
        } = *request;
        let ctx = &self.ctx;

        info!("Fetching metadata of token {}", hex_encode(token));
        let decimals = self
            .port
            .decimals(ctx, token)
            .await
            .map_err(PipelineError::Metadata)?;
        if decimals < 1 {
            return Err(PipelineError::InvalidDecimals(decimals));
        }
        let metadata = TokenMetadata { decimals };

        let raw = self
            .port
            .balance_of(ctx, token, holder)
            .await
            .map_err(PipelineError::Balance)?;
        let balance = Balance::new(raw, decimals);
        info!("Holder {} has balance {balance}", hex_encode(holder));
        if balance.is_zero() {
            info!("Nothing to prove");
            return Ok(ProofReport {
                token,
                holder,
                kind,
                metadata,
                balance,
                outcome: ProofOutcome::NothingToProve,
            });
        }

        let token_proof = TokenProof::new(kind, self.iterations);
        let discovered = token_proof
            .resolve_slot(&self.port, ctx, token, holder, &balance)
            .await
            .map_err(PipelineError::SlotResolution)?;
        info!(
            "Balance mapping found at position {} holding {}",
            discovered.position, discovered.amount
        );

        let block = self
            .port
            .block(ctx, block.filter(|height| *height > 0))
            .await
            .map_err(PipelineError::Block)?;
        info!("Proving at block {}", block.number);

        let keys = token_proof
            .proof_keys(&self.port, ctx, token, holder, discovered.position, &block)
            .await
            .map_err(PipelineError::SlotResolution)?;
        let proof = self
            .port
            .proof(ctx, token, &keys, block.number)
            .await
            .map_err(PipelineError::Proof)?;
        let Some(first) = proof.storage_proof.first() else {
            return Err(PipelineError::EmptyStorageProof(hex_encode(token)))
        };

        let mut diagnostics = vec![];
        let raw_value = hex_encode(u256_to_h256(first.value));
        let decoded = match token_proof.decode_value(&raw_value, decimals) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Unable to decode proven value {raw_value}: {e}");
                diagnostics.push(format!("unable to decode proven value {raw_value}: {e}"));
                None
            }
        };
        if let Some(checkpoint) = decoded.and_then(|d| d.checkpoint_block) {
            if checkpoint > block.number {
                warn!("Checkpoint block {checkpoint} is after block {}", block.number);
                diagnostics.push(format!(
                    "checkpoint block {checkpoint} is after proven block {}",
                    block.number
                ));
            }
        }

        let verdict = verify_response(block.state_root, token, &keys, &proof);
        match &verdict.reason {
            None => info!("Proof is valid"),
            Some(reason) => warn!("Proof is invalid: {reason}"),
        }

        Ok(ProofReport {
            token,
            holder,
            kind,
            metadata,
            balance,
            outcome: ProofOutcome::Proven(Box::new(ProvenBalance {
                position: discovered.position,
                amount: discovered.amount,
                block,
                keys,
                storage_hash: proof.storage_hash,
                decoded,
                verdict,
                diagnostics,
            })),
        })
    }
}

/// A proof only counts if it is for the requested account and keys.
fn verify_response(
    state_root: H256,
    token: Address,
    keys: &[H256],
    proof: &EIP1186ProofResponse,
) -> Verdict {
    if proof.address != token {
        return Verdict::invalid(
            ProofComponent::AccountProof,
            format!("proof is for account {}", hex_encode(proof.address)),
        );
    }
    let proven_keys: Vec<H256> = proof
        .storage_proof
        .iter()
        .map(|p| u256_to_h256(p.key))
        .collect();
    if proven_keys != keys {
        return Verdict::invalid(
            ProofComponent::StorageProof,
            "proof does not cover the requested storage keys",
        );
    }
    verify_eip1186(state_root, proof)
}

/// Proves a balance using the node at `rpc_endpoint`.
pub async fn prove_balance(
    rpc_endpoint: &str,
    request: &ProofRequest,
    config: &ProofConfig,
) -> Result<ProofReport, PipelineError> {
    let client = NodeClient::new(rpc_endpoint)?;
    ProofPipeline::new(client, config).run(request).await
}
