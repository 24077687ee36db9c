//! Per token kind behaviour: where the balance lives, which keys prove it and
//! how the proven word is read.
use ethers::types::{Address, H256, U256};
use log::debug;
use thiserror::Error;

use crate::{
    client::{ChainDataPort, ChainError, RequestContext},
    decode::{CheckpointValueDecoder, DecodeError, DecodedValue, MapValueDecoder, ValueDecoder},
    discovery::{
        CheckpointSlotDiscovery, DiscoveredSlot, DiscoveryError, MapSlotDiscovery, SlotDiscovery,
    },
    slot::{array_element_slot, map_slot, SlotError},
    types::{Balance, BlockRef, TokenKind},
};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Chain error {0}")]
    Chain(#[from] ChainError),
    #[error("Discovery error {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("Slot error {0}")]
    Slot(#[from] SlotError),
    #[error("Token reports {0} decimals, at least 1 is required")]
    InvalidDecimals(u8),
    #[error("Holder has no checkpoints at position {position} in block {block}")]
    NoCheckpoints { position: usize, block: u64 },
}

impl TokenError {
    pub fn is_transport(&self) -> bool {
        match self {
            TokenError::Chain(e) | TokenError::Discovery(DiscoveryError::Chain(e)) => {
                e.is_transport()
            }
            _ => false,
        }
    }
}

/// Balance proof capability of a supported token kind.
#[derive(Clone, Debug)]
pub enum TokenProof {
    Mapbased(MapSlotDiscovery),
    CheckpointList(CheckpointSlotDiscovery),
}

impl TokenProof {
    /// Uses the kind's discovery strategy, searching `iterations` positions.
    pub fn new(kind: TokenKind, iterations: usize) -> Self {
        match kind {
            TokenKind::Mapbased => TokenProof::Mapbased(MapSlotDiscovery::new(iterations)),
            TokenKind::CheckpointList => {
                TokenProof::CheckpointList(CheckpointSlotDiscovery::new(iterations))
            }
        }
    }

    fn strategy(&self) -> &dyn SlotDiscovery {
        match self {
            TokenProof::Mapbased(strategy) => strategy,
            TokenProof::CheckpointList(strategy) => strategy,
        }
    }

    /// Finds the mapping position holding `expected` for the holder.
    pub async fn resolve_slot(
        &self,
        port: &dyn ChainDataPort,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
        expected: &Balance,
    ) -> Result<DiscoveredSlot, TokenError> {
        Ok(self
            .strategy()
            .discover(port, ctx, token, holder, expected)
            .await?)
    }

    /// Fetches decimals and balance from the token and then locates the slot.
    pub async fn discover_slot(
        &self,
        port: &dyn ChainDataPort,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
    ) -> Result<DiscoveredSlot, TokenError> {
        let decimals = port.decimals(ctx, token).await?;
        if decimals < 1 {
            return Err(TokenError::InvalidDecimals(decimals));
        }
        let raw = port.balance_of(ctx, token, holder).await?;
        self.resolve_slot(port, ctx, token, holder, &Balance::new(raw, decimals))
            .await
    }

    /// Storage keys to request a proof for. The first key holds the balance.
    ///
    /// For checkpoint lists the latest checkpoint depends on the block, so the
    /// array length is read at `block` and proven alongside the element.
    pub async fn proof_keys(
        &self,
        port: &dyn ChainDataPort,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
        position: usize,
        block: &BlockRef,
    ) -> Result<Vec<H256>, TokenError> {
        let slot = map_slot(holder.as_bytes(), position)?;
        match self {
            TokenProof::Mapbased(_) => Ok(vec![slot]),
            TokenProof::CheckpointList(_) => {
                let length = port.storage_at(ctx, token, slot, Some(block.number)).await?;
                let length = U256::from_big_endian(length.as_bytes());
                if length.is_zero() {
                    return Err(TokenError::NoCheckpoints {
                        position,
                        block: block.number,
                    });
                }
                debug!("{length} checkpoints at block {}", block.number);
                let last = array_element_slot(slot, length - U256::one());
                Ok(vec![last, slot])
            }
        }
    }

    /// Reads the proven storage word with the kind's decoder.
    pub fn decode_value(&self, raw_hex: &str, decimals: u8) -> Result<DecodedValue, DecodeError> {
        match self {
            TokenProof::Mapbased(_) => MapValueDecoder.decode(raw_hex, decimals),
            TokenProof::CheckpointList(_) => CheckpointValueDecoder.decode(raw_hex, decimals),
        }
    }
}
