//! Finding the declared slot of a token's balance mapping by comparing storage
//! against a balance already known from `balanceOf`.
use async_trait::async_trait;
use ethers::types::{Address, U256};
use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::{
    client::{ChainDataPort, ChainError, RequestContext},
    decode::{CheckpointValueDecoder, MapValueDecoder, ValueDecoder},
    slot::{array_element_slot, map_slot, SlotError},
    types::Balance,
    utils::hex_encode,
};

/// Mapping positions tried before giving up.
pub const DISCOVERY_ITERATIONS: usize = 30;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No balance slot found in the first {searched} positions")]
    SlotNotFound { searched: usize },
    #[error("Chain error {0}")]
    Chain(#[from] ChainError),
    #[error("Slot error {0}")]
    Slot(#[from] SlotError),
}

/// Accepted candidate of a discovery run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredSlot {
    /// Declared slot of the balance mapping.
    pub position: usize,
    /// Full precision amount decoded from storage at that position.
    pub amount: Balance,
}

/// A way of locating the balance mapping of a token contract.
#[async_trait]
pub trait SlotDiscovery: Send + Sync {
    /// Reads storage at the node's latest state until a position decodes to `expected`.
    async fn discover(
        &self,
        port: &dyn ChainDataPort,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
        expected: &Balance,
    ) -> Result<DiscoveredSlot, DiscoveryError>;
}

/// Brute force over `mapping(address => uint256)` declared at positions `0..iterations`.
///
/// Amounts are compared truncated to 64 bits, so tokens with very large
/// balances may be missed or matched at the wrong position.
#[derive(Clone, Debug)]
pub struct MapSlotDiscovery<D = MapValueDecoder> {
    decoder: D,
    iterations: usize,
}

impl MapSlotDiscovery {
    pub fn new(iterations: usize) -> Self {
        MapSlotDiscovery::with_decoder(MapValueDecoder, iterations)
    }
}

impl<D: ValueDecoder> MapSlotDiscovery<D> {
    pub fn with_decoder(decoder: D, iterations: usize) -> Self {
        MapSlotDiscovery {
            decoder,
            iterations,
        }
    }
}

impl Default for MapSlotDiscovery {
    fn default() -> Self {
        MapSlotDiscovery::new(DISCOVERY_ITERATIONS)
    }
}

#[async_trait]
impl<D: ValueDecoder> SlotDiscovery for MapSlotDiscovery<D> {
    async fn discover(
        &self,
        port: &dyn ChainDataPort,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
        expected: &Balance,
    ) -> Result<DiscoveredSlot, DiscoveryError> {
        for position in 0..self.iterations {
            let slot = map_slot(holder.as_bytes(), position)?;
            let word = port.storage_at(ctx, token, slot, None).await?;
            let candidate = match self.decoder.decode(&hex_encode(word), expected.decimals()) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!("position {position}: skipped, {e}");
                    continue;
                }
            };
            debug!("position {position}: storage holds {}", candidate.balance);
            if candidate.balance.truncated() == expected.truncated() {
                return Ok(DiscoveredSlot {
                    position,
                    amount: candidate.balance,
                });
            }
        }
        Err(DiscoveryError::SlotNotFound {
            searched: self.iterations,
        })
    }
}

/// MiniMe tokens keep `mapping(address => Checkpoint[])`. The latest
/// checkpoint of the holder is compared against the expected balance.
#[derive(Clone, Debug)]
pub struct CheckpointSlotDiscovery {
    iterations: usize,
}

impl CheckpointSlotDiscovery {
    pub fn new(iterations: usize) -> Self {
        CheckpointSlotDiscovery { iterations }
    }
}

impl Default for CheckpointSlotDiscovery {
    fn default() -> Self {
        CheckpointSlotDiscovery::new(DISCOVERY_ITERATIONS)
    }
}

#[async_trait]
impl SlotDiscovery for CheckpointSlotDiscovery {
    async fn discover(
        &self,
        port: &dyn ChainDataPort,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
        expected: &Balance,
    ) -> Result<DiscoveredSlot, DiscoveryError> {
        for position in 0..self.iterations {
            let length_slot = map_slot(holder.as_bytes(), position)?;
            let length = port.storage_at(ctx, token, length_slot, None).await?;
            let length = U256::from_big_endian(length.as_bytes());
            if length.is_zero() {
                debug!("position {position}: no checkpoints");
                continue;
            }
            let last = array_element_slot(length_slot, length - U256::one());
            let word = port.storage_at(ctx, token, last, None).await?;
            let checkpoint =
                match CheckpointValueDecoder.decode(&hex_encode(word), expected.decimals()) {
                    Ok(checkpoint) => checkpoint,
                    Err(e) => {
                        debug!("position {position}: skipped, {e}");
                        continue;
                    }
                };
            debug!(
                "position {position}: {length} checkpoints, latest holds {}",
                checkpoint.balance
            );
            if checkpoint.balance.truncated() == expected.truncated() {
                return Ok(DiscoveredSlot {
                    position,
                    amount: checkpoint.balance,
                });
            }
        }
        Err(DiscoveryError::SlotNotFound {
            searched: self.iterations,
        })
    }
}
