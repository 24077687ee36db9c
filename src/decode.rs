//! Turning raw storage words into token amounts.
use ethers::types::U256;
use serde::Serialize;
use thiserror::Error;

use crate::{
    types::Balance,
    utils::{bytes_to_u256, hex_decode, UtilsError},
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Storage value is not valid hex {0}")]
    InvalidHex(UtilsError),
    #[error("Storage value of {0} bytes is longer than a word")]
    TooLong(usize),
    #[error("Checkpoint block {0} does not fit in 64 bits")]
    BlockOutOfRange(U256),
}

/// What a storage word says about a holder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedValue {
    /// Scaled amount.
    pub balance: Balance,
    /// Full word as read from storage.
    pub raw: U256,
    /// Block from which a checkpoint applies. Only set for checkpoint-list tokens.
    pub checkpoint_block: Option<u64>,
}

/// Decoding of one storage word for a particular token layout.
pub trait ValueDecoder: Send + Sync {
    fn decode(&self, raw_hex: &str, decimals: u8) -> Result<DecodedValue, DecodeError>;
}

/// Whole word is the balance, as for `mapping(address => uint256)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MapValueDecoder;

impl ValueDecoder for MapValueDecoder {
    fn decode(&self, raw_hex: &str, decimals: u8) -> Result<DecodedValue, DecodeError> {
        let raw = read_word(raw_hex)?;
        Ok(DecodedValue {
            balance: Balance::new(raw, decimals),
            raw,
            checkpoint_block: None,
        })
    }
}

/// MiniMe `Checkpoint { uint128 fromBlock; uint128 value; }` packed into one word.
///
/// `value` occupies the high 16 bytes, `fromBlock` the low 16 bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckpointValueDecoder;

impl ValueDecoder for CheckpointValueDecoder {
    fn decode(&self, raw_hex: &str, decimals: u8) -> Result<DecodedValue, DecodeError> {
        let raw = read_word(raw_hex)?;
        let low_mask = (U256::one() << 128) - U256::one();
        let from_block = raw & low_mask;
        if from_block > U256::from(u64::MAX) {
            return Err(DecodeError::BlockOutOfRange(from_block));
        }
        Ok(DecodedValue {
            balance: Balance::new(raw >> 128, decimals),
            raw,
            checkpoint_block: Some(from_block.as_u64()),
        })
    }
}

fn read_word(raw_hex: &str) -> Result<U256, DecodeError> {
    let bytes = hex_decode(raw_hex).map_err(DecodeError::InvalidHex)?;
    if bytes.len() > 32 {
        return Err(DecodeError::TooLong(bytes.len()));
    }
    bytes_to_u256(&bytes).map_err(DecodeError::InvalidHex)
}
