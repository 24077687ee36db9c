//! Storage keys for Solidity mappings and dynamic arrays.
use ethers::{
    types::{H256, U256},
    utils::keccak256,
};
use thiserror::Error;

use crate::utils::u256_to_h256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("Holder address must be 20 bytes, got {0}")]
    InvalidAddressLength(usize),
}

/// Storage key of `holder` in a `mapping(address => T)` declared at slot `position`.
///
/// keccak256(leftpad32(holder) ++ leftpad32(position))
pub fn map_slot(holder: &[u8], position: usize) -> Result<H256, SlotError> {
    if holder.len() != 20 {
        return Err(SlotError::InvalidAddressLength(holder.len()));
    }
    let mut preimage = [0u8; 64];
    preimage[12..32].copy_from_slice(holder);
    U256::from(position).to_big_endian(&mut preimage[32..]);
    Ok(H256(keccak256(preimage)))
}

/// Storage key of element `index` of a dynamic array whose length is held at `array_slot`.
pub fn array_element_slot(array_slot: H256, index: U256) -> H256 {
    let start = U256::from_big_endian(&keccak256(array_slot));
    let (key, _) = start.overflowing_add(index);
    u256_to_h256(key)
}
