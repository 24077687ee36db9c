use ethers::types::{H256, U256};
use hex::FromHexError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UtilsError {
    #[error("Hex utils error {0}")]
    HexUtils(#[from] FromHexError),
    #[error("Value of {0} bytes does not fit in a 32 byte word")]
    WordTooLong(usize),
}

/// Converts bytes to 0x-prefixed hex string.
pub fn hex_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Converts 0x-prefixed hex string to bytes.
///
/// Odd length strings (e.g., "0x1f4" as returned for quantities) are left
/// padded with a zero nibble.
pub fn hex_decode<T: AsRef<str>>(string: T) -> Result<Vec<u8>, UtilsError> {
    let s = string.as_ref().trim_start_matches("0x");
    if s.len() % 2 == 1 {
        return Ok(hex::decode(format!("0{s}"))?);
    }
    Ok(hex::decode(s)?)
}

/// Reads a big endian word of at most 32 bytes.
pub fn bytes_to_u256(bytes: &[u8]) -> Result<U256, UtilsError> {
    if bytes.len() > 32 {
        return Err(UtilsError::WordTooLong(bytes.len()));
    }
    Ok(U256::from_big_endian(bytes))
}

/// Big endian 32 byte representation of a word.
pub fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256(bytes)
}
