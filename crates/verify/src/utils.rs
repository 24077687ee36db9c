use ethers::types::{H256, U256};

/// Converts bytes to 0x-prefixed hex string.
pub fn hex_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Storage keys arrive as numbers, nodes may drop their leading zeros.
/// Restores the full 32 byte big-endian word.
pub fn storage_key_word(key: U256) -> H256 {
    let mut word = [0u8; 32];
    key.to_big_endian(&mut word);
    H256(word)
}
