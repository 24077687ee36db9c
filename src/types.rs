use std::{fmt::Display, str::FromStr};

use ethers::types::{H256, U256};
use serde::Serialize;

use crate::config::ConfigError;

/// Facts about the token contract that do not change between blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub decimals: u8,
}

/// A token amount as the raw integer stored on chain and its decimal scale.
///
/// Displays as `raw / 10^decimals` with exactly `decimals` fraction digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Balance {
    raw: U256,
    decimals: u8,
}

impl Balance {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Balance { raw, decimals }
    }
    pub fn raw(&self) -> U256 {
        self.raw
    }
    pub fn decimals(&self) -> u8 {
        self.decimals
    }
    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
    /// The raw amount cut down to 64 bits. Amounts above `u64::MAX` saturate.
    ///
    /// Lossy: distinct large balances can compare equal.
    pub fn truncated(&self) -> u64 {
        if self.raw > U256::from(u64::MAX) {
            return u64::MAX;
        }
        self.raw.as_u64()
    }
}

impl Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.raw);
        }
        let digits = self.raw.to_string();
        let scale = self.decimals as usize;
        let padded = match digits.len() > scale {
            true => digits,
            false => format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits),
        };
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{integer}.{fraction}")
    }
}

/// The block every pinned read of one run is made against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BlockRef {
    pub number: u64,
    pub hash: Option<H256>,
    pub state_root: H256,
}

/// Storage layouts that a balance proof can be produced for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// `mapping(address => uint256)`, most ERC20 tokens.
    Mapbased,
    /// MiniMe style `mapping(address => Checkpoint[])`.
    #[serde(rename = "minime")]
    CheckpointList,
}

impl FromStr for TokenKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mapbased" => Ok(TokenKind::Mapbased),
            "minime" | "checkpoint-list" => Ok(TokenKind::CheckpointList),
            other => Err(ConfigError::UnsupportedTokenKind(other.to_owned())),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Mapbased => write!(f, "mapbased"),
            TokenKind::CheckpointList => write!(f, "minime"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_display() {
        assert_eq!(Balance::new(U256::from(500), 2).to_string(), "5.00");
        assert_eq!(Balance::new(U256::from(5), 3).to_string(), "0.005");
        assert_eq!(Balance::new(U256::zero(), 2).to_string(), "0.00");
        assert_eq!(Balance::new(U256::from(123), 0).to_string(), "123");
        assert_eq!(
            Balance::new(U256::from(10).pow(U256::from(18)), 18).to_string(),
            "1.000000000000000000"
        );
    }

    #[test]
    fn test_truncation_saturates() {
        assert_eq!(Balance::new(U256::from(500), 2).truncated(), 500);
        let huge = Balance::new(U256::MAX, 18);
        assert_eq!(huge.truncated(), u64::MAX);
        let just_above = Balance::new(U256::from(u64::MAX) + 1, 18);
        assert_eq!(just_above.truncated(), huge.truncated());
    }

    #[test]
    fn test_token_kind_parsing() {
        assert_eq!("mapbased".parse::<TokenKind>().unwrap(), TokenKind::Mapbased);
        assert_eq!("minime".parse::<TokenKind>().unwrap(), TokenKind::CheckpointList);
        assert!(matches!(
            "erc721".parse::<TokenKind>(),
            Err(ConfigError::UnsupportedTokenKind(_))
        ));
    }

    #[test]
    fn test_token_kind_names_agree() {
        for kind in [TokenKind::Mapbased, TokenKind::CheckpointList] {
            let name = kind.to_string();
            assert_eq!(serde_json::to_value(kind).unwrap(), name.as_str());
            assert_eq!(name.parse::<TokenKind>().unwrap(), kind);
        }
    }
}
