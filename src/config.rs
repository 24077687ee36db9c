//! Settings for a proof run and validation of user supplied values.
use std::time::Duration;

use ethers::types::Address;
use thiserror::Error;

use crate::{
    discovery::DISCOVERY_ITERATIONS,
    utils::{hex_decode, UtilsError},
};

/// Upper bound for one request to the node.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Token type not supported {0}")]
    UnsupportedTokenKind(String),
    #[error("Address {address} is not valid hex {source}")]
    AddressNotHex { source: UtilsError, address: String },
    #[error("Address {address} has {length} bytes, expected 20")]
    AddressLength { address: String, length: usize },
    #[error("Url error {0}")]
    UrlError(#[from] url::ParseError),
    #[error("Unable to build http client {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofConfig {
    /// Per-request timeout for every call to the node.
    pub timeout: Duration,
    /// Number of mapping positions tried during slot discovery.
    pub iterations: usize,
}

impl Default for ProofConfig {
    fn default() -> Self {
        ProofConfig {
            timeout: DEFAULT_TIMEOUT,
            iterations: DISCOVERY_ITERATIONS,
        }
    }
}

/// Parses a 0x-prefixed address, rejecting anything that is not exactly 20 bytes.
pub fn parse_address(address: &str) -> Result<Address, ConfigError> {
    let bytes = hex_decode(address).map_err(|source| ConfigError::AddressNotHex {
        source,
        address: address.to_owned(),
    })?;
    if bytes.len() != 20 {
        return Err(ConfigError::AddressLength {
            address: address.to_owned(),
            length: bytes.len(),
        });
    }
    Ok(Address::from_slice(&bytes))
}
