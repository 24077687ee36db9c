//! Read-only access to chain data through a node's JSON-RPC interface.
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, Block, Bytes, EIP1186ProofResponse, H256, U256};
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::{
    config::{ConfigError, DEFAULT_TIMEOUT},
    rpc::{
        balance_of_calldata, eth_call, eth_get_proof, get_block_by_number, get_storage_at,
        JsonRpcRequest, JsonRpcResponse, DECIMALS_SELECTOR,
    },
    types::BlockRef,
    utils::{bytes_to_u256, hex_decode, u256_to_h256, UtilsError},
};

/// Scope of a single request to the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// The request fails with `ChainError::Timeout` once this elapses.
    pub timeout: Duration,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        RequestContext { timeout }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        RequestContext::new(DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Reqwest error {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Request {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
    #[error("Node returned error for {method} ({code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("Node returned no result for {0}")]
    MissingResult(String),
    #[error("Block retrieved does not yet have a number")]
    NoBlockNumber,
    #[error("Return data for {call} is malformed: {reason}")]
    InvalidReturnData { call: String, reason: String },
    #[error("Utils error {0}")]
    UtilsError(#[from] UtilsError),
}

impl ChainError {
    /// True for failures of the connection to the node (as opposed to odd data).
    /// A caller may retry the whole run for these.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChainError::ReqwestError(_) | ChainError::Timeout { .. } | ChainError::Rpc { .. }
        )
    }
}

/// Chain data needed to discover a balance slot and prove it.
///
/// Every call takes the request context it must honour.
#[async_trait]
pub trait ChainDataPort: Send + Sync {
    /// `decimals()` of the token contract.
    async fn decimals(&self, ctx: &RequestContext, token: Address) -> Result<u8, ChainError>;
    /// `balanceOf(holder)` of the token contract, as the raw integer.
    async fn balance_of(
        &self,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError>;
    /// Raw storage word. `None` reads the node's latest state.
    async fn storage_at(
        &self,
        ctx: &RequestContext,
        token: Address,
        key: H256,
        block: Option<u64>,
    ) -> Result<H256, ChainError>;
    /// Block by number, `None` for the latest block.
    async fn block(&self, ctx: &RequestContext, number: Option<u64>)
        -> Result<BlockRef, ChainError>;
    /// Account proof plus storage proofs for `keys` at `block`.
    async fn proof(
        &self,
        ctx: &RequestContext,
        token: Address,
        keys: &[H256],
        block: u64,
    ) -> Result<EIP1186ProofResponse, ChainError>;
}

/// Talks to an Ethereum node over HTTP JSON-RPC.
#[derive(Clone, Debug)]
pub struct NodeClient {
    url: Url,
    client: Client,
}

impl NodeClient {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        Ok(NodeClient {
            url: Url::parse(url)?,
            client: Client::builder().build()?,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        request: JsonRpcRequest,
    ) -> Result<T, ChainError> {
        let method = request.method.clone();
        debug!("calling {method}");
        let response = tokio::time::timeout(ctx.timeout, self.exchange::<T>(&request))
            .await
            .map_err(|_| ChainError::Timeout {
                method: method.clone(),
                timeout: ctx.timeout,
            })??;
        if let Some(error) = response.error {
            return Err(ChainError::Rpc {
                method,
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or(ChainError::MissingResult(method))
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse<T>, reqwest::Error> {
        self.client
            .post(self.url.clone())
            .json(request)
            .send()
            .await?
            .json()
            .await
    }

    async fn call_word(
        &self,
        ctx: &RequestContext,
        token: Address,
        data: &[u8],
        name: &str,
    ) -> Result<U256, ChainError> {
        let output: Bytes = self.call(ctx, eth_call(token, data)).await?;
        if output.len() != 32 {
            return Err(ChainError::InvalidReturnData {
                call: name.to_owned(),
                reason: format!("expected 32 bytes, got {}", output.len()),
            });
        }
        Ok(bytes_to_u256(&output)?)
    }
}

#[async_trait]
impl ChainDataPort for NodeClient {
    async fn decimals(&self, ctx: &RequestContext, token: Address) -> Result<u8, ChainError> {
        let word = self
            .call_word(ctx, token, &DECIMALS_SELECTOR, "decimals()")
            .await?;
        if word > U256::from(u8::MAX) {
            return Err(ChainError::InvalidReturnData {
                call: "decimals()".to_owned(),
                reason: format!("{word} does not fit in uint8"),
            });
        }
        Ok(word.as_u32() as u8)
    }

    async fn balance_of(
        &self,
        ctx: &RequestContext,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        self.call_word(ctx, token, &balance_of_calldata(holder), "balanceOf(address)")
            .await
    }

    async fn storage_at(
        &self,
        ctx: &RequestContext,
        token: Address,
        key: H256,
        block: Option<u64>,
    ) -> Result<H256, ChainError> {
        // Some nodes drop leading zeros from the word.
        let value: String = self.call(ctx, get_storage_at(token, key, block)).await?;
        Ok(u256_to_h256(bytes_to_u256(&hex_decode(value)?)?))
    }

    async fn block(
        &self,
        ctx: &RequestContext,
        number: Option<u64>,
    ) -> Result<BlockRef, ChainError> {
        let block: Block<H256> = self.call(ctx, get_block_by_number(number)).await?;
        let Some(block_number) = block.number else {
            return Err(ChainError::NoBlockNumber)
        };
        Ok(BlockRef {
            number: block_number.as_u64(),
            hash: block.hash,
            state_root: block.state_root,
        })
    }

    async fn proof(
        &self,
        ctx: &RequestContext,
        token: Address,
        keys: &[H256],
        block: u64,
    ) -> Result<EIP1186ProofResponse, ChainError> {
        self.call(ctx, eth_get_proof(token, keys, block)).await
    }
}
