use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::utils::hex_encode;

/// Function selector for `decimals()`.
pub(crate) const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// Function selector for `balanceOf(address)`.
pub(crate) const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest {
    jsonrpc: String,
    pub(crate) method: String,
    params: Vec<Value>,
    id: u64,
}

/// Response envelope. A node reports failures in `error` instead of `result`.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub(crate) result: Option<T>,
    pub(crate) error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub(crate) code: i64,
    pub(crate) message: String,
}

impl JsonRpcRequest {
    fn new(method: &str, params: Vec<Value>) -> Self {
        JsonRpcRequest {
            jsonrpc: "2.0".to_owned(),
            method: method.to_owned(),
            params,
            id: 1,
        }
    }
}

/// Block tag for a request: "0x"-prefixed number or "latest".
pub(crate) fn block_tag(block: Option<u64>) -> String {
    match block {
        Some(number) => format!("0x{:x}", number),
        None => "latest".to_owned(),
    }
}

/// Generates a JSON-RPC request for eth_call against the latest block.
pub(crate) fn eth_call(to: Address, data: &[u8]) -> JsonRpcRequest {
    JsonRpcRequest::new(
        "eth_call",
        vec![
            json!({"to": hex_encode(to), "data": hex_encode(data)}),
            json!("latest"),
        ],
    )
}

/// Calldata for `balanceOf(holder)`.
pub(crate) fn balance_of_calldata(holder: Address) -> Vec<u8> {
    let mut data = BALANCE_OF_SELECTOR.to_vec();
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(holder.as_bytes());
    data
}

/// Generates a JSON-RPC request for eth_getStorageAt for one slot of a contract.
pub(crate) fn get_storage_at(contract: Address, key: H256, block: Option<u64>) -> JsonRpcRequest {
    JsonRpcRequest::new(
        "eth_getStorageAt",
        vec![
            json!(hex_encode(contract)),
            json!(hex_encode(key)),
            json!(block_tag(block)),
        ],
    )
}

/// Generates a JSON-RPC request for eth_getBlockByNumber for
/// the specified block (e.g., "0xabc", "latest").
pub(crate) fn get_block_by_number(block: Option<u64>) -> JsonRpcRequest {
    JsonRpcRequest::new(
        "eth_getBlockByNumber",
        vec![json!(block_tag(block)), Value::Bool(false)],
    )
}

/// Generates a JSON-RPC request for eth_getProof for
/// the given account and storage slots at the specified block.
pub(crate) fn eth_get_proof(account: Address, keys: &[H256], block: u64) -> JsonRpcRequest {
    let slots: Vec<String> = keys.iter().map(hex_encode).collect();
    JsonRpcRequest::new(
        "eth_getProof",
        vec![
            json!(hex_encode(account)),
            json!(slots),
            json!(block_tag(Some(block))),
        ],
    )
}
