//! JSON-RPC 2.0 client for the chain endpoint.
//!
//! Single requests plus batched requests (several reads in one HTTP round
//! trip, matched back to callers by request id).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::ChainError;

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: &str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
    pub id: u64,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// A `null` result (e.g. a receipt that has not landed yet) passes
    /// through as `Value::Null`; callers decode from there.
    fn into_result(self) -> Result<Value, ChainError> {
        if let Some(err) = self.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// HTTP JSON-RPC client with monotonically increasing request ids.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Issue a single JSON-RPC call.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let request = RpcRequest::new(method, params, self.next_id());
        debug!(method, id = request.id, "rpc call");
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Issue several calls in one HTTP request. Results come back in the
    /// order the calls were given, regardless of server response order.
    pub async fn batch(
        &self,
        calls: &[(&str, Value)],
    ) -> Result<Vec<Result<Value, ChainError>>, ChainError> {
        let requests: Vec<RpcRequest> = calls
            .iter()
            .map(|(method, params)| RpcRequest::new(method, params.clone(), self.next_id()))
            .collect();
        debug!(count = requests.len(), "rpc batch call");

        let responses: Vec<RpcResponse> = self
            .http
            .post(&self.url)
            .json(&requests)
            .send()
            .await?
            .json()
            .await?;

        if responses.len() != requests.len() {
            return Err(ChainError::BadResponse(format!(
                "batch returned {} responses for {} requests",
                responses.len(),
                requests.len()
            )));
        }

        let mut results: Vec<Option<Result<Value, ChainError>>> =
            requests.iter().map(|_| None).collect();
        for response in responses {
            let slot = requests
                .iter()
                .position(|r| r.id == response.id)
                .ok_or_else(|| ChainError::BadResponse("unknown id in batch response".into()))?;
            results[slot] = Some(response.into_result());
        }
        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ChainError::BadResponse("duplicate id in batch response".into()))
    }

    // -- eth_* helpers --

    /// `eth_call` against `to` with the given calldata; returns the raw
    /// return bytes.
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<Vec<u8>, ChainError> {
        let result = self
            .call("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await?;
        decode_hex_value(&result)
    }

    /// `eth_estimateGas`, which doubles as the simulation step: a reverting
    /// call fails estimation with the revert error.
    pub async fn estimate_gas(&self, from: &str, to: &str, data: &str) -> Result<u64, ChainError> {
        let result = self
            .call(
                "eth_estimateGas",
                json!([{"from": from, "to": to, "data": data}]),
            )
            .await?;
        decode_hex_quantity(&result)
    }

    pub async fn gas_price(&self) -> Result<u64, ChainError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        decode_hex_quantity(&result)
    }

    pub async fn transaction_count(&self, address: &str) -> Result<u64, ChainError> {
        let result = self
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        decode_hex_quantity(&result)
    }

    /// Submit a signed raw transaction; returns the transaction hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, ChainError> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::BadResponse("transaction hash is not a string".into()))
    }

    /// Poll for the receipt of `hash` until it lands or `attempts` polls
    /// at 500ms intervals are exhausted. Errors with [`ChainError::Reverted`]
    /// on a failed receipt status.
    pub async fn wait_for_receipt(&self, hash: &str, attempts: u32) -> Result<(), ChainError> {
        for _ in 0..attempts {
            let result = self
                .call("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if let Some(receipt) = result.as_object() {
                let status = receipt
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("0x0");
                if status == "0x1" {
                    return Ok(());
                }
                return Err(ChainError::Reverted(hash.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err(ChainError::ReceiptTimeout(hash.to_string()))
    }
}

/// Decode a `0x`-prefixed hex byte string result.
fn decode_hex_value(value: &Value) -> Result<Vec<u8>, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::BadResponse("result is not a string".into()))?;
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| ChainError::BadResponse(e.to_string()))
}

/// Decode a `0x`-prefixed hex quantity (minimal-length) result.
fn decode_hex_quantity(value: &Value) -> Result<u64, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::BadResponse("quantity is not a string".into()))?;
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(stripped, 16).map_err(|e| ChainError::BadResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_quantity() {
        assert_eq!(decode_hex_quantity(&json!("0x1a")).unwrap(), 26);
        assert_eq!(decode_hex_quantity(&json!("0x0")).unwrap(), 0);
        assert!(decode_hex_quantity(&json!(12)).is_err());
        assert!(decode_hex_quantity(&json!("0xzz")).is_err());
    }

    #[test]
    fn test_decode_hex_value() {
        assert_eq!(decode_hex_value(&json!("0x01ff")).unwrap(), vec![0x01, 0xff]);
        assert!(decode_hex_value(&json!("0x0f0")).is_err());
    }

    #[test]
    fn test_rpc_response_error_maps() {
        let response = RpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(RpcErrorBody {
                code: -32000,
                message: "execution reverted".into(),
            }),
            id: 7,
        };
        assert!(matches!(
            response.into_result(),
            Err(ChainError::Rpc { code: -32000, .. })
        ));
    }
}
