//! JSON-RPC 2.0 client over HTTP.
//!
//! Speaks the standard `eth_*` methods against a single endpoint. Writes
//! use `eth_sendTransaction`, so signing stays with whatever account the
//! endpoint manages for the configured `from` address.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use staker_types::{BlockNumber, EthAddress, TxHash, Wei};

use crate::client::{CallRequest, LedgerReader, LogFilter, RawLog, TxReceipt, TxSigner, WriteCall};
use crate::ChainError;

/// Default timeout for a single JSON-RPC round trip.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP JSON-RPC client. Cheap to clone; clones share the connection pool
/// and the request id counter.
#[derive(Clone)]
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    from: Option<EthAddress>,
    next_id: Arc<AtomicU64>,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogJson {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: String,
    log_index: String,
    #[serde(default)]
    removed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptJson {
    transaction_hash: String,
    block_number: String,
    #[serde(default)]
    status: Option<String>,
    gas_used: String,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            url: url.trim_end_matches('/').to_string(),
            http,
            from: None,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Set the account used as `from` for writes and `balances(address)` reads.
    pub fn with_account(mut self, account: EthAddress) -> Self {
        self.from = Some(account);
        self
    }

    pub fn account(&self) -> Option<EthAddress> {
        self.from
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one request. A `null` result comes back as `Ok(None)`.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ChainError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Unreachable(format!("{method} timed out: {e}"))
                } else if e.is_connect() {
                    ChainError::Unreachable(format!("connection failed: {e}"))
                } else {
                    ChainError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ChainError::RequestFailed(format!(
                "HTTP status {} for {method}",
                response.status()
            )));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))?;
        into_result(parsed)
    }

    async fn request_some<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        self.request(method, params)
            .await?
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method} returned null")))
    }
}

fn into_result<T>(response: RpcResponse<T>) -> Result<Option<T>, ChainError> {
    if let Some(err) = response.error {
        return Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result)
}

impl LedgerReader for JsonRpcClient {
    async fn block_number(&self) -> Result<BlockNumber, ChainError> {
        let raw: String = self.request_some("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(&raw).map(BlockNumber::new)
    }

    async fn balance(&self, address: &EthAddress, at: BlockNumber) -> Result<Wei, ChainError> {
        let raw: String = self
            .request_some(
                "eth_getBalance",
                json!([address.to_string(), block_tag(at)]),
            )
            .await?;
        parse_quantity(&raw).map(Wei::new)
    }

    async fn call(&self, request: &CallRequest, at: BlockNumber) -> Result<Vec<u8>, ChainError> {
        let raw: String = self
            .request_some(
                "eth_call",
                json!([
                    { "to": request.to.to_string(), "data": encode_hex(&request.data) },
                    block_tag(at)
                ]),
            )
            .await?;
        decode_hex(&raw)
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ChainError> {
        let rows: Vec<LogJson> = self
            .request_some(
                "eth_getLogs",
                json!([{
                    "address": filter.address.to_string(),
                    "topics": [encode_hex(&filter.topic0)],
                    "fromBlock": block_tag(filter.from_block),
                    "toBlock": block_tag(filter.to_block)
                }]),
            )
            .await?;
        rows.into_iter()
            .filter(|row| !row.removed)
            .map(parse_log)
            .collect()
    }
}

impl TxSigner for JsonRpcClient {
    async fn send_transaction(&self, call: &WriteCall) -> Result<TxHash, ChainError> {
        let from = self.from.ok_or(ChainError::NoAccount)?;
        let raw: String = self
            .request_some(
                "eth_sendTransaction",
                json!([{
                    "from": from.to_string(),
                    "to": call.to.to_string(),
                    "data": encode_hex(&call.data),
                    "value": to_quantity(call.value.raw())
                }]),
            )
            .await?;
        TxHash::from_hex(&raw).map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let receipt: Option<ReceiptJson> = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        receipt.map(parse_receipt).transpose()
    }
}

// ── Wire helpers ─────────────────────────────────────────────────────────

fn block_tag(at: BlockNumber) -> String {
    to_quantity(at.as_u64() as u128)
}

pub fn to_quantity(value: u128) -> String {
    format!("0x{value:x}")
}

pub fn parse_quantity(raw: &str) -> Result<u128, ChainError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity {raw:?} lacks 0x")))?;
    if digits.is_empty() {
        return Err(ChainError::InvalidResponse("empty quantity".into()));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("quantity {raw:?}: {e}")))
}

fn parse_quantity_u64(raw: &str) -> Result<u64, ChainError> {
    let value = parse_quantity(raw)?;
    u64::try_from(value).map_err(|_| ChainError::InvalidResponse(format!("{raw} exceeds u64")))
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn decode_hex(raw: &str) -> Result<Vec<u8>, ChainError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| ChainError::InvalidResponse(format!("hex data: {e}")))
}

fn decode_topic(raw: &str) -> Result<[u8; 32], ChainError> {
    let bytes = decode_hex(raw)?;
    bytes
        .try_into()
        .map_err(|_| ChainError::InvalidResponse(format!("topic {raw} is not 32 bytes")))
}

fn parse_log(row: LogJson) -> Result<RawLog, ChainError> {
    Ok(RawLog {
        address: EthAddress::from_hex(&row.address)
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?,
        topics: row
            .topics
            .iter()
            .map(|t| decode_topic(t))
            .collect::<Result<_, _>>()?,
        data: decode_hex(&row.data)?,
        block_number: BlockNumber::new(parse_quantity_u64(&row.block_number)?),
        log_index: parse_quantity_u64(&row.log_index)?,
    })
}

fn parse_receipt(row: ReceiptJson) -> Result<TxReceipt, ChainError> {
    // Pre-Byzantium receipts carry no status; treat them as successful.
    let success = match row.status.as_deref() {
        Some(status) => parse_quantity(status)? == 1,
        None => true,
    };
    Ok(TxReceipt {
        tx_hash: TxHash::from_hex(&row.transaction_hash)
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?,
        block_number: BlockNumber::new(parse_quantity_u64(&row.block_number)?),
        success,
        gas_used: parse_quantity_u64(&row.gas_used)?,
    })
}
