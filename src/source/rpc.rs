use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::trace;
use url::Url;

use super::utils::{parse_quantity, to_quantity};
use super::{BlockSource, SourceError};
use crate::config::RpcConfig;
use crate::types::Block;

const JSONRPC_VERSION: &str = "2.0";
const BLOCK_NUMBER: &str = "eth_blockNumber";
const GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";

/// Ethereum JSON-RPC node reached over HTTP
#[derive(Debug, Clone)]
pub struct RpcBlockSource {
    client: reqwest::Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcBlockSource {
    pub fn new(config: &RpcConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Sends a single request. `Ok(None)` means the node answered with a `null` result
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, SourceError> {
        trace!(method, %params, "rpc call");

        let body = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "{method} returned status {status}"
            )));
        }

        let bytes = resp.bytes().await.map_err(transport_error)?;
        decode_response(&bytes)
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn head_block_number(&self) -> Result<u64, SourceError> {
        let head: String = self
            .call(BLOCK_NUMBER, json!([]))
            .await?
            .ok_or_else(|| SourceError::Decode(format!("{BLOCK_NUMBER} returned null")))?;

        parse_quantity(&head)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, SourceError> {
        self.call(GET_BLOCK_BY_NUMBER, json!([to_quantity(number), true]))
            .await?
            .ok_or(SourceError::MissingBlock(number))
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else if err.is_decode() {
        SourceError::Decode(err.to_string())
    } else {
        SourceError::Unavailable(err.to_string())
    }
}

fn decode_response<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>, SourceError> {
    let resp: Response<T> =
        serde_json::from_slice(bytes).map_err(|e| SourceError::Decode(e.to_string()))?;

    match resp {
        Response {
            error: Some(RpcError { code, message }),
            ..
        } => Err(SourceError::Rpc { code, message }),
        Response { result, .. } => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_head() {
        let head: Option<String> =
            decode_response(br#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#).unwrap();
        assert_eq!(parse_quantity(&head.unwrap()).unwrap(), 16);
    }

    #[test]
    fn test_decode_block() {
        let body = br#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "number": "0x10",
                "hash": "0xfeed",
                "miner": "0x0000000000000000000000000000000000000000",
                "transactions": [{
                    "hash": "0xh1",
                    "from": "0xe75ed6f453c602bd696ce27af11565edc9b46b0d",
                    "to": "0x00000000009e50a7ddb7a7b0e2ee6604fd120e49",
                    "value": "0x0",
                    "accessList": []
                }]
            }
        }"#;

        let block: Block = decode_response(body).unwrap().unwrap();
        assert_eq!(block.number, "0x10");
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].hash, "0xh1");
        assert!(block.transactions[0].recipient().is_some());
    }

    #[test]
    fn test_decode_null_block() {
        let block: Option<Block> =
            decode_response(br#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn test_decode_rpc_error() {
        let res: Result<Option<String>, _> = decode_response(
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#,
        );

        match res {
            Err(SourceError::Rpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "header not found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage() {
        let res: Result<Option<String>, _> = decode_response(b"<html>bad gateway</html>");
        assert!(matches!(res, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let config = RpcConfig {
            url: Url::parse("http://127.0.0.1:1").unwrap(),
            timeout_secs: 1,
        };
        let source = RpcBlockSource::new(&config).unwrap();

        let err = source.head_block_number().await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
