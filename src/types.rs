use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// A transaction retained for a subscribed address
///
/// Every field is carried exactly as the node encoded it. Nothing is validated on ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub chain_id: String,
    pub block_number: String,
    pub hash: String,
    pub nonce: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
}

/// The slice of a JSON-RPC block needed for scanning
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub number: String,

    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

/// Transaction as returned by `eth_getBlockByNumber` with full transaction objects
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcTransaction {
    pub chain_id: String,
    pub block_number: String,
    pub hash: String,
    pub nonce: String,
    pub from: String,
    /// `null` for contract creations
    pub to: Option<String>,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
}

impl RpcTransaction {
    pub fn sender(&self) -> Option<Address> {
        parse_address(&self.from)
    }

    pub fn recipient(&self) -> Option<Address> {
        self.to.as_deref().and_then(parse_address)
    }
}

impl From<RpcTransaction> for Transaction {
    fn from(tx: RpcTransaction) -> Self {
        Self {
            chain_id: tx.chain_id,
            block_number: tx.block_number,
            hash: tx.hash,
            nonce: tx.nonce,
            from: tx.from,
            to: tx.to.unwrap_or_default(),
            value: tx.value,
            gas: tx.gas,
            gas_price: tx.gas_price,
            input: tx.input,
        }
    }
}

/// Parses a textual address. Accepts any hex casing, so mixed-case and lowercase
/// forms of the same account map to the same key
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    Address::from_str(s).ok()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("0xe75ed6f453c602bd696ce27af11565edc9b46b0d")]
    #[case("0xE75ED6F453C602BD696CE27AF11565EDC9B46B0D")]
    #[case(" 0xe75ed6f453c602bd696ce27af11565edc9b46b0d ")]
    fn test_parse_address_normalizes(#[case] input: &str) {
        let expected = Address::from_str("0xe75ed6f453c602bd696ce27af11565edc9b46b0d").unwrap();
        assert_eq!(parse_address(input), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("0x1234")]
    #[case("not an address")]
    fn test_parse_address_rejects(#[case] input: &str) {
        assert_eq!(parse_address(input), None);
    }

    #[test]
    fn test_decode_rpc_transaction() {
        let json = r#"{
            "blockHash": "0xabc",
            "blockNumber": "0x13cd296",
            "chainId": "0x1",
            "from": "0xe75ed6f453c602bd696ce27af11565edc9b46b0d",
            "gas": "0x46b47",
            "gasPrice": "0x1a5c9d8f9",
            "hash": "0x1b0d",
            "input": "0x",
            "nonce": "0x2c08b",
            "to": null,
            "value": "0xf5232269",
            "type": "0x2"
        }"#;

        let tx: RpcTransaction = serde_json::from_str(json).unwrap();
        assert!(tx.sender().is_some());
        assert_eq!(tx.recipient(), None);

        let tx: Transaction = tx.into();
        assert_eq!(tx.to, "");
        assert_eq!(tx.block_number, "0x13cd296");
        assert_eq!(tx.gas_price, "0x1a5c9d8f9");
    }
}
