#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use url::Url;

use crate::config::{Config, RpcConfig, SyncConfig};
use crate::source::{BlockSource, SourceError};
use crate::types::{Block, RpcTransaction};

/// In-memory chain with switchable failures
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    head: u64,
    blocks: HashMap<u64, Block>,
    head_fails: bool,
    failing_blocks: HashSet<u64>,
    panicking_blocks: HashSet<u64>,
    hanging_blocks: HashSet<u64>,
    fetched: Vec<u64>,
}

impl MockSource {
    pub fn new(head: u64) -> Arc<Self> {
        let source = Self::default();
        source.state.lock().unwrap().head = head;
        Arc::new(source)
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn add_block(&self, number: u64, txs: Vec<RpcTransaction>) {
        self.state.lock().unwrap().blocks.insert(
            number,
            Block {
                number: format!("0x{number:x}"),
                transactions: txs,
            },
        );
    }

    pub fn fail_head(&self, fail: bool) {
        self.state.lock().unwrap().head_fails = fail;
    }

    pub fn fail_block(&self, number: u64, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.failing_blocks.insert(number);
        } else {
            state.failing_blocks.remove(&number);
        }
    }

    pub fn panic_on_block(&self, number: u64) {
        self.state.lock().unwrap().panicking_blocks.insert(number);
    }

    pub fn hang_on_block(&self, number: u64) {
        self.state.lock().unwrap().hanging_blocks.insert(number);
    }

    /// Block numbers requested so far, in order
    pub fn fetched(&self) -> Vec<u64> {
        self.state.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl BlockSource for MockSource {
    async fn head_block_number(&self) -> Result<u64, SourceError> {
        let state = self.state.lock().unwrap();
        if state.head_fails {
            return Err(SourceError::Unavailable("connection refused".into()));
        }
        Ok(state.head)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, SourceError> {
        let (panics, hang) = {
            let mut state = self.state.lock().unwrap();
            state.fetched.push(number);

            if state.failing_blocks.contains(&number) {
                return Err(SourceError::Decode(format!("bad block {number}")));
            }
            (
                state.panicking_blocks.remove(&number),
                state.hanging_blocks.contains(&number),
            )
        };

        // the lock is released first so a panic does not poison it
        if panics {
            panic!("corrupted block {number}");
        }
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        // empty blocks are served for anything up to head
        let state = self.state.lock().unwrap();
        match state.blocks.get(&number) {
            Some(block) => Ok(block.clone()),
            None if number <= state.head => Ok(Block {
                number: format!("0x{number:x}"),
                transactions: vec![],
            }),
            None => Err(SourceError::MissingBlock(number)),
        }
    }
}

pub fn rpc_tx(hash: &str, from: Address, to: Option<Address>) -> RpcTransaction {
    RpcTransaction {
        chain_id: "0x1".into(),
        hash: hash.into(),
        from: from.to_string(),
        to: to.map(|a| a.to_string()),
        ..Default::default()
    }
}

pub fn config(start_block: u64) -> Config {
    Config {
        rpc: RpcConfig {
            url: Url::parse("http://localhost:8545").unwrap(),
            timeout_secs: 5,
        },
        sync: SyncConfig {
            start_block,
            interval_secs: 10,
            seed_addresses: Default::default(),
        },
    }
}
