use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{info, warn};

use crate::store::{SubscriptionRegistry, TransactionStore};
use crate::types::{parse_address, Transaction};

/// Entry point for external callers: subscribe to addresses, read the scan cursor,
/// and collect accumulated transactions
///
/// Nothing here fails towards the caller. Scanner-side errors only show up in logs
/// and in a cursor that stops moving
#[derive(Debug, Clone)]
pub struct Api {
    registry: Arc<SubscriptionRegistry>,
    store: Arc<TransactionStore>,
}

impl Api {
    pub fn new(registry: Arc<SubscriptionRegistry>, store: Arc<TransactionStore>) -> Self {
        Self { registry, store }
    }

    /// Last fully scanned block
    pub fn current_block(&self) -> u64 {
        self.store.cursor()
    }

    /// Starts tracking `address`. Always `true` for a well-formed address, including
    /// one that was already subscribed. Text that does not parse as an address is
    /// refused with `false`, since it could never match a transaction
    pub async fn subscribe(&self, address: &str) -> bool {
        let Some(address) = parse_address(address) else {
            warn!(address, "refusing to subscribe invalid address");
            return false;
        };

        self.registry.subscribe(address).await;
        info!(%address, "address subscribed");
        true
    }

    /// Returns and forgets the transactions accumulated for `address` since the last call
    ///
    /// An address that is not subscribed yet gets subscribed as a side effect, and the
    /// call returns nothing: transactions only accumulate from the next scanned block.
    /// Callers cannot tell this apart from "subscribed, nothing new"
    pub async fn get_transactions(&self, address: &str) -> Vec<Transaction> {
        let Some(address) = parse_address(address) else {
            warn!(address, "invalid address");
            return vec![];
        };

        if self.ensure_subscribed(address).await {
            return vec![];
        }

        self.store.drain(&address).await
    }

    /// Returns `true` if `address` had to be subscribed now
    async fn ensure_subscribed(&self, address: Address) -> bool {
        if self.registry.is_subscribed(&address).await {
            return false;
        }

        let added = self.registry.subscribe(address).await;
        if added {
            info!(%address, "address implicitly subscribed");
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    const A: &str = "0xe75ed6f453c602bd696ce27af11565edc9b46b0d";
    const B: &str = "0x00000000009e50a7ddb7a7b0e2ee6604fd120e49";

    struct Fixture {
        api: Api,
        registry: Arc<SubscriptionRegistry>,
        store: Arc<TransactionStore>,
    }

    #[fixture]
    fn ctx() -> Fixture {
        let registry = Arc::new(SubscriptionRegistry::new());
        let store = Arc::new(TransactionStore::new(100));

        Fixture {
            api: Api::new(registry.clone(), store.clone()),
            registry,
            store,
        }
    }

    fn tx(hash: &str) -> Transaction {
        Transaction {
            chain_id: "0x1".into(),
            block_number: "0x64".into(),
            hash: hash.into(),
            nonce: "0x0".into(),
            from: A.into(),
            to: B.into(),
            value: "0x0".into(),
            gas: "0x5208".into(),
            gas_price: "0x1".into(),
            input: "0x".into(),
        }
    }

    fn addr(s: &str) -> Address {
        parse_address(s).unwrap()
    }

    #[rstest]
    fn test_current_block(ctx: Fixture) {
        assert_eq!(ctx.api.current_block(), 100);

        ctx.store.set_cursor(103);
        assert_eq!(ctx.api.current_block(), 103);
    }

    #[rstest]
    #[tokio::test]
    async fn test_subscribe(ctx: Fixture) {
        assert!(ctx.api.subscribe(A).await);
        assert!(ctx.api.subscribe(A).await);
        assert!(ctx.registry.is_subscribed(&addr(A)).await);
        assert_eq!(ctx.registry.len().await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_subscribe_is_case_insensitive(ctx: Fixture) {
        ctx.api.subscribe(&A.to_uppercase().replacen("0X", "0x", 1)).await;

        assert!(ctx.registry.is_subscribed(&addr(A)).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_subscribe_rejects_malformed_address(ctx: Fixture) {
        assert!(!ctx.api.subscribe("0xnope").await);
        assert!(!ctx.api.subscribe("").await);
        assert!(ctx.registry.is_empty().await);
    }

    #[rstest]
    #[case("")]
    #[case("garbage")]
    #[tokio::test]
    async fn test_get_transactions_invalid_has_no_side_effect(
        ctx: Fixture,
        #[case] address: &str,
    ) {
        assert!(ctx.api.get_transactions(address).await.is_empty());
        assert!(ctx.registry.is_empty().await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_transactions_auto_subscribes(ctx: Fixture) {
        assert!(!ctx.registry.is_subscribed(&addr(B)).await);
        assert!(ctx.api.get_transactions(B).await.is_empty());
        assert!(ctx.registry.is_subscribed(&addr(B)).await);

        ctx.store.append(addr(B), vec![tx("h1")]).await;
        assert_eq!(ctx.api.get_transactions(B).await, vec![tx("h1")]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_transactions_drains(ctx: Fixture) {
        ctx.api.subscribe(A).await;
        ctx.store.append(addr(A), vec![tx("h1"), tx("h2")]).await;

        let txs = ctx.api.get_transactions(A).await;
        let hashes: Vec<_> = txs.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["h1", "h2"]);

        assert!(ctx.api.get_transactions(A).await.is_empty());
    }
}
