use std::collections::HashSet;

use alloy_primitives::Address;
use rand::{rngs::StdRng, SeedableRng};
use scalable_cuckoo_filter::{DefaultHasher, ScalableCuckooFilter, ScalableCuckooFilterBuilder};
use tokio::sync::RwLock;
use tracing::debug;

const INITIAL_CAPACITY: usize = 1024;

/// Set of addresses whose transactions are retained
///
/// Membership checks dominate during scanning, so they only take the read lock.
/// Subscribing takes the write lock
#[derive(Debug)]
pub struct SubscriptionRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    addresses: HashSet<Address>,

    /// Cuckoo filter for fast address inclusion check
    cuckoo: ScalableCuckooFilter<Address, DefaultHasher, StdRng>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        let cuckoo = ScalableCuckooFilterBuilder::new()
            .initial_capacity(INITIAL_CAPACITY)
            .rng(StdRng::from_entropy())
            .finish();

        Self {
            inner: RwLock::new(Inner {
                addresses: HashSet::new(),
                cuckoo,
            }),
        }
    }

    /// Idempotent. Returns `true` if the address was not subscribed before
    pub async fn subscribe(&self, address: Address) -> bool {
        let mut inner = self.inner.write().await;

        let added = inner.addresses.insert(address);
        if added {
            inner.cuckoo.insert(&address);
            debug!(%address, "subscribed");
        }

        added
    }

    pub async fn is_subscribed(&self, address: &Address) -> bool {
        let inner = self.inner.read().await;

        inner.cuckoo.contains(address) && inner.addresses.contains(address)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.addresses.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
