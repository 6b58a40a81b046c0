mod registry;
mod transactions;

pub use registry::SubscriptionRegistry;
pub use transactions::TransactionStore;
