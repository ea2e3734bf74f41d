//! Persistence layer — durable key-value storage and the onboarding store.

pub mod libsql_backend;
pub mod memory;
pub mod onboarding_store;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use onboarding_store::OnboardingStore;
pub use traits::{KeyValueStore, storage_keys};
