//! Store boundary and the sled-backed reference store.

mod config;
mod executor;
mod record;
mod sled_store;

pub use config::StoreConfig;
pub use executor::{EntityRow, StoreExecutor};
pub use record::{StoredField, StoredRow};
pub use sled_store::SledStore;
