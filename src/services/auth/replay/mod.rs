pub mod memory;
pub mod store;
pub mod valkey;

pub use memory::InMemoryJtiStore;
pub use store::{JtiRecord, JtiStore, ReplayError};
pub use valkey::ValkeyJtiStore;
