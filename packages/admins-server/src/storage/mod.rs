mod memory;
mod postgres;
mod traits;
mod types;

pub use memory::{MemoryAccountStore, MemorySessionStore};
pub use postgres::{PostgresAccountStore, PostgresSessionStore};
pub use traits::{AccountStore, SessionStore, StorageError, StorageResult};
pub use types::*;
