//! Origin-scoped key-value persistence for the token mirror
//!
//! Reads and writes are synchronous: the token store hydrates from here
//! before the client accepts requests, and mirror writes are small.

pub mod file;
pub mod memory;

use courier_domain::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persistent string store keyed by name.
///
/// Implementations are scoped to one backend origin.
pub trait PersistentStore: Send + Sync {
    /// Stored value, `None` if the key was never written or was removed
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}
