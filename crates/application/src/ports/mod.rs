//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the session core and external systems.
//! Each port is a trait implemented by adapters in the infrastructure layer.

mod file_system;
mod session_storage;
mod transport;

pub use file_system::{FileSystem, FileSystemError};
pub use session_storage::{MemorySessionStorage, SessionStorage, StorageError};
pub use transport::{Transport, TransportError};
