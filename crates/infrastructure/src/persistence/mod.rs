//! Durable session persistence.

mod file_system;
mod session_storage;

pub use file_system::TokioFileSystem;
pub use session_storage::FileSessionStorage;
