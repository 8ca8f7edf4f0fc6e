//! # Message Store Implementations
//!
//! Infrastructure implementations of the [`MessageStore`](crate::messages::MessageStore) trait.

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemMessageStore;
pub use memory::InMemoryMessageStore;
