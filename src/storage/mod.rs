//! Storage backends for search and metadata commands.
//!
//! - [`redis::RedisBackend`]: Redis Stack over a connection manager
//! - [`memory::InMemoryBackend`]: in-process, for tests and offline use

pub mod memory;
pub mod redis;
pub mod traits;
