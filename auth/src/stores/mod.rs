//! Storage implementations for sessions.
//!
//! - **Memory** - Process-local store with per-session locking
//! - **Redis** - Shared store with TTL eviction and scripted atomic updates

pub mod memory;
pub mod session_redis;

// Re-exports
pub use memory::MemorySessionStore;
pub use session_redis::RedisSessionStore;
