//! HTTP request handlers.

pub mod auth;

// Re-export common handler utilities
pub use auth::{auth_routes, login, logout, LoginForm};
