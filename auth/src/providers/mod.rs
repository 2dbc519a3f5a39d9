//! Provider traits for external dependencies.
//!
//! The authenticator only talks to the outside world through these traits:
//! a user repository (injected by the application), a password comparator,
//! and a session store.

pub mod password;
pub mod session;
pub mod user;

pub use password::ConstantTimeComparator;
pub use session::SessionStore;
pub use user::{PasswordComparator, UserRecord, UserRepository};
