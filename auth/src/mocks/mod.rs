//! Mock provider implementations for testing.
//!
//! In-memory implementations of the provider traits plus deterministic
//! clocks, for use in unit and integration tests.

pub mod clock;
pub mod session;
pub mod user;

pub use clock::{FixedClock, ManualClock};
pub use session::FlakySessionStore;
pub use user::{FailingUserRepository, MockUserRepository, SlowUserRepository};
