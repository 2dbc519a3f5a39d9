//! Password comparators.

use super::PasswordComparator;

/// Compares stored secrets in constant time.
///
/// Suitable when the repository already stores a derived value (for example
/// a hex digest computed elsewhere) or, in development, a plaintext secret.
/// Hashing itself is the repository's concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantTimeComparator;

impl PasswordComparator for ConstantTimeComparator {
    fn matches(&self, presented: &str, stored: &str) -> bool {
        constant_time_eq::constant_time_eq(presented.as_bytes(), stored.as_bytes())
    }
}
