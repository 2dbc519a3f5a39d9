//! Principal serialization.
//!
//! Explicit, pure conversions between a [`Principal`] and the bytes a
//! session store persists. Stores call these directly; there is no global
//! serializer registration.

use crate::error::Result;
use crate::state::Principal;

/// Encode a principal for storage.
///
/// # Errors
///
/// Returns [`crate::AuthError::SerializationError`] if encoding fails.
pub fn to_record(principal: &Principal) -> Result<Vec<u8>> {
    Ok(bincode::serialize(principal)?)
}

/// Decode a principal previously written by [`to_record`].
///
/// # Errors
///
/// Returns [`crate::AuthError::SerializationError`] if the bytes are not a
/// valid encoding.
pub fn from_record(bytes: &[u8]) -> Result<Principal> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::state::UserId;

    #[test]
    fn test_principal_survives_storage() {
        let principal = Principal::new(UserId::from(1)).with_display_name("admin");
        let bytes = to_record(&principal).unwrap();
        assert_eq!(from_record(&bytes).unwrap(), principal);
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let result = from_record(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(matches!(result, Err(AuthError::SerializationError(_))));
    }
}
