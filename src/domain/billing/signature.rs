//! HMAC helpers shared by the provider adapters.
//!
//! All secret comparisons go through [`constant_time_eq`].

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::BillingError;

type HmacSha256 = Hmac<Sha256>;

/// Computes HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, BillingError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BillingError::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Computes HMAC-SHA256 and returns it lower-case hex encoded.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> Result<String, BillingError> {
    hmac_sha256(key, message).map(hex::encode)
}

/// Compares two byte strings without short-circuiting on the first
/// differing byte. Length is not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hmac_matches_known_vector() {
        // RFC 4231 test case 2
        let digest = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            digest,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn equal_values_compare_equal() {
        assert!(constant_time_eq(b"abcdef", b"abcdef"));
    }

    #[test]
    fn mismatched_prefix_is_rejected() {
        assert!(!constant_time_eq(b"Xbcdef", b"abcdef"));
        assert!(!constant_time_eq(b"abcdeX", b"abcdef"));
    }

    #[test]
    fn different_lengths_are_rejected() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn empty_slices_compare_equal() {
        assert!(constant_time_eq(b"", b""));
    }

    proptest! {
        #[test]
        fn comparator_agrees_with_slice_equality(
            a in proptest::collection::vec(any::<u8>(), 0..64),
            b in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assert_eq!(constant_time_eq(&a, &b), a == b);
        }
    }
}
