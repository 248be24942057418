//! Salted password digests
//!
//! Digests are HMAC-SHA1 keyed by the per-user salt, matching what the
//! cluster manager stores in the user table it pushes to every node.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Compute the digest stored for `password` under `salt`.
pub fn hash_password(password: &str, salt: &[u8]) -> Vec<u8> {
    match keyed(salt, password) {
        Some(mac) => mac.finalize().into_bytes().to_vec(),
        None => Vec::new(),
    }
}

/// Compare `password` against a stored digest in constant time.
pub fn verify_password(password: &str, salt: &[u8], digest: &[u8]) -> bool {
    match keyed(salt, password) {
        Some(mac) => mac.verify_slice(digest).is_ok(),
        None => false,
    }
}

fn keyed(salt: &[u8], password: &str) -> Option<HmacSha1> {
    // new_from_slice accepts any key length for HMAC, empty included
    let mut mac = HmacSha1::new_from_slice(salt).ok()?;
    mac.update(password.as_bytes());
    Some(mac)
}
