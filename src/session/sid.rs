//! Session-id cookie (§4.F): a random identifier bound to a checksum of the
//! server's signing key, so a forged or stale SID is rejected before ever
//! touching the session store.

use rand::Rng;
use sha2::{Digest, Sha256};

const SID_LEN: usize = 30;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a fresh `v01`-prefixed SID: a version tag, a random body, and a
/// trailing checksum over both, keyed by `secret`.
pub fn generate(secret: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..SID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("v01{}{}", body, checksum(secret, &body))
}

/// Validates a SID's checksum, returning the random body if it holds.
pub fn validate<'a>(secret: &[u8], sid: &'a str) -> Option<&'a str> {
    let rest = sid.strip_prefix("v01")?;
    if rest.len() <= 8 {
        return None;
    }
    let split = rest.len() - 8;
    let (body, sum) = rest.split_at(split);
    if checksum(secret, body) == sum {
        Some(body)
    } else {
        None
    }
}

fn checksum(secret: &[u8], body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
