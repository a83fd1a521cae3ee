//! The legacy challenge/response login protocol (§4.F): the client never
//! sends a password in the clear. It sends `h1 = sha1(password)` once at
//! account setup, and thereafter proves knowledge of `h1` by combining it
//! with a server-issued nonce: `h2 = sha1(h1 + ":" + tk)`.

use rand::Rng;
use sha1::{Digest, Sha1};

use crate::error::AppError;
use crate::session::credentials::CredentialStore;

const TK_LEN: usize = 16;
const TK_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Issues a fresh challenge nonce for a login attempt.
pub fn issue_challenge() -> String {
    let mut rng = rand::thread_rng();
    (0..TK_LEN)
        .map(|_| TK_ALPHABET[rng.gen_range(0..TK_ALPHABET.len())] as char)
        .collect()
}

/// Verifies `h2` against the stored `h1` for `username`, given the `tk`
/// issued for this attempt.
pub fn verify(
    credentials: &CredentialStore,
    username: &str,
    tk: &str,
    h2: &str,
) -> Result<(), AppError> {
    let stored_h1 = credentials
        .h1(username)
        .ok_or_else(|| AppError::AccessDenied(format!("no such user: {username}")))?;

    let expected = sha1_hex(&format!("{stored_h1}:{tk}"));
    if expected == h2 {
        Ok(())
    } else {
        Err(AppError::AccessDenied("login failed".into()))
    }
}
