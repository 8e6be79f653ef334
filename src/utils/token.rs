//! Shareable pool tokens.
//!
//! A token is the first 12 alphanumeric characters of the base64 SHA-256 digest of eight
//! random bytes and a base36 millisecond timestamp.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::{PoolError, PoolResult};
use crate::utils::time::current_time;

pub const TOKEN_LENGTH: usize = 12;

const MAX_TOKEN_ATTEMPTS: usize = 100;

/// Generate a fresh URL-safe token
pub fn generate_pool_token() -> String {
    let mut random_bytes = [0u8; 8];
    OsRng.fill_bytes(&mut random_bytes);
    let timestamp = to_base36(current_time().timestamp_millis().max(0) as u64);

    let mut hasher = Sha256::new();
    hasher.update(STANDARD.encode(random_bytes).as_bytes());
    hasher.update(timestamp.as_bytes());
    let digest = hasher.finalize();

    STANDARD
        .encode(digest)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(TOKEN_LENGTH)
        .collect()
}

/// Check token shape: exactly 12 ASCII alphanumeric characters
pub fn validate_pool_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Generate a token that `exists` does not report as taken.
///
/// Fails with `TokenSpaceExhausted` after 100 collisions; at 12 base62 characters a collision
/// run that long means the lookup itself is broken.
pub fn generate_unique_token<F>(mut exists: F) -> PoolResult<String>
where
    F: FnMut(&str) -> PoolResult<bool>,
{
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let candidate = generate_pool_token();
        if !exists(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(PoolError::TokenSpaceExhausted {
        attempts: MAX_TOKEN_ATTEMPTS,
    })
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
