//! License key generation and normalisation

use rand::Rng;

/// Length of every issued key
pub const KEY_LENGTH: usize = 12;

const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a fresh key from the thread-local CSPRNG.
///
/// 36^12 possible keys; collisions are improbable, not impossible, so the
/// store must still reject a duplicate insert.
pub fn generate_key() -> String {
    let mut rng = rand::thread_rng();
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for every lookup: trimmed, upper-case.
pub fn canonical_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}
