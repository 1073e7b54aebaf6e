//! Single-use backup codes.
//!
//! Codes look like `k3vq7-m2xfa`. Only their SHA-256 digests are stored;
//! hashing normalizes case, spaces, and the dash so users can type them
//! loosely.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Codes issued per enrollment.
pub const DEFAULT_BACKUP_CODE_COUNT: usize = 10;

const CODE_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
const GROUP_LEN: usize = 5;

/// Generate `count` random backup codes.
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let chars: String = (0..GROUP_LEN * 2)
                .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
                .collect();
            format!("{}-{}", &chars[..GROUP_LEN], &chars[GROUP_LEN..])
        })
        .collect()
}

/// Canonical form: lowercase, without whitespace or dashes.
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Hex SHA-256 of the normalized code.
pub fn hash_backup_code(code: &str) -> String {
    hex::encode(Sha256::digest(normalize_backup_code(code).as_bytes()))
}

/// Whether `input` has the shape of a backup code (rather than a TOTP code).
pub fn looks_like_backup_code(input: &str) -> bool {
    let normalized = normalize_backup_code(input);
    normalized.len() == GROUP_LEN * 2 && normalized.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
