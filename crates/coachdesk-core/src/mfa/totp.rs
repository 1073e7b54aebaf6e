//! Time-based one-time passwords (RFC 6238) over HMAC-SHA256.
//!
//! Codes are 6 digits with a 30-second step. Verification accepts one step
//! of clock skew either way and reports the matched step so callers can
//! reject replays.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Digits per code.
pub const DIGITS: u32 = 6;

/// Seconds per time step.
pub const STEP_SECONDS: i64 = 30;

/// Steps of clock drift tolerated on each side.
pub const SKEW_STEPS: i64 = 1;

/// Random secret length in bytes.
pub const SECRET_LEN: usize = 20;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// A shared TOTP secret.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(Vec<u8>);

impl TotpSecret {
    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        rand::rng().fill(&mut bytes);
        Self(bytes.to_vec())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode the base32 form users type into authenticator apps.
    pub fn from_base32(encoded: &str) -> Option<Self> {
        base32_decode(encoded).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// RFC 4648 base32 without padding.
    pub fn to_base32(&self) -> String {
        base32_encode(&self.0)
    }

    /// The code valid during `step`.
    pub fn code_at_step(&self, step: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size");
        mac.update(&step.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation (RFC 4226 section 5.3).
        let offset = usize::from(digest[digest.len() - 1] & 0x0f);
        let binary = (u32::from(digest[offset] & 0x7f) << 24)
            | (u32::from(digest[offset + 1]) << 16)
            | (u32::from(digest[offset + 2]) << 8)
            | u32::from(digest[offset + 3]);
        let code = binary % 10u32.pow(DIGITS);
        format!("{code:0width$}", width = DIGITS as usize)
    }

    /// The code valid at `at`.
    pub fn code_at(&self, at: DateTime<Utc>) -> String {
        self.code_at_step(time_step(at))
    }

    /// Check `code` against the steps around `at`.
    ///
    /// Returns the matching time step, or `None` if no step within the skew
    /// window produces `code`. Whitespace in `code` is ignored.
    pub fn verify(&self, code: &str, at: DateTime<Utc>) -> Option<i64> {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let current = time_step(at);
        (current - SKEW_STEPS..=current + SKEW_STEPS)
            .find(|step| constant_time_eq(self.code_at_step(*step).as_bytes(), code.as_bytes()))
    }

    /// `otpauth://` URI for QR enrollment.
    pub fn provisioning_uri(&self, issuer: &str, account: &str) -> String {
        let mut uri = Url::parse("otpauth://totp/").expect("static otpauth URL is valid");
        uri.set_path(&format!("{issuer}:{account}"));
        uri.query_pairs_mut()
            .append_pair("secret", &self.to_base32())
            .append_pair("issuer", issuer)
            .append_pair("algorithm", "SHA256")
            .append_pair("digits", &DIGITS.to_string())
            .append_pair("period", &STEP_SECONDS.to_string());
        uri.to_string()
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret(<redacted>)")
    }
}

/// Time step containing `at`.
pub fn time_step(at: DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(STEP_SECONDS)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize]));
        }
    }
    if bits > 0 {
        out.push(char::from(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize]));
    }
    out
}

fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in encoded.chars().filter(|c| !c.is_whitespace() && *c != '=' && *c != '-') {
        if !c.is_ascii() {
            return None;
        }
        let upper = c.to_ascii_uppercase() as u8;
        let value = BASE32_ALPHABET.iter().position(|&a| a == upper)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Some(out)
}
