//! # API Key Hashing
//!
//! A credential primitive distinct from [`super::password`]: API keys are
//! machine credentials, compared at much higher frequency than a user
//! typing a password, so they use PBKDF2-HMAC-SHA256 (cheaper per-check than
//! Argon2id) rather than the password hasher's memory-hard KDF. The two are
//! kept as separate modules/crates (`pbkdf2` here, `argon2` for passwords)
//! so the choice is explicit at the call site, not a shared default that
//! quietly applies the wrong cost model to one of the two credential kinds.
//!
//! ## Plaintext format
//!
//! `<decorator>-<secret>` — `decorator` is a short human-readable prefix
//! (e.g. `"sk"`, `"ak"`) chosen by the caller, `secret` is URL-safe base64 of
//! at least 256 random bits. The plaintext is shown to the user exactly once,
//! at creation; only a salted hash is ever stored.
//!
//! ## Stored form and lookup
//!
//! Storage keeps `{prefix, salt, hash}` where `prefix` is the first 8
//! characters of `secret` (before hashing). Because a PBKDF2 hash can't be
//! reversed to find matching rows, `prefix` is the sole database index: on
//! presentation, the repository selects all keys whose stored `prefix`
//! equals the first 8 characters of the presented secret, then this module
//! recomputes PBKDF2 with each candidate's stored salt and compares in
//! constant time.

use crate::errors::ApiError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Iteration count floor mandated by the spec for API-key PBKDF2 hashing.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Length, in characters, of the indexable prefix stored alongside the hash.
pub const PREFIX_LEN: usize = 8;

/// Random secret material size in bytes (256 bits).
const SECRET_BYTES: usize = 32;

/// Salt size in bytes.
const SALT_BYTES: usize = 16;

/// Hash output size in bytes (SHA-256 digest length).
const HASH_BYTES: usize = 32;

/// A freshly generated API key: the plaintext to hand back to the caller
/// exactly once, plus the record to persist.
pub struct GeneratedApiKey {
    /// Full plaintext in `<decorator>-<secret>` form. Never stored.
    pub plaintext: String,
    pub prefix: String,
    pub salt: Vec<u8>,
    pub hashed_key: Vec<u8>,
}

/// Generates a new API key with the given human-readable decorator.
pub fn generate(decorator: &str) -> GeneratedApiKey {
    let mut secret_bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret_bytes);
    let secret = URL_SAFE_NO_PAD.encode(secret_bytes);

    let mut salt = vec![0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);

    let hashed_key = pbkdf2_hash(secret.as_bytes(), &salt);
    let prefix = secret.chars().take(PREFIX_LEN).collect::<String>();
    let plaintext = format!("{decorator}-{secret}");

    GeneratedApiKey {
        plaintext,
        prefix,
        salt,
        hashed_key,
    }
}

/// Splits a presented plaintext key into `(decorator, secret)`, rejecting
/// shapes that can't possibly be an API key so callers can cheaply bail out
/// of the API-key matching branch during principal resolution.
pub fn split_plaintext(plaintext: &str) -> Option<(&str, &str)> {
    let (decorator, secret) = plaintext.split_once('-')?;
    if decorator.is_empty() || secret.len() < PREFIX_LEN {
        return None;
    }
    Some((decorator, secret))
}

/// The indexable prefix of a presented secret, for the repository's
/// prefix-based candidate lookup.
pub fn prefix_of(secret: &str) -> String {
    secret.chars().take(PREFIX_LEN).collect()
}

/// Verifies a presented secret against one stored `(salt, hashed_key)` pair.
/// Constant-time over the hash comparison; the caller is responsible for
/// only presenting candidates whose stored prefix already matched.
pub fn verify(secret: &str, salt: &[u8], hashed_key: &[u8]) -> Result<bool, ApiError> {
    let computed = pbkdf2_hash(secret.as_bytes(), salt);
    Ok(computed.ct_eq(hashed_key).into())
}

fn pbkdf2_hash(secret: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut out = [0u8; HASH_BYTES];
    pbkdf2_hmac::<Sha256>(secret, salt, PBKDF2_ITERATIONS, &mut out);
    out.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_round_trips_through_verify() {
        let generated = generate("sk");
        let (decorator, secret) = split_plaintext(&generated.plaintext).unwrap();
        assert_eq!(decorator, "sk");
        assert_eq!(prefix_of(secret), generated.prefix);
        assert!(verify(secret, &generated.salt, &generated.hashed_key).unwrap());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let generated = generate("sk");
        let other = generate("sk");
        assert!(!verify(&other.plaintext, &generated.salt, &generated.hashed_key).unwrap());
    }

    #[test]
    fn test_split_plaintext_rejects_malformed_shapes() {
        assert!(split_plaintext("no-dash-here-but-short").is_some());
        assert!(split_plaintext("nodash").is_none());
        assert!(split_plaintext("-missingdecorator").is_none());
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let a = generate("sk");
        let b = generate("sk");
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.salt, b.salt);
    }
}
