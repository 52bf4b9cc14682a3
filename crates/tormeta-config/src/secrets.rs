//! Argon2 hashing and random token material.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use rand::{Rng, distr::Alphanumeric};

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn generate_token(length: usize) -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

pub(crate) fn hash_secret(input: &str) -> ConfigResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|detail| ConfigError::SecretHashFailed { detail })
}

pub(crate) fn verify_secret(expected_hash: &str, candidate: &str) -> ConfigResult<bool> {
    let parsed =
        PasswordHash::new(expected_hash).map_err(|detail| ConfigError::StoredHashInvalid { detail })?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(detail) => Err(ConfigError::SecretVerifyFailed { detail }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_secret() {
        let hash = hash_secret("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret(&hash, "correct horse").expect("verify"));
        assert!(!verify_secret(&hash, "battery staple").expect("verify"));
        assert!(matches!(
            verify_secret("not-a-phc-string", "x"),
            Err(ConfigError::StoredHashInvalid { .. })
        ));
    }

    #[test]
    fn tokens_are_alphanumeric_with_requested_length() {
        let token = generate_token(24);
        assert_eq!(token.len(), 24);
        assert!(token.chars().all(|ch| ch.is_ascii_alphanumeric()));
    }
}
