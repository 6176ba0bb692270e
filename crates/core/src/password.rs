//! Password hashing with argon2.
//!
//! Hashes are stored as PHC strings, which embed the algorithm parameters and salt, so a stored
//! hash stays verifiable after the configured cost changes.

use crate::config::PasswordCost;
use crate::{HmsError, HmsResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

fn hasher(cost: PasswordCost) -> HmsResult<Argon2<'static>> {
    let params = Params::new(
        cost.memory_kib,
        cost.iterations,
        Params::DEFAULT_P_COST,
        None,
    )
    .map_err(|e| HmsError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a plaintext password.
pub(crate) fn hash_password(password: &str, cost: PasswordCost) -> HmsResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    hasher(cost)?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HmsError::PasswordHash(e.to_string()))
}

/// Checks a plaintext password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> HmsResult<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| HmsError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(HmsError::PasswordHash(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_original_password() {
        let hash = hash_password("correct horse", PasswordCost::MINIMAL).expect("should hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(HmsError::PasswordHash(_))
        ));
    }
}
