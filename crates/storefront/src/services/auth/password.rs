//! Password hashing with Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so
//! the salt and cost parameters travel with the hash and old hashes stay
//! verifiable after the configured cost changes.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::error;

use super::AuthError;
use crate::config::HashingConfig;
use crate::services::tokens::{EntropySource, OsEntropy};

/// Minimum password length in bytes.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in bytes.
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Salt width in bytes (the PHC recommended length).
const SALT_BYTES: usize = 16;

const DUMMY_PASSWORD: &str = "pennyshop-dummy-password";

/// Hashes and verifies passwords with fixed Argon2id cost parameters.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    salts: Box<dyn EntropySource>,
    dummy_hash: String,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("params", self.argon2.params())
            .finish_non_exhaustive()
    }
}

impl CredentialHasher {
    /// Build a hasher from configured cost parameters, salting from the OS
    /// RNG.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HashingParams` if Argon2 rejects the parameters.
    /// Returns `AuthError::PasswordHash` if the dummy hash cannot be computed.
    pub fn new(config: &HashingConfig) -> Result<Self, AuthError> {
        Self::with_salt_source(config, OsEntropy)
    }

    /// Build a hasher that draws salts from `salts`.
    ///
    /// The dummy hash used for unknown-account logins is computed here, so
    /// every login afterwards costs exactly one verification.
    ///
    /// # Errors
    ///
    /// Same as [`CredentialHasher::new`].
    pub fn with_salt_source<E>(config: &HashingConfig, salts: E) -> Result<Self, AuthError>
    where
        E: EntropySource + 'static,
    {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| AuthError::HashingParams(e.to_string()))?;

        let mut hasher = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            salts: Box::new(salts),
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(hasher)
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if the salt source or hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let mut bytes = [0u8; SALT_BYTES];
        self.salts.fill(&mut bytes).map_err(|e| {
            error!(error = %e, "salt generation failed");
            AuthError::PasswordHash
        })?;
        let salt = SaltString::encode_b64(&bytes).map_err(|_| AuthError::PasswordHash)?;

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)
    }

    /// Verify a password against a stored hash.
    ///
    /// Returns `false` on mismatch and on a hash that cannot be parsed.
    #[must_use]
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Run one verification against a throwaway hash.
    ///
    /// Called when the account does not exist, so a login for an unknown
    /// username costs the same as one with a wrong password.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

/// Validate a password against the registration policy.
///
/// # Errors
///
/// Returns `AuthError::InvalidPassword` if the password is too short or too long.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::InvalidPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;

    use super::*;
    use crate::services::tokens::TokenError;

    const FAST: HashingConfig = HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    fn fast_hasher() -> CredentialHasher {
        CredentialHasher::new(&FAST).unwrap()
    }

    /// Succeeds for the first `n` fills, then fails.
    struct FailsAfter(AtomicUsize);

    impl EntropySource for FailsAfter {
        fn fill(&self, dest: &mut [u8]) -> Result<(), TokenError> {
            let left = self.0.load(Ordering::SeqCst);
            if left == 0 {
                return Err(TokenError::Entropy("getrandom failed".to_string()));
            }
            self.0.store(left - 1, Ordering::SeqCst);
            dest.fill(7);
            Ok(())
        }
    }

    #[test]
    fn test_dummy_hash_ready_after_construction() {
        let hasher = fast_hasher();

        assert!(hasher.dummy_hash.starts_with("$argon2id$"));
        assert!(hasher.verify(DUMMY_PASSWORD, &hasher.dummy_hash));
    }

    #[test]
    fn test_salt_source_failure_at_construction() {
        let result = CredentialHasher::with_salt_source(&FAST, FailsAfter(AtomicUsize::new(0)));
        assert_matches!(result, Err(AuthError::PasswordHash));
    }

    #[test]
    fn test_salt_source_failure_is_an_error() {
        let hasher =
            CredentialHasher::with_salt_source(&FAST, FailsAfter(AtomicUsize::new(1))).unwrap();

        assert_matches!(hasher.hash("password123"), Err(AuthError::PasswordHash));
        // the dummy hash drawn at construction is unaffected
        hasher.verify_dummy("password123");
        assert!(hasher.verify(DUMMY_PASSWORD, &hasher.dummy_hash));
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("correct horsE", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hasher = fast_hasher();
        let a = hasher.hash("password123").unwrap();
        let b = hasher.hash("password123").unwrap();

        assert_ne!(a, b);
        assert!(hasher.verify("password123", &a));
        assert!(hasher.verify("password123", &b));
    }

    #[test]
    fn test_max_length_password_round_trips() {
        let hasher = fast_hasher();
        let password = "x".repeat(MAX_PASSWORD_LENGTH);
        let hash = hasher.hash(&password).unwrap();
        assert!(hasher.verify(&password, &hash));
    }

    #[test]
    fn test_unparseable_hash_is_mismatch() {
        let hasher = fast_hasher();
        assert!(!hasher.verify("password123", "not-a-phc-string"));
        assert!(!hasher.verify("password123", ""));
    }

    #[test]
    fn test_hash_verifies_under_different_cost() {
        let hash = fast_hasher().hash("password123").unwrap();
        let other = CredentialHasher::new(&HashingConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(other.verify("password123", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = CredentialHasher::new(&HashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert_matches!(result, Err(AuthError::HashingParams(_)));
    }

    #[test]
    fn test_password_policy() {
        assert_matches!(validate_password("short"), Err(AuthError::InvalidPassword(_)));
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert_matches!(
            validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(AuthError::InvalidPassword(_))
        );
    }
}
