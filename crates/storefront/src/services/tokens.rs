//! Opaque token generation for session IDs and CSRF tokens.
//!
//! Tokens are raw bytes from the operating system's CSPRNG encoded as
//! URL-safe base64 without padding, so they survive cookies, headers and
//! query strings unescaped. There is no fallback source: if the OS RNG fails
//! the token request fails.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use thiserror::Error;

use pennyshop_core::{CsrfToken, SessionId};

/// Default token width in bytes (256 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Errors that can occur while generating a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The randomness source failed.
    #[error("entropy source failed: {0}")]
    Entropy(String),

    /// A zero-length token was requested.
    #[error("token length must be at least one byte")]
    InvalidLength,
}

/// A source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Entropy` if the source cannot produce bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<(), TokenError>;
}

/// The operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), TokenError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| TokenError::Entropy(e.to_string()))
    }
}

/// Produces URL-safe opaque tokens from an [`EntropySource`].
#[derive(Debug, Clone)]
pub struct TokenGenerator<E = OsEntropy> {
    source: E,
    byte_length: usize,
}

impl TokenGenerator<OsEntropy> {
    /// Generator over the OS RNG with the default width.
    #[must_use]
    pub const fn os() -> Self {
        Self::with_source(OsEntropy)
    }
}

impl<E: EntropySource> TokenGenerator<E> {
    /// Generator over `source` with the default width.
    #[must_use]
    pub const fn with_source(source: E) -> Self {
        Self {
            source,
            byte_length: DEFAULT_TOKEN_BYTES,
        }
    }

    /// Generate a token from `byte_length` random bytes.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidLength` if `byte_length` is zero, or
    /// `TokenError::Entropy` if the source fails.
    pub fn generate(&self, byte_length: usize) -> Result<String, TokenError> {
        if byte_length == 0 {
            return Err(TokenError::InvalidLength);
        }

        let mut bytes = vec![0u8; byte_length];
        self.source.fill(&mut bytes)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Generate a session ID.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Entropy` if the source fails.
    pub fn session_id(&self) -> Result<SessionId, TokenError> {
        self.generate(self.byte_length).map(SessionId::new)
    }

    /// Generate a CSRF token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Entropy` if the source fails.
    pub fn csrf_token(&self) -> Result<CsrfToken, TokenError> {
        self.generate(self.byte_length).map(CsrfToken::new)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), TokenError> {
            Err(TokenError::Entropy("device unplugged".to_string()))
        }
    }

    struct ZeroEntropy;

    impl EntropySource for ZeroEntropy {
        fn fill(&self, dest: &mut [u8]) -> Result<(), TokenError> {
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn test_default_width_encodes_to_43_chars() {
        let token = TokenGenerator::os().generate(DEFAULT_TOKEN_BYTES).unwrap();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_tokens_differ() {
        let tokens = TokenGenerator::os();
        let a = tokens.session_id().unwrap();
        let b = tokens.session_id().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_length_rejected() {
        let result = TokenGenerator::os().generate(0);
        assert_matches!(result, Err(TokenError::InvalidLength));
    }

    #[test]
    fn test_entropy_failure_propagates() {
        let tokens = TokenGenerator::with_source(BrokenEntropy);
        assert_matches!(tokens.csrf_token(), Err(TokenError::Entropy(_)));
    }

    #[test]
    fn test_deterministic_source() {
        let tokens = TokenGenerator::with_source(ZeroEntropy);
        assert_eq!(tokens.generate(3).unwrap(), "AAAA");
    }
}
