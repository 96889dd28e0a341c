//! Username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// The input string is empty.
    #[error("username cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace or a control character.
    #[error("username cannot contain whitespace or control characters")]
    InvalidCharacter,
}

/// A unique account name.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - No whitespace and no control characters
///
/// Usernames are compared exactly; no case folding is applied.
///
/// ## Examples
///
/// ```
/// use pennyshop_core::Username;
///
/// assert!(Username::parse("rich_test_user").is_ok());
/// assert!(Username::parse("").is_err());
/// assert!(Username::parse("two words").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Maximum length of a username, in characters.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Username` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 64 characters, or
    /// contains whitespace or control characters.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        if s.is_empty() {
            return Err(UsernameError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(UsernameError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_usernames() {
        assert!(Username::parse("test_user").is_ok());
        assert!(Username::parse("a").is_ok());
        assert!(Username::parse("user.name-42").is_ok());
        assert!(Username::parse(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Username::parse(""), Err(UsernameError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        assert_eq!(
            Username::parse(&"x".repeat(65)),
            Err(UsernameError::TooLong { max: 64 })
        );
    }

    #[test]
    fn test_parse_rejects_whitespace_and_control() {
        assert_eq!(
            Username::parse("two words"),
            Err(UsernameError::InvalidCharacter)
        );
        assert_eq!(
            Username::parse("tab\tname"),
            Err(UsernameError::InvalidCharacter)
        );
        assert_eq!(
            Username::parse("nul\0"),
            Err(UsernameError::InvalidCharacter)
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(Username::parse(&"é".repeat(64)).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let parsed: Username = serde_json::from_str("\"test_user\"").unwrap();
        assert_eq!(parsed.as_str(), "test_user");
        assert!(serde_json::from_str::<Username>("\"bad name\"").is_err());
    }
}
