//! Opaque session tokens.
//!
//! Session IDs are bearer credentials and CSRF tokens are echoed back by the
//! caller; neither has any internal structure. Both redact their `Debug`
//! output so they cannot leak through structured logs.

use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an already-encoded token string.
            #[must_use]
            pub const fn new(token: String) -> Self {
                Self(token)
            }

            /// The encoded token.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the token is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"[REDACTED]").finish()
            }
        }

        impl From<String> for $name {
            fn from(token: String) -> Self {
                Self(token)
            }
        }

        impl From<&str> for $name {
            fn from(token: &str) -> Self {
                Self(token.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_token!(
    /// Session identifier: the bearer credential presented on every request.
    SessionId
);

define_token!(
    /// CSRF token bound to a session, echoed back by the caller's script.
    CsrfToken
);
