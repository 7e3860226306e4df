use std::fmt;

use serde::{Deserialize, Serialize};

/// A request or response struct with no fields.
///
/// Use this instead of `()` so that fields can be added later without
/// breaking the wire format. The Hub replies to most mutating requests with
/// either `{}` or an empty `204 No Content` body; both decode to [`Empty`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

/// The anti-forgery token the Hub requires on every mutating request, sent
/// in the `X-CSRF-Token` header.
///
/// `GET /api/csrf` returns it as a bare JSON string.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The token is a session secret; keep it out of logs.
impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(..)")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn csrf_token_is_a_bare_json_string() {
        let token = serde_json::from_str::<CsrfToken>(r#""abc123""#).unwrap();
        assert_eq!(token.as_str(), "abc123");
        assert_eq!(format!("{token:?}"), "CsrfToken(..)");
    }

    #[test]
    fn empty_from_empty_object() {
        let empty = serde_json::from_str::<Empty>("{}").unwrap();
        assert_eq!(empty, Empty {});
        // Unknown fields are ignored for forward compat.
        serde_json::from_str::<Empty>(r#"{"ok":true}"#).unwrap();
    }
}
