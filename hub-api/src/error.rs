//! Hub API error types and error kinds.
//!
//! The Hub replies to failed requests with an HTTP error status and a small
//! JSON body, [`ErrorResponse`]. Client-side failures (connecting, timing
//! out, decoding) never reach the Hub and are represented by
//! [`CommonApiError`]. Both are unified into [`HubApiError`], which is what
//! every [`HubApi`](crate::def::HubApi) method returns.

// Deny suspicious match names that are probably non-existent variants.
#![deny(non_snake_case)]

use std::fmt;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `ErrorCode` is the serialized representation of a [`HubErrorKind`].
/// Client-side kinds use small codes; Hub-side kinds reuse the HTTP status.
pub type ErrorCode = u16;

/// The JSON body the Hub returns alongside an HTTP error status.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: String,
}

/// A trait to get the HTTP status code for a given error.
pub trait ToHttpStatus {
    fn to_http_status(&self) -> StatusCode;
}

// --- error_kind! macro --- //

/// Generates an error kind enum whose variant doc strings double as the
/// human-readable message for that kind.
///
/// * The enum _must_ have an `Unknown(ErrorCode)` variant and it _must_ be
///   first. This preserves unrecognized codes (e.g. an unexpected HTTP
///   status) for debugging.
/// * Codes must be unique; duplicates are a compile error.
macro_rules! error_kind {
    {
        $(#[$enum_meta:meta])*
        pub enum $error_kind_name:ident {
            $( #[doc = $unknown_msg:literal] )*
            Unknown(ErrorCode),

            $(
                $( #[doc = $item_msg:literal] )*
                $item_name:ident = $item_code:literal
            ),*

            $(,)?
        }
    } => {
        $(#[$enum_meta])*
        pub enum $error_kind_name {
            $( #[doc = $unknown_msg] )*
            Unknown(ErrorCode),

            $(
                $( #[doc = $item_msg] )*
                $item_name
            ),*
        }

        impl $error_kind_name {
            /// All known variants, excluding `Unknown(_)`.
            pub const KINDS: &'static [Self] = &[
                $( Self::$item_name, )*
            ];

            #[inline]
            pub fn is_unknown(&self) -> bool {
                matches!(self, Self::Unknown(_))
            }

            /// The variant name, e.g. `"NotFound"`.
            pub fn to_name(self) -> &'static str {
                match self {
                    $( Self::$item_name => stringify!($item_name), )*
                    Self::Unknown(_) => "Unknown",
                }
            }

            /// The human-readable message for this kind.
            pub fn to_msg(self) -> &'static str {
                let kind_msg = match self {
                    $( Self::$item_name => concat!($( $item_msg, )*), )*
                    Self::Unknown(_) => concat!($( $unknown_msg, )*),
                };
                kind_msg.trim_start()
            }

            pub const fn to_code(self) -> ErrorCode {
                match self {
                    $( Self::$item_name => $item_code, )*
                    Self::Unknown(code) => code,
                }
            }

            pub fn from_code(code: ErrorCode) -> Self {
                #[deny(unreachable_patterns)]
                match code {
                    0 => Self::Unknown(0),
                    $( $item_code => Self::$item_name, )*
                    _ => Self::Unknown(code),
                }
            }
        }

        impl Default for $error_kind_name {
            fn default() -> Self {
                Self::Unknown(0)
            }
        }

        impl fmt::Display for $error_kind_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // No ':' because the HubApiError Display impl adds it.
                write!(f, "{}", (*self).to_msg())
            }
        }
    }
}

error_kind! {
    /// All the ways a request to the Hub can fail.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub enum HubErrorKind {
        /// Unknown error
        Unknown(ErrorCode),

        // --- Client-side --- //

        /// Unknown reqwest client error
        UnknownReqwest = 1,
        /// Error building the HTTP request
        Building = 2,
        /// Error connecting to the Hub
        Connect = 3,
        /// Request timed out
        Timeout = 4,
        /// Error decoding the HTTP response body
        Decode = 5,

        // --- Hub-side, keyed by HTTP status --- //

        /// Hub rejected the request
        BadRequest = 400,
        /// Not authorized; the Hub may need to be unlocked
        Unauthorized = 401,
        /// Request forbidden; the CSRF token may be missing or stale
        Forbidden = 403,
        /// Resource not found
        NotFound = 404,
        /// Too many requests; retry later
        RateLimited = 429,
        /// Hub internal error
        Server = 500,
        /// Hub is temporarily unavailable
        Unavailable = 503,
    }
}

impl HubErrorKind {
    /// The error kind for an HTTP error status returned by the Hub.
    pub fn from_status(status: StatusCode) -> Self {
        Self::from_code(status.as_u16())
    }

    /// Whether this failure happened before a response was received.
    pub fn is_client_side(&self) -> bool {
        CommonErrorKind::KINDS
            .iter()
            .any(|common| common.to_code() == self.to_code())
    }
}

impl ToHttpStatus for HubErrorKind {
    fn to_http_status(&self) -> StatusCode {
        use HubErrorKind::*;
        match self {
            Unknown(code) => StatusCode::from_u16(*code)
                .ok()
                .filter(|status| status.is_client_error() || status.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),

            UnknownReqwest => StatusCode::BAD_REQUEST,
            Building => StatusCode::BAD_REQUEST,
            Connect => StatusCode::SERVICE_UNAVAILABLE,
            Timeout => StatusCode::GATEWAY_TIMEOUT,
            Decode => StatusCode::BAD_GATEWAY,

            BadRequest => StatusCode::BAD_REQUEST,
            Unauthorized => StatusCode::UNAUTHORIZED,
            Forbidden => StatusCode::FORBIDDEN,
            NotFound => StatusCode::NOT_FOUND,
            RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Server => StatusCode::INTERNAL_SERVER_ERROR,
            Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// --- Error structs --- //

/// The error returned by every Hub API call.
#[derive(Clone, Debug, Default, Eq, PartialEq, Error)]
pub struct HubApiError {
    pub kind: HubErrorKind,
    pub msg: String,
}

impl fmt::Display for HubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_msg = self.kind.to_msg();
        let msg = &self.msg;
        write!(f, "{kind_msg}: {msg}")
    }
}

impl ToHttpStatus for HubApiError {
    fn to_http_status(&self) -> StatusCode {
        self.kind.to_http_status()
    }
}

impl HubApiError {
    pub fn new(kind: HubErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    /// Build an error from an HTTP error status and the (maybe empty) error
    /// body the Hub sent along with it.
    pub fn from_response(status: StatusCode, resp: ErrorResponse) -> Self {
        let kind = HubErrorKind::from_status(status);
        let msg = if resp.message.is_empty() {
            status.to_string()
        } else {
            resp.message
        };
        Self { kind, msg }
    }

    pub fn decode(error: impl fmt::Display) -> Self {
        Self::new(HubErrorKind::Decode, format!("{error:#}"))
    }

    pub fn building(error: impl fmt::Display) -> Self {
        Self::new(HubErrorKind::Building, format!("{error:#}"))
    }

    pub fn not_found(error: impl fmt::Display) -> Self {
        Self::new(HubErrorKind::NotFound, format!("{error:#}"))
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind == HubErrorKind::NotFound
    }
}

/// Errors which happen on the client side of a request, before (or instead
/// of) getting a response from the Hub.
///
/// This is an intermediate type used by the `RestClient`; callers only ever
/// see it converted into a [`HubApiError`].
#[derive(Clone, Debug)]
pub struct CommonApiError {
    pub kind: CommonErrorKind,
    pub msg: String,
}

/// Error variants for [`CommonApiError`]. Every variant has a [`HubErrorKind`]
/// with the same code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum CommonErrorKind {
    /// Unknown reqwest client error
    UnknownReqwest = 1,
    /// Error building the HTTP request
    Building = 2,
    /// Error connecting to the Hub
    Connect = 3,
    /// Request timed out
    Timeout = 4,
    /// Error decoding the HTTP response body
    Decode = 5,
    // NOTE: If adding a variant, be sure to also update Self::KINDS!
}

impl CommonErrorKind {
    pub const KINDS: &'static [Self] = &[
        Self::UnknownReqwest,
        Self::Building,
        Self::Connect,
        Self::Timeout,
        Self::Decode,
    ];

    #[inline]
    pub fn to_code(self) -> ErrorCode {
        self as ErrorCode
    }
}

impl CommonApiError {
    pub fn new(kind: CommonErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }
}

impl fmt::Display for CommonApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_msg = HubErrorKind::from_code(self.kind.to_code()).to_msg();
        let msg = &self.msg;
        write!(f, "{kind_msg}: {msg}")
    }
}

impl From<CommonApiError> for HubApiError {
    fn from(CommonApiError { kind, msg }: CommonApiError) -> Self {
        let kind = HubErrorKind::from_code(kind.to_code());
        Self { kind, msg }
    }
}

impl From<reqwest::Error> for CommonApiError {
    fn from(err: reqwest::Error) -> Self {
        // The `reqwest::Error` `Display` impl hides the source (e.g. TLS or
        // DNS errors), so use `Debug` to keep the useful bits.
        let msg = format!("{err:?}");
        let kind = if err.is_builder() {
            CommonErrorKind::Building
        } else if err.is_connect() {
            CommonErrorKind::Connect
        } else if err.is_timeout() {
            CommonErrorKind::Timeout
        } else if err.is_decode() {
            CommonErrorKind::Decode
        } else {
            CommonErrorKind::UnknownReqwest
        };
        Self { kind, msg }
    }
}

impl From<serde_json::Error> for CommonApiError {
    fn from(err: serde_json::Error) -> Self {
        let kind = CommonErrorKind::Decode;
        let msg = format!("Failed to deserialize response as json: {err:#}");
        Self { kind, msg }
    }
}

// --- Tests --- //
