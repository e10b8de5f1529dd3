use thiserror::Error;

use crate::types::DenialReason;

/// Errors returned by Firefly operations.
#[derive(Error, Debug)]
pub enum FireflyError {
    /// The bearer token was rejected (HTTP 401).
    #[error("Unauthorized. Bearer auth token is invalid.")]
    Unauthorized,

    /// The local session TTL has lapsed. Renew with `create_session`.
    #[error("Session expired. Create one using `create_session`.")]
    SessionExpired,

    /// The service refused to generate, with a content-policy reason.
    #[error("Image generation denied: {0}")]
    GenerationDenied(DenialReason),

    /// A style, preset, font, or aspect-ratio name not present in the catalog.
    #[error("Invalid {kind}: {name:?}")]
    InvalidSelection { kind: &'static str, name: String },

    /// Glyph generation was attempted without a `description` option.
    #[error("Glyph generation requires a non-empty `description` option")]
    MissingDescription,

    /// Anonymous mode is not supported.
    #[error("Anonymous mode not supported yet")]
    AnonymousUnsupported,

    /// The bearer token contains characters not permitted in a header.
    #[error("Bearer token is not a valid header value")]
    InvalidToken,

    /// The service returned a non-success HTTP status other than 401.
    #[error("Firefly returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response was missing expected structure (boundary, parts, fields).
    #[error("{0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FireflyError>;
