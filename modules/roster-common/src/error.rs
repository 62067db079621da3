use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Why a proxy-encoded image reference could not be unwrapped.
/// Callers keep the original URL on any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("URL could not be parsed")]
    InvalidUrl,

    #[error("no path segment to decode")]
    NoPayload,

    #[error("path segment is not base64")]
    NotBase64,

    #[error("decoded payload is not UTF-8")]
    NotUtf8,

    #[error("decoded payload is not an absolute http(s) URL")]
    NotUrl,
}
