//! Error types for the usage pipeline
//!
//! Mirrors the taxonomy the pipeline is specified against: configuration
//! errors are fatal at startup, transport and remote-status errors are
//! retryable or cycle-aborting depending on the status, and decode/KV/key
//! errors are always per-item and never abort a cycle.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Tag carried by a RGW admin API status-error envelope (`{"Code": ...}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorKind {
    NoSuchUser,
    NoSuchBucket,
    AccessDenied,
    InvalidAccessKey,
    SignatureDoesNotMatch,
    BucketNotEmpty,
    /// Any status-error code this client doesn't special-case.
    Unknown(String),
}

impl RemoteErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "NoSuchUser" => Self::NoSuchUser,
            "NoSuchBucket" => Self::NoSuchBucket,
            "AccessDenied" => Self::AccessDenied,
            "InvalidAccessKey" => Self::InvalidAccessKey,
            "SignatureDoesNotMatch" => Self::SignatureDoesNotMatch,
            "BucketNotEmpty" => Self::BucketNotEmpty,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Errors that mark the target unreachable and should abort the cycle.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied | Self::InvalidAccessKey | Self::SignatureDoesNotMatch
        )
    }

    /// Errors that are expected in normal operation (the entity just isn't
    /// there yet) and should be downgraded to a warning.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NoSuchUser | Self::NoSuchBucket)
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchUser => write!(f, "NoSuchUser"),
            Self::NoSuchBucket => write!(f, "NoSuchBucket"),
            Self::AccessDenied => write!(f, "AccessDenied"),
            Self::InvalidAccessKey => write!(f, "InvalidAccessKey"),
            Self::SignatureDoesNotMatch => write!(f, "SignatureDoesNotMatch"),
            Self::BucketNotEmpty => write!(f, "BucketNotEmpty"),
            Self::Unknown(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Static misconfiguration, fatal at startup.
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Network timeout, DNS, TLS — retryable, counts toward scrape_errors.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Structured remote failure surfaced by the admin API's status envelope.
    #[error("remote error {code}: {message}")]
    RemoteStatus {
        code: RemoteErrorKind,
        message: String,
        request_id: Option<String>,
    },

    /// Malformed remote response body.
    #[error("decode error: {0}")]
    Decode(String),

    /// State store read/write failure.
    #[error("kv error: {0}")]
    Kv(String),

    /// Malformed composite key.
    #[error("key format error: {0}")]
    KeyFormat(String),

    /// Admin client or bus misconfiguration (empty endpoint/keys, etc).
    #[error("config error: {0}")]
    BadConfig(String),

    #[error("signing error: {0}")]
    Signing(String),

    /// Message-bus connect/publish failure.
    #[error("bus error: {0}")]
    Bus(String),

    /// The calling task's cancellation token fired before the admin call
    /// completed.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(Box::new(e))
    }
}

impl Error {
    /// True when this error should abort the current sync/aggregation cycle.
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, Error::RemoteStatus { code, .. } if code.is_auth_failure())
    }
}
