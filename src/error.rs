//! Error types for the Posnet client and gateway.
//!
//! Every failure of a Posnet exchange falls into one of a few kinds:
//!
//! - **Configuration** ([`ConfigurationError`]): bad input or settings, raised
//!   before any network call.
//! - **Transport** ([`PosnetError::Transport`], [`PosnetError::RequestEncoding`]):
//!   the request could not be built or sent.
//! - **Decoding** ([`DecodingError`]): the bank answered but the body is unreadable
//!   or fails its integrity check.
//! - **Declined** ([`PosnetError::Declined`]): a well-formed answer that does not
//!   approve the transaction.
//!
//! None of them is retried internally.

use thiserror::Error;

/// Invalid settings or caller input. Always raised before I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Invalid endpoint URL for {environment}: {reason}")]
    InvalidEndpoint { environment: String, reason: String },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Installment count out of range: {0}")]
    InvalidInstallment(u8),

    #[error("Invalid expiry date: {0}")]
    InvalidExpiry(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Posnet id is required for 3-D Secure transactions")]
    MissingPosnetId,

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// The bank answered, but the answer could not be read or trusted.
#[derive(Error, Debug)]
pub enum DecodingError {
    #[error("Unrecognized charset label: {0}")]
    UnknownCharset(String),

    #[error("Response body is not valid {0}")]
    MalformedBody(&'static str),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Response is missing <{0}>")]
    MissingElement(&'static str),

    #[error("Response {0} does not match the request")]
    FieldMismatch(&'static str),

    #[error("Response MAC does not match")]
    MacMismatch,
}

/// Coarse classification of a [`PosnetError`], used to pick HTTP statuses and log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Decoding,
    Declined,
    Cancelled,
}

#[derive(Error, Debug)]
pub enum PosnetError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to encode request XML: {0}")]
    RequestEncoding(quick_xml::DeError),

    #[error("Failed to decode response: {0}")]
    Decoding(#[from] DecodingError),

    /// The bank processed the request and refused it. Code and text are the bank's own.
    #[error("Transaction declined ({code}): {text}")]
    Declined { code: String, text: String },

    #[error("Request cancelled")]
    Cancelled,
}

impl PosnetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PosnetError::Configuration(_) => ErrorKind::Configuration,
            PosnetError::Transport(_) | PosnetError::RequestEncoding(_) => ErrorKind::Transport,
            PosnetError::Decoding(_) => ErrorKind::Decoding,
            PosnetError::Declined { .. } => ErrorKind::Declined,
            PosnetError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, PosnetError>;
