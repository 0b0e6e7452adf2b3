//! Error types for APDU operations

use crate::response::status::StatusWord;

/// Core error type for APDU operations
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum Error {
    /// Command byte layout could not be parsed (wrong length, truncated Lc/Le)
    #[cfg_attr(feature = "std", error("invalid command length: {0}"))]
    InvalidCommandLength(usize),

    /// Response byte layout could not be parsed (missing SW1/SW2)
    #[cfg_attr(feature = "std", error("invalid response length: {0}"))]
    InvalidResponseLength(usize),

    /// Data exceeds the representable length for the chosen APDU form
    #[cfg_attr(feature = "std", error("malformed apdu: {0}"))]
    MalformedApdu(&'static str),

    /// The transport could not deliver the command (reader/link failure)
    #[cfg_attr(feature = "std", error("transport error: {0}"))]
    Transport(&'static str),

    /// The card returned a non-success status word
    #[cfg_attr(feature = "std", error("card status error: {0}"))]
    CardStatus(StatusWord),

    /// Generic static-message error, used for conditions with no dedicated variant
    #[cfg_attr(feature = "std", error("{0}"))]
    Other(&'static str),

    /// Generic owned-message error (requires `std`)
    #[cfg(feature = "std")]
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Build an owned-message error
    #[cfg(feature = "std")]
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Build an owned-message error when `std` is unavailable
    #[cfg(not(feature = "std"))]
    pub const fn message(_msg: &'static str) -> Self {
        Self::Other("error")
    }

    /// Attach additional static context to an error, preserving the original as text
    #[cfg(feature = "std")]
    pub fn with_context(self, context: &str) -> Self {
        Self::Message(format!("{context}: {self}"))
    }

    #[cfg(not(feature = "std"))]
    pub fn with_context(self, _context: &str) -> Self {
        self
    }
}

/// Extension trait for attaching context to a `Result<_, Error>`
pub trait ResultExt<T> {
    /// Attach static context to an error, if present
    fn context(self, context: &str) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| e.with_context(context))
    }
}
