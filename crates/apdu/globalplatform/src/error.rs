//! Error types for GlobalPlatform secure-channel and card-management operations

use nexum_apdu_core::{Error as ApduError, StatusWord};

#[cfg(feature = "std")]
use thiserror::Error;

/// Result type for GlobalPlatform operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for GlobalPlatform operations
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(Error))]
pub enum Error {
    /// APDU command or transport error
    #[cfg_attr(feature = "std", error("apdu error: {0}"))]
    Apdu(ApduError),

    /// A command byte layout could not be built (oversized data/le, bad TLV)
    #[cfg_attr(feature = "std", error("malformed apdu: {0}"))]
    MalformedApdu(&'static str),

    /// BER-TLV data could not be parsed
    #[cfg_attr(feature = "std", error("malformed tlv: {0}"))]
    MalformedTlv(&'static str),

    /// CAP/IJC load-file data could not be parsed
    #[cfg_attr(feature = "std", error("malformed cap file: {0}"))]
    MalformedCap(&'static str),

    /// A higher-level CAP/IJC load-file condition (missing AID, bad index)
    #[cfg_attr(feature = "std", error("cap file error: {0}"))]
    CapFile(&'static str),

    /// The card advertised an SCP version/configuration we don't implement
    #[cfg_attr(feature = "std", error("unsupported secure channel protocol: {0:02x}"))]
    UnsupportedScp(u8),

    /// The card's cryptogram did not match our computed value
    #[cfg_attr(feature = "std", error("card cryptogram mismatch"))]
    CardCryptogramMismatch,

    /// EXTERNAL AUTHENTICATE (or another auth step) was rejected by the card
    #[cfg_attr(feature = "std", error("authentication failed: sw={0}"))]
    AuthFailed(StatusWord),

    /// A MAC over command or response data failed to verify
    #[cfg_attr(feature = "std", error("mac verification failed"))]
    MacVerifyFailed,

    /// The card returned a non-success status word for a management command
    #[cfg_attr(feature = "std", error("card status error: {0}"))]
    CardStatus(StatusWord),

    /// An ELF upgrade session is stuck in a state that requires manual resolution
    #[cfg_attr(feature = "std", error("elf upgrade session stuck in state {0:?}"))]
    UpgradeStuck(crate::commands::manage_elf_upgrade::UpgradeState),

    /// A LOAD sequence failed partway through; `block_num` is the zero-based
    /// index of the block whose transmission or status failed
    #[cfg_attr(feature = "std", error("load failed at block {block_num}: {source}"))]
    LoadFailed {
        /// Zero-based index of the block that failed
        block_num: u8,
        /// The underlying failure
        source: Box<Error>,
    },

    /// The operation was cancelled by the caller
    #[cfg_attr(feature = "std", error("operation cancelled"))]
    Cancelled,

    /// No secure channel has been established yet
    #[cfg_attr(feature = "std", error("secure channel not established"))]
    NoSecureChannel,

    /// A key value had the wrong length for its implied algorithm
    #[cfg_attr(
        feature = "std",
        error("invalid key length: expected {expected}, got {actual}")
    )]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Generic static-message error
    #[cfg_attr(feature = "std", error("{0}"))]
    Other(&'static str),

    /// Generic owned-message error (requires `std`)
    #[cfg(feature = "std")]
    #[error("{0}")]
    Message(String),
}

impl From<ApduError> for Error {
    fn from(err: ApduError) -> Self {
        Self::Apdu(err)
    }
}

#[cfg(feature = "std")]
impl From<Error> for ApduError {
    fn from(err: Error) -> Self {
        match err {
            Error::Apdu(e) => e,
            other => ApduError::message(other.to_string()),
        }
    }
}

#[cfg(not(feature = "std"))]
impl From<Error> for ApduError {
    fn from(err: Error) -> Self {
        match err {
            Error::Apdu(e) => e,
            _ => ApduError::Other("globalplatform error"),
        }
    }
}

impl Error {
    /// Build an owned-message error
    #[cfg(feature = "std")]
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Build a generic static-message error
    pub const fn other(msg: &'static str) -> Self {
        Self::Other(msg)
    }

    /// Attach additional static context to an error, preserving the original as text
    #[cfg(feature = "std")]
    pub fn with_context(self, context: &str) -> Self {
        Self::Message(format!("{context}: {self}"))
    }
}
