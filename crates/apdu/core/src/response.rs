//! APDU response types and status-word handling

use std::fmt;

use bytes::Bytes;

use crate::error::Error;

/// Two-byte status word returned with every card response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Build a status word from its two bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// The combined 16-bit status word
    pub const fn value(&self) -> u16 {
        ((self.sw1 as u16) << 8) | self.sw2 as u16
    }

    /// `true` when the status word is `9000`
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// `true` when the status word indicates a GET STATUS/GET RESPONSE continuation (`61xx`)
    pub const fn has_more_data(&self) -> bool {
        self.sw1 == 0x61
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.sw1, self.sw2)
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

/// Status words common across ISO-7816 and GlobalPlatform commands
pub mod status {
    use super::StatusWord;

    /// Well-known status words shared by most card commands
    pub mod common {
        use super::StatusWord;

        /// `9000` — normal completion
        pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
        /// `6700` — wrong length
        pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);
        /// `6A86` — incorrect P1/P2
        pub const INCORRECT_P1P2: StatusWord = StatusWord::new(0x6A, 0x86);
        /// `6A88` — referenced data not found
        pub const REFERENCED_DATA_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x88);
        /// `6A82` — file or application not found
        pub const FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);
        /// `6982` — security condition not satisfied
        pub const SECURITY_CONDITION_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);
        /// `6983` — authentication method blocked
        pub const AUTHENTICATION_METHOD_BLOCKED: StatusWord = StatusWord::new(0x69, 0x83);
        /// `6985` — conditions of use not satisfied
        pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x85);
        /// `6A80` — incorrect data
        pub const WRONG_DATA: StatusWord = StatusWord::new(0x6A, 0x80);
    }

    /// `sw1 == 0x61`, data-continuation family (`le` in `sw2`)
    pub const fn is_more_data(sw: StatusWord) -> bool {
        sw.sw1 == 0x61
    }

    /// `6310` — GET STATUS continuation
    pub const GET_STATUS_MORE_DATA: StatusWord = StatusWord::new(0x63, 0x10);
}

/// Generic APDU response: payload plus status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Option<Bytes>,
    sw: StatusWord,
}

impl Response {
    /// Build a successful response with optional payload
    pub fn success(payload: Option<Bytes>) -> Self {
        Self {
            payload,
            sw: status::common::SUCCESS,
        }
    }

    /// Build a response from payload and explicit status word
    pub fn new(payload: Option<Bytes>, sw: StatusWord) -> Self {
        Self { payload, sw }
    }

    /// Parse a response from raw wire bytes (payload followed by SW1 SW2)
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 2 {
            return Err(Error::InvalidResponseLength(data.len()));
        }
        let (body, sw) = data.split_at(data.len() - 2);
        let payload = if body.is_empty() {
            None
        } else {
            Some(Bytes::copy_from_slice(body))
        };
        Ok(Self {
            payload,
            sw: StatusWord::new(sw[0], sw[1]),
        })
    }

    /// Response payload, if any
    pub const fn payload(&self) -> &Option<Bytes> {
        &self.payload
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.sw
    }

    /// `true` when the status word is `9000`
    pub const fn is_success(&self) -> bool {
        self.sw.is_success()
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        let mut buf = Vec::with_capacity(response.payload.as_ref().map_or(0, Bytes::len) + 2);
        if let Some(payload) = &response.payload {
            buf.extend_from_slice(payload);
        }
        buf.push(response.sw.sw1);
        buf.push(response.sw.sw2);
        buf.into()
    }
}

/// Trait implemented by command-specific response/outcome types
pub trait ApduResponse: Sized {
    /// Parse the response-specific type directly from raw wire bytes
    fn from_bytes(data: &[u8]) -> Result<Self, Error>;
}

impl ApduResponse for Response {
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(data)
    }
}

/// Small helpers shared by response parsers
pub mod utils {
    use super::{Error, StatusWord};

    /// Require at least `len` bytes in `data`, else fail with `InvalidResponseLength`
    pub fn check_length(data: &[u8], len: usize) -> Result<(), Error> {
        if data.len() < len {
            return Err(Error::InvalidResponseLength(data.len()));
        }
        Ok(())
    }

    /// Turn a status word into a `CardStatus` error
    pub const fn status_error(sw: StatusWord) -> Error {
        Error::CardStatus(sw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_value() {
        let sw = StatusWord::new(0x90, 0x00);
        assert_eq!(sw.value(), 0x9000);
        assert!(sw.is_success());
    }

    #[test]
    fn test_response_round_trip() {
        let data = Bytes::from_static(&[0x01, 0x02, 0x03]);
        let resp = Response::success(Some(data.clone()));
        let bytes: Bytes = resp.clone().into();
        assert_eq!(bytes.as_ref(), &[0x01, 0x02, 0x03, 0x90, 0x00]);

        let parsed = Response::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, resp);
    }

    #[test]
    fn test_response_no_payload() {
        let resp = Response::from_bytes(&[0x6A, 0x82]).unwrap();
        assert!(resp.payload().is_none());
        assert_eq!(resp.status(), StatusWord::new(0x6A, 0x82));
        assert!(!resp.is_success());
    }

    #[test]
    fn test_response_too_short() {
        assert!(Response::from_bytes(&[0x90]).is_err());
    }
}
