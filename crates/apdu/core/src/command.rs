//! APDU command definitions and wire-level codec
//!
//! Serialization follows ISO/IEC 7816-4: short-form framing when the
//! payload and expected length both fit the single-byte encoding, extended
//! form (leading `0x00` then two-byte lengths) otherwise.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::response::Response;
use crate::secure_channel::SecurityLevel;

/// Expected response length. `256`/`65536` are valid (meaning "all remaining
/// bytes") even though they don't fit in a `u16`/`u8` respectively, hence `u32`.
pub type ExpectedLength = u32;

/// Maximum `le` representable by the short APDU form (`0` means 256 bytes)
const SHORT_LE_MAX: ExpectedLength = 256;
/// Maximum `le` representable at all (extended form, `0000` means 65536 bytes)
const EXTENDED_LE_MAX: ExpectedLength = 65536;
/// Maximum `Lc` representable by the short APDU form
const SHORT_LC_MAX: usize = 255;
/// Maximum `Lc` representable by the extended APDU form
const EXTENDED_LC_MAX: usize = 65535;

/// Core trait for APDU commands
pub trait ApduCommand {
    /// Success response type
    type Success;

    /// Error response type
    type Error: fmt::Debug;

    /// Convert a core transport/codec error into the command-specific error type
    fn convert_error(error: Error) -> Self::Error;

    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data (optional)
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<ExpectedLength>;

    /// The secure-messaging level this command requires, defaulting to none
    fn required_security_level(&self) -> SecurityLevel {
        SecurityLevel::none()
    }

    /// Encode to wire-level APDU bytes
    fn to_bytes(&self) -> Bytes {
        encode(
            self.class(),
            self.instruction(),
            self.p1(),
            self.p2(),
            self.data(),
            self.expected_length(),
        )
        .expect("command data/le already validated by the command type")
    }

    /// Convert to a generic [`Command`]
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: self.data().map(Bytes::copy_from_slice),
            le: self.expected_length(),
        }
    }

    /// Parse a generic [`Response`] into this command's outcome type
    fn parse_response(response: Response) -> Result<Self::Success, Self::Error>;

    /// Parse raw wire-level response bytes into this command's outcome type
    fn parse_response_raw(bytes: Bytes) -> Result<Self::Success, Self::Error> {
        let response = Response::from_bytes(&bytes).map_err(Self::convert_error)?;
        Self::parse_response(response)
    }
}

/// Encode an APDU command to wire bytes.
///
/// Chooses short form when `len(data) <= 255` and `le <= 256`; extended form
/// (leading `0x00`, two-byte lengths) otherwise. Fails with
/// [`Error::MalformedApdu`] if `data` or `le` exceed the extended-length range.
pub fn encode(
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<&[u8]>,
    le: Option<ExpectedLength>,
) -> Result<Bytes, Error> {
    let data_len = data.map_or(0, <[u8]>::len);
    if data_len > EXTENDED_LC_MAX {
        return Err(Error::MalformedApdu("data exceeds extended-length range"));
    }
    if let Some(le) = le {
        if le > EXTENDED_LE_MAX {
            return Err(Error::MalformedApdu("le exceeds extended-length range"));
        }
    }

    let extended = data_len > SHORT_LC_MAX || le.is_some_and(|le| le > SHORT_LE_MAX);

    let mut buf = BytesMut::with_capacity(4 + data_len + 5);
    buf.put_u8(cla);
    buf.put_u8(ins);
    buf.put_u8(p1);
    buf.put_u8(p2);

    if extended {
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            buf.put_u8(0x00);
            buf.put_u16(data_len as u16);
            buf.put_slice(data);
        } else if le.is_some() {
            buf.put_u8(0x00);
        }
        if let Some(le) = le {
            let wire_le = if le == EXTENDED_LE_MAX { 0 } else { le as u16 };
            buf.put_u16(wire_le);
        }
    } else {
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            buf.put_u8(data_len as u8);
            buf.put_slice(data);
        }
        if let Some(le) = le {
            let wire_le = if le == SHORT_LE_MAX { 0 } else { le as u8 };
            buf.put_u8(wire_le);
        }
    }

    Ok(buf.freeze())
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data.into()),
            le: None,
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Parse a command from raw wire bytes (inverse of [`ApduCommand::to_bytes`])
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 4 {
            return Err(Error::InvalidCommandLength(data.len()));
        }
        let cla = data[0];
        let ins = data[1];
        let p1 = data[2];
        let p2 = data[3];
        let mut command = Self::new(cla, ins, p1, p2);
        let rest = &data[4..];

        if rest.is_empty() {
            return Ok(command);
        }

        if rest[0] == 0x00 && rest.len() != 1 {
            // Extended form: 00 + either a 2-byte Lc or (if only 2 bytes follow) a 2-byte Le
            if rest.len() == 3 {
                command.le = Some(u16::from_be_bytes([rest[1], rest[2]]) as ExpectedLength);
                if command.le == Some(0) {
                    command.le = Some(EXTENDED_LE_MAX);
                }
                return Ok(command);
            }
            if rest.len() < 3 {
                return Err(Error::InvalidCommandLength(data.len()));
            }
            let lc = u16::from_be_bytes([rest[1], rest[2]]) as usize;
            let body = &rest[3..];
            if body.len() < lc {
                return Err(Error::InvalidCommandLength(data.len()));
            }
            if lc > 0 {
                command.data = Some(Bytes::copy_from_slice(&body[..lc]));
            }
            let tail = &body[lc..];
            if tail.len() == 2 {
                let le = u16::from_be_bytes([tail[0], tail[1]]) as ExpectedLength;
                command.le = Some(if le == 0 { EXTENDED_LE_MAX } else { le });
            } else if !tail.is_empty() {
                return Err(Error::InvalidCommandLength(data.len()));
            }
            return Ok(command);
        }

        // Short form
        let lc = rest[0] as usize;
        if rest.len() == 1 {
            command.le = Some(if lc == 0 { SHORT_LE_MAX } else { lc as ExpectedLength });
            return Ok(command);
        }
        let body = &rest[1..];
        if body.len() < lc {
            return Err(Error::InvalidCommandLength(data.len()));
        }
        if lc > 0 {
            command.data = Some(Bytes::copy_from_slice(&body[..lc]));
        }
        let tail = &body[lc..];
        if tail.len() == 1 {
            let le = tail[0] as ExpectedLength;
            command.le = Some(if le == 0 { SHORT_LE_MAX } else { le });
        } else if !tail.is_empty() {
            return Err(Error::InvalidCommandLength(data.len()));
        }
        Ok(command)
    }
}

impl ApduCommand for Command {
    type Success = Response;
    type Error = Error;

    fn convert_error(error: Error) -> Self::Error {
        error
    }

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_with_data_and_le() {
        let bytes = encode(0x00, 0xA4, 0x04, 0x00, Some(&[0xA0, 0x00]), Some(0)).unwrap();
        assert_eq!(bytes.as_ref(), hex_literal::hex!("00A40400 02 A000 00"));
    }

    #[test]
    fn test_extended_form_large_data() {
        let data = vec![0xAA; 300];
        let bytes = encode(0x80, 0xE8, 0x00, 0x00, Some(&data), None).unwrap();
        assert_eq!(&bytes[..7], hex_literal::hex!("80E8000000012C"));
        assert_eq!(bytes.len(), 7 + 300);
    }

    #[test]
    fn test_le_256_is_short_form_zero() {
        let bytes = encode(0x00, 0xB0, 0x00, 0x00, None, Some(256)).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0xB0, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_le_65536_is_extended_zero() {
        let bytes = encode(0x00, 0xB0, 0x00, 0x00, None, Some(65536)).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_round_trip_short_form() {
        let data = Some(&[0x01, 0x02, 0x03][..]);
        let encoded = encode(0x00, 0xD6, 0x00, 0x00, data, Some(0)).unwrap();
        let cmd = Command::from_bytes(&encoded).unwrap();
        assert_eq!(cmd.data.as_deref(), data);
        assert_eq!(cmd.le, Some(256));
    }

    #[test]
    fn test_round_trip_extended_form() {
        let data = vec![0x11u8; 300];
        let encoded = encode(0x80, 0xE8, 0x00, 0x00, Some(&data), None).unwrap();
        let cmd = Command::from_bytes(&encoded).unwrap();
        assert_eq!(cmd.data.as_deref(), Some(data.as_slice()));
        assert_eq!(cmd.le, None);
    }

    #[test]
    fn test_rejects_oversized_data() {
        let data = vec![0u8; EXTENDED_LC_MAX + 1];
        assert!(encode(0x00, 0x00, 0x00, 0x00, Some(&data), None).is_err());
    }
}
