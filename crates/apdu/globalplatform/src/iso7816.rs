//! Thin ISO 7816-4 generic file command framers
//!
//! These exist only because the GP command layer's own SELECT is built on
//! one of them; none carry GP-specific business logic. SELECT itself lives
//! in [`crate::commands::select`] since it returns a GP-flavoured FCI
//! helper — the constructors here are the undecorated byte framers for
//! GET DATA/PUT DATA/READ BINARY/UPDATE BINARY.

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response};

use crate::constants::{cla, ins};
use crate::error::Error;

/// GET DATA (`00 CA`): read a BER-TLV data object by tag
#[derive(Debug, Clone, Copy)]
pub struct GetDataCommand {
    tag: u16,
}

impl GetDataCommand {
    /// Build a GET DATA command for `tag`, split big-endian across P1/P2
    pub const fn new(tag: u16) -> Self {
        Self { tag }
    }
}

impl ApduCommand for GetDataCommand {
    type Success = GetDataOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::ISO7816
    }

    fn instruction(&self) -> u8 {
        ins::GET_DATA
    }

    fn p1(&self) -> u8 {
        (self.tag >> 8) as u8
    }

    fn p2(&self) -> u8 {
        self.tag as u8
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        Some(0x00)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if !sw.is_success() {
            return Err(Error::CardStatus(sw));
        }
        Ok(GetDataOk {
            data: response.payload().clone().map_or(Vec::new(), |b| b.to_vec()),
        })
    }
}

/// Result of a successful GET DATA
#[derive(Debug, Clone)]
pub struct GetDataOk {
    /// Raw data object value
    pub data: Vec<u8>,
}

/// PUT DATA (`00 DA`): write a BER-TLV data object by tag
#[derive(Debug, Clone)]
pub struct PutDataCommand {
    tag: u16,
    data: Bytes,
}

impl PutDataCommand {
    /// Build a PUT DATA command for `tag` carrying `data`
    pub fn new(tag: u16, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }
}

impl ApduCommand for PutDataCommand {
    type Success = PutDataOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::ISO7816
    }

    fn instruction(&self) -> u8 {
        ins::PUT_DATA
    }

    fn p1(&self) -> u8 {
        (self.tag >> 8) as u8
    }

    fn p2(&self) -> u8 {
        self.tag as u8
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if !sw.is_success() {
            return Err(Error::CardStatus(sw));
        }
        Ok(PutDataOk)
    }
}

/// Result of a successful PUT DATA
#[derive(Debug, Clone, Copy)]
pub struct PutDataOk;

/// Either an explicit offset or a short-file-identifier-relative offset, as
/// used by READ/UPDATE BINARY's P1/P2 rule
#[derive(Debug, Clone, Copy)]
pub enum FileRef {
    /// Plain 15-bit offset into the currently selected file
    Offset(u16),
    /// Offset relative to the file named by `sfi` (0..=0x1F)
    Sfi { sfi: u8, offset: u8 },
}

impl FileRef {
    const fn p1_p2(self) -> (u8, u8) {
        match self {
            Self::Offset(offset) => (((offset >> 8) & 0x7F) as u8, offset as u8),
            Self::Sfi { sfi, offset } => (0x80 | (sfi & 0x1F), offset),
        }
    }
}

/// READ BINARY (`00 B0`)
#[derive(Debug, Clone, Copy)]
pub struct ReadBinaryCommand {
    file_ref: FileRef,
    le: u8,
}

impl ReadBinaryCommand {
    /// Read up to `le` bytes (0 meaning 256) from `file_ref`
    pub const fn new(file_ref: FileRef, le: u8) -> Self {
        Self { file_ref, le }
    }
}

impl ApduCommand for ReadBinaryCommand {
    type Success = ReadBinaryOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::ISO7816
    }

    fn instruction(&self) -> u8 {
        ins::READ_BINARY
    }

    fn p1(&self) -> u8 {
        self.file_ref.p1_p2().0
    }

    fn p2(&self) -> u8 {
        self.file_ref.p1_p2().1
    }

    fn data(&self) -> Option<&[u8]> {
        None
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        Some(self.le as u32)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if !sw.is_success() {
            return Err(Error::CardStatus(sw));
        }
        Ok(ReadBinaryOk {
            data: response.payload().clone().map_or(Vec::new(), |b| b.to_vec()),
        })
    }
}

/// Result of a successful READ BINARY
#[derive(Debug, Clone)]
pub struct ReadBinaryOk {
    /// Bytes read
    pub data: Vec<u8>,
}

/// UPDATE BINARY (`00 D6`)
#[derive(Debug, Clone)]
pub struct UpdateBinaryCommand {
    file_ref: FileRef,
    data: Bytes,
}

impl UpdateBinaryCommand {
    /// Write `data` to `file_ref`
    pub fn new(file_ref: FileRef, data: impl Into<Bytes>) -> Self {
        Self {
            file_ref,
            data: data.into(),
        }
    }
}

impl ApduCommand for UpdateBinaryCommand {
    type Success = UpdateBinaryOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::ISO7816
    }

    fn instruction(&self) -> u8 {
        ins::UPDATE_BINARY
    }

    fn p1(&self) -> u8 {
        self.file_ref.p1_p2().0
    }

    fn p2(&self) -> u8 {
        self.file_ref.p1_p2().1
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        None
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if !sw.is_success() {
            return Err(Error::CardStatus(sw));
        }
        Ok(UpdateBinaryOk)
    }
}

/// Result of a successful UPDATE BINARY
#[derive(Debug, Clone, Copy)]
pub struct UpdateBinaryOk;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn get_data_splits_tag_across_p1_p2() {
        let cmd = GetDataCommand::new(0x0066);
        assert_eq!(cmd.p1(), 0x00);
        assert_eq!(cmd.p2(), 0x66);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("00CA006600"));
    }

    #[test]
    fn read_binary_plain_offset_clears_bit7() {
        let cmd = ReadBinaryCommand::new(FileRef::Offset(0x0050), 0x10);
        assert_eq!(cmd.p1(), 0x00);
        assert_eq!(cmd.p2(), 0x50);
    }

    #[test]
    fn read_binary_sfi_sets_bit7_and_masks_sfi() {
        let cmd = ReadBinaryCommand::new(FileRef::Sfi { sfi: 0x1F, offset: 0x04 }, 0x00);
        assert_eq!(cmd.p1(), 0x9F);
        assert_eq!(cmd.p2(), 0x04);
    }

    #[test]
    fn update_binary_encodes_data_with_no_le() {
        let cmd = UpdateBinaryCommand::new(FileRef::Offset(0), hex!("AABB").to_vec());
        assert_eq!(cmd.to_bytes().as_ref(), hex!("00D6000002AABB"));
    }

    #[test]
    fn get_data_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6A88")).unwrap();
        let err = GetDataCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(_)));
    }
}
