//! LOAD command: transfer one block of an executable load file

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, SecurityLevel};

use crate::constants::{cla, ins, load_p1, status};
use crate::error::Error;

/// LOAD (`80 E8`)
#[derive(Debug, Clone)]
pub struct LoadCommand {
    p1: u8,
    block_num: u8,
    data: Bytes,
}

impl LoadCommand {
    /// Build a LOAD command carrying `block_data` as `block_num`, with `p1` selecting
    /// whether more blocks follow ([`load_p1::MORE_BLOCKS`]) or this is the
    /// last one ([`load_p1::LAST_BLOCK`])
    pub fn with_block_data(p1: u8, block_num: u8, block_data: impl Into<Bytes>) -> Self {
        Self {
            p1,
            block_num,
            data: block_data.into(),
        }
    }

    /// A non-final block
    pub fn more_blocks(block_num: u8, block_data: impl Into<Bytes>) -> Self {
        Self::with_block_data(load_p1::MORE_BLOCKS, block_num, block_data)
    }

    /// The final block of a load sequence
    pub fn last_block(block_num: u8, block_data: impl Into<Bytes>) -> Self {
        Self::with_block_data(load_p1::LAST_BLOCK, block_num, block_data)
    }
}

impl ApduCommand for LoadCommand {
    type Success = LoadOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::LOAD
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.block_num
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        Some(0x00)
    }

    fn required_security_level(&self) -> SecurityLevel {
        SecurityLevel::mac_protected()
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if sw != status::SUCCESS {
            return Err(Error::CardStatus(sw));
        }
        Ok(LoadOk)
    }
}

/// Result of a successful LOAD exchange for a single block
#[derive(Debug, Clone, Copy)]
pub struct LoadOk;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn more_blocks_uses_p1_zero() {
        let cmd = LoadCommand::more_blocks(0x03, hex!("AABBCC").to_vec());
        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::LOAD);
        assert_eq!(cmd.p1(), load_p1::MORE_BLOCKS);
        assert_eq!(cmd.p2(), 0x03);
        assert_eq!(cmd.data(), Some(hex!("AABBCC").as_ref()));
    }

    #[test]
    fn last_block_sets_p1() {
        let cmd = LoadCommand::last_block(0x04, hex!("DD").to_vec());
        assert_eq!(cmd.p1(), load_p1::LAST_BLOCK);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E88004 01 DD 00"));
    }

    #[test]
    fn load_requires_mac_protection() {
        let cmd = LoadCommand::more_blocks(0x00, hex!("00").to_vec());
        assert_eq!(cmd.required_security_level(), SecurityLevel::mac_protected());
    }

    #[test]
    fn load_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6A84")).unwrap();
        let err = LoadCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(_)));
    }
}
