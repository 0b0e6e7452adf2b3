//! DELETE command: remove an application, package, or key

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, SecurityLevel};

use crate::constants::{cla, delete_p2, ins, status, tags};
use crate::error::Error;

/// DELETE (`80 E4`)
#[derive(Debug, Clone)]
pub struct DeleteCommand {
    p2: u8,
    data: Bytes,
}

impl DeleteCommand {
    /// DELETE an object identified by `aid`, with explicit `p2`
    pub fn with_aid(aid: impl AsRef<[u8]>, p2: u8) -> Self {
        let aid = aid.as_ref();
        let mut data = Vec::with_capacity(2 + aid.len());
        data.push(tags::AID);
        data.push(aid.len() as u8);
        data.extend_from_slice(aid);
        Self {
            p2,
            data: data.into(),
        }
    }

    /// DELETE the object only
    pub fn delete_object(aid: impl AsRef<[u8]>) -> Self {
        Self::with_aid(aid, delete_p2::OBJECT)
    }

    /// DELETE the object and everything related to it (e.g. a package and its applets)
    pub fn delete_object_and_related(aid: impl AsRef<[u8]>) -> Self {
        Self::with_aid(aid, delete_p2::OBJECT_AND_RELATED)
    }

    /// DELETE a single key by its key version number (`80 E4 00 00  D2 01 kvn`)
    pub fn delete_key(key_version: u8) -> Self {
        Self {
            p2: delete_p2::OBJECT,
            data: vec![tags::DELETE_KEY_VERSION, 0x01, key_version].into(),
        }
    }
}

impl ApduCommand for DeleteCommand {
    type Success = DeleteOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::DELETE
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        self.p2
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
        Ok(DeleteOk)
    }
}

/// Result of a successful DELETE
#[derive(Debug, Clone, Copy)]
pub struct DeleteOk;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn delete_object_encodes_correctly() {
        let aid = hex!("0102030405");
        let cmd = DeleteCommand::delete_object(aid);

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::DELETE);
        assert_eq!(cmd.p1(), 0x00);
        assert_eq!(cmd.p2(), delete_p2::OBJECT);
        assert_eq!(cmd.data(), Some(hex!("4F050102030405").as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E40000074F05010203040500"));
    }

    #[test]
    fn delete_object_and_related_sets_p2() {
        let aid = hex!("A0000000030000");
        let cmd = DeleteCommand::delete_object_and_related(aid);
        assert_eq!(cmd.p2(), delete_p2::OBJECT_AND_RELATED);
        assert_eq!(cmd.data(), Some(hex!("4F07A0000000030000").as_ref()));
    }

    #[test]
    fn delete_key_encodes_kvn_template() {
        let cmd = DeleteCommand::delete_key(0x0F);
        assert_eq!(cmd.p2(), delete_p2::OBJECT);
        assert_eq!(cmd.data(), Some(hex!("D2010F").as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E4000003D2010F00"));
    }

    #[test]
    fn delete_requires_mac_protection() {
        let cmd = DeleteCommand::delete_object(hex!("AABB"));
        assert_eq!(cmd.required_security_level(), SecurityLevel::mac_protected());
    }

    #[test]
    fn delete_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6A88")).unwrap();
        let err = DeleteCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw == status::REFERENCED_DATA_NOT_FOUND));
    }
}
