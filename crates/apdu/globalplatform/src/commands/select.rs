//! SELECT command: select an application or the card manager by AID

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, StatusWord};

use crate::constants::{cla, ins, select_p1, status};
use crate::error::Error;
use crate::tlv;

/// SELECT (`00 A4`)
#[derive(Debug, Clone)]
pub struct SelectCommand {
    p1: u8,
    p2: u8,
    aid: Bytes,
}

impl SelectCommand {
    /// Select by DF name (the common case: an application or security domain AID)
    pub fn with_aid(aid: impl Into<Bytes>) -> Self {
        Self {
            p1: select_p1::BY_NAME,
            p2: 0x00,
            aid: aid.into(),
        }
    }

    /// Select with explicit P1/P2 (e.g. next/previous occurrence)
    pub fn new_with_params(p1: u8, p2: u8, aid: impl Into<Bytes>) -> Self {
        Self {
            p1,
            p2,
            aid: aid.into(),
        }
    }
}

impl ApduCommand for SelectCommand {
    type Success = SelectOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::ISO7816
    }

    fn instruction(&self) -> u8 {
        ins::SELECT
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        self.p2
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.aid)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        // SELECT's `le` is present (value 0) only when (p2 & 0x0C) != 0x0C
        (self.p2 & 0x0C != 0x0C).then_some(0)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if !sw.is_success() {
            return Err(Error::CardStatus(sw));
        }
        let fci = response.payload().clone().map(|b| b.to_vec());
        Ok(SelectOk { fci, sw })
    }
}

/// Result of a successful SELECT
#[derive(Debug, Clone)]
pub struct SelectOk {
    /// File Control Information, if the card returned one
    pub fci: Option<Vec<u8>>,
    /// Final status word (always `9000` here)
    pub sw: StatusWord,
}

impl SelectOk {
    /// Extract the application label (tag `0x50`) from the FCI, if present
    pub fn application_label(&self) -> Option<Vec<u8>> {
        let fci = self.fci.as_ref()?;
        let nodes = tlv::parse(fci).ok()?;
        nodes
            .iter()
            .find_map(|n| n.find_recursive(crate::constants::tags::APPLICATION_LABEL as u32))
            .map(|n| n.value().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn select_with_aid_encodes_correctly() {
        let aid = hex!("A0000000030000");
        let cmd = SelectCommand::with_aid(aid.to_vec());

        assert_eq!(cmd.class(), cla::ISO7816);
        assert_eq!(cmd.instruction(), ins::SELECT);
        assert_eq!(cmd.p1(), select_p1::BY_NAME);
        assert_eq!(cmd.p2(), 0x00);
        assert_eq!(cmd.data(), Some(aid.as_ref()));
        assert_eq!(cmd.expected_length(), Some(0x00));

        assert_eq!(cmd.to_bytes().as_ref(), hex!("00A4040007A000000003000000"));
    }

    #[test]
    fn select_parses_fci_and_extracts_label() {
        let fci = hex!("6F1A840E315041592E5359532E4444463031500841 50504C4142454C");
        let mut raw = fci.to_vec();
        raw.extend_from_slice(&hex!("9000"));
        let response = Response::from_bytes(&raw).unwrap();
        let ok = SelectCommand::parse_response(response).unwrap();
        assert_eq!(ok.fci.as_deref(), Some(fci.as_ref()));
        assert_eq!(ok.application_label().unwrap(), b"APPLABEL".to_vec());
    }

    #[test]
    fn select_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6A82")).unwrap();
        let err = SelectCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw == status::FILE_NOT_FOUND));
    }
}
