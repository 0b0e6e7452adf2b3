//! SET STATUS command: change the lifecycle state of an ISD, application or package

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, SecurityLevel};

use crate::constants::{cla, ins, status};
use crate::error::Error;

/// SET STATUS (`80 F0 scope state [AID]`)
#[derive(Debug, Clone)]
pub struct SetStatusCommand {
    scope: u8,
    state: u8,
    data: Bytes,
}

impl SetStatusCommand {
    /// Set the issuer security domain's own lifecycle state (no AID in the data field)
    pub fn issuer_security_domain(state: u8) -> Self {
        Self {
            scope: crate::constants::get_status_p1::ISSUER_SECURITY_DOMAIN,
            state,
            data: Bytes::new(),
        }
    }

    /// Set the lifecycle state of an application or supplementary security domain
    pub fn application(aid: impl AsRef<[u8]>, state: u8) -> Self {
        Self {
            scope: crate::constants::get_status_p1::APPLICATIONS,
            state,
            data: Bytes::copy_from_slice(aid.as_ref()),
        }
    }
}

impl ApduCommand for SetStatusCommand {
    type Success = SetStatusOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::SET_STATUS
    }

    fn p1(&self) -> u8 {
        self.scope
    }

    fn p2(&self) -> u8 {
        self.state
    }

    fn data(&self) -> Option<&[u8]> {
        (!self.data.is_empty()).then_some(&self.data)
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
        Ok(SetStatusOk)
    }
}

/// Result of a successful SET STATUS exchange
#[derive(Debug, Clone, Copy)]
pub struct SetStatusOk;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn application_encodes_scope_state_and_aid() {
        let cmd = SetStatusCommand::application(hex!("A0000000030000"), 0x07);
        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::SET_STATUS);
        assert_eq!(cmd.p1(), crate::constants::get_status_p1::APPLICATIONS);
        assert_eq!(cmd.p2(), 0x07);
        assert_eq!(cmd.data(), Some(hex!("A0000000030000").as_ref()));
    }

    #[test]
    fn issuer_security_domain_has_no_data() {
        let cmd = SetStatusCommand::issuer_security_domain(0x0F);
        assert_eq!(cmd.data(), None);
        assert_eq!(
            cmd.to_bytes().as_ref(),
            hex!("80F0800F00")
        );
    }

    #[test]
    fn set_status_requires_mac_protection() {
        let cmd = SetStatusCommand::issuer_security_domain(0x0F);
        assert_eq!(cmd.required_security_level(), SecurityLevel::mac_protected());
    }

    #[test]
    fn set_status_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6A86")).unwrap();
        let err = SetStatusCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(_)));
    }
}
