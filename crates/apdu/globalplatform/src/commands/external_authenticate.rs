//! EXTERNAL AUTHENTICATE command: second step of the handshake
//!
//! As with [`super::initialize_update`], the full handshake runs inline inside
//! [`crate::secure_channel::GpSecureChannel::authenticate`]; this type is a standalone
//! primitive for building the command by hand.

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, SecurityLevel};

use crate::constants::{cla, external_auth_p1, ins, status};
use crate::error::Error;

/// EXTERNAL AUTHENTICATE (`84 82`)
#[derive(Debug, Clone)]
pub struct ExternalAuthenticateCommand {
    p1: u8,
    host_cryptogram: Bytes,
}

impl ExternalAuthenticateCommand {
    /// Build the command from an already-computed host cryptogram, at C-MAC level
    pub fn with_host_cryptogram(host_cryptogram: impl Into<Bytes>) -> Self {
        Self {
            p1: external_auth_p1::CMAC,
            host_cryptogram: host_cryptogram.into(),
        }
    }

    /// Build the command at an explicit security level (P1 carries the level bits)
    pub fn with_security_level(host_cryptogram: impl Into<Bytes>, security_level: u8) -> Self {
        Self {
            p1: security_level,
            host_cryptogram: host_cryptogram.into(),
        }
    }
}

impl ApduCommand for ExternalAuthenticateCommand {
    type Success = ExternalAuthenticateOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::MAC
    }

    fn instruction(&self) -> u8 {
        ins::EXTERNAL_AUTHENTICATE
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.host_cryptogram)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        None
    }

    fn required_security_level(&self) -> SecurityLevel {
        SecurityLevel::from_bits(self.p1)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if sw != status::SUCCESS {
            return Err(Error::AuthFailed(sw));
        }
        Ok(ExternalAuthenticateOk)
    }
}

/// Result of a successful EXTERNAL AUTHENTICATE
#[derive(Debug, Clone, Copy)]
pub struct ExternalAuthenticateOk;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn external_authenticate_encodes_correctly() {
        let cryptogram = hex!("7702AC6CE46A47F0");
        let cmd = ExternalAuthenticateCommand::with_host_cryptogram(cryptogram.to_vec());

        assert_eq!(cmd.class(), cla::MAC);
        assert_eq!(cmd.instruction(), ins::EXTERNAL_AUTHENTICATE);
        assert_eq!(cmd.p1(), external_auth_p1::CMAC);
        assert_eq!(cmd.p2(), 0x00);
        assert_eq!(cmd.data(), Some(cryptogram.as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("84820100087702AC6CE46A47F0"));
    }

    #[test]
    fn external_authenticate_surfaces_auth_failure() {
        let response = Response::from_bytes(&hex!("6982")).unwrap();
        let err = ExternalAuthenticateCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::AuthFailed(sw) if sw == status::SECURITY_CONDITION_NOT_SATISFIED));
    }
}
