//! INITIALIZE UPDATE command: first step of the SCP02/SCP03 handshake
//!
//! [`crate::secure_channel::GpSecureChannel::authenticate`] drives the full handshake
//! inline; this command type exists as a standalone primitive for callers that want to
//! inspect the raw 28-byte response themselves.

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response};

use crate::constants::{cla, ins, status};
use crate::error::Error;

/// INITIALIZE UPDATE (`80 50`)
#[derive(Debug, Clone)]
pub struct InitializeUpdateCommand {
    host_challenge: Bytes,
}

impl InitializeUpdateCommand {
    /// Build the command from an explicit 8-byte host challenge
    pub fn with_challenge(host_challenge: impl Into<Bytes>) -> Self {
        Self {
            host_challenge: host_challenge.into(),
        }
    }

    /// Build the command with a fresh random 8-byte host challenge
    pub fn with_random_challenge() -> Self {
        let mut challenge = [0u8; 8];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut challenge);
        Self::with_challenge(challenge.to_vec())
    }
}

impl ApduCommand for InitializeUpdateCommand {
    type Success = InitializeUpdateOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::INITIALIZE_UPDATE
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.host_challenge)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        Some(0x00)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if sw != status::SUCCESS {
            return Err(Error::CardStatus(sw));
        }
        let payload = response
            .payload()
            .as_ref()
            .ok_or(Error::MalformedApdu("empty INITIALIZE UPDATE response"))?;
        if payload.len() != 28 {
            return Err(Error::MalformedApdu("INITIALIZE UPDATE response must be 28 bytes"));
        }
        Ok(InitializeUpdateOk {
            key_diversification_data: payload[0..10].try_into().unwrap(),
            key_info: payload[10..12].try_into().unwrap(),
            sequence_counter: payload[12..14].try_into().unwrap(),
            card_challenge: payload[14..20].try_into().unwrap(),
            card_cryptogram: payload[20..28].try_into().unwrap(),
        })
    }
}

/// The 28-byte INITIALIZE UPDATE response, split into its named fields
#[derive(Debug, Clone, Copy)]
pub struct InitializeUpdateOk {
    /// Card-specific key diversification data
    pub key_diversification_data: [u8; 10],
    /// Key version number (`[0]`) and SCP protocol id (`[1]`)
    pub key_info: [u8; 2],
    /// SCP02 sequence counter (meaningless for SCP03)
    pub sequence_counter: [u8; 2],
    /// Card challenge
    pub card_challenge: [u8; 6],
    /// Card cryptogram, to be verified against the host's own computation
    pub card_cryptogram: [u8; 8],
}

impl InitializeUpdateOk {
    /// The negotiated SCP protocol id (`0x02`/`0x03`)
    pub const fn scp_version(&self) -> u8 {
        self.key_info[1]
    }

    /// The key version number the card selected
    pub const fn key_version_number(&self) -> u8 {
        self.key_info[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn initialize_update_encodes_challenge() {
        let challenge = hex!("010203");
        let cmd = InitializeUpdateCommand::with_challenge(challenge.to_vec());

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::INITIALIZE_UPDATE);
        assert_eq!(cmd.data(), Some(challenge.as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("805000000301020300"));
    }

    #[test]
    fn initialize_update_parses_28_byte_response() {
        let response_data = hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce49000");
        let response = Response::from_bytes(&response_data).unwrap();
        let ok = InitializeUpdateCommand::parse_response(response).unwrap();

        assert_eq!(ok.scp_version(), 0x02);
        assert_eq!(ok.key_version_number(), 0x20);
        assert_eq!(ok.sequence_counter, hex!("000D"));
        assert_eq!(ok.key_diversification_data, hex!("00000265018303953662"));
        assert_eq!(ok.card_challenge, hex!("E9C62BA1C4C8"));
        assert_eq!(ok.card_cryptogram, hex!("E55FCB91B6654CE4"));
    }

    #[test]
    fn initialize_update_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6982")).unwrap();
        let err = InitializeUpdateCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw == status::SECURITY_CONDITION_NOT_SATISFIED));
    }
}
