//! INSTALL command: load-file and application lifecycle transitions

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response};

use crate::constants::{cla, ins, install_p1, status};
use crate::error::Error;

/// INSTALL (`80 E6`)
#[derive(Debug, Clone)]
pub struct InstallCommand {
    p1: u8,
    data: Bytes,
}

impl InstallCommand {
    fn with_p1_data(p1: u8, data: Vec<u8>) -> Self {
        Self {
            p1,
            data: data.into(),
        }
    }

    /// INSTALL [for load]: declare an executable load file about to be LOADed
    /// under `security_domain_aid`
    pub fn for_load(load_file_aid: impl AsRef<[u8]>, security_domain_aid: impl AsRef<[u8]>) -> Self {
        let load_file_aid = load_file_aid.as_ref();
        let security_domain_aid = security_domain_aid.as_ref();

        let mut data = Vec::with_capacity(3 + load_file_aid.len() + security_domain_aid.len());
        data.push(load_file_aid.len() as u8);
        data.extend_from_slice(load_file_aid);
        data.push(security_domain_aid.len() as u8);
        data.extend_from_slice(security_domain_aid);
        // Empty hash, empty install parameters, empty token
        data.extend_from_slice(&[0x00, 0x00, 0x00]);

        Self::with_p1_data(install_p1::FOR_LOAD, data)
    }

    /// INSTALL [for install]: instantiate `application_aid` from `executable_module_aid`
    /// without making it selectable yet
    #[allow(clippy::too_many_arguments)]
    pub fn for_install(
        executable_load_file_aid: impl AsRef<[u8]>,
        executable_module_aid: impl AsRef<[u8]>,
        application_aid: impl AsRef<[u8]>,
        privilege: impl AsRef<[u8]>,
        install_parameters: impl AsRef<[u8]>,
        install_token: impl AsRef<[u8]>,
    ) -> Self {
        let data = build_install_data(
            executable_load_file_aid,
            executable_module_aid,
            application_aid,
            privilege,
            install_parameters,
            install_token,
        );
        Self::with_p1_data(install_p1::FOR_INSTALL, data)
    }

    /// INSTALL [for install and make selectable]: instantiate and make selectable in one step
    #[allow(clippy::too_many_arguments)]
    pub fn for_install_and_make_selectable(
        executable_load_file_aid: impl AsRef<[u8]>,
        executable_module_aid: impl AsRef<[u8]>,
        application_aid: impl AsRef<[u8]>,
        privilege: impl AsRef<[u8]>,
        install_parameters: impl AsRef<[u8]>,
        install_token: impl AsRef<[u8]>,
    ) -> Self {
        let data = build_install_data(
            executable_load_file_aid,
            executable_module_aid,
            application_aid,
            privilege,
            install_parameters,
            install_token,
        );
        Self::with_p1_data(install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE, data)
    }

    /// INSTALL [for personalization]: mark `application_aid` as the personalization target,
    /// carrying `data` as opaque perso parameters
    pub fn for_personalization(application_aid: impl AsRef<[u8]>, data: impl AsRef<[u8]>) -> Self {
        let app_aid = application_aid.as_ref();
        let app_data = data.as_ref();

        let mut cmd_data = Vec::with_capacity(app_aid.len() + app_data.len() + 6);
        cmd_data.push(0x00); // empty load file AID
        cmd_data.push(0x00); // empty module AID
        cmd_data.push(app_aid.len() as u8);
        cmd_data.extend_from_slice(app_aid);
        cmd_data.push(0x00); // empty privileges
        cmd_data.push(app_data.len() as u8);
        cmd_data.extend_from_slice(app_data);
        cmd_data.push(0x00); // empty token

        Self::with_p1_data(install_p1::FOR_PERSONALIZATION, cmd_data)
    }
}

impl ApduCommand for InstallCommand {
    type Success = InstallOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::INSTALL
    }

    fn p1(&self) -> u8 {
        self.p1
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<nexum_apdu_core::ExpectedLength> {
        Some(0x00)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        if sw != status::SUCCESS {
            return Err(Error::CardStatus(sw));
        }
        Ok(InstallOk)
    }
}

/// Result of a successful INSTALL exchange (the card returns no payload)
#[derive(Debug, Clone, Copy)]
pub struct InstallOk;

/// Assemble the INSTALL [for install]/[for install and make selectable] data field:
/// a flat sequence of length-prefixed fields, with install parameters wrapped
/// in a `C9` TLV even when empty.
fn build_install_data(
    executable_load_file_aid: impl AsRef<[u8]>,
    executable_module_aid: impl AsRef<[u8]>,
    application_aid: impl AsRef<[u8]>,
    privilege: impl AsRef<[u8]>,
    install_parameters: impl AsRef<[u8]>,
    install_token: impl AsRef<[u8]>,
) -> Vec<u8> {
    let executable_load_file_aid = executable_load_file_aid.as_ref();
    let executable_module_aid = executable_module_aid.as_ref();
    let application_aid = application_aid.as_ref();
    let privilege = privilege.as_ref();
    let install_parameters = install_parameters.as_ref();
    let install_token = install_token.as_ref();

    let mut data = Vec::new();

    data.push(executable_load_file_aid.len() as u8);
    data.extend_from_slice(executable_load_file_aid);

    data.push(executable_module_aid.len() as u8);
    data.extend_from_slice(executable_module_aid);

    data.push(application_aid.len() as u8);
    data.extend_from_slice(application_aid);

    data.push(privilege.len() as u8);
    data.extend_from_slice(privilege);

    let mut params_tlv = Vec::with_capacity(2 + install_parameters.len());
    params_tlv.push(crate::constants::tags::INSTALL_PARAMS);
    params_tlv.push(install_parameters.len() as u8);
    params_tlv.extend_from_slice(install_parameters);
    data.push(params_tlv.len() as u8);
    data.extend_from_slice(&params_tlv);

    data.push(install_token.len() as u8);
    data.extend_from_slice(install_token);

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn install_for_load_encodes_correctly() {
        let package_aid = hex!("53746174757357616C6C6574");
        let sd_aid = hex!("A000000151000000");
        let cmd = InstallCommand::for_load(package_aid, sd_aid);

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::INSTALL);
        assert_eq!(cmd.p1(), install_p1::FOR_LOAD);
        assert_eq!(cmd.p2(), 0x00);

        let expected_data = hex!("0C53746174757357616C6C657408A000000151000000000000");
        assert_eq!(cmd.data(), Some(expected_data.as_ref()));

        assert_eq!(
            cmd.to_bytes().as_ref(),
            hex!("80E60200190C53746174757357616C6C657408A000000151000000000000 00")
        );
    }

    #[test]
    fn install_for_install_and_make_selectable_wraps_params_in_c9() {
        let package_aid = hex!("53746174757357616C6C6574");
        let module_aid = hex!("53746174757357616C6C6574417070");
        let applet_aid = hex!("53746174757357616C6C6574417070");
        let privileges = hex!("01");
        let install_params = hex!("AABBCC");
        let install_token = hex!("");

        let cmd = InstallCommand::for_install_and_make_selectable(
            package_aid,
            module_aid,
            applet_aid,
            privileges,
            install_params,
            install_token,
        );

        assert_eq!(cmd.p1(), install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE);

        let expected_data = hex!(
            "0C53746174757357616C6C65740F53746174757357616C6C65744170700F53746174757357616C6C6574417070010105C903AABBCC00"
        );
        assert_eq!(cmd.data(), Some(expected_data.as_ref()));
    }

    #[test]
    fn install_for_install_wraps_empty_params_in_c9() {
        let cmd = InstallCommand::for_install(
            hex!("AABB"),
            hex!("CCDD"),
            hex!("EEFF"),
            hex!("00"),
            hex!(""),
            hex!(""),
        );
        // C9 00 (empty params TLV) is still present, length-prefixed by 0x02
        let expected = hex!("02AABB02CCDD02EEFF010002C90000");
        assert_eq!(cmd.data(), Some(expected.as_ref()));
    }

    #[test]
    fn install_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6982")).unwrap();
        let err = InstallCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw == status::SECURITY_CONDITION_NOT_SATISFIED));
    }
}
