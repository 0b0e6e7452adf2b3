//! GET STATUS command: enumerate applications and load files

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response};

use crate::constants::{cla, get_status_p1, get_status_p2, ins, status, tags};
use crate::error::Error;
use crate::tlv;

/// GET STATUS (`80 F2`)
#[derive(Debug, Clone)]
pub struct GetStatusCommand {
    p1: u8,
    p2: u8,
    data: Bytes,
}

impl GetStatusCommand {
    /// Build a GET STATUS command for `scope` (a [`get_status_p1`] value) filtered by `aid`
    /// (an empty slice matches everything)
    pub fn with_aid_filter(scope: u8, aid: impl AsRef<[u8]>) -> Self {
        let aid = aid.as_ref();
        let mut data = Vec::with_capacity(2 + aid.len());
        data.push(tags::AID);
        data.push(aid.len() as u8);
        data.extend_from_slice(aid);
        Self {
            p1: scope,
            p2: get_status_p2::TLV_DATA,
            data: data.into(),
        }
    }

    /// GET STATUS for `scope` with no AID filter (matches every entry)
    pub fn all_with_type(scope: u8) -> Self {
        Self::with_aid_filter(scope, [])
    }

    /// Status of the issuer security domain
    pub fn issuer_security_domain() -> Self {
        Self::all_with_type(get_status_p1::ISSUER_SECURITY_DOMAIN)
    }

    /// Status of applications and supplementary security domains
    pub fn applications() -> Self {
        Self::all_with_type(get_status_p1::APPLICATIONS)
    }

    /// Status of executable load files
    pub fn executable_load_files() -> Self {
        Self::all_with_type(get_status_p1::EXEC_LOAD_FILES)
    }

    /// Status of executable load files together with their modules
    pub fn executable_load_files_and_modules() -> Self {
        Self::all_with_type(get_status_p1::EXEC_LOAD_FILES_AND_MODULES)
    }

    /// Build the continuation request for the next batch of entries (sets the
    /// `NEXT_OCCURRENCE` bit in P2, repeats the same P1/AID filter)
    pub fn next_occurrence(&self) -> Self {
        Self {
            p1: self.p1,
            p2: self.p2 | get_status_p2::NEXT_OCCURRENCE,
            data: self.data.clone(),
        }
    }
}

impl ApduCommand for GetStatusCommand {
    type Success = GetStatusOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::GET_STATUS
    }

    fn p1(&self) -> u8 {
        self.p1
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

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        let sw = response.status();
        let tlv_data = response.payload().clone().map_or(Vec::new(), |b| b.to_vec());
        if sw == status::SUCCESS {
            Ok(GetStatusOk {
                tlv_data,
                more: false,
            })
        } else if sw == status::GET_STATUS_MORE_DATA {
            Ok(GetStatusOk {
                tlv_data,
                more: true,
            })
        } else {
            Err(Error::CardStatus(sw))
        }
    }
}

/// Result of a single GET STATUS exchange (see [`crate::application::GlobalPlatform::get_applications_status`]
/// for the accumulating loop that drives [`Self::more`] to completion)
#[derive(Debug, Clone)]
pub struct GetStatusOk {
    /// Raw TLV payload for this batch
    pub tlv_data: Vec<u8>,
    /// `true` when the card signalled `6310` and more entries remain
    pub more: bool,
}

/// Application (or supplementary security domain) entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Application AID
    pub aid: Vec<u8>,
    /// Lifecycle state byte
    pub lifecycle: u8,
    /// Privilege bytes
    pub privileges: Vec<u8>,
    /// AID of the executable load file this application was instantiated from,
    /// when the card includes it
    pub executable_load_file: Option<Vec<u8>>,
    /// Executable module AIDs associated with this application, when the card
    /// includes them
    pub executable_modules: Vec<Vec<u8>>,
    /// Version number of the application's executable load file, when the
    /// card includes it
    pub version: Option<Vec<u8>>,
    /// AID of the security domain this application (or supplementary SD) is
    /// associated with, when the card includes it
    pub associated_sd: Option<Vec<u8>>,
}

/// Executable load file entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFileInfo {
    /// Load file AID
    pub aid: Vec<u8>,
    /// Lifecycle state byte
    pub lifecycle: u8,
    /// Associated module AIDs (present only when queried with
    /// [`get_status_p1::EXEC_LOAD_FILES_AND_MODULES`])
    pub modules: Vec<Vec<u8>>,
    /// Version number of the load file, when the card includes it
    pub version: Option<Vec<u8>>,
    /// AID of the security domain this load file is associated with, when
    /// the card includes it
    pub associated_sd: Option<Vec<u8>>,
}

/// Parse `E3`-tagged application entries out of accumulated GET STATUS TLV data
pub fn parse_application_entries(data: &[u8]) -> Vec<ApplicationInfo> {
    let Ok(nodes) = tlv::parse(data) else {
        return Vec::new();
    };
    nodes
        .iter()
        .filter(|n| n.tag() == tags::APPLICATION_ENTRY as u32)
        .filter_map(parse_application_entry)
        .collect()
}

/// Parse `E2`-tagged load file entries out of accumulated GET STATUS TLV data
pub fn parse_load_file_entries(data: &[u8]) -> Vec<LoadFileInfo> {
    let Ok(nodes) = tlv::parse(data) else {
        return Vec::new();
    };
    nodes
        .iter()
        .filter(|n| n.tag() == tags::LOAD_FILE_ENTRY as u32)
        .filter_map(parse_load_file_entry)
        .collect()
}

fn parse_application_entry(node: &tlv::Node) -> Option<ApplicationInfo> {
    let aid = node.find(tags::AID as u32)?.value().to_vec();
    let lifecycle = node
        .find(tags::LIFECYCLE as u32)
        .and_then(|n| n.value().first().copied())
        .unwrap_or(0);
    let privileges = node
        .find(tags::PRIVILEGES as u32)
        .map(|n| n.value().to_vec())
        .unwrap_or_default();
    let executable_load_file = node
        .find(tags::EXECUTABLE_LOAD_FILE_AID as u32)
        .map(|n| n.value().to_vec());
    let executable_modules = node
        .children()
        .iter()
        .filter(|n| n.tag() == tags::EXECUTABLE_MODULE_AID as u32)
        .map(|n| n.value().to_vec())
        .collect();
    let version = node
        .find(tags::VERSION_NUMBER as u32)
        .map(|n| n.value().to_vec());
    let associated_sd = node
        .find(tags::ASSOCIATED_SD_AID as u32)
        .map(|n| n.value().to_vec());
    Some(ApplicationInfo {
        aid,
        lifecycle,
        privileges,
        executable_load_file,
        executable_modules,
        version,
        associated_sd,
    })
}

fn parse_load_file_entry(node: &tlv::Node) -> Option<LoadFileInfo> {
    let aid = node.find(tags::AID as u32)?.value().to_vec();
    let lifecycle = node
        .find(tags::LIFECYCLE as u32)
        .and_then(|n| n.value().first().copied())
        .unwrap_or(0);
    let modules = node
        .children()
        .iter()
        .filter(|n| n.tag() == tags::EXECUTABLE_MODULE_AID as u32)
        .map(|n| n.value().to_vec())
        .collect();
    let version = node
        .find(tags::VERSION_NUMBER as u32)
        .map(|n| n.value().to_vec());
    let associated_sd = node
        .find(tags::ASSOCIATED_SD_AID as u32)
        .map(|n| n.value().to_vec());
    Some(LoadFileInfo {
        aid,
        lifecycle,
        modules,
        version,
        associated_sd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn get_status_encodes_aid_filter() {
        let cmd = GetStatusCommand::with_aid_filter(get_status_p1::APPLICATIONS, hex!("AABBCC"));
        assert_eq!(cmd.p1(), get_status_p1::APPLICATIONS);
        assert_eq!(cmd.p2(), get_status_p2::TLV_DATA);
        assert_eq!(cmd.data(), Some(hex!("4F03AABBCC").as_ref()));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F24002054F03AABBCC00"));
    }

    #[test]
    fn get_status_all_with_type_uses_empty_aid() {
        let cmd = GetStatusCommand::all_with_type(get_status_p1::APPLICATIONS);
        assert_eq!(cmd.data(), Some(hex!("4F00").as_ref()));
    }

    #[test]
    fn next_occurrence_sets_continuation_bit() {
        let cmd = GetStatusCommand::applications();
        let cont = cmd.next_occurrence();
        assert_eq!(cont.p2(), get_status_p2::TLV_DATA | get_status_p2::NEXT_OCCURRENCE);
        assert_eq!(cont.data(), cmd.data());
    }

    #[test]
    fn parse_response_detects_continuation_and_success() {
        let tlv_data = hex!("E3144F07A0000000030000C5010AC4019AC10100860102");
        let more = Response::from_bytes(&[tlv_data.as_ref(), &hex!("6310")].concat()).unwrap();
        let ok = GetStatusCommand::parse_response(more).unwrap();
        assert!(ok.more);
        assert_eq!(ok.tlv_data, tlv_data.to_vec());

        let done = Response::from_bytes(&[tlv_data.as_ref(), &hex!("9000")].concat()).unwrap();
        let ok = GetStatusCommand::parse_response(done).unwrap();
        assert!(!ok.more);
    }

    #[test]
    fn parses_application_entries() {
        let data = hex!(
            "E30F4F07A0000000030000C5010AC60106"
            "E3124F08A000000003000001C50104C60301FF02"
        );
        let apps = parse_application_entries(&data);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].aid, hex!("A0000000030000").to_vec());
        assert_eq!(apps[0].lifecycle, 0x0A);
        assert_eq!(apps[0].privileges, hex!("06").to_vec());
        assert_eq!(apps[1].aid, hex!("A000000003000001").to_vec());
        assert_eq!(apps[1].lifecycle, 0x04);
        assert_eq!(apps[1].privileges, hex!("01FF02").to_vec());
    }

    #[test]
    fn parses_application_entry_extended_fields() {
        let data = hex!(
            "E31F4F05AABBCCDDEEC50107C60100C4051122334455CE020102CC05A000000003"
        );
        let apps = parse_application_entries(&data);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].executable_load_file, Some(hex!("1122334455").to_vec()));
        assert_eq!(apps[0].version, Some(hex!("0102").to_vec()));
        assert_eq!(apps[0].associated_sd, Some(hex!("A000000003").to_vec()));
        assert!(apps[0].executable_modules.is_empty());
    }

    #[test]
    fn parses_load_file_entries_with_modules() {
        let data = hex!(
            "E20C4F07A0000000030000C50107"
            "E2184F08A000000003000102C501088409A000000003000102A1"
        );
        let files = parse_load_file_entries(&data);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].modules.len(), 0);
        assert_eq!(files[1].aid, hex!("A000000003000102").to_vec());
        assert_eq!(files[1].lifecycle, 0x08);
        assert_eq!(files[1].modules.len(), 1);
        assert_eq!(files[1].modules[0], hex!("A000000003000102A1").to_vec());
    }
}
