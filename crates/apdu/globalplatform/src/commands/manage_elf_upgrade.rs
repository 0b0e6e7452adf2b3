//! MANAGE ELF UPGRADE command: drive the ELF upgrade session state machine

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, SecurityLevel};

use crate::constants::{cla, ins, status, tags, upgrade_action};
use crate::error::Error;
use crate::tlv;

/// Observable ELF upgrade session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    /// No upgrade session in progress
    NoSession,
    /// The previous upgrade completed successfully
    Completed,
    /// Session started, waiting for the replacement ELF to be loaded
    WaitingElf,
    /// ELF loaded, waiting for RESUME to restore application state
    WaitingRestore,
    /// RESUME's restore attempt failed
    WaitingRestoreFailed,
    /// Interrupted while saving application state
    InterruptedSaving,
    /// Interrupted during cleanup
    InterruptedCleanup,
    /// Interrupted while deleting the old ELF
    InterruptedDelete,
    /// Interrupted while installing the new ELF
    InterruptedInstall,
    /// Interrupted while restoring application state
    InterruptedRestore,
    /// Interrupted while consolidating the upgrade
    InterruptedConsolidate,
    /// A state byte the card returned that this crate doesn't recognize
    Unknown(u8),
}

impl UpgradeState {
    /// Decode a raw session-status byte
    pub const fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::NoSession,
            0x01 => Self::Completed,
            0x02 => Self::WaitingElf,
            0x03 => Self::WaitingRestore,
            0x04 => Self::WaitingRestoreFailed,
            0x10 => Self::InterruptedSaving,
            0x20 => Self::InterruptedCleanup,
            0x30 => Self::InterruptedDelete,
            0x40 => Self::InterruptedInstall,
            0x50 => Self::InterruptedRestore,
            0x60 => Self::InterruptedConsolidate,
            other => Self::Unknown(other),
        }
    }

    /// `true` for any `INTERRUPTED_*` state, which is resumable via RESUME
    pub const fn is_interrupted(self) -> bool {
        matches!(
            self,
            Self::InterruptedSaving
                | Self::InterruptedCleanup
                | Self::InterruptedDelete
                | Self::InterruptedInstall
                | Self::InterruptedRestore
                | Self::InterruptedConsolidate
        )
    }
}

/// MANAGE ELF UPGRADE (vendor-specific CLA/INS; see [`cla::MANAGE_ELF_UPGRADE`])
#[derive(Debug, Clone)]
pub struct ManageElfUpgradeCommand {
    action: u8,
    data: Bytes,
}

impl ManageElfUpgradeCommand {
    /// START a new upgrade session for `elf_aid`, optionally carrying a single `options` byte
    pub fn start(elf_aid: impl AsRef<[u8]>, options: Option<u8>) -> Self {
        let elf_aid = elf_aid.as_ref();
        let mut inner = Vec::with_capacity(2 + elf_aid.len() + 3);
        inner.push(tags::AID);
        inner.push(elf_aid.len() as u8);
        inner.extend_from_slice(elf_aid);
        if let Some(options) = options {
            inner.push(0x80);
            inner.push(0x01);
            inner.push(options);
        }

        let mut data = Vec::with_capacity(2 + inner.len());
        data.push(tags::UPGRADE_SESSION_INFO);
        data.push(inner.len() as u8);
        data.extend_from_slice(&inner);

        Self {
            action: upgrade_action::START,
            data: data.into(),
        }
    }

    /// RESUME an interrupted or waiting-restore session
    pub fn resume() -> Self {
        Self::with_empty_data(upgrade_action::RESUME)
    }

    /// RECOVERY from a failed restore
    pub fn recovery() -> Self {
        Self::with_empty_data(upgrade_action::RECOVERY)
    }

    /// ABORT the current session
    pub fn abort() -> Self {
        Self::with_empty_data(upgrade_action::ABORT)
    }

    /// STATUS: query the current session state without changing it
    pub fn status() -> Self {
        Self::with_empty_data(upgrade_action::STATUS)
    }

    fn with_empty_data(action: u8) -> Self {
        Self {
            action,
            data: Bytes::new(),
        }
    }
}

impl ApduCommand for ManageElfUpgradeCommand {
    type Success = ManageElfUpgradeOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::MANAGE_ELF_UPGRADE
    }

    fn instruction(&self) -> u8 {
        ins::MANAGE_ELF_UPGRADE
    }

    fn p1(&self) -> u8 {
        self.action
    }

    fn p2(&self) -> u8 {
        0x00
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
        let payload = response.payload().clone().map_or(Vec::new(), |b| b.to_vec());
        let (session_status, elf_aid) = parse_upgrade_response(&payload);
        Ok(ManageElfUpgradeOk {
            session_status,
            elf_aid,
        })
    }
}

/// Result of a successful MANAGE ELF UPGRADE exchange
#[derive(Debug, Clone)]
pub struct ManageElfUpgradeOk {
    /// The session's observable state, when the card's response included one.
    ///
    /// `None` means the session-info block was absent or malformed; callers
    /// must treat this as "unknown, retry STATUS" rather than as an error.
    pub session_status: Option<UpgradeState>,
    /// The ELF AID the session pertains to, when present
    pub elf_aid: Option<Vec<u8>>,
}

/// Parse `[conf_len conf_data session_info_len session_info]`, where
/// `session_info` is a BER-TLV-encoded `A1` template with children `90`
/// (status) and optional `4F` (AID).
fn parse_upgrade_response(data: &[u8]) -> (Option<UpgradeState>, Option<Vec<u8>>) {
    if data.is_empty() {
        return (None, None);
    }
    let conf_len = data[0] as usize;
    let mut offset = 1 + conf_len;
    if offset >= data.len() {
        return (None, None);
    }
    let info_len = data[offset] as usize;
    offset += 1;
    let Some(info_data) = data.get(offset..offset + info_len) else {
        return (None, None);
    };
    let Ok(nodes) = tlv::parse(info_data) else {
        return (None, None);
    };

    let mut session_status = None;
    let mut elf_aid = None;
    for node in nodes.iter().filter(|n| n.tag() == tags::UPGRADE_SESSION_INFO as u32) {
        if let Some(status_node) = node.find(tags::UPGRADE_STATUS as u32) {
            if let Some(&b) = status_node.value().first() {
                session_status = Some(UpgradeState::from_byte(b));
            }
        }
        if let Some(aid_node) = node.find(tags::AID as u32) {
            elf_aid = Some(aid_node.value().to_vec());
        }
    }
    (session_status, elf_aid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn start_wraps_aid_and_options_in_a1_template() {
        let cmd = ManageElfUpgradeCommand::start(hex!("A000000062010101"), Some(0x01));
        assert_eq!(cmd.class(), cla::MANAGE_ELF_UPGRADE);
        assert_eq!(cmd.instruction(), ins::MANAGE_ELF_UPGRADE);
        assert_eq!(cmd.p1(), upgrade_action::START);
        let expected = hex!("A10D4F08A000000062010101800101");
        assert_eq!(cmd.data(), Some(expected.as_ref()));
    }

    #[test]
    fn start_without_options_omits_80_tag() {
        let cmd = ManageElfUpgradeCommand::start(hex!("AABB"), None);
        assert_eq!(cmd.data(), Some(hex!("A1044F02AABB").as_ref()));
    }

    #[test]
    fn other_actions_carry_no_data() {
        assert_eq!(ManageElfUpgradeCommand::resume().data(), None);
        assert_eq!(ManageElfUpgradeCommand::recovery().data(), None);
        assert_eq!(ManageElfUpgradeCommand::abort().data(), None);
        assert_eq!(ManageElfUpgradeCommand::status().p1(), upgrade_action::STATUS);
    }

    #[test]
    fn parses_session_status_and_aid() {
        // conf_len=0, session_info_len=9, A1 07 [90 01 02] [4F 02 AABB]
        let payload = hex!("00 09 A107900102 4F02AABB");
        let (status, aid) = parse_upgrade_response(&payload);
        assert_eq!(status, Some(UpgradeState::WaitingElf));
        assert_eq!(aid, Some(hex!("AABB").to_vec()));
    }

    #[test]
    fn empty_payload_yields_none_none() {
        assert_eq!(parse_upgrade_response(&[]), (None, None));
    }

    #[test]
    fn malformed_session_info_yields_none_none_not_an_error() {
        // conf_len claims more bytes than present
        let payload = hex!("05AA");
        assert_eq!(parse_upgrade_response(&payload), (None, None));
    }

    #[test]
    fn interrupted_states_are_resumable() {
        assert!(UpgradeState::InterruptedInstall.is_interrupted());
        assert!(!UpgradeState::WaitingElf.is_interrupted());
        assert!(!UpgradeState::Completed.is_interrupted());
    }

    #[test]
    fn unknown_byte_round_trips() {
        assert_eq!(UpgradeState::from_byte(0x77), UpgradeState::Unknown(0x77));
    }
}
