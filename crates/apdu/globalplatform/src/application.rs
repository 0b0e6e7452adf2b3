//! GlobalPlatform application façade
//!
//! [`GlobalPlatform`] ties the command layer, secure channel, and load-file
//! reader together into the operations a card-management controller
//! actually performs: authenticate, select, enumerate content, load and
//! install, manage keys, drive an ELF upgrade session.

use nexum_apdu_core::prelude::*;

use crate::commands::delete::DeleteOk;
use crate::commands::get_status::{ApplicationInfo, GetStatusOk, LoadFileInfo};
use crate::commands::install::InstallOk;
use crate::commands::manage_elf_upgrade::{ManageElfUpgradeOk, UpgradeState};
use crate::commands::put_key::{KcvPolicy, KeyType, PutKeyOk};
use crate::commands::select::SelectOk;
use crate::commands::set_status::SetStatusOk;
use crate::commands::{
    DeleteCommand, GetStatusCommand, InstallCommand, LoadCommand, ManageElfUpgradeCommand,
    PutKeyCommand, SelectCommand, SetStatusCommand,
};
use crate::constants::{SECURITY_DOMAIN_AID, get_status_p1, load_p1};
use crate::error::{Error, Result};
use crate::load::{CapFileInfo, LoadCommandStream};
use crate::session::Session;

/// Applications enumerated by an accumulated GET STATUS (scope APPLICATIONS)
#[derive(Debug, Clone, Default)]
pub struct ApplicationsStatus {
    /// Parsed application/supplementary-security-domain entries
    pub applications: Vec<ApplicationInfo>,
}

/// Load files enumerated by an accumulated GET STATUS (scope EXEC_LOAD_FILES[_AND_MODULES])
#[derive(Debug, Clone, Default)]
pub struct LoadFilesStatus {
    /// Parsed load file entries
    pub load_files: Vec<LoadFileInfo>,
}

/// Progress/result of driving a CAP file through LOAD
#[derive(Debug, Clone, Copy)]
pub struct LoadOk {
    /// Number of LOAD blocks successfully transmitted
    pub blocks_sent: usize,
}

/// Optional progress callback invoked after each LOAD block: `(blocks_sent, total_blocks)`
pub type LoadProgress<'a> = &'a mut dyn FnMut(usize, usize) -> Result<()>;

/// GlobalPlatform card management application
#[allow(missing_debug_implementations)]
pub struct GlobalPlatform<E>
where
    E: Executor + ResponseAwareExecutor + SecureChannelExecutor,
{
    executor: E,
    session: Session,
    last_response: Option<Bytes>,
}

impl<E> GlobalPlatform<E>
where
    E: Executor + ResponseAwareExecutor + SecureChannelExecutor,
{
    /// Create a new GlobalPlatform instance over `executor`
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            session: Session::new(),
            last_response: None,
        }
    }

    /// Select the card manager (ISD)
    pub fn select_card_manager(&mut self) -> Result<SelectOk> {
        self.select_application(SECURITY_DOMAIN_AID)
    }

    /// Select an application by AID
    pub fn select_application(&mut self, aid: &[u8]) -> Result<SelectOk> {
        let cmd = SelectCommand::with_aid(aid.to_vec());
        let response = self.executor.execute(&cmd)?;

        if let Ok(raw_response) = self.executor.last_response() {
            self.last_response = Some(raw_response.clone());
        }
        self.session.selected_aid = Some(aid.to_vec());

        Ok(response)
    }

    /// Delete an object (application, package, or supplementary security domain)
    pub fn delete_object(&mut self, aid: &[u8]) -> Result<DeleteOk> {
        let cmd = DeleteCommand::delete_object(aid);
        self.executor.execute(&cmd)
    }

    /// Delete an object and everything related to it (e.g. a package and its applets)
    pub fn delete_object_and_related(&mut self, aid: &[u8]) -> Result<DeleteOk> {
        let cmd = DeleteCommand::delete_object_and_related(aid);
        self.executor.execute(&cmd)
    }

    /// Delete a single key by its key version number
    pub fn delete_key(&mut self, key_version: u8) -> Result<DeleteOk> {
        let cmd = DeleteCommand::delete_key(key_version);
        self.executor.execute(&cmd)
    }

    /// Enumerate all applications and supplementary security domains,
    /// following the `0x6310` continuation bit until the card reports done
    pub fn get_applications_status(&mut self) -> Result<ApplicationsStatus> {
        let tlv_data = self.accumulate_status(GetStatusCommand::all_with_type(get_status_p1::APPLICATIONS))?;
        Ok(ApplicationsStatus {
            applications: crate::commands::get_status::parse_application_entries(&tlv_data),
        })
    }

    /// Enumerate all executable load files, following the continuation bit to completion
    pub fn get_load_files_status(&mut self) -> Result<LoadFilesStatus> {
        let tlv_data =
            self.accumulate_status(GetStatusCommand::all_with_type(get_status_p1::EXEC_LOAD_FILES))?;
        Ok(LoadFilesStatus {
            load_files: crate::commands::get_status::parse_load_file_entries(&tlv_data),
        })
    }

    /// Enumerate all executable load files together with their modules
    pub fn get_load_files_and_modules_status(&mut self) -> Result<LoadFilesStatus> {
        let tlv_data = self.accumulate_status(GetStatusCommand::all_with_type(
            get_status_p1::EXEC_LOAD_FILES_AND_MODULES,
        ))?;
        Ok(LoadFilesStatus {
            load_files: crate::commands::get_status::parse_load_file_entries(&tlv_data),
        })
    }

    /// Run `cmd`, then repeatedly request the next occurrence while the card
    /// replies `6310`, concatenating payloads into one TLV buffer.
    fn accumulate_status(&mut self, cmd: GetStatusCommand) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut current = cmd;
        loop {
            let GetStatusOk { tlv_data, more } = self.executor.execute(&current)?;
            data.extend_from_slice(&tlv_data);
            if !more {
                break;
            }
            current = current.next_occurrence();
        }
        Ok(data)
    }

    /// INSTALL [for load]: declare a package about to be LOADed
    pub fn install_for_load(
        &mut self,
        package_aid: &[u8],
        security_domain_aid: Option<&[u8]>,
    ) -> Result<InstallOk> {
        let sd_aid = security_domain_aid.unwrap_or(SECURITY_DOMAIN_AID);
        let cmd = InstallCommand::for_load(package_aid, sd_aid);
        self.executor.execute(&cmd)
    }

    /// INSTALL [for install]: instantiate `application_aid` without making it selectable yet
    #[allow(clippy::too_many_arguments)]
    pub fn install_for_install(
        &mut self,
        executable_load_file_aid: &[u8],
        executable_module_aid: &[u8],
        application_aid: &[u8],
        privilege: &[u8],
        install_parameters: &[u8],
        install_token: &[u8],
    ) -> Result<InstallOk> {
        let cmd = InstallCommand::for_install(
            executable_load_file_aid,
            executable_module_aid,
            application_aid,
            privilege,
            install_parameters,
            install_token,
        );
        self.executor.execute(&cmd)
    }

    /// INSTALL [for install and make selectable] in one step
    #[allow(clippy::too_many_arguments)]
    pub fn install_for_install_and_make_selectable(
        &mut self,
        executable_load_file_aid: &[u8],
        executable_module_aid: &[u8],
        application_aid: &[u8],
        privilege: &[u8],
        install_parameters: &[u8],
        install_token: &[u8],
    ) -> Result<InstallOk> {
        let cmd = InstallCommand::for_install_and_make_selectable(
            executable_load_file_aid,
            executable_module_aid,
            application_aid,
            privilege,
            install_parameters,
            install_token,
        );
        self.executor.execute(&cmd)
    }

    /// Drive a [`LoadCommandStream`] to completion, emitting one LOAD per block
    /// with monotonically increasing `block_num`. Aborts on the first
    /// non-success status, reporting the block index reached via
    /// [`Error::LoadFailed`].
    pub fn load(&mut self, stream: &mut LoadCommandStream, mut progress: Option<LoadProgress<'_>>) -> Result<LoadOk> {
        let mut blocks_sent = 0;
        while stream.has_next() {
            let (is_last, block_num, block_data) = stream
                .next_block()
                .ok_or(Error::other("load stream reported has_next but yielded none"))?;
            let p1 = if is_last { load_p1::LAST_BLOCK } else { load_p1::MORE_BLOCKS };
            let cmd = LoadCommand::with_block_data(p1, block_num, block_data.to_vec());

            self.executor.execute(&cmd).map_err(|source| Error::LoadFailed {
                block_num,
                source: Box::new(source),
            })?;
            blocks_sent += 1;

            if let Some(cb) = &mut progress {
                cb(stream.current_block(), stream.blocks_count())?;
            }
        }
        Ok(LoadOk { blocks_sent })
    }

    /// Load a CAP file from `path` and run it through [`Self::load`]
    pub fn load_cap_file<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
        progress: Option<LoadProgress<'_>>,
    ) -> Result<LoadOk> {
        let mut stream = LoadCommandStream::from_cap_file(path)?;
        self.load(&mut stream, progress)
    }

    /// Install a single applet from a CAP file: INSTALL [for load], LOAD, then
    /// INSTALL [for install and make selectable] using the applet's own AID as
    /// both executable module and application instance AID
    pub fn install_applet_from_cap<P: AsRef<std::path::Path>>(
        &mut self,
        cap_file: P,
        applet_index: usize,
        progress: Option<LoadProgress<'_>>,
    ) -> Result<InstallOk> {
        let mut stream = LoadCommandStream::from_cap_file(&cap_file)?;
        let info = stream.info()?;

        let package_aid = info.package_aid.ok_or(Error::CapFile("package AID not found"))?;
        let applet_aid = info
            .applet_aids
            .get(applet_index)
            .ok_or(Error::CapFile("applet index out of range"))?
            .clone();

        self.install_for_load(&package_aid, None)?;
        self.load(&mut stream, progress)?;
        self.install_for_install_and_make_selectable(&package_aid, &applet_aid, &applet_aid, &[], &[], &[])
    }

    /// Install every applet declared in a CAP file, using each applet's own
    /// AID as both executable module and application instance AID
    pub fn install_all_applets_from_cap<P: AsRef<std::path::Path>>(
        &mut self,
        cap_file: P,
        mut progress: Option<LoadProgress<'_>>,
    ) -> Result<Vec<InstallOk>> {
        let mut stream = LoadCommandStream::from_cap_file(&cap_file)?;
        let info = stream.info()?;

        let package_aid = info.package_aid.ok_or(Error::CapFile("package AID not found"))?;
        if info.applet_aids.is_empty() {
            return Err(Error::CapFile("no applets declared in cap file"));
        }

        self.install_for_load(&package_aid, None)?;
        self.load(&mut stream, progress.as_deref_mut())?;

        info.applet_aids
            .iter()
            .map(|applet_aid| {
                self.install_for_install_and_make_selectable(&package_aid, applet_aid, applet_aid, &[], &[], &[])
            })
            .collect()
    }

    /// Extract package/applet identity from a CAP file without loading it
    pub fn analyze_cap_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<CapFileInfo> {
        LoadCommandStream::from_cap_file(path)?.info()
    }

    /// PUT KEY: load or replace a single key under `key_id`
    pub fn put_key(
        &mut self,
        key_version: u8,
        key_id: u8,
        dek: &[u8],
        key_type: KeyType,
        key: &[u8],
    ) -> Result<PutKeyOk> {
        let cmd = PutKeyCommand::new(key_version, key_id, dek, key_type, key)?;
        self.executor.execute(&cmd)
    }

    /// PUT KEY: load or replace several keys (e.g. ENC/MAC/DEK) in one exchange
    pub fn put_keys(
        &mut self,
        key_version: u8,
        first_key_id: u8,
        dek: &[u8],
        keys: &[(KeyType, &[u8])],
        kcv_policy: KcvPolicy,
    ) -> Result<PutKeyOk> {
        let cmd = PutKeyCommand::multiple(key_version, first_key_id, dek, keys, kcv_policy)?;
        self.executor.execute(&cmd)
    }

    /// SET STATUS: change the issuer security domain's own lifecycle state
    pub fn set_issuer_security_domain_status(&mut self, state: u8) -> Result<SetStatusOk> {
        let cmd = SetStatusCommand::issuer_security_domain(state);
        self.executor.execute(&cmd)
    }

    /// SET STATUS: change an application or supplementary security domain's lifecycle state
    pub fn set_application_status(&mut self, aid: &[u8], state: u8) -> Result<SetStatusOk> {
        let cmd = SetStatusCommand::application(aid, state);
        self.executor.execute(&cmd)
    }

    /// Start a MANAGE ELF UPGRADE session for `elf_aid`; fails with
    /// `CardStatus(6985)` if a session is already in progress
    pub fn start_elf_upgrade(&mut self, elf_aid: &[u8], options: Option<u8>) -> Result<ManageElfUpgradeOk> {
        let cmd = ManageElfUpgradeCommand::start(elf_aid, options);
        self.executor.execute(&cmd)
    }

    /// RESUME an interrupted or waiting-restore upgrade session. If the session
    /// is `INTERRUPTED_*` and the attempt does not progress, returns
    /// `UpgradeStuck` carrying the state the card reported.
    pub fn resume_elf_upgrade(&mut self) -> Result<ManageElfUpgradeOk> {
        let before = self.elf_upgrade_status()?.session_status;
        let cmd = ManageElfUpgradeCommand::resume();
        let result = self.executor.execute(&cmd)?;
        if let (Some(before), Some(after)) = (before, result.session_status) {
            if before.is_interrupted() && after == before {
                return Err(Error::UpgradeStuck(after));
            }
        }
        Ok(result)
    }

    /// RECOVERY from a failed restore
    pub fn recover_elf_upgrade(&mut self) -> Result<ManageElfUpgradeOk> {
        let cmd = ManageElfUpgradeCommand::recovery();
        self.executor.execute(&cmd)
    }

    /// ABORT the current upgrade session
    pub fn abort_elf_upgrade(&mut self) -> Result<ManageElfUpgradeOk> {
        let cmd = ManageElfUpgradeCommand::abort();
        self.executor.execute(&cmd)
    }

    /// STATUS: query the current upgrade session state without changing it
    pub fn elf_upgrade_status(&mut self) -> Result<ManageElfUpgradeOk> {
        let cmd = ManageElfUpgradeCommand::status();
        self.executor.execute(&cmd)
    }

    /// `true` if the last known upgrade session state is `NO_SESSION` or `COMPLETED`
    pub fn elf_upgrade_is_idle(status: Option<UpgradeState>) -> bool {
        matches!(status, None | Some(UpgradeState::NoSession | UpgradeState::Completed))
    }

    /// The current session (selected AID and any surfaced auth details)
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Get the executor
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Get a mutable reference to the executor
    pub const fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Close the secure channel and clear session bookkeeping
    pub fn close_secure_channel(&mut self) -> Result<()> {
        self.executor.close_secure_channel()?;
        self.session = Session::new();
        Ok(())
    }

    /// Select the card manager and open a secure channel using the executor's configured keys
    pub fn open_secure_channel(&mut self) -> Result<()> {
        self.select_card_manager()?;
        self.executor.open_secure_channel().map_err(Error::from)
    }

    /// `true` if the secure channel has completed its handshake
    pub fn is_secure_channel_open(&self) -> bool {
        self.executor.has_secure_channel()
    }

    /// Currently negotiated security level of the secure channel
    pub fn security_level(&self) -> SecurityLevel {
        self.executor.security_level()
    }

    /// The raw bytes of the last response received, if any
    pub fn last_response(&self) -> Option<&[u8]> {
        self.last_response.as_deref()
    }

    /// GET DATA (tag `0x0066`): raw card data, including CPLC when the card supports it
    pub fn get_card_data(&mut self) -> Result<Vec<u8>> {
        let cmd = crate::iso7816::GetDataCommand::new(0x0066);
        Ok(self.executor.execute(&cmd)?.data)
    }

    /// INSTALL [for personalization], then hand off `data` as opaque perso parameters
    pub fn personalize_application(&mut self, app_aid: &[u8], data: &[u8]) -> Result<()> {
        let cmd = InstallCommand::for_personalization(app_aid, data);
        self.executor
            .execute(&cmd)
            .map_err(|e| e.with_context("personalization failed"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use nexum_apdu_core::transport::MockTransport;

    fn mock_select_response() -> Bytes {
        Bytes::copy_from_slice(&hex!("6F 10 84 08 A0 00 00 01 51 00 00 00 A5 04 9F 65 01 FF 90 00"))
    }

    #[test]
    fn select_card_manager_succeeds_and_records_selected_aid() {
        let transport = MockTransport::with_response(mock_select_response());
        let secure_channel = crate::GpSecureChannel::new(transport, crate::Keys::default());
        let executor = CardExecutor::new(secure_channel);
        let mut gp = GlobalPlatform::new(executor);

        let result = gp.select_card_manager();
        assert!(result.is_ok());
        assert_eq!(gp.session().selected_aid.as_deref(), Some(SECURITY_DOMAIN_AID));
    }

    #[test]
    fn get_applications_status_accumulates_across_continuation() {
        let entry_a = hex!("E30F4F07A0000000030000C5010AC60106");
        let entry_b = hex!("E3124F08A000000003000001C50104C60301FF02");
        let transport = MockTransport::with_responses([
            Bytes::copy_from_slice(&[entry_a.as_ref(), &hex!("6310")].concat()),
            Bytes::copy_from_slice(&[entry_b.as_ref(), &hex!("9000")].concat()),
        ]);
        let secure_channel = crate::GpSecureChannel::new(transport, crate::Keys::default());
        let executor = CardExecutor::new(secure_channel);
        let mut gp = GlobalPlatform::new(executor);

        let status = gp.get_applications_status().unwrap();
        assert_eq!(status.applications.len(), 2);
        assert_eq!(status.applications[0].aid, hex!("A0000000030000").to_vec());
        assert_eq!(status.applications[1].aid, hex!("A000000003000001").to_vec());
    }

    #[test]
    fn load_reports_failed_block_and_aborts_via_typed_error() {
        // Block 0 transmits fine; block 1 is rejected by the card mid-load.
        let transport = MockTransport::with_responses([
            Bytes::copy_from_slice(&hex!("9000")),
            Bytes::copy_from_slice(&hex!("6A84")),
        ]);
        let secure_channel = crate::GpSecureChannel::new(transport, crate::Keys::default());
        let mut executor = CardExecutor::new(secure_channel);
        executor
            .secure_channel_mut()
            .force_scp03_established_for_test(SecurityLevel::mac_protected());
        let mut gp = GlobalPlatform::new(executor);

        let mut stream = LoadCommandStream::with_block_size(vec![0xAA; 20], 10);
        let err = gp.load(&mut stream, None).unwrap_err();
        match err {
            Error::LoadFailed { block_num, source } => {
                assert_eq!(block_num, 1);
                assert!(matches!(*source, Error::CardStatus(_)));
            }
            other => panic!("expected Error::LoadFailed, got {other:?}"),
        }
    }
}
