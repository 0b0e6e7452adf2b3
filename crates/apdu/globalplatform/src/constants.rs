//! Constants defined by the GlobalPlatform card specification
//!
//! CLA/INS bytes, P1/P2 parameter values, well-known tags and status words
//! used throughout the command layer.

/// GlobalPlatform command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
    /// Secure messaging command class (with MAC)
    pub const MAC: u8 = 0x84;
    /// MANAGE ELF UPGRADE command class (vendor-specific; GlobalPlatform
    /// itself does not standardize a CLA/INS pair for this operation, so
    /// cards commonly reuse the plain GP class with a dedicated INS)
    pub const MANAGE_ELF_UPGRADE: u8 = 0x80;
}

/// GlobalPlatform instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// GET DATA command
    pub const GET_DATA: u8 = 0xCA;
    /// PUT DATA command
    pub const PUT_DATA: u8 = 0xDA;
    /// READ BINARY command
    pub const READ_BINARY: u8 = 0xB0;
    /// UPDATE BINARY command
    pub const UPDATE_BINARY: u8 = 0xD6;
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// GET RESPONSE command
    pub const GET_RESPONSE: u8 = 0xC0;
    /// DELETE command
    pub const DELETE: u8 = 0xE4;
    /// LOAD command
    pub const LOAD: u8 = 0xE8;
    /// INSTALL command
    pub const INSTALL: u8 = 0xE6;
    /// GET STATUS command
    pub const GET_STATUS: u8 = 0xF2;
    /// SET STATUS command
    pub const SET_STATUS: u8 = 0xF0;
    /// PUT KEY command
    pub const PUT_KEY: u8 = 0xD8;
    /// STORE DATA command
    pub const STORE_DATA: u8 = 0xE2;
    /// MANAGE ELF UPGRADE (vendor-specific class, see [`cla::MANAGE_ELF_UPGRADE`])
    pub const MANAGE_ELF_UPGRADE: u8 = 0xE4;
}

/// Parameter values for SELECT command (P1)
pub mod select_p1 {
    /// Select by DF name
    pub const BY_NAME: u8 = 0x04;
}

/// Parameter values for EXTERNAL AUTHENTICATE command (P1), also used as
/// [`nexum_apdu_core::SecurityLevel`] bit positions for GP's own purposes
pub mod external_auth_p1 {
    /// Authenticate using C-MAC
    pub const CMAC: u8 = 0x01;
    /// Authenticate using C-DECRYPTION
    pub const CDEC: u8 = 0x02;
    /// Authenticate using R-MAC
    pub const RMAC: u8 = 0x10;
    /// Authenticate using R-ENCRYPTION
    pub const RENC: u8 = 0x20;
}

/// Parameter values for INSTALL command (P1)
pub mod install_p1 {
    /// Install for load
    pub const FOR_LOAD: u8 = 0x02;
    /// Install for install
    pub const FOR_INSTALL: u8 = 0x04;
    /// Install for make selectable
    pub const FOR_MAKE_SELECTABLE: u8 = 0x08;
    /// Install for install and make selectable
    pub const FOR_INSTALL_AND_MAKE_SELECTABLE: u8 = FOR_INSTALL | FOR_MAKE_SELECTABLE;
    /// Install for extradition
    pub const FOR_EXTRADITION: u8 = 0x10;
    /// Install for personalization
    pub const FOR_PERSONALIZATION: u8 = 0x20;
    /// Install for registry update
    pub const FOR_REGISTRY_UPDATE: u8 = 0x40;
}

/// Parameter values for LOAD command (P1)
pub mod load_p1 {
    /// More blocks to follow
    pub const MORE_BLOCKS: u8 = 0x00;
    /// Last block
    pub const LAST_BLOCK: u8 = 0x80;
}

/// Parameter values for GET STATUS command (P1) — scope selector
pub mod get_status_p1 {
    /// Get status of the issuer security domain
    pub const ISSUER_SECURITY_DOMAIN: u8 = 0x80;
    /// Get status of applications (and supplementary security domains)
    pub const APPLICATIONS: u8 = 0x40;
    /// Get status of executable load files
    pub const EXEC_LOAD_FILES: u8 = 0x20;
    /// Get status of executable load files and their modules
    pub const EXEC_LOAD_FILES_AND_MODULES: u8 = 0x10;
}

/// Parameter values for GET STATUS command (P2)
pub mod get_status_p2 {
    /// Return data in TLV format
    pub const TLV_DATA: u8 = 0x02;
    /// Continuation bit: set to request the next batch of entries
    pub const NEXT_OCCURRENCE: u8 = 0x01;
}

/// Parameter values for DELETE command (P2)
pub mod delete_p2 {
    /// Delete object only
    pub const OBJECT: u8 = 0x00;
    /// Delete object and related objects (e.g. package and its applets)
    pub const OBJECT_AND_RELATED: u8 = 0x80;
}

/// Actions for MANAGE ELF UPGRADE
pub mod upgrade_action {
    /// Start a new upgrade session
    pub const START: u8 = 0x01;
    /// Resume an interrupted/waiting session
    pub const RESUME: u8 = 0x02;
    /// Recover from a failed restore
    pub const RECOVERY: u8 = 0x03;
    /// Abort the current session
    pub const ABORT: u8 = 0x04;
    /// Query the current session status
    pub const STATUS: u8 = 0x08;
}

/// Commonly used status words in GlobalPlatform
pub mod status {
    use nexum_apdu_core::StatusWord;

    /// `9000` — success
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
    /// `6310` — GET STATUS continuation
    pub const GET_STATUS_MORE_DATA: StatusWord = StatusWord::new(0x63, 0x10);
    /// `6985` — conditions of use not satisfied (e.g. upgrade session exists)
    pub const CONDITIONS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x85);
    /// `6700` — wrong length
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);
    /// `6A80` — incorrect data
    pub const WRONG_DATA: StatusWord = StatusWord::new(0x6A, 0x80);
    /// `6A82` — file or application not found
    pub const FILE_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x82);
    /// `6A88` — referenced data not found
    pub const REFERENCED_DATA_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x88);
    /// `6982` — security condition not satisfied
    pub const SECURITY_CONDITION_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);
    /// `6983` — authentication method blocked
    pub const AUTHENTICATION_METHOD_BLOCKED: StatusWord = StatusWord::new(0x69, 0x83);
    /// `6986` — command not allowed
    pub const COMMAND_NOT_ALLOWED: StatusWord = StatusWord::new(0x69, 0x86);
}

/// Tags used in GlobalPlatform commands and responses
pub mod tags {
    /// AID tag (DELETE input, GET STATUS entries, Header/Applet CAP components)
    pub const AID: u8 = 0x4F;
    /// Application/load-file entry (GET STATUS, scope APPLICATIONS)
    pub const APPLICATION_ENTRY: u8 = 0xE3;
    /// Load-file entry (GET STATUS, scope EXEC_LOAD_FILES[_AND_MODULES])
    pub const LOAD_FILE_ENTRY: u8 = 0xE2;
    /// Lifecycle state (single byte)
    pub const LIFECYCLE: u8 = 0xC5;
    /// Privileges (one or more bytes)
    pub const PRIVILEGES: u8 = 0xC6;
    /// Executable module AID, repeatable
    pub const EXECUTABLE_MODULE_AID: u8 = 0x84;
    /// Application label
    pub const APPLICATION_LABEL: u8 = 0x50;
    /// Security domain management data
    pub const SD_MANAGEMENT_DATA: u8 = 0x73;
    /// Key diversification data
    pub const KEY_DIVERSIFICATION_DATA: u8 = 0xCF;
    /// INSTALL install-parameters template
    pub const INSTALL_PARAMS: u8 = 0xC9;
    /// Load file data block hash
    pub const LOAD_FILE_DATA_BLOCK_HASH: u8 = 0xC4;
    /// Upgrade session-info template
    pub const UPGRADE_SESSION_INFO: u8 = 0xA1;
    /// Upgrade session status (single byte, inside [`UPGRADE_SESSION_INFO`])
    pub const UPGRADE_STATUS: u8 = 0x90;
    /// DELETE-by-key-version-number template (DELETE command data field)
    pub const DELETE_KEY_VERSION: u8 = 0xD2;
    /// Executable load file AID an application belongs to (GET STATUS app entries)
    pub const EXECUTABLE_LOAD_FILE_AID: u8 = 0xC4;
    /// Associated security domain AID (GET STATUS app/load-file entries)
    pub const ASSOCIATED_SD_AID: u8 = 0xCC;
    /// Version number (GET STATUS app/load-file entries)
    pub const VERSION_NUMBER: u8 = 0xCE;
}

/// Secure Channel Protocol (SCP) versions
pub mod scp {
    /// SCP01 protocol version
    pub const SCP01: u8 = 0x01;
    /// SCP02 protocol version
    pub const SCP02: u8 = 0x02;
    /// SCP03 protocol version
    pub const SCP03: u8 = 0x03;
}

/// Default host/card challenge length in bytes, both protocols
pub const CHALLENGE_LENGTH: usize = 8;

/// Default LOAD block size (bytes of CAP data per LOAD command), chosen to
/// fit a short-form Lc after MAC and secure-messaging overhead
pub const DEFAULT_BLOCK_SIZE: usize = 239;

/// Security domain AID (ISD), used when no explicit security domain is given
pub const SECURITY_DOMAIN_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00];
