//! Static key material and authentication results

#[cfg(feature = "zeroize")]
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Static ENC/MAC/DEK keys provisioned on the card, all of equal length.
///
/// Length selects the algorithm implicitly: 16 bytes is either 2-key-3DES
/// (used by SCP02) or AES-128 (used by SCP03); 24/32 bytes is AES-192/256
/// (SCP03 only).
#[derive(Clone)]
#[cfg_attr(feature = "zeroize", derive(Zeroize, ZeroizeOnDrop))]
pub struct Keys {
    enc: Vec<u8>,
    mac: Vec<u8>,
    dek: Vec<u8>,
}

/// The GlobalPlatform test/default key set (`40 41 ... 4F`), used by default
/// on freshly-issued test cards.
const DEFAULT_KEY: [u8; 16] = [
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
];

impl Keys {
    /// Build a key set from explicit ENC/MAC/DEK values (all the same length)
    pub fn new(enc: impl Into<Vec<u8>>, mac: impl Into<Vec<u8>>, dek: impl Into<Vec<u8>>) -> Self {
        Self {
            enc: enc.into(),
            mac: mac.into(),
            dek: dek.into(),
        }
    }

    /// Build a key set using the same value for ENC, MAC and DEK
    pub fn with_single_key(key: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        Self {
            enc: key.clone(),
            mac: key.clone(),
            dek: key,
        }
    }

    /// Encryption key
    pub fn enc(&self) -> &[u8] {
        &self.enc
    }

    /// MAC key
    pub fn mac(&self) -> &[u8] {
        &self.mac
    }

    /// Data encryption key (wraps key material in PUT KEY)
    pub fn dek(&self) -> &[u8] {
        &self.dek
    }

    /// Key length in bytes (16, 24 or 32)
    pub fn key_length(&self) -> usize {
        self.enc.len()
    }
}

impl Default for Keys {
    fn default() -> Self {
        Self::with_single_key(DEFAULT_KEY.to_vec())
    }
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("key_length", &self.key_length())
            .finish_non_exhaustive()
    }
}

/// Result of a successful authentication handshake
#[derive(Debug, Clone)]
pub struct AuthOk {
    /// Key diversification data from INITIALIZE UPDATE (first 10 bytes)
    pub key_div_data: Vec<u8>,
    /// Key info (version + SCP id, + i-param for SCP03)
    pub key_info: Vec<u8>,
    /// Negotiated i-parameter
    pub i_param: u8,
}

/// GP-facade-level session bookkeeping tracked by [`crate::GlobalPlatform`]
/// across command exchanges.
///
/// This is distinct from [`AuthOk`]: `AuthOk` is the one-shot result of the
/// SCP handshake itself (owned by the secure channel), while `Session`
/// accumulates state the facade needs between calls (currently the selected
/// AID) without requiring the facade to know which concrete secure-channel
/// type its executor wraps.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// AID of the application or security domain last selected, if any
    pub selected_aid: Option<Vec<u8>>,
    /// Authentication details, when the caller surfaced them (e.g. by
    /// reading [`crate::GpSecureChannel::last_auth`] directly)
    pub auth: Option<AuthOk>,
}

impl Session {
    /// A fresh session with no selection and no recorded authentication
    pub const fn new() -> Self {
        Self {
            selected_aid: None,
            auth: None,
        }
    }
}
