//! SCP03 session-key derivation and cryptogram computation (AES-CMAC / SP 800-108)

use super::mac::kdf_cmac;

/// KDF derivation constants (GlobalPlatform 2.3 Amendment D, §6.2.1)
pub mod constant {
    /// Card cryptogram
    pub const CARD_CRYPTOGRAM: u8 = 0x00;
    /// Host cryptogram
    pub const HOST_CRYPTOGRAM: u8 = 0x01;
    /// S-ENC
    pub const S_ENC: u8 = 0x04;
    /// S-MAC
    pub const S_MAC: u8 = 0x06;
    /// S-RMAC
    pub const S_RMAC: u8 = 0x07;
}

/// Build the 16-byte KDF context (`host_challenge || card_challenge`)
fn context(host_challenge: &[u8; 8], card_challenge: &[u8; 8]) -> [u8; 16] {
    let mut ctx = [0u8; 16];
    ctx[..8].copy_from_slice(host_challenge);
    ctx[8..].copy_from_slice(card_challenge);
    ctx
}

/// Derived SCP03 session keys (length matches the static key length)
pub struct SessionKeys {
    /// Session encryption key
    pub s_enc: Vec<u8>,
    /// Session C-MAC key
    pub s_mac: Vec<u8>,
    /// Session R-MAC key
    pub s_rmac: Vec<u8>,
}

/// Derive S-ENC/S-MAC/S-RMAC from the static ENC/MAC keys and both challenges.
/// Session key length in bits equals the static key length.
pub fn derive_session_keys(
    static_enc: &[u8],
    static_mac: &[u8],
    host_challenge: &[u8; 8],
    card_challenge: &[u8; 8],
) -> SessionKeys {
    let ctx = context(host_challenge, card_challenge);
    let key_bits = (static_enc.len() * 8) as u16;
    SessionKeys {
        s_enc: kdf_cmac(static_enc, constant::S_ENC, &ctx, key_bits),
        s_mac: kdf_cmac(static_mac, constant::S_MAC, &ctx, key_bits),
        s_rmac: kdf_cmac(static_mac, constant::S_RMAC, &ctx, key_bits),
    }
}

/// Compute the expected card cryptogram and compare against `received`
pub fn verify_card_cryptogram(
    s_mac: &[u8],
    host_challenge: &[u8; 8],
    card_challenge: &[u8; 8],
    received: &[u8],
) -> bool {
    let ctx = context(host_challenge, card_challenge);
    let expected = kdf_cmac(s_mac, constant::CARD_CRYPTOGRAM, &ctx, 0x0040);
    expected == received
}

/// Compute the host cryptogram for EXTERNAL AUTHENTICATE
pub fn compute_host_cryptogram(
    s_mac: &[u8],
    host_challenge: &[u8; 8],
    card_challenge: &[u8; 8],
) -> [u8; 8] {
    let ctx = context(host_challenge, card_challenge);
    let full = kdf_cmac(s_mac, constant::HOST_CRYPTOGRAM, &ctx, 0x0040);
    let mut out = [0u8; 8];
    out.copy_from_slice(&full);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn session_keys_deterministic() {
        let static_enc = hex!("404142434445464748494a4b4c4d4e4f");
        let static_mac = hex!("404142434445464748494a4b4c4d4e4f");
        let host = hex!("a0a1a2a3a4a5a6a7");
        let card = hex!("b0b1b2b3b4b5b6b7");

        let a = derive_session_keys(&static_enc, &static_mac, &host, &card);
        let b = derive_session_keys(&static_enc, &static_mac, &host, &card);
        assert_eq!(a.s_enc, b.s_enc);
        assert_eq!(a.s_mac, b.s_mac);
        assert_eq!(a.s_rmac, b.s_rmac);
        assert_eq!(a.s_enc.len(), 16);
        assert_ne!(a.s_enc, a.s_mac);
    }

    #[test]
    fn card_cryptogram_roundtrips_with_derived_keys() {
        let static_enc = hex!("404142434445464748494a4b4c4d4e4f");
        let static_mac = hex!("404142434445464748494a4b4c4d4e4f");
        let host = hex!("a0a1a2a3a4a5a6a7");
        let card = hex!("b0b1b2b3b4b5b6b7");
        let keys = derive_session_keys(&static_enc, &static_mac, &host, &card);

        let received = kdf_cmac(&keys.s_mac, constant::CARD_CRYPTOGRAM, &context(&host, &card), 64);
        assert!(verify_card_cryptogram(&keys.s_mac, &host, &card, &received));

        let mut tampered = received.clone();
        tampered[0] ^= 0xFF;
        assert!(!verify_card_cryptogram(&keys.s_mac, &host, &card, &tampered));

        let host_cryptogram = compute_host_cryptogram(&keys.s_mac, &host, &card);
        assert_eq!(host_cryptogram.len(), 8);
    }
}
