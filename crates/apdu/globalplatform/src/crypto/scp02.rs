//! SCP02 session-key derivation and cryptogram computation

use super::mac::{expand_2key_3des, full_3des_mac, tdes_cbc_encrypt};

/// Derivation purpose bytes (GlobalPlatform 2.x Table E-1)
pub mod purpose {
    /// S-ENC
    pub const ENC: [u8; 2] = [0x01, 0x82];
    /// S-MAC
    pub const MAC: [u8; 2] = [0x01, 0x01];
    /// S-RMAC
    pub const RMAC: [u8; 2] = [0x01, 0x02];
    /// S-DEK
    pub const DEK: [u8; 2] = [0x01, 0x81];
}

/// Derive a single SCP02 session key from a static key, sequence counter and
/// derivation purpose: `3DES-CBC(K_static, IV=0, purpose(2) || seq(2) || 0^12)`.
pub fn derive_key(static_key: &[u8; 16], seq_counter: &[u8; 2], purpose: &[u8; 2]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[0..2].copy_from_slice(purpose);
    block[2..4].copy_from_slice(seq_counter);

    let key24 = expand_2key_3des(static_key);
    let encrypted = tdes_cbc_encrypt(&key24, &[0u8; 8], &block);
    let mut out = [0u8; 16];
    out.copy_from_slice(&encrypted);
    out
}

/// Derive S-ENC/S-MAC/S-RMAC/S-DEK session keys from the static keys
pub struct SessionKeys {
    /// Session encryption key
    pub s_enc: [u8; 16],
    /// Session C-MAC key
    pub s_mac: [u8; 16],
    /// Session R-MAC key
    pub s_rmac: [u8; 16],
    /// Session DEK (rarely used directly; PUT KEY uses the static DEK)
    pub s_dek: [u8; 16],
}

/// Derive all four SCP02 session keys
pub fn derive_session_keys(
    static_enc: &[u8; 16],
    static_mac: &[u8; 16],
    static_dek: &[u8; 16],
    seq_counter: &[u8; 2],
) -> SessionKeys {
    SessionKeys {
        s_enc: derive_key(static_enc, seq_counter, &purpose::ENC),
        s_mac: derive_key(static_mac, seq_counter, &purpose::MAC),
        s_rmac: derive_key(static_mac, seq_counter, &purpose::RMAC),
        s_dek: derive_key(static_dek, seq_counter, &purpose::DEK),
    }
}

/// Card cryptogram: `Full-3DES-MAC(S-ENC, 0, host || seq || card)`
pub fn card_cryptogram(
    s_enc: &[u8; 16],
    host_challenge: &[u8; 8],
    seq_counter: &[u8; 2],
    card_challenge: &[u8; 6],
) -> [u8; 8] {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(host_challenge);
    data.extend_from_slice(seq_counter);
    data.extend_from_slice(card_challenge);
    full_3des_mac(&expand_2key_3des(s_enc), &[0u8; 8], &data)
}

/// Host cryptogram: `Full-3DES-MAC(S-ENC, 0, seq || card || host)`
pub fn host_cryptogram(
    s_enc: &[u8; 16],
    seq_counter: &[u8; 2],
    card_challenge: &[u8; 6],
    host_challenge: &[u8; 8],
) -> [u8; 8] {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(seq_counter);
    data.extend_from_slice(card_challenge);
    data.extend_from_slice(host_challenge);
    full_3des_mac(&expand_2key_3des(s_enc), &[0u8; 8], &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn derive_key_matches_teacher_vector() {
        let card_key = hex!("404142434445464748494a4b4c4d4e4f");
        let seq = hex!("0065");
        let enc_key = derive_key(&card_key, &seq, &purpose::ENC);
        assert_eq!(enc_key, hex!("85e72aaf47874218a202bf5ef891dd21"));
    }

    #[test]
    fn card_cryptogram_matches_vector() {
        let enc_key: [u8; 16] = hex!("16b5867ff50be7239c2bf1245b83a36");
        let host_challenge = hex!("32da078d7aac1cff");
        let seq = hex!("0072");
        let card_challenge = hex!("84f64a7d6465");
        let expected = hex!("05c4bb8a86014e22");
        let result = card_cryptogram(&enc_key, &host_challenge, &seq, &card_challenge);
        assert_eq!(result, expected);
    }
}
