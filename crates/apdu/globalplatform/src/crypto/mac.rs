//! Shared MAC/padding primitives (ISO 9797-1, AES-CMAC, SP 800-108 KDF)
//!
//! These are generic building blocks consumed by both [`super::scp02`] and
//! [`super::scp03`]; neither SCP variant's state lives here.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use cmac::{Cmac, Mac};
use des::{Des, TdesEde3};
use generic_array::GenericArray;

/// Append `0x80` then minimal `0x00` bytes to reach a multiple of `block_size`
/// (ISO 9797-1 Method 2 padding)
pub fn pad80(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out.push(0x80);
    while out.len() % block_size != 0 {
        out.push(0x00);
    }
    out
}

/// Expand a 16-byte 2-key 3DES key to its 24-byte form (`K || K[..8]`)
pub fn expand_2key_3des(key16: &[u8]) -> [u8; 24] {
    let mut out = [0u8; 24];
    out[..16].copy_from_slice(key16);
    out[16..24].copy_from_slice(&key16[..8]);
    out
}

/// 3DES-ECB encrypt a single 8-byte block with a 24-byte key
pub fn tdes_ecb_encrypt(key24: &[u8], block: &[u8; 8]) -> [u8; 8] {
    let cipher = TdesEde3::new_from_slice(key24).expect("24-byte key");
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    buf.into()
}

/// Single-DES-ECB encrypt a single 8-byte block with the first 8 key bytes
/// (`des_ecb_k1`)
pub fn des_ecb_k1(key: &[u8], block: &[u8; 8]) -> [u8; 8] {
    let cipher = Des::new_from_slice(&key[..8]).expect("8-byte key");
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    buf.into()
}

/// 3DES-CBC encrypt `data` (already a multiple of 8 bytes, no padding applied)
/// under a 24-byte key and an 8-byte IV, chaining across blocks.
pub fn tdes_cbc_encrypt(key24: &[u8], iv: &[u8; 8], data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let mut encryptor =
        cbc::Encryptor::<TdesEde3>::new_from_slices(key24, iv).expect("valid key/iv sizes");
    for chunk in buf.chunks_mut(8) {
        let block = GenericArray::from_mut_slice(chunk);
        encryptor.encrypt_block_mut(block);
    }
    buf
}

/// Full 3DES-CBC-MAC (ISO 9797-1 Algorithm 1): Method-2 pad, CBC-encrypt the
/// whole message with a 24-byte 3DES key under `iv`, return the last block.
pub fn full_3des_mac(key24: &[u8], iv: &[u8; 8], data: &[u8]) -> [u8; 8] {
    let mut buf = pad80(data, 8);
    let mut encryptor =
        cbc::Encryptor::<TdesEde3>::new_from_slices(key24, iv).expect("valid key/iv sizes");
    for chunk in buf.chunks_mut(8) {
        let block = GenericArray::from_mut_slice(chunk);
        encryptor.encrypt_block_mut(block);
    }
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[buf.len() - 8..]);
    out
}

/// Retail MAC (ISO 9797-1 Algorithm 3): Method-2 pad, single-DES-CBC (`K1`,
/// the first 8 bytes of a 16-byte key) for blocks `1..n-1`, full 2-key-3DES
/// for the last block.
pub fn retail_mac(key16: &[u8], iv: &[u8; 8], data: &[u8]) -> [u8; 8] {
    let padded = pad80(data, 8);
    let des_cipher = Des::new_from_slice(&key16[..8]).expect("8-byte key");
    let key24 = expand_2key_3des(key16);
    let tdes_cipher = TdesEde3::new_from_slice(&key24).expect("24-byte key");

    let mut current_iv = *iv;
    let n_blocks = padded.len() / 8;
    for (i, chunk) in padded.chunks(8).enumerate() {
        let mut block = [0u8; 8];
        for (b, (c, iv_b)) in block.iter_mut().zip(chunk.iter().zip(current_iv.iter())) {
            *b = c ^ iv_b;
        }
        let mut ga = GenericArray::clone_from_slice(&block);
        if i + 1 == n_blocks {
            tdes_cipher.encrypt_block(&mut ga);
        } else {
            des_cipher.encrypt_block(&mut ga);
        }
        current_iv.copy_from_slice(ga.as_slice());
    }
    current_iv
}

/// 16-byte AES-CMAC (RFC 4493), for any of the three AES key sizes
pub fn aes_cmac(key: &[u8], data: &[u8]) -> [u8; 16] {
    macro_rules! run {
        ($cipher:ty) => {{
            let mut mac = <Cmac<$cipher> as Mac>::new_from_slice(key).expect("valid AES key length");
            mac.update(data);
            let result = mac.finalize().into_bytes();
            let mut out = [0u8; 16];
            out.copy_from_slice(&result);
            out
        }};
    }
    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        _ => unreachable!("keys validated to 16/24/32 bytes at construction"),
    }
}

/// AES-ECB encrypt a single 16-byte block, for any of the three AES key sizes
pub fn aes_ecb_encrypt_block(key: &[u8], block: &[u8; 16]) -> [u8; 16] {
    macro_rules! run {
        ($cipher:ty) => {{
            let cipher = <$cipher>::new_from_slice(key).expect("valid AES key length");
            let mut buf = GenericArray::clone_from_slice(block);
            cipher.encrypt_block(&mut buf);
            buf.into()
        }};
    }
    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        _ => unreachable!("keys validated to 16/24/32 bytes at construction"),
    }
}

/// AES-CBC encrypt `data` (already a multiple of 16 bytes) under `key`/`iv`,
/// for any of the three AES key sizes
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    macro_rules! run {
        ($cipher:ty) => {{
            let mut encryptor =
                cbc::Encryptor::<$cipher>::new_from_slices(key, iv).expect("valid key/iv sizes");
            for chunk in buf.chunks_mut(16) {
                let block = GenericArray::from_mut_slice(chunk);
                encryptor.encrypt_block_mut(block);
            }
        }};
    }
    let mut buf = data.to_vec();
    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        _ => unreachable!("keys validated to 16/24/32 bytes at construction"),
    }
    buf
}

/// NIST SP 800-108 counter-mode KDF with AES-CMAC as the PRF.
///
/// Derivation data per iteration (32 bytes): `0x00^11 || constant || 0x00 ||
/// L(2 be) || counter(1) || context(16)`. Iterates `counter = 1..=
/// ceil(length_bits/128)`, concatenates, truncates to `length_bits/8` bytes.
pub fn kdf_cmac(key: &[u8], constant: u8, context: &[u8; 16], length_bits: u16) -> Vec<u8> {
    let length_bytes = (length_bits as usize).div_ceil(8);
    let n_blocks = length_bytes.div_ceil(16);
    let mut out = Vec::with_capacity(n_blocks * 16);
    for counter in 1..=n_blocks {
        let mut data = Vec::with_capacity(32);
        data.extend_from_slice(&[0u8; 11]);
        data.push(constant);
        data.push(0x00);
        data.extend_from_slice(&length_bits.to_be_bytes());
        data.push(counter as u8);
        data.extend_from_slice(context);
        out.extend_from_slice(&aes_cmac(key, &data));
    }
    out.truncate(length_bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn pad80_appends_minimal_padding() {
        assert_eq!(pad80(&[0x01, 0x02, 0x03], 8), hex!("0102038000000000").to_vec());
        assert_eq!(
            pad80(&[0u8; 8], 8),
            hex!("00000000000000008000000000000000").to_vec()
        );
    }

    #[test]
    fn expand_2key_3des_matches_vector() {
        let key = hex!("404142434445464748494a4b4c4d4e4f");
        assert_eq!(
            expand_2key_3des(&key),
            hex!("404142434445464748494a4b4c4d4e4f4041424344454647")
        );
    }

    #[test]
    fn retail_mac_matches_teacher_vector() {
        let key = hex!("5b02e75ad63190aece0622936f11aba");
        let data = hex!("8482010010810b098a8fbb88da");
        let mac = retail_mac(&key, &[0u8; 8], &data);
        assert_eq!(mac, hex!("5271d7174a5a166a"));
    }

    #[test]
    fn aes_cmac_is_deterministic_and_sensitive() {
        let key = [0x11u8; 16];
        let a = aes_cmac(&key, b"hello world");
        let b = aes_cmac(&key, b"hello world");
        let c = aes_cmac(&key, b"hello worle");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
