//! PUT KEY command: load or replace a key on the card
//!
//! Builds the DES/3DES and AES key-block encodings, each carrying a KCV
//! (Key Check Value) the card uses to confirm it received the right key
//! without ever seeing it in the clear outside the encrypted block.

use bytes::Bytes;
use nexum_apdu_core::{ApduCommand, Response, SecurityLevel};

use crate::constants::{cla, ins, status};
use crate::crypto::mac::{aes_cbc_encrypt, aes_ecb_encrypt_block, expand_2key_3des, pad80, tdes_ecb_encrypt};
use crate::error::{Error, Result};

/// Key algorithm for a PUT KEY key-data structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Single DES (`0x80`)
    Des,
    /// 3DES in CBC mode (`0x82`)
    TripleDesCbc,
    /// AES (`0x88`)
    Aes,
}

impl KeyType {
    const fn type_byte(self) -> u8 {
        match self {
            Self::Des => 0x80,
            Self::TripleDesCbc => 0x82,
            Self::Aes => 0x88,
        }
    }
}

/// Which constant block to encrypt for the AES Key Check Value.
///
/// GlobalPlatform 2.3 Amendment D specifies an all-`0x01` block; some legacy
/// card implementations instead used all-zero, matching the DES convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KcvPolicy {
    /// All-`0x01` 16-byte block (GP 2.3 Amendment D, the default)
    #[default]
    Standard,
    /// All-`0x00` 16-byte block (legacy cards)
    Legacy,
}

impl KcvPolicy {
    const fn aes_block(self) -> [u8; 16] {
        match self {
            Self::Standard => [0x01; 16],
            Self::Legacy => [0x00; 16],
        }
    }
}

/// PUT KEY (`80 D8`)
#[derive(Debug, Clone)]
pub struct PutKeyCommand {
    key_version: u8,
    p2: u8,
    data: Bytes,
}

impl PutKeyCommand {
    /// Build a PUT KEY command loading a single key under `key_id`, encrypted with `dek`,
    /// using the default (GP 2.3 Amendment D) KCV policy.
    pub fn new(key_version: u8, key_id: u8, dek: &[u8], key_type: KeyType, key: &[u8]) -> Result<Self> {
        Self::with_kcv_policy(key_version, key_id, dek, key_type, key, KcvPolicy::default())
    }

    /// As [`Self::new`], with an explicit KCV policy.
    pub fn with_kcv_policy(
        key_version: u8,
        key_id: u8,
        dek: &[u8],
        key_type: KeyType,
        key: &[u8],
        kcv_policy: KcvPolicy,
    ) -> Result<Self> {
        let key_block = build_key_block(dek, key_type, key, kcv_policy)?;
        let mut data = Vec::with_capacity(2 + key_block.len());
        data.push(key_id);
        data.extend_from_slice(&key_block);
        Ok(Self {
            key_version,
            p2: key_id,
            data: data.into(),
        })
    }

    /// Build a PUT KEY command loading several keys (e.g. ENC/MAC/DEK) in one exchange,
    /// each under its own `key_id`. Sets the multi-key bit (`0x80`) in P2.
    pub fn multiple(
        key_version: u8,
        first_key_id: u8,
        dek: &[u8],
        keys: &[(KeyType, &[u8])],
        kcv_policy: KcvPolicy,
    ) -> Result<Self> {
        let mut data = vec![first_key_id];
        for (key_type, key) in keys {
            data.extend_from_slice(&build_key_block(dek, *key_type, key, kcv_policy)?);
        }
        Ok(Self {
            key_version,
            p2: first_key_id | 0x80,
            data: data.into(),
        })
    }
}

impl ApduCommand for PutKeyCommand {
    type Success = PutKeyOk;
    type Error = Error;

    fn convert_error(error: nexum_apdu_core::Error) -> Self::Error {
        error.into()
    }

    fn class(&self) -> u8 {
        cla::GP
    }

    fn instruction(&self) -> u8 {
        ins::PUT_KEY
    }

    fn p1(&self) -> u8 {
        self.key_version
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

    fn required_security_level(&self) -> SecurityLevel {
        SecurityLevel::mac_protected()
    }

    fn parse_response(response: Response) -> Result<Self::Success> {
        let sw = response.status();
        if sw != status::SUCCESS {
            return Err(Error::CardStatus(sw));
        }
        let key_check_values = response.payload().clone().map_or(Vec::new(), |b| b.to_vec());
        Ok(PutKeyOk { key_check_values })
    }
}

/// Result of a successful PUT KEY exchange
#[derive(Debug, Clone)]
pub struct PutKeyOk {
    /// Key version/KCV confirmation data the card echoes back, if any
    pub key_check_values: Vec<u8>,
}

/// Assemble a single `type || length || encrypted || 0x03 || KCV` key-data structure.
fn build_key_block(dek: &[u8], key_type: KeyType, key: &[u8], kcv_policy: KcvPolicy) -> Result<Vec<u8>> {
    match key_type {
        KeyType::Des | KeyType::TripleDesCbc => build_des_family_block(key_type, dek, key),
        KeyType::Aes => build_aes_block(dek, key, kcv_policy),
    }
}

fn build_des_family_block(key_type: KeyType, dek: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if dek.len() != 16 {
        return Err(Error::InvalidKeyLength {
            expected: 16,
            actual: dek.len(),
        });
    }
    if key.len() != 16 && key.len() != 8 {
        return Err(Error::InvalidKeyLength {
            expected: 16,
            actual: key.len(),
        });
    }

    let dek24 = expand_2key_3des(dek);
    let mut encrypted = Vec::with_capacity(key.len());
    for chunk in key.chunks(8) {
        let block: [u8; 8] = chunk.try_into().expect("key length validated to a multiple of 8");
        encrypted.extend_from_slice(&tdes_ecb_encrypt(&dek24, &block));
    }

    let key24 = if key.len() == 16 {
        expand_2key_3des(key)
    } else {
        let mut k = [0u8; 24];
        k[..8].copy_from_slice(key);
        k[8..16].copy_from_slice(key);
        k[16..24].copy_from_slice(key);
        k
    };
    let kcv_full = tdes_ecb_encrypt(&key24, &[0u8; 8]);

    let mut block = Vec::with_capacity(2 + encrypted.len() + 1 + 3);
    block.push(key_type.type_byte());
    block.push((encrypted.len() + 1 + 3) as u8);
    block.extend_from_slice(&encrypted);
    block.push(0x03);
    block.extend_from_slice(&kcv_full[..3]);
    Ok(block)
}

fn build_aes_block(dek: &[u8], key: &[u8], kcv_policy: KcvPolicy) -> Result<Vec<u8>> {
    if !matches!(dek.len(), 16 | 24 | 32) {
        return Err(Error::InvalidKeyLength {
            expected: 16,
            actual: dek.len(),
        });
    }
    if !matches!(key.len(), 16 | 24 | 32) {
        return Err(Error::InvalidKeyLength {
            expected: 16,
            actual: key.len(),
        });
    }

    let padded = pad80(key, 16);
    let encrypted = aes_cbc_encrypt(dek, &[0u8; 16], &padded);
    let kcv_full = aes_ecb_encrypt_block(key, &kcv_policy.aes_block());

    let mut block = Vec::with_capacity(3 + encrypted.len() + 1 + 3);
    block.push(KeyType::Aes.type_byte());
    block.push((1 + encrypted.len() + 1 + 3) as u8);
    block.push(key.len() as u8);
    block.extend_from_slice(&encrypted);
    block.push(0x03);
    block.extend_from_slice(&kcv_full[..3]);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn des_key_block_has_expected_shape() {
        let dek = hex!("404142434445464748494a4b4c4d4e4f");
        let key = hex!("404142434445464748494a4b4c4d4e4f");
        let cmd = PutKeyCommand::new(0x01, 0x01, &dek, KeyType::Des, &key).unwrap();

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::PUT_KEY);
        assert_eq!(cmd.p1(), 0x01);
        assert_eq!(cmd.p2(), 0x01);

        let data = cmd.data().unwrap();
        assert_eq!(data[0], 0x01); // key id
        assert_eq!(data[1], KeyType::Des.type_byte());
        assert_eq!(data[2] as usize, data.len() - 3);
        // encrypted(16) + 0x03 + kcv(3) = 20 == data[2]
        assert_eq!(data[2], 20);
        assert_eq!(data[data.len() - 4], 0x03);
    }

    #[test]
    fn aes_key_block_carries_key_value_length_and_kcv() {
        let dek = hex!("000102030405060708090a0b0c0d0e0f");
        let key = hex!("101112131415161718191a1b1c1d1e1f");
        let cmd = PutKeyCommand::new(0x01, 0x02, &dek, KeyType::Aes, &key).unwrap();

        let data = cmd.data().unwrap();
        assert_eq!(data[0], 0x02); // key id
        assert_eq!(data[1], KeyType::Aes.type_byte());
        assert_eq!(data[3], 16); // key_value_length == unpadded key length
        assert_eq!(data[data.len() - 4], 0x03);
    }

    #[test]
    fn aes_kcv_differs_between_policies() {
        let key = hex!("101112131415161718191a1b1c1d1e1f");
        let standard = aes_ecb_encrypt_block(&key, &KcvPolicy::Standard.aes_block());
        let legacy = aes_ecb_encrypt_block(&key, &KcvPolicy::Legacy.aes_block());
        assert_ne!(standard, legacy);
    }

    #[test]
    fn multiple_keys_sets_multi_key_bit_in_p2() {
        let dek = hex!("000102030405060708090a0b0c0d0e0f");
        let enc = hex!("101112131415161718191a1b1c1d1e1f");
        let mac = hex!("202122232425262728292a2b2c2d2e2f");
        let cmd = PutKeyCommand::multiple(
            0x01,
            0x01,
            &dek,
            &[(KeyType::Aes, &enc), (KeyType::Aes, &mac)],
            KcvPolicy::default(),
        )
        .unwrap();
        assert_eq!(cmd.p2(), 0x81);
    }

    #[test]
    fn rejects_wrong_length_keys() {
        let dek = hex!("000102030405060708090a0b0c0d0e0f");
        let err = PutKeyCommand::new(0x01, 0x01, &dek, KeyType::Aes, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyLength { .. }));
    }

    #[test]
    fn put_key_surfaces_card_status_error() {
        let response = Response::from_bytes(&hex!("6982")).unwrap();
        let err = PutKeyCommand::parse_response(response).unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw == status::SECURITY_CONDITION_NOT_SATISFIED));
    }
}
