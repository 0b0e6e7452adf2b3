//! The GlobalPlatform secure channel: SCP02/SCP03 wrap/unwrap over a raw transport
//!
//! [`GpSecureChannel`] wraps an inner [`CardTransport`] and implements both
//! [`CardTransport`] (so it can be dropped straight into a
//! [`nexum_apdu_core::card::CardExecutor`]) and [`SecureChannel`] (the
//! handshake lifecycle). Internally it holds a [`GpState`] sum type: either
//! SCP02 or SCP03 chaining state, modelled as a small interior-mutable
//! struct mutated only from `transmit_raw`/`open`/`close`, serialized by the
//! single-threaded contract of the surrounding executor.

use bytes::Bytes;
use nexum_apdu_core::command::ApduCommand;
use nexum_apdu_core::response::status;
use nexum_apdu_core::{Command, Error as ApduError, Response, SecureChannel, SecurityLevel};
use rand::RngCore;
use tracing::{debug, instrument, trace};

use crate::constants::{cla, ins};
use crate::crypto::{mac, scp02, scp03};
use crate::error::{Error, Result};
use crate::session::{AuthOk, Keys};

/// SCP02 secure-channel chaining state
struct Scp02State {
    s_enc: [u8; 16],
    s_mac: [u8; 16],
    s_rmac: [u8; 16],
    security_level: SecurityLevel,
    i_param: u8,
    icv: [u8; 8],
    wrapped: u32,
}

impl Scp02State {
    fn next_icv(&self) -> [u8; 8] {
        if self.i_param & 0x04 != 0 && self.wrapped > 0 {
            mac::des_ecb_k1(&self.s_mac, &self.icv)
        } else {
            self.icv
        }
    }
}

/// SCP03 secure-channel chaining state
struct Scp03State {
    s_enc: Vec<u8>,
    s_mac: Vec<u8>,
    s_rmac: Vec<u8>,
    security_level: SecurityLevel,
    mac_chain: [u8; 16],
    enc_counter: u128,
}

/// Secure-channel chaining state, established once per handshake
enum GpState {
    /// No handshake has completed yet
    Closed,
    /// A wrap consumed state but the following transmit failed; the channel
    /// must be closed and reopened before further use
    Poisoned,
    /// SCP02 established
    Scp02(Scp02State),
    /// SCP03 established
    Scp03(Scp03State),
}

/// Default i-parameter used when the card doesn't otherwise indicate one
const DEFAULT_I_PARAM: u8 = 0x15;

/// A GlobalPlatform secure channel, wrapping an inner raw transport
pub struct GpSecureChannel<T> {
    transport: T,
    keys: Keys,
    state: GpState,
    last_auth: Option<AuthOk>,
}

impl<T> GpSecureChannel<T>
where
    T: nexum_apdu_core::CardTransport,
{
    /// Wrap `transport`, ready to authenticate with `keys`
    pub const fn new(transport: T, keys: Keys) -> Self {
        Self {
            transport,
            keys,
            state: GpState::Closed,
            last_auth: None,
        }
    }

    /// Details from the last successful handshake, if any
    pub fn last_auth(&self) -> Option<&AuthOk> {
        self.last_auth.as_ref()
    }

    /// Run the authentication handshake: INITIALIZE UPDATE, derive session
    /// keys from the card's response, verify the card cryptogram, install
    /// the channel, then EXTERNAL AUTHENTICATE.
    #[instrument(skip(self))]
    fn authenticate(&mut self) -> Result<AuthOk> {
        let mut host_challenge = [0u8; 8];
        rand::rng().fill_bytes(&mut host_challenge);

        let init_update =
            Command::new(cla::GP, ins::INITIALIZE_UPDATE, 0x00, 0x00).with_data(host_challenge.to_vec());
        let raw = self
            .transport
            .transmit_raw(&init_update.to_bytes())
            .map_err(Error::from)?;
        let response = Response::from_bytes(&raw).map_err(Error::from)?;
        if !response.is_success() {
            return Err(Error::AuthFailed(response.status()));
        }
        let data = response
            .payload()
            .clone()
            .ok_or(Error::MalformedApdu("empty INITIALIZE UPDATE response"))?;
        if data.len() < 12 {
            return Err(Error::MalformedApdu("INITIALIZE UPDATE response too short"));
        }

        let key_div_data = data[0..10].to_vec();
        let scp_id = data[11];

        let (security_level, host_cryptogram, i_param, key_info) = match scp_id {
            crate::constants::scp::SCP02 => {
                if data.len() < 28 {
                    return Err(Error::MalformedApdu("truncated SCP02 INITIALIZE UPDATE response"));
                }
                let key_info = data[10..12].to_vec();
                let seq_counter: [u8; 2] = data[12..14].try_into().unwrap();
                let card_challenge: [u8; 6] = data[14..20].try_into().unwrap();
                let card_cryptogram: [u8; 8] = data[20..28].try_into().unwrap();

                if self.keys.key_length() != 16 {
                    return Err(Error::InvalidKeyLength {
                        expected: 16,
                        actual: self.keys.key_length(),
                    });
                }
                let static_enc: [u8; 16] = self.keys.enc().try_into().unwrap();
                let static_mac: [u8; 16] = self.keys.mac().try_into().unwrap();
                let static_dek: [u8; 16] = self.keys.dek().try_into().unwrap();

                let sk = scp02::derive_session_keys(&static_enc, &static_mac, &static_dek, &seq_counter);
                let expected = scp02::card_cryptogram(&sk.s_enc, &host_challenge, &seq_counter, &card_challenge);
                if expected != card_cryptogram {
                    return Err(Error::CardCryptogramMismatch);
                }
                let host_cryptogram =
                    scp02::host_cryptogram(&sk.s_enc, &seq_counter, &card_challenge, &host_challenge);

                let i_param = DEFAULT_I_PARAM;
                self.state = GpState::Scp02(Scp02State {
                    s_enc: sk.s_enc,
                    s_mac: sk.s_mac,
                    s_rmac: sk.s_rmac,
                    security_level: SecurityLevel::mac_protected(),
                    i_param,
                    icv: [0u8; 8],
                    wrapped: 0,
                });
                (SecurityLevel::mac_protected(), host_cryptogram.to_vec(), i_param, key_info)
            }
            crate::constants::scp::SCP03 => {
                if data.len() < 29 {
                    return Err(Error::MalformedApdu("truncated SCP03 INITIALIZE UPDATE response"));
                }
                let key_info = data[10..13].to_vec();
                let i_param = data[12];
                let card_challenge: [u8; 8] = data[13..21].try_into().unwrap();
                let card_cryptogram = &data[21..29];

                let sk = scp03::derive_session_keys(
                    self.keys.enc(),
                    self.keys.mac(),
                    &host_challenge,
                    &card_challenge,
                );
                if !scp03::verify_card_cryptogram(&sk.s_mac, &host_challenge, &card_challenge, card_cryptogram) {
                    return Err(Error::CardCryptogramMismatch);
                }
                let host_cryptogram = scp03::compute_host_cryptogram(&sk.s_mac, &host_challenge, &card_challenge);

                self.state = GpState::Scp03(Scp03State {
                    s_enc: sk.s_enc,
                    s_mac: sk.s_mac,
                    s_rmac: sk.s_rmac,
                    security_level: SecurityLevel::mac_protected(),
                    mac_chain: [0u8; 16],
                    enc_counter: 1,
                });
                (SecurityLevel::mac_protected(), host_cryptogram.to_vec(), i_param, key_info)
            }
            other => return Err(Error::UnsupportedScp(other)),
        };

        let ext_auth = Command::new(cla::GP, ins::EXTERNAL_AUTHENTICATE, security_level.bits(), 0x00)
            .with_data(host_cryptogram);
        let raw = self.transmit_raw_internal(&ext_auth.to_bytes());
        let raw = match raw {
            Ok(r) => r,
            Err(e) => {
                self.state = GpState::Closed;
                return Err(Error::from(e));
            }
        };
        let response = Response::from_bytes(&raw).map_err(Error::from)?;
        if !response.is_success() {
            self.state = GpState::Closed;
            return Err(Error::AuthFailed(response.status()));
        }

        debug!(scp = scp_id, "secure channel established");
        Ok(AuthOk {
            key_div_data,
            key_info,
            i_param,
        })
    }

    /// `transmit_raw`, but returning the core `ApduError` so it can be used
    /// both from [`nexum_apdu_core::CardTransport`] and from `authenticate`.
    #[instrument(skip(self, command))]
    fn transmit_raw_internal(&mut self, command: &[u8]) -> std::result::Result<Bytes, ApduError> {
        let parsed = Command::from_bytes(command)?;

        let wrapped = match &mut self.state {
            GpState::Closed => return self.transport.transmit_raw(command),
            GpState::Poisoned => return Err(Error::NoSecureChannel.into()),
            GpState::Scp02(state) => wrap_scp02(state, &parsed),
            GpState::Scp03(state) => wrap_scp03(state, &parsed),
        };

        let sent = match wrapped {
            Some(bytes) => bytes,
            None => parsed.to_bytes(),
        };

        let raw = self.transport.transmit_raw(&sent).inspect_err(|_| {
            self.state = GpState::Poisoned;
        })?;
        let mut response = Response::from_bytes(&raw)?;

        // GET RESPONSE chaining (61xx) happens here, below the unwrap step:
        // a transport-level `transmit` is treated as atomic from the
        // channel's point of view.
        let mut payload = response.payload().clone().unwrap_or_default().to_vec();
        while status::is_more_data(response.status()) {
            let remaining = response.status().sw2;
            let get_response = Command::new(cla::ISO7816, ins::GET_RESPONSE, 0x00, 0x00).with_le(remaining as u32);
            let raw = self
                .transport
                .transmit_raw(&get_response.to_bytes())
                .inspect_err(|_| {
                    self.state = GpState::Poisoned;
                })?;
            response = Response::from_bytes(&raw)?;
            if let Some(more) = response.payload() {
                payload.extend_from_slice(more);
            }
        }
        let accumulated = Response::new(
            if payload.is_empty() { None } else { Some(payload.into()) },
            response.status(),
        );

        let unwrapped = match &mut self.state {
            GpState::Scp02(state) => unwrap_scp02(state, &accumulated)?,
            GpState::Scp03(state) => unwrap_scp03(state, &accumulated)?,
            _ => accumulated,
        };

        Ok(unwrapped.into())
    }
}

fn wrap_scp02(state: &mut Scp02State, apdu: &Command) -> Option<Bytes> {
    let requires_wrap = state.security_level.contains(SecurityLevel::mac_protected())
        || apdu.ins == crate::constants::ins::EXTERNAL_AUTHENTICATE;
    if !requires_wrap {
        return None;
    }

    let mut data = apdu.data.clone().map(|d| d.to_vec()).unwrap_or_default();
    if state.security_level.contains(SecurityLevel::from_bits(SecurityLevel::C_DECRYPTION))
        && !data.is_empty()
        && apdu.ins != crate::constants::ins::EXTERNAL_AUTHENTICATE
    {
        let key24 = mac::expand_2key_3des(&state.s_enc);
        data = mac::pad80(&data, 8);
        data = mac::tdes_cbc_encrypt(&key24, &[0u8; 8], &data);
    }

    let cla_sm = apdu.cla | 0x04;
    let lc_sm = data.len() + 8;

    let mac_input = if state.i_param & 0x01 == 0 {
        let original_lc = apdu.data.as_ref().map(|d| d.len()).unwrap_or(0);
        let mut v = vec![apdu.cla, apdu.ins, apdu.p1, apdu.p2, original_lc as u8];
        v.extend_from_slice(&data);
        v
    } else {
        let mut v = vec![cla_sm, apdu.ins, apdu.p1, apdu.p2, lc_sm as u8];
        v.extend_from_slice(&data);
        v
    };

    let icv = state.next_icv();
    let c_mac = mac::retail_mac(&state.s_mac, &icv, &mac_input);
    state.icv = c_mac;
    state.wrapped += 1;

    let mut out_data = data;
    out_data.extend_from_slice(&c_mac);

    let mut wrapped = Command::new(cla_sm, apdu.ins, apdu.p1, apdu.p2).with_data(out_data);
    if let Some(le) = apdu.le {
        wrapped = wrapped.with_le(le);
    }
    Some(wrapped.to_bytes())
}

fn unwrap_scp02(state: &mut Scp02State, response: &Response) -> std::result::Result<Response, ApduError> {
    if !state.security_level.contains(SecurityLevel::from_bits(SecurityLevel::R_MAC)) {
        return Ok(response.clone());
    }
    let payload = response.payload().clone().unwrap_or_default();
    if payload.len() < 8 {
        return Ok(response.clone());
    }
    let (body, r_mac) = payload.split_at(payload.len() - 8);
    let mut mac_input = body.to_vec();
    mac_input.push(response.status().sw1);
    mac_input.push(response.status().sw2);
    let expected = mac::retail_mac(&state.s_rmac, &state.icv, &mac_input);
    if expected != r_mac {
        return Err(Error::MacVerifyFailed.into());
    }
    Ok(Response::new(
        if body.is_empty() { None } else { Some(bytes::Bytes::copy_from_slice(body)) },
        response.status(),
    ))
}

fn wrap_scp03(state: &mut Scp03State, apdu: &Command) -> Option<Bytes> {
    let requires_wrap = state.security_level.contains(SecurityLevel::mac_protected())
        || apdu.ins == crate::constants::ins::EXTERNAL_AUTHENTICATE;
    if !requires_wrap {
        return None;
    }

    let mut data = apdu.data.clone().map(|d| d.to_vec()).unwrap_or_default();
    if state.security_level.contains(SecurityLevel::from_bits(SecurityLevel::C_DECRYPTION)) && !data.is_empty() {
        let icv_block: [u8; 16] = state.enc_counter.to_be_bytes();
        let icv = mac::aes_ecb_encrypt_block(&state.s_enc, &icv_block);
        state.enc_counter += 1;
        let padded = mac::pad80(&data, 16);
        data = mac::aes_cbc_encrypt(&state.s_enc, &icv, &padded);
    }

    let cla_sm = apdu.cla | 0x04;
    let lc_sm = data.len() + 8;

    let mut mac_input = state.mac_chain.to_vec();
    mac_input.extend_from_slice(&[cla_sm, apdu.ins, apdu.p1, apdu.p2, lc_sm as u8]);
    mac_input.extend_from_slice(&data);
    let full = mac::aes_cmac(&state.s_mac, &mac_input);
    state.mac_chain = full;

    let mut out_data = data;
    out_data.extend_from_slice(&full[..8]);

    let mut wrapped = Command::new(cla_sm, apdu.ins, apdu.p1, apdu.p2).with_data(out_data);
    if let Some(le) = apdu.le {
        wrapped = wrapped.with_le(le);
    }
    Some(wrapped.to_bytes())
}

fn unwrap_scp03(state: &mut Scp03State, response: &Response) -> std::result::Result<Response, ApduError> {
    if !state.security_level.contains(SecurityLevel::from_bits(SecurityLevel::R_MAC)) {
        return Ok(response.clone());
    }
    let payload = response.payload().clone().unwrap_or_default();
    if payload.len() < 8 {
        return Ok(response.clone());
    }
    let (body, r_mac) = payload.split_at(payload.len() - 8);
    let mut mac_input = state.mac_chain.to_vec();
    mac_input.extend_from_slice(body);
    mac_input.push(response.status().sw1);
    mac_input.push(response.status().sw2);
    let expected = mac::aes_cmac(&state.s_mac, &mac_input);
    if expected[..8] != *r_mac {
        return Err(Error::MacVerifyFailed.into());
    }
    Ok(Response::new(
        if body.is_empty() { None } else { Some(bytes::Bytes::copy_from_slice(body)) },
        response.status(),
    ))
}

impl<T> std::fmt::Debug for GpSecureChannel<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            GpState::Closed => "Closed",
            GpState::Poisoned => "Poisoned",
            GpState::Scp02(_) => "Scp02",
            GpState::Scp03(_) => "Scp03",
        };
        f.debug_struct("GpSecureChannel")
            .field("transport", &self.transport)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl<T> nexum_apdu_core::CardTransport for GpSecureChannel<T>
where
    T: nexum_apdu_core::CardTransport,
{
    fn transmit_raw(&mut self, command: &[u8]) -> std::result::Result<Bytes, ApduError> {
        trace!(len = command.len(), "secure channel transmit");
        self.transmit_raw_internal(command)
    }

    fn reset(&mut self) -> std::result::Result<(), ApduError> {
        self.state = GpState::Closed;
        self.transport.reset()
    }
}

impl<T> SecureChannel for GpSecureChannel<T>
where
    T: nexum_apdu_core::CardTransport,
{
    fn is_established(&self) -> bool {
        matches!(self.state, GpState::Scp02(_) | GpState::Scp03(_))
    }

    fn security_level(&self) -> SecurityLevel {
        match &self.state {
            GpState::Scp02(s) => s.security_level,
            GpState::Scp03(s) => s.security_level,
            _ => SecurityLevel::none(),
        }
    }

    fn open(&mut self) -> std::result::Result<(), ApduError> {
        let auth = self.authenticate().map_err(ApduError::from)?;
        self.last_auth = Some(auth);
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), ApduError> {
        self.state = GpState::Closed;
        self.last_auth = None;
        Ok(())
    }

    fn upgrade(&mut self, level: SecurityLevel) -> std::result::Result<(), ApduError> {
        match &mut self.state {
            GpState::Scp02(s) => {
                s.security_level = s.security_level.union(level);
                Ok(())
            }
            GpState::Scp03(s) => {
                s.security_level = s.security_level.union(level);
                Ok(())
            }
            _ => Err(Error::NoSecureChannel.into()),
        }
    }
}

#[cfg(test)]
impl<T> GpSecureChannel<T>
where
    T: nexum_apdu_core::CardTransport,
{
    /// Force the channel straight into an established SCP03 state, skipping
    /// the INITIALIZE UPDATE/EXTERNAL AUTHENTICATE handshake, for tests that
    /// only exercise post-handshake command wrapping.
    pub(crate) fn force_scp03_established_for_test(&mut self, security_level: SecurityLevel) {
        self.state = GpState::Scp03(Scp03State {
            s_enc: vec![0u8; 16],
            s_mac: vec![0u8; 16],
            s_rmac: vec![0u8; 16],
            security_level,
            mac_chain: [0u8; 16],
            enc_counter: 1,
        });
    }
}
