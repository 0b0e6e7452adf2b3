//! Transport abstraction: the single blocking point to a card

use std::fmt;

use bytes::Bytes;

use crate::error::Error;

/// Synchronous raw-byte transport to a card
///
/// A transport returns on every status word, including card-error ones; it
/// only errs on hardware/link failures (reader unplugged, timeout, reset
/// failure). Secure channels and processors are layered above this trait.
pub trait CardTransport: fmt::Debug {
    /// Send raw APDU bytes and return the raw response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error>;

    /// Reset the underlying link (e.g. warm reset of the card)
    fn reset(&mut self) -> Result<(), Error>;
}

/// In-memory transport for unit tests: returns canned responses in order
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: std::collections::VecDeque<Bytes>,
    /// Every command transmitted, in order, for test assertions
    pub sent: Vec<Bytes>,
}

impl MockTransport {
    /// Build a transport that always returns `response` to every command
    pub fn with_response(response: Bytes) -> Self {
        let mut t = Self::default();
        t.responses.push_back(response);
        t
    }

    /// Build a transport that returns `responses` in order, one per call
    pub fn with_responses(responses: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            sent: Vec::new(),
        }
    }
}

impl CardTransport for MockTransport {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        self.sent.push(Bytes::copy_from_slice(command));
        if self.responses.len() > 1 {
            Ok(self.responses.pop_front().unwrap())
        } else {
            Ok(self
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Bytes::from_static(&[0x90, 0x00])))
        }
    }

    fn reset(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
