//! Built-in command processors

use crate::command::ApduCommand;
use crate::response::status;
use crate::{Command, Error, Response};

use super::{CommandProcessor, TransportAdapterTrait};

/// Passes commands straight through to the transport, unmodified
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityProcessor;

impl CommandProcessor for IdentityProcessor {
    fn process_command_with_adapter(
        &self,
        command: &Command,
        adapter: &mut dyn TransportAdapterTrait,
    ) -> Result<Response, Error> {
        let raw = adapter.transmit_raw(&command.to_bytes())?;
        Response::from_bytes(&raw)
    }
}

/// Transmits a command, then automatically issues GET RESPONSE (`00 C0`)
/// while the card keeps answering `61xx`, returning the fully accumulated
/// response to the caller.
#[derive(Debug, Clone, Copy)]
pub struct GetResponseProcessor {
    cla: u8,
}

impl Default for GetResponseProcessor {
    fn default() -> Self {
        Self { cla: 0x00 }
    }
}

impl GetResponseProcessor {
    /// Use a specific CLA byte for the GET RESPONSE command (some cards
    /// require the original command's CLA rather than `0x00`)
    pub const fn with_class(cla: u8) -> Self {
        Self { cla }
    }
}

impl CommandProcessor for GetResponseProcessor {
    fn process_command_with_adapter(
        &self,
        command: &Command,
        adapter: &mut dyn TransportAdapterTrait,
    ) -> Result<Response, Error> {
        let raw = adapter.transmit_raw(&command.to_bytes())?;
        let mut response = Response::from_bytes(&raw)?;

        let mut payload = response.payload().clone().unwrap_or_default().to_vec();
        while status::is_more_data(response.status()) {
            let remaining = response.status().sw2;
            let get_response = Command::new(self.cla, 0xC0, 0x00, 0x00).with_le(remaining as u32);
            let raw = adapter.transmit_raw(&get_response.to_bytes())?;
            response = Response::from_bytes(&raw)?;
            if let Some(more) = response.payload() {
                payload.extend_from_slice(more);
            }
        }

        Ok(Response::new(
            if payload.is_empty() {
                None
            } else {
                Some(payload.into())
            },
            response.status(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::TransportAdapter;
    use crate::transport::MockTransport;
    use bytes::Bytes;

    #[test]
    fn test_get_response_processor_chains_until_success() {
        let mut transport = MockTransport::with_responses([
            Bytes::from_static(&[0x01, 0x02, 0x61, 0x02]),
            Bytes::from_static(&[0x03, 0x04, 0x90, 0x00]),
        ]);
        let mut adapter = TransportAdapter::new(&mut transport);
        let processor = GetResponseProcessor::default();
        let command = Command::new(0x00, 0xA4, 0x04, 0x00);

        let response = processor
            .process_command_with_adapter(&command, &mut adapter)
            .unwrap();

        assert!(response.is_success());
        assert_eq!(
            response.payload().as_deref(),
            Some(&[0x01, 0x02, 0x03, 0x04][..])
        );
    }
}
