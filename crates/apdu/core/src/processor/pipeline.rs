//! Ordered pipeline of command processors

use std::fmt;

use crate::{Command, Error, Response};

use super::{CommandProcessor, TransportAdapterTrait};

/// An ordered chain of [`CommandProcessor`]s
///
/// The first processor whose [`CommandProcessor::process_command_with_adapter`]
/// handles the command wins; if none are registered, callers fall back to a
/// raw transport transmit.
#[derive(Default)]
pub struct ProcessorPipeline {
    processors: Vec<Box<dyn CommandProcessor>>,
}

impl fmt::Debug for ProcessorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorPipeline")
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl ProcessorPipeline {
    /// Build an empty pipeline
    pub const fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Append a processor to the end of the chain
    pub fn add_processor(&mut self, processor: Box<dyn CommandProcessor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Remove all registered processors
    pub fn clear(&mut self) {
        self.processors.clear();
    }

    /// Run `command` through every processor in order, using the last result
    pub fn process_command_with_adapter(
        &self,
        command: &Command,
        adapter: &mut dyn TransportAdapterTrait,
    ) -> Result<Response, Error> {
        if self.processors.is_empty() {
            let raw = command.to_bytes_via_transmit(adapter)?;
            return Response::from_bytes(&raw);
        }
        let mut response = None;
        for processor in &self.processors {
            response = Some(processor.process_command_with_adapter(command, adapter)?);
        }
        response.ok_or_else(|| Error::message("pipeline produced no response"))
    }
}

impl Command {
    fn to_bytes_via_transmit(&self, adapter: &mut dyn TransportAdapterTrait) -> Result<bytes::Bytes, Error> {
        use crate::command::ApduCommand;
        adapter.transmit_raw(&self.to_bytes())
    }
}
