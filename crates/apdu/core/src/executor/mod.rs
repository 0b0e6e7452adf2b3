//! Command execution over a transport
//!
//! An [`Executor`] owns a transport and a processor pipeline and knows how to
//! turn an [`crate::ApduCommand`] into its parsed success/error outcome.

pub mod response_aware;

use bytes::Bytes;

use crate::command::ApduCommand;
use crate::error::Error;
use crate::secure_channel::SecurityLevel;
use crate::transport::CardTransport;

/// Executes APDU commands against a transport
pub trait Executor {
    /// The transport type this executor drives
    type Transport: CardTransport;

    /// Borrow the underlying transport
    fn transport(&self) -> &Self::Transport;

    /// Mutably borrow the underlying transport
    fn transport_mut(&mut self) -> &mut Self::Transport;

    /// Send raw bytes, routed through any installed processor pipeline
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error>;

    /// Send raw bytes and return the raw response (alias over [`Executor::do_transmit_raw`])
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        self.do_transmit_raw(command)
    }

    /// Reset the transport and clear any pipeline/response state
    fn reset(&mut self) -> Result<(), Error>;

    /// Execute a command and parse its response into the command's outcome type
    fn execute<C>(&mut self, command: &C) -> Result<C::Success, C::Error>
    where
        C: ApduCommand;
}

/// Extension for executors whose transport is a [`crate::secure_channel::SecureChannel`]
pub trait SecureChannelExecutor: Executor {
    /// `true` if the secure channel has completed its handshake
    fn has_secure_channel(&self) -> bool;

    /// Open the secure channel (run/resume the handshake)
    fn open_secure_channel(&mut self) -> Result<(), Error>;

    /// Tear the secure channel down
    fn close_secure_channel(&mut self) -> Result<(), Error>;

    /// Currently negotiated security level
    fn security_level(&self) -> SecurityLevel;

    /// Attempt to raise the security level of an open channel
    fn upgrade_secure_channel(&mut self, level: SecurityLevel) -> Result<(), Error>;

    /// Execute a command, opening the secure channel first if required and
    /// not yet established.
    fn execute_secure<C>(&mut self, command: &C) -> Result<C::Success, C::Error>
    where
        C: ApduCommand,
    {
        if command.required_security_level().bits() != SecurityLevel::none().bits()
            && !self.has_secure_channel()
        {
            self.open_secure_channel()
                .map_err(C::convert_error)?;
        }
        self.execute(command)
    }
}
