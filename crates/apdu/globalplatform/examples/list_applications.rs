//! List all applications and load files on a GlobalPlatform-compatible card
//!
//! Reader selection and physical card I/O are outside this crate's scope; a
//! real caller supplies a [`CardTransport`] that talks to an actual PC/SC
//! reader. Here [`StdioTransport`] stands in for one, reading one
//! hex-encoded response per line from stdin for each command sent, so the
//! example builds and runs without hardware.

use std::io::BufRead;

use nexum_apdu_core::card::CardExecutor;
use nexum_apdu_core::transport::CardTransport;
use nexum_apdu_core::{Bytes, Error as ApduError};
use nexum_apdu_globalplatform::{GlobalPlatform, GpSecureChannel, Keys};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct StdioTransport;

impl CardTransport for StdioTransport {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, ApduError> {
        eprintln!("-> {}", hex::encode_upper(command));
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ApduError::message(e.to_string()))?;
        let bytes = hex::decode(line.trim())
            .map_err(|e| ApduError::message(format!("bad hex response: {e}")))?;
        Ok(Bytes::from(bytes))
    }

    fn reset(&mut self) -> Result<(), ApduError> {
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let secure_channel = GpSecureChannel::new(StdioTransport, Keys::default());
    let executor = CardExecutor::new(secure_channel);
    let mut gp = GlobalPlatform::new(executor);

    println!("Selecting card manager and opening secure channel...");
    gp.open_secure_channel()?;
    println!("Secure channel established at {:?}.", gp.security_level());

    println!("Applications:");
    let status = gp.get_applications_status()?;
    for app in &status.applications {
        println!(
            "  AID {} lifecycle {:#04x} privileges {}",
            hex::encode_upper(&app.aid),
            app.lifecycle,
            hex::encode_upper(&app.privileges)
        );
    }

    println!("Load files:");
    let status = gp.get_load_files_status()?;
    for file in &status.load_files {
        println!(
            "  AID {} lifecycle {:#04x}",
            hex::encode_upper(&file.aid),
            file.lifecycle
        );
    }

    Ok(())
}
