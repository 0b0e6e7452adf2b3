//! GlobalPlatform card-management engine
//!
//! This crate implements the GlobalPlatform secure-channel protocols
//! (SCP02/SCP03) and the GP command layer (authentication, key lifecycle,
//! content lifecycle, load/install, ELF upgrade) on top of
//! `nexum-apdu-core`'s transport/executor abstractions.
//!
//! The main entry point is [`GlobalPlatform`], a façade over any executor
//! whose transport is a [`GpSecureChannel`].

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod application;
pub mod commands;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod iso7816;
pub mod load;
pub mod secure_channel;
pub mod session;
pub mod tlv;

pub use application::GlobalPlatform;
pub use error::{Error, Result};
pub use load::{CapFileInfo, LoadCommandStream};
pub use secure_channel::GpSecureChannel;
pub use session::{AuthOk, Keys, Session};

// Re-export from nexum_apdu_core for convenience, matching the teacher's
// pattern of surfacing the executor traits callers need at the top level.
pub use nexum_apdu_core::{ResponseAwareExecutor, SecureChannelExecutor};

/// Convenience functions for common operations
pub mod operations {
    use nexum_apdu_core::CardExecutor;
    use nexum_apdu_core::prelude::Executor;
    use nexum_apdu_core::{ResponseAwareExecutor, SecureChannelExecutor};

    use crate::{GlobalPlatform, Result};

    /// Connect to a card, select the card manager, and establish a secure channel
    pub fn connect_and_setup<T>(
        executor: CardExecutor<T>,
    ) -> Result<GlobalPlatform<CardExecutor<T>>>
    where
        T: nexum_apdu_core::transport::CardTransport,
    {
        let mut gp = GlobalPlatform::new(executor);
        gp.open_secure_channel()?;
        Ok(gp)
    }

    /// List all applications on the card
    pub fn list_applications<E>(
        gp: &mut GlobalPlatform<E>,
    ) -> Result<Vec<crate::commands::get_status::ApplicationInfo>>
    where
        E: Executor + ResponseAwareExecutor + SecureChannelExecutor,
    {
        let status = gp.get_applications_status()?;
        Ok(status.applications)
    }

    /// List all executable load files (packages) on the card
    pub fn list_packages<E>(
        gp: &mut GlobalPlatform<E>,
    ) -> Result<Vec<crate::commands::get_status::LoadFileInfo>>
    where
        E: Executor + ResponseAwareExecutor + SecureChannelExecutor,
    {
        let status = gp.get_load_files_status()?;
        Ok(status.load_files)
    }
}
