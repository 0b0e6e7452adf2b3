//! Secure-channel cryptographic primitives, shared between SCP02 and SCP03
//!
//! [`mac`] holds protocol-agnostic primitives (padding, 3DES/AES helpers,
//! ISO 9797-1 MAC algorithms, AES-CMAC, the SP 800-108 KDF); [`scp02`] and
//! [`scp03`] build the protocol-specific key derivation and cryptogram
//! computation on top of them.

pub mod mac;
pub mod scp02;
pub mod scp03;
