//! Cryptography for secrets at rest.
//!
//! Provides AES-GCM encryption for stored API keys.

pub mod encryption;

pub use encryption::Encryptor;
