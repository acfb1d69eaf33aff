//! Cryptographic engines and services consumed by the packaging layers.

pub mod aead;
pub mod agreement;
pub mod block;
pub mod confirmation;
pub mod engine;
pub mod kdf;
pub mod mac;
pub mod stream;

pub use agreement::{generate_keypair, um1_initiate, um1_respond};
pub use engine::CipherEngine;
pub use kdf::derive_working_keys;
pub use mac::MacEngine;
