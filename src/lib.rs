//! obscur-core
//!
//! Encrypted, authenticated single-file packaging. A package carries a
//! small plaintext header naming the manifest cryptography scheme, an
//! encrypted-and-authenticated manifest describing every payload item,
//! and a payload body in which the items' Encrypt-then-MAC streams are
//! byte-interleaved under PRNG-driven scheduling, so item boundaries are
//! indistinguishable without the manifest.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;

// Configuration and manifest data model
pub mod config;

// Primitive engines and services
pub mod crypto;
pub mod registry;

// Stream layers
pub mod stream;

// Payload multiplexing
pub mod payload;

// Package orchestration
pub mod package;

pub use config::{ItemKind, ItemView, ManifestView};
pub use package::{ItemSource, PackageReader, PackageWriter, TempStorage};
pub use payload::PayloadLayout;
pub use registry::{EntropySource, PrimitiveRegistry};
pub use types::{AuthScope, PackageError, Result};
