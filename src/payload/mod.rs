//! Payload multiplexing: scheduling PRNG, per-item pipelines, and the
//! interleaving drivers.

pub mod mux;
pub mod pipeline;
pub mod prng;

pub use mux::{read_payload, write_payload, ItemPreKeys, MuxTotals, PayloadLayout};
pub use prng::SchedulingPrng;
