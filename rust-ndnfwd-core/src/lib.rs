//! Packet-processing core for the rust-ndnfwd forwarder.
//!
//! This crate provides the NDN TLV codec (variable-length numbers, names,
//! Interest and Data packets), the signing/verification layer, and the
//! metrics primitives shared with the forwarding engine.

pub mod data;
pub mod error;
pub mod interest;
pub mod metrics;
pub mod name;
pub mod tlv;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
