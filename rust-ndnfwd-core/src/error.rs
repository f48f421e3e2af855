//! Error types for the rust-ndnfwd packet core.

use thiserror::Error;

/// All recoverable failures surfaced by the packet core.
#[derive(Error, Debug)]
pub enum Error {
    /// TLV input that cannot be parsed: bad tag, truncated length,
    /// oversize VarNumber.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// Well-formed input asking for something the codec does not handle,
    /// e.g. an unknown signature type.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Caller-side misuse: empty name on encode, missing or ill-sized key,
    /// out-of-range lifetime.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Signing refused by the key, or a signature that does not check out.
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// An entry for the same name and face already exists.
    #[error("already exists: {0}")]
    Exists(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
