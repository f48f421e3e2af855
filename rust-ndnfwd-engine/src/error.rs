//! Error types for the forwarding engine.

use crate::face::FaceId;
use thiserror::Error;

/// Failures surfaced by the forwarding engine.
#[derive(Error, Debug)]
pub enum FwdError {
    /// A packet-level failure from the codec or crypto layer.
    #[error(transparent)]
    Packet(#[from] rust_ndnfwd_core::Error),

    /// The face is not registered with the forwarder.
    #[error("unknown face: {0}")]
    UnknownFace(FaceId),

    /// The forwarder task has shut down and no longer accepts commands.
    #[error("forwarder is not running")]
    Stopped,
}
