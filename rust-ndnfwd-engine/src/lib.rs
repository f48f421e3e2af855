//! Forwarding engine for rust-ndnfwd.
//!
//! The engine runs as a single tokio task that owns the face table, the
//! Pending Interest Table and the Content Store. Network drivers and
//! applications talk to it exclusively through message channels; one
//! command is processed to completion before the next.

pub mod cs;
pub mod error;
pub mod face;
pub mod forwarder;
pub mod pit;

pub use error::FwdError;
pub use face::{AppEvent, FaceId, FaceKind, FaceRef, NetworkSink};
pub use forwarder::{AppFace, Forwarder, ForwarderConfig, FwdHandle};

pub type Result<T> = std::result::Result<T, FwdError>;
