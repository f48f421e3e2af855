//! Faces: the packet sources and sinks the forwarder serves.
//!
//! A face is either a network interface, reached through the host's send
//! primitive, or an application, reached through a bounded event mailbox.
//! The face table itself is owned by the forwarder task; other contexts
//! register faces through forwarder commands.

use log::{debug, warn};
use rust_ndnfwd_core::data::DataPacket;
use rust_ndnfwd_core::interest::InterestPacket;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;

/// Opaque face identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u64);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

/// What kind of endpoint a face is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceKind {
    /// Physical network interface.
    Network,
    /// Local application.
    App,
}

/// A face recorded in a PIT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRef {
    pub id: FaceId,
    pub kind: FaceKind,
}

/// Events delivered to an application face's mailbox. The receiver owns
/// the packet handed over with the event.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A Data packet satisfying an Interest this face expressed.
    Data(DataPacket),
    /// An Interest this face expressed has expired; carries the original
    /// Interest.
    Timeout(InterestPacket),
}

/// The host's network send primitive for one network face.
///
/// `send` borrows the encoded packet and must not block; transmit failures
/// are reported so the forwarder can log and drop.
pub trait NetworkSink: Send {
    fn send(&self, wire: &[u8]) -> std::io::Result<()>;
}

pub(crate) enum FaceState {
    Network { sink: Box<dyn NetworkSink> },
    App { mailbox: mpsc::Sender<AppEvent> },
}

/// Face registry owned by the forwarder task.
pub(crate) struct FaceTable {
    faces: HashMap<FaceId, FaceState>,
    next_id: u64,
}

impl FaceTable {
    pub(crate) fn new() -> Self {
        Self {
            faces: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> FaceId {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn register_network(&mut self, sink: Box<dyn NetworkSink>) -> FaceId {
        let id = self.allocate();
        self.faces.insert(id, FaceState::Network { sink });
        debug!("face: registered network face {}", id);
        id
    }

    pub(crate) fn register_app(&mut self, mailbox_capacity: usize) -> (FaceId, mpsc::Receiver<AppEvent>) {
        let id = self.allocate();
        let (tx, rx) = mpsc::channel(mailbox_capacity);
        self.faces.insert(id, FaceState::App { mailbox: tx });
        debug!("face: registered app face {}", id);
        (id, rx)
    }

    pub(crate) fn deregister(&mut self, id: FaceId) -> bool {
        self.faces.remove(&id).is_some()
    }

    pub(crate) fn kind(&self, id: FaceId) -> Option<FaceKind> {
        self.faces.get(&id).map(|state| match state {
            FaceState::Network { .. } => FaceKind::Network,
            FaceState::App { .. } => FaceKind::App,
        })
    }

    pub(crate) fn network_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.iter().filter_map(|(id, state)| match state {
            FaceState::Network { .. } => Some(*id),
            FaceState::App { .. } => None,
        })
    }

    /// Delivers a Data packet to a face. Network sends borrow the bytes;
    /// app delivery hands the mailbox its own clone. Returns false when
    /// nothing was delivered.
    pub(crate) fn deliver_data(&self, id: FaceId, data: &DataPacket) -> bool {
        match self.faces.get(&id) {
            Some(FaceState::Network { sink }) => match sink.send(data.as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    warn!("face: send to network face {} failed: {}", id, e);
                    false
                }
            },
            Some(FaceState::App { mailbox }) => {
                match mailbox.try_send(AppEvent::Data(data.clone())) {
                    Ok(()) => true,
                    Err(_) => {
                        // mailbox full or receiver gone; the clone drops here
                        warn!("face: cannot deliver data to app face {}", id);
                        false
                    }
                }
            }
            None => {
                debug!("face: data for unknown face {}", id);
                false
            }
        }
    }

    /// Delivers a timeout notification. Only application faces receive
    /// timeouts.
    pub(crate) fn deliver_timeout(&self, id: FaceId, interest: &InterestPacket) -> bool {
        match self.faces.get(&id) {
            Some(FaceState::App { mailbox }) => {
                match mailbox.try_send(AppEvent::Timeout(interest.clone())) {
                    Ok(()) => true,
                    Err(_) => {
                        warn!("face: cannot deliver timeout to app face {}", id);
                        false
                    }
                }
            }
            _ => false,
        }
    }

    /// Sends an encoded Interest out a network face.
    pub(crate) fn send_interest(&self, id: FaceId, wire: &[u8]) -> bool {
        match self.faces.get(&id) {
            Some(FaceState::Network { sink }) => match sink.send(wire) {
                Ok(()) => true,
                Err(e) => {
                    warn!("face: send to network face {} failed: {}", id, e);
                    false
                }
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnfwd_core::interest::Interest;
    use rust_ndnfwd_core::name::Name;
    use std::sync::{Arc, Mutex};

    struct RecordingSink(Arc<Mutex<Vec<Vec<u8>>>>);

    impl NetworkSink for RecordingSink {
        fn send(&self, wire: &[u8]) -> std::io::Result<()> {
            self.0.lock().unwrap().push(wire.to_vec());
            Ok(())
        }
    }

    #[test]
    fn registration_assigns_distinct_ids() {
        let mut table = FaceTable::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let net = table.register_network(Box::new(RecordingSink(sent)));
        let (app, _rx) = table.register_app(4);
        assert_ne!(net, app);
        assert_eq!(table.kind(net), Some(FaceKind::Network));
        assert_eq!(table.kind(app), Some(FaceKind::App));
        assert!(table.deregister(app));
        assert_eq!(table.kind(app), None);
    }

    #[test]
    fn timeouts_skip_network_faces() {
        let mut table = FaceTable::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let net = table.register_network(Box::new(RecordingSink(sent.clone())));
        let interest = Interest::new(Name::from_string("/t")).encode().unwrap();
        assert!(!table.deliver_timeout(net, &interest));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn full_app_mailbox_drops_event() {
        let mut table = FaceTable::new();
        let (app, mut rx) = table.register_app(1);
        let interest = Interest::new(Name::from_string("/t")).encode().unwrap();
        assert!(table.deliver_timeout(app, &interest));
        assert!(!table.deliver_timeout(app, &interest));
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Timeout(_))));
        assert!(rx.try_recv().is_err());
    }
}
