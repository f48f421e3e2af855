//! The forwarder event loop.
//!
//! One tokio task owns all forwarding state. Applications and network
//! drivers hand it commands through a bounded channel and it processes
//! each to completion: Interest ingress (CS lookup, PIT admission,
//! broadcast), Data ingress (PIT match, delivery, CS insert) and PIT
//! expiry. Expiry timers are sleep tasks that post back into the same
//! channel, carrying the generational token of the deadline they were
//! armed for.

use crate::cs::{ContentStore, DEFAULT_CS_CAPACITY};
use crate::error::FwdError;
use crate::face::{AppEvent, FaceId, FaceKind, FaceRef, FaceTable, NetworkSink};
use crate::pit::{Pit, PitInsert, PitToken};
use crate::Result;
use bytes::Bytes;
use log::{debug, warn};
use rust_ndnfwd_core::data::DataPacket;
use rust_ndnfwd_core::interest::InterestPacket;
use rust_ndnfwd_core::metrics::ForwarderMetrics;
use rust_ndnfwd_core::tlv::tlv_type;
use rust_ndnfwd_core::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Tunables for one forwarder instance.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Content Store capacity, in entries.
    pub cs_capacity: usize,
    /// Depth of the forwarder command channel.
    pub mailbox_capacity: usize,
    /// Depth of each application face's event mailbox.
    pub app_mailbox_capacity: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            cs_capacity: DEFAULT_CS_CAPACITY,
            mailbox_capacity: 100,
            app_mailbox_capacity: 100,
        }
    }
}

enum Command {
    Interest {
        face: FaceId,
        wire: Bytes,
    },
    Data {
        face: FaceId,
        wire: Bytes,
    },
    Expired {
        token: PitToken,
    },
    RegisterApp {
        reply: oneshot::Sender<(FaceId, mpsc::Receiver<AppEvent>)>,
    },
    RegisterNetwork {
        sink: Box<dyn NetworkSink>,
        reply: oneshot::Sender<FaceId>,
    },
    Deregister {
        face: FaceId,
        reply: oneshot::Sender<bool>,
    },
}

/// The forwarding engine. Constructed and driven via [`Forwarder::spawn`].
pub struct Forwarder {
    config: ForwarderConfig,
    faces: FaceTable,
    pit: Pit,
    cs: ContentStore,
    metrics: Arc<ForwarderMetrics>,
    tx: mpsc::Sender<Command>,
    next_token: u64,
}

impl Forwarder {
    /// Starts the forwarder task and returns a handle to it. The task
    /// stops once every handle (and every timer) is gone.
    pub fn spawn(config: ForwarderConfig) -> FwdHandle {
        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let metrics = Arc::new(ForwarderMetrics::new());
        let forwarder = Forwarder {
            faces: FaceTable::new(),
            pit: Pit::new(),
            cs: ContentStore::new(config.cs_capacity),
            metrics: Arc::clone(&metrics),
            tx: tx.clone(),
            next_token: 0,
            config,
        };
        tokio::spawn(forwarder.run(rx));
        FwdHandle { tx, metrics }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!("fwd: forwarder task started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Interest { face, wire } => self.on_interest(face, wire),
                Command::Data { face, wire } => self.on_data(face, wire),
                Command::Expired { token } => self.on_expired(token),
                Command::RegisterApp { reply } => {
                    let pair = self.faces.register_app(self.config.app_mailbox_capacity);
                    let _ = reply.send(pair);
                }
                Command::RegisterNetwork { sink, reply } => {
                    let _ = reply.send(self.faces.register_network(sink));
                }
                Command::Deregister { face, reply } => {
                    let _ = reply.send(self.faces.deregister(face));
                }
            }
        }
        debug!("fwd: command channel closed, stopping");
    }

    fn next_token(&mut self) -> PitToken {
        self.next_token += 1;
        PitToken(self.next_token)
    }

    fn arm_timer(tx: mpsc::Sender<Command>, token: PitToken, lifetime_ms: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(lifetime_ms)).await;
            let _ = tx.send(Command::Expired { token }).await;
        })
    }

    fn on_interest(&mut self, face_id: FaceId, wire: Bytes) {
        self.metrics.interests_received.increment();

        let Some(kind) = self.faces.kind(face_id) else {
            warn!("fwd: interest from unknown face {}", face_id);
            return;
        };
        let interest = match InterestPacket::from_wire(wire) {
            Ok(interest) => interest,
            Err(e) => {
                warn!("fwd: malformed interest from {}: {}", face_id, e);
                return;
            }
        };
        let name = match interest.name() {
            Ok(name) => name,
            Err(e) => {
                warn!("fwd: interest from {} has no usable name: {}", face_id, e);
                return;
            }
        };

        if let Some(data) = self.cs.lookup(&name) {
            debug!("fwd: cs hit for {}", interest);
            self.metrics.cs_hits.increment();
            if self.faces.deliver_data(face_id, &data) {
                self.metrics.data_sent.increment();
            }
            return;
        }
        self.metrics.cs_misses.increment();

        let ingress = FaceRef {
            id: face_id,
            kind,
        };
        let token = self.next_token();
        let outcome = match self.pit.upsert(ingress, &interest) {
            Ok((outcome, entry, lifetime_ms)) => {
                let handle = Self::arm_timer(self.tx.clone(), token, lifetime_ms);
                entry.set_timer(token, handle);
                outcome
            }
            Err(e) => {
                warn!("fwd: interest from {} rejected: {}", face_id, e);
                return;
            }
        };

        match outcome {
            PitInsert::Aggregated => {
                debug!("fwd: aggregated {} (face={})", interest, face_id);
                self.metrics.interests_aggregated.increment();
            }
            PitInsert::New => {
                self.metrics.pit_inserts.increment();
                self.metrics.pit_size.set(self.pit.len() as u64);
                // trivial strategy: broadcast to every network face except
                // the one the Interest came in on
                let targets: Vec<FaceId> = self
                    .faces
                    .network_faces()
                    .filter(|id| *id != face_id)
                    .collect();
                let mut forwarded = 0;
                for target in targets {
                    if self.faces.send_interest(target, interest.as_bytes()) {
                        forwarded += 1;
                    }
                }
                if forwarded > 0 {
                    self.metrics.interests_forwarded.add(forwarded);
                }
            }
        }
    }

    fn on_data(&mut self, face_id: FaceId, wire: Bytes) {
        self.metrics.data_received.increment();

        if self.faces.kind(face_id).is_none() {
            warn!("fwd: data from unknown face {}", face_id);
            return;
        }
        let data = match DataPacket::from_wire(wire) {
            Ok(data) => data,
            Err(e) => {
                warn!("fwd: malformed data from {}: {}", face_id, e);
                return;
            }
        };
        let name = match data.name() {
            Ok(name) => name,
            Err(e) => {
                warn!("fwd: data from {} has no usable name: {}", face_id, e);
                return;
            }
        };

        let mut matches = self.pit.take_matches(&name);
        if matches.is_empty() {
            debug!("fwd: unsolicited {}", data);
            return;
        }
        self.metrics.pit_matches.add(matches.len() as u64);
        self.metrics.pit_size.set(self.pit.len() as u64);

        for entry in matches.iter_mut() {
            entry.cancel_timer();
            for face in entry.faces() {
                if self.faces.deliver_data(face.id, &data) {
                    self.metrics.data_sent.increment();
                }
            }
        }

        match self.cs.insert(data) {
            Ok(evicted) => {
                self.metrics.cs_inserts.increment();
                if evicted > 0 {
                    self.metrics.cs_evictions.add(evicted as u64);
                }
                self.metrics.cs_size.set(self.cs.len() as u64);
            }
            Err(e) => warn!("fwd: cs insert failed: {}", e),
        }
    }

    fn on_expired(&mut self, token: PitToken) {
        let Some(entry) = self.pit.take_by_token(token) else {
            // the entry was satisfied or re-armed after this timer fired
            debug!("fwd: stale expiry ignored");
            return;
        };
        debug!("fwd: pit entry expired ({} faces)", entry.faces().len());
        self.metrics.pit_expirations.increment();
        self.metrics.pit_size.set(self.pit.len() as u64);

        for face in entry.faces() {
            if face.kind == FaceKind::App && self.faces.deliver_timeout(face.id, entry.interest())
            {
                self.metrics.timeouts_sent.increment();
            }
        }
    }
}

/// Clonable handle to a running forwarder.
#[derive(Clone)]
pub struct FwdHandle {
    tx: mpsc::Sender<Command>,
    metrics: Arc<ForwarderMetrics>,
}

impl FwdHandle {
    /// Registers an application face and returns its handle.
    pub async fn register_app(&self) -> Result<AppFace> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::RegisterApp { reply })
            .await
            .map_err(|_| FwdError::Stopped)?;
        let (id, events) = rx.await.map_err(|_| FwdError::Stopped)?;
        Ok(AppFace {
            id,
            events,
            tx: self.tx.clone(),
        })
    }

    /// Registers a network face backed by the host's send primitive.
    pub async fn register_network(&self, sink: Box<dyn NetworkSink>) -> Result<FaceId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::RegisterNetwork { sink, reply })
            .await
            .map_err(|_| FwdError::Stopped)?;
        rx.await.map_err(|_| FwdError::Stopped)
    }

    /// Removes a face from the forwarder. Deregistering a face the
    /// forwarder does not know is an [`FwdError::UnknownFace`] error.
    pub async fn deregister(&self, face: FaceId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Deregister { face, reply })
            .await
            .map_err(|_| FwdError::Stopped)?;
        if rx.await.map_err(|_| FwdError::Stopped)? {
            Ok(())
        } else {
            Err(FwdError::UnknownFace(face))
        }
    }

    /// Feeds ingress bytes from a network face, dispatching on the leading
    /// TLV type byte.
    pub async fn ingest(&self, face: FaceId, wire: Bytes) -> Result<()> {
        let cmd = match wire.first().map(|b| *b as u32) {
            Some(tlv_type::INTEREST) => Command::Interest { face, wire },
            Some(tlv_type::DATA) => Command::Data { face, wire },
            other => {
                return Err(Error::Malformed(format!(
                    "unknown packet type {:?}",
                    other
                ))
                .into())
            }
        };
        self.tx.send(cmd).await.map_err(|_| FwdError::Stopped)
    }

    pub fn metrics(&self) -> Arc<ForwarderMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// An application's connection to the forwarder: express Interests,
/// publish Data, and receive [`AppEvent`]s. The mailbox is bounded;
/// events that arrive while it is full are dropped by the forwarder.
pub struct AppFace {
    id: FaceId,
    events: mpsc::Receiver<AppEvent>,
    tx: mpsc::Sender<Command>,
}

impl AppFace {
    pub fn id(&self) -> FaceId {
        self.id
    }

    /// Hands an encoded Interest to the forwarder.
    pub async fn express_interest(&self, interest: &InterestPacket) -> Result<()> {
        self.tx
            .send(Command::Interest {
                face: self.id,
                wire: interest.as_bytes().clone(),
            })
            .await
            .map_err(|_| FwdError::Stopped)
    }

    /// Hands an encoded Data packet to the forwarder.
    pub async fn publish_data(&self, data: &DataPacket) -> Result<()> {
        self.tx
            .send(Command::Data {
                face: self.id,
                wire: data.as_bytes().clone(),
            })
            .await
            .map_err(|_| FwdError::Stopped)
    }

    /// Waits for the next event on this face's mailbox.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events.recv().await
    }
}
