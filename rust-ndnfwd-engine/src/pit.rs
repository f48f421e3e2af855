//! Pending Interest Table.
//!
//! Each entry tracks one outstanding Interest name, the faces waiting on
//! it, and the expiry deadline. Entries are matched against arriving Data
//! by canonical prefix comparison over the encoded names.
//!
//! Timers are identified by a generational token carried in the expiry
//! message. Re-arming hands the entry a fresh token, so an expiry that was
//! already queued for a superseded deadline no longer matches anything and
//! is ignored.

use crate::face::FaceRef;
use crate::Result;
use bytes::Bytes;
use log::debug;
use rust_ndnfwd_core::interest::InterestPacket;
use rust_ndnfwd_core::name;
use rust_ndnfwd_core::Error;
use tokio::task::JoinHandle;

/// Longest admissible Interest lifetime. The microsecond form of anything
/// above 2^22 ms no longer fits in 32 bits.
pub const MAX_LIFETIME_MS: u64 = 1 << 22;

/// Generational identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitToken(pub u64);

/// Outcome of admitting an Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitInsert {
    /// First Interest for this name; a new entry was created.
    New,
    /// An entry for this name already existed; the face was recorded.
    Aggregated,
}

/// One outstanding Interest.
pub struct PitEntry {
    interest: InterestPacket,
    name: Bytes,
    faces: Vec<FaceRef>,
    token: Option<PitToken>,
    timer: Option<JoinHandle<()>>,
}

impl PitEntry {
    fn new(interest: InterestPacket, name: Bytes, face: FaceRef) -> Self {
        Self {
            interest,
            name,
            faces: vec![face],
            token: None,
            timer: None,
        }
    }

    pub fn interest(&self) -> &InterestPacket {
        &self.interest
    }

    pub fn faces(&self) -> &[FaceRef] {
        &self.faces
    }

    /// Records a waiting face. The face list never holds duplicates; a
    /// face-id that is already present is reported as [`Error::Exists`].
    fn add_face(&mut self, face: FaceRef) -> std::result::Result<(), Error> {
        if self.faces.iter().any(|f| f.id == face.id) {
            return Err(Error::Exists(format!(
                "face {} is already waiting on this name",
                face.id
            )));
        }
        self.faces.push(face);
        Ok(())
    }

    /// Installs a freshly armed timer, cancelling any prior deadline.
    pub(crate) fn set_timer(&mut self, token: PitToken, handle: JoinHandle<()>) {
        if let Some(old) = self.timer.replace(handle) {
            old.abort();
        }
        self.token = Some(token);
    }

    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.token = None;
    }
}

impl Drop for PitEntry {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// The table of outstanding Interests.
pub struct Pit {
    entries: Vec<PitEntry>,
}

impl Pit {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Admits an Interest from `face`.
    ///
    /// Rejects lifetimes above [`MAX_LIFETIME_MS`]. An entry with the same
    /// encoded name (full-length byte equality) aggregates the face; a
    /// duplicate face on the same entry raises [`Error::Exists`], which is
    /// logged here and not treated as fatal. The caller arms (or re-arms)
    /// the timer on the returned entry.
    ///
    /// Returns the outcome, the entry, and the decoded lifetime.
    pub fn upsert(
        &mut self,
        face: FaceRef,
        interest: &InterestPacket,
    ) -> Result<(PitInsert, &mut PitEntry, u64)> {
        let name = interest.name()?;
        let lifetime_ms = interest.lifetime_ms()?;
        if lifetime_ms > MAX_LIFETIME_MS {
            return Err(Error::InvalidArgument(format!(
                "interest lifetime {} ms exceeds the {} ms ceiling",
                lifetime_ms, MAX_LIFETIME_MS
            ))
            .into());
        }

        if let Some(pos) = self.entries.iter().position(|e| e.name == name) {
            let entry = &mut self.entries[pos];
            if let Err(e) = entry.add_face(face) {
                debug!("pit: {}", e);
            }
            return Ok((PitInsert::Aggregated, entry, lifetime_ms));
        }

        self.entries
            .insert(0, PitEntry::new(interest.clone(), name, face));
        debug!("pit: new entry (face={}, {} pending)", face.id, self.entries.len());
        Ok((PitInsert::New, &mut self.entries[0], lifetime_ms))
    }

    /// Removes and returns every entry whose Interest name equals or is a
    /// proper prefix of `data_name`. Entries that fail to compare (never
    /// the case for entries this table admitted) are left untouched.
    pub fn take_matches(&mut self, data_name: &[u8]) -> Vec<PitEntry> {
        let mut matched = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            match name::compare_encoded(&self.entries[i].name, data_name) {
                Ok(rel) if rel.is_prefix_match() => matched.push(self.entries.remove(i)),
                _ => i += 1,
            }
        }
        matched
    }

    /// Removes and returns the entry whose live timer carries `token`.
    /// Stale tokens (the entry was satisfied or re-armed since) match
    /// nothing.
    pub fn take_by_token(&mut self, token: PitToken) -> Option<PitEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.token == Some(token))?;
        Some(self.entries.remove(pos))
    }
}

impl Default for Pit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{FaceId, FaceKind};
    use rust_ndnfwd_core::interest::Interest;
    use rust_ndnfwd_core::name::Name;

    fn face(id: u64, kind: FaceKind) -> FaceRef {
        FaceRef {
            id: FaceId(id),
            kind,
        }
    }

    fn interest(uri: &str, lifetime_ms: u64) -> InterestPacket {
        Interest::new(Name::from_string(uri))
            .with_lifetime_ms(lifetime_ms)
            .encode()
            .unwrap()
    }

    #[test]
    fn first_interest_creates_entry() {
        let mut pit = Pit::new();
        let i = interest("/x", 100);
        let (outcome, entry, lifetime) = pit.upsert(face(1, FaceKind::App), &i).unwrap();
        assert_eq!(outcome, PitInsert::New);
        assert_eq!(lifetime, 100);
        assert_eq!(entry.faces().len(), 1);
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn same_name_aggregates_faces() {
        let mut pit = Pit::new();
        pit.upsert(face(1, FaceKind::App), &interest("/x", 100)).unwrap();
        // a different encoding of the same name (fresh nonce) still aggregates
        let (outcome, entry, _) = pit
            .upsert(face(2, FaceKind::Network), &interest("/x", 100))
            .unwrap();
        assert_eq!(outcome, PitInsert::Aggregated);
        assert_eq!(entry.faces().len(), 2);
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn duplicate_face_is_not_recorded_twice() {
        let mut pit = Pit::new();
        pit.upsert(face(1, FaceKind::App), &interest("/x", 100)).unwrap();
        let (outcome, entry, _) = pit
            .upsert(face(1, FaceKind::App), &interest("/x", 100))
            .unwrap();
        assert_eq!(outcome, PitInsert::Aggregated);
        assert_eq!(entry.faces().len(), 1);
    }

    #[test]
    fn duplicate_face_raises_exists() {
        let mut pit = Pit::new();
        let (_, entry, _) = pit
            .upsert(face(1, FaceKind::App), &interest("/x", 100))
            .unwrap();
        let err = entry.add_face(face(1, FaceKind::App)).unwrap_err();
        assert!(matches!(err, Error::Exists(_)));
        assert_eq!(entry.faces().len(), 1);
    }

    #[test]
    fn prefix_names_do_not_aggregate() {
        let mut pit = Pit::new();
        pit.upsert(face(1, FaceKind::App), &interest("/x", 100)).unwrap();
        let (outcome, _, _) = pit
            .upsert(face(2, FaceKind::App), &interest("/x/y", 100))
            .unwrap();
        assert_eq!(outcome, PitInsert::New);
        assert_eq!(pit.len(), 2);
    }

    #[test]
    fn lifetime_ceiling() {
        let mut pit = Pit::new();
        assert!(pit
            .upsert(face(1, FaceKind::App), &interest("/x", MAX_LIFETIME_MS))
            .is_ok());
        assert!(pit
            .upsert(face(2, FaceKind::App), &interest("/y", MAX_LIFETIME_MS + 1))
            .is_err());
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn data_matching_takes_equal_and_descendant_names() {
        let mut pit = Pit::new();
        pit.upsert(face(1, FaceKind::App), &interest("/x", 100)).unwrap();
        pit.upsert(face(2, FaceKind::App), &interest("/x/y", 100)).unwrap();
        pit.upsert(face(3, FaceKind::App), &interest("/z", 100)).unwrap();

        let data_name = Name::from_string("/x/y").to_wire().unwrap();
        let matched = pit.take_matches(&data_name);
        assert_eq!(matched.len(), 2);
        assert_eq!(pit.len(), 1);

        // the remaining entry is /z
        let z = Name::from_string("/z").to_wire().unwrap();
        assert_eq!(pit.take_matches(&z).len(), 1);
        assert!(pit.is_empty());
    }

    #[test]
    fn sibling_names_do_not_match() {
        let mut pit = Pit::new();
        pit.upsert(face(1, FaceKind::App), &interest("/x/y", 100)).unwrap();
        let data_name = Name::from_string("/x/z").to_wire().unwrap();
        assert!(pit.take_matches(&data_name).is_empty());
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn stale_tokens_match_nothing() {
        let mut pit = Pit::new();
        pit.upsert(face(1, FaceKind::App), &interest("/x", 100)).unwrap();
        assert!(pit.take_by_token(PitToken(42)).is_none());
        assert_eq!(pit.len(), 1);
    }
}
