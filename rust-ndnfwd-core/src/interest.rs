//! NDN Interest packets.
//!
//! `Interest` is the encode-side builder; `InterestPacket` wraps an encoded
//! Interest and extracts fields from the wire without copying.

use crate::error::Error;
use crate::name::Name;
use crate::tlv::{self, tlv_type};
use crate::Result;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Lifetime assumed when an Interest carries no InterestLifetime TLV.
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4_000;

/// Builder for an encoded Interest.
#[derive(Debug, Clone)]
pub struct Interest {
    name: Name,
    selectors: Option<Bytes>,
    nonce: Option<u32>,
    lifetime_ms: u64,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            selectors: None,
            nonce: None,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
        }
    }

    pub fn with_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    /// Pins the nonce instead of drawing a random one at encode time.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Attaches a pre-encoded Selectors TLV block. The contents are opaque
    /// and copied into the output verbatim.
    pub fn with_selectors(mut self, selectors: impl Into<Bytes>) -> Self {
        self.selectors = Some(selectors.into());
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Encodes the Interest:
    /// `Interest { Name, [Selectors], Nonce(4B), InterestLifetime }`.
    pub fn encode(&self) -> Result<InterestPacket> {
        let name_wire = self.name.to_wire()?;
        let selectors_len = self.selectors.as_ref().map_or(0, |s| s.len());
        let nonce_len = tlv::total_length(tlv_type::NONCE, 4);
        let lifetime_len = tlv::total_length(
            tlv_type::INTEREST_LIFETIME,
            tlv::nonneg_int_len(self.lifetime_ms),
        );

        let value_len = name_wire.len() + selectors_len + nonce_len + lifetime_len;
        let total = tlv::total_length(tlv_type::INTEREST, value_len);

        let nonce = self.nonce.unwrap_or_else(rand::random);

        let mut buf = BytesMut::with_capacity(total);
        tlv::write_header(tlv_type::INTEREST, value_len, &mut buf);
        buf.extend_from_slice(&name_wire);
        if let Some(selectors) = &self.selectors {
            buf.extend_from_slice(selectors);
        }
        tlv::write_header(tlv_type::NONCE, 4, &mut buf);
        buf.extend_from_slice(&nonce.to_be_bytes());
        tlv::write_header(
            tlv_type::INTEREST_LIFETIME,
            tlv::nonneg_int_len(self.lifetime_ms),
            &mut buf,
        );
        tlv::write_nonneg_int(self.lifetime_ms, &mut buf);
        debug_assert_eq!(buf.len(), total);

        Ok(InterestPacket { wire: buf.freeze() })
    }
}

/// An encoded Interest packet.
///
/// The wire bytes live in a reference-counted buffer; cloning the packet
/// (or any view produced from it) shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestPacket {
    wire: Bytes,
}

impl InterestPacket {
    /// Wraps an encoded Interest, taking ownership of the buffer. The
    /// packet is trimmed to its declared TLV length; anything beyond it is
    /// discarded.
    pub fn from_wire(wire: Bytes) -> Result<Self> {
        let (typ, len, header) = tlv::read_header(&wire)?;
        if typ != tlv_type::INTEREST {
            return Err(Error::Malformed(format!(
                "expected Interest TLV, got {}",
                typ
            )));
        }
        Ok(Self {
            wire: wire.slice(..header + len),
        })
    }

    /// Copies an encoded Interest out of a borrowed buffer.
    pub fn from_copy(wire: &[u8]) -> Result<Self> {
        Self::from_wire(Bytes::copy_from_slice(wire))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.wire
    }

    pub fn into_bytes(self) -> Bytes {
        self.wire
    }

    pub fn len(&self) -> usize {
        self.wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }

    fn value_region(&self) -> Result<(usize, usize)> {
        let (_, len, header) = tlv::read_header(&self.wire)?;
        Ok((header, header + len))
    }

    /// The encoded Name TLV block, including its header. Zero-copy.
    pub fn name(&self) -> Result<Bytes> {
        let (start, end) = self.value_region()?;
        let (typ, len, header) = tlv::read_header(&self.wire[start..end])?;
        if typ != tlv_type::NAME {
            return Err(Error::Malformed(format!("expected Name TLV, got {}", typ)));
        }
        Ok(self.wire.slice(start..start + header + len))
    }

    /// The Selectors TLV block including its header, if present. Zero-copy.
    pub fn selectors(&self) -> Result<Option<Bytes>> {
        self.find(tlv_type::SELECTORS)
            .map(|opt| opt.map(|(start, len, header)| self.wire.slice(start..start + header + len)))
    }

    /// The 32-bit nonce. Mandatory; any other width is malformed.
    pub fn nonce(&self) -> Result<u32> {
        match self.find(tlv_type::NONCE)? {
            Some((start, 4, header)) => {
                let v = &self.wire[start + header..start + header + 4];
                Ok(u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
            }
            Some((_, len, _)) => Err(Error::Malformed(format!(
                "nonce must be 4 bytes, got {}",
                len
            ))),
            None => Err(Error::Malformed("interest has no nonce".into())),
        }
    }

    /// The Interest lifetime in milliseconds, or the NDN default when the
    /// TLV is absent.
    pub fn lifetime_ms(&self) -> Result<u64> {
        match self.find(tlv_type::INTEREST_LIFETIME)? {
            Some((start, len, header)) => {
                tlv::read_nonneg_int(&self.wire[start + header..start + header + len])
            }
            None => Ok(DEFAULT_INTEREST_LIFETIME_MS),
        }
    }

    /// Walks the TLVs after the name, returning `(offset, value_len,
    /// header_len)` of the first block with the wanted type.
    fn find(&self, wanted: u32) -> Result<Option<(usize, usize, usize)>> {
        let (start, end) = self.value_region()?;
        // the name always comes first
        let (typ, len, header) = tlv::read_header(&self.wire[start..end])?;
        if typ != tlv_type::NAME {
            return Err(Error::Malformed(format!("expected Name TLV, got {}", typ)));
        }
        let mut offset = start + header + len;
        while offset < end {
            let (typ, len, header) = tlv::read_header(&self.wire[offset..end])?;
            if typ == wanted {
                return Ok(Some((offset, len, header)));
            }
            offset += header + len;
        }
        Ok(None)
    }
}

impl fmt::Display for InterestPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name().and_then(|n| Name::from_wire(&n)) {
            Ok(name) => write!(f, "Interest({})", name),
            Err(_) => write!(f, "Interest(<malformed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let interest = Interest::new(Name::from_string("/hello"))
            .with_lifetime_ms(4000)
            .encode()
            .unwrap();
        let nonce = interest.nonce().unwrap();

        let reparsed = InterestPacket::from_copy(interest.as_bytes()).unwrap();
        let name = Name::from_wire(&reparsed.name().unwrap()).unwrap();
        assert_eq!(name.to_string(), "/hello");
        assert_eq!(reparsed.lifetime_ms().unwrap(), 4000);
        assert_eq!(reparsed.nonce().unwrap(), nonce);
        assert!(reparsed.selectors().unwrap().is_none());
    }

    #[test]
    fn pinned_nonce_survives_encoding() {
        let interest = Interest::new(Name::from_string("/n"))
            .with_nonce(0xDEAD_BEEF)
            .encode()
            .unwrap();
        assert_eq!(interest.nonce().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn selectors_pass_through() {
        let selectors = vec![0x09, 0x02, 0xAA, 0xBB];
        let interest = Interest::new(Name::from_string("/s"))
            .with_selectors(selectors.clone())
            .encode()
            .unwrap();
        let got = interest.selectors().unwrap().unwrap();
        assert_eq!(got.as_ref(), selectors.as_slice());
        // the opaque block does not disturb the fields after it
        assert!(interest.nonce().is_ok());
        assert_eq!(interest.lifetime_ms().unwrap(), 4000);
    }

    #[test]
    fn trailing_bytes_are_trimmed() {
        let interest = Interest::new(Name::from_string("/t")).encode().unwrap();
        let mut padded = interest.as_bytes().to_vec();
        padded.extend_from_slice(&[0xFF; 7]);
        let reparsed = InterestPacket::from_copy(&padded).unwrap();
        assert_eq!(reparsed.as_bytes(), interest.as_bytes());
    }

    #[test]
    fn truncated_packet_is_malformed() {
        let interest = Interest::new(Name::from_string("/t")).encode().unwrap();
        let wire = interest.as_bytes();
        assert!(InterestPacket::from_copy(&wire[..wire.len() - 1]).is_err());
    }

    #[test]
    fn wrong_outer_type_is_malformed() {
        assert!(InterestPacket::from_copy(&[0x06, 0x00]).is_err());
    }

    #[test]
    fn missing_nonce_is_malformed() {
        // Interest { Name { Component "a" } } and nothing else
        let wire = [0x05, 0x05, 0x07, 0x03, 0x08, 0x01, b'a'];
        let packet = InterestPacket::from_copy(&wire).unwrap();
        assert!(packet.nonce().is_err());
        assert_eq!(packet.lifetime_ms().unwrap(), DEFAULT_INTEREST_LIFETIME_MS);
    }
}
