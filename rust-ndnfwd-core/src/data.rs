//! NDN Data packets: encoding, signing and verification.
//!
//! Wire layout: `Data { Name, MetaInfo, Content, SignatureInfo,
//! SignatureValue }`. The signature covers the byte range from the start of
//! the Name TLV up to (but not including) the SignatureValue TLV header;
//! the range is located from the encoding itself, on both the signing and
//! the verifying side.

use crate::error::Error;
use crate::name::Name;
use crate::tlv::{self, tlv_type};
use crate::Result;
use bytes::{BufMut, Bytes, BytesMut};
use hmac::{Hmac, Mac};
use log::debug;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithms carried in the SignatureType field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureKind {
    /// Plain SHA-256 digest of the signed range.
    DigestSha256 = 0,
    /// ECDSA over secp256r1, SHA-256 digest. 64-byte r||s signature.
    EcdsaSha256 = 1,
    /// HMAC-SHA-256 with a caller-supplied key.
    HmacSha256 = 4,
}

impl SignatureKind {
    /// Fixed SignatureValue body length for this algorithm.
    pub fn sig_len(self) -> usize {
        match self {
            SignatureKind::DigestSha256 | SignatureKind::HmacSha256 => 32,
            SignatureKind::EcdsaSha256 => 64,
        }
    }

    fn from_u64(value: u64) -> Result<Self> {
        match value {
            0 => Ok(SignatureKind::DigestSha256),
            1 => Ok(SignatureKind::EcdsaSha256),
            4 => Ok(SignatureKind::HmacSha256),
            n => Err(Error::Unsupported(format!("unknown signature type {}", n))),
        }
    }
}

/// Data packet metadata, encoded inline as the MetaInfo TLV.
///
/// The MetaInfo block is always present in an encoded Data packet, even
/// when both fields are unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub content_type: Option<u64>,
    pub freshness_ms: Option<u64>,
}

impl MetaInfo {
    fn value_len(&self) -> usize {
        let ct = self
            .content_type
            .map_or(0, |v| tlv::total_length(tlv_type::CONTENT_TYPE, tlv::nonneg_int_len(v)));
        let fp = self
            .freshness_ms
            .map_or(0, |v| tlv::total_length(tlv_type::FRESHNESS_PERIOD, tlv::nonneg_int_len(v)));
        ct + fp
    }

    fn encoded_len(&self) -> usize {
        tlv::total_length(tlv_type::META_INFO, self.value_len())
    }

    fn write(&self, buf: &mut BytesMut) {
        tlv::write_header(tlv_type::META_INFO, self.value_len(), buf);
        if let Some(ct) = self.content_type {
            tlv::write_header(tlv_type::CONTENT_TYPE, tlv::nonneg_int_len(ct), buf);
            tlv::write_nonneg_int(ct, buf);
        }
        if let Some(fp) = self.freshness_ms {
            tlv::write_header(tlv_type::FRESHNESS_PERIOD, tlv::nonneg_int_len(fp), buf);
            tlv::write_nonneg_int(fp, buf);
        }
    }

    /// Parses the value region of a MetaInfo TLV. Unknown fields are
    /// skipped.
    fn parse(mut value: &[u8]) -> Result<Self> {
        let mut meta = MetaInfo::default();
        while !value.is_empty() {
            let (typ, len, header) = tlv::read_header(value)?;
            let field = &value[header..header + len];
            match typ {
                tlv_type::CONTENT_TYPE => meta.content_type = Some(tlv::read_nonneg_int(field)?),
                tlv_type::FRESHNESS_PERIOD => {
                    meta.freshness_ms = Some(tlv::read_nonneg_int(field)?)
                }
                _ => {}
            }
            value = &value[header + len..];
        }
        Ok(meta)
    }
}

/// Builder for a signed Data packet.
#[derive(Debug, Clone)]
pub struct Data {
    name: Name,
    metainfo: MetaInfo,
    content: Bytes,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            metainfo: MetaInfo::default(),
            content: content.into(),
        }
    }

    pub fn with_metainfo(mut self, metainfo: MetaInfo) -> Self {
        self.metainfo = metainfo;
        self
    }

    pub fn with_content_type(mut self, content_type: u64) -> Self {
        self.metainfo.content_type = Some(content_type);
        self
    }

    pub fn with_freshness_ms(mut self, freshness_ms: u64) -> Self {
        self.metainfo.freshness_ms = Some(freshness_ms);
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Encodes and signs the packet.
    ///
    /// `key` is required for HMAC (non-empty) and ECDSA (the 32-byte
    /// private scalar); `key_locator` optionally names the signing key
    /// inside SignatureInfo. A signing failure aborts the encode and the
    /// partial buffer is dropped.
    pub fn sign(
        &self,
        kind: SignatureKind,
        key_locator: Option<&Name>,
        key: Option<&[u8]>,
    ) -> Result<DataPacket> {
        let name_wire = self.name.to_wire()?;
        let key_name_wire = key_locator.map(|n| n.to_wire()).transpose()?;

        let ml = self.metainfo.encoded_len();
        let cl = tlv::total_length(tlv_type::CONTENT, self.content.len());
        let kl = key_name_wire
            .as_ref()
            .map_or(0, |w| tlv::total_length(tlv_type::KEY_LOCATOR, w.len()));
        let si_value = tlv::total_length(tlv_type::SIGNATURE_TYPE, 1) + kl;
        let sil = tlv::total_length(tlv_type::SIGNATURE_INFO, si_value);
        let svl = tlv::total_length(tlv_type::SIGNATURE_VALUE, kind.sig_len());

        let dl = name_wire.len() + ml + cl + sil + svl;
        let total = tlv::total_length(tlv_type::DATA, dl);

        let mut buf = BytesMut::with_capacity(total);
        tlv::write_header(tlv_type::DATA, dl, &mut buf);
        let name_start = buf.len();
        buf.extend_from_slice(&name_wire);
        self.metainfo.write(&mut buf);
        tlv::write_header(tlv_type::CONTENT, self.content.len(), &mut buf);
        buf.extend_from_slice(&self.content);
        tlv::write_header(tlv_type::SIGNATURE_INFO, si_value, &mut buf);
        tlv::write_header(tlv_type::SIGNATURE_TYPE, 1, &mut buf);
        buf.put_u8(kind as u8);
        if let Some(w) = &key_name_wire {
            tlv::write_header(tlv_type::KEY_LOCATOR, w.len(), &mut buf);
            buf.extend_from_slice(w);
        }

        let signature = sign_range(kind, key, &buf[name_start..])?;
        tlv::write_header(tlv_type::SIGNATURE_VALUE, signature.len(), &mut buf);
        buf.extend_from_slice(&signature);
        debug_assert_eq!(buf.len(), total);

        Ok(DataPacket { wire: buf.freeze() })
    }
}

fn sign_range(kind: SignatureKind, key: Option<&[u8]>, range: &[u8]) -> Result<Vec<u8>> {
    match kind {
        SignatureKind::DigestSha256 => Ok(Sha256::digest(range).to_vec()),
        SignatureKind::HmacSha256 => {
            let key = key
                .filter(|k| !k.is_empty())
                .ok_or_else(|| Error::InvalidArgument("HMAC signing requires a non-empty key".into()))?;
            let mut mac = HmacSha256::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("hmac key rejected: {}", e)))?;
            mac.update(range);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        SignatureKind::EcdsaSha256 => {
            let key = key.ok_or_else(|| {
                Error::InvalidArgument("ECDSA signing requires a private key".into())
            })?;
            if key.len() != 32 {
                return Err(Error::InvalidArgument(
                    "ECDSA signing key must be a 32-byte scalar".into(),
                ));
            }
            let sk = SigningKey::from_slice(key)
                .map_err(|e| Error::Crypto(format!("ecdsa key rejected: {}", e)))?;
            let signature: Signature = sk.sign(range);
            Ok(signature.to_bytes().to_vec())
        }
    }
}

/// An encoded, signed Data packet.
///
/// Like [`crate::interest::InterestPacket`], the wire bytes live in a
/// reference-counted buffer shared by every clone and view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    wire: Bytes,
}

impl DataPacket {
    /// Wraps an encoded Data packet, trimming it to its declared length.
    pub fn from_wire(wire: Bytes) -> Result<Self> {
        let (typ, len, header) = tlv::read_header(&wire)?;
        if typ != tlv_type::DATA {
            return Err(Error::Malformed(format!("expected Data TLV, got {}", typ)));
        }
        Ok(Self {
            wire: wire.slice(..header + len),
        })
    }

    /// Copies an encoded Data packet out of a borrowed buffer.
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

    /// Reads the header of the block expected at `offset`, returning
    /// `(value_offset, value_len)`.
    fn expect(&self, wanted: u32, offset: usize, end: usize) -> Result<(usize, usize)> {
        let (typ, len, header) = tlv::read_header(&self.wire[offset..end])?;
        if typ != wanted {
            return Err(Error::Malformed(format!(
                "expected TLV type {}, got {}",
                wanted, typ
            )));
        }
        Ok((offset + header, len))
    }

    /// The encoded Name TLV block, including its header. Zero-copy.
    pub fn name(&self) -> Result<Bytes> {
        let (start, end) = self.value_region()?;
        let (value, len) = self.expect(tlv_type::NAME, start, end)?;
        Ok(self.wire.slice(start..value + len))
    }

    /// The decoded MetaInfo fields.
    pub fn metainfo(&self) -> Result<MetaInfo> {
        let (start, end) = self.value_region()?;
        let (value, len) = self.expect(tlv_type::NAME, start, end)?;
        let (value, len) = self.expect(tlv_type::META_INFO, value + len, end)?;
        MetaInfo::parse(&self.wire[value..value + len])
    }

    /// The content payload. Zero-copy; may be empty.
    pub fn content(&self) -> Result<Bytes> {
        let (start, end) = self.value_region()?;
        let (value, len) = self.expect(tlv_type::NAME, start, end)?;
        let (value, len) = self.expect(tlv_type::META_INFO, value + len, end)?;
        let (value, len) = self.expect(tlv_type::CONTENT, value + len, end)?;
        Ok(self.wire.slice(value..value + len))
    }

    /// Locates SignatureInfo, returning
    /// `(name_start, si_value_start, si_value_len, sv_start)`.
    fn signature_region(&self) -> Result<(usize, usize, usize, usize)> {
        let (start, end) = self.value_region()?;
        let (value, len) = self.expect(tlv_type::NAME, start, end)?;
        let (value, len) = self.expect(tlv_type::META_INFO, value + len, end)?;
        let (value, len) = self.expect(tlv_type::CONTENT, value + len, end)?;
        let (si_value, si_len) = self.expect(tlv_type::SIGNATURE_INFO, value + len, end)?;
        Ok((start, si_value, si_len, si_value + si_len))
    }

    /// The signature algorithm declared in SignatureInfo.
    pub fn signature_kind(&self) -> Result<SignatureKind> {
        let (_, si_value, si_len, _) = self.signature_region()?;
        let (value, len) = self.expect(tlv_type::SIGNATURE_TYPE, si_value, si_value + si_len)?;
        SignatureKind::from_u64(tlv::read_nonneg_int(&self.wire[value..value + len])?)
    }

    /// The key Name TLV embedded in the KeyLocator, if present. Zero-copy.
    pub fn key_locator(&self) -> Result<Option<Bytes>> {
        let (_, si_value, si_len, _) = self.signature_region()?;
        let si_end = si_value + si_len;
        let (value, len) = self.expect(tlv_type::SIGNATURE_TYPE, si_value, si_end)?;
        let offset = value + len;
        if offset >= si_end {
            return Ok(None);
        }
        let (kl_value, kl_len) = self.expect(tlv_type::KEY_LOCATOR, offset, si_end)?;
        let (name_value, name_len) = self.expect(tlv_type::NAME, kl_value, kl_value + kl_len)?;
        Ok(Some(self.wire.slice(kl_value..name_value + name_len)))
    }

    /// Checks the signature against the byte range the encoding defines.
    ///
    /// `key` is the HMAC key or the 64-byte uncompressed ECDSA public
    /// point; DigestSha256 needs no key. Signature lengths are checked
    /// before any cryptographic work.
    pub fn verify(&self, key: Option<&[u8]>) -> Result<()> {
        let (name_start, _, _, sv_start) = self.signature_region()?;
        let kind = self.signature_kind()?;
        let (_, end) = self.value_region()?;
        let (sv_value, sv_len) = self.expect(tlv_type::SIGNATURE_VALUE, sv_start, end)?;
        if sv_len != kind.sig_len() {
            return Err(Error::Crypto(format!(
                "signature value must be {} bytes, got {}",
                kind.sig_len(),
                sv_len
            )));
        }
        let signed = &self.wire[name_start..sv_start];
        let signature = &self.wire[sv_value..sv_value + sv_len];

        match kind {
            SignatureKind::DigestSha256 => {
                if Sha256::digest(signed).as_slice() != signature {
                    debug!("data: DigestSha256 verification failed");
                    return Err(Error::Crypto("DigestSha256 mismatch".into()));
                }
                Ok(())
            }
            SignatureKind::HmacSha256 => {
                let key = key.filter(|k| !k.is_empty()).ok_or_else(|| {
                    Error::InvalidArgument("HMAC verification requires a non-empty key".into())
                })?;
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| Error::Crypto(format!("hmac key rejected: {}", e)))?;
                mac.update(signed);
                mac.verify_slice(signature).map_err(|_| {
                    debug!("data: HmacSha256 verification failed");
                    Error::Crypto("HmacSha256 mismatch".into())
                })
            }
            SignatureKind::EcdsaSha256 => {
                let key = key.ok_or_else(|| {
                    Error::InvalidArgument("ECDSA verification requires a public key".into())
                })?;
                if key.len() != 64 {
                    return Err(Error::InvalidArgument(
                        "ECDSA public key must be the 64-byte uncompressed point".into(),
                    ));
                }
                let mut sec1 = [0u8; 65];
                sec1[0] = 0x04;
                sec1[1..].copy_from_slice(key);
                let vk = VerifyingKey::from_sec1_bytes(&sec1)
                    .map_err(|e| Error::Crypto(format!("ecdsa key rejected: {}", e)))?;
                let signature = Signature::from_slice(signature)
                    .map_err(|e| Error::Crypto(format!("ecdsa signature rejected: {}", e)))?;
                vk.verify(signed, &signature).map_err(|_| {
                    debug!("data: EcdsaSha256 verification failed");
                    Error::Crypto("EcdsaSha256 mismatch".into())
                })
            }
        }
    }
}

impl fmt::Display for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (
            self.name().and_then(|n| Name::from_wire(&n)),
            self.content(),
        ) {
            (Ok(name), Ok(content)) => write!(f, "Data({}, {} bytes)", name, content.len()),
            _ => write!(f, "Data(<malformed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    fn sample(kind: SignatureKind, key: Option<&[u8]>) -> DataPacket {
        Data::new(Name::from_string("/a/b"), vec![0x48, 0x69])
            .sign(kind, None, key)
            .unwrap()
    }

    #[test]
    fn digest_sign_and_verify() {
        let data = sample(SignatureKind::DigestSha256, None);
        assert!(data.verify(None).is_ok());
        assert_eq!(data.content().unwrap().as_ref(), b"Hi");
        assert_eq!(
            data.signature_kind().unwrap(),
            SignatureKind::DigestSha256
        );
    }

    #[test]
    fn digest_detects_any_flipped_byte_in_signed_range() {
        let data = sample(SignatureKind::DigestSha256, None);
        let content = data.content().unwrap();
        // locate the content payload and flip one byte of it
        let offset = data
            .as_bytes()
            .windows(content.len())
            .position(|w| w == content.as_ref())
            .unwrap();
        let mut tampered = data.as_bytes().to_vec();
        tampered[offset] ^= 0x01;
        let tampered = DataPacket::from_copy(&tampered).unwrap();
        assert!(matches!(tampered.verify(None), Err(Error::Crypto(_))));
    }

    #[test]
    fn hmac_sign_and_verify() {
        let key = [0u8; 16];
        let data = sample(SignatureKind::HmacSha256, Some(&key));
        assert!(data.verify(Some(&key)).is_ok());

        let other = [1u8; 16];
        assert!(matches!(data.verify(Some(&other)), Err(Error::Crypto(_))));
        assert!(data.verify(None).is_err());
    }

    #[test]
    fn hmac_requires_key_to_sign() {
        let result = Data::new(Name::from_string("/k"), Bytes::new()).sign(
            SignatureKind::HmacSha256,
            None,
            None,
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn ecdsa_sign_and_verify() {
        let scalar = [0x11u8; 32];
        let data = sample(SignatureKind::EcdsaSha256, Some(&scalar));

        let sk = SigningKey::from_slice(&scalar).unwrap();
        let point = sk.verifying_key().to_encoded_point(false);
        let public: [u8; 64] = point.as_bytes()[1..65].try_into().unwrap();

        assert!(data.verify(Some(&public)).is_ok());

        let other = SigningKey::from_slice(&[0x22u8; 32]).unwrap();
        let other_point = other.verifying_key().to_encoded_point(false);
        assert!(data
            .verify(Some(&other_point.as_bytes()[1..65]))
            .is_err());
        assert!(matches!(
            data.verify(Some(&[0u8; 16])),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_signature_type_is_rejected() {
        let data = sample(SignatureKind::DigestSha256, None);
        let mut wire = data.as_bytes().to_vec();
        // SignatureType TLV is the 3-byte run 0x1B 0x01 0x00
        let offset = wire.windows(3).position(|w| w == [0x1B, 0x01, 0x00]).unwrap();
        wire[offset + 2] = 0x09;
        let tampered = DataPacket::from_copy(&wire).unwrap();
        assert!(matches!(tampered.verify(None), Err(Error::Unsupported(_))));
    }

    #[test]
    fn zero_length_content_is_legal() {
        let data = Data::new(Name::from_string("/empty"), Bytes::new())
            .sign(SignatureKind::DigestSha256, None, None)
            .unwrap();
        assert_eq!(data.content().unwrap().len(), 0);
        assert!(data.verify(None).is_ok());
    }

    #[test]
    fn metainfo_round_trip() {
        let data = Data::new(Name::from_string("/m"), vec![1, 2, 3])
            .with_content_type(0)
            .with_freshness_ms(10_000)
            .sign(SignatureKind::DigestSha256, None, None)
            .unwrap();
        let meta = data.metainfo().unwrap();
        assert_eq!(meta.content_type, Some(0));
        assert_eq!(meta.freshness_ms, Some(10_000));
        assert!(data.verify(None).is_ok());
    }

    #[test]
    fn key_locator_round_trip() {
        let key_name = Name::from_string("/keys/k1");
        let key = [0u8; 16];
        let data = Data::new(Name::from_string("/kl"), vec![9])
            .sign(SignatureKind::HmacSha256, Some(&key_name), Some(&key))
            .unwrap();
        let locator = data.key_locator().unwrap().unwrap();
        assert_eq!(Name::from_wire(&locator).unwrap(), key_name);
        assert!(data.verify(Some(&key)).is_ok());

        let plain = sample(SignatureKind::DigestSha256, None);
        assert!(plain.key_locator().unwrap().is_none());
    }

    #[test]
    fn empty_name_cannot_be_signed() {
        let result =
            Data::new(Name::new(), vec![1]).sign(SignatureKind::DigestSha256, None, None);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
