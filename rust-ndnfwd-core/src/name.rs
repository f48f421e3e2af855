//! NDN names and name components.
//!
//! A name is an ordered sequence of opaque components. Canonical order
//! compares components shorter-first, then byte-lexicographically, and
//! orders a strict prefix before any name that extends it. Comparison is
//! available both over the in-memory form and directly over encoded
//! Name TLV blocks, without copying.

use crate::error::Error;
use crate::tlv::{self, tlv_type};
use crate::Result;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One opaque name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Canonical component order: shorter byte sequences sort first, equal
/// lengths compare lexicographically.
fn canonical_cmp(lhs: &[u8], rhs: &[u8]) -> Ordering {
    lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(&self.0, &other.0)
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self.0.iter().all(|&b| b.is_ascii_graphic() || b == b' ');
        if printable && !self.0.is_empty() {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in &self.0 {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// An NDN name: an ordered sequence of components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a name from its URI form, e.g. `/hello/world`.
    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(comp.as_bytes().to_vec()))
            .collect();
        Self { components }
    }

    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Gets the component at `pos` without copying. Negative positions
    /// count from the end: `-1` is the last component.
    pub fn component(&self, pos: isize) -> Option<&NameComponent> {
        let len = self.components.len() as isize;
        let idx = if pos < 0 { len + pos } else { pos };
        if idx < 0 || idx >= len {
            return None;
        }
        self.components.get(idx as usize)
    }

    /// True if every component of `self` matches the corresponding
    /// component of `other`.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Total size of the TLV encoding. Empty names and empty components
    /// cannot be encoded.
    pub fn encoded_len(&self) -> Result<usize> {
        if self.components.is_empty() {
            return Err(Error::InvalidArgument("cannot encode an empty name".into()));
        }
        let mut value_len = 0;
        for comp in &self.components {
            if comp.is_empty() {
                return Err(Error::InvalidArgument(
                    "cannot encode an empty name component".into(),
                ));
            }
            value_len += tlv::total_length(tlv_type::NAME_COMPONENT, comp.len());
        }
        Ok(tlv::total_length(tlv_type::NAME, value_len))
    }

    /// Encodes the name as a `Name` TLV wrapping one GenericNameComponent
    /// TLV per component.
    pub fn to_wire(&self) -> Result<Bytes> {
        let total = self.encoded_len()?;
        let value_len = self
            .components
            .iter()
            .map(|c| tlv::total_length(tlv_type::NAME_COMPONENT, c.len()))
            .sum::<usize>();
        let mut buf = BytesMut::with_capacity(total);
        tlv::write_header(tlv_type::NAME, value_len, &mut buf);
        for comp in &self.components {
            tlv::write_header(tlv_type::NAME_COMPONENT, comp.len(), &mut buf);
            buf.extend_from_slice(&comp.0);
        }
        debug_assert_eq!(buf.len(), total);
        Ok(buf.freeze())
    }

    /// Decodes a name from an encoded Name TLV block. Component types are
    /// treated as opaque; the empty name is accepted.
    pub fn from_wire(block: &[u8]) -> Result<Self> {
        let (typ, len, header) = tlv::read_header(block)?;
        if typ != tlv_type::NAME {
            return Err(Error::Malformed(format!("expected Name TLV, got {}", typ)));
        }
        let mut rest = &block[header..header + len];
        let mut components = Vec::new();
        while !rest.is_empty() {
            let (_, clen, chead) = tlv::read_header(rest)?;
            components.push(NameComponent::new(
                Bytes::copy_from_slice(&rest[chead..chead + clen]),
            ));
            rest = &rest[chead + clen..];
        }
        Ok(Self { components })
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

/// Outcome of comparing two names under the canonical order.
///
/// The prefix-aware variants are what prefix matching in the PIT and CS is
/// built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRelation {
    /// Both names are identical.
    Equal,
    /// The left name is a proper prefix of the right (and sorts lower).
    StrictPrefix,
    /// The left name sorts lower and is not a prefix of the right.
    Less,
    /// The right name is a proper prefix of the left (the left sorts higher).
    StrictExtension,
    /// The left name sorts higher and does not extend the right.
    Greater,
}

impl NameRelation {
    /// True when the left name matches the right as a prefix, i.e. a cached
    /// or pending entry under the left name covers the right name.
    pub fn is_prefix_match(self) -> bool {
        matches!(self, NameRelation::Equal | NameRelation::StrictPrefix)
    }

    /// The relation seen from the other side.
    pub fn reversed(self) -> Self {
        match self {
            NameRelation::Equal => NameRelation::Equal,
            NameRelation::StrictPrefix => NameRelation::StrictExtension,
            NameRelation::Less => NameRelation::Greater,
            NameRelation::StrictExtension => NameRelation::StrictPrefix,
            NameRelation::Greater => NameRelation::Less,
        }
    }
}

/// Compares two in-memory names under the canonical order.
pub fn relation(lhs: &Name, rhs: &Name) -> NameRelation {
    let mut l = lhs.components.iter();
    let mut r = rhs.components.iter();
    loop {
        match (l.next(), r.next()) {
            (None, None) => return NameRelation::Equal,
            (None, Some(_)) => return NameRelation::StrictPrefix,
            (Some(_), None) => return NameRelation::StrictExtension,
            (Some(a), Some(b)) => match canonical_cmp(&a.0, &b.0) {
                Ordering::Equal => continue,
                Ordering::Less => return NameRelation::Less,
                Ordering::Greater => return NameRelation::Greater,
            },
        }
    }
}

/// Pops the next component value off an encoded component sequence.
fn next_component<'a>(rest: &mut &'a [u8]) -> Result<Option<&'a [u8]>> {
    if rest.is_empty() {
        return Ok(None);
    }
    let (_, len, header) = tlv::read_header(rest)?;
    let value = &rest[header..header + len];
    *rest = &rest[header + len..];
    Ok(Some(value))
}

/// Opens an encoded Name TLV block and returns its component region.
fn open_name_block(block: &[u8]) -> Result<&[u8]> {
    let (typ, len, header) = tlv::read_header(block)?;
    if typ != tlv_type::NAME {
        return Err(Error::Malformed(format!("expected Name TLV, got {}", typ)));
    }
    Ok(&block[header..header + len])
}

/// Compares two encoded Name TLV blocks under the canonical order without
/// decoding them into memory.
pub fn compare_encoded(lhs: &[u8], rhs: &[u8]) -> Result<NameRelation> {
    let mut l = open_name_block(lhs)?;
    let mut r = open_name_block(rhs)?;
    loop {
        match (next_component(&mut l)?, next_component(&mut r)?) {
            (None, None) => return Ok(NameRelation::Equal),
            (None, Some(_)) => return Ok(NameRelation::StrictPrefix),
            (Some(_), None) => return Ok(NameRelation::StrictExtension),
            (Some(a), Some(b)) => match canonical_cmp(a, b) {
                Ordering::Equal => continue,
                Ordering::Less => return Ok(NameRelation::Less),
                Ordering::Greater => return Ok(NameRelation::Greater),
            },
        }
    }
}

/// Number of components in an encoded Name TLV block.
pub fn encoded_component_count(block: &[u8]) -> Result<usize> {
    let mut rest = open_name_block(block)?;
    let mut count = 0;
    while next_component(&mut rest)?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Zero-copy view of the `pos`-th component value of an encoded Name TLV
/// block. Only non-negative positions are valid on the encoded form.
pub fn encoded_component(block: &Bytes, pos: usize) -> Result<Bytes> {
    let (typ, len, header) = tlv::read_header(block)?;
    if typ != tlv_type::NAME {
        return Err(Error::Malformed(format!("expected Name TLV, got {}", typ)));
    }
    let mut offset = header;
    let end = header + len;
    let mut index = 0;
    while offset < end {
        let (_, clen, chead) = tlv::read_header(&block[offset..end])?;
        if index == pos {
            return Ok(block.slice(offset + chead..offset + chead + clen));
        }
        offset += chead + clen;
        index += 1;
    }
    Err(Error::InvalidArgument(format!(
        "component {} out of range ({} components)",
        pos, index
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        let name = Name::from_string("/test/data/1");
        assert_eq!(name.len(), 3);
        assert_eq!(name.component(0).unwrap().as_bytes().as_ref(), b"test");
        assert_eq!(name.component(-1).unwrap().as_bytes().as_ref(), b"1");
        assert!(name.component(3).is_none());
        assert!(name.component(-4).is_none());
        assert_eq!(name.to_string(), "/test/data/1");
    }

    #[test]
    fn canonical_sort_order() {
        let mut names = vec![
            Name::from_string("/b"),
            Name::from_string("/a/c"),
            Name::from_string("/a"),
            Name::from_string("/a/b"),
        ];
        names.sort();
        let uris: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        assert_eq!(uris, ["/a", "/a/b", "/a/c", "/b"]);
    }

    #[test]
    fn shorter_component_sorts_first() {
        let long = Name::from_string("/ab");
        let short = Name::from_string("/z");
        assert_eq!(relation(&short, &long), NameRelation::Less);
        assert_eq!(relation(&long, &short), NameRelation::Greater);
    }

    #[test]
    fn relations_over_in_memory_names() {
        let a = Name::from_string("/a");
        let ab = Name::from_string("/a/b");
        let ac = Name::from_string("/a/c");
        assert_eq!(relation(&a, &ab), NameRelation::StrictPrefix);
        assert_eq!(relation(&ab, &a), NameRelation::StrictExtension);
        assert_eq!(relation(&ab, &ac), NameRelation::Less);
        assert_eq!(relation(&ac, &ab), NameRelation::Greater);
        assert_eq!(relation(&a, &a), NameRelation::Equal);
    }

    #[test]
    fn relations_over_encoded_names() {
        let a = Name::from_string("/a").to_wire().unwrap();
        let ab = Name::from_string("/a/b").to_wire().unwrap();
        let ac = Name::from_string("/a/c").to_wire().unwrap();
        assert_eq!(compare_encoded(&a, &ab).unwrap(), NameRelation::StrictPrefix);
        assert_eq!(compare_encoded(&ab, &ac).unwrap(), NameRelation::Less);
        assert_eq!(compare_encoded(&ab, &ab).unwrap(), NameRelation::Equal);
        // antisymmetry
        for (l, r) in [(&a, &ab), (&ab, &ac), (&a, &a)] {
            let fwd = compare_encoded(l, r).unwrap();
            let rev = compare_encoded(r, l).unwrap();
            assert_eq!(fwd.reversed(), rev);
        }
    }

    #[test]
    fn wire_round_trip() {
        let name = Name::from_string("/hello/world");
        let wire = name.to_wire().unwrap();
        assert_eq!(wire.len(), name.encoded_len().unwrap());
        assert_eq!(Name::from_wire(&wire).unwrap(), name);
    }

    #[test]
    fn empty_name_rejected_on_encode() {
        assert!(Name::new().to_wire().is_err());
        let mut name = Name::new();
        name.push(NameComponent::new(Bytes::new()));
        assert!(name.to_wire().is_err());
    }

    #[test]
    fn encoded_walkers() {
        let wire = Name::from_string("/a/bc/def").to_wire().unwrap();
        assert_eq!(encoded_component_count(&wire).unwrap(), 3);
        assert_eq!(encoded_component(&wire, 1).unwrap().as_ref(), b"bc");
        assert!(encoded_component(&wire, 3).is_err());
    }

    #[test]
    fn prefix_check_is_length_aware() {
        let a = Name::from_string("/a");
        let ab = Name::from_string("/a/b");
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(a.is_prefix_of(&a));
    }
}
