//! TLV (Type-Length-Value) encoding and decoding primitives.
//!
//! This module implements the NDN VarNumber and NonNegativeInteger codecs
//! and the framing arithmetic used by every packet type.

use crate::error::Error;
use crate::Result;
use bytes::{BufMut, BytesMut};

/// NDN TLV type tags
pub mod tlv_type {
    pub const INTEREST: u32 = 0x05;
    pub const DATA: u32 = 0x06;
    pub const NAME: u32 = 0x07;
    pub const NAME_COMPONENT: u32 = 0x08;
    pub const SELECTORS: u32 = 0x09;
    pub const NONCE: u32 = 0x0A;
    pub const INTEREST_LIFETIME: u32 = 0x0C;
    pub const META_INFO: u32 = 0x14;
    pub const CONTENT: u32 = 0x15;
    pub const SIGNATURE_INFO: u32 = 0x16;
    pub const SIGNATURE_VALUE: u32 = 0x17;
    pub const CONTENT_TYPE: u32 = 0x18;
    pub const FRESHNESS_PERIOD: u32 = 0x19;
    pub const SIGNATURE_TYPE: u32 = 0x1B;
    pub const KEY_LOCATOR: u32 = 0x1C;
}

/// Decodes a VarNumber at the start of `buf`.
///
/// A first byte below 253 encodes itself; 253/254/255 introduce a 2-, 4- or
/// 8-byte big-endian value. Values wider than 32 bits are rejected.
///
/// Returns the value and the number of bytes consumed.
pub fn read_var_number(buf: &[u8]) -> Result<(u32, usize)> {
    let first = *buf
        .first()
        .ok_or_else(|| Error::Malformed("empty input for VarNumber".into()))?;

    match first {
        0..=252 => Ok((first as u32, 1)),
        253 => {
            if buf.len() < 3 {
                return Err(Error::Malformed("truncated 2-byte VarNumber".into()));
            }
            Ok((u16::from_be_bytes([buf[1], buf[2]]) as u32, 3))
        }
        254 => {
            if buf.len() < 5 {
                return Err(Error::Malformed("truncated 4-byte VarNumber".into()));
            }
            Ok((u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]), 5))
        }
        255 => {
            if buf.len() < 9 {
                return Err(Error::Malformed("truncated 8-byte VarNumber".into()));
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[1..9]);
            let num = u64::from_be_bytes(raw);
            if num > u32::MAX as u64 {
                return Err(Error::Malformed("VarNumber exceeds 32 bits".into()));
            }
            Ok((num as u32, 9))
        }
    }
}

/// Encodes `num` as a VarNumber, using the smallest of the 1/3/5/9-byte forms.
pub fn write_var_number(num: u64, buf: &mut BytesMut) {
    if num < 253 {
        buf.put_u8(num as u8);
    } else if num <= u16::MAX as u64 {
        buf.put_u8(253);
        buf.put_u16(num as u16);
    } else if num <= u32::MAX as u64 {
        buf.put_u8(254);
        buf.put_u32(num as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(num);
    }
}

/// Returns the encoded size of `num` as a VarNumber.
pub fn var_number_len(num: u64) -> usize {
    if num < 253 {
        1
    } else if num <= u16::MAX as u64 {
        3
    } else if num <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Total encoded size of a TLV block with the given type and value length.
pub fn total_length(tlv_type: u32, length: usize) -> usize {
    var_number_len(tlv_type as u64) + var_number_len(length as u64) + length
}

/// Decodes a TLV header (type and length) at the start of `buf`.
///
/// Returns `(type, value_length, header_length)`. Fails if the declared
/// value would overrun the input.
pub fn read_header(buf: &[u8]) -> Result<(u32, usize, usize)> {
    let (typ, tl) = read_var_number(buf)?;
    let (len, ll) = read_var_number(&buf[tl..])?;
    let header = tl + ll;
    let len = len as usize;
    if buf.len() - header < len {
        return Err(Error::Malformed(format!(
            "TLV value needs {} bytes but only {} remain",
            len,
            buf.len() - header
        )));
    }
    Ok((typ, len, header))
}

/// Encodes a TLV header (type and length).
pub fn write_header(tlv_type: u32, length: usize, buf: &mut BytesMut) {
    write_var_number(tlv_type as u64, buf);
    write_var_number(length as u64, buf);
}

/// Decodes an NDN NonNegativeInteger occupying the whole of `buf`.
///
/// The declared value length selects the width: 1, 2, 4 or 8 bytes.
pub fn read_nonneg_int(buf: &[u8]) -> Result<u64> {
    match buf.len() {
        1 => Ok(buf[0] as u64),
        2 => Ok(u16::from_be_bytes([buf[0], buf[1]]) as u64),
        4 => Ok(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as u64),
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(buf);
            Ok(u64::from_be_bytes(raw))
        }
        n => Err(Error::Malformed(format!(
            "invalid NonNegativeInteger length {}",
            n
        ))),
    }
}

/// Encodes `num` as an NDN NonNegativeInteger using the smallest of the
/// 1/2/4/8-byte widths.
pub fn write_nonneg_int(num: u64, buf: &mut BytesMut) {
    if num <= u8::MAX as u64 {
        buf.put_u8(num as u8);
    } else if num <= u16::MAX as u64 {
        buf.put_u16(num as u16);
    } else if num <= u32::MAX as u64 {
        buf.put_u32(num as u32);
    } else {
        buf.put_u64(num);
    }
}

/// Returns the encoded size of `num` as a NonNegativeInteger.
pub fn nonneg_int_len(num: u64) -> usize {
    if num <= u8::MAX as u64 {
        1
    } else if num <= u16::MAX as u64 {
        2
    } else if num <= u32::MAX as u64 {
        4
    } else {
        8
    }
}
