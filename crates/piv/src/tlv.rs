//! Minimal BER-TLV reader and writer for PIV data objects
//!
//! PIV reuses tag numbers whose constructed bit is set (`70`, `71`, `FE`) for
//! primitive values, so values are never descended into automatically. Callers
//! parse nested objects explicitly by handing a value back to [`parse`].

use bytes::{BufMut, BytesMut};

/// Errors raised while reading TLV encoded data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TlvError {
    #[error("Unexpected end of data while parsing tag")]
    UnexpectedEndTag,

    #[error("Unexpected end of data while parsing length")]
    UnexpectedEndLength,

    #[error("Unexpected end of data while parsing value")]
    UnexpectedEndValue,

    #[error("Invalid length encoding: {0:#04x}")]
    InvalidLength(u8),

    #[error("Tags longer than three bytes are not supported")]
    TagTooLong,

    #[error("Missing tag {0:#x}")]
    MissingTag(u32),
}

/// A single tag/value pair borrowed from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tlv<'a> {
    pub(crate) tag: u32,
    pub(crate) value: &'a [u8],
}

/// Parse one TLV from the front of `data`, returning it with the remaining bytes
pub(crate) fn parse_one(data: &[u8]) -> Result<(Tlv<'_>, &[u8]), TlvError> {
    let (&first, mut rest) = data.split_first().ok_or(TlvError::UnexpectedEndTag)?;
    let mut tag = u32::from(first);

    // Low five bits all set: subsequent bytes continue the tag while b8 is set
    if first & 0x1F == 0x1F {
        let mut tag_len = 1;
        loop {
            let (&next, tail) = rest.split_first().ok_or(TlvError::UnexpectedEndTag)?;
            tag_len += 1;
            if tag_len > 3 {
                return Err(TlvError::TagTooLong);
            }
            tag = (tag << 8) | u32::from(next);
            rest = tail;
            if next & 0x80 == 0 {
                break;
            }
        }
    }

    let (&len_byte, tail) = rest.split_first().ok_or(TlvError::UnexpectedEndLength)?;
    rest = tail;
    let length = match len_byte {
        0x00..=0x7F => usize::from(len_byte),
        0x81..=0x83 => {
            let count = usize::from(len_byte & 0x7F);
            if rest.len() < count {
                return Err(TlvError::UnexpectedEndLength);
            }
            let (len_bytes, tail) = rest.split_at(count);
            rest = tail;
            len_bytes
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | usize::from(b))
        }
        other => return Err(TlvError::InvalidLength(other)),
    };

    if rest.len() < length {
        return Err(TlvError::UnexpectedEndValue);
    }
    let (value, rest) = rest.split_at(length);
    Ok((Tlv { tag, value }, rest))
}

/// Parse a flat sequence of TLVs
pub(crate) fn parse(mut data: &[u8]) -> Result<Vec<Tlv<'_>>, TlvError> {
    let mut tlvs = Vec::new();
    while !data.is_empty() {
        let (tlv, rest) = parse_one(data)?;
        tlvs.push(tlv);
        data = rest;
    }
    Ok(tlvs)
}

/// Find the value of the first TLV with `tag` in a flat sequence
pub(crate) fn find(data: &[u8], tag: u32) -> Result<Option<&[u8]>, TlvError> {
    Ok(parse(data)?
        .into_iter()
        .find(|tlv| tlv.tag == tag)
        .map(|tlv| tlv.value))
}

/// Like [`find`] but a missing tag is an error
pub(crate) fn require(data: &[u8], tag: u32) -> Result<&[u8], TlvError> {
    find(data, tag)?.ok_or(TlvError::MissingTag(tag))
}

/// Read a single TLV that must carry `tag` and span all of `data`
pub(crate) fn unwrap(data: &[u8], tag: u32) -> Result<&[u8], TlvError> {
    let (tlv, rest) = parse_one(data)?;
    if tlv.tag != tag || !rest.is_empty() {
        return Err(TlvError::MissingTag(tag));
    }
    Ok(tlv.value)
}

/// Append a BER length
pub(crate) fn put_length(buf: &mut BytesMut, length: usize) {
    if length < 0x80 {
        buf.put_u8(length as u8);
    } else if length <= 0xFF {
        buf.put_u8(0x81);
        buf.put_u8(length as u8);
    } else if length <= 0xFFFF {
        buf.put_u8(0x82);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(0x83);
        buf.put_uint(length as u64, 3);
    }
}

/// Append a tag, using as many bytes as the value needs
pub(crate) fn put_tag(buf: &mut BytesMut, tag: u32) {
    if tag > 0xFFFF {
        buf.put_uint(u64::from(tag), 3);
    } else if tag > 0xFF {
        buf.put_u16(tag as u16);
    } else {
        buf.put_u8(tag as u8);
    }
}

/// Append a complete TLV
pub(crate) fn put_tlv(buf: &mut BytesMut, tag: u32, value: &[u8]) {
    put_tag(buf, tag);
    put_length(buf, value.len());
    buf.extend_from_slice(value);
}

/// Encode a complete TLV into a fresh buffer
pub(crate) fn encode(tag: u32, value: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(value.len() + 8);
    put_tlv(&mut buf, tag, value);
    buf
}
