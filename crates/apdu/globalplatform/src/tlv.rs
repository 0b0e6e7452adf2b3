//! BER-TLV parsing and emission
//!
//! Tags may span 1–4 bytes (big-endian, continuation bit `0x80` set on all
//! but the last byte); a tag is "constructed" when bit `0x20` of its first
//! byte is set, in which case its value is itself a nested TLV sequence.
//! Lengths use BER short form (`< 0x80`) or long form (`0x80 | n` followed
//! by `n` big-endian length bytes). Filler bytes `0x00`/`0xFF` between
//! top-level nodes are skipped.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// A parsed BER-TLV node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    tag: u32,
    value: Bytes,
    children: Vec<Node>,
}

impl Node {
    /// Build a primitive node from a tag and raw value
    pub fn primitive(tag: u32, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Build a constructed node from a tag and already-parsed children
    pub fn constructed(tag: u32, children: Vec<Self>) -> Self {
        let value = {
            let mut buf = BytesMut::new();
            for child in &children {
                buf.put(child.emit());
            }
            buf.freeze()
        };
        Self {
            tag,
            value,
            children,
        }
    }

    /// This node's tag
    pub const fn tag(&self) -> u32 {
        self.tag
    }

    /// This node's raw value (for constructed nodes, the encoded children)
    pub const fn value(&self) -> &Bytes {
        &self.value
    }

    /// This node's children (empty for primitive nodes)
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// `true` if bit `0x20` of the tag's first byte is set
    pub const fn is_constructed(&self) -> bool {
        tag_first_byte(self.tag) & 0x20 != 0
    }

    /// First direct child with an exact tag match, non-recursive
    pub fn find(&self, tag: u32) -> Option<&Self> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// First descendant (depth-first, self included) with an exact tag match
    pub fn find_recursive(&self, tag: u32) -> Option<&Self> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_recursive(tag))
    }

    /// Encode this node (and its children, if constructed) to BER-TLV bytes
    pub fn emit(&self) -> Bytes {
        let mut buf = BytesMut::new();
        encode_tag(&mut buf, self.tag);
        encode_length(&mut buf, self.value.len());
        buf.put(self.value.clone());
        buf.freeze()
    }
}

const fn tag_first_byte(tag: u32) -> u8 {
    // The first byte on the wire is the most-significant non-zero byte.
    if tag > 0x00FF_FFFF {
        (tag >> 24) as u8
    } else if tag > 0x0000_FFFF {
        (tag >> 16) as u8
    } else if tag > 0x0000_00FF {
        (tag >> 8) as u8
    } else {
        tag as u8
    }
}

fn encode_tag(buf: &mut BytesMut, tag: u32) {
    let bytes = tag.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    buf.put_slice(&bytes[first_nonzero..]);
}

/// Encode a BER length: short form when `< 0x80`, long form otherwise
/// (minimal big-endian byte count, canonical encoding).
pub fn encode_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let len_bytes = len.to_be_bytes();
    let first_nonzero = len_bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(len_bytes.len() - 1);
    let significant = &len_bytes[first_nonzero..];
    buf.put_u8(0x80 | significant.len() as u8);
    buf.put_slice(significant);
}

/// Parse a sequence of top-level BER-TLV nodes from `data`
pub fn parse(data: &[u8]) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        if data[offset] == 0x00 || data[offset] == 0xFF {
            offset += 1;
            continue;
        }
        let (node, consumed) = parse_one(&data[offset..])?;
        nodes.push(node);
        offset += consumed;
    }
    Ok(nodes)
}

fn parse_one(data: &[u8]) -> Result<(Node, usize)> {
    let (tag, tag_len) = parse_tag(data)?;
    if tag_len >= data.len() {
        return Err(Error::MalformedTlv("truncated length after tag"));
    }
    let (len, len_len) = parse_length(&data[tag_len..])?;
    let value_start = tag_len + len_len;
    let value_end = value_start
        .checked_add(len)
        .ok_or(Error::MalformedTlv("length overflow"))?;
    if value_end > data.len() {
        return Err(Error::MalformedTlv("declared length exceeds remaining bytes"));
    }
    let value = Bytes::copy_from_slice(&data[value_start..value_end]);

    let constructed = tag_first_byte(tag) & 0x20 != 0;
    let children = if constructed { parse(&value)? } else { Vec::new() };

    Ok((
        Node {
            tag,
            value,
            children,
        },
        value_end,
    ))
}

fn parse_tag(data: &[u8]) -> Result<(u32, usize)> {
    if data.is_empty() {
        return Err(Error::MalformedTlv("empty tag"));
    }
    let first = data[0];
    let mut tag = first as u32;
    let mut len = 1;
    // Continuation only applies when the low 5 bits of the first byte are
    // all set (0x1F), per ISO 7816-4/BER tag encoding.
    if first & 0x1F == 0x1F {
        loop {
            if len >= data.len() {
                return Err(Error::MalformedTlv("unterminated multi-byte tag"));
            }
            if len >= 4 {
                return Err(Error::MalformedTlv("tag exceeds 4 bytes"));
            }
            let b = data[len];
            tag = (tag << 8) | b as u32;
            len += 1;
            if b & 0x80 == 0 {
                break;
            }
        }
    }
    Ok((tag, len))
}

fn parse_length(data: &[u8]) -> Result<(usize, usize)> {
    if data.is_empty() {
        return Err(Error::MalformedTlv("empty length"));
    }
    let first = data[0];
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }
    let n = (first & 0x7F) as usize;
    if n == 0 {
        return Err(Error::MalformedTlv("indefinite length not supported"));
    }
    if n > std::mem::size_of::<usize>() || 1 + n > data.len() {
        return Err(Error::MalformedTlv("truncated long-form length"));
    }
    let mut len = 0usize;
    for &b in &data[1..1 + n] {
        len = (len << 8) | b as usize;
    }
    Ok((len, 1 + n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn parses_nested_example() {
        let bytes = hex!(
            "6F 10 84 08 A0 00 00 00 03 00 00 00 A5 04 9F 65 01 FF"
        );
        let nodes = parse(&bytes).unwrap();
        assert_eq!(nodes.len(), 1);
        let root = &nodes[0];
        assert_eq!(root.tag(), 0x6F);
        assert!(root.is_constructed());
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.children()[0].tag(), 0x84);
        assert_eq!(root.children()[1].tag(), 0xA5);

        let found = root.find_recursive(0x9F65).unwrap();
        assert_eq!(found.value().as_ref(), &[0xFF]);
    }

    #[test]
    fn round_trip_primitive() {
        let node = Node::primitive(0x9F65, Bytes::from_static(&[0xFF]));
        let bytes = node.emit();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, vec![node]);
    }

    #[test]
    fn round_trip_constructed() {
        let child = Node::primitive(0x84, Bytes::from_static(&[0xA0, 0x00]));
        let node = Node::constructed(0x6F, vec![child.clone()]);
        let bytes = node.emit();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tag(), 0x6F);
        assert_eq!(parsed[0].children(), &[child]);
    }

    #[test]
    fn long_form_length_round_trips() {
        let value = vec![0xAB; 200];
        let node = Node::primitive(0x80, Bytes::copy_from_slice(&value));
        let bytes = node.emit();
        assert_eq!(bytes[1] & 0x80, 0x80);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed[0].value().as_ref(), value.as_slice());
    }

    #[test]
    fn skips_filler_bytes() {
        let mut data = vec![0x00, 0xFF];
        data.extend_from_slice(&Node::primitive(0x9F65, Bytes::from_static(&[0x01])).emit());
        let nodes = parse(&data).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag(), 0x9F65);
    }

    #[test]
    fn truncated_length_errs() {
        assert!(parse(&[0x9F, 0x65, 0x05, 0x01]).is_err());
    }
}
