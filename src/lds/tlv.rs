//! Minimal BER-TLV reader for the LDS templates.
//!
//! The biometric and display templates use multi-byte application and
//! context tags (`5F2E`, `7F61`, …) that the strict DER stack cannot
//! model, so data group interiors are walked with this reader instead.

use anyhow::{bail, ensure, Result};

/// One tag-length-value triple borrowed from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u32,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    pub fn is_constructed(&self) -> bool {
        let first = if self.tag > 0xFFFF {
            (self.tag >> 16) as u8
        } else if self.tag > 0xFF {
            (self.tag >> 8) as u8
        } else {
            self.tag as u8
        };
        first & 0x20 != 0
    }

    /// Walk the children of a constructed value.
    pub fn children(&self) -> TlvIter<'a> {
        TlvIter { rest: self.value }
    }

    /// First direct child with the given tag.
    pub fn child(&self, tag: u32) -> Result<Tlv<'a>> {
        self.children()
            .find_map(|child| match child {
                Ok(tlv) if tlv.tag == tag => Some(Ok(tlv)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
            .unwrap_or_else(|| bail!("tag {tag:04X} not found"))
    }
}

pub struct TlvIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Result<Tlv<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match read_tlv(self.rest) {
            Ok((tlv, rest)) => {
                self.rest = rest;
                Some(Ok(tlv))
            }
            Err(e) => {
                self.rest = &[];
                Some(Err(e))
            }
        }
    }
}

/// Parse one TLV from the front of `bytes`, returning it and the rest.
pub fn read_tlv(bytes: &[u8]) -> Result<(Tlv, &[u8])> {
    let (tag, tag_len) = read_tag(bytes)?;
    let (value_len, len_len) = read_length(&bytes[tag_len..])?;
    let header = tag_len + len_len;
    ensure!(
        bytes.len() >= header + value_len,
        "TLV value truncated: need {}, have {}",
        header + value_len,
        bytes.len()
    );
    let value = &bytes[header..header + value_len];
    Ok((Tlv { tag, value }, &bytes[header + value_len..]))
}

/// Parse the top-level TLV and require it to carry the given tag.
pub fn expect_tag(bytes: &[u8], tag: u32) -> Result<Tlv> {
    let (tlv, rest) = read_tlv(bytes)?;
    ensure!(
        tlv.tag == tag,
        "expected tag {tag:04X}, found {:04X}",
        tlv.tag
    );
    ensure!(rest.is_empty(), "trailing bytes after outer TLV");
    Ok(tlv)
}

/// Total encoded size (header + value) of the TLV starting at `bytes`,
/// or `None` when too few bytes have arrived to tell.
pub fn peek_total_len(bytes: &[u8]) -> Result<Option<usize>> {
    let (_, tag_len) = match read_tag(bytes) {
        Ok(t) => t,
        Err(_) if bytes.len() < 2 => return Ok(None),
        Err(e) => return Err(e),
    };
    match read_length(&bytes[tag_len..]) {
        Ok((value_len, len_len)) => Ok(Some(tag_len + len_len + value_len)),
        // A partial length field means we cannot know yet.
        Err(_) if bytes.len() < tag_len + 5 => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_tag(bytes: &[u8]) -> Result<(u32, usize)> {
    ensure!(!bytes.is_empty(), "empty TLV");
    let first = bytes[0];
    if first & 0x1F != 0x1F {
        return Ok((first as u32, 1));
    }
    // High tag number form; LDS tags never exceed three bytes.
    let mut tag = first as u32;
    for (i, &byte) in bytes[1..].iter().take(2).enumerate() {
        tag = (tag << 8) | byte as u32;
        if byte & 0x80 == 0 {
            return Ok((tag, i + 2));
        }
    }
    bail!("tag too long or truncated")
}

fn read_length(bytes: &[u8]) -> Result<(usize, usize)> {
    ensure!(!bytes.is_empty(), "missing length");
    match bytes[0] {
        len @ 0x00..=0x7F => Ok((len as usize, 1)),
        0x80 => bail!("indefinite lengths are not allowed in the LDS"),
        long => {
            let count = (long & 0x7F) as usize;
            ensure!(count <= 4, "length field too long");
            ensure!(bytes.len() > count, "length field truncated");
            let mut len = 0usize;
            for &byte in &bytes[1..=count] {
                len = (len << 8) | byte as usize;
            }
            Ok((len, count + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    #[test]
    fn test_simple_and_long_tags() {
        let data = hex!("5F0E 04 41424344");
        let (tlv, rest) = read_tlv(&data).unwrap();
        assert_eq!(tlv.tag, 0x5F0E);
        assert_eq!(tlv.value, b"ABCD");
        assert!(rest.is_empty());

        let data = hex!("7F61 03 020101");
        let (tlv, _) = read_tlv(&data).unwrap();
        assert_eq!(tlv.tag, 0x7F61);
        assert!(tlv.is_constructed());
        let child = tlv.child(0x02).unwrap();
        assert_eq!(child.value, &[0x01]);
    }

    #[test]
    fn test_long_form_length() {
        let mut data = vec![0x60, 0x82, 0x01, 0x00];
        data.extend_from_slice(&[0xAA; 256]);
        let (tlv, _) = read_tlv(&data).unwrap();
        assert_eq!(tlv.value.len(), 256);
    }

    #[test]
    fn test_peek_total_len() {
        // Complete knowledge from four header bytes.
        let data = hex!("60 82 0100 AA");
        assert_eq!(peek_total_len(&data[..4]).unwrap(), Some(4 + 256));
        // Single byte is not enough.
        assert_eq!(peek_total_len(&data[..1]).unwrap(), None);
        let short = hex!("60 05 AABB");
        assert_eq!(peek_total_len(&short).unwrap(), Some(7));
    }

    #[test]
    fn test_truncation_detected() {
        let data = hex!("61 05 AABB");
        assert!(read_tlv(&data).is_err());
        assert!(expect_tag(&hex!("61021234"), 0x60).is_err());
    }
}
