//! DG2: encoded face. ICAO 9303-10 section 4.7.2.
//!
//! The biometric template nests CBEFF headers around an ISO 19794-5
//! facial record; the image itself is located by its magic bytes, which
//! sidesteps the assortment of header lengths seen in the wild.

use {
    super::tlv,
    anyhow::{anyhow, Result},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Jpeg2000,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dg2 {
    pub format: ImageFormat,
    pub image: Vec<u8>,
}

impl Dg2 {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let outer = tlv::expect_tag(raw, 0x75)?;
        // Biometric information template group, first instance.
        let group = outer.child(0x7F61)?;
        let template = group.child(0x7F60)?;
        // Biometric data block, primitive (5F2E) or constructed (7F2E).
        let data = template
            .child(0x5F2E)
            .or_else(|_| template.child(0x7F2E))?
            .value;
        let (format, image) = extract_image(data)?;
        Ok(Self { format, image })
    }
}

/// Find the embedded image inside an ISO 19794-5 facial record.
pub(crate) fn extract_image(data: &[u8]) -> Result<(ImageFormat, Vec<u8>)> {
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    const JP2_SIGNATURE: &[u8] = &[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20];
    const JP2_CODESTREAM: &[u8] = &[0xFF, 0x4F, 0xFF, 0x51];

    for offset in 0..data.len().saturating_sub(4) {
        let rest = &data[offset..];
        if rest.starts_with(JPEG) {
            return Ok((ImageFormat::Jpeg, rest.to_vec()));
        }
        if rest.starts_with(JP2_SIGNATURE) || rest.starts_with(JP2_CODESTREAM) {
            return Ok((ImageFormat::Jpeg2000, rest.to_vec()));
        }
    }
    Err(anyhow!("no JPEG or JPEG 2000 payload in biometric data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &[u8]) -> Vec<u8> {
        // 75 { 7F61 { 02 01 01, 7F60 { 5F2E <data> } } }
        let mut bdb = vec![0x5F, 0x2E, data.len() as u8];
        bdb.extend_from_slice(data);
        let mut template = vec![0x7F, 0x60, bdb.len() as u8];
        template.extend_from_slice(&bdb);
        let mut group = vec![0x7F, 0x61, (template.len() + 3) as u8, 0x02, 0x01, 0x01];
        group.extend_from_slice(&template);
        let mut outer = vec![0x75, group.len() as u8];
        outer.extend_from_slice(&group);
        outer
    }

    #[test]
    fn test_jpeg_extraction() {
        // Fake 19794-5 header then a JPEG SOI marker.
        let mut block = b"FAC\x00010\x00".to_vec();
        block.extend_from_slice(&[0x00; 12]);
        block.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0x11, 0x22]);
        let dg2 = Dg2::parse(&wrap(&block)).unwrap();
        assert_eq!(dg2.format, ImageFormat::Jpeg);
        assert_eq!(dg2.image[..4], [0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn test_missing_image_rejected() {
        let block = [0x00u8; 32];
        assert!(Dg2::parse(&wrap(&block)).is_err());
    }
}
