//! DG7: displayed signature or usual mark. ICAO 9303-10 section 4.7.7.

use {
    super::{dg2::extract_image, tlv, ImageFormat},
    anyhow::Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dg7 {
    pub format: ImageFormat,
    pub image: Vec<u8>,
}

impl Dg7 {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let outer = tlv::expect_tag(raw, 0x67)?;
        // The displayed image is carried directly in tag 5F43.
        let image_data = outer.child(0x5F43)?.value;
        let (format, image) = extract_image(image_data)?;
        Ok(Self { format, image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let mut inner = vec![0x02, 0x01, 0x01, 0x5F, 0x43, 0x06];
        inner.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0xAA, 0xBB]);
        let mut raw = vec![0x67, inner.len() as u8];
        raw.extend_from_slice(&inner);
        let dg7 = Dg7::parse(&raw).unwrap();
        assert_eq!(dg7.format, ImageFormat::Jpeg);
        assert_eq!(dg7.image.len(), 6);
    }
}
