//! DG11: additional personal details. ICAO 9303-10 section 4.7.11.

use {
    super::tlv,
    anyhow::Result,
    std::collections::BTreeMap,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dg11 {
    pub full_name: Option<String>,
    pub other_names: Option<String>,
    pub personal_number: Option<String>,
    /// YYYYMMDD where known, unlike the truncated MRZ date.
    pub full_date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub permanent_address: Option<String>,
    pub telephone: Option<String>,
    pub profession: Option<String>,
    pub title: Option<String>,
    pub personal_summary: Option<String>,
    pub custody_information: Option<String>,
    /// Fields without a dedicated accessor, keyed by tag.
    pub other: BTreeMap<u32, Vec<u8>>,
}

impl Dg11 {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let outer = tlv::expect_tag(raw, 0x6B)?;
        let mut dg11 = Self::default();
        for child in outer.children() {
            let child = child?;
            let text = || Some(String::from_utf8_lossy(child.value).into_owned());
            match child.tag {
                // The 5C tag list merely repeats which fields follow.
                0x5C => {}
                0x5F0E => dg11.full_name = text(),
                0x5F0F => dg11.other_names = text(),
                0x5F10 => dg11.personal_number = text(),
                0x5F2B => dg11.full_date_of_birth = text(),
                0x5F11 => dg11.place_of_birth = text(),
                0x5F42 => dg11.permanent_address = text(),
                0x5F12 => dg11.telephone = text(),
                0x5F13 => dg11.profession = text(),
                0x5F14 => dg11.title = text(),
                0x5F15 => dg11.personal_summary = text(),
                0x5F18 => dg11.custody_information = text(),
                tag => {
                    dg11.other.insert(tag, child.value.to_vec());
                }
            }
        }
        Ok(dg11)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: u16, value: &str) -> Vec<u8> {
        let mut out = tag.to_be_bytes().to_vec();
        out.push(value.len() as u8);
        out.extend_from_slice(value.as_bytes());
        out
    }

    #[test]
    fn test_parse() {
        let mut inner = vec![0x5C, 0x04, 0x5F, 0x0E, 0x5F, 0x2B];
        inner.extend_from_slice(&field(0x5F0E, "ERIKSSON<<ANNA<MARIA"));
        inner.extend_from_slice(&field(0x5F2B, "19740812"));
        let mut raw = vec![0x6B, inner.len() as u8];
        raw.extend_from_slice(&inner);

        let dg11 = Dg11::parse(&raw).unwrap();
        assert_eq!(dg11.full_name.as_deref(), Some("ERIKSSON<<ANNA<MARIA"));
        assert_eq!(dg11.full_date_of_birth.as_deref(), Some("19740812"));
        assert!(dg11.place_of_birth.is_none());
        assert!(dg11.other.is_empty());
    }
}
