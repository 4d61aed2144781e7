//! DG12: additional document details. ICAO 9303-10 section 4.7.12.

use {
    super::tlv,
    anyhow::Result,
    std::collections::BTreeMap,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dg12 {
    pub issuing_authority: Option<String>,
    /// YYYYMMDD
    pub date_of_issue: Option<String>,
    pub names_of_other_persons: Option<String>,
    pub endorsements: Option<String>,
    pub tax_exit_requirements: Option<String>,
    pub personalization_time: Option<String>,
    pub personalization_serial_number: Option<String>,
    pub other: BTreeMap<u32, Vec<u8>>,
}

impl Dg12 {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let outer = tlv::expect_tag(raw, 0x6C)?;
        let mut dg12 = Self::default();
        for child in outer.children() {
            let child = child?;
            let text = || Some(String::from_utf8_lossy(child.value).into_owned());
            match child.tag {
                0x5C => {}
                0x5F19 => dg12.issuing_authority = text(),
                0x5F26 => dg12.date_of_issue = text(),
                0x5F1A => dg12.names_of_other_persons = text(),
                0x5F1B => dg12.endorsements = text(),
                0x5F1C => dg12.tax_exit_requirements = text(),
                0x5F55 => dg12.personalization_time = text(),
                0x5F56 => dg12.personalization_serial_number = text(),
                tag => {
                    dg12.other.insert(tag, child.value.to_vec());
                }
            }
        }
        Ok(dg12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let mut inner = vec![0x5C, 0x04, 0x5F, 0x19, 0x5F, 0x26];
        inner.extend_from_slice(&[0x5F, 0x19, 0x0D]);
        inner.extend_from_slice(b"UTOPIA OFFICE");
        inner.extend_from_slice(&[0x5F, 0x26, 0x08]);
        inner.extend_from_slice(b"20150415");
        let mut raw = vec![0x6C, inner.len() as u8];
        raw.extend_from_slice(&inner);

        let dg12 = Dg12::parse(&raw).unwrap();
        assert_eq!(dg12.issuing_authority.as_deref(), Some("UTOPIA OFFICE"));
        assert_eq!(dg12.date_of_issue.as_deref(), Some("20150415"));
    }
}
