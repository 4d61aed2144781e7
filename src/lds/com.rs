//! EF.COM: LDS versions and the list of present data groups.
//! ICAO 9303-10 section 4.6.1.

use {
    super::{tlv, DataGroupId},
    anyhow::Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EfCom {
    /// LDS version, e.g. "0107".
    pub lds_version: String,
    /// Unicode version, e.g. "040000".
    pub unicode_version: String,
    /// Tag bytes exactly as listed in the file.
    pub tag_list: Vec<u8>,
}

impl EfCom {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let outer = tlv::expect_tag(raw, 0x60)?;
        let lds_version = String::from_utf8_lossy(outer.child(0x5F01)?.value).into_owned();
        let unicode_version = String::from_utf8_lossy(outer.child(0x5F36)?.value).into_owned();
        let tag_list = outer.child(0x5C)?.value.to_vec();
        Ok(Self {
            lds_version,
            unicode_version,
            tag_list,
        })
    }

    /// Data groups announced by the tag list, unknown tags skipped.
    pub fn data_groups(&self) -> Vec<DataGroupId> {
        self.tag_list
            .iter()
            .filter_map(|&tag| DataGroupId::from_tag(tag))
            .filter(|dg| !matches!(dg, DataGroupId::Com | DataGroupId::Sod))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    // The EF.COM from the ICAO 9303-10 worked example: LDS 1.7,
    // Unicode 4.0.0, DG1/DG2/DG11/DG12/DG15 present.
    #[test]
    fn test_parse() {
        let raw = hex!("60175F0104 30313037 5F3606 303430303030 5C05 6175 6B6C 6F");
        let com = EfCom::parse(&raw).unwrap();
        assert_eq!(com.lds_version, "0107");
        assert_eq!(com.unicode_version, "040000");
        assert_eq!(
            com.data_groups(),
            vec![
                DataGroupId::Dg1,
                DataGroupId::Dg2,
                DataGroupId::Dg11,
                DataGroupId::Dg12,
                DataGroupId::Dg15,
            ]
        );
    }

    #[test]
    fn test_missing_tag_list_rejected() {
        let raw = hex!("60075F010430313037");
        assert!(EfCom::parse(&raw).is_err());
    }
}
