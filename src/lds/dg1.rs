//! DG1: the Machine Readable Zone. ICAO 9303-10 section 4.7.1.

use {
    super::tlv,
    anyhow::{bail, Result},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dg1 {
    /// The MRZ exactly as stored, line breaks removed.
    pub mrz: String,
    pub fields: MrzFields,
}

/// Fields common to the TD1, TD2 and TD3 layouts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MrzFields {
    pub document_code: String,
    pub issuing_state: String,
    pub document_number: String,
    pub nationality: String,
    /// YYMMDD
    pub date_of_birth: String,
    pub sex: String,
    /// YYMMDD
    pub date_of_expiry: String,
    /// Primary and secondary identifiers, `<` separators intact.
    pub name: String,
}

impl Dg1 {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let outer = tlv::expect_tag(raw, 0x61)?;
        let mrz_bytes = outer.child(0x5F1F)?.value;
        let mrz = String::from_utf8_lossy(mrz_bytes).into_owned();
        let fields = MrzFields::parse(&mrz)?;
        Ok(Self { mrz, fields })
    }
}

impl MrzFields {
    /// Split an MRZ by its length: 90 (TD1), 72 (TD2) or 88 (TD3).
    pub fn parse(mrz: &str) -> Result<Self> {
        match mrz.len() {
            90 => {
                // Three lines of 30.
                let (l1, rest) = mrz.split_at(30);
                let (l2, l3) = rest.split_at(30);
                Ok(Self {
                    document_code: l1[0..2].to_owned(),
                    issuing_state: l1[2..5].to_owned(),
                    document_number: trim_filler(&l1[5..14]),
                    date_of_birth: l2[0..6].to_owned(),
                    sex: l2[7..8].to_owned(),
                    date_of_expiry: l2[8..14].to_owned(),
                    nationality: l2[15..18].to_owned(),
                    name: trim_filler(l3),
                })
            }
            72 => {
                let (l1, l2) = mrz.split_at(36);
                Ok(Self {
                    document_code: l1[0..2].to_owned(),
                    issuing_state: l1[2..5].to_owned(),
                    name: trim_filler(&l1[5..]),
                    document_number: trim_filler(&l2[0..9]),
                    nationality: l2[10..13].to_owned(),
                    date_of_birth: l2[13..19].to_owned(),
                    sex: l2[20..21].to_owned(),
                    date_of_expiry: l2[21..27].to_owned(),
                })
            }
            88 => {
                let (l1, l2) = mrz.split_at(44);
                Ok(Self {
                    document_code: l1[0..2].to_owned(),
                    issuing_state: l1[2..5].to_owned(),
                    name: trim_filler(&l1[5..]),
                    document_number: trim_filler(&l2[0..9]),
                    nationality: l2[10..13].to_owned(),
                    date_of_birth: l2[13..19].to_owned(),
                    sex: l2[20..21].to_owned(),
                    date_of_expiry: l2[21..27].to_owned(),
                })
            }
            other => bail!("MRZ length {other} matches no travel document format"),
        }
    }
}

fn trim_filler(field: &str) -> String {
    field.trim_end_matches('<').to_owned()
}
