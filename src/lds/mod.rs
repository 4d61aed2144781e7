//! Logical Data Structure: file identifiers and data group decoding.

mod com;
mod dg1;
mod dg11;
mod dg12;
mod dg2;
mod dg7;
pub mod tlv;

pub use self::{
    com::EfCom,
    dg1::{Dg1, MrzFields},
    dg11::Dg11,
    dg12::Dg12,
    dg2::{Dg2, ImageFormat},
    dg7::Dg7,
};
use {
    crate::asn1::{
        public_key::SubjectPublicKeyInfo, security_info::SecurityInfos, EfDg14, EfDg15, EfSod,
    },
    anyhow::{anyhow, Result},
    der::{asn1::ObjectIdentifier as Oid, Decode},
    sha1::{Digest, Sha1},
    sha2::{Sha224, Sha256, Sha384, Sha512},
    std::fmt::{self, Display, Formatter},
};

/// The elementary files of the LDS1 application, ICAO 9303-10 table 38.
///
/// Ordering is numeric with EF.COM and EF.SOD first; both must be read
/// before any data group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum DataGroupId {
    Com,
    Sod,
    Dg1,
    Dg2,
    Dg3,
    Dg4,
    Dg5,
    Dg6,
    Dg7,
    Dg8,
    Dg9,
    Dg10,
    Dg11,
    Dg12,
    Dg13,
    Dg14,
    Dg15,
    Dg16,
}

impl DataGroupId {
    pub fn iter() -> impl Iterator<Item = DataGroupId> {
        use DataGroupId::*;
        [
            Com, Sod, Dg1, Dg2, Dg3, Dg4, Dg5, Dg6, Dg7, Dg8, Dg9, Dg10, Dg11, Dg12, Dg13, Dg14,
            Dg15, Dg16,
        ]
        .into_iter()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Com => "EF.COM",
            Self::Sod => "EF.SOD",
            Self::Dg1 => "EF.DG1",
            Self::Dg2 => "EF.DG2",
            Self::Dg3 => "EF.DG3",
            Self::Dg4 => "EF.DG4",
            Self::Dg5 => "EF.DG5",
            Self::Dg6 => "EF.DG6",
            Self::Dg7 => "EF.DG7",
            Self::Dg8 => "EF.DG8",
            Self::Dg9 => "EF.DG9",
            Self::Dg10 => "EF.DG10",
            Self::Dg11 => "EF.DG11",
            Self::Dg12 => "EF.DG12",
            Self::Dg13 => "EF.DG13",
            Self::Dg14 => "EF.DG14",
            Self::Dg15 => "EF.DG15",
            Self::Dg16 => "EF.DG16",
        }
    }

    pub fn file_id(&self) -> u16 {
        match self {
            Self::Com => 0x011E,
            Self::Sod => 0x011D,
            Self::Dg1 => 0x0101,
            Self::Dg2 => 0x0102,
            Self::Dg3 => 0x0103,
            Self::Dg4 => 0x0104,
            Self::Dg5 => 0x0105,
            Self::Dg6 => 0x0106,
            Self::Dg7 => 0x0107,
            Self::Dg8 => 0x0108,
            Self::Dg9 => 0x0109,
            Self::Dg10 => 0x010A,
            Self::Dg11 => 0x010B,
            Self::Dg12 => 0x010C,
            Self::Dg13 => 0x010D,
            Self::Dg14 => 0x010E,
            Self::Dg15 => 0x010F,
            Self::Dg16 => 0x0110,
        }
    }

    pub fn short_id(&self) -> u8 {
        match self {
            Self::Com => 0x1E,
            Self::Sod => 0x1D,
            other => other.number().expect("data groups have numbers"),
        }
    }

    /// Outer LDS tag of the file contents.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Com => 0x60,
            Self::Sod => 0x77,
            Self::Dg1 => 0x61,
            Self::Dg2 => 0x75,
            Self::Dg3 => 0x63,
            Self::Dg4 => 0x76,
            Self::Dg5 => 0x65,
            Self::Dg6 => 0x66,
            Self::Dg7 => 0x67,
            Self::Dg8 => 0x68,
            Self::Dg9 => 0x69,
            Self::Dg10 => 0x6A,
            Self::Dg11 => 0x6B,
            Self::Dg12 => 0x6C,
            Self::Dg13 => 0x6D,
            Self::Dg14 => 0x6E,
            Self::Dg15 => 0x6F,
            Self::Dg16 => 0x70,
        }
    }

    /// 1..=16 for the data groups, `None` for EF.COM/EF.SOD.
    pub fn number(&self) -> Option<u8> {
        use DataGroupId::*;
        match self {
            Com | Sod => None,
            Dg1 => Some(1),
            Dg2 => Some(2),
            Dg3 => Some(3),
            Dg4 => Some(4),
            Dg5 => Some(5),
            Dg6 => Some(6),
            Dg7 => Some(7),
            Dg8 => Some(8),
            Dg9 => Some(9),
            Dg10 => Some(10),
            Dg11 => Some(11),
            Dg12 => Some(12),
            Dg13 => Some(13),
            Dg14 => Some(14),
            Dg15 => Some(15),
            Dg16 => Some(16),
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::iter().find(|dg| dg.number() == Some(number))
    }

    /// Resolve a tag from the EF.COM tag list.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::iter().find(|dg| dg.tag() == tag)
    }

    /// DG3 and DG4 hold fingerprints and iris data; they are protected
    /// by terminal authentication and skipped by default.
    pub fn is_secure_element(&self) -> bool {
        matches!(self, Self::Dg3 | Self::Dg4)
    }
}

impl Display for DataGroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hash algorithms an EF.SOD may declare.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DigestAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_oid(oid: Oid) -> Result<Self> {
        Ok(match oid.to_string().as_str() {
            "1.3.14.3.2.26" => Self::Sha1,
            "2.16.840.1.101.3.4.2.4" => Self::Sha224,
            "2.16.840.1.101.3.4.2.1" => Self::Sha256,
            "2.16.840.1.101.3.4.2.2" => Self::Sha384,
            "2.16.840.1.101.3.4.2.3" => Self::Sha512,
            other => return Err(anyhow!("unsupported digest algorithm {other}")),
        })
    }

    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha224 => Sha224::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Sha224 => write!(f, "SHA-224"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha384 => write!(f, "SHA-384"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// A read data group: raw file bytes plus the decoded form.
#[derive(Clone, Debug)]
pub struct DataGroup {
    pub id: DataGroupId,
    pub raw: Vec<u8>,
    pub content: DataGroupContent,
}

#[derive(Clone, Debug)]
pub enum DataGroupContent {
    Com(EfCom),
    Mrz(Dg1),
    Face(Dg2),
    DisplayedSignature(Dg7),
    AdditionalPersonalDetails(Dg11),
    AdditionalDocumentDetails(Dg12),
    SecurityInfos(SecurityInfos),
    ActiveAuthenticationPublicKey(SubjectPublicKeyInfo),
    SecurityObject(Box<EfSod>),
    /// Groups without a structured decoder keep their bytes only.
    Opaque,
}

impl DataGroup {
    pub fn parse(id: DataGroupId, raw: Vec<u8>) -> Result<Self> {
        let content = match id {
            DataGroupId::Com => DataGroupContent::Com(EfCom::parse(&raw)?),
            DataGroupId::Dg1 => DataGroupContent::Mrz(Dg1::parse(&raw)?),
            DataGroupId::Dg2 => DataGroupContent::Face(Dg2::parse(&raw)?),
            DataGroupId::Dg7 => DataGroupContent::DisplayedSignature(Dg7::parse(&raw)?),
            DataGroupId::Dg11 => DataGroupContent::AdditionalPersonalDetails(Dg11::parse(&raw)?),
            DataGroupId::Dg12 => DataGroupContent::AdditionalDocumentDetails(Dg12::parse(&raw)?),
            DataGroupId::Dg14 => {
                DataGroupContent::SecurityInfos(EfDg14::from_der(&raw).map_err(anyhow::Error::from)?.0)
            }
            DataGroupId::Dg15 => DataGroupContent::ActiveAuthenticationPublicKey(
                EfDg15::from_der(&raw).map_err(anyhow::Error::from)?.0,
            ),
            DataGroupId::Sod => {
                DataGroupContent::SecurityObject(Box::new(EfSod::from_der(&raw).map_err(anyhow::Error::from)?))
            }
            _ => {
                // Validate at least the outer tag.
                tlv::expect_tag(&raw, id.tag() as u32)?;
                DataGroupContent::Opaque
            }
        };
        Ok(Self { id, raw, content })
    }

    /// Hash of the raw file with the SOD-declared algorithm.
    pub fn hash(&self, algorithm: DigestAlgorithm) -> Vec<u8> {
        algorithm.hash(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    #[test]
    fn test_ids_are_consistent() {
        for dg in DataGroupId::iter() {
            if let Some(n) = dg.number() {
                assert_eq!(DataGroupId::from_number(n), Some(dg));
                assert_eq!(dg.short_id(), n);
                assert_eq!(dg.file_id(), 0x0100 + n as u16);
            }
            assert_eq!(DataGroupId::from_tag(dg.tag()), Some(dg));
        }
        assert!(DataGroupId::Com < DataGroupId::Sod);
        assert!(DataGroupId::Sod < DataGroupId::Dg1);
        assert!(DataGroupId::Dg3.is_secure_element());
    }

    #[test]
    fn test_digest_dispatch() {
        let algo = DigestAlgorithm::from_oid(Oid::new_unwrap("2.16.840.1.101.3.4.2.1")).unwrap();
        assert_eq!(algo, DigestAlgorithm::Sha256);
        // SHA-256 of the empty string.
        assert_eq!(
            algo.hash(b""),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855").to_vec()
        );
        assert!(DigestAlgorithm::from_oid(Oid::new_unwrap("1.2.3")).is_err());
    }

    #[test]
    fn test_opaque_group_validates_tag() {
        // DG16 with an arbitrary small body.
        let raw = hex!("70 03 020101").to_vec();
        let dg = DataGroup::parse(DataGroupId::Dg16, raw).unwrap();
        assert!(matches!(dg.content, DataGroupContent::Opaque));
        // Wrong outer tag is rejected.
        assert!(DataGroup::parse(DataGroupId::Dg16, hex!("7103020101").to_vec()).is_err());
    }
}
