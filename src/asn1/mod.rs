//! Typed DER structures for the security-relevant LDS files.

mod application_tagged;
mod content_info;
pub mod public_key;
pub mod security_info;

pub use self::{
    application_tagged::ApplicationTagged,
    content_info::{ContentInfo, ContentType},
};
use {
    crate::ensure_err,
    cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerInfo},
    der::{
        asn1::{ObjectIdentifier as Oid, OctetString, PrintableString},
        Decode, Encode, Error, ErrorKind, Length, Result, Sequence, Tag,
    },
    public_key::SubjectPublicKeyInfo,
    security_info::SecurityInfos,
};

impl ContentType for SignedData {
    const CONTENT_TYPE: Oid = Oid::new_unwrap("1.2.840.113549.1.7.2");
}

/// EF.CardAccess is a bare `SecurityInfos`. ICAO 9303-10 section 3.11.3.
pub type EfCardAccess = SecurityInfos;

/// DG14 wraps `SecurityInfos` in application tag 14 (`0x6E`).
pub type EfDg14 = ApplicationTagged<14, SecurityInfos>;

/// DG15 wraps the Active Authentication public key in tag 15 (`0x6F`).
pub type EfDg15 = ApplicationTagged<15, SubjectPublicKeyInfo>;

/// EF.SOD wraps CMS `SignedData` in application tag 23 (`0x77`).
/// ICAO 9303-10 section 4.7.14.
pub type EfSod = ApplicationTagged<23, ContentInfo<SignedData>>;

/// `LDSSecurityObject`, ICAO 9303-10 section 4.6.2.3.
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct LdsSecurityObject {
    pub version: u64,
    pub hash_algorithm: DigestAlgorithmIdentifier,
    pub data_group_hash_values: Vec<DataGroupHash>,
    pub lds_version_info: Option<LdsVersionInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct DigestAlgorithmIdentifier {
    pub algorithm: Oid,
    pub parameters: Option<der::Any>,
}

#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct LdsVersionInfo {
    pub lds_version: PrintableString,
    pub unicode_version: PrintableString,
}

#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct DataGroupHash {
    pub data_group_number: u64,
    pub hash_value: OctetString,
}

impl ContentType for LdsSecurityObject {
    const CONTENT_TYPE: Oid = Oid::new_unwrap("2.23.136.1.1.1");
}

impl EfSod {
    pub fn signed_data(&self) -> &SignedData {
        &self.0 .0
    }

    pub fn signer_info(&self) -> Result<&SignerInfo> {
        self.signed_data()
            .signer_infos
            .0
            .as_slice()
            .first()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::TagUnexpected {
                        expected: Some(Tag::Set),
                        actual: Tag::Null,
                    },
                    Length::ZERO,
                )
            })
    }

    pub fn encapsulated_content(&self) -> &EncapsulatedContentInfo {
        &self.signed_data().encap_content_info
    }

    /// DER of the `LDSSecurityObject` eContent octets.
    pub fn lds_security_object_bytes(&self) -> Result<Vec<u8>> {
        let econ = self.encapsulated_content();
        ensure_err!(
            econ.econtent_type == LdsSecurityObject::CONTENT_TYPE,
            Error::new(
                ErrorKind::OidUnknown {
                    oid: econ.econtent_type
                },
                Length::ZERO,
            )
        );
        let octet_string = econ
            .econtent
            .as_ref()
            .ok_or(Error::new(
                ErrorKind::TagUnexpected {
                    expected: Some(Tag::OctetString),
                    actual: Tag::Null,
                },
                Length::ZERO,
            ))?
            .decode_as::<OctetString>()?;
        Ok(octet_string.as_bytes().to_vec())
    }

    pub fn lds_security_object(&self) -> Result<LdsSecurityObject> {
        LdsSecurityObject::from_der(&self.lds_security_object_bytes()?)
    }

    /// DER of the first embedded X.509 certificate: the Document Signer.
    pub fn document_signer_certificate(&self) -> Option<Vec<u8>> {
        let certs = self.signed_data().certificates.as_ref()?;
        for cert in certs.0.iter() {
            if let cms::cert::CertificateChoices::Certificate(c) = cert {
                return c.to_der().ok();
            }
        }
        None
    }
}

impl LdsSecurityObject {
    /// Look up the declared hash for a data group number.
    pub fn hash_for_dg(&self, dg_number: u64) -> Option<&[u8]> {
        self.data_group_hash_values
            .iter()
            .find(|entry| entry.data_group_number == dg_number)
            .map(|entry| entry.hash_value.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, der::Encode};

    #[test]
    fn test_lds_security_object_round_trip() {
        let lso = LdsSecurityObject {
            version: 0,
            hash_algorithm: DigestAlgorithmIdentifier {
                algorithm: Oid::new_unwrap("2.16.840.1.101.3.4.2.1"),
                parameters: None,
            },
            data_group_hash_values: vec![
                DataGroupHash {
                    data_group_number: 1,
                    hash_value: OctetString::new([0xAA; 32].to_vec()).unwrap(),
                },
                DataGroupHash {
                    data_group_number: 2,
                    hash_value: OctetString::new([0xBB; 32].to_vec()).unwrap(),
                },
            ],
            lds_version_info: None,
        };
        let der_bytes = lso.to_der().unwrap();
        let decoded = LdsSecurityObject::from_der(&der_bytes).unwrap();
        assert_eq!(decoded, lso);
        assert_eq!(decoded.hash_for_dg(2).unwrap(), &[0xBB; 32]);
        assert!(decoded.hash_for_dg(3).is_none());
    }
}
