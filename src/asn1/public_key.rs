//! Public key structures for Chip and Active Authentication.
//!
//! RFC 5480 shapes, widened per TR-03111: eMRTD chips may carry fully
//! explicit EC domain parameters instead of a named curve (seen on at
//! least Dutch and German documents).

use {
    crate::ensure_err,
    der::{
        asn1::{BitString, Int, Null, ObjectIdentifier as Oid},
        Any, Choice, Decode, DecodeValue, Encode, EncodeValue, Error, ErrorKind, Header, Length,
        Reader, Result, Sequence, ValueOrd, Writer,
    },
    std::cmp::Ordering,
};

pub const ID_EC_PUBLIC_KEY: Oid = Oid::new_unwrap("1.2.840.10045.2.1");
pub const ID_DH_PUBLIC_NUMBER: Oid = Oid::new_unwrap("1.2.840.10046.2.1");
pub const ID_RSA_ENCRYPTION: Oid = Oid::new_unwrap("1.2.840.113549.1.1.1");
pub const ID_PRIME_FIELD: Oid = Oid::new_unwrap("1.2.840.10045.1.1");

/// RFC 5280 `SubjectPublicKeyInfo` with a typed algorithm identifier.
#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct SubjectPublicKeyInfo {
    pub algorithm: PubkeyAlgorithmIdentifier,
    pub subject_public_key: BitString,
}

/// `AlgorithmIdentifier` specialised to the key types eMRTDs carry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PubkeyAlgorithmIdentifier {
    Ec(ECAlgoParameters),
    Dh(DhAlgoParameters),
    Rsa,
    Unknown(AnyAlgorithmIdentifier),
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct AnyAlgorithmIdentifier {
    pub algorithm: Oid,
    pub parameters: Option<Any>,
}

/// EC parameters: named curve or explicit TR-03111 parameters.
#[derive(Clone, Debug, Eq, PartialEq, Choice, ValueOrd)]
pub enum ECAlgoParameters {
    EcParameters(EcParameters),
    NamedCurve(Oid),
    ImplicitlyCA(Null),
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct EcParameters {
    pub version: u64,
    pub field_id: FieldId,
    pub curve: Curve,
    pub base: ECPoint,
    pub order: Int,
    pub cofactor: Option<Int>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct FieldId {
    pub field_type: Oid,
    pub parameters: Any,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct Curve {
    pub a: FieldElement,
    pub b: FieldElement,
    pub seed: Option<BitString>,
}

pub type FieldElement = der::asn1::OctetString;
pub type ECPoint = der::asn1::OctetString;

/// RFC 3279 `DomainParameters` for dhpublicnumber keys.
#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct DhAlgoParameters {
    pub prime: Int,
    pub base: Int,
    pub order: Int,
    pub subgroup_factor: Option<Int>,
}

/// PKCS#1 `RSAPublicKey`, carried inside the DG15 subjectPublicKey bits.
#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct RsaPublicKey {
    pub modulus: Int,
    pub public_exponent: Int,
}

impl SubjectPublicKeyInfo {
    /// Raw content of the subjectPublicKey BIT STRING.
    pub fn key_bytes(&self) -> Result<&[u8]> {
        self.subject_public_key.as_bytes().ok_or_else(|| {
            Error::new(
                ErrorKind::Value {
                    tag: der::Tag::BitString,
                },
                Length::ZERO,
            )
        })
    }
}

impl Sequence<'_> for PubkeyAlgorithmIdentifier {}

impl ValueOrd for PubkeyAlgorithmIdentifier {
    fn value_cmp(&self, other: &Self) -> Result<Ordering> {
        let lhs = self.to_der()?;
        let rhs = other.to_der()?;
        Ok(lhs.cmp(&rhs))
    }
}

impl EncodeValue for PubkeyAlgorithmIdentifier {
    fn value_len(&self) -> Result<Length> {
        match self {
            Self::Ec(params) => ID_EC_PUBLIC_KEY.encoded_len()? + params.encoded_len()?,
            Self::Dh(params) => ID_DH_PUBLIC_NUMBER.encoded_len()? + params.encoded_len()?,
            Self::Rsa => ID_RSA_ENCRYPTION.encoded_len()? + Null.encoded_len()?,
            Self::Unknown(any) => any.value_len(),
        }
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        match self {
            Self::Ec(params) => {
                ID_EC_PUBLIC_KEY.encode(writer)?;
                params.encode(writer)
            }
            Self::Dh(params) => {
                ID_DH_PUBLIC_NUMBER.encode(writer)?;
                params.encode(writer)
            }
            Self::Rsa => {
                ID_RSA_ENCRYPTION.encode(writer)?;
                Null.encode(writer)
            }
            Self::Unknown(any) => any.encode_value(writer),
        }
    }
}

impl<'a> DecodeValue<'a> for PubkeyAlgorithmIdentifier {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> Result<Self> {
        let oid = Oid::decode(reader)?;
        Ok(match oid {
            ID_EC_PUBLIC_KEY => Self::Ec(ECAlgoParameters::decode(reader)?),
            ID_DH_PUBLIC_NUMBER => Self::Dh(DhAlgoParameters::decode(reader)?),
            ID_RSA_ENCRYPTION => {
                // Parameters are NULL, tolerated absent.
                if !reader.is_finished() {
                    Null::decode(reader)?;
                }
                Self::Rsa
            }
            _ => Self::Unknown(AnyAlgorithmIdentifier {
                algorithm: oid,
                parameters: if reader.is_finished() {
                    None
                } else {
                    Some(Any::decode(reader)?)
                },
            }),
        })
    }
}

impl EcParameters {
    pub fn prime_modulus(&self) -> Result<Int> {
        ensure_err!(
            self.field_id.field_type == ID_PRIME_FIELD,
            Error::new(
                ErrorKind::OidUnknown {
                    oid: self.field_id.field_type
                },
                Length::ZERO,
            )
        );
        self.field_id.parameters.decode_as()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, der::Encode};

    #[test]
    fn test_rsa_spki_round_trip() {
        let spki = SubjectPublicKeyInfo {
            algorithm: PubkeyAlgorithmIdentifier::Rsa,
            subject_public_key: BitString::from_bytes(&[0x30, 0x03, 0x02, 0x01, 0x05]).unwrap(),
        };
        let der_bytes = spki.to_der().unwrap();
        let decoded = SubjectPublicKeyInfo::from_der(&der_bytes).unwrap();
        assert_eq!(decoded, spki);
    }

    #[test]
    fn test_unknown_algorithm_tolerated() {
        let spki = SubjectPublicKeyInfo {
            algorithm: PubkeyAlgorithmIdentifier::Unknown(AnyAlgorithmIdentifier {
                algorithm: Oid::new_unwrap("1.2.3.4.5"),
                parameters: None,
            }),
            subject_public_key: BitString::from_bytes(&[0x00]).unwrap(),
        };
        let der_bytes = spki.to_der().unwrap();
        let decoded = SubjectPublicKeyInfo::from_der(&der_bytes).unwrap();
        assert_eq!(decoded, spki);
    }
}
