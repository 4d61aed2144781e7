//! PACE protocol identifiers, ICAO 9303-11 section 9.2.

use {
    super::KeyAgreement,
    crate::{
        asn1::public_key::AnyAlgorithmIdentifier, ensure_err,
        secure_messaging::SymmetricCipher,
    },
    der::{
        asn1::ObjectIdentifier as Oid, DecodeValue, EncodeValue, Error, ErrorKind, FixedTag,
        Header, Length, Reader, Result, Sequence, Tag, Writer,
    },
    std::fmt::{self, Display, Formatter},
};

pub const PACE_OID: Oid = Oid::new_unwrap("0.4.0.127.0.7.2.2.4");

/// `PACEInfo`, ICAO 9303-11 section 9.2.1.
#[derive(Clone, PartialEq, Eq, Debug, Sequence)]
pub struct PaceInfo {
    pub protocol: PaceProtocol,

    /// Must be 2.
    pub version: u64,

    /// Standardized domain parameter id, section 9.5.1.
    pub parameter_id: Option<u64>,
}

/// `PACEDomainParameterInfo`, ICAO 9303-11 section 9.2.2.
#[derive(Clone, PartialEq, Eq, Debug, Sequence)]
pub struct PaceDomainParameterInfo {
    pub protocol: PaceProtocol,
    pub domain_parameter: AnyAlgorithmIdentifier,
    pub parameter_id: Option<u64>,
}

/// A decomposed PACE protocol OID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PaceProtocol {
    pub key_agreement: KeyAgreement,
    pub key_mapping: KeyMapping,
    /// `None` on the domain-parameter form of the OID.
    pub cipher: Option<SymmetricCipher>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyMapping {
    /// Generic Mapping
    Gm,

    /// Integrated Mapping
    Im,

    /// Chip Authentication Mapping
    Cam,
}

impl PaceInfo {
    pub fn is_valid(&self) -> bool {
        self.protocol.cipher.is_some() && self.version == 2
    }
}

impl PaceDomainParameterInfo {
    pub fn is_valid(&self) -> bool {
        self.protocol.cipher.is_none()
    }
}

impl Display for PaceProtocol {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "PACE-{}-{}", self.key_agreement, self.key_mapping)?;
        if let Some(cipher) = self.cipher {
            write!(f, "-{cipher}")?;
        }
        Ok(())
    }
}

impl Display for KeyMapping {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Gm => write!(f, "GM"),
            Self::Im => write!(f, "IM"),
            Self::Cam => write!(f, "CAM"),
        }
    }
}

impl TryFrom<Oid> for PaceProtocol {
    type Error = Error;

    fn try_from(oid: Oid) -> Result<Self> {
        let err = Error::new(ErrorKind::OidUnknown { oid }, Length::ZERO);
        ensure_err!((10..=11).contains(&oid.len()), err);
        let pace_oid = match oid.len() {
            10 => oid.parent().unwrap(),
            11 => oid.parent().unwrap().parent().unwrap(),
            _ => return Err(err),
        };
        ensure_err!(pace_oid == PACE_OID, err);
        let (key_agreement, key_mapping) = match oid.arc(9).unwrap() {
            1 => (KeyAgreement::Dh, KeyMapping::Gm),
            2 => (KeyAgreement::Ecdh, KeyMapping::Gm),
            3 => (KeyAgreement::Dh, KeyMapping::Im),
            4 => (KeyAgreement::Ecdh, KeyMapping::Im),
            // 5 is reserved; DH-CAM is not allowed.
            6 => (KeyAgreement::Ecdh, KeyMapping::Cam),
            _ => return Err(err),
        };
        let cipher: Option<SymmetricCipher> = match oid.arc(10) {
            None => None,
            Some(1) => {
                // 3DES is not allowed in CAM.
                ensure_err!(key_mapping != KeyMapping::Cam, err);
                Some(SymmetricCipher::Tdes)
            }
            Some(2) => Some(SymmetricCipher::Aes128),
            Some(3) => Some(SymmetricCipher::Aes192),
            Some(4) => Some(SymmetricCipher::Aes256),
            _ => return Err(err),
        };
        Ok(Self {
            key_agreement,
            key_mapping,
            cipher,
        })
    }
}

impl TryFrom<PaceProtocol> for Oid {
    type Error = Error;

    /// Fails on DH-CAM, which has no assigned OID; the decoder rejects
    /// it too, but the struct fields are public.
    fn try_from(pace: PaceProtocol) -> Result<Self> {
        let arc = match (pace.key_agreement, pace.key_mapping) {
            (KeyAgreement::Dh, KeyMapping::Gm) => 1,
            (KeyAgreement::Ecdh, KeyMapping::Gm) => 2,
            (KeyAgreement::Dh, KeyMapping::Im) => 3,
            (KeyAgreement::Ecdh, KeyMapping::Im) => 4,
            (KeyAgreement::Ecdh, KeyMapping::Cam) => 6,
            (KeyAgreement::Dh, KeyMapping::Cam) => {
                return Err(Error::new(
                    ErrorKind::Value { tag: Oid::TAG },
                    Length::ZERO,
                ))
            }
        };
        let oid = PACE_OID.push_arc(arc).unwrap();
        Ok(if let Some(cipher) = pace.cipher {
            oid.push_arc(match cipher {
                SymmetricCipher::Tdes => 1,
                SymmetricCipher::Aes128 => 2,
                SymmetricCipher::Aes192 => 3,
                SymmetricCipher::Aes256 => 4,
            })
            .unwrap()
        } else {
            oid
        })
    }
}

impl FixedTag for PaceProtocol {
    const TAG: Tag = Oid::TAG;
}

impl EncodeValue for PaceProtocol {
    fn value_len(&self) -> Result<Length> {
        Oid::try_from(*self)?.value_len()
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        Oid::try_from(*self)?.encode_value(writer)
    }
}

impl<'a> DecodeValue<'a> for PaceProtocol {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> Result<Self> {
        Oid::decode_value(reader, header).and_then(|oid| {
            Self::try_from(oid).map_err(|err| Error::new(err.kind(), reader.position()))
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, der::Decode, hex_literal::hex};

    #[test]
    fn test_protocol_oid_round_trip() {
        // id-PACE-ECDH-GM-AES-CBC-CMAC-128
        let oid = Oid::new_unwrap("0.4.0.127.0.7.2.2.4.2.2");
        let protocol = PaceProtocol::try_from(oid).unwrap();
        assert_eq!(protocol.key_agreement, KeyAgreement::Ecdh);
        assert_eq!(protocol.key_mapping, KeyMapping::Gm);
        assert_eq!(protocol.cipher, Some(SymmetricCipher::Aes128));
        assert_eq!(Oid::try_from(protocol).unwrap(), oid);

        // The 3DES CAM combination must be rejected.
        assert!(PaceProtocol::try_from(Oid::new_unwrap("0.4.0.127.0.7.2.2.4.6.1")).is_err());
    }

    #[test]
    fn test_dh_cam_literal_has_no_oid() {
        // DH-CAM is structurally representable but not a protocol; the
        // conversion must error rather than panic.
        let bogus = PaceProtocol {
            key_agreement: KeyAgreement::Dh,
            key_mapping: KeyMapping::Cam,
            cipher: Some(SymmetricCipher::Aes128),
        };
        assert!(Oid::try_from(bogus).is_err());
    }

    // ICAO 9303-11 appendix G: PACEInfo from a real EF.CardAccess.
    #[test]
    fn test_pace_info_decode() {
        let info = PaceInfo::from_der(&hex!(
            "3012060A 04007F00 07020204 02020201 0202010D"
        ))
        .unwrap();
        assert!(info.is_valid());
        assert_eq!(info.version, 2);
        assert_eq!(info.parameter_id, Some(13));
        assert_eq!(info.protocol.key_mapping, KeyMapping::Gm);
        assert_eq!(info.protocol.cipher, Some(SymmetricCipher::Aes128));
    }
}
