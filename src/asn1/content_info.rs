//! A compile-time typed `ContentInfo`.
//!
//! See [`cms::content_info::ContentInfo`] for the dynamic version; here
//! the content type OID is checked at decode time against the type.

use der::{
    asn1::{ContextSpecific, ContextSpecificRef, ObjectIdentifier},
    Decode, DecodeValue, Encode, EncodeValue, Error, ErrorKind, Header, Length, Reader, Result,
    Sequence, Tag, TagMode, TagNumber, Tagged, Writer,
};

pub trait ContentType: Encode + EncodeValue + Tagged + for<'a> Decode<'a> {
    const CONTENT_TYPE: ObjectIdentifier;
}

/// The `ContentInfo` type from RFC 5652 section 3, with `contentType`
/// fixed by the [`ContentType`] impl of `T`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentInfo<T: ContentType>(pub T);

impl<T: ContentType> Sequence<'_> for ContentInfo<T> {}

impl<T: ContentType> EncodeValue for ContentInfo<T> {
    fn value_len(&self) -> Result<Length> {
        let content_type_len = T::CONTENT_TYPE.encoded_len()?;
        let content_len = ContextSpecificRef {
            tag_number: TagNumber::N0,
            tag_mode: TagMode::Explicit,
            value: &self.0,
        }
        .encoded_len()?;
        content_type_len + content_len
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        T::CONTENT_TYPE.encode(writer)?;
        ContextSpecificRef {
            tag_number: TagNumber::N0,
            tag_mode: TagMode::Explicit,
            value: &self.0,
        }
        .encode(writer)
    }
}

impl<'a, T: ContentType> DecodeValue<'a> for ContentInfo<T> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> Result<Self> {
        reader.read_nested(header.length, |reader| {
            let content_type = reader.decode()?;
            if content_type != T::CONTENT_TYPE {
                return Err(Error::new(
                    ErrorKind::OidUnknown { oid: content_type },
                    reader.position(),
                ));
            }

            let content = match ContextSpecific::decode(reader)? {
                field if field.tag_number == TagNumber::N0 => Some(field),
                _ => None,
            }
            .ok_or_else(|| {
                Tag::ContextSpecific {
                    number: TagNumber::N0,
                    constructed: false,
                }
                .value_error()
            })?
            .value;

            Ok(Self(content))
        })
    }
}
