//! Abstract contactless transport.
//!
//! The core drives any channel that can move APDU bytes to a tag and
//! back; the host's NFC stack is wrapped behind [`Transport`].

use crate::error::Error;

/// Failures a transport can report.
///
/// These are the transport-level events the session needs to tell apart;
/// everything else travels as [`TransportError::Other`].
#[derive(Debug)]
pub enum TransportError {
    /// The tag left the field mid-exchange.
    TagLost,
    /// The exchange deadline expired.
    Timeout,
    /// The reader hardware does not support NFC.
    NotSupported,
    /// More than one tag answered the poll.
    MoreThanOneTag,
    /// The tag is not an ISO 14443-4 tag.
    TagNotValid,
    /// The user dismissed the host's reading surface.
    UserCanceled,
    Other(anyhow::Error),
}

/// A contactless channel honouring strict request/response ordering.
///
/// Exactly one APDU may be outstanding; `transceive` blocks until the
/// chip answers or the deadline expires. `invalidate` tears the session
/// down and must be idempotent: a second call is a no-op and the
/// transport must not emit a further cancellation event for it.
pub trait Transport {
    fn connect(&mut self) -> Result<(), TransportError>;

    fn transceive(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Invalidate the session, optionally showing a final message on
    /// hosts that render one.
    fn invalidate(&mut self, message: Option<&str>);
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::TagLost => Error::ConnectionError,
            TransportError::Timeout => Error::Timeout,
            TransportError::NotSupported => Error::NfcNotSupported,
            TransportError::MoreThanOneTag => Error::MoreThanOneTagFound,
            TransportError::TagNotValid => Error::TagNotValid,
            TransportError::UserCanceled => Error::UserCanceled,
            TransportError::Other(e) => Error::Unexpected(e),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TagLost => write!(f, "tag lost"),
            Self::Timeout => write!(f, "transceive deadline expired"),
            Self::NotSupported => write!(f, "NFC not supported"),
            Self::MoreThanOneTag => write!(f, "more than one tag in field"),
            Self::TagNotValid => write!(f, "tag not valid"),
            Self::UserCanceled => write!(f, "user canceled"),
            Self::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransportError {}
