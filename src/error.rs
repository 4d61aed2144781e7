use {crate::iso7816::StatusWord, thiserror::Error};

/// Errors surfaced by the reader core.
///
/// Variants mirror the failure classes a host UI needs to distinguish;
/// [`Error::user_message`] renders the operator-facing text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("NFC is not supported on this device")]
    NfcNotSupported,

    #[error("tag is not an eMRTD")]
    TagNotValid,

    #[error("more than one tag in the field")]
    MoreThanOneTagFound,

    #[error("connection to the chip lost")]
    ConnectionError,

    #[error("session canceled by the user")]
    UserCanceled,

    #[error("chip did not answer within the deadline")]
    Timeout,

    #[error("chip rejected the MRZ derived key")]
    InvalidMrzKey,

    #[error("chip returned an error: {description} (0x{sw1:02X}, 0x{sw2:02X})")]
    ResponseError {
        description: String,
        sw1: u8,
        sw2: u8,
    },

    #[error("secure messaging integrity failure")]
    SmError,

    #[error("PACE failed: {0}")]
    PaceError(String),

    #[error("chip authentication failed")]
    ChipAuthError,

    #[error("passive authentication failed: {0}")]
    PassiveAuthError(String),

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn from_status(status: StatusWord) -> Self {
        Error::ResponseError {
            description: status.description().to_owned(),
            sw1: status.sw1(),
            sw2: status.sw2(),
        }
    }

    /// Status word carried by the error, if any.
    pub fn status_word(&self) -> Option<StatusWord> {
        match self {
            Error::ResponseError { sw1, sw2, .. } => {
                Some(StatusWord::from(u16::from_be_bytes([*sw1, *sw2])))
            }
            _ => None,
        }
    }

    /// Default operator-facing rendering.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidMrzKey => "MRZ Key not valid for this document.".to_owned(),
            Error::MoreThanOneTagFound => {
                "More than 1 tags was found. Please present only 1 tag.".to_owned()
            }
            Error::TagNotValid => "Tag not valid.".to_owned(),
            Error::ConnectionError => "Connection error. Please try again.".to_owned(),
            Error::ResponseError {
                description,
                sw1,
                sw2,
            } => format!(
                "Sorry, there was a problem reading the Document. {description} - (0x{sw1:02X}, 0x{sw2:02X}"
            ),
            _ => "Sorry, there was a problem reading the Document. Please try again".to_owned(),
        }
    }
}

impl From<StatusWord> for Error {
    fn from(status: StatusWord) -> Self {
        Error::from_status(status)
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Unexpected(anyhow::anyhow!("DER error: {err}"))
    }
}
