//! An ICAO Doc 9303 eMRTD reader core.
//!
//! Drives an ISO/IEC 14443 contactless chip through the Doc 9303
//! authentication and data extraction sequence — PACE with BAC
//! fallback, Chip and Active Authentication, data group decoding and
//! Passive Authentication — over any transport that can exchange APDU
//! bytes.
//!
//! The host supplies a [`transport::Transport`] (its NFC stack wrapped
//! behind `connect`/`transceive`/`invalidate`) and gets back a
//! [`session::DocumentResult`]:
//!
//! ```no_run
//! use emrtd_reader::{read_document, ReadConfig};
//! # fn transport() -> Box<dyn emrtd_reader::transport::Transport> { unimplemented!() }
//!
//! let config = ReadConfig::new("L898902C<369080619406236");
//! let document = read_document(transport(), config)?;
//! println!("passive authentication: {:?}", document.passive_authentication_status);
//! # Ok::<(), emrtd_reader::Error>(())
//! ```
//!
//! No state persists between calls; session keys and ephemeral key
//! material are zeroized when the session ends.

pub mod active_authentication;
pub mod asn1;
pub mod bac;
pub mod chip_authentication;
pub mod crypto;
pub mod display;
pub mod error;
pub mod iso7816;
pub mod lds;
pub mod pace;
pub mod passive_authentication;
pub mod reader;
pub mod secure_messaging;
pub mod session;
pub mod transport;

pub use crate::{
    display::DisplayMessage,
    error::{Error, Result},
    lds::{DataGroup, DataGroupContent, DataGroupId},
    passive_authentication::MasterListFormat,
    reader::CancelToken,
    session::{read_document, read_document_with_rng, AuthStatus, DocumentResult, ReadConfig},
};

/// Early return with the given error when a condition fails.
#[macro_export]
macro_rules! ensure_err {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
