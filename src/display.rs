//! Operator-facing progress and alert messages.
//!
//! The host passes a hook that may override any text; returning `None`
//! keeps the defaults below.

use crate::lds::DataGroupId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayMessage {
    /// Ask the holder to present the document.
    RequestPresent,
    /// Access control is running; percentage 0..=100.
    Authenticating(u8),
    /// A data group is being read; percentage 0..=100.
    ReadingDataGroup(DataGroupId, u8),
    /// A terminal error, carrying the user-facing rendering.
    Error(String),
    SuccessfulRead,
}

impl DisplayMessage {
    pub fn default_text(&self) -> String {
        match self {
            Self::RequestPresent => {
                "Please hold the document to the top of the phone.".to_owned()
            }
            Self::Authenticating(pct) => {
                format!("Authenticating with document.....\n\n{}", progress_bar(*pct))
            }
            Self::ReadingDataGroup(dg, pct) => {
                format!("Reading {dg}.....\n\n{}", progress_bar(*pct))
            }
            Self::Error(text) => text.clone(),
            Self::SuccessfulRead => "NFC read successfully".to_owned(),
        }
    }
}

/// Five cells of 20% each.
fn progress_bar(pct: u8) -> String {
    let filled = (pct.min(100) / 20) as usize;
    let mut bar = String::new();
    for _ in 0..filled {
        bar.push_str("🔵 ");
    }
    for _ in filled..5 {
        bar.push_str("⚪️ ");
    }
    bar
}
