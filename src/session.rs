//! The read session: access control, data group reads with retries,
//! and the authentication verdicts.
//!
//! One `read_document` call drives one chip session:
//!
//! ```text
//! connect → EF.CardAccess → PACE (fallback BAC) → select LDS1
//!         → EF.COM → EF.SOD → Chip Authentication (DG14)
//!         → data groups → Active Authentication (DG15)
//!         → Passive Authentication
//! ```

use {
    crate::{
        active_authentication,
        asn1::EfCardAccess,
        bac, chip_authentication,
        display::DisplayMessage,
        error::{Error, Result},
        iso7816::StatusWord,
        lds::{DataGroup, DataGroupContent, DataGroupId},
        pace,
        passive_authentication::{self, MasterListFormat},
        reader::{CancelToken, TagReader, EMRTD_LDS1_AID},
        transport::Transport,
    },
    der::Decode,
    rand::{CryptoRng, RngCore},
    std::{
        collections::{BTreeMap, BTreeSet},
        sync::{Arc, Mutex},
    },
    tracing::{debug, info, warn},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AuthStatus {
    #[default]
    NotDone,
    Success,
    Failed,
}

/// Everything a completed (or partially completed) read produced.
/// Built incrementally; never mutated after being returned.
#[derive(Debug, Default)]
pub struct DocumentResult {
    /// Decoded EF.CardAccess, when the chip has one.
    pub card_access: Option<EfCardAccess>,
    pub data_groups: BTreeMap<DataGroupId, DataGroup>,
    pub bac_status: AuthStatus,
    pub pace_status: AuthStatus,
    pub chip_authentication_status: AuthStatus,
    pub active_authentication_status: AuthStatus,
    pub passive_authentication_status: AuthStatus,
    /// DER of the Document Signer Certificate from EF.SOD.
    pub document_signing_certificate: Option<Vec<u8>>,
    pub verification_errors: Vec<String>,
}

impl DocumentResult {
    pub fn data_group(&self, id: DataGroupId) -> Option<&DataGroup> {
        self.data_groups.get(&id)
    }
}

/// Host hook for progress and alert text; `None` keeps the default.
pub type DisplayHook = Box<dyn FnMut(&DisplayMessage) -> Option<String> + Send>;

type SharedDisplay = Arc<Mutex<Option<DisplayHook>>>;

pub struct ReadConfig {
    /// Concatenated document number, date of birth and expiry with
    /// check digits, as printed in the MRZ.
    pub mrz_key: String,
    /// Explicit data groups to read; empty means everything EF.COM
    /// announces. EF.COM and EF.SOD are always read.
    pub data_groups: BTreeSet<DataGroupId>,
    /// Leave DG3/DG4 alone (they need terminal authentication).
    pub skip_secure_elements: bool,
    pub skip_chip_authentication: bool,
    pub skip_pace: bool,
    /// Override the READ BINARY chunk size (1..=256).
    pub data_amount_override: Option<usize>,
    /// CSCA master list for Passive Authentication.
    pub master_list: Option<Vec<u8>>,
    pub master_list_format: MasterListFormat,
    pub cancel: CancelToken,
    pub on_display_message: Option<DisplayHook>,
}

impl ReadConfig {
    pub fn new(mrz_key: impl Into<String>) -> Self {
        Self {
            mrz_key: mrz_key.into(),
            data_groups: BTreeSet::new(),
            skip_secure_elements: true,
            skip_chip_authentication: false,
            skip_pace: false,
            data_amount_override: None,
            master_list: None,
            master_list_format: MasterListFormat::CmsSignedList,
            cancel: CancelToken::new(),
            on_display_message: None,
        }
    }
}

/// Read a document. See the module docs for the sequence.
pub fn read_document(transport: Box<dyn Transport>, config: ReadConfig) -> Result<DocumentResult> {
    read_document_with_rng(transport, config, &mut rand::thread_rng())
}

/// [`read_document`] with injected randomness, for reproducible runs.
pub fn read_document_with_rng(
    transport: Box<dyn Transport>,
    config: ReadConfig,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<DocumentResult> {
    let display: SharedDisplay = Arc::new(Mutex::new(None));
    let mut session = ReadSession {
        reader: TagReader::new(transport),
        mrz_key: config.mrz_key,
        requested: config.data_groups,
        skip_secure_elements: config.skip_secure_elements,
        skip_chip_authentication: config.skip_chip_authentication,
        skip_pace: config.skip_pace,
        master_list: config.master_list,
        master_list_format: config.master_list_format,
        display: display.clone(),
        result: DocumentResult::default(),
    };
    *display.lock().unwrap() = config.on_display_message;
    session.reader.set_cancel_token(config.cancel);
    if let Some(amount) = config.data_amount_override {
        session.reader.set_chunk_size(amount);
    }

    match session.run(rng) {
        Ok(()) => {
            let message = session.display_text(DisplayMessage::SuccessfulRead);
            session.reader.invalidate(Some(&message));
            Ok(session.result)
        }
        Err(err) => {
            // Report once: through the display hook and the returned
            // error. Invalidation is idempotent, so the transport's own
            // cancellation echo stays suppressed.
            let message =
                session.display_text(DisplayMessage::Error(err.user_message()));
            session.reader.invalidate(Some(&message));
            Err(err)
        }
    }
}

struct ReadSession {
    reader: TagReader,
    mrz_key: String,
    requested: BTreeSet<DataGroupId>,
    skip_secure_elements: bool,
    skip_chip_authentication: bool,
    skip_pace: bool,
    master_list: Option<Vec<u8>>,
    master_list_format: MasterListFormat,
    display: SharedDisplay,
    result: DocumentResult,
}

/// What the per-data-group retry policy decides from an error.
enum RetryAction {
    /// Session over; propagate.
    Fatal,
    /// SM channel presumed corrupted; BAC again, then retry.
    RestoreChannel,
    /// Chip refuses the file; drop it and restore the channel.
    DropDataGroup,
    /// Le negotiation trouble; shrink the chunk and retry.
    ShrinkChunk,
    /// Anything else gets one verbatim retry.
    Retry,
}

impl ReadSession {
    fn run(&mut self, rng: &mut (impl CryptoRng + RngCore)) -> Result<()> {
        self.emit(DisplayMessage::RequestPresent);
        self.reader.connect()?;

        // EF.CardAccess is free to read before any access control and
        // gates PACE.
        self.read_card_access();
        self.establish_access_control(rng)?;

        // EF.COM and EF.SOD come first, always.
        let com = self.read_required(DataGroupId::Com)?;
        let announced = match &com.content {
            DataGroupContent::Com(ef_com) => ef_com.data_groups(),
            _ => Vec::new(),
        };
        self.result.data_groups.insert(DataGroupId::Com, com);

        let sod = self.read_required(DataGroupId::Sod)?;
        if let DataGroupContent::SecurityObject(ef_sod) = &sod.content {
            self.result.document_signing_certificate = ef_sod.document_signer_certificate();
        }
        self.result.data_groups.insert(DataGroupId::Sod, sod);

        // The caller's explicit list wins over EF.COM, except COM/SOD
        // which were just read.
        let mut to_read: BTreeSet<DataGroupId> = if self.requested.is_empty() {
            announced.into_iter().collect()
        } else {
            self.requested
                .iter()
                .copied()
                .filter(|dg| !matches!(dg, DataGroupId::Com | DataGroupId::Sod))
                .collect()
        };
        if self.skip_secure_elements {
            to_read.remove(&DataGroupId::Dg3);
            to_read.remove(&DataGroupId::Dg4);
        }
        debug!(?to_read, "effective data group list");

        // Chip Authentication first: it replaces the session keys that
        // protect every later read.
        if !self.skip_chip_authentication && to_read.remove(&DataGroupId::Dg14) {
            self.read_data_group_with_retry(DataGroupId::Dg14, &mut to_read, rng)?;
            self.run_chip_authentication(rng)?;
        }

        let order: Vec<DataGroupId> = to_read.iter().copied().collect();
        for dg in order {
            self.read_data_group_with_retry(dg, &mut to_read, rng)?;
        }

        self.run_active_authentication(rng)?;
        self.run_passive_authentication();
        Ok(())
    }

    fn read_card_access(&mut self) {
        match self.reader.read_card_access() {
            Ok(raw) => match EfCardAccess::from_der(&raw) {
                Ok(infos) => {
                    info!(count = infos.len(), "EF.CardAccess read");
                    self.result.card_access = Some(infos);
                }
                Err(err) => {
                    warn!(%err, "EF.CardAccess undecodable, PACE unavailable");
                }
            },
            Err(err) => {
                debug!(%err, "no EF.CardAccess, PACE unavailable");
            }
        }
    }

    /// PACE when possible, BAC otherwise. PACE and BAC are mutually
    /// exclusive predecessors of secure messaging.
    fn establish_access_control(&mut self, rng: &mut (impl CryptoRng + RngCore)) -> Result<()> {
        self.emit(DisplayMessage::Authenticating(0));

        if !self.skip_pace {
            if let Some(card_access) = self.result.card_access.clone() {
                match pace::establish(&mut self.reader, rng, &self.mrz_key, &card_access) {
                    Ok(outcome) => {
                        self.result.pace_status = AuthStatus::Success;
                        debug!(mapping = ?outcome.mapping, "PACE succeeded");
                        self.emit(DisplayMessage::Authenticating(100));
                        // The application is selected under the fresh
                        // session keys.
                        self.reader.select_application(EMRTD_LDS1_AID)?;
                        return Ok(());
                    }
                    Err(err @ (Error::UserCanceled | Error::Timeout)) => return Err(err),
                    Err(err) => {
                        warn!(%err, "PACE failed, downgrading to BAC");
                        self.result.pace_status = AuthStatus::Failed;
                        self.reader.reset_secure_messaging();
                    }
                }
            }
        }

        self.emit(DisplayMessage::Authenticating(50));
        self.reader.select_application(EMRTD_LDS1_AID)?;
        match bac::establish(&mut self.reader, rng, &self.mrz_key) {
            Ok(()) => {
                self.result.bac_status = AuthStatus::Success;
                self.emit(DisplayMessage::Authenticating(100));
                Ok(())
            }
            Err(err) => {
                self.result.bac_status = AuthStatus::Failed;
                // An MRZ mismatch stays an MRZ mismatch; everything
                // else means the chip went away.
                Err(match err {
                    Error::InvalidMrzKey => Error::InvalidMrzKey,
                    Error::UserCanceled => Error::UserCanceled,
                    Error::Timeout => Error::Timeout,
                    _ => Error::ConnectionError,
                })
            }
        }
    }

    /// Read a file that the session cannot proceed without.
    fn read_required(&mut self, dg: DataGroupId) -> Result<DataGroup> {
        self.set_read_progress(dg);
        let raw = self.reader.read_data_group(dg)?;
        DataGroup::parse(dg, raw).map_err(Error::Unexpected)
    }

    /// The per-data-group policy: at most two read attempts and one
    /// BAC re-establishment; classification decides what a failure
    /// means. A failing optional group is abandoned, an explicitly
    /// requested one aborts the session.
    fn read_data_group_with_retry(
        &mut self,
        dg: DataGroupId,
        to_read: &mut BTreeSet<DataGroupId>,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<()> {
        let explicit = self.requested.contains(&dg);
        let mut attempts = 0;
        let mut bac_reruns = 0;

        loop {
            self.set_read_progress(dg);
            attempts += 1;
            let err = match self.reader.read_data_group(dg) {
                Ok(raw) => {
                    self.store_data_group(dg, raw);
                    return Ok(());
                }
                Err(err) => err,
            };

            match self.classify(&err) {
                RetryAction::Fatal => return Err(err),
                RetryAction::DropDataGroup => {
                    info!(%dg, %err, "access denied, dropping data group");
                    to_read.remove(&dg);
                    self.result
                        .verification_errors
                        .push(format!("{dg}: {err}"));
                    // The refusal may have burned the session; restore
                    // it for the remaining files.
                    self.re_establish_bac(rng)?;
                    return Ok(());
                }
                RetryAction::RestoreChannel if bac_reruns == 0 && attempts < 2 => {
                    warn!(%dg, %err, "secure messaging lost, re-running BAC");
                    bac_reruns += 1;
                    self.re_establish_bac(rng)?;
                }
                RetryAction::ShrinkChunk if attempts < 2 => {
                    self.reader.reduce_chunk_size();
                }
                RetryAction::Retry if attempts < 2 => {
                    debug!(%dg, %err, "retrying read");
                }
                _ => {
                    // Two attempts exhausted.
                    if explicit {
                        return Err(err);
                    }
                    warn!(%dg, %err, "abandoning data group");
                    self.result
                        .verification_errors
                        .push(format!("{dg}: {err}"));
                    return Ok(());
                }
            }
        }
    }

    fn classify(&self, err: &Error) -> RetryAction {
        match err {
            Error::UserCanceled | Error::Timeout => RetryAction::Fatal,
            Error::SmError | Error::ConnectionError => RetryAction::RestoreChannel,
            Error::ResponseError { .. } => match err.status_word() {
                Some(StatusWord::SM_OBJECTS_INCORRECT)
                | Some(StatusWord::SM_OBJECTS_MISSING)
                | Some(StatusWord::CLASS_NOT_SUPPORTED) => RetryAction::RestoreChannel,
                Some(StatusWord::SECURITY_STATUS_NOT_SATISFIED)
                | Some(StatusWord::FILE_NOT_FOUND) => RetryAction::DropDataGroup,
                Some(sw) if sw == StatusWord::WRONG_LENGTH || sw.wrong_le().is_some() => {
                    RetryAction::ShrinkChunk
                }
                _ => RetryAction::Retry,
            },
            _ => RetryAction::Retry,
        }
    }

    fn store_data_group(&mut self, dg: DataGroupId, raw: Vec<u8>) {
        match DataGroup::parse(dg, raw.clone()) {
            Ok(parsed) => {
                self.result.data_groups.insert(dg, parsed);
            }
            Err(err) => {
                // Keep the raw bytes so Passive Authentication can
                // still check them.
                warn!(%dg, %err, "data group undecodable");
                self.result
                    .verification_errors
                    .push(format!("{dg} undecodable: {err}"));
                self.result.data_groups.insert(
                    dg,
                    DataGroup {
                        id: dg,
                        raw,
                        content: DataGroupContent::Opaque,
                    },
                );
            }
        }
    }

    fn re_establish_bac(&mut self, rng: &mut (impl CryptoRng + RngCore)) -> Result<()> {
        self.reader.reset_secure_messaging();
        self.reader.select_application(EMRTD_LDS1_AID)?;
        bac::establish(&mut self.reader, rng, &self.mrz_key).map_err(|err| match err {
            Error::InvalidMrzKey => Error::InvalidMrzKey,
            Error::UserCanceled => Error::UserCanceled,
            Error::Timeout => Error::Timeout,
            _ => Error::ConnectionError,
        })?;
        self.result.bac_status = AuthStatus::Success;
        Ok(())
    }

    fn run_chip_authentication(&mut self, rng: &mut (impl CryptoRng + RngCore)) -> Result<()> {
        let Some(dg14) = self.result.data_groups.get(&DataGroupId::Dg14) else {
            return Ok(());
        };
        let DataGroupContent::SecurityInfos(infos) = dg14.content.clone() else {
            self.result.chip_authentication_status = AuthStatus::Failed;
            return Ok(());
        };

        match chip_authentication::establish(&mut self.reader, rng, &infos) {
            Ok(_) => {
                self.result.chip_authentication_status = AuthStatus::Success;
                Ok(())
            }
            Err(err @ (Error::UserCanceled | Error::Timeout)) => Err(err),
            Err(err) => {
                // The failed attempt leaves the old session suspect;
                // continue under fresh BAC keys without CA.
                warn!(%err, "chip authentication failed, continuing after BAC");
                self.result.chip_authentication_status = AuthStatus::Failed;
                self.re_establish_bac(rng)
            }
        }
    }

    fn run_active_authentication(&mut self, rng: &mut (impl CryptoRng + RngCore)) -> Result<()> {
        let Some(dg15) = self.result.data_groups.get(&DataGroupId::Dg15) else {
            return Ok(());
        };
        let DataGroupContent::ActiveAuthenticationPublicKey(public_key) = dg15.content.clone()
        else {
            self.result.active_authentication_status = AuthStatus::Failed;
            return Ok(());
        };
        let dg14_infos = self
            .result
            .data_groups
            .get(&DataGroupId::Dg14)
            .and_then(|dg| match &dg.content {
                DataGroupContent::SecurityInfos(infos) => Some(infos.clone()),
                _ => None,
            });

        match active_authentication::verify(
            &mut self.reader,
            rng,
            &public_key,
            dg14_infos.as_ref(),
        ) {
            Ok(()) => self.result.active_authentication_status = AuthStatus::Success,
            Err(err @ (Error::UserCanceled | Error::Timeout)) => return Err(err),
            Err(err) => {
                warn!(%err, "active authentication failed");
                self.result.active_authentication_status = AuthStatus::Failed;
                self.result
                    .verification_errors
                    .push(format!("active authentication: {err}"));
            }
        }
        Ok(())
    }

    fn run_passive_authentication(&mut self) {
        let Some(sod_dg) = self.result.data_groups.get(&DataGroupId::Sod) else {
            self.result.passive_authentication_status = AuthStatus::Failed;
            return;
        };
        let DataGroupContent::SecurityObject(sod) = &sod_dg.content else {
            self.result.passive_authentication_status = AuthStatus::Failed;
            self.result
                .verification_errors
                .push("EF.SOD undecodable".to_owned());
            return;
        };

        let master_list = self
            .master_list
            .as_deref()
            .map(|blob| (blob, self.master_list_format));
        match passive_authentication::verify(sod, &self.result.data_groups, master_list) {
            Ok(report) => {
                self.result.passive_authentication_status = if report.passed() {
                    AuthStatus::Success
                } else {
                    AuthStatus::Failed
                };
                self.result.verification_errors.extend(report.errors);
            }
            Err(err) => {
                self.result.passive_authentication_status = AuthStatus::Failed;
                self.result.verification_errors.push(err.to_string());
            }
        }
    }

    /// Route the reader's file progress into ReadingDataGroup messages.
    fn set_read_progress(&mut self, dg: DataGroupId) {
        let display = self.display.clone();
        self.reader.progress = Some(Box::new(move |pct| {
            if let Some(hook) = display.lock().unwrap().as_mut() {
                hook(&DisplayMessage::ReadingDataGroup(dg, pct));
            }
        }));
    }

    fn emit(&mut self, message: DisplayMessage) {
        if let Some(hook) = self.display.lock().unwrap().as_mut() {
            hook(&message);
        }
    }

    /// Render a message, letting the host override the text.
    fn display_text(&mut self, message: DisplayMessage) -> String {
        if let Some(hook) = self.display.lock().unwrap().as_mut() {
            if let Some(text) = hook(&message) {
                return text;
            }
        }
        message.default_text()
    }
}
