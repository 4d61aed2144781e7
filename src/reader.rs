//! High-level file and authentication operations over a transport.

use {
    crate::{
        error::{Error, Result},
        iso7816::{split_response, StatusWord},
        lds::{tlv, DataGroupId},
        secure_messaging::{PlainText, SecureMessaging},
        transport::Transport,
    },
    std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    tracing::{debug, trace, warn},
};

/// LDS1 eMRTD application, ICAO 9303-10 table 38.
pub const EMRTD_LDS1_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x02, 0x47, 0x10, 0x01];

/// BER length in definite form.
pub(crate) fn encode_ber_length(out: &mut Vec<u8>, len: usize) {
    match len {
        0..=0x7F => out.push(len as u8),
        0x80..=0xFF => {
            out.push(0x81);
            out.push(len as u8);
        }
        _ => {
            out.push(0x82);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
    }
}

/// Default number of bytes requested per READ BINARY.
pub const DEFAULT_CHUNK_SIZE: usize = 0xA0;

/// Cooperative cancellation flag, shared with the host.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress within a single file read, 0..=100.
pub type ProgressFn = Box<dyn FnMut(u8) + Send>;

pub struct TagReader {
    transport: Box<dyn Transport>,
    secure_messaging: Box<dyn SecureMessaging>,
    chunk_size: usize,
    cancel: CancelToken,
    /// Called from the reader only; monotonic within one file.
    pub progress: Option<ProgressFn>,
    invalidated: bool,
}

impl TagReader {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            secure_messaging: Box::new(PlainText),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel: CancelToken::new(),
            progress: None,
            invalidated: false,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect().map_err(Into::into)
    }

    pub fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    pub fn set_secure_messaging(&mut self, sm: Box<dyn SecureMessaging>) {
        self.secure_messaging = sm;
    }

    /// Drop back to plaintext, e.g. before re-running access control.
    pub fn reset_secure_messaging(&mut self) {
        self.secure_messaging = Box::new(PlainText);
    }

    pub fn is_secured(&self) -> bool {
        self.secure_messaging.is_encrypted()
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.clamp(1, 0x100);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Halve the read amount; some chips reject larger Le values.
    pub fn reduce_chunk_size(&mut self) {
        self.chunk_size = (self.chunk_size / 2).max(1);
        debug!(chunk_size = self.chunk_size, "reduced read chunk size");
    }

    /// Invalidate the transport session. Idempotent; the second call is
    /// swallowed so the transport's own cancellation echo is not
    /// re-reported.
    pub fn invalidate(&mut self, message: Option<&str>) {
        if self.invalidated {
            return;
        }
        self.invalidated = true;
        self.transport.invalidate(message);
    }

    /// Exchange one APDU through secure messaging.
    pub fn send_apdu(&mut self, apdu: &[u8]) -> Result<(StatusWord, Vec<u8>)> {
        if self.cancel.is_canceled() {
            return Err(Error::UserCanceled);
        }

        let protected = self.secure_messaging.enc_apdu(apdu)?;
        trace!(apdu = %hex::encode(&protected), "transceive");
        let raw = self.transport.transceive(&protected)?;
        let (body, status) = split_response(&raw).map_err(Error::Unexpected)?;
        trace!(response = %hex::encode(&raw), "received");

        if status.is_sm_failure() {
            // The chip discards its session on SM errors and answers in
            // plain; follow it so re-establishment can proceed.
            warn!(%status, "secure messaging failure reported by chip");
            self.reset_secure_messaging();
            return Err(Error::from_status(status));
        }

        let mut data = self.secure_messaging.dec_response(status, body)?;

        // Drain any remainder the chip signals via GET RESPONSE.
        let mut status = status;
        while let Some(remaining) = status.data_remaining() {
            let (next_status, next) =
                self.send_apdu(&[0x00, 0xC0, 0x00, 0x00, remaining as u8])?;
            data.extend_from_slice(&next);
            status = next_status;
        }

        trace!(%status, len = data.len(), "APDU exchanged");
        Ok((status, data))
    }

    fn expect_success(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        let (status, data) = self.send_apdu(apdu)?;
        if !status.is_success() {
            return Err(Error::from_status(status));
        }
        Ok(data)
    }

    /// SELECT the master file. ISO 7816-4 section 11.2.2.
    pub fn select_master_file(&mut self) -> Result<()> {
        self.expect_success(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x3F, 0x00])?;
        Ok(())
    }

    /// SELECT an application by AID.
    pub fn select_application(&mut self, aid: &[u8]) -> Result<()> {
        let mut apdu = vec![0x00, 0xA4, 0x04, 0x0C, aid.len() as u8];
        apdu.extend_from_slice(aid);
        self.expect_success(&apdu)?;
        Ok(())
    }

    /// SELECT an elementary file under the current DF.
    pub fn select_elementary_file(&mut self, fid: u16) -> Result<()> {
        let fid = fid.to_be_bytes();
        self.expect_success(&[0x00, 0xA4, 0x02, 0x0C, 0x02, fid[0], fid[1]])?;
        Ok(())
    }

    /// GET CHALLENGE, ICAO 9303-11 section 4.3.4.1.
    pub fn get_challenge(&mut self) -> Result<[u8; 8]> {
        let data = self.expect_success(&[0x00, 0x84, 0x00, 0x00, 0x08])?;
        data.as_slice()
            .try_into()
            .map_err(|_| Error::Unexpected(anyhow::anyhow!("challenge is not 8 bytes")))
    }

    /// EXTERNAL AUTHENTICATE with the BAC cryptogram.
    pub fn external_authenticate(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut apdu = vec![0x00, 0x82, 0x00, 0x00, data.len() as u8];
        apdu.extend_from_slice(data);
        apdu.push(data.len() as u8);
        self.expect_success(&apdu)
    }

    /// INTERNAL AUTHENTICATE with an Active Authentication challenge.
    pub fn internal_authenticate(&mut self, challenge: &[u8; 8]) -> Result<Vec<u8>> {
        let mut apdu = vec![0x00, 0x88, 0x00, 0x00, 0x08];
        apdu.extend_from_slice(challenge);
        apdu.push(0x00);
        self.expect_success(&apdu)
    }

    /// MSE:SET AT selecting a PACE protocol. The password reference is
    /// always the MRZ (0x01).
    pub fn mse_set_at_pace(&mut self, oid: der::asn1::ObjectIdentifier, parameter_id: Option<u64>) -> Result<()> {
        let mut data = Vec::new();
        data.push(0x80);
        data.push(oid.as_bytes().len() as u8);
        data.extend_from_slice(oid.as_bytes());
        data.extend_from_slice(&[0x83, 0x01, 0x01]);
        if let Some(id) = parameter_id {
            data.push(0x84);
            data.push(0x01);
            data.push(id as u8);
        }
        let mut apdu = vec![0x00, 0x22, 0xC1, 0xA4, data.len() as u8];
        apdu.extend_from_slice(&data);
        self.expect_success(&apdu)?;
        Ok(())
    }

    /// MSE:SET AT selecting a Chip Authentication protocol.
    pub fn mse_set_at_ca(&mut self, oid: der::asn1::ObjectIdentifier, key_id: Option<u64>) -> Result<()> {
        let mut data = Vec::new();
        data.push(0x80);
        data.push(oid.as_bytes().len() as u8);
        data.extend_from_slice(oid.as_bytes());
        if let Some(id) = key_id {
            data.push(0x84);
            data.push(0x01);
            data.push(id as u8);
        }
        let mut apdu = vec![0x00, 0x22, 0x41, 0xA4, data.len() as u8];
        apdu.extend_from_slice(&data);
        self.expect_success(&apdu)?;
        Ok(())
    }

    /// GENERAL AUTHENTICATE carrying dynamic authentication data.
    ///
    /// `inner` is the content of the 0x7C template; the reply's 0x7C
    /// content is returned. Chained commands use CLA 0x10 until the
    /// final step.
    pub fn general_authenticate(&mut self, inner: &[u8], last: bool) -> Result<Vec<u8>> {
        let mut template = vec![0x7C];
        encode_ber_length(&mut template, inner.len());
        template.extend_from_slice(inner);

        let cla = if last { 0x00 } else { 0x10 };
        let mut apdu = vec![cla, 0x86, 0x00, 0x00];
        if template.len() <= 0xFF {
            apdu.push(template.len() as u8);
            apdu.extend_from_slice(&template);
            apdu.push(0x00);
        } else {
            apdu.push(0x00);
            apdu.extend_from_slice(&(template.len() as u16).to_be_bytes());
            apdu.extend_from_slice(&template);
            apdu.extend_from_slice(&[0x00, 0x00]);
        }
        let data = self.expect_success(&apdu)?;
        if data.is_empty() {
            // Chip Authentication ends with a bare status word.
            return Ok(Vec::new());
        }
        let tlv = tlv::expect_tag(&data, 0x7C).map_err(Error::Unexpected)?;
        Ok(tlv.value.to_vec())
    }

    /// Read a data group file in the currently selected application.
    pub fn read_data_group(&mut self, dg: DataGroupId) -> Result<Vec<u8>> {
        self.read_binary(dg.short_id())
    }

    /// Read EF.CardAccess from the master file. Runs in the clear.
    pub fn read_card_access(&mut self) -> Result<Vec<u8>> {
        self.select_master_file()?;
        self.read_binary(0x1C)
    }

    /// Read a whole elementary file by short identifier.
    ///
    /// The first chunk is read with short-EF addressing, the outer TLV
    /// header determines the total, and the remainder arrives through
    /// offset READ BINARY commands. `0x6Cxx` is retried once with the
    /// suggested length; a repeat (or `0x6700`) halves the chunk size.
    pub fn read_binary(&mut self, short_id: u8) -> Result<Vec<u8>> {
        if short_id > 0x1F {
            return Err(Error::Unexpected(anyhow::anyhow!(
                "short file id out of range"
            )));
        }
        self.report_progress(0, 0, 1);

        // First read addresses the file by short EF id.
        let mut data = self.read_chunk(0x80 | short_id, 0x00, self.chunk_size)?;

        let total = loop {
            match tlv::peek_total_len(&data).map_err(Error::Unexpected)? {
                Some(total) => break total,
                None => {
                    // Not even the header arrived; fetch more.
                    let chunk = self.read_offset_chunk(data.len())?;
                    if chunk.is_empty() {
                        return Err(Error::Unexpected(anyhow::anyhow!(
                            "file shorter than its TLV header"
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }
            }
        };

        let mut last_pct = 0;
        while data.len() < total {
            let chunk = self.read_offset_chunk(data.len())?;
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
            last_pct = self.report_progress(last_pct, data.len().min(total), total);
        }

        // Some chips zero-extend offset reads past the end of file; trim
        // to the declared length.
        if data.len() < total {
            return Err(Error::Unexpected(anyhow::anyhow!(
                "file truncated: expected {total}, read {}",
                data.len()
            )));
        }
        data.truncate(total);
        self.report_progress(last_pct, total, total);
        Ok(data)
    }

    fn read_offset_chunk(&mut self, offset: usize) -> Result<Vec<u8>> {
        if offset >= 1 << 15 {
            return Err(Error::Unexpected(anyhow::anyhow!("file offset too large")));
        }
        let offset = (offset as u16).to_be_bytes();
        self.read_chunk(offset[0], offset[1], self.chunk_size)
    }

    /// One READ BINARY with the `0x6Cxx`/`0x6700` retry policy.
    fn read_chunk(&mut self, p1: u8, p2: u8, le: usize) -> Result<Vec<u8>> {
        let mut le = le.min(0x100);
        let mut wrong_le_retries = 0;
        loop {
            let apdu = [0x00, 0xB0, p1, p2, (le & 0xFF) as u8];
            let (status, data) = self.send_apdu(&apdu)?;

            if status.is_success() || status.is_end_of_file() {
                return Ok(data);
            }
            if let Some(suggested) = status.wrong_le() {
                wrong_le_retries += 1;
                if wrong_le_retries == 1 && suggested != 0 {
                    // Use the chip's suggestion exactly once.
                    le = suggested as usize;
                    continue;
                }
                self.reduce_chunk_size();
                le = self.chunk_size;
                if wrong_le_retries <= 2 {
                    continue;
                }
                return Err(Error::from_status(status));
            }
            if status == StatusWord::WRONG_LENGTH {
                if self.chunk_size > 1 {
                    self.reduce_chunk_size();
                    le = self.chunk_size;
                    continue;
                }
                return Err(Error::from_status(status));
            }
            return Err(Error::from_status(status));
        }
    }

    fn report_progress(&mut self, last: u8, read: usize, total: usize) -> u8 {
        let pct = if total == 0 {
            0
        } else {
            ((read * 100) / total).min(100) as u8
        };
        let pct = pct.max(last);
        if let Some(progress) = self.progress.as_mut() {
            progress(pct);
        }
        pct
    }
}
