//! Card doubles for the protocol tests.
//!
//! `MockCard` emulates the chip side of a BAC document: it answers
//! SELECT/READ BINARY, runs the card half of the Appendix D handshake
//! and speaks 3DES secure messaging, so whole sessions can run against
//! it in-process.

#![allow(dead_code)]

use {
    emrtd_reader::{
        crypto::{
            pad, seed_from_mrz,
            tdes::{dec_3des, derive_key, enc_3des, mac_3des},
            unpad, KDF_ENC, KDF_MAC,
        },
        iso7816::parse_apdu,
        lds::{tlv, DataGroupId},
        secure_messaging::{SmCipher, TdesCipher},
        transport::{Transport, TransportError},
    },
    std::collections::{BTreeMap, BTreeSet},
};

pub const MRZ_KEY: &str = "L898902C<369080619406236";

/// Chip-side 3DES secure messaging state.
struct CardSm {
    cipher: TdesCipher,
    ssc: u128,
}

impl CardSm {
    fn ssc_bytes(&self) -> Vec<u8> {
        self.ssc.to_be_bytes()[8..].to_vec()
    }

    /// Unwrap a protected command; returns the plain APDU.
    fn unwrap_command(&mut self, apdu: &[u8]) -> Result<Vec<u8>, u16> {
        self.ssc = self.ssc.wrapping_add(1);
        let parsed = parse_apdu(apdu).map_err(|_| 0x6700u16)?;

        let mut cryptogram = None;
        let mut le = None;
        let mut mac = None;
        let mut macced = Vec::new();
        let mut rest = parsed.data;
        while !rest.is_empty() {
            let (obj, next) = tlv::read_tlv(rest).map_err(|_| 0x6988u16)?;
            match obj.tag {
                0x87 => {
                    if obj.value.first() != Some(&0x01) {
                        return Err(0x6988);
                    }
                    cryptogram = Some(obj.value[1..].to_vec());
                }
                0x97 => le = Some(obj.value.to_vec()),
                0x8E => mac = Some(obj.value.to_vec()),
                _ => return Err(0x6988),
            }
            if obj.tag != 0x8E {
                macced.extend_from_slice(&rest[..rest.len() - next.len()]);
            }
            rest = next;
        }
        let mac = mac.ok_or(0x6987u16)?;

        let mut input = self.ssc_bytes();
        input.extend_from_slice(parsed.header);
        pad(&mut input, 8);
        input.extend_from_slice(&macced);
        pad(&mut input, 8);
        if self.cipher.mac(&input)[..] != mac[..] {
            return Err(0x6988);
        }

        // Rebuild the plain command.
        let mut plain = parsed.header.to_vec();
        plain[0] &= !0x0C;
        if let Some(mut data) = cryptogram {
            self.cipher.dec(self.ssc, &mut data);
            unpad(&mut data).ok_or(0x6988u16)?;
            plain.push(data.len() as u8);
            plain.extend_from_slice(&data);
        }
        if let Some(le) = le {
            plain.extend_from_slice(&le);
        }
        Ok(plain)
    }

    /// Wrap a response body and status.
    fn wrap_response(&mut self, data: &[u8], sw: u16) -> Vec<u8> {
        self.ssc = self.ssc.wrapping_add(1);
        let mut body = Vec::new();
        if !data.is_empty() {
            let mut cryptogram = data.to_vec();
            pad(&mut cryptogram, 8);
            self.cipher.enc(self.ssc, &mut cryptogram);
            body.push(0x87);
            if cryptogram.len() + 1 > 0x7F {
                body.push(0x81);
            }
            body.push((cryptogram.len() + 1) as u8);
            body.push(0x01);
            body.extend_from_slice(&cryptogram);
        }
        body.extend_from_slice(&[0x99, 0x02, (sw >> 8) as u8, (sw & 0xFF) as u8]);

        let mut input = self.ssc_bytes();
        input.extend_from_slice(&body);
        pad(&mut input, 8);
        let mac = self.cipher.mac(&input);
        body.push(0x8E);
        body.push(0x08);
        body.extend_from_slice(&mac);

        body.push((sw >> 8) as u8);
        body.push((sw & 0xFF) as u8);
        body
    }
}

/// An in-memory BAC document.
pub struct MockCard {
    pub mrz_key: String,
    /// File contents by short EF identifier.
    pub files: BTreeMap<u8, Vec<u8>>,
    /// Files answered with 0x6982 instead of data.
    pub deny: BTreeSet<u8>,
    /// Drop the tag after this many exchanges.
    pub fail_after: Option<usize>,
    sm: Option<CardSm>,
    selected: Option<u8>,
    rnd_ic: [u8; 8],
    challenge_outstanding: bool,
    pub exchanges: usize,
    pub bac_runs: usize,
    pub invalidations: usize,
}

impl MockCard {
    pub fn new(mrz_key: &str) -> Self {
        Self {
            mrz_key: mrz_key.to_owned(),
            files: BTreeMap::new(),
            deny: BTreeSet::new(),
            fail_after: None,
            sm: None,
            selected: None,
            rnd_ic: [0x46, 0x08, 0xF9, 0x19, 0x88, 0x70, 0x22, 0x12],
            challenge_outstanding: false,
            exchanges: 0,
            bac_runs: 0,
            invalidations: 0,
        }
    }

    pub fn with_file(mut self, dg: DataGroupId, content: Vec<u8>) -> Self {
        self.files.insert(dg.short_id(), content);
        self
    }

    fn respond(&mut self, data: Vec<u8>, sw: u16, secured: bool) -> Vec<u8> {
        if secured {
            if let Some(sm) = self.sm.as_mut() {
                return sm.wrap_response(&data, sw);
            }
        }
        let mut out = data;
        out.push((sw >> 8) as u8);
        out.push((sw & 0xFF) as u8);
        out
    }

    fn process(&mut self, apdu: &[u8], secured: bool) -> Vec<u8> {
        let parsed = match parse_apdu(apdu) {
            Ok(parsed) => parsed,
            Err(_) => return self.respond(Vec::new(), 0x6700, secured),
        };
        match parsed.ins() {
            // SELECT
            0xA4 => match parsed.p1() {
                0x00 | 0x04 => self.respond(Vec::new(), 0x9000, secured),
                0x02 => {
                    if parsed.data.len() == 2 {
                        self.selected = Some(parsed.data[1]);
                        self.respond(Vec::new(), 0x9000, secured)
                    } else {
                        self.respond(Vec::new(), 0x6A86, secured)
                    }
                }
                _ => self.respond(Vec::new(), 0x6A86, secured),
            },
            // GET CHALLENGE
            0x84 => {
                self.challenge_outstanding = true;
                self.respond(self.rnd_ic.to_vec(), 0x9000, secured)
            }
            // EXTERNAL AUTHENTICATE: the card half of BAC.
            0x82 => self.external_authenticate(parsed.data, secured),
            // READ BINARY
            0xB0 => {
                let (short_id, offset) = if parsed.p1() & 0x80 != 0 {
                    (Some(parsed.p1() & 0x1F), 0usize)
                } else {
                    (
                        self.selected,
                        ((parsed.p1() as usize) << 8) | parsed.p2() as usize,
                    )
                };
                let Some(short_id) = short_id else {
                    return self.respond(Vec::new(), 0x6986, secured);
                };
                if self.deny.contains(&short_id) {
                    return self.respond(Vec::new(), 0x6982, secured);
                }
                let Some(file) = self.files.get(&short_id).cloned() else {
                    return self.respond(Vec::new(), 0x6A82, secured);
                };
                self.selected = Some(short_id);
                if offset >= file.len() {
                    return self.respond(Vec::new(), 0x6B00, secured);
                }
                let le = match parsed.le.first() {
                    Some(&0x00) | None => 0x100,
                    Some(&n) => n as usize,
                };
                let end = file.len().min(offset + le);
                let chunk = file[offset..end].to_vec();
                let sw = if end - offset < le && end == file.len() {
                    // Short read ran into the end of file.
                    0x6282
                } else {
                    0x9000
                };
                self.respond(chunk, sw, secured)
            }
            _ => self.respond(Vec::new(), 0x6D00, secured),
        }
    }

    fn external_authenticate(&mut self, data: &[u8], secured: bool) -> Vec<u8> {
        if !std::mem::take(&mut self.challenge_outstanding) || data.len() != 40 {
            return self.respond(Vec::new(), 0x6985, secured);
        }
        let seed = seed_from_mrz(&self.mrz_key);
        let kenc = derive_key(&seed[..], KDF_ENC);
        let kmac = derive_key(&seed[..], KDF_MAC);

        let mac = mac_3des(&kmac, &data[..32]);
        if mac[..] != data[32..] {
            return self.respond(Vec::new(), 0x6300, secured);
        }
        let mut plain = data[..32].to_vec();
        dec_3des(&kenc, &mut plain);
        if plain[8..16] != self.rnd_ic {
            return self.respond(Vec::new(), 0x6300, secured);
        }
        let rnd_ifd: [u8; 8] = plain[0..8].try_into().unwrap();
        let k_ifd: [u8; 16] = plain[16..32].try_into().unwrap();
        let k_ic = [0xA5u8; 16];

        // R = RND.IC || RND.IFD || KIC
        let mut resp = Vec::with_capacity(40);
        resp.extend_from_slice(&self.rnd_ic);
        resp.extend_from_slice(&rnd_ifd);
        resp.extend_from_slice(&k_ic);
        enc_3des(&kenc, &mut resp);
        let mac = mac_3des(&kmac, &resp);
        resp.extend_from_slice(&mac);

        let mut session_seed = [0u8; 16];
        for i in 0..16 {
            session_seed[i] = k_ifd[i] ^ k_ic[i];
        }
        let mut ssc = [0u8; 8];
        ssc[..4].copy_from_slice(&self.rnd_ic[4..]);
        ssc[4..].copy_from_slice(&rnd_ifd[4..]);
        self.sm = Some(CardSm {
            cipher: TdesCipher::from_seed(&session_seed),
            ssc: u64::from_be_bytes(ssc) as u128,
        });
        self.bac_runs += 1;

        // The response to EXTERNAL AUTHENTICATE itself is sent plain.
        self.respond(resp, 0x9000, false)
    }
}

impl Transport for MockCard {
    fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn transceive(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.exchanges += 1;
        if let Some(limit) = self.fail_after {
            if self.exchanges > limit {
                return Err(TransportError::TagLost);
            }
        }

        let secured = apdu[0] & 0x0C == 0x0C;
        if secured {
            let plain = {
                let Some(sm) = self.sm.as_mut() else {
                    return Ok(vec![0x69, 0x88]);
                };
                match sm.unwrap_command(apdu) {
                    Ok(plain) => plain,
                    Err(sw) => {
                        // SM failure drops the chip session.
                        self.sm = None;
                        return Ok(sw.to_be_bytes().to_vec());
                    }
                }
            };
            Ok(self.process(&plain, true))
        } else {
            // A plain command while a session is up ends the session.
            self.sm = None;
            Ok(self.process(apdu, false))
        }
    }

    fn invalidate(&mut self, _message: Option<&str>) {
        self.invalidations += 1;
    }
}

/// Build an EF.COM announcing the given data groups.
pub fn build_com(groups: &[DataGroupId]) -> Vec<u8> {
    let mut inner = Vec::new();
    inner.extend_from_slice(&[0x5F, 0x01, 0x04]);
    inner.extend_from_slice(b"0107");
    inner.extend_from_slice(&[0x5F, 0x36, 0x06]);
    inner.extend_from_slice(b"040000");
    inner.push(0x5C);
    inner.push(groups.len() as u8);
    inner.extend(groups.iter().map(|dg| dg.tag()));
    let mut out = vec![0x60, inner.len() as u8];
    out.extend_from_slice(&inner);
    out
}

/// Build a DG1 around a TD3 MRZ.
pub fn build_dg1(mrz: &str) -> Vec<u8> {
    let mut inner = vec![0x5F, 0x1F, mrz.len() as u8];
    inner.extend_from_slice(mrz.as_bytes());
    let mut out = vec![0x61, inner.len() as u8];
    out.extend_from_slice(&inner);
    out
}

/// Build a DG11 with a full name.
pub fn build_dg11(name: &str) -> Vec<u8> {
    let mut inner = vec![0x5C, 0x02, 0x5F, 0x0E];
    inner.extend_from_slice(&[0x5F, 0x0E, name.len() as u8]);
    inner.extend_from_slice(name.as_bytes());
    let mut out = vec![0x6B, inner.len() as u8];
    out.extend_from_slice(&inner);
    out
}

pub const TD3_MRZ: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\
                           L898902C36UTO7408122F1204159ZE184226B<<<<<10";

/// An unsigned EF.SOD whose hash table covers `entries`.
///
/// The CMS shell is structurally complete but carries no signer, which
/// is enough for hash verification tests.
pub fn build_sod(entries: &[(u64, Vec<u8>)]) -> Vec<u8> {
    use {
        cms::{
            content_info::{CmsVersion, ContentInfo as CmsContentInfo},
            signed_data::{EncapsulatedContentInfo, SignedData, SignerInfos},
        },
        der::{
            asn1::{ObjectIdentifier as Oid, OctetString, SetOfVec},
            Any, Encode,
        },
        emrtd_reader::asn1::{
            DataGroupHash, DigestAlgorithmIdentifier, LdsSecurityObject,
        },
        sha2::{Digest, Sha256},
    };

    let lso = LdsSecurityObject {
        version: 0,
        hash_algorithm: DigestAlgorithmIdentifier {
            algorithm: Oid::new_unwrap("2.16.840.1.101.3.4.2.1"),
            parameters: None,
        },
        data_group_hash_values: entries
            .iter()
            .map(|(number, raw)| DataGroupHash {
                data_group_number: *number,
                hash_value: OctetString::new(Sha256::digest(raw).to_vec()).unwrap(),
            })
            .collect(),
        lds_version_info: None,
    };
    let lso_der = lso.to_der().unwrap();

    let signed_data = SignedData {
        version: CmsVersion::V3,
        digest_algorithms: SetOfVec::new(),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: Oid::new_unwrap("2.23.136.1.1.1"),
            econtent: Some(Any::encode_from(&OctetString::new(lso_der).unwrap()).unwrap()),
        },
        certificates: None,
        crls: None,
        signer_infos: SignerInfos(SetOfVec::new()),
    };

    // 77 { 30 { oid, [0] signed-data } }
    let content = CmsContentInfo {
        content_type: Oid::new_unwrap("1.2.840.113549.1.7.2"),
        content: Any::encode_from(&signed_data).unwrap(),
    };
    let content_der = content.to_der().unwrap();
    let mut out = vec![0x77];
    emrtd_ber_length(&mut out, content_der.len());
    out.extend_from_slice(&content_der);
    out
}

fn emrtd_ber_length(out: &mut Vec<u8>, len: usize) {
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
