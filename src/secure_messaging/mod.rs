//! Secure Messaging, ICAO 9303-11 section 9.8.
//!
//! Commands are wrapped into DO'87 (cryptogram), DO'97 (expected length)
//! and DO'8E (MAC); responses carry DO'87, DO'99 (status echo) and
//! DO'8E. The send sequence counter is incremented once before wrapping
//! a command and once before verifying its response.

pub mod aes;
pub mod tdes;

pub use self::{
    aes::{Aes128Cipher, Aes192Cipher, Aes256Cipher},
    tdes::TdesCipher,
};
use {
    crate::{
        crypto::{pad, unpad},
        error::{Error, Result},
        iso7816::{parse_apdu, StatusWord},
    },
    anyhow::anyhow,
    std::fmt::{self, Display, Formatter},
    subtle::ConstantTimeEq,
    tracing::trace,
};

/// Wraps commands and unwraps responses for one session.
pub trait SecureMessaging: Send {
    fn enc_apdu(&mut self, apdu: &[u8]) -> Result<Vec<u8>>;

    fn dec_response(&mut self, status: StatusWord, resp: &[u8]) -> Result<Vec<u8>>;

    /// False only for the plaintext pass-through.
    fn is_encrypted(&self) -> bool;
}

/// Block cipher + MAC pair backing an SM session.
///
/// `mac` input is already padded and carries the SSC prefix.
pub trait SmCipher: Send {
    fn block_size(&self) -> usize;

    fn enc(&self, ssc: u128, data: &mut [u8]);

    fn dec(&self, ssc: u128, data: &mut [u8]);

    fn mac(&self, data: &[u8]) -> [u8; 8];
}

/// Pass-through used before any access control succeeds.
pub struct PlainText;

impl SecureMessaging for PlainText {
    fn enc_apdu(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        Ok(apdu.to_vec())
    }

    fn dec_response(&mut self, _status: StatusWord, resp: &[u8]) -> Result<Vec<u8>> {
        Ok(resp.to_vec())
    }

    fn is_encrypted(&self) -> bool {
        false
    }
}

/// An established session with keys and a send sequence counter.
pub struct Encrypted<C: SmCipher> {
    cipher: C,
    ssc: u128,
}

impl<C: SmCipher> Encrypted<C> {
    pub fn new(cipher: C, ssc: u128) -> Self {
        Self { cipher, ssc }
    }

    /// SSC encoded at the cipher's block width (8 bytes for 3DES,
    /// 16 for AES).
    fn ssc_bytes(&self) -> Vec<u8> {
        let bytes = self.ssc.to_be_bytes();
        bytes[16 - self.cipher.block_size()..].to_vec()
    }
}

impl<C: SmCipher> SecureMessaging for Encrypted<C> {
    fn enc_apdu(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        let apdu = parse_apdu(apdu).map_err(Error::Unexpected)?;
        let ins_even = apdu.ins() & 1 == 0;
        let extended_length = apdu.is_extended_length();
        let block_size = self.cipher.block_size();

        self.ssc = self.ssc.wrapping_add(1);

        // Masked header.
        let mut papdu = apdu.header.to_vec();
        papdu[0] |= 0x0C;

        // Placeholder for Lc.
        papdu.extend_from_slice(if extended_length {
            &[0x00, 0x00, 0x00]
        } else {
            &[0x00]
        });

        // DO'87: padding indicator 0x01 then the cryptogram. Odd INS
        // uses DO'85 without an indicator byte.
        if !apdu.data.is_empty() {
            let mut payload = apdu.data.to_vec();
            pad(&mut payload, block_size);
            self.cipher.enc(self.ssc, &mut payload);
            papdu.push(if ins_even { 0x87 } else { 0x85 });
            if ins_even {
                encode_do_length(&mut papdu, payload.len() + 1);
                papdu.push(0x01);
            } else {
                encode_do_length(&mut papdu, payload.len());
            }
            papdu.extend_from_slice(&payload);
        }

        // DO'97: expected response length.
        if !apdu.le.is_empty() {
            let le = match apdu.le {
                // Extended Le with absent data carries a leading zero.
                [0x00, rest @ ..] if apdu.le.len() == 3 => rest,
                le => le,
            };
            papdu.push(0x97);
            papdu.push(le.len() as u8);
            papdu.extend_from_slice(le);
        }

        // DO'8E: MAC over SSC || padded header || data objects.
        {
            let mut message = self.ssc_bytes();
            message.extend_from_slice(&papdu[..4]);
            pad(&mut message, block_size);
            if extended_length {
                message.extend_from_slice(&papdu[7..]);
            } else {
                message.extend_from_slice(&papdu[5..]);
            }
            pad(&mut message, block_size);

            let mac = self.cipher.mac(&message);
            papdu.push(0x8E);
            papdu.push(mac.len() as u8);
            papdu.extend_from_slice(&mac);
        }

        // Patch Lc now that the data objects are in place.
        if extended_length {
            let len = papdu.len() - 7;
            papdu[5] = (len >> 8) as u8;
            papdu[6] = (len & 0xFF) as u8;
        } else {
            papdu[4] = (papdu.len() - 5) as u8;
        }

        // Trailing Le.
        if extended_length {
            papdu.extend_from_slice(&[0x00, 0x00]);
        } else {
            papdu.push(0x00);
        }

        trace!(ssc = self.ssc, len = papdu.len(), "wrapped APDU");
        Ok(papdu)
    }

    fn dec_response(&mut self, status: StatusWord, resp: &[u8]) -> Result<Vec<u8>> {
        self.ssc = self.ssc.wrapping_add(1);

        if resp.len() < 14 {
            return Err(Error::SmError);
        }

        // DO'8E is last: tag, length 8, MAC.
        let (resp, mac) = resp.split_at(resp.len() - 10);
        if mac[0] != 0x8E || mac[1] != 0x08 {
            return Err(Error::SmError);
        }
        let mac = &mac[2..];

        let mut message = self.ssc_bytes();
        message.extend_from_slice(resp);
        pad(&mut message, self.cipher.block_size());
        let expected = self.cipher.mac(&message);
        if expected.ct_eq(mac).unwrap_u8() != 1 {
            trace!(ssc = self.ssc, "response MAC mismatch");
            return Err(Error::SmError);
        }

        // DO'99 echoes the status word.
        if resp.len() < 4 {
            return Err(Error::SmError);
        }
        let (resp, do99) = resp.split_at(resp.len() - 4);
        if do99 != [0x99, 0x02, status.sw1(), status.sw2()] {
            return Err(Error::SmError);
        }

        if resp.is_empty() {
            return Ok(Vec::new());
        }

        // DO'87 (or DO'85 for odd INS) holds the cryptogram.
        if resp.len() < 3 || (resp[0] != 0x85 && resp[0] != 0x87) {
            return Err(Error::SmError);
        }
        let with_indicator = resp[0] == 0x87;
        let (tl_len, length) = decode_do_length(&resp[1..]).ok_or(Error::SmError)?;
        let resp = &resp[1 + tl_len..];
        if resp.len() != length {
            return Err(Error::SmError);
        }
        let resp = if with_indicator {
            if resp.first() != Some(&0x01) {
                return Err(Error::Unexpected(anyhow!(
                    "unsupported padding indicator {:02X}",
                    resp.first().copied().unwrap_or(0)
                )));
            }
            &resp[1..]
        } else {
            resp
        };
        let mut resp = resp.to_vec();
        if resp.is_empty() || resp.len() % self.cipher.block_size() != 0 {
            return Err(Error::SmError);
        }
        self.cipher.dec(self.ssc, &mut resp);
        unpad(&mut resp).ok_or(Error::SmError)?;

        Ok(resp)
    }

    fn is_encrypted(&self) -> bool {
        true
    }
}

/// BER length for a secure messaging data object.
fn encode_do_length(out: &mut Vec<u8>, len: usize) {
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

/// Returns (length-field size, value length).
fn decode_do_length(bytes: &[u8]) -> Option<(usize, usize)> {
    match *bytes.first()? {
        len @ 0x00..=0x7F => Some((1, len as usize)),
        0x81 => Some((2, *bytes.get(1)? as usize)),
        0x82 => Some((3, u16::from_be_bytes([*bytes.get(1)?, *bytes.get(2)?]) as usize)),
        0x83 => Some((
            4,
            u32::from_be_bytes([0, *bytes.get(1)?, *bytes.get(2)?, *bytes.get(3)?]) as usize,
        )),
        _ => None,
    }
}

/// The block ciphers secure messaging can run on.
///
/// OID suffix arc 1..=4 in the PACE and Chip Authentication trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymmetricCipher {
    Tdes,
    Aes128,
    Aes192,
    Aes256,
}

impl SymmetricCipher {
    /// Build a session from a shared-secret seed.
    pub fn make_session(self, seed: &[u8], ssc: u128) -> Box<dyn SecureMessaging> {
        match self {
            Self::Tdes => Box::new(Encrypted::new(TdesCipher::from_seed(seed), ssc)),
            Self::Aes128 => Box::new(Encrypted::new(Aes128Cipher::from_seed(seed), ssc)),
            Self::Aes192 => Box::new(Encrypted::new(Aes192Cipher::from_seed(seed), ssc)),
            Self::Aes256 => Box::new(Encrypted::new(Aes256Cipher::from_seed(seed), ssc)),
        }
    }

    pub fn block_size(self) -> usize {
        match self {
            Self::Tdes => 8,
            _ => 16,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            Self::Tdes | Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }
}

impl Display for SymmetricCipher {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Tdes => write!(f, "3DES-CBC-CBC"),
            Self::Aes128 => write!(f, "AES-CBC-CMAC-128"),
            Self::Aes192 => write!(f, "AES-CBC-CMAC-192"),
            Self::Aes256 => write!(f, "AES-CBC-CMAC-256"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    // ICAO 9303-11 section D.4 traffic under the derived session keys.
    #[test]
    fn test_tdes_sm_worked_example() {
        let seed = hex!("0036D272F5C350ACAC50C3F572D23600");
        let ssc = 0x887022120C06C226_u128;
        let mut sm = Encrypted::new(TdesCipher::from_seed(&seed), ssc);

        // SELECT EF.COM
        let papdu = sm.enc_apdu(&hex!("00 A4 02 0C 02 01 1E")).unwrap();
        assert_eq!(
            papdu,
            hex!("0CA4020C158709016375432908C044F68E08BF8B92D635FF24F800")
        );
        let rapdu = hex!("990290008E08FA855A5D4C50A8ED");
        let dec = sm.dec_response(0x9000.into(), &rapdu).unwrap();
        assert!(dec.is_empty());

        // READ BINARY of the first four bytes
        let papdu = sm.enc_apdu(&hex!("00 B0 00 00 04")).unwrap();
        assert_eq!(papdu, hex!("0CB000000D9701048E08ED6705417E96BA5500"));
        let rapdu = hex!("8709019FF0EC34F9922651990290008E08AD55CC17140B2DED");
        let data = sm.dec_response(0x9000.into(), &rapdu).unwrap();
        assert_eq!(data, hex!("60145F01"));

        // READ BINARY of the remaining 18 bytes from offset 4
        let papdu = sm.enc_apdu(&hex!("00 B0 00 04 12")).unwrap();
        assert_eq!(papdu, hex!("0CB000040D9701128E082EA28A70F3C7B53500"));
        let rapdu = hex!(
            "871901FB9235F4E4037F2327DCC8964F1F9B8C30F42C8E2FFF224A990290008E08C8B2787EAEA07D74"
        );
        let data = sm.dec_response(0x9000.into(), &rapdu).unwrap();
        assert_eq!(data, hex!("04303130365F36063034303030305C026175"));
    }

    #[test]
    fn test_mac_mismatch_is_fatal_and_deterministic() {
        let seed = hex!("0036D272F5C350ACAC50C3F572D23600");
        let mut tampered = hex!("990290008E08FA855A5D4C50A8ED");
        tampered[12] ^= 0x01;

        for _ in 0..2 {
            let mut sm = Encrypted::new(TdesCipher::from_seed(&seed), 0x887022120C06C227);
            let err = sm.dec_response(0x9000.into(), &tampered).unwrap_err();
            assert!(matches!(err, Error::SmError));
        }
    }

    #[test]
    fn test_status_echo_checked() {
        let seed = hex!("0036D272F5C350ACAC50C3F572D23600");
        let mut sm = Encrypted::new(TdesCipher::from_seed(&seed), 0x887022120C06C226);
        sm.enc_apdu(&hex!("00 A4 02 0C 02 01 1E")).unwrap();
        // Valid MAC but the reported status word disagrees with DO'99.
        let rapdu = hex!("990290008E08FA855A5D4C50A8ED");
        let err = sm.dec_response(0x6A82.into(), &rapdu).unwrap_err();
        assert!(matches!(err, Error::SmError));
    }

    #[test]
    fn test_ssc_increments_per_apdu_pair() {
        let seed = hex!("0036D272F5C350ACAC50C3F572D23600");
        let mut sm = Encrypted::new(TdesCipher::from_seed(&seed), 0x887022120C06C226);
        assert_eq!(sm.ssc, 0x887022120C06C226);
        sm.enc_apdu(&hex!("00 A4 02 0C 02 01 1E")).unwrap();
        assert_eq!(sm.ssc, 0x887022120C06C227);
        sm.dec_response(0x9000.into(), &hex!("990290008E08FA855A5D4C50A8ED"))
            .unwrap();
        assert_eq!(sm.ssc, 0x887022120C06C228);
    }
}
