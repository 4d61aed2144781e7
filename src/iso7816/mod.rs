//! ISO/IEC 7816-4 APDU codec.

mod status_word;

pub use self::status_word::StatusWord;
use anyhow::{bail, ensure, Result};

/// Maximum encoded length of an extended APDU: header + 3-byte Lc +
/// 65535 data bytes + 2-byte Le.
const MAX_APDU_LEN: usize = 4 + 3 + 65_535 + 2;

/// A command APDU split into its fields, borrowing the encoded buffer.
#[derive(Debug)]
pub struct ApduRef<'a> {
    pub header: &'a [u8],
    pub lc: &'a [u8],
    pub data: &'a [u8],
    pub le: &'a [u8],
}

impl ApduRef<'_> {
    pub fn cla(&self) -> u8 {
        self.header[0]
    }

    pub fn ins(&self) -> u8 {
        self.header[1]
    }

    pub fn p1(&self) -> u8 {
        self.header[2]
    }

    pub fn p2(&self) -> u8 {
        self.header[3]
    }

    pub fn is_extended_length(&self) -> bool {
        self.lc.len() > 1 || self.le.len() > 1
    }
}

/// Parse a command APDU into header, Lc, data, and Le.
///
/// Accepts both short and extended encodings. See ISO 7816-4 section 5.2.
pub fn parse_apdu(apdu: &[u8]) -> Result<ApduRef> {
    ensure!(apdu.len() <= MAX_APDU_LEN, "APDU too long");
    let empty = &apdu[0..0];
    Ok(match (apdu.len(), apdu.get(4)) {
        (0..4, _) => bail!("APDU too short"),
        // Case 1: header only.
        (4, None) => ApduRef {
            header: apdu,
            lc: empty,
            data: empty,
            le: empty,
        },
        // Case 2 short: header and Le.
        (5, _) => ApduRef {
            header: &apdu[..4],
            lc: empty,
            data: empty,
            le: &apdu[4..5],
        },
        (6, Some(&0x00)) => bail!("invalid Lc"),
        // Case 2 extended: no data, three byte Le.
        (7, Some(&0x00)) => ApduRef {
            header: &apdu[..4],
            lc: empty,
            data: empty,
            le: &apdu[4..],
        },
        // Extended with data, Le optional.
        (_, Some(&0x00)) => {
            let lc = u16::from_be_bytes([apdu[5], apdu[6]]) as usize;
            ensure!(lc > 0, "invalid Lc");
            if apdu.len() - 7 == lc {
                ApduRef {
                    header: &apdu[..4],
                    lc: &apdu[4..7],
                    data: &apdu[7..],
                    le: empty,
                }
            } else if apdu.len() - 9 == lc {
                ApduRef {
                    header: &apdu[..4],
                    lc: &apdu[4..7],
                    data: &apdu[7..7 + lc],
                    le: &apdu[7 + lc..],
                }
            } else {
                bail!("invalid extended length APDU encoding")
            }
        }
        // Case 3 short: data, no Le.
        (_, Some(&lc)) if apdu.len() - 5 == lc as usize => ApduRef {
            header: &apdu[..4],
            lc: &apdu[4..5],
            data: &apdu[5..],
            le: empty,
        },
        // Case 4 short: data and Le.
        (_, Some(&lc)) if apdu.len() - 6 == lc as usize => ApduRef {
            header: &apdu[..4],
            lc: &apdu[4..5],
            data: &apdu[5..apdu.len() - 1],
            le: &apdu[apdu.len() - 1..],
        },
        _ => bail!("invalid APDU encoding"),
    })
}

/// Split a raw transceive response into body and status word.
pub fn split_response(resp: &[u8]) -> Result<(&[u8], StatusWord)> {
    ensure!(resp.len() >= 2, "response shorter than a status word");
    let (body, sw) = resp.split_at(resp.len() - 2);
    Ok((body, StatusWord::from(u16::from_be_bytes([sw[0], sw[1]]))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cases() {
        let apdu = parse_apdu(&[0x00, 0xA4, 0x00, 0x0C]).unwrap();
        assert!(apdu.data.is_empty() && apdu.le.is_empty());

        let apdu = parse_apdu(&[0x00, 0x84, 0x00, 0x00, 0x08]).unwrap();
        assert_eq!(apdu.le, &[0x08]);
        assert!(!apdu.is_extended_length());

        let apdu = parse_apdu(&[0x00, 0xA4, 0x02, 0x0C, 0x02, 0x01, 0x1E]).unwrap();
        assert_eq!(apdu.data, &[0x01, 0x1E]);
        assert!(apdu.le.is_empty());

        let apdu = parse_apdu(&[0x00, 0x82, 0x00, 0x00, 0x02, 0xAA, 0xBB, 0x28]).unwrap();
        assert_eq!(apdu.data, &[0xAA, 0xBB]);
        assert_eq!(apdu.le, &[0x28]);
    }

    #[test]
    fn test_parse_extended() {
        // Extended Le only.
        let apdu = parse_apdu(&[0x00, 0xB0, 0x00, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert!(apdu.is_extended_length());
        assert_eq!(apdu.le, &[0x00, 0x01, 0x00]);

        // Extended Lc with data, no Le.
        let mut apdu = vec![0x00, 0x86, 0x00, 0x00, 0x00, 0x01, 0x04];
        apdu.extend_from_slice(&[0xAB; 0x104]);
        let parsed = parse_apdu(&apdu).unwrap();
        assert!(parsed.is_extended_length());
        assert_eq!(parsed.data.len(), 0x104);
        assert!(parsed.le.is_empty());
    }

    #[test]
    fn test_split_response() {
        let (body, sw) = split_response(&[0xDE, 0xAD, 0x90, 0x00]).unwrap();
        assert_eq!(body, &[0xDE, 0xAD]);
        assert!(sw.is_success());
        assert!(split_response(&[0x90]).is_err());
    }
}
