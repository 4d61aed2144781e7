//! 3DES secure messaging cipher.

use {
    super::SmCipher,
    crate::crypto::{
        kdf_128,
        tdes::{dec_3des, enc_3des, mac_3des_padded, set_parity_bits},
        KDF_ENC, KDF_MAC,
    },
    zeroize::ZeroizeOnDrop,
};

const BLOCK_SIZE: usize = 8;

#[derive(ZeroizeOnDrop)]
pub struct TdesCipher {
    kenc: [u8; 16],
    kmac: [u8; 16],
}

impl TdesCipher {
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut kenc = *kdf_128(seed, KDF_ENC);
        let mut kmac = *kdf_128(seed, KDF_MAC);
        set_parity_bits(&mut kenc);
        set_parity_bits(&mut kmac);
        Self { kenc, kmac }
    }

    pub fn from_keys(kenc: [u8; 16], kmac: [u8; 16]) -> Self {
        Self { kenc, kmac }
    }
}

impl SmCipher for TdesCipher {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    // IV is always zero for 3DES SM, ICAO 9303-11 section 9.8.6.1.
    fn enc(&self, _ssc: u128, data: &mut [u8]) {
        enc_3des(&self.kenc, data);
    }

    fn dec(&self, _ssc: u128, data: &mut [u8]) {
        dec_3des(&self.kenc, data);
    }

    fn mac(&self, data: &[u8]) -> [u8; 8] {
        mac_3des_padded(&self.kmac, data)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    // ICAO 9303-11 section D.2: session keys from (KIFD xor KIC).
    #[test]
    fn test_session_key_derivation() {
        let seed = hex!("0036D272F5C350ACAC50C3F572D23600");
        let cipher = TdesCipher::from_seed(&seed);
        assert_eq!(cipher.kenc, hex!("979EC13B1CBFE9DCD01AB0FED307EAE5"));
        assert_eq!(cipher.kmac, hex!("F1CB1F1FB5ADF208806B89DC579DC1F8"));
    }

    // ICAO 9303-11 section D.2: BAC access keys from the MRZ seed.
    #[test]
    fn test_bac_key_derivation() {
        let seed = crate::crypto::seed_from_mrz("L898902C<369080619406236");
        let cipher = TdesCipher::from_seed(&seed[..]);
        assert_eq!(cipher.kenc, hex!("AB94FDECF2674FDFB9B391F85D7F76F2"));
        assert_eq!(cipher.kmac, hex!("7962D9ECE03D1ACD4C76089DCE131543"));
    }
}
