//! AES secure messaging ciphers.
//!
//! CBC with IV = E(KSenc, SSC) and CMAC truncated to 8 bytes, per ICAO
//! 9303-11 sections 9.8.6.2 and 9.8.7.2.

use {
    super::SmCipher,
    crate::crypto::{kdf_128, kdf_192, kdf_256, KDF_ENC, KDF_MAC},
    aes::{Aes128, Aes192, Aes256},
    cbc::{Decryptor as CbcDec, Encryptor as CbcEnc},
    cipher::{
        block_padding::NoPadding, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit,
        KeyIvInit,
    },
    cmac::{Cmac, Mac},
    zeroize::ZeroizeOnDrop,
};

const BLOCK_SIZE: usize = 16;

macro_rules! aes_cipher {
    ($name:ident, $algo:ty, $key_len:literal, $kdf:ident) => {
        #[derive(ZeroizeOnDrop)]
        pub struct $name {
            kenc: [u8; $key_len],
            kmac: [u8; $key_len],
        }

        impl $name {
            pub fn from_seed(seed: &[u8]) -> Self {
                Self {
                    kenc: *$kdf(seed, KDF_ENC),
                    kmac: *$kdf(seed, KDF_MAC),
                }
            }

            pub fn from_keys(kenc: [u8; $key_len], kmac: [u8; $key_len]) -> Self {
                Self { kenc, kmac }
            }

            fn iv(&self, ssc: u128) -> [u8; BLOCK_SIZE] {
                let mut iv = ssc.to_be_bytes();
                <$algo>::new(&self.kenc.into()).encrypt_block((&mut iv).into());
                iv
            }
        }

        impl SmCipher for $name {
            fn block_size(&self) -> usize {
                BLOCK_SIZE
            }

            fn enc(&self, ssc: u128, data: &mut [u8]) {
                assert!(data.len() % BLOCK_SIZE == 0);
                let cbc = CbcEnc::<$algo>::new(&self.kenc.into(), &self.iv(ssc).into());
                cbc.encrypt_padded_mut::<NoPadding>(data, data.len())
                    .unwrap();
            }

            fn dec(&self, ssc: u128, data: &mut [u8]) {
                assert!(data.len() % BLOCK_SIZE == 0);
                let cbc = CbcDec::<$algo>::new(&self.kenc.into(), &self.iv(ssc).into());
                cbc.decrypt_padded_mut::<NoPadding>(data).unwrap();
            }

            fn mac(&self, data: &[u8]) -> [u8; 8] {
                assert!(data.len() % BLOCK_SIZE == 0);
                let mut cmac = <Cmac<$algo> as KeyInit>::new(&self.kmac.into());
                cmac.update(data);
                cmac.finalize().into_bytes()[0..8].try_into().unwrap()
            }
        }
    };
}

aes_cipher!(Aes128Cipher, Aes128, 16, kdf_128);
aes_cipher!(Aes192Cipher, Aes192, 24, kdf_192);
aes_cipher!(Aes256Cipher, Aes256, 32, kdf_256);
