//! Triple-DES primitives for BAC and 3DES secure messaging.
//!
//! 3DES runs in two-key EDE mode with a zero IV (ICAO 9303-11 section
//! 9.8.6.1); the MAC is ISO 9797-1 MAC algorithm 3 ("retail MAC").

use {
    cipher::{
        block_padding::NoPadding, BlockDecrypt as _, BlockDecryptMut as _, BlockEncrypt as _,
        BlockEncryptMut as _, InnerIvInit as _, KeyInit as _,
    },
    des::{Des, TdesEde2},
    zeroize::Zeroizing,
};

/// Derive a parity-adjusted two-key 3DES key. ICAO 9303-11 section 9.7.1.
pub fn derive_key(seed: &[u8], counter: u32) -> Zeroizing<[u8; 16]> {
    let mut key = super::kdf_128(seed, counter);
    set_parity_bits(&mut key[..]);
    key
}

/// Force odd parity on every key byte, as DES test parity is defined.
pub fn set_parity_bits(key: &mut [u8]) {
    for byte in key {
        *byte &= 0xFE;
        *byte |= 1 ^ (byte.count_ones() as u8 & 1);
    }
}

/// 3DES-CBC encrypt in place with IV = 0. Input must be block aligned.
pub fn enc_3des(key: &[u8; 16], msg: &mut [u8]) {
    assert!(msg.len() % 8 == 0);
    let cipher = TdesEde2::new_from_slice(key).unwrap();
    let iv = [0; 8];
    let block_mode = cbc::Encryptor::inner_iv_slice_init(cipher, &iv).unwrap();
    let len = msg.len();
    block_mode
        .encrypt_padded_mut::<NoPadding>(msg, len)
        .unwrap();
}

/// 3DES-CBC decrypt in place with IV = 0. Input must be block aligned.
pub fn dec_3des(key: &[u8; 16], msg: &mut [u8]) {
    assert!(msg.len() % 8 == 0);
    let cipher = TdesEde2::new_from_slice(key).unwrap();
    let iv = [0; 8];
    let block_mode = cbc::Decryptor::inner_iv_slice_init(cipher, &iv).unwrap();
    block_mode.decrypt_padded_mut::<NoPadding>(msg).unwrap();
}

/// Retail MAC (ISO 9797-1 MAC algorithm 3, padding method 2) over DES.
pub fn mac_3des(key: &[u8; 16], msg: &[u8]) -> [u8; 8] {
    let des1 = Des::new_from_slice(&key[..8]).unwrap();
    let des2 = Des::new_from_slice(&key[8..]).unwrap();
    let mut state = [0_u8; 8];
    for block in msg.chunks(8) {
        for i in 0..block.len() {
            state[i] ^= block[i];
        }
        if block.len() < 8 {
            state[block.len()] ^= 0x80;
        }
        des1.encrypt_block((&mut state).into());
    }
    if msg.len() % 8 == 0 {
        state[0] ^= 0x80;
        des1.encrypt_block((&mut state).into());
    }
    des2.decrypt_block((&mut state).into());
    des1.encrypt_block((&mut state).into());
    state
}

/// Retail MAC over a message that already carries ISO 7816 padding.
pub fn mac_3des_padded(key: &[u8; 16], msg: &[u8]) -> [u8; 8] {
    assert!(msg.len() % 8 == 0);
    let des1 = Des::new_from_slice(&key[..8]).unwrap();
    let des2 = Des::new_from_slice(&key[8..]).unwrap();
    let mut state = [0_u8; 8];
    for block in msg.chunks(8) {
        for i in 0..8 {
            state[i] ^= block[i];
        }
        des1.encrypt_block((&mut state).into());
    }
    des2.decrypt_block((&mut state).into());
    des1.encrypt_block((&mut state).into());
    state
}
