//! Basic Access Control, ICAO 9303-11 section 4.3.
//!
//! Mutual 3DES authentication keyed from the MRZ; on success the reader
//! switches to 3DES secure messaging with the derived session keys.

use {
    crate::{
        crypto::{
            seed_from_mrz,
            tdes::{dec_3des, derive_key, enc_3des, mac_3des},
            KDF_ENC, KDF_MAC,
        },
        error::{Error, Result},
        reader::TagReader,
        secure_messaging::{Encrypted, TdesCipher},
    },
    rand::{CryptoRng, Rng, RngCore},
    subtle::ConstantTimeEq,
    tracing::{debug, info},
    zeroize::Zeroizing,
};

/// Run BAC and install the session keys.
pub fn establish(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    mrz_key: &str,
) -> Result<()> {
    let rnd_ifd: [u8; 8] = rng.gen();
    let k_ifd = Zeroizing::new(rng.gen::<[u8; 16]>());
    establish_with_values(reader, mrz_key, &rnd_ifd, &k_ifd)
}

/// BAC with caller-supplied randomness, so the Doc 9303 appendix D
/// exchange is reproducible.
pub fn establish_with_values(
    reader: &mut TagReader,
    mrz_key: &str,
    rnd_ifd: &[u8; 8],
    k_ifd: &[u8; 16],
) -> Result<()> {
    let seed = seed_from_mrz(mrz_key);
    let kenc = derive_key(&seed[..], KDF_ENC);
    let kmac = derive_key(&seed[..], KDF_MAC);

    let rnd_ic = reader.get_challenge()?;
    debug!("BAC challenge received");

    // S = RND.IFD || RND.IC || KIFD, sent as E(S) || MAC(E(S)).
    let mut cmd = Zeroizing::new(Vec::with_capacity(40));
    cmd.extend_from_slice(rnd_ifd);
    cmd.extend_from_slice(&rnd_ic);
    cmd.extend_from_slice(&k_ifd[..]);
    enc_3des(&kenc, &mut cmd[..]);
    let mac = mac_3des(&kmac, &cmd);
    cmd.extend_from_slice(&mac);

    // A failure status here means the chip rejected our cryptogram,
    // i.e. the MRZ key does not fit this document.
    let mut resp = Zeroizing::new(
        reader
            .external_authenticate(&cmd)
            .map_err(|err| match err {
                Error::ResponseError { .. } => Error::InvalidMrzKey,
                other => other,
            })?,
    );
    if resp.len() != 40 {
        return Err(Error::InvalidMrzKey);
    }

    // Verify the response MAC before trusting anything in it.
    let mac = mac_3des(&kmac, &resp[..32]);
    if mac.ct_eq(&resp[32..]).unwrap_u8() != 1 {
        return Err(Error::InvalidMrzKey);
    }
    dec_3des(&kenc, &mut resp[..32]);

    // R = RND.IC || RND.IFD || KIC; both nonces must echo back.
    if resp[0..8] != rnd_ic || resp[8..16] != rnd_ifd[..] {
        return Err(Error::InvalidMrzKey);
    }
    let k_ic = &resp[16..32];

    // Session seed KIFD xor KIC; SSC from the nonce halves.
    let mut session_seed = Zeroizing::new([0u8; 16]);
    for i in 0..16 {
        session_seed[i] = k_ifd[i] ^ k_ic[i];
    }
    let mut ssc_bytes = [0u8; 8];
    ssc_bytes[..4].copy_from_slice(&rnd_ic[4..]);
    ssc_bytes[4..].copy_from_slice(&rnd_ifd[4..]);
    let ssc = u64::from_be_bytes(ssc_bytes) as u128;

    let cipher = TdesCipher::from_seed(&session_seed[..]);
    reader.set_secure_messaging(Box::new(Encrypted::new(cipher, ssc)));
    info!("BAC established, 3DES secure messaging active");
    Ok(())
}
