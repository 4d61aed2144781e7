//! Password Authenticated Connection Establishment.
//!
//! ICAO 9303-11 section 4.4: nonce decryption under the MRZ-derived
//! password key, domain parameter mapping (generic, integrated or chip
//! authentication mapping), ephemeral key agreement and mutual token
//! exchange. Success installs fresh secure messaging keys with SSC 0.

use {
    crate::{
        asn1::security_info::{KeyAgreement, KeyMapping, PaceInfo, SecurityInfo, SecurityInfos},
        crypto::{
            kdf_128, kdf_192, kdf_256, mrz_hash,
            standard_params::standardized_curve,
            tdes::{dec_3des, derive_key, mac_3des},
            DhUint, EllipticCurve, ModPGroup, Uint, KDF_ENC, KDF_MAC, KDF_PACE,
        },
        error::{Error, Result},
        lds::tlv,
        reader::{encode_ber_length, TagReader},
        secure_messaging::SymmetricCipher,
    },
    aes::{Aes128, Aes192, Aes256},
    cbc::Decryptor as CbcDec,
    cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncrypt, KeyInit, KeyIvInit},
    cmac::{Cmac, Mac},
    der::asn1::ObjectIdentifier as Oid,
    rand::{CryptoRng, RngCore},
    subtle::ConstantTimeEq,
    tracing::{debug, info},
    zeroize::Zeroizing,
};

macro_rules! cbc_decrypt {
    ($algo:ty, $key:expr, $data:expr) => {{
        let dec = <CbcDec<$algo> as KeyIvInit>::new_from_slices($key, &[0u8; 16])
            .expect("key and IV sizes fixed");
        dec.decrypt_padded_mut::<NoPadding>($data).expect("aligned");
    }};
}

macro_rules! cmac8 {
    ($algo:ty, $key:expr, $data:expr) => {{
        let mut mac = <Cmac<$algo> as Mac>::new_from_slice($key).expect("key size fixed");
        mac.update($data);
        let out: [u8; 8] = mac.finalize().into_bytes()[..8].try_into().unwrap();
        out
    }};
}

/// What a successful PACE run established.
#[derive(Debug)]
pub struct PaceOutcome {
    pub cipher: SymmetricCipher,
    pub mapping: KeyMapping,
    /// Decrypted chip authentication data from a CAM run, to be checked
    /// against the DG14 public key.
    pub cam_data: Option<Vec<u8>>,
}

/// Run PACE using the MRZ as password.
pub fn establish(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    mrz_key: &str,
    card_access: &SecurityInfos,
) -> Result<PaceOutcome> {
    let infos: Vec<&PaceInfo> = card_access
        .iter()
        .filter_map(|info| match info {
            SecurityInfo::Pace(info) if info.is_valid() => Some(info),
            _ => None,
        })
        .collect();
    let info = *infos
        .first()
        .ok_or_else(|| Error::PaceError("no usable PACEInfo in EF.CardAccess".into()))?;
    let cipher = info
        .protocol
        .cipher
        .expect("is_valid checked the cipher is present");
    info!(protocol = %info.protocol, "starting PACE");

    // MSE:SET AT. The domain parameter reference is only needed when
    // the chip offers a choice.
    let oid = protocol_oid(info)?;
    let parameter_ref = (infos.len() > 1).then_some(info.parameter_id).flatten();
    reader
        .mse_set_at_pace(oid, parameter_ref)
        .map_err(pace_err("MSE:SET AT rejected"))?;

    let nonce = request_encrypted_nonce(reader, cipher, mrz_key)?;

    match info.protocol.key_agreement {
        KeyAgreement::Ecdh => {
            let curve = resolve_curve(info, card_access)?;
            match info.protocol.key_mapping {
                KeyMapping::Gm | KeyMapping::Cam => {
                    let map_private = curve.scalar_field().random_nonzero(&mut *rng);
                    let eph_private = curve.scalar_field().random_nonzero(&mut *rng);
                    establish_ecdh_gm_with_keys(
                        reader,
                        info,
                        &curve,
                        &nonce,
                        map_private,
                        eph_private,
                    )
                }
                KeyMapping::Im => {
                    // Send the additional nonce t; the card returns no
                    // mapping data. G' is derived locally from R(s, t).
                    let mut t = [0u8; 16];
                    rng.fill_bytes(&mut t);
                    reader
                        .general_authenticate(&build_do(0x81, &t), false)
                        .map_err(pace_err("integrated mapping nonce rejected"))?;
                    let r =
                        pseudo_random_mapping(cipher, &nonce, &t, curve.base_field().modulus())?;
                    let mapped = map_to_point(&curve, r)?;
                    let eph_private = curve.scalar_field().random_nonzero(&mut *rng);
                    ecdh_agreement_phase(reader, info, cipher, &curve, mapped, eph_private)
                }
            }
        }
        KeyAgreement::Dh => {
            let group = resolve_group(info, card_access)?;
            establish_dh(reader, rng, info, cipher, &group, &nonce)
        }
    }
}

/// GENERAL AUTHENTICATE step one: fetch and decrypt the nonce.
pub fn request_encrypted_nonce(
    reader: &mut TagReader,
    cipher: SymmetricCipher,
    mrz_key: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    let k_pi = derive_password_key(cipher, mrz_key);
    let step1 = reader
        .general_authenticate(&[], false)
        .map_err(pace_err("encrypted nonce request failed"))?;
    let encrypted_nonce = find_do(&step1, 0x80)?;
    let nonce = decrypt_nonce(cipher, &k_pi, encrypted_nonce)?;
    debug!(len = nonce.len(), "PACE nonce decrypted");
    Ok(nonce)
}

/// Generic mapping with caller-supplied scalars, so the Doc 9303
/// appendix G.1 exchange is reproducible.
pub fn establish_ecdh_gm_with_keys(
    reader: &mut TagReader,
    info: &PaceInfo,
    curve: &EllipticCurve,
    nonce: &[u8],
    map_private: Uint,
    eph_private: Uint,
) -> Result<PaceOutcome> {
    let cipher = info
        .protocol
        .cipher
        .ok_or_else(|| Error::PaceError("protocol names no cipher".into()))?;

    // Exchange ephemeral mapping keys, then G' = s*G + H.
    let map_public = curve
        .pt_mul(map_private, curve.generator())
        .ok_or_else(|| Error::PaceError("degenerate mapping key".into()))?;
    let step2 = reader
        .general_authenticate(&build_do(0x81, &curve.pt_to_bytes(Some(map_public))), false)
        .map_err(pace_err("mapping key exchange failed"))?;
    let card_map_public = curve
        .pt_from_bytes(find_do(&step2, 0x82)?)
        .map_err(|e| Error::PaceError(format!("bad card mapping key: {e}")))?;
    let (h, _) = curve
        .ecka(map_private, card_map_public)
        .map_err(|e| Error::PaceError(format!("mapping agreement failed: {e}")))?;
    let s = curve.scalar_field().os2fe(nonce);
    let mapped = curve
        .pt_add(curve.pt_mul(s, curve.generator()), h)
        .ok_or_else(|| Error::PaceError("mapped generator is infinity".into()))?;

    ecdh_agreement_phase(reader, info, cipher, curve, mapped, eph_private)
}

/// Steps three and four: ephemeral agreement under the mapped
/// generator, token exchange, session key installation.
fn ecdh_agreement_phase(
    reader: &mut TagReader,
    info: &PaceInfo,
    cipher: SymmetricCipher,
    curve: &EllipticCurve,
    mapped_generator: (Uint, Uint),
    eph_private: Uint,
) -> Result<PaceOutcome> {
    let eph_public = curve
        .pt_mul(eph_private, Some(mapped_generator))
        .ok_or_else(|| Error::PaceError("degenerate ephemeral key".into()))?;
    let eph_public_bytes = curve.pt_to_bytes(Some(eph_public));
    let step3 = reader
        .general_authenticate(&build_do(0x83, &eph_public_bytes), false)
        .map_err(pace_err("ephemeral key exchange failed"))?;
    let card_public_bytes = find_do(&step3, 0x84)?.to_vec();
    let card_public = curve
        .pt_from_bytes(&card_public_bytes)
        .map_err(|e| Error::PaceError(format!("bad card ephemeral key: {e}")))?;
    if card_public == Some(eph_public) {
        return Err(Error::PaceError("chip echoed the terminal key".into()));
    }
    let (_, shared_secret) = curve
        .ecka(eph_private, card_public)
        .map_err(|e| Error::PaceError(format!("key agreement failed: {e}")))?;
    let shared_secret = Zeroizing::new(shared_secret);

    // Exchange authentication tokens over the 0x7F49 key objects.
    let protocol_oid = protocol_oid(info)?;
    let t_ifd = auth_token(cipher, &shared_secret, protocol_oid, 0x86, &card_public_bytes);
    let step4 = reader
        .general_authenticate(&build_do(0x85, &t_ifd), true)
        .map_err(pace_err("token exchange failed"))?;
    let t_ic = find_do(&step4, 0x86)?;
    let expected = auth_token(cipher, &shared_secret, protocol_oid, 0x86, &eph_public_bytes);
    if expected.ct_eq(t_ic).unwrap_u8() != 1 {
        return Err(Error::PaceError("chip authentication token mismatch".into()));
    }

    // CAM carries encrypted chip authentication data in DO'8A.
    let cam_data = if info.protocol.key_mapping == KeyMapping::Cam {
        let encrypted = find_do(&step4, 0x8A)?;
        Some(decrypt_cam_data(cipher, &shared_secret, encrypted)?)
    } else {
        None
    };

    reader.set_secure_messaging(cipher.make_session(&shared_secret, 0));
    info!(cipher = %cipher, "PACE established");
    Ok(PaceOutcome {
        cipher,
        mapping: info.protocol.key_mapping,
        cam_data,
    })
}

fn establish_dh(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    info: &PaceInfo,
    cipher: SymmetricCipher,
    group: &ModPGroup,
    nonce: &[u8],
) -> Result<PaceOutcome> {
    let mapped_generator: DhUint = match info.protocol.key_mapping {
        KeyMapping::Gm => {
            // g' = g^s * h with h from an ephemeral DH exchange.
            let (map_private, map_public) = group.generate_keypair(group.generator(), &mut *rng);
            let step2 = reader
                .general_authenticate(&build_do(0x81, &group.element_to_bytes(map_public)), false)
                .map_err(pace_err("mapping key exchange failed"))?;
            let card_map_public = group
                .element_from_bytes(find_do(&step2, 0x82)?)
                .map_err(|e| Error::PaceError(format!("bad card mapping key: {e}")))?;
            let (h, _) = group
                .agree(map_private, card_map_public)
                .map_err(|e| Error::PaceError(format!("mapping agreement failed: {e}")))?;
            let s: DhUint = group.field().os2fe(nonce);
            let g_s = group.exp(group.generator(), s);
            group.field().mul(g_s, h)
        }
        KeyMapping::Im => {
            let mut t = [0u8; 16];
            rng.fill_bytes(&mut t);
            reader
                .general_authenticate(&build_do(0x81, &t), false)
                .map_err(pace_err("integrated mapping nonce rejected"))?;
            let r: DhUint = pseudo_random_mapping(cipher, nonce, &t, group.field().modulus())?;
            group
                .map_to_subgroup(r)
                .map_err(|e| Error::PaceError(format!("integrated mapping failed: {e}")))?
        }
        KeyMapping::Cam => {
            return Err(Error::PaceError("CAM is not defined for DH".into()));
        }
    };

    let (eph_private, eph_public) = group.generate_keypair(mapped_generator, &mut *rng);
    let eph_public_bytes = group.element_to_bytes(eph_public);
    let step3 = reader
        .general_authenticate(&build_do(0x83, &eph_public_bytes), false)
        .map_err(pace_err("ephemeral key exchange failed"))?;
    let card_public_bytes = find_do(&step3, 0x84)?.to_vec();
    let card_public = group
        .element_from_bytes(&card_public_bytes)
        .map_err(|e| Error::PaceError(format!("bad card ephemeral key: {e}")))?;
    if card_public == eph_public {
        return Err(Error::PaceError("chip echoed the terminal key".into()));
    }
    let (_, shared_secret) = group
        .agree(eph_private, card_public)
        .map_err(|e| Error::PaceError(format!("key agreement failed: {e}")))?;
    let shared_secret = Zeroizing::new(shared_secret);

    let protocol_oid = protocol_oid(info)?;
    let t_ifd = auth_token(cipher, &shared_secret, protocol_oid, 0x84, &card_public_bytes);
    let step4 = reader
        .general_authenticate(&build_do(0x85, &t_ifd), true)
        .map_err(pace_err("token exchange failed"))?;
    let t_ic = find_do(&step4, 0x86)?;
    let expected = auth_token(cipher, &shared_secret, protocol_oid, 0x84, &eph_public_bytes);
    if expected.ct_eq(t_ic).unwrap_u8() != 1 {
        return Err(Error::PaceError("chip authentication token mismatch".into()));
    }

    reader.set_secure_messaging(cipher.make_session(&shared_secret, 0));
    info!(cipher = %cipher, "PACE established");
    Ok(PaceOutcome {
        cipher,
        mapping: info.protocol.key_mapping,
        cam_data: None,
    })
}

/// K_pi = KDF(SHA-1(MRZ), 3) at the cipher's key length.
fn derive_password_key(cipher: SymmetricCipher, mrz_key: &str) -> Zeroizing<Vec<u8>> {
    let k = mrz_hash(mrz_key);
    match cipher {
        SymmetricCipher::Tdes | SymmetricCipher::Aes128 => {
            Zeroizing::new(kdf_128(&k[..], KDF_PACE).to_vec())
        }
        SymmetricCipher::Aes192 => Zeroizing::new(kdf_192(&k[..], KDF_PACE).to_vec()),
        SymmetricCipher::Aes256 => Zeroizing::new(kdf_256(&k[..], KDF_PACE).to_vec()),
    }
}

/// Decrypt the PACE nonce, CBC with a zero IV.
fn decrypt_nonce(
    cipher: SymmetricCipher,
    k_pi: &[u8],
    encrypted: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if encrypted.is_empty() || encrypted.len() % cipher.block_size() != 0 {
        return Err(Error::PaceError("encrypted nonce length invalid".into()));
    }
    let mut nonce = Zeroizing::new(encrypted.to_vec());
    match cipher {
        SymmetricCipher::Tdes => {
            let key: [u8; 16] = k_pi.try_into().expect("3DES K_pi is 16 bytes");
            dec_3des(&key, &mut nonce);
        }
        SymmetricCipher::Aes128 => cbc_decrypt!(Aes128, k_pi, &mut nonce),
        SymmetricCipher::Aes192 => cbc_decrypt!(Aes192, k_pi, &mut nonce),
        SymmetricCipher::Aes256 => cbc_decrypt!(Aes256, k_pi, &mut nonce),
    }
    Ok(nonce)
}

/// Authentication token: MAC of the peer's 0x7F49 public key object.
///
/// AES tokens are plain CMAC; 3DES uses the retail MAC with padding
/// method 2. ICAO 9303-11 section 4.4.3.4.
fn auth_token(
    cipher: SymmetricCipher,
    shared_secret: &[u8],
    protocol: Oid,
    point_tag: u8,
    public_key: &[u8],
) -> [u8; 8] {
    let mut inner = Vec::new();
    inner.push(0x06);
    encode_ber_length(&mut inner, protocol.as_bytes().len());
    inner.extend_from_slice(protocol.as_bytes());
    inner.push(point_tag);
    encode_ber_length(&mut inner, public_key.len());
    inner.extend_from_slice(public_key);

    let mut input = vec![0x7F, 0x49];
    encode_ber_length(&mut input, inner.len());
    input.extend_from_slice(&inner);

    match cipher {
        SymmetricCipher::Tdes => {
            let kmac = derive_key(shared_secret, KDF_MAC);
            mac_3des(&kmac, &input)
        }
        SymmetricCipher::Aes128 => cmac8!(Aes128, &kdf_128(shared_secret, KDF_MAC)[..], &input),
        SymmetricCipher::Aes192 => cmac8!(Aes192, &kdf_192(shared_secret, KDF_MAC)[..], &input),
        SymmetricCipher::Aes256 => cmac8!(Aes256, &kdf_256(shared_secret, KDF_MAC)[..], &input),
    }
}

/// Decrypt CAM chip authentication data with KS_enc, zero IV.
fn decrypt_cam_data(
    cipher: SymmetricCipher,
    shared_secret: &[u8],
    encrypted: &[u8],
) -> Result<Vec<u8>> {
    if encrypted.is_empty() || encrypted.len() % cipher.block_size() != 0 {
        return Err(Error::PaceError("CAM data length invalid".into()));
    }
    let mut data = encrypted.to_vec();
    match cipher {
        SymmetricCipher::Aes128 => {
            cbc_decrypt!(Aes128, &kdf_128(shared_secret, KDF_ENC)[..], &mut data)
        }
        SymmetricCipher::Aes192 => {
            cbc_decrypt!(Aes192, &kdf_192(shared_secret, KDF_ENC)[..], &mut data)
        }
        SymmetricCipher::Aes256 => {
            cbc_decrypt!(Aes256, &kdf_256(shared_secret, KDF_ENC)[..], &mut data)
        }
        SymmetricCipher::Tdes => return Err(Error::PaceError("CAM requires AES".into())),
    }
    // Strip the ISO 7816 padding.
    let mut data = data;
    crate::crypto::unpad(&mut data)
        .ok_or_else(|| Error::PaceError("CAM data padding invalid".into()))?;
    Ok(data)
}

/// The pseudo-random mapping R(s, t), ICAO 9303-11 section 9.5.4.2.2.
///
/// An AES-128 chain keyed from the extra nonce t: `k_1 = E(t, s)`, then
/// each round emits `x_i = E(k_i, c0)` and rekeys with
/// `k_(i+1) = E(k_i, c1)`. Output blocks are concatenated until
/// l + 64 bits are available and reduced modulo p.
///
/// Only the AES-128 variant of the chain is implemented; fielded IM
/// documents use PACE-IM with AES-CBC-CMAC-128.
fn pseudo_random_mapping<const BITS: usize, const LIMBS: usize>(
    cipher: SymmetricCipher,
    s: &[u8],
    t: &[u8; 16],
    modulus: ruint::Uint<BITS, LIMBS>,
) -> Result<ruint::Uint<BITS, LIMBS>> {
    const C0: [u8; 16] = [
        0xA6, 0x68, 0x89, 0x2A, 0x7C, 0x41, 0xE3, 0xCA, 0x73, 0x9F, 0x40, 0xB0, 0x57, 0xD8, 0x59,
        0x04,
    ];
    const C1: [u8; 16] = [
        0xA4, 0xE1, 0x36, 0xAC, 0x72, 0x5F, 0x73, 0x8B, 0x01, 0xC1, 0xF6, 0x02, 0x17, 0xC1, 0x88,
        0xAD,
    ];

    if cipher != SymmetricCipher::Aes128 {
        return Err(Error::PaceError(format!(
            "integrated mapping is implemented for AES-128 only, not {cipher}"
        )));
    }
    if s.len() != 16 {
        return Err(Error::PaceError("nonce length unsupported for IM".into()));
    }

    let enc_block = |key: &[u8; 16], block: &[u8; 16]| -> [u8; 16] {
        let mut out = *block;
        Aes128::new(key.into()).encrypt_block((&mut out).into());
        out
    };

    let mut key = enc_block(t, s.try_into().expect("length checked"));
    let bits_needed = modulus.bit_len() + 64;
    let mut output = Vec::new();
    while output.len() * 8 < bits_needed {
        output.extend_from_slice(&enc_block(&key, &C0));
        key = enc_block(&key, &C1);
    }

    Ok(big_mod(&output, modulus))
}

/// Reduce a big-endian byte string modulo p.
fn big_mod<const BITS: usize, const LIMBS: usize>(
    bytes: &[u8],
    modulus: ruint::Uint<BITS, LIMBS>,
) -> ruint::Uint<BITS, LIMBS> {
    let mut acc = ruint::Uint::<BITS, LIMBS>::ZERO;
    let base = ruint::Uint::from(256);
    for &byte in bytes {
        acc = acc.mul_mod(base, modulus);
        acc = acc.add_mod(ruint::Uint::from(byte), modulus);
    }
    acc
}

/// Integrated-mapping point encoding for p ≡ 3 (mod 4).
///
/// ICAO 9303-11 section 9.5.4.2.3 (after Brier et al.): from
/// `α = -t²`, the candidates `x2 = -(b/a)(1 + (α+α²)^-1)` and
/// `x3 = α·x2`; exactly one of g(x2), g(x3) is guaranteed square when
/// α ∉ {0, -1}. The result is scaled by the cofactor.
fn map_to_point(curve: &EllipticCurve, t: Uint) -> Result<(Uint, Uint)> {
    let f = curve.base_field();
    let g = |x: Uint| f.add(f.add(f.mul(f.mul(x, x), x), f.mul(curve.a(), x)), curve.b());

    let alpha = f.neg(f.mul(t, t));
    let denom = f.add(alpha, f.mul(alpha, alpha));
    let denom_inv = f
        .inv(denom)
        .ok_or_else(|| Error::PaceError("degenerate mapping nonce".into()))?;
    let b_over_a = f.mul(
        curve.b(),
        f.inv(curve.a())
            .ok_or_else(|| Error::PaceError("curve parameter a is zero".into()))?,
    );
    let x2 = f.mul(f.neg(b_over_a), f.add(Uint::from(1), denom_inv));
    let x3 = f.mul(alpha, x2);

    let (x, y) = if let Some(y) = f.sqrt(g(x2)) {
        (x2, y)
    } else if let Some(y) = f.sqrt(g(x3)) {
        (x3, y)
    } else {
        return Err(Error::PaceError("integrated mapping found no point".into()));
    };

    curve
        .ensure_on_curve((x, y))
        .map_err(|e| Error::PaceError(format!("mapped point invalid: {e}")))?;
    curve
        .pt_mul(curve.cofactor(), Some((x, y)))
        .ok_or_else(|| Error::PaceError("mapped point has small order".into()))
}

/// Encode the protocol OID, rejecting combinations without one.
fn protocol_oid(info: &PaceInfo) -> Result<Oid> {
    Oid::try_from(info.protocol)
        .map_err(|_| Error::PaceError(format!("{} has no protocol OID", info.protocol)))
}

/// Wrap a value in a context-specific data object.
fn build_do(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    encode_ber_length(&mut out, value.len());
    out.extend_from_slice(value);
    out
}

/// First data object with the given tag inside a 0x7C response.
fn find_do(inner: &[u8], tag: u32) -> Result<&[u8]> {
    let mut rest = inner;
    while !rest.is_empty() {
        let (tlv, next) = tlv::read_tlv(rest)
            .map_err(|e| Error::PaceError(format!("malformed dynamic authentication data: {e}")))?;
        if tlv.tag == tag {
            return Ok(tlv.value);
        }
        rest = next;
    }
    Err(Error::PaceError(format!(
        "data object {tag:02X} missing from response"
    )))
}

fn pace_err(context: &'static str) -> impl Fn(Error) -> Error {
    move |err| match err {
        // Keep cancellation and transport loss distinguishable.
        Error::UserCanceled | Error::Timeout | Error::ConnectionError => err,
        other => Error::PaceError(format!("{context}: {other}")),
    }
}

/// Pick the curve for a PACEInfo.
fn resolve_curve(info: &PaceInfo, card_access: &SecurityInfos) -> Result<EllipticCurve> {
    if let Some(id) = info.parameter_id {
        if (8..=18).contains(&id) {
            return standardized_curve(id)
                .map_err(|e| Error::PaceError(format!("domain parameters: {e}")));
        }
    }
    // Explicit parameters advertised next to the PACEInfo.
    for entry in card_access.iter() {
        if let SecurityInfo::PaceDomainParameter(params) = entry {
            if params.parameter_id == info.parameter_id || params.parameter_id.is_none() {
                let ec: crate::asn1::public_key::EcParameters = params
                    .domain_parameter
                    .parameters
                    .as_ref()
                    .ok_or_else(|| Error::PaceError("empty domain parameters".into()))?
                    .decode_as()
                    .map_err(|e| Error::PaceError(format!("bad EC domain parameters: {e}")))?;
                return EllipticCurve::from_parameters(&ec)
                    .map_err(|e| Error::PaceError(format!("bad EC domain parameters: {e}")));
            }
        }
    }
    Err(Error::PaceError(
        "no usable ECDH domain parameters for PACE".into(),
    ))
}

/// Pick the mod-p group for a DH PACEInfo.
fn resolve_group(info: &PaceInfo, card_access: &SecurityInfos) -> Result<ModPGroup> {
    for entry in card_access.iter() {
        if let SecurityInfo::PaceDomainParameter(params) = entry {
            if params.parameter_id == info.parameter_id || params.parameter_id.is_none() {
                let dh: crate::asn1::public_key::DhAlgoParameters = params
                    .domain_parameter
                    .parameters
                    .as_ref()
                    .ok_or_else(|| Error::PaceError("empty domain parameters".into()))?
                    .decode_as()
                    .map_err(|e| Error::PaceError(format!("bad DH domain parameters: {e}")))?;
                return ModPGroup::from_parameters(&dh)
                    .map_err(|e| Error::PaceError(format!("bad DH domain parameters: {e}")));
            }
        }
    }
    Err(Error::PaceError(
        "no explicit DH domain parameters for PACE".into(),
    ))
}
