//! Chip Authentication, ICAO 9303-11 section 6.2.
//!
//! Ephemeral-static key agreement against the DG14 public key. Success
//! proves the chip holds the private key and replaces the secure
//! messaging session with keys derived from the new shared secret.

use {
    crate::{
        asn1::{
            public_key::{ECAlgoParameters, PubkeyAlgorithmIdentifier},
            security_info::{
                ChipAuthenticationInfo, ChipAuthenticationProtocol,
                ChipAuthenticationPublicKeyInfo, KeyAgreement, SecurityInfo, SecurityInfos,
            },
        },
        crypto::{
            standard_params::curve_from_named_oid, EllipticCurve, ModPGroup,
        },
        error::{Error, Result},
        reader::TagReader,
        secure_messaging::SymmetricCipher,
    },
    der::asn1::ObjectIdentifier as Oid,
    rand::{CryptoRng, RngCore},
    tracing::{debug, info, warn},
    zeroize::Zeroizing,
};

/// What a successful Chip Authentication run used.
#[derive(Clone, Copy, Debug)]
pub struct CaOutcome {
    pub protocol: ChipAuthenticationProtocol,
}

/// Run Chip Authentication from the DG14 security infos.
pub fn establish(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    infos: &SecurityInfos,
) -> Result<CaOutcome> {
    let mut ca_info: Option<&ChipAuthenticationInfo> = None;
    let mut pk_info: Option<&ChipAuthenticationPublicKeyInfo> = None;
    for info in infos.iter() {
        match info {
            SecurityInfo::ChipAuthentication(info) if info.is_valid() => ca_info = Some(info),
            SecurityInfo::ChipAuthenticationPublicKey(info) => pk_info = Some(info),
            _ => {}
        }
    }
    let pk_info = pk_info.ok_or(Error::ChipAuthError)?;

    // Some documents carry only the public key; 3DES is then implied.
    let protocol = match ca_info {
        Some(info) => info.protocol,
        None => {
            warn!("DG14 lacks ChipAuthenticationInfo, assuming 3DES");
            ChipAuthenticationProtocol {
                key_agreement: pk_info.protocol,
                cipher: Some(SymmetricCipher::Tdes),
            }
        }
    };
    if protocol.key_agreement != pk_info.protocol {
        return Err(Error::ChipAuthError);
    }
    let cipher = protocol.cipher.ok_or(Error::ChipAuthError)?;
    info!(%protocol, "starting chip authentication");

    let oid: Oid = protocol.into();
    reader
        .mse_set_at_ca(oid, pk_info.key_id)
        .map_err(|_| Error::ChipAuthError)?;

    let shared_secret = match protocol.key_agreement {
        KeyAgreement::Ecdh => ecdh_agreement(reader, rng, pk_info)?,
        KeyAgreement::Dh => dh_agreement(reader, rng, pk_info)?,
    };

    // Fresh session keys, counter restarts.
    reader.set_secure_messaging(cipher.make_session(&shared_secret, 0));
    info!(cipher = %cipher, "chip authentication succeeded, session keys replaced");
    Ok(CaOutcome { protocol })
}

fn ecdh_agreement(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    pk_info: &ChipAuthenticationPublicKeyInfo,
) -> Result<Zeroizing<Vec<u8>>> {
    let curve = match &pk_info.public_key.algorithm {
        PubkeyAlgorithmIdentifier::Ec(ECAlgoParameters::EcParameters(params)) => {
            EllipticCurve::from_parameters(params).map_err(|e| {
                debug!("bad explicit CA curve: {e}");
                Error::ChipAuthError
            })?
        }
        PubkeyAlgorithmIdentifier::Ec(ECAlgoParameters::NamedCurve(oid)) => {
            curve_from_named_oid(*oid).map_err(|e| {
                debug!("unknown CA named curve: {e}");
                Error::ChipAuthError
            })?
        }
        _ => return Err(Error::ChipAuthError),
    };
    let chip_public = curve
        .pt_from_bytes(pk_info.public_key.key_bytes().map_err(|_| Error::ChipAuthError)?)
        .map_err(|_| Error::ChipAuthError)?;

    let (private, public) = curve.generate_keypair(&mut *rng);
    send_public_value(reader, &curve.pt_to_bytes(Some(public)))?;

    let (_, z) = curve
        .ecka(private, chip_public)
        .map_err(|_| Error::ChipAuthError)?;
    Ok(Zeroizing::new(z))
}

fn dh_agreement(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    pk_info: &ChipAuthenticationPublicKeyInfo,
) -> Result<Zeroizing<Vec<u8>>> {
    let group = match &pk_info.public_key.algorithm {
        PubkeyAlgorithmIdentifier::Dh(params) => {
            ModPGroup::from_parameters(params).map_err(|e| {
                debug!("bad CA DH parameters: {e}");
                Error::ChipAuthError
            })?
        }
        _ => return Err(Error::ChipAuthError),
    };
    let chip_public = group
        .element_from_bytes(pk_info.public_key.key_bytes().map_err(|_| Error::ChipAuthError)?)
        .map_err(|_| Error::ChipAuthError)?;

    let (private, public) = group.generate_keypair(group.generator(), &mut *rng);
    send_public_value(reader, &group.element_to_bytes(public))?;

    let (_, z) = group
        .agree(private, chip_public)
        .map_err(|_| Error::ChipAuthError)?;
    Ok(Zeroizing::new(z))
}

/// GENERAL AUTHENTICATE with the terminal's ephemeral public value in
/// data object 0x80.
fn send_public_value(reader: &mut TagReader, public: &[u8]) -> Result<()> {
    let mut inner = vec![0x80];
    crate::reader::encode_ber_length(&mut inner, public.len());
    inner.extend_from_slice(public);
    reader
        .general_authenticate(&inner, true)
        .map_err(|err| match err {
            Error::UserCanceled | Error::Timeout | Error::ConnectionError => err,
            _ => Error::ChipAuthError,
        })?;
    Ok(())
}
