//! Active Authentication, ICAO 9303-11 section 6.1.
//!
//! The chip signs a terminal challenge with the DG15 key. RSA keys use
//! the ISO 9796-2 scheme 1 signature with message recovery; EC keys use
//! plain ECDSA over the digest named in DG14.

use {
    crate::{
        asn1::{
            public_key::{
                ECAlgoParameters, PubkeyAlgorithmIdentifier, RsaPublicKey, SubjectPublicKeyInfo,
            },
            security_info::{SecurityInfo, SecurityInfos},
        },
        crypto::{
            ecdsa_verify, prime_field::uint_from_be_slice, prime_field::uint_from_der_int,
            standard_params::curve_from_named_oid, EllipticCurve,
        },
        error::{Error, Result},
        lds::DigestAlgorithm,
        reader::TagReader,
    },
    anyhow::{anyhow, bail, ensure},
    der::Decode,
    rand::{CryptoRng, Rng, RngCore},
    subtle::ConstantTimeEq,
    tracing::{debug, info},
};

/// RSA modulus width limit; AA keys in the field stay at or below 2048
/// bits but signed CSCAs have been seen at 4096.
type RsaUint = ruint::Uint<4096, 64>;

/// Challenge the chip and verify its signature.
pub fn verify(
    reader: &mut TagReader,
    rng: &mut (impl CryptoRng + RngCore),
    public_key: &SubjectPublicKeyInfo,
    dg14_infos: Option<&SecurityInfos>,
) -> Result<()> {
    let challenge: [u8; 8] = rng.gen();
    let signature = reader.internal_authenticate(&challenge)?;
    debug!(len = signature.len(), "active authentication response");

    match &public_key.algorithm {
        PubkeyAlgorithmIdentifier::Rsa => {
            let key = RsaPublicKey::from_der(public_key.key_bytes()?)
                .map_err(|e| Error::Unexpected(anyhow!("bad DG15 RSA key: {e}")))?;
            verify_iso9796_2(&key, &challenge, &signature).map_err(Error::Unexpected)?;
        }
        PubkeyAlgorithmIdentifier::Ec(params) => {
            let curve = match params {
                ECAlgoParameters::EcParameters(explicit) => EllipticCurve::from_parameters(explicit)
                    .map_err(|e| Error::Unexpected(anyhow!("bad DG15 curve: {e}")))?,
                ECAlgoParameters::NamedCurve(oid) => curve_from_named_oid(*oid)
                    .map_err(|e| Error::Unexpected(anyhow!("bad DG15 curve: {e}")))?,
                ECAlgoParameters::ImplicitlyCA(_) => {
                    return Err(Error::Unexpected(anyhow!(
                        "implicit curve parameters are not supported"
                    )))
                }
            };
            let point = curve
                .pt_from_bytes(public_key.key_bytes()?)
                .map_err(|e| Error::Unexpected(anyhow!("bad DG15 point: {e}")))?;
            let digest = aa_digest_algorithm(dg14_infos)?;
            ecdsa_verify(&curve, point, &digest.hash(&challenge), &signature)
                .map_err(Error::Unexpected)?;
        }
        other => {
            return Err(Error::Unexpected(anyhow!(
                "unsupported DG15 key algorithm {other:?}"
            )))
        }
    }
    info!("active authentication succeeded");
    Ok(())
}

/// Digest for ECDSA responses, from DG14's ActiveAuthenticationInfo.
fn aa_digest_algorithm(dg14_infos: Option<&SecurityInfos>) -> Result<DigestAlgorithm> {
    let infos = dg14_infos.ok_or_else(|| {
        Error::Unexpected(anyhow!("ECDSA active authentication requires DG14"))
    })?;
    for info in infos.iter() {
        if let SecurityInfo::ActiveAuthentication(aa) = info {
            let algo = match aa.signature_algorithm.to_string().as_str() {
                "1.2.840.10045.4.1" => DigestAlgorithm::Sha1,
                "1.2.840.10045.4.3.1" => DigestAlgorithm::Sha224,
                "1.2.840.10045.4.3.2" => DigestAlgorithm::Sha256,
                "1.2.840.10045.4.3.3" => DigestAlgorithm::Sha384,
                "1.2.840.10045.4.3.4" => DigestAlgorithm::Sha512,
                other => {
                    return Err(Error::Unexpected(anyhow!(
                        "unsupported AA signature algorithm {other}"
                    )))
                }
            };
            return Ok(algo);
        }
    }
    Err(Error::Unexpected(anyhow!(
        "DG14 carries no ActiveAuthenticationInfo"
    )))
}

/// ISO 9796-2 digital signature scheme 1 with partial recovery.
///
/// F = Σ^e mod n must frame `0x6A || M1 || H || trailer`, with
/// H = hash(M1 || M2) and M2 the terminal challenge.
fn verify_iso9796_2(
    key: &RsaPublicKey,
    challenge: &[u8],
    signature: &[u8],
) -> anyhow::Result<()> {
    let n: RsaUint = uint_from_der_int(&key.modulus)?;
    let e: RsaUint = uint_from_der_int(&key.public_exponent)?;
    let sigma: RsaUint = uint_from_be_slice(signature)?;
    ensure!(sigma < n, "signature exceeds the modulus");

    let mut f = sigma.pow_mod(e, n);
    // The signer may have sent min(s, n - s); the valid representative
    // ends in 0xC.
    if f.as_limbs()[0] & 0x0F != 0x0C {
        f = n - f;
    }

    let modulus_len = n.byte_len();
    let bytes = f.to_be_bytes_vec();
    let fr = &bytes[bytes.len() - modulus_len..];

    ensure!(fr[0] & 0xC0 == 0x40, "bad recovery header");
    let (digest, trailer_len) = match fr[modulus_len - 1] {
        0xBC => (DigestAlgorithm::Sha1, 1),
        0xCC => {
            let algo = match fr[modulus_len - 2] {
                0x33 => DigestAlgorithm::Sha1,
                0x34 => DigestAlgorithm::Sha256,
                0x35 => DigestAlgorithm::Sha512,
                0x36 => DigestAlgorithm::Sha384,
                0x38 => DigestAlgorithm::Sha224,
                other => bail!("unknown trailer hash identifier {other:02X}"),
            };
            (algo, 2)
        }
        other => bail!("bad trailer byte {other:02X}"),
    };

    let hash_len = digest.hash(b"").len();
    ensure!(
        modulus_len > 1 + hash_len + trailer_len,
        "modulus too small for the frame"
    );
    let m1 = &fr[1..modulus_len - hash_len - trailer_len];
    let carried_hash = &fr[modulus_len - hash_len - trailer_len..modulus_len - trailer_len];

    let mut message = m1.to_vec();
    message.extend_from_slice(challenge);
    let expected = digest.hash(&message);
    ensure!(
        expected.ct_eq(carried_hash).unwrap_u8() == 1,
        "recovered hash mismatch"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, der::asn1::Int};

    /// An exponent-1 key lets the test author a framed value directly:
    /// the public operation is the identity, so the signature IS the
    /// frame and every format check still runs.
    fn identity_key() -> RsaPublicKey {
        let mut modulus = vec![0x00];
        modulus.extend_from_slice(&[0xFF; 64]);
        RsaPublicKey {
            modulus: Int::new(&modulus).unwrap(),
            public_exponent: Int::new(&[0x01]).unwrap(),
        }
    }

    fn framed_signature(challenge: &[u8]) -> Vec<u8> {
        let m1 = [0x5A; 42];
        let mut message = m1.to_vec();
        message.extend_from_slice(challenge);
        let hash = DigestAlgorithm::Sha1.hash(&message);

        let mut frame = vec![0x6A];
        frame.extend_from_slice(&m1);
        frame.extend_from_slice(&hash);
        frame.push(0xBC);
        assert_eq!(frame.len(), 64);
        frame
    }

    #[test]
    fn test_frame_verifies() {
        let challenge = [0x07; 8];
        let signature = framed_signature(&challenge);
        verify_iso9796_2(&identity_key(), &challenge, &signature).unwrap();
    }

    #[test]
    fn test_tampered_message_rejected() {
        let challenge = [0x07; 8];
        let mut signature = framed_signature(&challenge);
        signature[5] ^= 0x01;
        assert!(verify_iso9796_2(&identity_key(), &challenge, &signature).is_err());
        // Wrong challenge fails the recovered hash.
        assert!(verify_iso9796_2(&identity_key(), &[0x08; 8], &signature).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(verify_iso9796_2(&identity_key(), &[0u8; 8], &[0x01, 0x02]).is_err());
    }
}
