//! Passive Authentication, ICAO 9303-11 section 5.1.
//!
//! Three independent checks: every read data group hashes to the value
//! the security object declares, the security object's CMS signature
//! verifies under the Document Signer Certificate, and that certificate
//! chains to a CSCA from the caller's master list. All outcomes are
//! reported; none aborts the read.

use {
    crate::{
        asn1::EfSod,
        error::{Error, Result},
        lds::{DataGroup, DataGroupId, DigestAlgorithm},
    },
    anyhow::anyhow,
    der::{Decode, Encode, Sequence, ValueOrd},
    openssl::{
        hash::MessageDigest,
        sign::Verifier,
        stack::Stack,
        x509::{store::X509StoreBuilder, X509StoreContext, X509},
    },
    std::collections::BTreeMap,
    tracing::{debug, info, warn},
};

/// How the caller's master list blob is packaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterListFormat {
    /// A CMS-signed `CscaMasterList` as distributed by ICAO and the
    /// national PKDs.
    CmsSignedList,
    /// Bare DER certificates, back to back.
    ConcatenatedCerts,
}

/// `CscaMasterList`, ICAO 9303-12.
#[derive(Clone, Debug, PartialEq, Eq, Sequence, ValueOrd)]
struct CscaMasterList {
    version: u64,
    cert_list: der::asn1::SetOfVec<x509_cert::Certificate>,
}

/// Per-check outcomes of a Passive Authentication run.
#[derive(Debug, Default)]
pub struct PassiveAuthReport {
    /// Hash comparison per data group.
    pub hash_results: BTreeMap<DataGroupId, bool>,
    pub signature_valid: bool,
    /// `None` when no master list was supplied.
    pub chain_verified: Option<bool>,
    pub errors: Vec<String>,
}

impl PassiveAuthReport {
    pub fn passed(&self) -> bool {
        self.signature_valid
            && self.chain_verified != Some(false)
            && self.hash_results.values().all(|&ok| ok)
            && self.errors.is_empty()
    }
}

/// Verify the assembled document against its security object.
pub fn verify(
    sod: &EfSod,
    data_groups: &BTreeMap<DataGroupId, DataGroup>,
    master_list: Option<(&[u8], MasterListFormat)>,
) -> Result<PassiveAuthReport> {
    let mut report = PassiveAuthReport::default();

    let lso = sod
        .lds_security_object()
        .map_err(|e| Error::PassiveAuthError(format!("bad LDSSecurityObject: {e}")))?;
    let algorithm = DigestAlgorithm::from_oid(lso.hash_algorithm.algorithm)
        .map_err(|e| Error::PassiveAuthError(e.to_string()))?;
    debug!(%algorithm, groups = lso.data_group_hash_values.len(), "security object decoded");

    // Hash every data group we actually read.
    for (id, dg) in data_groups {
        let Some(number) = id.number() else {
            continue;
        };
        match lso.hash_for_dg(number as u64) {
            Some(declared) => {
                let computed = dg.hash(algorithm);
                let matches = computed == declared;
                if !matches {
                    warn!(%id, "data group hash mismatch");
                    report.errors.push(format!("{id} hash mismatch"));
                }
                report.hash_results.insert(*id, matches);
            }
            None => {
                report
                    .errors
                    .push(format!("{id} is not covered by the security object"));
                report.hash_results.insert(*id, false);
            }
        }
    }

    // Signature of the security object under the Document Signer.
    match verify_sod_signature(sod) {
        Ok(()) => report.signature_valid = true,
        Err(e) => report.errors.push(format!("SOD signature: {e}")),
    }

    // Chain the Document Signer to a trusted CSCA.
    if let Some((blob, format)) = master_list {
        match verify_chain(sod, blob, format) {
            Ok(()) => report.chain_verified = Some(true),
            Err(e) => {
                report.chain_verified = Some(false);
                report.errors.push(format!("certificate chain: {e}"));
            }
        }
    }

    info!(
        passed = report.passed(),
        signature = report.signature_valid,
        chain = ?report.chain_verified,
        "passive authentication finished"
    );
    Ok(report)
}

fn openssl_digest(algorithm: DigestAlgorithm) -> MessageDigest {
    match algorithm {
        DigestAlgorithm::Sha1 => MessageDigest::sha1(),
        DigestAlgorithm::Sha224 => MessageDigest::sha224(),
        DigestAlgorithm::Sha256 => MessageDigest::sha256(),
        DigestAlgorithm::Sha384 => MessageDigest::sha384(),
        DigestAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}

/// RFC 5652 sections 5.4 and 5.6.
fn verify_sod_signature(sod: &EfSod) -> anyhow::Result<()> {
    let signer = sod.signer_info().map_err(|e| anyhow!("no SignerInfo: {e}"))?;
    let digest = DigestAlgorithm::from_oid(signer.digest_alg.oid)?;

    let dsc_der = sod
        .document_signer_certificate()
        .ok_or_else(|| anyhow!("no Document Signer Certificate embedded"))?;
    let dsc = X509::from_der(&dsc_der)?;
    let public_key = dsc.public_key()?;

    let econtent = sod.lds_security_object_bytes()?;

    let signed_payload = match &signer.signed_attrs {
        Some(attrs) => {
            // The message-digest attribute must hash the eContent.
            let md_attr = attrs
                .iter()
                .find(|attr| attr.oid.to_string() == "1.2.840.113549.1.9.4")
                .ok_or_else(|| anyhow!("message-digest attribute missing"))?;
            let value = md_attr
                .values
                .iter()
                .next()
                .ok_or_else(|| anyhow!("empty message-digest attribute"))?;
            let declared = value.decode_as::<der::asn1::OctetString>()?;
            if declared.as_bytes() != digest.hash(&econtent) {
                return Err(anyhow!("eContent digest does not match signed attribute"));
            }
            // The signature covers the attributes re-tagged as SET OF.
            attrs.to_der()?
        }
        None => econtent,
    };

    let mut verifier = Verifier::new(openssl_digest(digest), &public_key)?;
    verifier.update(&signed_payload)?;
    if !verifier.verify(signer.signature.as_bytes())? {
        return Err(anyhow!("signature mismatch"));
    }
    Ok(())
}

fn verify_chain(sod: &EfSod, blob: &[u8], format: MasterListFormat) -> anyhow::Result<()> {
    let dsc_der = sod
        .document_signer_certificate()
        .ok_or_else(|| anyhow!("no Document Signer Certificate embedded"))?;
    let dsc = X509::from_der(&dsc_der)?;

    let cscas = extract_csca_certificates(blob, format)?;
    if cscas.is_empty() {
        return Err(anyhow!("master list holds no certificates"));
    }

    let mut builder = X509StoreBuilder::new()?;
    for csca in cscas {
        builder.add_cert(csca)?;
    }
    let store = builder.build();

    let chain = Stack::new()?;
    let mut context = X509StoreContext::new()?;
    let (verified, reason) = context.init(&store, &dsc, &chain, |c| {
        let verified = c.verify_cert()?;
        Ok((verified, c.error().error_string()))
    })?;
    if !verified {
        return Err(anyhow!("document signer not trusted: {reason}"));
    }
    Ok(())
}

/// Pull CSCA certificates out of the caller's blob.
pub fn extract_csca_certificates(
    blob: &[u8],
    format: MasterListFormat,
) -> anyhow::Result<Vec<X509>> {
    let mut certs = Vec::new();
    match format {
        MasterListFormat::CmsSignedList => {
            let content = cms::content_info::ContentInfo::from_der(blob)?;
            let signed_data: cms::signed_data::SignedData = content.content.decode_as()?;
            let econtent = signed_data
                .encap_content_info
                .econtent
                .ok_or_else(|| anyhow!("master list carries no content"))?;
            let octets = econtent.decode_as::<der::asn1::OctetString>()?;
            let list = CscaMasterList::from_der(octets.as_bytes())?;
            for cert in list.cert_list.iter() {
                certs.push(X509::from_der(&cert.to_der()?)?);
            }
        }
        MasterListFormat::ConcatenatedCerts => {
            let mut reader = der::SliceReader::new(blob)?;
            use der::Reader;
            while !reader.is_finished() {
                let cert = x509_cert::Certificate::decode(&mut reader)?;
                certs.push(X509::from_der(&cert.to_der()?)?);
            }
        }
    }
    Ok(certs)
}
