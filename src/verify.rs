//! Chain verification for freshly issued certificates.
//!
//! Signing can nominally succeed while still producing a certificate that no
//! client would accept (wrong issuer linkage, bad key identifiers). Every
//! issuance is therefore checked here before it is reported as written.

use crate::error::{Error, Result};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

/// Verify that `leaf_pem` chains to `ca_pem`.
///
/// Checks issuer/subject linkage, the authority/subject key identifier pair
/// and the cryptographic signature.
pub fn verify_chain(leaf_pem: &str, ca_pem: &str) -> Result<()> {
    let (_, leaf_der) = parse_x509_pem(leaf_pem.as_bytes())?;
    let (_, ca_der) = parse_x509_pem(ca_pem.as_bytes())?;
    let leaf = leaf_der.parse_x509()?;
    let ca = ca_der.parse_x509()?;

    let leaf_issuer = leaf.issuer().to_string();
    let ca_subject = ca.subject().to_string();
    if leaf_issuer != ca_subject {
        return Err(Error::Verification(format!(
            "issuer '{}' does not match CA subject '{}'",
            leaf_issuer, ca_subject
        )));
    }

    let aki = authority_key_identifier(&leaf).ok_or_else(|| {
        Error::Verification("certificate carries no authority key identifier".to_string())
    })?;
    let ski = subject_key_identifier(&ca).ok_or_else(|| {
        Error::Verification("CA certificate carries no subject key identifier".to_string())
    })?;
    if aki != ski {
        return Err(Error::Verification(
            "authority key identifier does not match CA subject key identifier".to_string(),
        ));
    }

    leaf.verify_signature(Some(ca.public_key()))
        .map_err(|e| Error::Verification(format!("signature check failed: {}", e)))
}

pub(crate) fn subject_key_identifier<'a>(cert: &'a X509Certificate<'_>) -> Option<&'a [u8]> {
    cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
        ParsedExtension::SubjectKeyIdentifier(KeyIdentifier(id)) => Some(*id),
        _ => None,
    })
}

pub(crate) fn authority_key_identifier<'a>(cert: &'a X509Certificate<'_>) -> Option<&'a [u8]> {
    cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
        ParsedExtension::AuthorityKeyIdentifier(aki) => {
            aki.key_identifier.as_ref().map(|KeyIdentifier(id)| *id)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{CaOptions, CertificateAuthority};
    use crate::cert::LeafRequest;
    use crate::store::CertStore;
    use crate::types::KeyAlgorithm;
    use tempfile::TempDir;

    fn test_ca(root: &std::path::Path) -> CertificateAuthority {
        let store = CertStore::new(root);
        let opts = CaOptions {
            algorithm: KeyAlgorithm::EcdsaP256,
            ..CaOptions::default()
        };
        CertificateAuthority::create(&store, opts, false).unwrap()
    }

    #[test]
    fn test_issued_leaf_verifies() {
        let tmp = TempDir::new().unwrap();
        let ca = test_ca(tmp.path());

        let request = LeafRequest::new("mail.example.test").with_algorithm(KeyAlgorithm::EcdsaP256);
        let issued = ca.issue(&request).unwrap();

        assert!(verify_chain(&issued.cert_pem, ca.cert_pem()).is_ok());
    }

    #[test]
    fn test_leaf_does_not_verify_against_unrelated_ca() {
        let tmp_a = TempDir::new().unwrap();
        let tmp_b = TempDir::new().unwrap();
        let ca_a = test_ca(tmp_a.path());
        let ca_b = test_ca(tmp_b.path());

        let request = LeafRequest::new("mail.example.test").with_algorithm(KeyAlgorithm::EcdsaP256);
        let issued = ca_a.issue(&request).unwrap();

        match verify_chain(&issued.cert_pem, ca_b.cert_pem()) {
            Err(Error::Verification(_)) => {}
            other => panic!("expected Verification error, got {:?}", other),
        }
    }

    #[test]
    fn test_leaf_without_authority_key_identifier_is_rejected() {
        let mut ca_params = rcgen::CertificateParams::new(vec![]);
        ca_params.distinguished_name = crate::types::DistinguishedName::ca_template().to_rcgen();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        ca_params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
        let ca_cert = rcgen::Certificate::from_params(ca_params).unwrap();
        let ca_pem = ca_cert.serialize_pem().unwrap();

        // Issuer linkage and signature are fine, but no authorityKeyIdentifier
        // extension is written.
        let mut leaf_params =
            rcgen::CertificateParams::new(vec!["mail.example.test".to_string()]);
        leaf_params.is_ca = rcgen::IsCa::ExplicitNoCa;
        leaf_params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;
        leaf_params.use_authority_key_identifier_extension = false;
        let leaf_cert = rcgen::Certificate::from_params(leaf_params).unwrap();
        let leaf_pem = leaf_cert.serialize_pem_with_signer(&ca_cert).unwrap();

        match verify_chain(&leaf_pem, &ca_pem) {
            Err(Error::Verification(msg)) => {
                assert!(msg.contains("authority key identifier"), "{}", msg)
            }
            other => panic!("expected Verification error, got {:?}", other),
        }
    }

    #[test]
    fn test_ca_cert_is_self_consistent() {
        let tmp = TempDir::new().unwrap();
        let ca = test_ca(tmp.path());

        // Self-signed root verifies against itself.
        assert!(verify_chain(ca.cert_pem(), ca.cert_pem()).is_ok());
    }
}
