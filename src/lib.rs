//! certgen - a minimal local PKI for issuing deployment TLS certificates
//!
//! This library manages a single on-disk certificate authority and issues
//! CA-signed leaf certificates bound to domain names:
//!
//! - Bootstrapping a self-signed root CA, idempotently
//! - Issuing server certificates with SAN/EKU extensions, chain-verified
//!   before they are written
//! - Inspecting certificate files for operator verification
//!
//! State lives under one storage root: `ca/` holds the CA key, certificate
//! and serial counter, `certs/` holds issued keys and certificates named by
//! domain.
//!
//! # Examples
//!
//! ## Bootstrapping a CA
//!
//! ```no_run
//! use certgen::ca::{CaOptions, CertificateAuthority};
//! use certgen::store::CertStore;
//!
//! let store = CertStore::new(".");
//! let ca = CertificateAuthority::create(&store, CaOptions::default(), false).unwrap();
//! ```
//!
//! ## Issuing a certificate
//!
//! ```no_run
//! use certgen::cert::{issue_and_save, LeafRequest};
//! use certgen::store::CertStore;
//!
//! let store = CertStore::new(".");
//! let request = LeafRequest::new("mail.example.com");
//! let issued = issue_and_save(&store, &request, false).unwrap();
//! println!("serial {}", issued.serial);
//! ```
//!
//! ## Inspecting a certificate
//!
//! ```no_run
//! use certgen::inspect::{describe_certificate, display_certificate, OutputFormat};
//!
//! let desc = describe_certificate("certs/mail.example.com-cert.pem").unwrap();
//! println!("{}", display_certificate(&desc, OutputFormat::Pretty).unwrap());
//! ```

pub mod ca;
pub mod cert;
pub mod error;
pub mod inspect;
pub mod store;
pub mod types;
pub mod verify;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};

pub use ca::{CaOptions, CertificateAuthority};
pub use cert::{issue_and_save, IssuedCertificate, LeafRequest};
pub use inspect::{describe_certificate, CertificateDescription};
pub use store::CertStore;
pub use types::{DistinguishedName, KeyAlgorithm};
pub use verify::verify_chain;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_and_issue() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());

        let opts = CaOptions {
            algorithm: KeyAlgorithm::EcdsaP256,
            ..CaOptions::default()
        };
        let ca = CertificateAuthority::create(&store, opts, false).unwrap();

        let request = LeafRequest::new("mail.example.test").with_algorithm(KeyAlgorithm::EcdsaP256);
        let issued = ca.issue(&request).unwrap();

        assert!(verify_chain(&issued.cert_pem, ca.cert_pem()).is_ok());
    }

    #[test]
    fn test_issue_with_ed25519() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());

        let opts = CaOptions {
            algorithm: KeyAlgorithm::Ed25519,
            ..CaOptions::default()
        };
        let ca = CertificateAuthority::create(&store, opts, false).unwrap();

        let issued = ca
            .issue(&LeafRequest::new("mail.example.test").with_algorithm(KeyAlgorithm::Ed25519))
            .unwrap();
        assert!(verify_chain(&issued.cert_pem, ca.cert_pem()).is_ok());
    }
}
