use crate::ca::CertificateAuthority;
use crate::error::Result;
use crate::store::CertStore;
use crate::types::{KeyAlgorithm, DEFAULT_LEAF_VALIDITY_DAYS};

/// Request for a domain-bound leaf certificate.
///
/// The domain becomes both the subject CN and the first DNS SAN. Wildcard
/// forms like `*.example.com` pass through unmodified.
#[derive(Debug, Clone)]
pub struct LeafRequest {
    pub domain: String,
    pub extra_dns: Vec<String>,
    pub algorithm: KeyAlgorithm,
    pub validity_days: u32,
}

impl LeafRequest {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            extra_dns: Vec::new(),
            algorithm: KeyAlgorithm::LEAF_DEFAULT,
            validity_days: DEFAULT_LEAF_VALIDITY_DAYS,
        }
    }

    pub fn with_dns_san(mut self, dns: impl Into<String>) -> Self {
        self.extra_dns.push(dns.into());
        self
    }

    pub fn with_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }
}

/// A signed, chain-verified leaf with its private key.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub domain: String,
    pub cert_pem: String,
    pub key_pem: String,
    pub serial: u64,
}

impl IssuedCertificate {
    /// Persist key and certificate under the store's `certs/` directory.
    pub fn save(&self, store: &CertStore, force: bool) -> Result<()> {
        store.write_leaf(&self.domain, &self.cert_pem, &self.key_pem, force)
    }
}

/// Issue a leaf for `domain` against the CA stored in `store` and persist it.
///
/// This is the one-call form the CLI uses: it fails with `CaNotFound` before
/// touching the `certs/` directory when the CA was never bootstrapped.
pub fn issue_and_save(
    store: &CertStore,
    request: &LeafRequest,
    force: bool,
) -> Result<IssuedCertificate> {
    let ca = CertificateAuthority::load(store)?;
    let issued = ca.issue(request)?;
    issued.save(store, force)?;
    Ok(issued)
}
