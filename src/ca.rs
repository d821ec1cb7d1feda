use crate::cert::{IssuedCertificate, LeafRequest};
use crate::error::{Error, Result};
use crate::store::{CertStore, SerialCounter};
use crate::types::{DistinguishedName, KeyAlgorithm, KeyUsage, DEFAULT_CA_VALIDITY_DAYS};
use chrono::{Duration, Utc};
use rcgen::{Certificate, CertificateParams, KeyPair};
use std::fs;
use std::path::Path;
use x509_parser::pem::parse_x509_pem;

/// Serial number of the self-signed root certificate. Issued leaves start
/// counting directly after it.
const CA_SERIAL: u64 = 1;

/// Parameters for bootstrapping a new root.
pub struct CaOptions {
    pub subject: DistinguishedName,
    pub algorithm: KeyAlgorithm,
    pub validity_days: u32,
}

impl Default for CaOptions {
    fn default() -> Self {
        Self {
            subject: DistinguishedName::ca_template(),
            algorithm: KeyAlgorithm::CA_DEFAULT,
            validity_days: DEFAULT_CA_VALIDITY_DAYS,
        }
    }
}

/// The root of trust for one storage root: a private key, a self-signed
/// certificate and a persisted serial counter.
pub struct CertificateAuthority {
    certificate: Certificate,
    cert_pem: String,
    algorithm: KeyAlgorithm,
    serial: SerialCounter,
}

impl CertificateAuthority {
    /// Bootstrap a CA in `store`, idempotently.
    ///
    /// If valid CA materials already exist and `force` is false, they are
    /// loaded and returned unchanged; the files on disk are not touched.
    /// With `force`, key, certificate and serial counter are regenerated,
    /// which orphans every previously issued leaf.
    pub fn create(store: &CertStore, opts: CaOptions, force: bool) -> Result<Self> {
        if store.ca_present() && !force {
            return Self::load(store);
        }

        let key_pair = opts.algorithm.key_pair()?;

        let mut params = CertificateParams::new(vec![]);
        params.distinguished_name = opts.subject.to_rcgen();
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = KeyUsage::ca_profile().iter().map(|ku| ku.to_rcgen()).collect();
        params.use_authority_key_identifier_extension = true;
        set_validity(&mut params, opts.validity_days)?;
        params.alg = opts.algorithm.to_rcgen();
        params.key_pair = Some(key_pair);
        params.serial_number = Some(rcgen::SerialNumber::from(CA_SERIAL));

        let certificate = Certificate::from_params(params)?;
        let cert_pem = certificate.serialize_pem()?;
        let key_pem = certificate.serialize_private_key_pem();

        store.write_ca(&cert_pem, &key_pem)?;
        let serial = store.serial_counter();
        serial.reset(CA_SERIAL + 1)?;

        Ok(Self {
            certificate,
            cert_pem,
            algorithm: opts.algorithm,
            serial,
        })
    }

    /// Load the CA stored under `store`, failing with `CaNotFound` if it was
    /// never bootstrapped and `CaInvalid` if the materials do not parse as a
    /// signing-capable CA.
    pub fn load(store: &CertStore) -> Result<Self> {
        let (cert_pem, key_pem) = store.read_ca()?;

        validate_ca_cert(&cert_pem, store)?;

        let key_pair = KeyPair::from_pem(&key_pem).map_err(|e| Error::CaInvalid {
            path: store.ca_key_path(),
            reason: e.to_string(),
        })?;
        let algorithm = KeyAlgorithm::detect(&key_pair, &key_pem)?;

        let params =
            CertificateParams::from_ca_cert_pem(&cert_pem, key_pair).map_err(|e| {
                Error::CaInvalid {
                    path: store.ca_cert_path(),
                    reason: e.to_string(),
                }
            })?;
        let certificate = Certificate::from_params(params)?;

        // A missing counter (e.g. a store populated by hand) is re-seeded
        // past every serial still visible on disk; a corrupt one is an error.
        let serial = store.serial_counter();
        match serial.peek() {
            Ok(_) => {}
            Err(Error::FileNotFound(_)) => serial.reset(reseed_serial(store)?)?,
            Err(e) => return Err(e),
        }

        Ok(Self {
            certificate,
            cert_pem,
            algorithm,
            serial,
        })
    }

    /// Issue a leaf certificate signed by this CA.
    ///
    /// The result carries the PEM materials and the allocated serial; the
    /// caller decides where they are written. The leaf is chain-verified
    /// against this CA before it is returned.
    pub fn issue(&self, request: &LeafRequest) -> Result<IssuedCertificate> {
        if request.domain.trim().is_empty() {
            return Err(Error::InvalidInput("domain must not be empty".to_string()));
        }

        let key_pair = request.algorithm.key_pair()?;

        let mut params = CertificateParams::new(vec![]);
        params.distinguished_name = DistinguishedName::leaf_template(&request.domain).to_rcgen();

        let mut sans = vec![rcgen::SanType::DnsName(request.domain.clone())];
        for dns in &request.extra_dns {
            if dns != &request.domain {
                sans.push(rcgen::SanType::DnsName(dns.clone()));
            }
        }
        params.subject_alt_names = sans;

        params.is_ca = rcgen::IsCa::ExplicitNoCa;
        params.key_usages = KeyUsage::leaf_profile().iter().map(|ku| ku.to_rcgen()).collect();
        params.extended_key_usages = crate::types::ExtendedKeyUsage::leaf_profile()
            .iter()
            .map(|eku| eku.to_rcgen())
            .collect();
        params.use_authority_key_identifier_extension = true;
        set_validity(&mut params, request.validity_days)?;
        params.alg = request.algorithm.to_rcgen();
        params.key_pair = Some(key_pair);

        let serial = self.serial.allocate()?;
        params.serial_number = Some(rcgen::SerialNumber::from(serial));

        let certificate = Certificate::from_params(params)?;
        let cert_pem = certificate.serialize_pem_with_signer(&self.certificate)?;
        let key_pem = certificate.serialize_private_key_pem();

        crate::verify::verify_chain(&cert_pem, &self.cert_pem)?;

        Ok(IssuedCertificate {
            domain: request.domain.clone(),
            cert_pem,
            key_pem,
            serial,
        })
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }
}

/// Reject stored certificates that are not actually signing-capable CAs, so
/// a half-written or foreign file is never treated as "already present".
fn validate_ca_cert(cert_pem: &str, store: &CertStore) -> Result<()> {
    let invalid = |reason: String| Error::CaInvalid {
        path: store.ca_cert_path(),
        reason,
    };

    let (_, pem) =
        parse_x509_pem(cert_pem.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let cert = pem.parse_x509().map_err(|e| invalid(e.to_string()))?;

    let is_ca = cert
        .basic_constraints()
        .ok()
        .flatten()
        .map(|bc| bc.value.ca)
        .unwrap_or(false);
    if !is_ca {
        return Err(invalid("basicConstraints does not mark CA:true".to_string()));
    }

    let can_sign = cert
        .key_usage()
        .ok()
        .flatten()
        .map(|ku| ku.value.key_cert_sign())
        .unwrap_or(false);
    if !can_sign {
        return Err(invalid("keyUsage lacks keyCertSign".to_string()));
    }

    Ok(())
}

/// Pick a counter value for a store whose serial file went missing: one past
/// the highest serial among the issued certificates still present, so
/// already-issued leaves never share a serial with future ones.
fn reseed_serial(store: &CertStore) -> Result<u64> {
    let mut next = CA_SERIAL + 1;
    let dir = store.certs_dir();
    if dir.is_dir() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_cert = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with("-cert.pem"));
            if !is_cert {
                continue;
            }
            if let Some(serial) = cert_serial(&path) {
                next = next.max(serial.saturating_add(1));
            }
        }
    }
    Ok(next)
}

/// Serial of the certificate at `path`, if it parses and fits in a u64.
fn cert_serial(path: &Path) -> Option<u64> {
    let contents = fs::read(path).ok()?;
    let (_, pem) = parse_x509_pem(&contents).ok()?;
    let cert = pem.parse_x509().ok()?;
    let bytes = cert.serial.to_bytes_be();
    if bytes.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(&bytes);
    Some(u64::from_be_bytes(buf))
}

fn set_validity(params: &mut CertificateParams, validity_days: u32) -> Result<()> {
    let not_before = Utc::now();
    let not_after = not_before + Duration::days(validity_days as i64);
    params.not_before = time::OffsetDateTime::from_unix_timestamp(not_before.timestamp())
        .map_err(|e| Error::CertGen(format!("Invalid timestamp: {}", e)))?;
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp())
        .map_err(|e| Error::CertGen(format!("Invalid timestamp: {}", e)))?;
    Ok(())
}
