use crate::error::{Error, Result};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};

/// Default CA certificate lifetime, in days.
pub const DEFAULT_CA_VALIDITY_DAYS: u32 = 3650;

/// Default leaf certificate lifetime, in days.
pub const DEFAULT_LEAF_VALIDITY_DAYS: u32 = 365;

/// Organizational fields stamped into every subject this tool produces.
pub const ORGANIZATION: &str = "SMTP Relay";
pub const ORGANIZATIONAL_UNIT: &str = "Operations";

/// Common name used for the self-signed root certificate.
pub const CA_COMMON_NAME: &str = "certgen local CA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Ed25519,
    EcdsaP256,
    EcdsaP384,
    Rsa2048,
    Rsa4096,
}

impl KeyAlgorithm {
    /// Default algorithm for a new CA keypair.
    pub const CA_DEFAULT: KeyAlgorithm = KeyAlgorithm::Rsa4096;

    /// Default algorithm for a new leaf keypair.
    pub const LEAF_DEFAULT: KeyAlgorithm = KeyAlgorithm::Rsa2048;

    pub fn to_rcgen(&self) -> &'static rcgen::SignatureAlgorithm {
        match self {
            KeyAlgorithm::Ed25519 => &rcgen::PKCS_ED25519,
            KeyAlgorithm::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            KeyAlgorithm::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => &rcgen::PKCS_RSA_SHA256,
        }
    }

    /// Generate a fresh keypair for this algorithm.
    ///
    /// ring has no RSA key generation, so RSA keys are produced with the
    /// `rsa` crate and handed to rcgen as PKCS#8 PEM.
    pub fn key_pair(&self) -> Result<rcgen::KeyPair> {
        match self {
            KeyAlgorithm::Ed25519 | KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdsaP384 => {
                rcgen::KeyPair::generate(self.to_rcgen())
                    .map_err(|e| Error::KeyGen(e.to_string()))
            }
            KeyAlgorithm::Rsa2048 => rsa_key_pair(2048),
            KeyAlgorithm::Rsa4096 => rsa_key_pair(4096),
        }
    }

    /// Detect which algorithm a stored key belongs to. RSA keys are parsed
    /// to tell the supported modulus sizes apart.
    pub fn detect(key_pair: &rcgen::KeyPair, key_pem: &str) -> Result<KeyAlgorithm> {
        if key_pair.is_compatible(&rcgen::PKCS_ED25519) {
            return Ok(KeyAlgorithm::Ed25519);
        }
        if key_pair.is_compatible(&rcgen::PKCS_ECDSA_P256_SHA256) {
            return Ok(KeyAlgorithm::EcdsaP256);
        }
        if key_pair.is_compatible(&rcgen::PKCS_ECDSA_P384_SHA384) {
            return Ok(KeyAlgorithm::EcdsaP384);
        }
        if key_pair.is_compatible(&rcgen::PKCS_RSA_SHA256) {
            use rsa::pkcs8::DecodePrivateKey;
            use rsa::traits::PublicKeyParts;
            let key = rsa::RsaPrivateKey::from_pkcs8_pem(key_pem)
                .map_err(|e| Error::KeyGen(e.to_string()))?;
            return Ok(if key.size() * 8 >= 4096 {
                KeyAlgorithm::Rsa4096
            } else {
                KeyAlgorithm::Rsa2048
            });
        }
        Err(Error::UnsupportedAlgorithm("stored key".to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "Ed25519",
            KeyAlgorithm::EcdsaP256 => "ECDSA P-256",
            KeyAlgorithm::EcdsaP384 => "ECDSA P-384",
            KeyAlgorithm::Rsa2048 => "RSA 2048",
            KeyAlgorithm::Rsa4096 => "RSA 4096",
        }
    }
}

fn rsa_key_pair(bits: usize) -> Result<rcgen::KeyPair> {
    let mut rng = rand::thread_rng();
    let key = rsa::RsaPrivateKey::new(&mut rng, bits)?;
    let pem = key.to_pkcs8_pem(LineEnding::LF)?;
    rcgen::KeyPair::from_pem(&pem).map_err(|e| Error::KeyGen(e.to_string()))
}

impl std::str::FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "ecdsa-p256" | "ecdsap256" | "p256" => Ok(KeyAlgorithm::EcdsaP256),
            "ecdsa-p384" | "ecdsap384" | "p384" => Ok(KeyAlgorithm::EcdsaP384),
            "rsa2048" | "rsa-2048" => Ok(KeyAlgorithm::Rsa2048),
            "rsa4096" | "rsa-4096" | "rsa" => Ok(KeyAlgorithm::Rsa4096),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistinguishedName {
    pub common_name: String,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
}

impl DistinguishedName {
    pub fn new(cn: impl Into<String>) -> Self {
        Self {
            common_name: cn.into(),
            organization: None,
            organizational_unit: None,
            country: None,
            state: None,
            locality: None,
        }
    }

    /// Subject template for the self-signed root certificate.
    pub fn ca_template() -> Self {
        Self::new(CA_COMMON_NAME)
            .with_organization(ORGANIZATION)
            .with_organizational_unit(ORGANIZATIONAL_UNIT)
    }

    /// Subject template for a leaf certificate bound to `domain`.
    pub fn leaf_template(domain: impl Into<String>) -> Self {
        Self::new(domain)
            .with_organization(ORGANIZATION)
            .with_organizational_unit(ORGANIZATIONAL_UNIT)
    }

    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn with_organizational_unit(mut self, ou: impl Into<String>) -> Self {
        self.organizational_unit = Some(ou.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn to_rcgen(&self) -> rcgen::DistinguishedName {
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(rcgen::DnType::CommonName, &self.common_name);

        if let Some(ref org) = self.organization {
            dn.push(rcgen::DnType::OrganizationName, org);
        }
        if let Some(ref ou) = self.organizational_unit {
            dn.push(rcgen::DnType::OrganizationalUnitName, ou);
        }
        if let Some(ref country) = self.country {
            dn.push(rcgen::DnType::CountryName, country);
        }
        if let Some(ref state) = self.state {
            dn.push(rcgen::DnType::StateOrProvinceName, state);
        }
        if let Some(ref locality) = self.locality {
            dn.push(rcgen::DnType::LocalityName, locality);
        }

        dn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyCertSign,
    CrlSign,
}

impl KeyUsage {
    /// Key usage bits for the root certificate.
    pub fn ca_profile() -> Vec<KeyUsage> {
        vec![
            KeyUsage::DigitalSignature,
            KeyUsage::KeyCertSign,
            KeyUsage::CrlSign,
        ]
    }

    /// Key usage bits for an issued leaf certificate.
    pub fn leaf_profile() -> Vec<KeyUsage> {
        vec![
            KeyUsage::DigitalSignature,
            KeyUsage::NonRepudiation,
            KeyUsage::KeyEncipherment,
            KeyUsage::DataEncipherment,
        ]
    }

    pub fn to_rcgen(&self) -> rcgen::KeyUsagePurpose {
        match self {
            KeyUsage::DigitalSignature => rcgen::KeyUsagePurpose::DigitalSignature,
            KeyUsage::NonRepudiation => rcgen::KeyUsagePurpose::ContentCommitment,
            KeyUsage::KeyEncipherment => rcgen::KeyUsagePurpose::KeyEncipherment,
            KeyUsage::DataEncipherment => rcgen::KeyUsagePurpose::DataEncipherment,
            KeyUsage::KeyCertSign => rcgen::KeyUsagePurpose::KeyCertSign,
            KeyUsage::CrlSign => rcgen::KeyUsagePurpose::CrlSign,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsage {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
}

impl ExtendedKeyUsage {
    /// Extended key usages attached to every leaf. Broad on purpose so the
    /// same certificate can back SMTP, HTTPS and client-auth deployments.
    pub fn leaf_profile() -> Vec<ExtendedKeyUsage> {
        vec![
            ExtendedKeyUsage::ServerAuth,
            ExtendedKeyUsage::ClientAuth,
            ExtendedKeyUsage::CodeSigning,
            ExtendedKeyUsage::EmailProtection,
            ExtendedKeyUsage::TimeStamping,
        ]
    }

    pub fn to_rcgen(&self) -> rcgen::ExtendedKeyUsagePurpose {
        match self {
            ExtendedKeyUsage::ServerAuth => rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsage::ClientAuth => rcgen::ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsage::CodeSigning => rcgen::ExtendedKeyUsagePurpose::CodeSigning,
            ExtendedKeyUsage::EmailProtection => rcgen::ExtendedKeyUsagePurpose::EmailProtection,
            ExtendedKeyUsage::TimeStamping => rcgen::ExtendedKeyUsagePurpose::TimeStamping,
        }
    }
}
