//! Read-only certificate inspection for operator verification.

use crate::error::{Error, Result};
use std::path::Path;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

/// Fully decoded view of one certificate.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct CertificateDescription {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: String,
    pub not_after: String,
    pub signature_algorithm: String,
    pub public_key_algorithm: String,
    pub public_key_size: Option<usize>,
    pub subject_alt_names: Vec<String>,
    pub is_ca: bool,
    pub key_usage: Vec<String>,
    pub extended_key_usage: Vec<String>,
    pub is_valid: bool,
    pub validity_status: String,
}

/// Decode the PEM certificate at `path`.
///
/// Fails with `FileNotFound` when the path does not resolve to a file;
/// never mutates anything.
pub fn describe_certificate(path: impl AsRef<Path>) -> Result<CertificateDescription> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let contents = std::fs::read(path)?;
    let (_, pem) = parse_x509_pem(&contents)?;
    let x509 = pem.parse_x509()?;
    Ok(describe(&x509))
}

fn describe(x509: &X509Certificate<'_>) -> CertificateDescription {
    let subject = format_dn(x509.subject());
    let issuer = format_dn(x509.issuer());
    let serial_number = format_serial(x509.serial.to_bytes_be().as_slice());

    let not_before = x509.validity().not_before.to_string();
    let not_after = x509.validity().not_after.to_string();

    let now = chrono::Utc::now().timestamp();
    let not_before_ts = x509.validity().not_before.timestamp();
    let not_after_ts = x509.validity().not_after.timestamp();

    let is_valid = now >= not_before_ts && now <= not_after_ts;
    let validity_status = if now < not_before_ts {
        "Not yet valid".to_string()
    } else if now > not_after_ts {
        "Expired".to_string()
    } else {
        "Valid".to_string()
    };

    let signature_algorithm = x509.signature_algorithm.algorithm.to_string();

    let (public_key_algorithm, public_key_size) = match x509.public_key().parsed() {
        // key_size() is already in bits.
        Ok(x509_parser::public_key::PublicKey::RSA(rsa)) => {
            ("RSA".to_string(), Some(rsa.key_size()))
        }
        Ok(x509_parser::public_key::PublicKey::EC(_)) => ("ECDSA".to_string(), None),
        Ok(x509_parser::public_key::PublicKey::Unknown(_)) => ("Unknown".to_string(), None),
        _ => ("Unknown".to_string(), None),
    };

    let mut subject_alt_names = Vec::new();
    if let Ok(Some(san_ext)) = x509.subject_alternative_name() {
        for san in &san_ext.value.general_names {
            match san {
                GeneralName::DNSName(name) => {
                    subject_alt_names.push(format!("DNS:{}", name));
                }
                GeneralName::IPAddress(ip) => {
                    subject_alt_names.push(format!("IP:{}", format_ip(ip)));
                }
                GeneralName::RFC822Name(email) => {
                    subject_alt_names.push(format!("Email:{}", email));
                }
                GeneralName::URI(uri) => {
                    subject_alt_names.push(format!("URI:{}", uri));
                }
                _ => {}
            }
        }
    }

    let is_ca = x509
        .basic_constraints()
        .ok()
        .flatten()
        .map(|bc| bc.value.ca)
        .unwrap_or(false);

    let mut key_usage = Vec::new();
    if let Ok(Some(ku_ext)) = x509.key_usage() {
        let ku = &ku_ext.value;
        if ku.digital_signature() {
            key_usage.push("Digital Signature".to_string());
        }
        if ku.non_repudiation() {
            key_usage.push("Non Repudiation".to_string());
        }
        if ku.key_encipherment() {
            key_usage.push("Key Encipherment".to_string());
        }
        if ku.data_encipherment() {
            key_usage.push("Data Encipherment".to_string());
        }
        if ku.key_agreement() {
            key_usage.push("Key Agreement".to_string());
        }
        if ku.key_cert_sign() {
            key_usage.push("Certificate Sign".to_string());
        }
        if ku.crl_sign() {
            key_usage.push("CRL Sign".to_string());
        }
    }

    let mut extended_key_usage = Vec::new();
    if let Ok(Some(eku_ext)) = x509.extended_key_usage() {
        let eku = &eku_ext.value;
        if eku.server_auth {
            extended_key_usage.push("TLS Web Server Authentication".to_string());
        }
        if eku.client_auth {
            extended_key_usage.push("TLS Web Client Authentication".to_string());
        }
        if eku.code_signing {
            extended_key_usage.push("Code Signing".to_string());
        }
        if eku.email_protection {
            extended_key_usage.push("Email Protection".to_string());
        }
        if eku.time_stamping {
            extended_key_usage.push("Time Stamping".to_string());
        }
        if eku.ocsp_signing {
            extended_key_usage.push("OCSP Signing".to_string());
        }
    }

    CertificateDescription {
        subject,
        issuer,
        serial_number,
        not_before,
        not_after,
        signature_algorithm,
        public_key_algorithm,
        public_key_size,
        subject_alt_names,
        is_ca,
        key_usage,
        extended_key_usage,
        is_valid,
        validity_status,
    }
}

fn format_dn(dn: &X509Name<'_>) -> String {
    let mut parts = Vec::new();

    for rdn in dn.iter() {
        for attr in rdn.iter() {
            let attr_type = attr.attr_type();
            let attr_value = attr.attr_value().as_str().unwrap_or("?");

            let name = match attr_type.to_string().as_str() {
                "2.5.4.3" => "CN",
                "2.5.4.10" => "O",
                "2.5.4.11" => "OU",
                "2.5.4.6" => "C",
                "2.5.4.7" => "L",
                "2.5.4.8" => "ST",
                _ => continue,
            };

            parts.push(format!("{}={}", name, attr_value));
        }
    }

    parts.join(", ")
}

fn format_serial(serial: &[u8]) -> String {
    serial
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn format_ip(ip_bytes: &[u8]) -> String {
    if ip_bytes.len() == 4 {
        format!(
            "{}.{}.{}.{}",
            ip_bytes[0], ip_bytes[1], ip_bytes[2], ip_bytes[3]
        )
    } else if ip_bytes.len() == 16 {
        let mut parts = Vec::new();
        for i in (0..16).step_by(2) {
            parts.push(format!("{:02x}{:02x}", ip_bytes[i], ip_bytes[i + 1]));
        }
        parts.join(":")
    } else {
        format!("{:?}", ip_bytes)
    }
}

pub enum OutputFormat {
    Pretty,
    #[cfg(feature = "json")]
    Json,
}

pub fn display_certificate(
    description: &CertificateDescription,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Pretty => Ok(display_pretty(description)),
        #[cfg(feature = "json")]
        OutputFormat::Json => Ok(serde_json::to_string_pretty(description)?),
    }
}

fn display_pretty(cert: &CertificateDescription) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", "=".repeat(72)));
    output.push_str(&format!("  Subject:             {}\n", cert.subject));
    output.push_str(&format!("  Issuer:              {}\n", cert.issuer));
    output.push_str(&format!("  Serial Number:       {}\n", cert.serial_number));
    output.push_str(&format!(
        "  Validity Status:     {}\n",
        cert.validity_status
    ));
    output.push_str(&format!("  Not Before:          {}\n", cert.not_before));
    output.push_str(&format!("  Not After:           {}\n", cert.not_after));
    output.push_str(&format!(
        "  Signature Algorithm: {}\n",
        cert.signature_algorithm
    ));

    let pk_info = if let Some(size) = cert.public_key_size {
        format!("{} ({} bits)", cert.public_key_algorithm, size)
    } else {
        cert.public_key_algorithm.clone()
    };
    output.push_str(&format!("  Public Key:          {}\n", pk_info));
    output.push_str(&format!(
        "  CA Certificate:      {}\n",
        if cert.is_ca { "Yes" } else { "No" }
    ));

    if !cert.subject_alt_names.is_empty() {
        output.push_str("  Subject Alternative Names:\n");
        for san in &cert.subject_alt_names {
            output.push_str(&format!("    - {}\n", san));
        }
    }

    if !cert.key_usage.is_empty() {
        output.push_str(&format!(
            "  Key Usage:           {}\n",
            cert.key_usage.join(", ")
        ));
    }

    if !cert.extended_key_usage.is_empty() {
        output.push_str(&format!(
            "  Extended Key Usage:  {}\n",
            cert.extended_key_usage.join(", ")
        ));
    }

    output.push_str(&format!("{}\n", "=".repeat(72)));
    output
}
