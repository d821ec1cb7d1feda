//! On-disk layout for CA materials and issued certificates.
//!
//! A store root contains two directories:
//!
//! ```text
//! <root>/ca/ca-key.pem        CA private key
//! <root>/ca/ca-cert.pem       self-signed CA certificate
//! <root>/ca/ca-cert.srl       next serial number
//! <root>/certs/<domain>-key.pem
//! <root>/certs/<domain>-cert.pem
//! ```
//!
//! All writes go through a temp-file-plus-rename so a crashed invocation
//! never leaves a torn file that a later run could mistake for valid CA
//! state.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CA_DIR: &str = "ca";
const CERTS_DIR: &str = "certs";
const CA_KEY_FILE: &str = "ca-key.pem";
const CA_CERT_FILE: &str = "ca-cert.pem";
const SERIAL_FILE: &str = "ca-cert.srl";

#[derive(Debug, Clone)]
pub struct CertStore {
    root: PathBuf,
}

impl CertStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ca_dir(&self) -> PathBuf {
        self.root.join(CA_DIR)
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.root.join(CERTS_DIR)
    }

    pub fn ca_key_path(&self) -> PathBuf {
        self.ca_dir().join(CA_KEY_FILE)
    }

    pub fn ca_cert_path(&self) -> PathBuf {
        self.ca_dir().join(CA_CERT_FILE)
    }

    pub fn serial_path(&self) -> PathBuf {
        self.ca_dir().join(SERIAL_FILE)
    }

    /// Leaf paths are named by the literal domain string; the `*` of a
    /// wildcard domain is preserved in the filename.
    pub fn leaf_key_path(&self, domain: &str) -> PathBuf {
        self.certs_dir().join(format!("{}-key.pem", domain))
    }

    pub fn leaf_cert_path(&self, domain: &str) -> PathBuf {
        self.certs_dir().join(format!("{}-cert.pem", domain))
    }

    /// Both CA files must be present for the CA to count as existing.
    pub fn ca_present(&self) -> bool {
        self.ca_cert_path().is_file() && self.ca_key_path().is_file()
    }

    pub fn leaf_present(&self, domain: &str) -> bool {
        self.leaf_cert_path(domain).is_file() || self.leaf_key_path(domain).is_file()
    }

    pub fn read_ca(&self) -> Result<(String, String)> {
        if !self.ca_present() {
            return Err(Error::CaNotFound(self.root.clone()));
        }
        let cert_pem = fs::read_to_string(self.ca_cert_path())?;
        let key_pem = fs::read_to_string(self.ca_key_path())?;
        Ok((cert_pem, key_pem))
    }

    pub fn write_ca(&self, cert_pem: &str, key_pem: &str) -> Result<()> {
        fs::create_dir_all(self.ca_dir())?;
        write_atomic(&self.ca_key_path(), key_pem.as_bytes(), true)?;
        write_atomic(&self.ca_cert_path(), cert_pem.as_bytes(), false)?;
        Ok(())
    }

    /// Write an issued leaf keypair. Existing files for the same domain are
    /// only replaced when `force` is set.
    pub fn write_leaf(&self, domain: &str, cert_pem: &str, key_pem: &str, force: bool) -> Result<()> {
        if !force && self.leaf_present(domain) {
            return Err(Error::AlreadyExists(self.leaf_cert_path(domain)));
        }
        fs::create_dir_all(self.certs_dir())?;
        write_atomic(&self.leaf_key_path(domain), key_pem.as_bytes(), true)?;
        write_atomic(&self.leaf_cert_path(domain), cert_pem.as_bytes(), false)?;
        Ok(())
    }

    pub fn serial_counter(&self) -> SerialCounter {
        SerialCounter::new(self.serial_path())
    }
}

/// Persisted monotonic serial counter owned by the CA.
///
/// The file holds the next serial to hand out. Updates rewrite the file via
/// rename, so an interrupted allocation leaves either the old or the new
/// value, never a torn one.
#[derive(Debug, Clone)]
pub struct SerialCounter {
    path: PathBuf,
}

impl SerialCounter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reset the counter to `next`, creating the file if needed.
    pub fn reset(&self, next: u64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, format!("{}\n", next).as_bytes(), false)
    }

    pub fn peek(&self) -> Result<u64> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(self.path.clone())
            } else {
                Error::Io(e)
            }
        })?;
        raw.trim().parse::<u64>().map_err(|e| Error::SerialCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Take the next serial number and persist the increment.
    pub fn allocate(&self) -> Result<u64> {
        let current = self.peek()?;
        let next = current.checked_add(1).ok_or_else(|| Error::SerialCorrupt {
            path: self.path.clone(),
            reason: "serial space exhausted".to_string(),
        })?;
        write_atomic(&self.path, format!("{}\n", next).as_bytes(), false)?;
        Ok(current)
    }
}

fn write_atomic(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    // Append to the full filename instead of swapping the extension, so
    // targets sharing a stem (ca-cert.pem, ca-cert.srl) stage separately.
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents)?;

    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let store = CertStore::new("/tmp/pki");

        assert_eq!(store.ca_cert_path(), PathBuf::from("/tmp/pki/ca/ca-cert.pem"));
        assert_eq!(store.ca_key_path(), PathBuf::from("/tmp/pki/ca/ca-key.pem"));
        assert_eq!(store.serial_path(), PathBuf::from("/tmp/pki/ca/ca-cert.srl"));
        assert_eq!(
            store.leaf_cert_path("mail.example.test"),
            PathBuf::from("/tmp/pki/certs/mail.example.test-cert.pem")
        );
    }

    #[test]
    fn test_wildcard_preserved_in_filenames() {
        let store = CertStore::new("/tmp/pki");
        assert_eq!(
            store.leaf_key_path("*.example.test"),
            PathBuf::from("/tmp/pki/certs/*.example.test-key.pem")
        );
    }

    #[test]
    fn test_ca_present_requires_both_files() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());
        assert!(!store.ca_present());

        fs::create_dir_all(store.ca_dir()).unwrap();
        fs::write(store.ca_cert_path(), "cert").unwrap();
        assert!(!store.ca_present());

        fs::write(store.ca_key_path(), "key").unwrap();
        assert!(store.ca_present());
    }

    #[test]
    fn test_read_ca_missing_is_ca_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());

        match store.read_ca() {
            Err(Error::CaNotFound(_)) => {}
            other => panic!("expected CaNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_write_ca_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());

        store.write_ca("CERT", "KEY").unwrap();
        let (cert, key) = store.read_ca().unwrap();
        assert_eq!(cert, "CERT");
        assert_eq!(key, "KEY");
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());
        store.write_ca("CERT", "KEY").unwrap();

        let mode = fs::metadata(store.ca_key_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_leaf_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());

        store.write_leaf("mail.example.test", "CERT1", "KEY1", false).unwrap();
        let result = store.write_leaf("mail.example.test", "CERT2", "KEY2", false);
        match result {
            Err(Error::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {:?}", other),
        }

        store.write_leaf("mail.example.test", "CERT2", "KEY2", true).unwrap();
        let cert = fs::read_to_string(store.leaf_cert_path("mail.example.test")).unwrap();
        assert_eq!(cert, "CERT2");
    }

    #[test]
    fn test_staged_writes_do_not_share_temp_paths() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());

        // ca-cert.pem and ca-cert.srl share a stem; staging either must not
        // touch a file at the shared-stem name.
        fs::create_dir_all(store.ca_dir()).unwrap();
        let shared_stem = store.ca_dir().join("ca-cert.tmp");
        fs::write(&shared_stem, "sentinel").unwrap();

        store.write_ca("CERT", "KEY").unwrap();
        store.serial_counter().reset(2).unwrap();

        assert_eq!(fs::read_to_string(&shared_stem).unwrap(), "sentinel");
        assert_eq!(store.read_ca().unwrap().0, "CERT");
        assert_eq!(store.serial_counter().peek().unwrap(), 2);
    }

    #[test]
    fn test_serial_counter_monotonic() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());
        let counter = store.serial_counter();

        counter.reset(2).unwrap();
        assert_eq!(counter.allocate().unwrap(), 2);
        assert_eq!(counter.allocate().unwrap(), 3);
        assert_eq!(counter.allocate().unwrap(), 4);
        assert_eq!(counter.peek().unwrap(), 5);
    }

    #[test]
    fn test_serial_counter_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let store = CertStore::new(tmp.path());
        let counter = store.serial_counter();

        fs::create_dir_all(store.ca_dir()).unwrap();
        fs::write(store.serial_path(), "not-a-number").unwrap();

        match counter.allocate() {
            Err(Error::SerialCorrupt { .. }) => {}
            other => panic!("expected SerialCorrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_serial_counter_missing_file() {
        let tmp = TempDir::new().unwrap();
        let counter = CertStore::new(tmp.path()).serial_counter();

        match counter.peek() {
            Err(Error::FileNotFound(_)) => {}
            other => panic!("expected FileNotFound, got {:?}", other),
        }
    }
}
