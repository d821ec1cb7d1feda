use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Certificate generation error: {0}")]
    CertGen(String),

    #[error("Key generation error: {0}")]
    KeyGen(String),

    #[error("X509 parsing error: {0}")]
    X509Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CA not found under {}: run `certgen init` first", .0.display())]
    CaNotFound(PathBuf),

    #[error("CA materials at {} are not usable: {reason}", .path.display())]
    CaInvalid { path: PathBuf, reason: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Refusing to overwrite existing {}: pass --force to replace it", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Chain verification failed: {0}")]
    Verification(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Serial counter at {} is corrupt: {reason}", .path.display())]
    SerialCorrupt { path: PathBuf, reason: String },

    #[cfg(feature = "json")]
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rcgen::RcgenError> for Error {
    fn from(err: rcgen::RcgenError) -> Self {
        Error::CertGen(err.to_string())
    }
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::KeyGen(err.to_string())
    }
}

impl From<rsa::pkcs8::Error> for Error {
    fn from(err: rsa::pkcs8::Error) -> Self {
        Error::KeyGen(err.to_string())
    }
}

impl From<x509_parser::error::X509Error> for Error {
    fn from(err: x509_parser::error::X509Error) -> Self {
        Error::X509Parse(err.to_string())
    }
}

impl From<x509_parser::nom::Err<x509_parser::error::X509Error>> for Error {
    fn from(err: x509_parser::nom::Err<x509_parser::error::X509Error>) -> Self {
        Error::X509Parse(err.to_string())
    }
}

impl From<x509_parser::nom::Err<x509_parser::error::PEMError>> for Error {
    fn from(err: x509_parser::nom::Err<x509_parser::error::PEMError>) -> Self {
        Error::X509Parse(err.to_string())
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
