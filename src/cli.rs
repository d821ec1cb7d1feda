#[cfg(feature = "cli")]
use crate::ca::{CaOptions, CertificateAuthority};
#[cfg(feature = "cli")]
use crate::cert::{issue_and_save, LeafRequest};
#[cfg(feature = "cli")]
use crate::error::{Error, Result};
#[cfg(feature = "cli")]
use crate::inspect::{describe_certificate, display_certificate, OutputFormat};
#[cfg(feature = "cli")]
use crate::store::CertStore;
#[cfg(feature = "cli")]
use crate::types::{KeyAlgorithm, DEFAULT_CA_VALIDITY_DAYS, DEFAULT_LEAF_VALIDITY_DAYS};
#[cfg(feature = "cli")]
use clap::{CommandFactory, Parser, Subcommand};
#[cfg(feature = "cli")]
use colored::Colorize;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "certgen")]
#[command(version, about = "Local CA and TLS certificate issuance", long_about = None)]
pub struct Cli {
    /// Storage root containing the ca/ and certs/ directories
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Bootstrap the Certificate Authority (no-op if one exists)")]
    Init {
        #[arg(long, help = "Replace an existing CA, orphaning all issued certificates")]
        force: bool,

        #[arg(short, long, default_value = "rsa4096", help = "Key algorithm")]
        algorithm: String,

        #[arg(short, long, default_value_t = DEFAULT_CA_VALIDITY_DAYS, help = "Validity in days")]
        validity: u32,
    },

    #[command(about = "Issue a CA-signed certificate for a domain")]
    Sign {
        #[arg(help = "Domain name, wildcard forms like *.example.com allowed")]
        domain: String,

        #[arg(long, help = "Overwrite existing files for this domain")]
        force: bool,

        #[arg(short, long, default_value = "rsa2048", help = "Key algorithm")]
        algorithm: String,

        #[arg(short, long, default_value_t = DEFAULT_LEAF_VALIDITY_DAYS, help = "Validity in days")]
        validity: u32,

        #[arg(long, help = "Additional DNS Subject Alternative Names", value_delimiter = ',')]
        dns: Vec<String>,
    },

    #[command(about = "Print the decoded contents of a certificate file")]
    Info {
        #[arg(help = "Path to a PEM certificate")]
        path: PathBuf,

        #[arg(short, long, default_value = "pretty", help = "Output format: pretty or json")]
        format: String,
    },
}

#[cfg(feature = "cli")]
pub fn run_cli() -> Result<()> {
    match Cli::try_parse() {
        Ok(cli) => run(cli),
        Err(e) => handle_parse_error(e),
    }
}

/// Usage mistakes exit 1 through the normal error path; `--help` and
/// `--version` are not errors.
#[cfg(feature = "cli")]
fn handle_parse_error(e: clap::Error) -> Result<()> {
    use clap::error::ErrorKind;
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            e.print()?;
            Ok(())
        }
        _ => Err(Error::InvalidInput(e.to_string())),
    }
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let store = CertStore::new(&cli.root);

    match command {
        Commands::Init {
            force,
            algorithm,
            validity,
        } => {
            let algo = algorithm.parse::<KeyAlgorithm>()?;
            let reusing = store.ca_present() && !force;

            let opts = CaOptions {
                algorithm: algo,
                validity_days: validity,
                ..CaOptions::default()
            };
            let ca = CertificateAuthority::create(&store, opts, force)?;

            if reusing {
                println!("{}", "Existing CA found, leaving it in place.".green().bold());
            } else {
                println!("{}", "CA created successfully!".green().bold());
                println!("  {}: {} days", "Validity".cyan(), validity);
            }
            println!("  {}: {}", "Certificate".cyan(), store.ca_cert_path().display());
            println!("  {}: {}", "Private Key".cyan(), store.ca_key_path().display());
            println!("  {}: {}", "Algorithm".cyan(), ca.algorithm().name());
        }

        Commands::Sign {
            domain,
            force,
            algorithm,
            validity,
            dns,
        } => {
            let algo = algorithm.parse::<KeyAlgorithm>()?;

            let mut request = LeafRequest::new(&domain)
                .with_algorithm(algo)
                .with_validity_days(validity);
            for d in dns {
                request = request.with_dns_san(d);
            }

            let issued = issue_and_save(&store, &request, force)?;

            println!("{}", "Certificate issued successfully!".green().bold());
            println!(
                "  {}: {}",
                "Certificate".cyan(),
                store.leaf_cert_path(&domain).display()
            );
            println!(
                "  {}: {}",
                "Private Key".cyan(),
                store.leaf_key_path(&domain).display()
            );
            println!("  {}: {}", "Serial".cyan(), issued.serial);
            println!("  {}: {} days", "Validity".cyan(), validity);
        }

        Commands::Info { path, format } => {
            let output_format = match format.to_lowercase().as_str() {
                "pretty" => OutputFormat::Pretty,
                #[cfg(feature = "json")]
                "json" => OutputFormat::Json,
                _ => {
                    return Err(crate::error::Error::InvalidInput(format!(
                        "Invalid format: {}",
                        format
                    )))
                }
            };

            let description = describe_certificate(&path)?;
            println!("{}", display_certificate(&description, output_format)?);
        }
    }

    Ok(())
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_is_invalid_input() {
        let err = Cli::try_parse_from(["certgen", "sign"]).unwrap_err();
        match handle_parse_error(err) {
            Err(Error::InvalidInput(_)) => {}
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_help_request_is_not_an_error() {
        let err = Cli::try_parse_from(["certgen", "--help"]).unwrap_err();
        assert!(handle_parse_error(err).is_ok());
    }
}
