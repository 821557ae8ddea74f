use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Request server certificates from the DFN-PKI.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// the config file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    /// Output dir, defaults to the current directory.
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,
    /// Fail instead of asking for missing values.
    #[arg(long, global = true)]
    pub non_interactive: bool,
    /// Overwrite existing key, request and pdf files.
    #[arg(long, short, global = true)]
    pub force: bool,
    /// Log more, repeat for debug output.
    #[arg(long, short, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new key and certificate signing request and submit it.
    Create(CreateArgs),
    /// Create a certificate signing request for an existing key and submit it.
    Csr(CsrArgs),
    /// Print an example config.
    Config,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub fqdn: String,
    /// Protect the new private key with a password.
    #[arg(long)]
    pub encrypt_key: bool,
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Args, Debug)]
pub struct CsrArgs {
    pub fqdn: String,
    /// PEM encoded RSA private key.
    pub key: PathBuf,
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Additional subject alternative name, may be repeated.
    #[arg(long = "alt-name", short = 'n')]
    pub alt_names: Vec<String>,
    /// Applicant pin, asked for when missing.
    #[arg(long, short)]
    pub pin: Option<String>,
    /// Name of the applicant, defaults to the config value.
    #[arg(long, short)]
    pub applicant: Option<String>,
    /// Email of the applicant, defaults to the config value.
    #[arg(long, short)]
    pub mail: Option<String>,
    /// Organizational unit, defaults to the config value.
    #[arg(long, short)]
    pub unit: Option<String>,
    /// Registration authority id, defaults to the config value.
    #[arg(long)]
    pub raid: Option<u32>,
    /// Certificate profile, defaults to the config value.
    #[arg(long)]
    pub profile: Option<String>,
    /// Send the request to the test CA.
    #[arg(long, short)]
    pub test: bool,
    /// Only print the request number, don't fetch the pdf.
    #[arg(long)]
    pub only_request_number: bool,
    /// Don't ask before generating and submitting.
    #[arg(long, short)]
    pub yes: bool,
}
