use std::{env::current_dir, path::Path};

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use dfnclient::{
    config::{example_config, read_config, Config},
    csr::{self, san::AltNames, CsrError, CsrRequest},
    output::{Artifact, OutputDir},
    Applicant, CertificateRequestSubmission, Environment, Pin, SoapClient,
};
use rustyline::DefaultEditor;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, RequestArgs};

mod cli;
mod utils;

#[derive(Clone, Copy)]
enum KeySource<'a> {
    Generate { encrypt: bool },
    Existing(&'a Path),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (fqdn, key, args) = match &cli.command {
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&example_config())?);
            return Ok(());
        }
        Commands::Create(args) => (
            args.fqdn.as_str(),
            KeySource::Generate {
                encrypt: args.encrypt_key,
            },
            &args.request,
        ),
        Commands::Csr(args) => (
            args.fqdn.as_str(),
            KeySource::Existing(&args.key),
            &args.request,
        ),
    };

    let app = ProjectDirs::from("de", "dfn", "dfnclient")
        .context("can't determine the config directory")?;
    let config = read_config(&app, cli.config.as_deref())?;

    request_certificate(&cli, &config, fqdn, key, args)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn request_certificate(
    cli: &Cli,
    config: &Config,
    fqdn: &str,
    key: KeySource<'_>,
    args: &RequestArgs,
) -> anyhow::Result<()> {
    let interactive = !cli.non_interactive;
    let mut rl = DefaultEditor::new()?;

    let out_dir = match &cli.out {
        Some(out) => out.clone(),
        None => current_dir()?,
    };
    let out = OutputDir::new(out_dir, cli.force);
    let mut artifacts = vec![Artifact::Request];
    if matches!(key, KeySource::Generate { .. }) {
        artifacts.push(Artifact::PrivateKey);
    }
    if !args.only_request_number {
        artifacts.push(Artifact::Printout);
    }
    out.check_free(fqdn, &artifacts)?;

    let applicant = Applicant {
        name: utils::value_or_prompt(
            &mut rl,
            args.applicant.as_deref(),
            config.applicant.as_deref(),
            "Applicant name",
            interactive,
        )?,
        email: utils::value_or_prompt(
            &mut rl,
            args.mail.as_deref(),
            config.mail.as_deref(),
            "Applicant email",
            interactive,
        )?,
        unit: utils::value_or_prompt(
            &mut rl,
            args.unit.as_deref(),
            config.unit.as_deref(),
            "Organizational unit",
            interactive,
        )?,
    };
    applicant.validate()?;

    let pin = match &args.pin {
        Some(pin) => Pin::new(pin.as_str())?,
        None if interactive => {
            let pin = utils::prompt_secret_confirmed("Pin")?;
            Pin::new(pin.expose_secret())?
        }
        None => anyhow::bail!("no pin given"),
    };

    let password = match key {
        KeySource::Generate { encrypt: true } if interactive => {
            Some(utils::prompt_secret_confirmed("Key password")?)
        }
        KeySource::Generate { encrypt: true } => {
            anyhow::bail!("--encrypt-key needs an interactive terminal")
        }
        _ => None,
    };

    let alt_names = AltNames::for_fqdn(fqdn, args.alt_names.iter().cloned());
    let mut request =
        CsrRequest::new(fqdn, &config.subject, alt_names, password);
    request.validate()?;

    let environment = Environment::from_test_flag(args.test);
    let role = args.profile.as_deref().unwrap_or(&config.ca.profile);
    let raid = args.raid.unwrap_or(config.ca.raid);

    println!("Requesting a certificate with the following values:\n");
    println!("  subject:    {}", request.subject);
    println!("  alt names:  {}", request.alt_names.as_slice().join(", "));
    println!("  applicant:  {} <{}>", applicant.name, applicant.email);
    println!("  unit:       {}", applicant.unit);
    println!("  profile:    {role}");
    println!("  raid:       {raid}");
    println!("  CA:         {environment}\n");
    if interactive
        && !args.yes
        && !utils::prompt_question(&mut rl, "Are these values correct? (Y/n) ")?
    {
        anyhow::bail!("aborted");
    }

    let csr_pem = match key {
        KeySource::Generate { .. } => {
            println!("Generating key and certificate signing request");
            let generated = csr::generate_key_and_csr(&request)
                .context("can't create csr")?;
            out.write(
                fqdn,
                Artifact::PrivateKey,
                generated.private_key_pem.expose_secret().as_bytes(),
            )?;
            generated.csr_pem
        }
        KeySource::Existing(key_path) => {
            println!("Generating certificate signing request");
            csr_for_existing_key(key_path, &mut request, interactive, || {
                utils::prompt_secret("Key password > ")
            })?
        }
    };
    out.write(fqdn, Artifact::Request, csr_pem.as_bytes())?;

    let submission = CertificateRequestSubmission {
        csr_pem,
        fqdn: fqdn.to_owned(),
        alt_names: request.alt_names,
        role: role.to_owned(),
        pin,
        applicant,
        raid,
        environment,
        only_request_number: args.only_request_number,
    };
    let client = SoapClient::new(config.ca.endpoints(), config.ca.timeout())?;
    let result = client
        .submit(&submission)
        .context("submitting the request failed")?;

    println!("Request number: {}", result.request_number);
    if let Some(document) = result.document {
        let path = out.write(fqdn, Artifact::Printout, &document)?;
        println!("Generated pdf at: {}", path.display());
    }
    Ok(())
}

/// Signs with an existing key. A locked key makes it call `ask_password`
/// once and try again, never more often.
fn csr_for_existing_key(
    key_path: &Path,
    request: &mut CsrRequest,
    interactive: bool,
    ask_password: impl FnOnce() -> anyhow::Result<SecretString>,
) -> anyhow::Result<String> {
    match csr::csr_for_existing_key(key_path, request) {
        Err(CsrError::KeyDecryption(err)) if interactive => {
            warn!("{err}");
            request.password = Some(ask_password()?);
            csr::csr_for_existing_key(key_path, request)
                .context("can't create csr")
        }
        result => result.context("can't create csr"),
    }
}
