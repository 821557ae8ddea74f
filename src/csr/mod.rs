//! Construction of the PKCS#10 certificate signing request.

use std::{
    io,
    path::{Path, PathBuf},
};

use rcgen::{Certificate, CertificateParams, PKCS_RSA_SHA256};
use rsa::RsaPrivateKey;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{require, InputError};

use self::{dn::SubjectName, san::AltNames};

pub mod dn;
pub mod key;
pub mod san;

#[derive(Debug, Error)]
pub enum CsrError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("can't read private key {path:?}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't parse private key: {0}")]
    KeyParse(String),

    #[error(transparent)]
    KeyDecryption(#[from] KeyDecryptionError),

    #[error("can't generate RSA key")]
    KeyGeneration(#[source] rsa::Error),

    #[error("can't encode private key: {0}")]
    KeyEncode(String),

    #[error("can't build certificate signing request")]
    CsrBuild(#[source] rcgen::RcgenError),
}

/// The private key could not be decrypted.
///
/// The caller may ask for a password and try again.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecryptionError {
    #[error("private key is encrypted, a password is required")]
    PasswordRequired,

    #[error("can't decrypt private key, wrong password?")]
    WrongPassword,
}

/// Everything needed to build one certificate signing request.
#[derive(Debug)]
pub struct CsrRequest {
    pub fqdn: String,
    pub alt_names: AltNames,
    pub subject: SubjectName,
    /// Protects a newly generated private key, or unlocks an existing one.
    pub password: Option<SecretString>,
}

impl CsrRequest {
    /// Creates a request with the `{fqdn}` placeholder of `subject` resolved.
    pub fn new(
        fqdn: impl Into<String>,
        subject: &SubjectName,
        alt_names: AltNames,
        password: Option<SecretString>,
    ) -> Self {
        let fqdn = fqdn.into();
        Self {
            subject: subject.resolve(&fqdn),
            fqdn,
            alt_names,
            password,
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        require("fqdn", &self.fqdn)?;
        self.subject.validate()
    }
}

/// A freshly generated key together with its request.
#[derive(Debug)]
pub struct GeneratedCsr {
    /// PEM, encrypted when the request carried a password.
    pub private_key_pem: SecretString,
    pub csr_pem: String,
}

/// Generates a new RSA key and a request signed by it.
pub fn generate_key_and_csr(
    request: &CsrRequest,
) -> Result<GeneratedCsr, CsrError> {
    request.validate()?;

    info!(fqdn = %request.fqdn, bits = key::RSA_KEY_BITS, "generating RSA key");
    let private_key = key::generate_rsa_key()?;
    let csr_pem = sign_request(&private_key, request)?;
    let private_key_pem =
        key::private_key_to_pem(&private_key, request.password.as_ref())?;

    Ok(GeneratedCsr {
        private_key_pem,
        csr_pem,
    })
}

/// Builds a request signed by the key stored at `key_path`.
///
/// An encrypted key without a password in `request` fails with
/// [`KeyDecryptionError::PasswordRequired`].
pub fn csr_for_existing_key(
    key_path: &Path,
    request: &CsrRequest,
) -> Result<String, CsrError> {
    request.validate()?;

    info!(fqdn = %request.fqdn, key = ?key_path, "loading existing key");
    let private_key =
        key::load_private_key(key_path, request.password.as_ref())?;
    sign_request(&private_key, request)
}

/// Signs a PKCS#10 request for `request` with SHA-256 and returns it as PEM.
pub fn sign_request(
    private_key: &RsaPrivateKey,
    request: &CsrRequest,
) -> Result<String, CsrError> {
    let mut params = CertificateParams::default();
    params.alg = &PKCS_RSA_SHA256;
    params.key_pair = Some(key::signing_key_pair(private_key)?);
    params.distinguished_name = (&request.subject).into();
    // An empty list leaves the extension request out entirely.
    params.subject_alt_names = request.alt_names.clone().into_san_type();

    let csr = Certificate::from_params(params)
        .and_then(|cert| cert.serialize_request_pem())
        .map_err(CsrError::CsrBuild)?;
    debug!(
        fqdn = %request.fqdn,
        alt_names = request.alt_names.as_slice().len(),
        "signed certificate request"
    );
    Ok(csr)
}
