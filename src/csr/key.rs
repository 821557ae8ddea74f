use std::{fs, path::Path};

use pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand_core::OsRng;
use rsa::{pkcs1::DecodeRsaPrivateKey, RsaPrivateKey};
use secrecy::{ExposeSecret, SecretString};

use super::{CsrError, KeyDecryptionError};

/// Modulus size of newly generated keys.
pub const RSA_KEY_BITS: usize = 4096;

const ENCRYPTED_PKCS8_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";

/// Generates a [`RSA_KEY_BITS`] RSA key with public exponent 65537.
pub fn generate_rsa_key() -> Result<RsaPrivateKey, CsrError> {
    RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(CsrError::KeyGeneration)
}

/// Serializes `key` as PKCS#8 PEM.
///
/// A non-empty password selects `ENCRYPTED PRIVATE KEY` (PBES2), otherwise
/// the key is written in the clear.
pub fn private_key_to_pem(
    key: &RsaPrivateKey,
    password: Option<&SecretString>,
) -> Result<SecretString, CsrError> {
    let pem = match non_empty(password) {
        Some(password) => {
            key.to_pkcs8_encrypted_pem(&mut OsRng, password, LineEnding::LF)
        }
        None => key.to_pkcs8_pem(LineEnding::LF),
    }
    .map_err(|err| CsrError::KeyEncode(err.to_string()))?;
    Ok(SecretString::from(pem.as_str().to_owned()))
}

pub fn load_private_key(
    path: &Path,
    password: Option<&SecretString>,
) -> Result<RsaPrivateKey, CsrError> {
    let data = fs::read_to_string(path).map_err(|source| {
        CsrError::ReadKey {
            path: path.to_owned(),
            source,
        }
    })?;
    parse_private_key_pem(&data, password)
}

/// Parses a PKCS#8, encrypted PKCS#8 or PKCS#1 RSA private key.
pub fn parse_private_key_pem(
    data: &str,
    password: Option<&SecretString>,
) -> Result<RsaPrivateKey, CsrError> {
    let block =
        pem::parse(data).map_err(|err| CsrError::KeyParse(err.to_string()))?;
    let password = non_empty(password);

    match block.tag() {
        ENCRYPTED_PKCS8_LABEL => {
            let password =
                password.ok_or(KeyDecryptionError::PasswordRequired)?;
            RsaPrivateKey::from_pkcs8_encrypted_der(block.contents(), password)
                .map_err(|_| KeyDecryptionError::WrongPassword.into())
        }
        PKCS8_LABEL => RsaPrivateKey::from_pkcs8_der(block.contents())
            .map_err(|err| CsrError::KeyParse(err.to_string())),
        PKCS1_LABEL => {
            let legacy_encrypted = block
                .headers()
                .get("Proc-Type")
                .is_some_and(|value| value.contains("ENCRYPTED"));
            if legacy_encrypted {
                password.ok_or(KeyDecryptionError::PasswordRequired)?;
                return Err(CsrError::KeyParse(
                    "legacy OpenSSL PEM encryption is not supported, convert \
                     the key with `openssl pkcs8 -topk8`"
                        .into(),
                ));
            }
            RsaPrivateKey::from_pkcs1_der(block.contents())
                .map_err(|err| CsrError::KeyParse(err.to_string()))
        }
        other => Err(CsrError::KeyParse(format!(
            "unsupported PEM block {other:?}, expected an RSA private key"
        ))),
    }
}

/// Converts `key` into the key pair used to sign the request.
pub(crate) fn signing_key_pair(
    key: &RsaPrivateKey,
) -> Result<rcgen::KeyPair, CsrError> {
    let der = key
        .to_pkcs8_der()
        .map_err(|err| CsrError::KeyEncode(err.to_string()))?;
    rcgen::KeyPair::from_der(der.as_bytes()).map_err(CsrError::CsrBuild)
}

fn non_empty(password: Option<&SecretString>) -> Option<&str> {
    password
        .map(ExposeSecret::expose_secret)
        .filter(|password| !password.is_empty())
}
