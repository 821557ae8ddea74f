//! Data sent to and received from the CA.

use std::fmt;

use email_address_parser::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};

use crate::{
    csr::san::AltNames,
    error::{require, InputError},
};

/// Which CA instance receives the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    pub fn from_test_flag(test: bool) -> Self {
        if test {
            Self::Test
        } else {
            Self::Production
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => f.write_str("test"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Applicant PIN, as chosen when the request is submitted.
///
/// The CA needs it later to approve or revoke the certificate. It only ever
/// leaves this process as [`Pin::hashed`].
#[derive(Debug)]
pub struct Pin(SecretString);

impl Pin {
    /// Accepts a string of decimal digits. Leading zeros are kept.
    pub fn new(pin: impl Into<String>) -> Result<Self, InputError> {
        let pin = pin.into();
        if pin.is_empty() || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InputError::InvalidPin);
        }
        Ok(Self(SecretString::from(pin)))
    }

    /// Lowercase hex SHA-1 of the decimal PIN string.
    ///
    /// This is the encoding the CA expects on the wire, nothing more.
    pub fn hashed(&self) -> HashedPin {
        let digest = Sha1::digest(self.0.expose_secret().as_bytes());
        HashedPin(SecretString::from(hex::encode(digest)))
    }
}

#[derive(Debug)]
pub struct HashedPin(SecretString);

impl HashedPin {
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// The person responsible for the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applicant {
    pub name: String,
    pub email: String,
    pub unit: String,
}

impl Applicant {
    pub fn validate(&self) -> Result<(), InputError> {
        require("applicant name", &self.name)?;
        require("applicant email", &self.email)?;
        require("organizational unit", &self.unit)?;
        if EmailAddress::parse(&self.email, None).is_none() {
            return Err(InputError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// A signed request plus the metadata the CA wants with it.
#[derive(Debug)]
pub struct CertificateRequestSubmission {
    pub csr_pem: String,
    pub fqdn: String,
    pub alt_names: AltNames,
    /// Certificate profile, e.g. "Web Server".
    pub role: String,
    pub pin: Pin,
    pub applicant: Applicant,
    /// Registration authority the request is filed under.
    pub raid: u32,
    pub environment: Environment,
    /// Stop after the request number, skip the printout.
    pub only_request_number: bool,
}

impl CertificateRequestSubmission {
    pub fn validate(&self) -> Result<(), InputError> {
        require("certificate request", &self.csr_pem)?;
        require("fqdn", &self.fqdn)?;
        require("role", &self.role)?;
        self.applicant.validate()
    }
}

/// Serial the CA assigned to a submitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestNumber(String);

impl RequestNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number as integer, if that prints back to the same text.
    ///
    /// `"0042"` stays a string, the CA gets it back unchanged.
    pub fn as_int(&self) -> Option<i64> {
        self.0
            .parse::<i64>()
            .ok()
            .filter(|number| number.to_string() == self.0)
    }
}

impl fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct SubmissionResult {
    pub request_number: RequestNumber,
    /// The printout, `None` when only the request number was asked for.
    pub document: Option<Vec<u8>>,
}
