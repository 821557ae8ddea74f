//! Request server certificates from the DFN-PKI.
//!
//! [`csr`] builds an RSA key and a PKCS#10 request, [`soap`] files the
//! request with the CA and fetches the printout the applicant has to sign.

pub mod config;
pub mod csr;
pub mod error;
pub mod output;
pub mod soap;
pub mod submission;

pub use csr::{CsrError, CsrRequest, KeyDecryptionError};
pub use error::InputError;
pub use soap::{SoapClient, SubmissionError};
pub use submission::{
    Applicant, CertificateRequestSubmission, Environment, Pin,
    SubmissionResult,
};
