//! Client for the DFN-PKI public SOAP interface.
//!
//! A submission is two calls: `newRequest` files the CSR and returns a
//! request number, `getRequestPrintout` fetches the signed request form as
//! PDF. Nothing is retried, a resubmission would create a second request
//! at the CA.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{
    blocking::Client,
    header::{HeaderValue, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    error::InputError,
    submission::{
        CertificateRequestSubmission, Environment, HashedPin, RequestNumber,
        SubmissionResult,
    },
};

use self::envelope::{Reply, Value};

mod envelope;

pub const PRODUCTION_ENDPOINT: &str =
    "https://pki.pca.dfn.de/dfn-ca-global-g2/cgi-bin/pub/soap";
pub const TEST_ENDPOINT: &str =
    "https://pki.pca.dfn.de/test-eins-ca/cgi-bin/pub/soap";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const NEW_REQUEST: &str = "newRequest";
const GET_REQUEST_PRINTOUT: &str = "getRequestPrintout";
const PRINTOUT_FORMAT: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("{operation} failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} answered with HTTP status {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("{operation} failed with fault {code}: {message}")]
    Fault {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("{operation} returned an unexpected response: {reason}")]
    Protocol {
        operation: &'static str,
        reason: String,
    },

    #[error("malformed SOAP message for {operation}")]
    Xml {
        operation: &'static str,
        #[source]
        source: quick_xml::Error,
    },

    /// The request was filed, only the printout is missing.
    #[error("request {request_number} was submitted, but fetching its printout failed")]
    Printout {
        request_number: RequestNumber,
        #[source]
        source: Box<SubmissionError>,
    },
}

impl SubmissionError {
    /// The request number, if the CA already accepted the request.
    pub fn request_number(&self) -> Option<&RequestNumber> {
        match self {
            Self::Printout { request_number, .. } => Some(request_number),
            _ => None,
        }
    }
}

/// Service URLs of the two CA instances.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Endpoints {
    pub production: String,
    pub test: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            production: PRODUCTION_ENDPOINT.into(),
            test: TEST_ENDPOINT.into(),
        }
    }
}

impl Endpoints {
    pub fn select(&self, environment: Environment) -> &str {
        match environment {
            Environment::Test => &self.test,
            Environment::Production => &self.production,
        }
    }
}

pub struct SoapClient {
    http: Client,
    endpoints: Endpoints,
}

impl SoapClient {
    pub fn new(
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self, SubmissionError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|source| SubmissionError::Transport {
                operation: "client setup",
                source,
            })?;
        Ok(Self { http, endpoints })
    }

    /// Files `submission` with the CA and, unless only the request number
    /// was asked for, fetches the printout.
    pub fn submit(
        &self,
        submission: &CertificateRequestSubmission,
    ) -> Result<SubmissionResult, SubmissionError> {
        submission.validate()?;

        let pin = submission.pin.hashed();
        let endpoint = self.endpoints.select(submission.environment);
        info!(
            fqdn = %submission.fqdn,
            environment = %submission.environment,
            raid = submission.raid,
            "submitting certificate request"
        );
        debug!(endpoint, "selected CA endpoint");

        let request_number = self.new_request(endpoint, submission, &pin)?;
        info!(%request_number, "request accepted");

        if submission.only_request_number {
            return Ok(SubmissionResult {
                request_number,
                document: None,
            });
        }

        match self.request_printout(
            endpoint,
            submission.raid,
            &request_number,
            &pin,
        ) {
            Ok(document) => Ok(SubmissionResult {
                request_number,
                document: Some(document),
            }),
            Err(source) => {
                warn!(%request_number, "printout failed: {source}");
                Err(SubmissionError::Printout {
                    request_number,
                    source: Box::new(source),
                })
            }
        }
    }

    fn new_request(
        &self,
        endpoint: &str,
        submission: &CertificateRequestSubmission,
        pin: &HashedPin,
    ) -> Result<RequestNumber, SubmissionError> {
        let params = [
            ("RaID", Value::Int(submission.raid.into())),
            ("PKCS10", Value::Str(&submission.csr_pem)),
            ("AltNames", Value::StrArray(submission.alt_names.as_slice())),
            ("Role", Value::Str(&submission.role)),
            ("Pin", Value::Str(pin.expose())),
            ("AddName", Value::Str(&submission.applicant.name)),
            ("AddEMail", Value::Str(&submission.applicant.email)),
            ("AddOrgUnit", Value::Str(&submission.applicant.unit)),
            ("Publish", Value::Bool(true)),
        ];
        let number = self.call(endpoint, NEW_REQUEST, &params)?;
        if number.trim().is_empty() {
            return Err(SubmissionError::Protocol {
                operation: NEW_REQUEST,
                reason: "empty request number".into(),
            });
        }
        Ok(RequestNumber::new(number))
    }

    fn request_printout(
        &self,
        endpoint: &str,
        raid: u32,
        request_number: &RequestNumber,
        pin: &HashedPin,
    ) -> Result<Vec<u8>, SubmissionError> {
        let serial = match request_number.as_int() {
            Some(serial) => Value::Int(serial),
            None => Value::Str(request_number.as_str()),
        };
        let params = [
            ("RaID", Value::Int(raid.into())),
            ("Serial", serial),
            ("Format", Value::Str(PRINTOUT_FORMAT)),
            ("Pin", Value::Str(pin.expose())),
        ];
        let encoded = self.call(endpoint, GET_REQUEST_PRINTOUT, &params)?;
        let encoded: String =
            encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let document = STANDARD.decode(encoded).map_err(|err| {
            SubmissionError::Protocol {
                operation: GET_REQUEST_PRINTOUT,
                reason: format!("printout is not valid base64: {err}"),
            }
        })?;
        debug!(bytes = document.len(), "received printout");
        Ok(document)
    }

    /// Performs one SOAP call and returns the text of its return value.
    fn call(
        &self,
        endpoint: &str,
        operation: &'static str,
        params: &[(&str, Value<'_>)],
    ) -> Result<String, SubmissionError> {
        let body = envelope::encode_call(operation, params)
            .map_err(|source| SubmissionError::Xml { operation, source })?;
        let action = format!("\"{}#{operation}\"", envelope::SERVICE_NAMESPACE);

        let response = self
            .http
            .post(endpoint)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/xml; charset=utf-8"),
            )
            .header("SOAPAction", action)
            .body(body)
            .send()
            .map_err(|source| SubmissionError::Transport { operation, source })?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|source| SubmissionError::Transport { operation, source })?;
        debug!(operation, %status, "SOAP response");

        // Faults usually come with status 500, so look at the body first.
        let reply = envelope::decode_reply(&text, operation);
        match reply {
            Ok(Some(Reply::Fault { code, message })) => {
                Err(SubmissionError::Fault {
                    operation,
                    code,
                    message,
                })
            }
            _ if !status.is_success() => {
                Err(SubmissionError::Status { operation, status })
            }
            Ok(Some(Reply::Return(value))) => Ok(value),
            Ok(None) => Err(SubmissionError::Protocol {
                operation,
                reason: format!("no {operation}Response in body"),
            }),
            Err(source) => Err(SubmissionError::Xml { operation, source }),
        }
    }
}
