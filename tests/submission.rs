use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use dfnclient::{
    csr::san::AltNames,
    soap::Endpoints,
    submission::{RequestNumber, SubmissionResult},
    Applicant, CertificateRequestSubmission, Environment, Pin, SoapClient,
    SubmissionError,
};
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const HASHED_1234: &str = "7110eda4d09e062aa5e4a390b0a572ac0d2c0220";
const NEW_REQUEST_ACTION: &str = "\"urn:DFNCERT/Public#newRequest\"";
const PRINTOUT_ACTION: &str = "\"urn:DFNCERT/Public#getRequestPrintout\"";
const PDF: &[u8] = b"%PDF-1.4\n% certificate request printout\n%%EOF\n";

fn response(operation: &str, value: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <SOAP-ENV:Body>
    <ns1:{operation}Response xmlns:ns1="urn:DFNCERT/Public">
      <Result xsi:type="xsd:string">{value}</Result>
    </ns1:{operation}Response>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#
    )
}

fn fault(message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <SOAP-ENV:Fault>
      <faultcode>SOAP-ENV:Server</faultcode>
      <faultstring>{message}</faultstring>
    </SOAP-ENV:Fault>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#
    )
}

/// The printout as the CA sends it: base64 with line breaks.
fn encoded_pdf() -> String {
    let encoded = STANDARD.encode(PDF);
    let lines: Vec<&str> = encoded
        .as_bytes()
        .chunks(16)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect();
    lines.join("\n")
}

fn submission(
    environment: Environment,
    only_request_number: bool,
) -> CertificateRequestSubmission {
    CertificateRequestSubmission {
        csr_pem: "-----BEGIN CERTIFICATE REQUEST-----\nMIIB\n-----END CERTIFICATE REQUEST-----\n"
            .into(),
        fqdn: "host.example.org".into(),
        alt_names: AltNames::for_fqdn("host.example.org", ["www.example.org"]),
        role: "Web Server".into(),
        pin: Pin::new("1234").unwrap(),
        applicant: Applicant {
            name: "Jane Roe".into(),
            email: "jane.roe@example.org".into(),
            unit: "Department of Computer Science".into(),
        },
        raid: 101,
        environment,
        only_request_number,
    }
}

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints {
        production: format!("{}/production", server.uri()),
        test: format!("{}/test", server.uri()),
    }
}

async fn submit(
    endpoints: Endpoints,
    submission: CertificateRequestSubmission,
    timeout: Duration,
) -> Result<SubmissionResult, SubmissionError> {
    // The blocking client must neither be built nor dropped on the runtime.
    tokio::task::spawn_blocking(
        move || -> Result<SubmissionResult, SubmissionError> {
            SoapClient::new(endpoints, timeout)?.submit(&submission)
        },
    )
    .await
    .unwrap()
}

async fn mount_new_request(server: &MockServer, env_path: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(env_path))
        .and(header("SOAPAction", NEW_REQUEST_ACTION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(response("newRequest", "4711")),
        )
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_printout(server: &MockServer, env_path: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(env_path))
        .and(header("SOAPAction", PRINTOUT_ACTION))
        .and(body_string_contains("<Serial xsi:type=\"xsd:int\">4711</Serial>"))
        .and(body_string_contains(
            "<Format xsi:type=\"xsd:string\">application/pdf</Format>",
        ))
        .and(body_string_contains(format!(
            "<Pin xsi:type=\"xsd:string\">{HASHED_1234}</Pin>"
        )))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(response(
                "getRequestPrintout",
                &encoded_pdf(),
            )),
        )
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_flag_uses_test_ca_and_hashed_pin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test"))
        .and(header("SOAPAction", NEW_REQUEST_ACTION))
        .and(body_string_contains("<RaID xsi:type=\"xsd:int\">101</RaID>"))
        .and(body_string_contains(format!(
            "<Pin xsi:type=\"xsd:string\">{HASHED_1234}</Pin>"
        )))
        .and(body_string_contains(
            "<AltNames xsi:type=\"SOAP-ENC:Array\" SOAP-ENC:arrayType=\"xsd:string[2]\">\
             <item xsi:type=\"xsd:string\">host.example.org</item>\
             <item xsi:type=\"xsd:string\">www.example.org</item></AltNames>",
        ))
        .and(body_string_contains("<Role xsi:type=\"xsd:string\">Web Server</Role>"))
        .and(body_string_contains("<AddName xsi:type=\"xsd:string\">Jane Roe</AddName>"))
        .and(body_string_contains(
            "<AddEMail xsi:type=\"xsd:string\">jane.roe@example.org</AddEMail>",
        ))
        .and(body_string_contains("<Publish xsi:type=\"xsd:boolean\">true</Publish>"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(response("newRequest", "4711")),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_printout(&server, "/test", 1).await;
    mount_new_request(&server, "/production", 0).await;

    let result = submit(
        endpoints(&server),
        submission(Environment::Test, false),
        Duration::from_secs(10),
    )
    .await
    .unwrap();

    assert_eq!(result.request_number, RequestNumber::new("4711"));
    assert_eq!(result.document.as_deref(), Some(PDF));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in requests {
        let body = String::from_utf8_lossy(&request.body);
        assert!(!body.contains(">1234<"), "pin sent in clear text");
    }
}

#[tokio::test]
async fn production_is_the_default() {
    let server = MockServer::start().await;
    mount_new_request(&server, "/production", 1).await;
    mount_printout(&server, "/production", 1).await;
    mount_new_request(&server, "/test", 0).await;

    let result = submit(
        endpoints(&server),
        submission(Environment::from_test_flag(false), false),
        Duration::from_secs(10),
    )
    .await
    .unwrap();
    assert_eq!(result.document.as_deref(), Some(PDF));
}

#[tokio::test]
async fn only_request_number_skips_printout() {
    let server = MockServer::start().await;
    mount_new_request(&server, "/test", 1).await;
    mount_printout(&server, "/test", 0).await;

    let result = submit(
        endpoints(&server),
        submission(Environment::Test, true),
        Duration::from_secs(10),
    )
    .await
    .unwrap();
    assert_eq!(result.request_number.as_str(), "4711");
    assert!(result.document.is_none());
}

#[tokio::test]
async fn fault_on_submit_stops_everything() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", NEW_REQUEST_ACTION))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string(fault("Invalid PKCS#10 request")),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_printout(&server, "/test", 0).await;

    let err = submit(
        endpoints(&server),
        submission(Environment::Test, false),
        Duration::from_secs(10),
    )
    .await
    .unwrap_err();
    match err {
        SubmissionError::Fault { code, message, .. } => {
            assert_eq!(code, "SOAP-ENV:Server");
            assert_eq!(message, "Invalid PKCS#10 request");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn failed_printout_still_reports_request_number() {
    let server = MockServer::start().await;
    mount_new_request(&server, "/test", 1).await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", PRINTOUT_ACTION))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(fault("not yet")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = submit(
        endpoints(&server),
        submission(Environment::Test, false),
        Duration::from_secs(10),
    )
    .await
    .unwrap_err();
    assert_eq!(err.request_number(), Some(&RequestNumber::new("4711")));
    assert!(matches!(
        err,
        SubmissionError::Printout { ref source, .. }
            if matches!(**source, SubmissionError::Fault { .. })
    ));
}

#[tokio::test]
async fn broken_base64_is_a_protocol_error() {
    let server = MockServer::start().await;
    mount_new_request(&server, "/test", 1).await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", PRINTOUT_ACTION))
        .respond_with(ResponseTemplate::new(200).set_body_string(response(
            "getRequestPrintout",
            "not*base64",
        )))
        .mount(&server)
        .await;

    let err = submit(
        endpoints(&server),
        submission(Environment::Test, false),
        Duration::from_secs(10),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::Printout { ref source, .. }
            if matches!(**source, SubmissionError::Protocol { .. })
    ));
}

#[tokio::test]
async fn http_error_without_fault() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = submit(
        endpoints(&server),
        submission(Environment::Test, false),
        Duration::from_secs(10),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::Status { status, .. } if status.as_u16() == 404
    ));
}

#[tokio::test]
async fn slow_ca_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(response("newRequest", "4711"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = submit(
        endpoints(&server),
        submission(Environment::Test, true),
        Duration::from_millis(300),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SubmissionError::Transport { .. }));
}

#[tokio::test]
async fn invalid_applicant_never_reaches_the_ca() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut submission = submission(Environment::Test, false);
    submission.applicant.email = "jane".into();
    let err = submit(endpoints(&server), submission, Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Input(_)));
}

#[tokio::test]
async fn zero_padded_request_number_is_echoed_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", NEW_REQUEST_ACTION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(response("newRequest", "0042")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("SOAPAction", PRINTOUT_ACTION))
        .and(body_string_contains(
            "<Serial xsi:type=\"xsd:string\">0042</Serial>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(response(
            "getRequestPrintout",
            &encoded_pdf(),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let result = submit(
        endpoints(&server),
        submission(Environment::Test, false),
        Duration::from_secs(10),
    )
    .await
    .unwrap();
    assert_eq!(result.request_number.as_str(), "0042");
    assert_eq!(result.document.as_deref(), Some(PDF));
}
