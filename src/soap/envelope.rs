//! SOAP 1.1 RPC/encoded envelopes, as spoken by the DFN-PKI public interface.

use std::io::Cursor;

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

pub(crate) const SERVICE_NAMESPACE: &str = "urn:DFNCERT/Public";

const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENC_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/encoding/";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// A typed call parameter.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Value<'a> {
    Int(i64),
    Str(&'a str),
    Bool(bool),
    /// `SOAP-ENC:Array` of `xsd:string`.
    StrArray(&'a [String]),
}

/// What the service answered.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Reply {
    Return(String),
    Fault { code: String, message: String },
}

pub(crate) fn encode_call(
    operation: &str,
    params: &[(&str, Value<'_>)],
) -> Result<String, quick_xml::Error> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let envelope = BytesStart::new("SOAP-ENV:Envelope").with_attributes([
        ("xmlns:SOAP-ENV", SOAP_ENV_NAMESPACE),
        ("xmlns:SOAP-ENC", SOAP_ENC_NAMESPACE),
        ("xmlns:xsi", XSI_NAMESPACE),
        ("xmlns:xsd", XSD_NAMESPACE),
        ("xmlns:ns0", SERVICE_NAMESPACE),
        ("SOAP-ENV:encodingStyle", SOAP_ENC_NAMESPACE),
    ]);
    writer.write_event(Event::Start(envelope))?;
    writer.write_event(Event::Start(BytesStart::new("SOAP-ENV:Body")))?;

    let call = format!("ns0:{operation}");
    writer.write_event(Event::Start(BytesStart::new(call.as_str())))?;
    for (name, value) in params {
        write_value(&mut writer, name, *value)?;
    }
    writer.write_event(Event::End(BytesEnd::new(call.as_str())))?;

    writer.write_event(Event::End(BytesEnd::new("SOAP-ENV:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("SOAP-ENV:Envelope")))?;

    Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
}

fn write_value(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    value: Value<'_>,
) -> Result<(), quick_xml::Error> {
    match value {
        Value::Int(number) => {
            write_element(writer, name, "xsd:int", &number.to_string())
        }
        Value::Str(text) => write_element(writer, name, "xsd:string", text),
        Value::Bool(flag) => write_element(
            writer,
            name,
            "xsd:boolean",
            if flag { "true" } else { "false" },
        ),
        Value::StrArray(items) => {
            let array_type = format!("xsd:string[{}]", items.len());
            let start = BytesStart::new(name).with_attributes([
                ("xsi:type", "SOAP-ENC:Array"),
                ("SOAP-ENC:arrayType", array_type.as_str()),
            ]);
            writer.write_event(Event::Start(start))?;
            for item in items {
                write_element(writer, "item", "xsd:string", item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))
        }
    }
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    xsi_type: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    let start = BytesStart::new(name).with_attributes([("xsi:type", xsi_type)]);
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

/// Extracts the return value of `operation`, or the fault, from a response.
///
/// The return value is the text of the first child of `<operation>Response`
/// inside the body. `None` means the document has neither.
pub(crate) fn decode_reply(
    xml: &str,
    operation: &str,
) -> Result<Option<Reply>, quick_xml::Error> {
    let response = format!("{operation}Response");
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut fault: Option<(String, String)> = None;
    let mut returned: Option<String> = None;
    let mut capturing = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                path.push(local_name(&element));
                open(&path, &response, &mut fault, &mut returned, &mut capturing);
            }
            Event::Empty(element) => {
                path.push(local_name(&element));
                open(&path, &response, &mut fault, &mut returned, &mut capturing);
                close(&path, &mut capturing);
                path.pop();
            }
            Event::End(_) => {
                close(&path, &mut capturing);
                path.pop();
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                if capturing {
                    returned.get_or_insert_with(String::new).push_str(&text);
                } else if let Some((code, message)) = fault.as_mut() {
                    match path.last().map(String::as_str) {
                        Some("faultcode") => code.push_str(&text),
                        Some("faultstring") => message.push_str(&text),
                        _ => {}
                    }
                }
            }
            Event::CData(data) => {
                if capturing {
                    returned
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(match (fault, returned) {
        (Some((code, message)), _) => Some(Reply::Fault { code, message }),
        (None, Some(value)) => Some(Reply::Return(value)),
        (None, None) => None,
    })
}

fn open(
    path: &[String],
    response: &str,
    fault: &mut Option<(String, String)>,
    returned: &mut Option<String>,
    capturing: &mut bool,
) {
    if !is_at(path, 1, "Body") {
        return;
    }
    if path.len() == 3 && is_at(path, 2, "Fault") {
        fault.get_or_insert_with(Default::default);
    } else if path.len() == 4 && is_at(path, 2, response) && returned.is_none()
    {
        *returned = Some(String::new());
        *capturing = true;
    }
}

fn close(path: &[String], capturing: &mut bool) {
    if path.len() == 4 {
        *capturing = false;
    }
}

fn is_at(path: &[String], depth: usize, name: &str) -> bool {
    path.get(depth).is_some_and(|element| element == name)
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}
