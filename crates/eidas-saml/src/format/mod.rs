//! Message serialization, one strategy per extension vocabulary.
//!
//! The SAML envelope (root element, issuer, status, assertion shell) is
//! common to both vocabularies; everything format-specific lives behind
//! [`ProtocolProcessor`]. Every message carries its vocabulary's namespace
//! declaration, which is also how inbound messages are classified.

pub mod eidas;
pub mod stork;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use eidas_commons::{
    AttributeStatus, AuthnRequest, AuthnResponse, EidasLoa, LoaComparison, MessageFormat,
    PersonalAttribute, QaaLevel, SamlBinding,
};

use crate::error::{SamlError, SamlResult};
use crate::xml::{attributes, escape};

pub use eidas::EidasProcessor;
pub use stork::Stork1Processor;

const BASE_NAMESPACES: &str = "xmlns:saml2p=\"urn:oasis:names:tc:SAML:2.0:protocol\" \
                               xmlns:saml2=\"urn:oasis:names:tc:SAML:2.0:assertion\"";

/// Format-specific serialization strategy.
pub trait ProtocolProcessor: Send + Sync {
    /// The vocabulary this processor speaks.
    fn format(&self) -> MessageFormat;

    /// Namespace declarations the format adds to the root element.
    fn namespaces(&self) -> &'static str;

    /// The `Extensions` payload of an authentication request.
    fn request_extensions(&self, request: &AuthnRequest) -> SamlResult<String>;

    /// Validates format-specific request fields before generation.
    fn validate_request_fields(&self, request: &AuthnRequest) -> SamlResult<()>;
}

/// Classifies a message by the extension namespace it declares.
#[must_use]
pub fn detect_format(xml: &str) -> Option<MessageFormat> {
    if xml.contains("xmlns:stork") {
        Some(MessageFormat::Stork1)
    } else if xml.contains("xmlns:eidas") {
        Some(MessageFormat::Eidas)
    } else {
        None
    }
}

/// Returns the processor for a format.
#[must_use]
pub fn processor_for(format: MessageFormat) -> &'static dyn ProtocolProcessor {
    match format {
        MessageFormat::Eidas => &EidasProcessor,
        MessageFormat::Stork1 => &Stork1Processor,
    }
}

/// Serializes an unsigned authentication request document.
pub fn build_request_document(
    request: &AuthnRequest,
    processor: &dyn ProtocolProcessor,
    issued_at: DateTime<Utc>,
) -> SamlResult<String> {
    let mut doc = format!(
        "<saml2p:AuthnRequest {BASE_NAMESPACES} {} ID=\"{}\" Version=\"2.0\" \
         IssueInstant=\"{}\" Destination=\"{}\" AssertionConsumerServiceURL=\"{}\" \
         ProviderName=\"{}\" ProtocolBinding=\"{}\">",
        processor.namespaces(),
        escape(&request.saml_id),
        eidas_commons::request::saml_instant(issued_at),
        escape(&request.destination),
        escape(&request.assertion_consumer_service_url),
        escape(&request.provider_name),
        request.binding.uri(),
    );
    doc.push_str(&format!(
        "<saml2:Issuer>{}</saml2:Issuer>",
        escape(&request.issuer)
    ));
    doc.push_str("<saml2p:Extensions>");
    doc.push_str(&processor.request_extensions(request)?);
    doc.push_str("</saml2p:Extensions>");
    doc.push_str("</saml2p:AuthnRequest>");
    Ok(doc)
}

/// Serializes an unsigned response document.
pub fn build_response_document(
    request: &AuthnRequest,
    response: &AuthnResponse,
    processor: &dyn ProtocolProcessor,
    issued_at: DateTime<Utc>,
    validity: ChronoDuration,
    remote_ip: Option<&str>,
    hash_values: bool,
) -> SamlResult<String> {
    let instant = eidas_commons::request::saml_instant(issued_at);
    let not_on_or_after = eidas_commons::request::saml_instant(issued_at + validity);

    let mut doc = format!(
        "<saml2p:Response {BASE_NAMESPACES} {} ID=\"{}\" Version=\"2.0\" \
         IssueInstant=\"{instant}\" Destination=\"{}\" InResponseTo=\"{}\">",
        processor.namespaces(),
        escape(&response.saml_id),
        escape(&request.assertion_consumer_service_url),
        escape(&response.in_response_to),
    );
    doc.push_str(&format!(
        "<saml2:Issuer>{}</saml2:Issuer>",
        escape(&response.issuer)
    ));

    doc.push_str("<saml2p:Status>");
    doc.push_str(&format!(
        "<saml2p:StatusCode Value=\"{}\">",
        escape(&response.status_code)
    ));
    if let Some(sub) = &response.sub_status_code {
        doc.push_str(&format!("<saml2p:StatusCode Value=\"{}\"/>", escape(sub)));
    }
    doc.push_str("</saml2p:StatusCode>");
    if let Some(message) = &response.status_message {
        doc.push_str(&format!(
            "<saml2p:StatusMessage>{}</saml2p:StatusMessage>",
            escape(message)
        ));
    }
    doc.push_str("</saml2p:Status>");

    if !response.failure {
        doc.push_str(&format!(
            "<saml2:Assertion ID=\"{}-assertion\" IssueInstant=\"{instant}\">",
            escape(&response.saml_id)
        ));
        doc.push_str("<saml2:Subject>");
        doc.push_str("<saml2:SubjectConfirmation Method=\"urn:oasis:names:tc:SAML:2.0:cm:bearer\">");
        doc.push_str(&format!(
            "<saml2:SubjectConfirmationData{} InResponseTo=\"{}\" NotOnOrAfter=\"{not_on_or_after}\"/>",
            remote_ip.map_or_else(String::new, |ip| format!(" Address=\"{}\"", escape(ip))),
            escape(&response.in_response_to),
        ));
        doc.push_str("</saml2:SubjectConfirmation>");
        doc.push_str("</saml2:Subject>");
        doc.push_str(&format!(
            "<saml2:Conditions NotBefore=\"{instant}\" NotOnOrAfter=\"{not_on_or_after}\">\
             <saml2:AudienceRestriction><saml2:Audience>{}</saml2:Audience>\
             </saml2:AudienceRestriction></saml2:Conditions>",
            escape(&request.issuer)
        ));
        if let Some(loa) = response.eidas_loa {
            doc.push_str(&format!(
                "<saml2:AuthnStatement AuthnInstant=\"{instant}\"><saml2:AuthnContext>\
                 <saml2:AuthnContextClassRef>{}</saml2:AuthnContextClassRef>\
                 </saml2:AuthnContext></saml2:AuthnStatement>",
                loa.uri()
            ));
        }
        doc.push_str("<saml2:AttributeStatement>");
        for attribute in response.attributes.iter() {
            write_attribute(&mut doc, attribute, hash_values);
        }
        doc.push_str("</saml2:AttributeStatement>");
        doc.push_str("</saml2:Assertion>");
    }

    doc.push_str("</saml2p:Response>");
    Ok(doc)
}

fn write_attribute(doc: &mut String, attribute: &PersonalAttribute, hash_values: bool) {
    doc.push_str(&format!(
        "<saml2:Attribute Name=\"{}\" isRequired=\"{}\"{}>",
        escape(&attribute.name),
        attribute.required,
        attribute
            .status
            .map_or_else(String::new, |s| format!(" AttributeStatus=\"{}\"", s.as_str())),
    ));
    for value in &attribute.values {
        let rendered = if hash_values {
            hex_digest(value)
        } else {
            escape(value)
        };
        doc.push_str(&format!(
            "<saml2:AttributeValue>{rendered}</saml2:AttributeValue>"
        ));
    }
    if !attribute.complex_value.is_empty() {
        doc.push_str("<saml2:AttributeComplexValue>");
        for (field, value) in &attribute.complex_value {
            let rendered = if hash_values {
                hex_digest(value)
            } else {
                escape(value)
            };
            doc.push_str(&format!(
                "<saml2:AttributeComplexField Name=\"{}\">{rendered}</saml2:AttributeComplexField>",
                escape(field)
            ));
        }
        doc.push_str("</saml2:AttributeComplexValue>");
    }
    doc.push_str("</saml2:Attribute>");
}

fn hex_digest(value: &str) -> String {
    let digest = aws_lc_rs::digest::digest(&aws_lc_rs::digest::SHA256, value.as_bytes());
    digest
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// A parsed request plus envelope metadata not kept on the domain type.
#[derive(Debug)]
pub struct ParsedRequest {
    /// The reconstructed request envelope.
    pub request: AuthnRequest,
    /// When the message claims to have been issued.
    pub issue_instant: Option<DateTime<Utc>>,
}

/// A parsed response plus assertion metadata used for validation.
#[derive(Debug)]
pub struct ParsedResponse {
    /// The reconstructed response envelope.
    pub response: AuthnResponse,
    /// When the message claims to have been issued.
    pub issue_instant: Option<DateTime<Utc>>,
    /// Address asserted in the subject confirmation, when present.
    pub subject_address: Option<String>,
}

enum TextTarget {
    Issuer,
    Qaa,
    Loa,
    AttributeValue,
    ComplexField(String),
    SpId,
    SpSector,
    SpInstitution,
    SpApplication,
    SpCountry,
    CitizenCountry,
    Audience,
    StatusMessage,
    AuthnContextClassRef,
    Skip,
}

/// Parses an authentication request document of a known format.
pub fn parse_request_document(xml: &str, format: MessageFormat) -> SamlResult<ParsedRequest> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut request = AuthnRequest::new(format);
    let mut issue_instant = None;
    let mut current_attribute: Option<PersonalAttribute> = None;
    let mut target: Option<TextTarget> = None;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(SamlError::from)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"AuthnRequest" => {
                        seen_root = true;
                        let attrs = attributes(e)?;
                        request.saml_id = required(&attrs, "ID")?;
                        issue_instant = parse_instant(attrs.get("IssueInstant"))?;
                        request.destination = attrs.get("Destination").cloned().unwrap_or_default();
                        request.assertion_consumer_service_url = attrs
                            .get("AssertionConsumerServiceURL")
                            .cloned()
                            .unwrap_or_default();
                        request.provider_name =
                            attrs.get("ProviderName").cloned().unwrap_or_default();
                        if let Some(binding) =
                            attrs.get("ProtocolBinding").and_then(|b| SamlBinding::from_uri(b))
                        {
                            request.binding = binding;
                        }
                    }
                    b"Issuer" => target = Some(TextTarget::Issuer),
                    b"QualityAuthenticationAssuranceLevel" => target = Some(TextTarget::Qaa),
                    b"LevelOfAssurance" => {
                        let attrs = attributes(e)?;
                        if attrs.get("Comparison").map(String::as_str) == Some("exact") {
                            request.loa_comparison = LoaComparison::Exact;
                        }
                        target = Some(TextTarget::Loa);
                    }
                    b"RequestedAttribute" => {
                        let attrs = attributes(e)?;
                        let attribute = PersonalAttribute::new(
                            required(&attrs, "Name")?,
                            attrs.get("isRequired").map(String::as_str) == Some("true"),
                        );
                        if is_empty {
                            request.attributes.insert(attribute);
                        } else {
                            current_attribute = Some(attribute);
                        }
                    }
                    b"AttributeValue" => target = Some(TextTarget::AttributeValue),
                    b"SPID" => target = Some(TextTarget::SpId),
                    b"SPSector" => target = Some(TextTarget::SpSector),
                    b"SPInstitution" => target = Some(TextTarget::SpInstitution),
                    b"SPApplication" => target = Some(TextTarget::SpApplication),
                    b"SPCountry" => target = Some(TextTarget::SpCountry),
                    b"CitizenCountryCode" => target = Some(TextTarget::CitizenCountry),
                    b"SPType" => target = Some(TextTarget::Skip),
                    _ => {}
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SamlError::XmlParse(e.to_string()))?
                    .into_owned();
                apply_request_text(&mut request, &mut current_attribute, target.take(), text)?;
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"RequestedAttribute" {
                    if let Some(attribute) = current_attribute.take() {
                        request.attributes.insert(attribute);
                    }
                }
                target = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(SamlError::MissingElement("AuthnRequest".to_string()));
    }
    Ok(ParsedRequest {
        request,
        issue_instant,
    })
}

fn apply_request_text(
    request: &mut AuthnRequest,
    current_attribute: &mut Option<PersonalAttribute>,
    target: Option<TextTarget>,
    text: String,
) -> SamlResult<()> {
    match target {
        Some(TextTarget::Issuer) => request.issuer = text,
        Some(TextTarget::Qaa) => {
            request.qaa_level = Some(
                QaaLevel::parse(&text)
                    .map_err(|_| SamlError::MalformedAssuranceLevel(text.clone()))?,
            );
        }
        Some(TextTarget::Loa) => {
            request.eidas_loa = Some(
                EidasLoa::from_uri(&text)
                    .map_err(|_| SamlError::MalformedAssuranceLevel(text.clone()))?,
            );
        }
        Some(TextTarget::AttributeValue) => {
            if let Some(attribute) = current_attribute {
                attribute.values.push(text);
            }
        }
        Some(TextTarget::SpId) => request.sp_id = Some(text),
        Some(TextTarget::SpSector) => request.sp_sector = Some(text),
        Some(TextTarget::SpInstitution) => request.sp_institution = Some(text),
        Some(TextTarget::SpApplication) => request.sp_application = Some(text),
        Some(TextTarget::SpCountry) => request.sp_country = Some(text),
        Some(TextTarget::CitizenCountry) => request.citizen_country_code = Some(text),
        _ => {}
    }
    Ok(())
}

/// Parses a response document of a known format.
pub fn parse_response_document(xml: &str, format: MessageFormat) -> SamlResult<ParsedResponse> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut response = AuthnResponse::success("", format);
    response.status_code = String::new();
    let mut issue_instant = None;
    let mut subject_address = None;
    let mut current_attribute: Option<PersonalAttribute> = None;
    let mut target: Option<TextTarget> = None;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(SamlError::from)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"Response" => {
                        seen_root = true;
                        let attrs = attributes(e)?;
                        response.saml_id = required(&attrs, "ID")?;
                        response.in_response_to =
                            attrs.get("InResponseTo").cloned().unwrap_or_default();
                        issue_instant = parse_instant(attrs.get("IssueInstant"))?;
                    }
                    b"Issuer" => target = Some(TextTarget::Issuer),
                    b"StatusCode" => {
                        let attrs = attributes(e)?;
                        let value = required(&attrs, "Value")?;
                        if response.status_code.is_empty() {
                            response.status_code = value;
                        } else {
                            response.sub_status_code = Some(value);
                        }
                    }
                    b"StatusMessage" => target = Some(TextTarget::StatusMessage),
                    b"SubjectConfirmationData" => {
                        let attrs = attributes(e)?;
                        subject_address = attrs.get("Address").cloned();
                    }
                    b"Audience" => target = Some(TextTarget::Audience),
                    b"AuthnContextClassRef" => target = Some(TextTarget::AuthnContextClassRef),
                    b"Attribute" => {
                        let attrs = attributes(e)?;
                        let mut attribute = PersonalAttribute::new(
                            required(&attrs, "Name")?,
                            attrs.get("isRequired").map(String::as_str) == Some("true"),
                        );
                        attribute.status = attrs
                            .get("AttributeStatus")
                            .and_then(|s| AttributeStatus::from_str_opt(s));
                        if is_empty {
                            response.attributes.insert(attribute);
                        } else {
                            current_attribute = Some(attribute);
                        }
                    }
                    b"AttributeValue" => target = Some(TextTarget::AttributeValue),
                    b"AttributeComplexField" => {
                        let attrs = attributes(e)?;
                        target = Some(TextTarget::ComplexField(required(&attrs, "Name")?));
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SamlError::XmlParse(e.to_string()))?
                    .into_owned();
                match target.take() {
                    Some(TextTarget::Issuer) => response.issuer = text,
                    Some(TextTarget::StatusMessage) => response.status_message = Some(text),
                    Some(TextTarget::Audience) => response.audience = Some(text),
                    Some(TextTarget::AuthnContextClassRef) => {
                        response.eidas_loa = EidasLoa::from_uri(&text).ok();
                    }
                    Some(TextTarget::AttributeValue) => {
                        if let Some(attribute) = &mut current_attribute {
                            attribute.values.push(text);
                        }
                    }
                    Some(TextTarget::ComplexField(field)) => {
                        if let Some(attribute) = &mut current_attribute {
                            attribute.complex_value.insert(field, text);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"Attribute" {
                    if let Some(attribute) = current_attribute.take() {
                        response.attributes.insert(attribute);
                    }
                }
                target = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(SamlError::MissingElement("Response".to_string()));
    }
    if response.status_code.is_empty() {
        return Err(SamlError::MissingElement("StatusCode".to_string()));
    }
    response.failure = response.status_code != AuthnResponse::STATUS_SUCCESS;
    Ok(ParsedResponse {
        response,
        issue_instant,
        subject_address,
    })
}

fn required(
    attrs: &std::collections::HashMap<String, String>,
    name: &str,
) -> SamlResult<String> {
    attrs
        .get(name)
        .cloned()
        .ok_or_else(|| SamlError::MissingElement(format!("attribute {name}")))
}

fn parse_instant(raw: Option<&String>) -> SamlResult<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| SamlError::XmlParse(format!("bad IssueInstant: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_commons::PersonalAttributeList;

    fn sample_request(format: MessageFormat) -> AuthnRequest {
        let mut attributes = PersonalAttributeList::new();
        attributes.insert(PersonalAttribute::new("PersonIdentifier", true));
        attributes.insert(PersonalAttribute::new("DateOfBirth", false));
        let mut request = AuthnRequest::new(format)
            .with_issuer("https://connector.example.eu/metadata")
            .with_destination("https://service.example.eu/ColleagueRequest")
            .with_acs_url("https://connector.example.eu/ColleagueResponse")
            .with_provider_name("University of Oxford")
            .with_citizen_country("PT")
            .with_attributes(attributes);
        request.saml_id = "_fixed-test-id".to_string();
        match format {
            MessageFormat::Eidas => request = request.with_loa(EidasLoa::Substantial),
            MessageFormat::Stork1 => request = request.with_qaa(QaaLevel::new(3).unwrap()),
        }
        request
    }

    #[test]
    fn request_document_round_trip_eidas() {
        let request = sample_request(MessageFormat::Eidas);
        let doc =
            build_request_document(&request, &EidasProcessor, Utc::now()).unwrap();
        assert_eq!(detect_format(&doc), Some(MessageFormat::Eidas));

        let parsed = parse_request_document(&doc, MessageFormat::Eidas).unwrap();
        assert_eq!(parsed.request.saml_id, "_fixed-test-id");
        assert_eq!(parsed.request.issuer, request.issuer);
        assert_eq!(parsed.request.provider_name, "University of Oxford");
        assert_eq!(parsed.request.eidas_loa, Some(EidasLoa::Substantial));
        assert!(parsed.request.qaa_level.is_none());
        let names: Vec<_> = parsed.request.attributes.names().collect();
        assert_eq!(names, ["PersonIdentifier", "DateOfBirth"]);
        assert!(parsed.request.attributes.get("PersonIdentifier").unwrap().required);
        assert!(parsed.issue_instant.is_some());
    }

    #[test]
    fn request_document_round_trip_stork() {
        let mut request = sample_request(MessageFormat::Stork1);
        request.sp_id = Some("SP-OXFORD".to_string());
        request.sp_sector = Some("EDU".to_string());
        request.sp_country = Some("UK".to_string());
        let doc = build_request_document(&request, &Stork1Processor, Utc::now()).unwrap();
        assert_eq!(detect_format(&doc), Some(MessageFormat::Stork1));

        let parsed = parse_request_document(&doc, MessageFormat::Stork1).unwrap();
        assert_eq!(parsed.request.qaa_level, Some(QaaLevel::new(3).unwrap()));
        assert!(parsed.request.eidas_loa.is_none());
        assert_eq!(parsed.request.sp_id.as_deref(), Some("SP-OXFORD"));
        assert_eq!(parsed.request.sp_sector.as_deref(), Some("EDU"));
        assert_eq!(parsed.request.sp_country.as_deref(), Some("UK"));
        assert_eq!(parsed.request.citizen_country_code.as_deref(), Some("PT"));
    }

    #[test]
    fn requested_attribute_values_survive() {
        let mut request = sample_request(MessageFormat::Stork1);
        request
            .attributes
            .insert(PersonalAttribute::new("isAgeOver", true).with_value("18"));
        let doc = build_request_document(&request, &Stork1Processor, Utc::now()).unwrap();
        let parsed = parse_request_document(&doc, MessageFormat::Stork1).unwrap();
        assert_eq!(
            parsed.request.attributes.get("isAgeOver").unwrap().values,
            ["18"]
        );
    }

    #[test]
    fn response_document_round_trip() {
        let request = sample_request(MessageFormat::Eidas);
        let mut shell = AuthnResponse::success(&request.saml_id, MessageFormat::Eidas);
        shell.saml_id = "_response-id".to_string();
        shell.issuer = "https://service.example.eu/metadata".to_string();
        shell.eidas_loa = Some(EidasLoa::High);
        shell.attributes.insert(
            PersonalAttribute::new("PersonIdentifier", true)
                .with_value("PT/UK/12345")
                .with_status(AttributeStatus::Available),
        );

        let doc = build_response_document(
            &request,
            &shell,
            &EidasProcessor,
            Utc::now(),
            ChronoDuration::seconds(300),
            Some("192.0.2.7"),
            false,
        )
        .unwrap();

        let parsed = parse_response_document(&doc, MessageFormat::Eidas).unwrap();
        assert_eq!(parsed.response.saml_id, "_response-id");
        assert_eq!(parsed.response.in_response_to, "_fixed-test-id");
        assert_eq!(parsed.response.status_code, AuthnResponse::STATUS_SUCCESS);
        assert!(!parsed.response.failure);
        assert_eq!(parsed.response.audience.as_deref(), Some(request.issuer.as_str()));
        assert_eq!(parsed.response.eidas_loa, Some(EidasLoa::High));
        assert_eq!(parsed.subject_address.as_deref(), Some("192.0.2.7"));
        let attribute = parsed.response.attributes.get("PersonIdentifier").unwrap();
        assert_eq!(attribute.values, ["PT/UK/12345"]);
        assert_eq!(attribute.status, Some(AttributeStatus::Available));
    }

    #[test]
    fn error_response_has_no_assertion() {
        let request = sample_request(MessageFormat::Eidas);
        let mut shell = AuthnResponse::success(&request.saml_id, MessageFormat::Eidas);
        shell.saml_id = "_err".to_string();
        shell.issuer = "https://service.example.eu/metadata".to_string();
        shell.status_code = AuthnResponse::STATUS_REQUESTER.to_string();
        shell.sub_status_code = Some(AuthnResponse::SUB_STATUS_REQUEST_DENIED.to_string());
        shell.status_message = Some("mandatory attribute missing".to_string());
        shell.failure = true;

        let doc = build_response_document(
            &request,
            &shell,
            &EidasProcessor,
            Utc::now(),
            ChronoDuration::seconds(300),
            None,
            false,
        )
        .unwrap();
        assert!(!doc.contains("Assertion"));

        let parsed = parse_response_document(&doc, MessageFormat::Eidas).unwrap();
        assert!(parsed.response.failure);
        assert_eq!(
            parsed.response.sub_status_code.as_deref(),
            Some(AuthnResponse::SUB_STATUS_REQUEST_DENIED)
        );
        assert_eq!(
            parsed.response.status_message.as_deref(),
            Some("mandatory attribute missing")
        );
    }

    #[test]
    fn hashed_values_are_digests() {
        let request = sample_request(MessageFormat::Eidas);
        let mut shell = AuthnResponse::success(&request.saml_id, MessageFormat::Eidas);
        shell.saml_id = "_h".to_string();
        shell.issuer = "iss".to_string();
        shell
            .attributes
            .insert(PersonalAttribute::new("FirstName", true).with_value("Ana"));
        let doc = build_response_document(
            &request,
            &shell,
            &EidasProcessor,
            Utc::now(),
            ChronoDuration::seconds(300),
            None,
            true,
        )
        .unwrap();
        assert!(!doc.contains(">Ana<"));
        let parsed = parse_response_document(&doc, MessageFormat::Eidas).unwrap();
        let hashed = &parsed.response.attributes.get("FirstName").unwrap().values[0];
        assert_eq!(hashed.len(), 64);
        assert!(hashed.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
