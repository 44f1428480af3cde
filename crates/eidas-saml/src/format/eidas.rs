//! eIDAS extension vocabulary.

use eidas_commons::{AuthnRequest, LoaComparison, MessageFormat};

use crate::error::{SamlError, SamlResult};
use crate::xml::escape;

use super::ProtocolProcessor;

/// Serializes the namespace-qualified eIDAS extensions: SP type, level of
/// assurance, and `eidas:RequestedAttributes`.
pub struct EidasProcessor;

impl ProtocolProcessor for EidasProcessor {
    fn format(&self) -> MessageFormat {
        MessageFormat::Eidas
    }

    fn namespaces(&self) -> &'static str {
        "xmlns:eidas=\"http://eidas.europa.eu/saml-extensions\""
    }

    fn request_extensions(&self, request: &AuthnRequest) -> SamlResult<String> {
        let loa = request
            .eidas_loa
            .ok_or_else(|| SamlError::MalformedAssuranceLevel("missing LevelOfAssurance".into()))?;

        let mut out = String::from("<eidas:SPType>public</eidas:SPType>");
        if let Some(country) = &request.citizen_country_code {
            out.push_str(&format!(
                "<eidas:CitizenCountryCode>{}</eidas:CitizenCountryCode>",
                escape(country)
            ));
        }
        let comparison = match request.loa_comparison {
            LoaComparison::Minimum => "minimum",
            LoaComparison::Exact => "exact",
        };
        out.push_str(&format!(
            "<eidas:LevelOfAssurance Comparison=\"{comparison}\">{}</eidas:LevelOfAssurance>",
            loa.uri()
        ));

        out.push_str("<eidas:RequestedAttributes>");
        for attribute in request.attributes.iter() {
            if attribute.values.is_empty() {
                out.push_str(&format!(
                    "<eidas:RequestedAttribute Name=\"{}\" \
                     NameFormat=\"urn:oasis:names:tc:SAML:2.0:attrname-format:uri\" \
                     isRequired=\"{}\"/>",
                    escape(&attribute.name),
                    attribute.required
                ));
            } else {
                out.push_str(&format!(
                    "<eidas:RequestedAttribute Name=\"{}\" \
                     NameFormat=\"urn:oasis:names:tc:SAML:2.0:attrname-format:uri\" \
                     isRequired=\"{}\">",
                    escape(&attribute.name),
                    attribute.required
                ));
                for value in &attribute.values {
                    out.push_str(&format!(
                        "<eidas:AttributeValue>{}</eidas:AttributeValue>",
                        escape(value)
                    ));
                }
                out.push_str("</eidas:RequestedAttribute>");
            }
        }
        out.push_str("</eidas:RequestedAttributes>");
        Ok(out)
    }

    fn validate_request_fields(&self, request: &AuthnRequest) -> SamlResult<()> {
        if request.eidas_loa.is_none() {
            return Err(SamlError::MalformedAssuranceLevel(
                "eIDAS request without LevelOfAssurance".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_commons::{EidasLoa, PersonalAttribute};

    #[test]
    fn extensions_require_loa() {
        let request = AuthnRequest::new(MessageFormat::Eidas);
        assert!(matches!(
            EidasProcessor.request_extensions(&request),
            Err(SamlError::MalformedAssuranceLevel(_))
        ));
    }

    #[test]
    fn extensions_carry_requested_attributes() {
        let mut request = AuthnRequest::new(MessageFormat::Eidas).with_loa(EidasLoa::High);
        request
            .attributes
            .insert(PersonalAttribute::new("FamilyName", true));
        let extensions = EidasProcessor.request_extensions(&request).unwrap();
        assert!(extensions.contains("http://eidas.europa.eu/LoA/high"));
        assert!(extensions.contains("RequestedAttribute Name=\"FamilyName\""));
    }
}
