//! Legacy STORK 1.0 extension vocabulary.

use eidas_commons::{AuthnRequest, MessageFormat};

use crate::error::{SamlError, SamlResult};
use crate::xml::escape;

use super::ProtocolProcessor;

/// Serializes the legacy STORK extensions: the numeric QAA level, the
/// `storkp:RequestedAttributes` block, and the SP authentication
/// attributes (sector, institution, application, country).
pub struct Stork1Processor;

impl ProtocolProcessor for Stork1Processor {
    fn format(&self) -> MessageFormat {
        MessageFormat::Stork1
    }

    fn namespaces(&self) -> &'static str {
        "xmlns:stork=\"urn:eu:stork:names:tc:STORK:1.0:assertion\" \
         xmlns:storkp=\"urn:eu:stork:names:tc:STORK:1.0:protocol\""
    }

    fn request_extensions(&self, request: &AuthnRequest) -> SamlResult<String> {
        let qaa = request
            .qaa_level
            .ok_or_else(|| SamlError::MalformedAssuranceLevel("missing QAA level".into()))?;

        let mut out = format!(
            "<stork:QualityAuthenticationAssuranceLevel>{qaa}\
             </stork:QualityAuthenticationAssuranceLevel>"
        );

        out.push_str("<storkp:RequestedAttributes>");
        for attribute in request.attributes.iter() {
            out.push_str(&format!(
                "<stork:RequestedAttribute Name=\"{}\" \
                 NameFormat=\"urn:oasis:names:tc:SAML:2.0:attrname-format:uri\" \
                 isRequired=\"{}\">",
                escape(&attribute.name),
                attribute.required
            ));
            for value in &attribute.values {
                out.push_str(&format!(
                    "<stork:AttributeValue>{}</stork:AttributeValue>",
                    escape(value)
                ));
            }
            out.push_str("</stork:RequestedAttribute>");
        }
        out.push_str("</storkp:RequestedAttributes>");

        out.push_str("<storkp:AuthenticationAttributes>");
        if let Some(country) = &request.citizen_country_code {
            out.push_str(&format!(
                "<storkp:CitizenCountryCode>{}</storkp:CitizenCountryCode>",
                escape(country)
            ));
        }
        out.push_str("<storkp:SPInformation>");
        for (element, value) in [
            ("SPID", &request.sp_id),
            ("SPSector", &request.sp_sector),
            ("SPInstitution", &request.sp_institution),
            ("SPApplication", &request.sp_application),
            ("SPCountry", &request.sp_country),
        ] {
            if let Some(value) = value {
                out.push_str(&format!(
                    "<storkp:{element}>{}</storkp:{element}>",
                    escape(value)
                ));
            }
        }
        out.push_str("</storkp:SPInformation>");
        out.push_str("</storkp:AuthenticationAttributes>");
        Ok(out)
    }

    fn validate_request_fields(&self, request: &AuthnRequest) -> SamlResult<()> {
        if request.qaa_level.is_none() {
            return Err(SamlError::MalformedAssuranceLevel(
                "STORK request without QAA level".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_commons::{PersonalAttribute, QaaLevel};

    #[test]
    fn extensions_require_qaa() {
        let request = AuthnRequest::new(MessageFormat::Stork1);
        assert!(matches!(
            Stork1Processor.request_extensions(&request),
            Err(SamlError::MalformedAssuranceLevel(_))
        ));
    }

    #[test]
    fn extensions_carry_qaa_and_sp_information() {
        let mut request =
            AuthnRequest::new(MessageFormat::Stork1).with_qaa(QaaLevel::new(2).unwrap());
        request.sp_id = Some("SP-1".to_string());
        request
            .attributes
            .insert(PersonalAttribute::new("eIdentifier", true));
        let extensions = Stork1Processor.request_extensions(&request).unwrap();
        assert!(extensions.contains("QualityAuthenticationAssuranceLevel>2<"));
        assert!(extensions.contains("<storkp:SPID>SP-1</storkp:SPID>"));
        assert!(extensions.contains("RequestedAttribute Name=\"eIdentifier\""));
    }
}
