//! Small XML helpers shared by the format processors.

use std::collections::HashMap;

use quick_xml::events::BytesStart;

use crate::error::{SamlError, SamlResult};

/// Escapes text for use in XML content or attribute values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Collects an element's attributes into an owned map, keyed by the
/// attribute's local name (namespace prefix stripped).
pub fn attributes(start: &BytesStart<'_>) -> SamlResult<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| SamlError::XmlParse(e.to_string()))?;
        let key = local_name(attribute.key.as_ref());
        let value = attribute
            .unescape_value()
            .map_err(|e| SamlError::XmlParse(e.to_string()))?
            .into_owned();
        map.insert(String::from_utf8_lossy(key).into_owned(), value);
    }
    Ok(map)
}

/// Strips a namespace prefix from a qualified name.
pub fn local_name(qualified: &[u8]) -> &[u8] {
    match qualified.iter().rposition(|&b| b == b':') {
        Some(idx) => &qualified[idx + 1..],
        None => qualified,
    }
}
