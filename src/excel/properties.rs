//! Document properties from `docProps/core.xml`

use crate::error::DepgResult;
use chrono::{DateTime, NaiveDateTime};
use quick_xml::events::Event;
use quick_xml::Reader;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw core properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CoreProperties {
    pub created: Option<String>,
    pub creator: Option<String>,
    pub last_modified_by: Option<String>,
    pub modified: Option<String>,
}

/// Render a W3CDTF timestamp as `YYYY-MM-DD HH:MM:SS` (UTC). Unparseable
/// values are kept as written.
pub fn format_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.naive_utc().format(TIMESTAMP_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(TIMESTAMP_FORMAT).to_string();
        }
    }
    raw.to_string()
}

pub(crate) fn read_core_properties(xml: &str) -> DepgResult<CoreProperties> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut props = CoreProperties::default();
    let mut field: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                field = match e.local_name().as_ref() {
                    b"created" => Some("created"),
                    b"modified" => Some("modified"),
                    b"creator" => Some("creator"),
                    b"lastModifiedBy" => Some("last_modified_by"),
                    _ => None,
                };
            }
            Event::Text(e) => {
                let text = e.unescape()?.into_owned();
                match field {
                    Some("created") => props.created = Some(format_timestamp(&text)),
                    Some("modified") => props.modified = Some(format_timestamp(&text)),
                    Some("creator") => props.creator = Some(text),
                    Some("last_modified_by") => props.last_modified_by = Some(text),
                    _ => {}
                }
            }
            Event::End(_) => field = None,
            _ => {}
        }
        buf.clear();
    }

    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_properties() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:creator>Jane Barista</dc:creator>
  <cp:lastModifiedBy>Decent &amp; Co</cp:lastModifiedBy>
  <dcterms:created xsi:type="dcterms:W3CDTF">2019-05-01T12:34:56Z</dcterms:created>
  <dcterms:modified xsi:type="dcterms:W3CDTF">2021-11-20T08:00:00+02:00</dcterms:modified>
</cp:coreProperties>"#;
        let props = read_core_properties(xml).unwrap();
        assert_eq!(props.creator.as_deref(), Some("Jane Barista"));
        assert_eq!(props.last_modified_by.as_deref(), Some("Decent & Co"));
        assert_eq!(props.created.as_deref(), Some("2019-05-01 12:34:56"));
        assert_eq!(props.modified.as_deref(), Some("2021-11-20 06:00:00"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let props = read_core_properties("<cp:coreProperties/>").unwrap();
        assert_eq!(props, CoreProperties::default());
    }

    #[test]
    fn test_format_timestamp_fallbacks() {
        assert_eq!(format_timestamp("2020-01-02T03:04:05"), "2020-01-02 03:04:05");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }
}
