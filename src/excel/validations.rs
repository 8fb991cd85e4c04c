//! List data validations from worksheet XML

use crate::address::{CellRange, CellRef};
use crate::error::{DepgError, DepgResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

/// Where a dropdown's allowed values come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListSource {
    /// A cell range, optionally on another sheet
    Range {
        sheet: Option<String>,
        range: String,
    },
    /// A literal `"a,b,c"` list
    Inline(Vec<String>),
}

impl ListSource {
    /// Interpret a list validation's `formula1`; `None` for sources that are
    /// neither a range nor a literal list (defined names, functions)
    pub fn parse(formula: &str) -> Option<Self> {
        let formula = formula.trim();
        let formula = formula.strip_prefix('=').unwrap_or(formula);

        if let Some(inner) = formula.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
            return Some(ListSource::Inline(
                inner
                    .replace("\"\"", "\"")
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .collect(),
            ));
        }

        let (sheet, range) = match formula.rsplit_once('!') {
            Some((sheet, range)) => {
                let sheet = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
                    Some(quoted) => quoted.replace("''", "'"),
                    None => sheet.to_string(),
                };
                (Some(sheet), range)
            }
            None => (None, formula),
        };
        let range = CellRange::parse(range).ok()?;
        Some(ListSource::Range {
            sheet,
            range: format!("{}:{}", range.start, range.end),
        })
    }

    /// The source range, if this is a range source
    pub fn cell_range(&self) -> Option<CellRange> {
        match self {
            ListSource::Range { range, .. } => CellRange::parse(range).ok(),
            ListSource::Inline(_) => None,
        }
    }
}

/// A list validation on one worksheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListValidation {
    /// Sheet that hosts the dropdown
    pub sheet: String,
    /// Top-left cell of the first `sqref` range
    pub target: CellRef,
    pub sqref: String,
    pub formula: String,
    pub source: ListSource,
}

/// `(sqref, formula1)` of every `type="list"` validation
pub(crate) fn read_list_rules(xml: &str) -> DepgResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    // sqref of the list validation being read, if any
    let mut current: Option<String> = None;
    let mut formula = String::new();
    let mut in_formula1 = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"dataValidation" => {
                let mut is_list = false;
                let mut sqref = String::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let val = attr.unescape_value()?.into_owned();
                    match attr.key.as_ref() {
                        b"type" => is_list = val == "list",
                        b"sqref" => sqref = val,
                        _ => {}
                    }
                }
                if is_list {
                    current = Some(sqref);
                    formula.clear();
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"formula1" => {
                in_formula1 = current.is_some();
            }
            Event::Text(e) if in_formula1 => {
                formula.push_str(&e.unescape()?);
            }
            Event::CData(e) if in_formula1 => {
                formula.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::End(e) if e.local_name().as_ref() == b"formula1" => {
                in_formula1 = false;
            }
            Event::End(e) if e.local_name().as_ref() == b"dataValidation" => {
                if let Some(sqref) = current.take() {
                    out.push((sqref, std::mem::take(&mut formula)));
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Parse the list validations of one sheet.
///
/// A list rule whose target or source cannot be interpreted is an error: a
/// catalog missing one of the sheet's dropdowns is never built.
pub fn read_list_validations(sheet: &str, xml: &str) -> DepgResult<Vec<ListValidation>> {
    let mut validations = Vec::new();
    for (sqref, formula) in read_list_rules(xml)? {
        let unreadable = |what: &str| {
            DepgError::Cache(format!(
                "sheet '{}': list validation sqref=\"{}\" formula1=\"{}\" has {}",
                sheet, sqref, formula, what
            ))
        };
        let target = sqref
            .split_whitespace()
            .next()
            .and_then(|first| CellRange::parse(first).ok())
            .map(|range| range.start)
            .ok_or_else(|| unreadable("an unreadable target"))?;
        let source = ListSource::parse(&formula)
            .ok_or_else(|| unreadable("an unsupported source (only ranges and literal lists)"))?;
        validations.push(ListValidation {
            sheet: sheet.to_string(),
            target,
            sqref,
            formula,
            source,
        });
    }
    Ok(validations)
}
