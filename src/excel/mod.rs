//! Workbook inspection
//!
//! Reads the parts of an `.xlsx` package that carry no cell values: the sheet
//! list, which sheet is active, document properties and list validations.
//! Cell values and formulas are the engine's business (see `engine::workbook`).

mod properties;
mod validations;

pub use properties::{format_timestamp, TIMESTAMP_FORMAT};
pub use validations::{read_list_validations, ListSource, ListValidation};

use crate::error::{DepgError, DepgResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Informational workbook metadata kept in the dropdown cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetProperties {
    pub sheet_name: String,
    pub created: Option<String>,
    pub creator: Option<String>,
    pub last_modified_by: Option<String>,
    pub modified: Option<String>,
}

/// Everything the cache builder needs to know about a workbook's structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookInspection {
    pub sheets: Vec<String>,
    /// Index into `sheets` of the sheet shown on open
    pub active_sheet: usize,
    pub properties: SpreadsheetProperties,
    /// List validations of every sheet, in sheet then document order
    pub validations: Vec<ListValidation>,
}

impl WorkbookInspection {
    pub fn active_sheet_name(&self) -> &str {
        &self.properties.sheet_name
    }

    /// Validations hosted by the active sheet
    pub fn active_validations(&self) -> impl Iterator<Item = &ListValidation> {
        let active = self.active_sheet_name().to_string();
        self.validations.iter().filter(move |v| v.sheet == active)
    }
}

struct SheetEntry {
    name: String,
    rel_id: String,
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> DepgResult<Option<String>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Sheets in tab order and the `activeTab` index
fn read_workbook_xml(xml: &str) -> DepgResult<(Vec<SheetEntry>, usize)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut active = 0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let mut name = String::new();
                    let mut rel_id = String::new();
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        match attr.key.local_name().as_ref() {
                            b"name" => name = attr.unescape_value()?.into_owned(),
                            b"id" => rel_id = attr.unescape_value()?.into_owned(),
                            _ => {}
                        }
                    }
                    sheets.push(SheetEntry { name, rel_id });
                }
                b"workbookView" => {
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        if attr.key.as_ref() == b"activeTab" {
                            active = attr.unescape_value()?.parse().unwrap_or(0);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, active))
}

/// Relationship id → package part path
fn read_relationships(xml: &str) -> DepgResult<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr.unescape_value()?.into_owned()),
                        b"Target" => target = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    rels.insert(id, path);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Inspect an `.xlsx` package
pub fn inspect_workbook(path: &Path) -> DepgResult<WorkbookInspection> {
    let file = File::open(path).map_err(|e| {
        DepgError::Workbook(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| DepgError::Workbook(format!("{} has no xl/workbook.xml", path.display())))?;
    let (entries, active_tab) = read_workbook_xml(&workbook_xml)?;
    if entries.is_empty() {
        return Err(DepgError::Workbook(format!("{} has no sheets", path.display())));
    }
    let active_sheet = if active_tab < entries.len() { active_tab } else { 0 };

    let rels = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => read_relationships(&xml)?,
        None => HashMap::new(),
    };

    let mut validations = Vec::new();
    for entry in &entries {
        let part = rels.get(&entry.rel_id).ok_or_else(|| {
            DepgError::Workbook(format!("sheet '{}' has no relationship target", entry.name))
        })?;
        let xml = read_part(&mut archive, part)?.ok_or_else(|| {
            DepgError::Workbook(format!("sheet '{}': {} is missing from the package", entry.name, part))
        })?;
        validations.extend(read_list_validations(&entry.name, &xml)?);
    }

    let core = match read_part(&mut archive, "docProps/core.xml")? {
        Some(xml) => properties::read_core_properties(&xml)?,
        None => Default::default(),
    };

    Ok(WorkbookInspection {
        properties: SpreadsheetProperties {
            // The sheet shown on open, not necessarily the first one. When
            // activeTab is not 0 this differs from caching sheetnames[0], but it
            // keeps the cached name and the validations on the same sheet.
            sheet_name: entries[active_sheet].name.clone(),
            created: core.created,
            creator: core.creator,
            last_modified_by: core.last_modified_by,
            modified: core.modified,
        },
        sheets: entries.into_iter().map(|e| e.name).collect(),
        active_sheet,
        validations,
    })
}
