//! Dropdown catalog and its on-disk cache
//!
//! Loading the workbook is slow, so the dropdowns shown on the form are
//! computed once from the workbook's list validations and persisted as JSON.

use crate::address::qualified_address;
use crate::config::Config;
use crate::engine::{EvaluationSession, Solution, Value};
use crate::error::{DepgError, DepgResult};
use crate::excel::{inspect_workbook, ListSource, ListValidation, SpreadsheetProperties};
use crate::types::OrderedMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// One dropdown: its label, allowed values and the request's selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub category: String,
    pub values: Vec<String>,
    /// Request-scoped; never persisted
    #[serde(skip_serializing, default)]
    pub selected_idx: usize,
}

impl CatalogEntry {
    pub fn new(category: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            category: category.into(),
            values,
            selected_idx: 0,
        }
    }

    /// Select the position of `value`, or 0 when it is not an allowed value
    pub fn select(&mut self, value: &str) {
        self.selected_idx = self.values.iter().position(|v| v == value).unwrap_or(0);
    }

    pub fn selected(&self) -> Option<&str> {
        self.values.get(self.selected_idx).map(String::as_str)
    }
}

/// Target coordinate → dropdown, in workbook order
pub type Catalog = OrderedMap<CatalogEntry>;

/// The persisted cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropdownCache {
    pub properties: SpreadsheetProperties,
    pub dropdown_data: Catalog,
}

impl DropdownCache {
    /// A copy of the catalog with selections taken from submitted form fields
    pub fn with_selections(&self, form: &HashMap<String, String>) -> Catalog {
        let mut catalog = self.dropdown_data.clone();
        for (coord, entry) in catalog.iter_mut() {
            match form.get(coord) {
                Some(value) => entry.select(value),
                None => entry.selected_idx = 0,
            }
        }
        catalog
    }

    /// `"<category>: <submitted value>"` for every entry, joined by `", "`
    pub fn notes(&self, form: &HashMap<String, String>) -> String {
        self.dropdown_data
            .iter()
            .map(|(coord, entry)| {
                let value = form.get(coord).map(String::as_str).unwrap_or("");
                format!("{}: {}", entry.category, value)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn reset_selections(&mut self) {
        for entry in self.dropdown_data.values_mut() {
            entry.selected_idx = 0;
        }
    }
}

fn cell_text(solution: &Solution, spreadsheet_file: &Path, sheet: &str, coord: &str) -> String {
    solution
        .value(&qualified_address(spreadsheet_file, sheet, coord))
        .display()
}

/// Allowed values of one dropdown; a range on a missing sheet aborts the rebuild
fn list_values(
    validation: &ListValidation,
    solution: &Solution,
    spreadsheet_file: &Path,
    sheets: &[String],
) -> DepgResult<Vec<String>> {
    match &validation.source {
        ListSource::Inline(items) => Ok(items.clone()),
        ListSource::Range { sheet, .. } => {
            let unreadable = |what: String| {
                DepgError::Cache(format!(
                    "sheet '{}': dropdown {} (formula1=\"{}\") {}",
                    validation.sheet, validation.target, validation.formula, what
                ))
            };
            let range = validation
                .source
                .cell_range()
                .ok_or_else(|| unreadable("has an unreadable range".to_string()))?;
            let sheet = sheet.as_deref().unwrap_or(&validation.sheet);
            if !sheets.iter().any(|s| s.eq_ignore_ascii_case(sheet)) {
                return Err(unreadable(format!("reads missing sheet '{}'", sheet)));
            }
            Ok(range
                .cells()
                .filter_map(|cell| {
                    let address = qualified_address(spreadsheet_file, sheet, &cell.to_string());
                    match solution.value(&address) {
                        Value::Empty => None,
                        v => Some(v.display()),
                    }
                })
                .collect())
        }
    }
}

/// Build the cache from the workbook's structure and baseline values
pub fn build_cache(config: &Config, session: &EvaluationSession) -> DepgResult<DropdownCache> {
    let spreadsheet_file = config.spreadsheet_file.as_path();
    let inspection = inspect_workbook(spreadsheet_file)?;
    let solution = session.baseline()?;
    let sheet = inspection.active_sheet_name();

    let mut catalog = Catalog::new();
    for validation in inspection.active_validations() {
        let label = validation.target.left().ok_or_else(|| {
            DepgError::Cache(format!(
                "dropdown at {} has no label cell to its left",
                validation.target
            ))
        })?;
        let category = cell_text(&solution, spreadsheet_file, sheet, &label.to_string());
        let values = list_values(validation, &solution, spreadsheet_file, &inspection.sheets)?;
        tracing::debug!(
            coord = %validation.target,
            category = %category,
            values = values.len(),
            "dropdown discovered"
        );
        catalog.insert(validation.target.to_string(), CatalogEntry::new(category, values));
    }

    Ok(DropdownCache {
        properties: inspection.properties,
        dropdown_data: catalog,
    })
}

/// Persist atomically: a temp file in the same directory, then rename
pub fn write_cache(cache: &DropdownCache, path: &Path) -> DepgResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut json = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
    cache.serialize(&mut serializer)?;
    json.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| DepgError::Io(e.error))?;
    Ok(())
}

/// Read the cache; every selection starts at 0
pub fn load_cache(path: &Path) -> DepgResult<DropdownCache> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DepgError::Cache(format!(
            "cannot read {}: {} (rebuild it with `depg cache`)",
            path.display(),
            e
        ))
    })?;
    let mut cache: DropdownCache = serde_json::from_str(&content).map_err(|e| {
        DepgError::Cache(format!("{} is corrupt: {} (rebuild it)", path.display(), e))
    })?;
    cache.reset_selections();
    Ok(cache)
}

/// Rebuild from the workbook and persist
pub fn refresh_cache(config: &Config, session: &EvaluationSession) -> DepgResult<DropdownCache> {
    let started = Instant::now();
    let cache = build_cache(config, session)?;
    write_cache(&cache, &config.cache_json)?;
    tracing::info!(
        path = %config.cache_json.display(),
        dropdowns = cache.dropdown_data.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dropdown cache rebuilt"
    );
    Ok(cache)
}

/// Startup path: rebuild when forced or when no cache exists, otherwise load
pub fn load_or_build(
    config: &Config,
    session: &EvaluationSession,
    force: bool,
) -> DepgResult<DropdownCache> {
    if force || !config.cache_json.exists() {
        refresh_cache(config, session)
    } else {
        load_cache(&config.cache_json)
    }
}
