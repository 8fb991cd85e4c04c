//! Cell coordinates and engine-qualified addresses
//!
//! The engine addresses every cell as `'[BOOK.XLSX]SHEET'!B37`, book and
//! sheet uppercased. Users and the config speak in bare coordinates (`b37`).

use crate::config::Config;
use crate::error::{DepgError, DepgResult};
use crate::excel::SpreadsheetProperties;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Last column Excel supports (XFD)
pub const MAX_COL: u32 = 16_383;
/// Last row Excel supports
pub const MAX_ROW: u32 = 1_048_575;

fn cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]+)$").expect("valid cell regex"))
}

/// Zero-based cell position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style coordinate. `$` markers are accepted and ignored.
    pub fn parse(coord: &str) -> DepgResult<Self> {
        let caps = cell_regex()
            .captures(coord.trim())
            .ok_or_else(|| DepgError::Address(coord.to_string()))?;

        let col = column_letter_to_index(&caps[1])
            .filter(|c| *c <= MAX_COL)
            .ok_or_else(|| DepgError::Address(coord.to_string()))?;
        let row: u32 = caps[2]
            .parse()
            .ok()
            .filter(|r| (1..=MAX_ROW + 1).contains(r))
            .ok_or_else(|| DepgError::Address(coord.to_string()))?;

        Ok(Self { row: row - 1, col })
    }

    pub fn offset(&self, rows: i64, cols: i64) -> Option<CellRef> {
        let row = i64::from(self.row) + rows;
        let col = i64::from(self.col) + cols;
        if !(0..=i64::from(MAX_ROW)).contains(&row) || !(0..=i64::from(MAX_COL)).contains(&col) {
            return None;
        }
        Some(CellRef::new(row as u32, col as u32))
    }

    /// The cell immediately to the left, if any
    pub fn left(&self) -> Option<CellRef> {
        self.offset(0, -1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_index_to_letter(self.col), self.row + 1)
    }
}

/// Serialized as its A1 coordinate
impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for CellRef {
    type Err = DepgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::parse(s)
    }
}

/// Rectangular block of cells, normalized so `start` is top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Parse `A1:B5` or a single `A1`
    pub fn parse(range: &str) -> DepgResult<Self> {
        match range.split_once(':') {
            Some((a, b)) => Ok(Self::new(CellRef::parse(a)?, CellRef::parse(b)?)),
            None => {
                let cell = CellRef::parse(range)?;
                Ok(Self::new(cell, cell))
            }
        }
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// Every cell, row-major
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col)))
    }
}

/// Convert a zero-based column index to letters
///
/// Examples:
/// - 0 → A
/// - 25 → Z
/// - 26 → AA
pub fn column_index_to_letter(index: u32) -> String {
    let mut result = String::new();
    let mut idx = index;

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// Convert column letters (case-insensitive) to a zero-based index
pub fn column_letter_to_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut idx: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        idx = idx.checked_mul(26)?.checked_add(digit)?;
    }
    Some(idx - 1)
}

/// Book name as the engine sees it: the file name, uppercased
pub fn book_name(spreadsheet_file: &Path) -> String {
    spreadsheet_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| spreadsheet_file.to_string_lossy().into_owned())
        .to_uppercase()
}

/// Build `'[BOOK]SHEET'!COORD` with every part uppercased
pub fn qualified_address(spreadsheet_file: &Path, sheet_name: &str, coord: &str) -> String {
    format!(
        "'[{}]{}'!{}",
        book_name(spreadsheet_file),
        sheet_name.to_uppercase(),
        coord.trim().to_uppercase()
    )
}

/// A parsed qualified address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedAddress {
    pub book: Option<String>,
    pub sheet: String,
    pub cell: CellRef,
}

/// Parse `'[BOOK]SHEET'!A1`, `[BOOK]SHEET!A1`, `'SHEET'!A1` or `SHEET!A1`
pub fn parse_qualified(address: &str) -> DepgResult<QualifiedAddress> {
    let bad = || DepgError::Address(address.to_string());
    let (prefix, coord) = address.trim().rsplit_once('!').ok_or_else(bad)?;
    let cell = CellRef::parse(coord)?;

    let prefix = match prefix.strip_prefix('\'').and_then(|p| p.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => prefix.to_string(),
    };

    let (book, sheet) = match prefix.strip_prefix('[') {
        Some(rest) => {
            let (book, sheet) = rest.split_once(']').ok_or_else(bad)?;
            (Some(book.to_string()), sheet.to_string())
        }
        None => (None, prefix),
    };

    if sheet.is_empty() {
        return Err(bad());
    }

    Ok(QualifiedAddress { book, sheet, cell })
}

/// Translates bare coordinates for one spreadsheet
#[derive(Debug, Clone)]
pub struct AddressTranslator {
    spreadsheet_file: std::path::PathBuf,
    default_sheet: Option<String>,
}

impl AddressTranslator {
    /// The default sheet comes from the cached spreadsheet properties; without
    /// them every call must name its sheet.
    pub fn new(config: &Config, properties: Option<&SpreadsheetProperties>) -> Self {
        Self {
            spreadsheet_file: config.spreadsheet_file.clone(),
            default_sheet: properties.map(|p| p.sheet_name.clone()),
        }
    }

    pub fn with_sheet(spreadsheet_file: impl AsRef<Path>, sheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_file: spreadsheet_file.as_ref().to_path_buf(),
            default_sheet: Some(sheet_name.into()),
        }
    }

    /// Translate against the cached sheet
    pub fn translate(&self, coord: &str) -> DepgResult<String> {
        let sheet = self.default_sheet.as_deref().ok_or_else(|| {
            DepgError::Cache("no cached sheet name; rebuild the dropdown cache".to_string())
        })?;
        Ok(qualified_address(&self.spreadsheet_file, sheet, coord))
    }

    /// Translate against an explicit sheet, falling back to the cached one
    pub fn translate_in(&self, coord: &str, sheet: Option<&str>) -> DepgResult<String> {
        match sheet {
            Some(sheet) => Ok(qualified_address(&self.spreadsheet_file, sheet, coord)),
            None => self.translate(coord),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_address_format() {
        let addr = qualified_address(Path::new("profile_generator.xlsx"), "Profile_Generator", "b37");
        assert_eq!(addr, "'[PROFILE_GENERATOR.XLSX]PROFILE_GENERATOR'!B37");
    }

    #[test]
    fn test_qualified_address_uses_file_name_only() {
        let addr = qualified_address(Path::new("/srv/depg/sheet.xlsx"), "s", "a1");
        assert_eq!(addr, "'[SHEET.XLSX]S'!A1");
    }

    #[test]
    fn test_qualified_address_case_insensitive() {
        let file = Path::new("Book.xlsx");
        for (coord, sheet) in [("B37", "Gen"), ("aa10", "SHEET one"), ("Xfd1", "x")] {
            let upper = qualified_address(file, sheet, coord);
            let lower = qualified_address(file, &sheet.to_lowercase(), &coord.to_lowercase());
            assert_eq!(upper, lower);
            assert_eq!(upper, upper.to_uppercase());
        }
    }

    #[test]
    fn test_cell_ref_parse() {
        assert_eq!(CellRef::parse("A1").unwrap(), CellRef::new(0, 0));
        assert_eq!(CellRef::parse("b37").unwrap(), CellRef::new(36, 1));
        assert_eq!(CellRef::parse("$AA$10").unwrap(), CellRef::new(9, 26));
        assert!(CellRef::parse("A0").is_err());
        assert!(CellRef::parse("37B").is_err());
        assert!(CellRef::parse("").is_err());
        assert!(CellRef::parse("XFE1").is_err());
    }

    #[test]
    fn test_cell_ref_display_roundtrip() {
        for coord in ["A1", "Z9", "AA100", "XFD1048576"] {
            assert_eq!(CellRef::parse(coord).unwrap().to_string(), coord);
        }
    }

    #[test]
    fn test_cell_ref_serializes_as_coordinate() {
        let cell = CellRef::parse("$b$37").unwrap();
        assert_eq!(serde_json::to_value(cell).unwrap(), serde_json::json!("B37"));
    }

    #[test]
    fn test_left_of_column_a_is_none() {
        assert_eq!(CellRef::parse("A5").unwrap().left(), None);
        assert_eq!(
            CellRef::parse("C5").unwrap().left(),
            Some(CellRef::parse("B5").unwrap())
        );
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_index_to_letter(0), "A");
        assert_eq!(column_index_to_letter(25), "Z");
        assert_eq!(column_index_to_letter(26), "AA");
        assert_eq!(column_index_to_letter(701), "ZZ");
        assert_eq!(column_letter_to_index("a"), Some(0));
        assert_eq!(column_letter_to_index("AZ"), Some(51));
        assert_eq!(column_letter_to_index(""), None);
    }

    #[test]
    fn test_range_cells_row_major() {
        let range = CellRange::parse("$B$2:C3").unwrap();
        let cells: Vec<String> = range.cells().map(|c| c.to_string()).collect();
        assert_eq!(cells, vec!["B2", "C2", "B3", "C3"]);
        assert_eq!(range.height(), 2);
        assert_eq!(range.width(), 2);
    }

    #[test]
    fn test_range_normalizes_corners() {
        let range = CellRange::parse("C3:A1").unwrap();
        assert_eq!(range.start, CellRef::new(0, 0));
        assert_eq!(range.end, CellRef::new(2, 2));
    }

    #[test]
    fn test_parse_qualified_forms() {
        let q = parse_qualified("'[PG.XLSX]MY SHEET'!B37").unwrap();
        assert_eq!(q.book.as_deref(), Some("PG.XLSX"));
        assert_eq!(q.sheet, "MY SHEET");
        assert_eq!(q.cell, CellRef::parse("B37").unwrap());

        let q = parse_qualified("Sheet1!A2").unwrap();
        assert_eq!(q.book, None);
        assert_eq!(q.sheet, "Sheet1");

        let q = parse_qualified("'It''s'!A1").unwrap();
        assert_eq!(q.sheet, "It's");

        assert!(parse_qualified("B37").is_err());
        assert!(parse_qualified("'[PG.XLSX'!B37").is_err());
    }

    #[test]
    fn test_translator_requires_sheet() {
        let t = AddressTranslator {
            spreadsheet_file: "pg.xlsx".into(),
            default_sheet: None,
        };
        assert!(matches!(t.translate("B3"), Err(DepgError::Cache(_))));
        assert_eq!(t.translate_in("b3", Some("gen")).unwrap(), "'[PG.XLSX]GEN'!B3");
    }

    #[test]
    fn test_translator_default_sheet() {
        let t = AddressTranslator::with_sheet("pg.xlsx", "Generator");
        assert_eq!(t.translate("b3").unwrap(), "'[PG.XLSX]GENERATOR'!B3");
        assert_eq!(t.translate_in("b3", None).unwrap(), "'[PG.XLSX]GENERATOR'!B3");
    }
}
