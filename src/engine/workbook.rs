//! Workbook-backed formula engine
//!
//! Loads every sheet of an `.xlsx` with calamine and keeps the raw cells.
//! Each evaluation seeds a fresh formualizer workbook with those cells and
//! the overrides, so one engine serves concurrent requests.

use super::{CellError, CellResult, FormulaEngine, Overrides, Solution, Value};
use crate::address::{book_name, parse_qualified, CellRef};
use crate::error::{DepgError, DepgResult};
use calamine::{open_workbook, CellErrorType, Data, Reader, Xlsx};
use formualizer::{LiteralValue, Workbook};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

type CellKey = (usize, CellRef);

/// Raw content of one cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellInput {
    Value(Value),
    /// Formula text, with or without the leading `=`
    Formula(String),
}

impl CellInput {
    /// Typed-entry interpretation: `=` starts a formula
    pub fn from_entry(entry: &str) -> Self {
        if entry.starts_with('=') {
            CellInput::Formula(entry.to_string())
        } else {
            CellInput::Value(Value::from_input(entry))
        }
    }
}

/// One worksheet's cells
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub name: String,
    pub cells: Vec<(CellRef, CellInput)>,
}

impl SheetData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
        }
    }

    /// Build a sheet from `(coordinate, entry)` pairs
    pub fn from_entries(name: impl Into<String>, entries: &[(&str, &str)]) -> DepgResult<Self> {
        let mut sheet = Self::new(name);
        for (coord, entry) in entries {
            sheet.cells.push((CellRef::parse(coord)?, CellInput::from_entry(entry)));
        }
        Ok(sheet)
    }
}

/// A loaded workbook, evaluated on demand by formualizer.
///
/// formualizer's builtins already carry the lookup and rounding semantics the
/// generator spreadsheets rely on: `INT` floors toward negative infinity,
/// `VLOOKUP`/`HLOOKUP` truncate a fractional column or row index, and
/// `PRODUCT` over no numbers is 0. No function overrides are installed.
#[derive(Debug)]
pub struct WorkbookEngine {
    book: String,
    sheet_names: Vec<String>,
    sheet_index: HashMap<String, usize>,
    /// Sorted so every evaluation seeds cells in the same order
    cells: BTreeMap<CellKey, CellInput>,
}

impl WorkbookEngine {
    /// Load an `.xlsx`
    pub fn load(path: impl AsRef<Path>) -> DepgResult<Self> {
        let path = path.as_ref();
        Self::from_sheets(book_name(path), read_sheets(path)?)
    }

    /// Wrap in-memory sheets. `book` is the name used in qualified addresses.
    pub fn from_sheets(book: impl Into<String>, sheets: Vec<SheetData>) -> DepgResult<Self> {
        let book = book.into().to_uppercase();
        let sheet_names: Vec<String> = sheets.iter().map(|s| s.name.clone()).collect();
        let mut sheet_index = HashMap::with_capacity(sheet_names.len());
        for (i, name) in sheet_names.iter().enumerate() {
            if sheet_index.insert(name.to_uppercase(), i).is_some() {
                return Err(DepgError::Workbook(format!("Duplicate sheet '{}'", name)));
            }
        }

        let cells = sheets
            .into_iter()
            .enumerate()
            .flat_map(|(i, sheet)| sheet.cells.into_iter().map(move |(cell, input)| ((i, cell), input)))
            .collect();

        Ok(Self {
            book,
            sheet_names,
            sheet_index,
            cells,
        })
    }

    /// Uppercased book name used in qualified addresses
    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn formula_count(&self) -> usize {
        self.cells
            .values()
            .filter(|input| matches!(input, CellInput::Formula(_)))
            .count()
    }

    /// Formula text of a cell, if it holds one
    pub fn formula(&self, address: &str) -> Option<&str> {
        let key = self.resolve_address(address).ok()?;
        match self.cells.get(&key) {
            Some(CellInput::Formula(source)) => Some(source),
            _ => None,
        }
    }

    fn qualified(&self, key: &CellKey) -> String {
        format!(
            "'[{}]{}'!{}",
            self.book,
            self.sheet_names[key.0].to_uppercase(),
            key.1
        )
    }

    fn resolve_address(&self, address: &str) -> DepgResult<CellKey> {
        let parsed = parse_qualified(address)?;
        if let Some(book) = &parsed.book {
            if !book.eq_ignore_ascii_case(&self.book) {
                return Err(DepgError::Address(format!(
                    "{} (workbook is {})",
                    address, self.book
                )));
            }
        }
        let sheet = self
            .sheet_index
            .get(&parsed.sheet.to_uppercase())
            .copied()
            .ok_or_else(|| DepgError::Address(format!("{} (no such sheet)", address)))?;
        Ok((sheet, parsed.cell))
    }

    /// A formualizer workbook holding this engine's cells, overrides applied
    fn seed(&self, overrides: &HashMap<CellKey, &Value>) -> DepgResult<Workbook> {
        let mut workbook = Workbook::new();
        for name in &self.sheet_names {
            if !workbook.has_sheet(name) {
                workbook.add_sheet(name).map_err(engine_error)?;
            }
        }

        for (key, input) in &self.cells {
            if overrides.contains_key(key) {
                continue;
            }
            match input {
                CellInput::Value(value) => self.set_value(&mut workbook, key, value)?,
                CellInput::Formula(source) => self.set_formula(&mut workbook, key, source)?,
            }
        }
        for (key, value) in overrides {
            self.set_value(&mut workbook, key, value)?;
        }
        Ok(workbook)
    }

    fn set_value(&self, workbook: &mut Workbook, key: &CellKey, value: &Value) -> DepgResult<()> {
        let (sheet, row, col) = self.position(key);
        match to_literal(value) {
            Some(literal) => workbook.set_value(sheet, row, col, literal).map_err(engine_error),
            // Error constants are entered the way a user types them
            None => workbook
                .set_formula(sheet, row, col, &format!("={}", value.display()))
                .map_err(engine_error),
        }
    }

    fn set_formula(&self, workbook: &mut Workbook, key: &CellKey, source: &str) -> DepgResult<()> {
        let (sheet, row, col) = self.position(key);
        let formula = if source.starts_with('=') {
            source.to_string()
        } else {
            format!("={}", source)
        };
        if let Err(e) = workbook.set_formula(sheet, row, col, &formula) {
            tracing::warn!(sheet, cell = %key.1, formula = source, error = %e, "unparseable formula evaluates to #NAME?");
            workbook
                .set_formula(sheet, row, col, "=#NAME?")
                .map_err(engine_error)?;
        }
        Ok(())
    }

    /// formualizer addresses are 1-based
    fn position<'a>(&'a self, key: &CellKey) -> (&'a str, u32, u32) {
        (&self.sheet_names[key.0], key.1.row + 1, key.1.col + 1)
    }
}

impl FormulaEngine for WorkbookEngine {
    fn evaluate(&self, overrides: &Overrides) -> DepgResult<Solution> {
        let mut resolved = HashMap::with_capacity(overrides.len());
        for (address, value) in overrides {
            resolved.insert(self.resolve_address(address)?, value);
        }

        let mut workbook = self.seed(&resolved)?;

        let mut cells = HashMap::with_capacity(self.cells.len() + resolved.len());
        for key in self.cells.keys().chain(resolved.keys()) {
            if cells.contains_key(&self.qualified(key)) {
                continue;
            }
            let value = match (resolved.get(key), self.cells.get(key)) {
                (Some(value), _) => (*value).clone(),
                (None, Some(CellInput::Value(value))) => value.clone(),
                (None, _) => {
                    let (sheet, row, col) = self.position(key);
                    let literal = workbook.evaluate_cell(sheet, row, col).map_err(engine_error)?;
                    from_literal(literal, &self.qualified(key))?
                }
            };
            let result = match value {
                Value::Array(grid) => CellResult { grid },
                v => CellResult::scalar(v),
            };
            cells.insert(self.qualified(key), result);
        }
        Ok(Solution::new(cells))
    }
}

fn engine_error(e: impl std::fmt::Display) -> DepgError {
    DepgError::Workbook(format!("Formula engine: {}", e))
}

/// `None` for error values, which formualizer only takes as formulas
fn to_literal(value: &Value) -> Option<LiteralValue> {
    match value {
        Value::Empty => Some(LiteralValue::Empty),
        Value::Number(n) => Some(LiteralValue::Number(*n)),
        Value::Text(s) => Some(LiteralValue::Text(s.clone())),
        Value::Boolean(b) => Some(LiteralValue::Boolean(*b)),
        Value::Error(_) => None,
        Value::Array(rows) => rows.first().and_then(|row| row.first()).and_then(to_literal),
    }
}

fn from_literal(literal: LiteralValue, address: &str) -> DepgResult<Value> {
    Ok(match literal {
        LiteralValue::Empty => Value::Empty,
        LiteralValue::Int(i) => Value::Number(i as f64),
        LiteralValue::Number(n) => Value::Number(n),
        LiteralValue::Text(s) => Value::Text(s),
        LiteralValue::Boolean(b) => Value::Boolean(b),
        LiteralValue::Error(e) => {
            let marker = e.kind.to_string();
            if marker.to_uppercase().contains("CIRC") {
                return Err(DepgError::CircularDependency(format!(
                    "Circular reference involving {}",
                    address
                )));
            }
            Value::Error(CellError::from_marker(&marker).unwrap_or(CellError::Value))
        }
        LiteralValue::Array(rows) => Value::Array(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|v| from_literal(v, address))
                        .collect::<DepgResult<Vec<_>>>()
                })
                .collect::<DepgResult<Vec<_>>>()?,
        ),
        other => {
            tracing::warn!(address, value = ?other, "unsupported cell value type evaluates to #VALUE!");
            Value::Error(CellError::Value)
        }
    })
}

fn data_to_value(data: &Data) -> Value {
    match data {
        Data::Empty => Value::Empty,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Boolean(*b),
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Error(match e {
            CellErrorType::Div0 => CellError::Div0,
            CellErrorType::NA => CellError::NA,
            CellErrorType::Name => CellError::Name,
            CellErrorType::Null => CellError::Null,
            CellErrorType::Num => CellError::Num,
            CellErrorType::Ref => CellError::Ref,
            _ => CellError::Value,
        }),
    }
}

/// Read values and formulas of every sheet
fn read_sheets(path: &Path) -> DepgResult<Vec<SheetData>> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| {
        DepgError::Workbook(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let mut sheet = SheetData::new(name.clone());

        let values = workbook
            .worksheet_range(&name)
            .map_err(|e| DepgError::Workbook(format!("Failed to read sheet '{}': {}", name, e)))?;
        let formulas = workbook.worksheet_formula(&name).map_err(|e| {
            DepgError::Workbook(format!("Failed to read formulas of '{}': {}", name, e))
        })?;

        let mut formula_at = HashMap::new();
        if let Some((row0, col0)) = formulas.start() {
            for (r, c, formula) in formulas.used_cells() {
                if !formula.is_empty() {
                    formula_at.insert(CellRef::new(row0 + r as u32, col0 + c as u32), formula.clone());
                }
            }
        }

        if let Some((row0, col0)) = values.start() {
            for (r, c, data) in values.used_cells() {
                let cell = CellRef::new(row0 + r as u32, col0 + c as u32);
                if !formula_at.contains_key(&cell) {
                    sheet.cells.push((cell, CellInput::Value(data_to_value(data))));
                }
            }
        }
        sheet.cells.extend(
            formula_at
                .into_iter()
                .map(|(cell, formula)| (cell, CellInput::Formula(formula))),
        );

        sheets.push(sheet);
    }
    Ok(sheets)
}
