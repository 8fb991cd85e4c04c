//! Formula evaluation
//!
//! The rest of the crate treats the spreadsheet as an oracle: hand it
//! overrides keyed by qualified address, get back every cell's value.
//! [`FormulaEngine`] is that seam; [`WorkbookEngine`] is the `.xlsx`-backed
//! implementation, evaluated by formualizer.

pub mod workbook;

use crate::error::DepgResult;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub use workbook::{CellInput, SheetData, WorkbookEngine};

/// Excel error markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
}

impl CellError {
    pub const ALL: [CellError; 7] = [
        CellError::Null,
        CellError::Div0,
        CellError::Value,
        CellError::Ref,
        CellError::Name,
        CellError::Num,
        CellError::NA,
    ];

    pub fn marker(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::NA => "#N/A",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.marker().eq_ignore_ascii_case(marker))
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A cell value, or an evaluated range
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
    /// Row-major grid from a range reference
    Array(Vec<Vec<Value>>),
}

impl Value {
    /// Interpret user input the way a typed cell entry is interpreted
    pub fn from_input(input: &str) -> Value {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }
        match trimmed {
            "TRUE" => Value::Boolean(true),
            "FALSE" => Value::Boolean(false),
            _ => Value::Text(input.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Collapse a 1×1 array; larger arrays cannot be used as a scalar
    pub fn into_scalar(self) -> Result<Value, CellError> {
        match self {
            Value::Array(mut rows) => {
                if rows.len() == 1 && rows[0].len() == 1 {
                    rows.swap_remove(0).swap_remove(0).into_scalar()
                } else {
                    Err(CellError::Value)
                }
            }
            Value::Error(e) => Err(e),
            other => Ok(other),
        }
    }

    pub fn as_number(&self) -> Result<f64, CellError> {
        match self {
            Value::Empty => Ok(0.0),
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|_| CellError::Value),
            Value::Error(e) => Err(*e),
            Value::Array(_) => self.clone().into_scalar()?.as_number(),
        }
    }

    pub fn as_text(&self) -> Result<String, CellError> {
        match self {
            Value::Empty => Ok(String::new()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Text(s) => Ok(s.clone()),
            Value::Error(e) => Err(*e),
            Value::Array(_) => self.clone().into_scalar()?.as_text(),
        }
    }

    /// Display form: numbers in general format, errors as their marker
    pub fn display(&self) -> String {
        match self {
            Value::Error(e) => e.marker().to_string(),
            other => other.as_text().unwrap_or_else(|e| e.marker().to_string()),
        }
    }
}

/// Format a number the way a general-format cell shows it
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One evaluated cell: always a grid, 1×1 for scalars
#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub grid: Vec<Vec<Value>>,
}

impl CellResult {
    pub fn scalar(value: Value) -> Self {
        Self {
            grid: vec![vec![value]],
        }
    }

    /// Top-left value
    pub fn value(&self) -> &Value {
        self.grid
            .first()
            .and_then(|row| row.first())
            .unwrap_or(&Value::Empty)
    }

    /// First error marker anywhere in the grid
    pub fn error(&self) -> Option<CellError> {
        self.grid.iter().flatten().find_map(|v| match v {
            Value::Error(e) => Some(*e),
            _ => None,
        })
    }
}

/// Qualified address → value supplied in place of the cell's own content
pub type Overrides = HashMap<String, Value>;

/// Qualified address → evaluated cell
#[derive(Debug, Clone, Default)]
pub struct Solution {
    cells: HashMap<String, CellResult>,
}

impl Solution {
    pub fn new(cells: HashMap<String, CellResult>) -> Self {
        Self { cells }
    }

    pub fn get(&self, address: &str) -> Option<&CellResult> {
        self.cells
            .get(address)
            .or_else(|| self.cells.get(&address.to_uppercase()))
    }

    /// Top-left value of an address; cells the workbook never mentions are empty
    pub fn value(&self, address: &str) -> Value {
        self.get(address)
            .map(|r| r.value().clone())
            .unwrap_or(Value::Empty)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CellResult)> {
        self.cells.iter()
    }
}

/// A spreadsheet evaluated as a function of its inputs.
///
/// Implementations must be reentrant: concurrent calls share no mutable
/// evaluation state.
pub trait FormulaEngine: Send + Sync {
    /// Evaluate every cell, using `overrides` in place of the addressed cells
    fn evaluate(&self, overrides: &Overrides) -> DepgResult<Solution>;
}

/// The process-wide evaluation session
#[derive(Clone)]
pub struct EvaluationSession {
    engine: Arc<dyn FormulaEngine>,
}

impl EvaluationSession {
    pub fn new(engine: Arc<dyn FormulaEngine>) -> Self {
        Self { engine }
    }

    /// Load a workbook with the default function set
    pub fn load(spreadsheet_file: &Path) -> DepgResult<Self> {
        let started = Instant::now();
        let engine = WorkbookEngine::load(spreadsheet_file)?;
        tracing::info!(
            spreadsheet = %spreadsheet_file.display(),
            sheets = engine.sheet_names().len(),
            formulas = engine.formula_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workbook loaded"
        );
        Ok(Self::new(Arc::new(engine)))
    }

    pub fn evaluate(&self, overrides: &Overrides) -> DepgResult<Solution> {
        let started = Instant::now();
        let solution = self.engine.evaluate(overrides)?;
        tracing::debug!(
            overrides = overrides.len(),
            cells = solution.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workbook evaluated"
        );
        Ok(solution)
    }

    /// Evaluate with no overrides
    pub fn baseline(&self) -> DepgResult<Solution> {
        self.evaluate(&Overrides::new())
    }
}

impl fmt::Debug for EvaluationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationSession").finish_non_exhaustive()
    }
}
