//! # Data Source
//!
//! The tabular input a batch is generated from: named sheets, each an ordered
//! list of columns and rows. Spreadsheet reading itself happens elsewhere;
//! this crate consumes the sheets as JSON:
//!
//! ```json
//! {"sheets": [{"name": "Sheet1", "columns": ["Name"], "rows": [["Jan"], [null]]}]}
//! ```
//!
//! A field bound to a column is named `sheet:column`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PdsError;

/// One cell. `null` and NaN are blank.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(n) => n.is_nan(),
            CellValue::Text(s) => s.is_empty(),
            CellValue::Bool(_) => false,
        }
    }

    /// Text used for drawing and conditions. Blank cells give `""`.
    pub fn to_text(&self) -> String {
        if self.is_blank() {
            String::new()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) if n.is_nan() => Ok(()),
            // whole numbers print without a trailing ".0"
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// A named table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row`/`column`. Short rows read as blank.
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// All sheets of one workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub sheets: Vec<Sheet>,
    /// Where the data was loaded from. Relative image names resolve against
    /// its directory, and output goes to `<dir>/PDS`.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl DataSource {
    /// Parse a data source from JSON text.
    pub fn from_json(json: &str) -> Result<Self, PdsError> {
        let source: DataSource = serde_json::from_str(json)?;
        source.validate()?;
        Ok(source)
    }

    /// Read and parse a data file.
    pub fn load(path: &Path) -> Result<Self, PdsError> {
        let json = std::fs::read_to_string(path)?;
        let mut source = Self::from_json(&json)?;
        source.path = Some(path.to_path_buf());
        log::info!(
            "loaded {} sheet(s), {} row(s) from {}",
            source.sheets.len(),
            source.row_count(),
            path.display()
        );
        Ok(source)
    }

    fn validate(&self) -> Result<(), PdsError> {
        for (i, sheet) in self.sheets.iter().enumerate() {
            if sheet.name.contains(':') {
                return Err(PdsError::Data(format!(
                    "sheet name '{}' must not contain ':'",
                    sheet.name
                )));
            }
            if self.sheets[..i].iter().any(|s| s.name == sheet.name) {
                return Err(PdsError::Data(format!("duplicate sheet '{}'", sheet.name)));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Number of rows to generate: the length of the first sheet.
    pub fn row_count(&self) -> usize {
        self.sheets.first().map(|s| s.rows.len()).unwrap_or(0)
    }

    /// Resolved text of `sheet:column` at `row`; `""` when anything is
    /// missing or the cell is blank.
    pub fn value(&self, sheet: &str, column: &str, row: usize) -> String {
        self.sheet(sheet)
            .and_then(|s| s.cell(row, column))
            .map(CellValue::to_text)
            .unwrap_or_default()
    }

    /// First column of the first sheet at `row`, used to name output files.
    pub fn first_column_value(&self, row: usize) -> String {
        self.sheets
            .first()
            .and_then(|s| s.rows.get(row))
            .and_then(|r| r.first())
            .map(CellValue::to_text)
            .unwrap_or_default()
    }

    /// Every bindable field name, `sheet:column`, in sheet and column order.
    pub fn column_fields(&self) -> Vec<String> {
        self.sheets
            .iter()
            .flat_map(|s| s.columns.iter().map(move |c| format!("{}:{}", s.name, c)))
            .collect()
    }

    /// Directory of the data file.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }
}

/// Parse a 1-based row number typed by the user into a 0-based index.
pub fn parse_row_number(text: &str, row_count: usize) -> Result<usize, PdsError> {
    let row: usize = text
        .trim()
        .parse()
        .map_err(|_| PdsError::InvalidInput(format!("invalid row number '{}'", text)))?;
    if row == 0 || row > row_count {
        return Err(PdsError::InvalidInput(format!(
            "row {} out of range 1..={}",
            row, row_count
        )));
    }
    Ok(row - 1)
}
