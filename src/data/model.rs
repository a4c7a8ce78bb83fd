use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BenchError, Result};

/// Name of the label column every benchmark table carries.
pub const LABEL_COLUMN: &str = "Y";

// ---------------------------------------------------------------------------
// CellValue – a single cell in a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Used as a `BTreeMap` key when grouping rows, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can group rows by CellValue --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

/// Formats the cell the way it is persisted in CSV split files.
/// Floats use the shortest representation that parses back to the same bits.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64` (labels, predictions).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Borrow the value as text when it is a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Infer a cell type from raw text as found in CSV/TSV files.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Table – a labeled, row-oriented dataset
// ---------------------------------------------------------------------------

/// A full or partial dataset: ordered column names plus rows of cells.
///
/// Every row holds exactly `columns.len()` cells; constructors pad or reject
/// so the invariant holds for all tables handed out by this crate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Row-major cell storage.
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table, rejecting rows whose width does not match the header.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let table = Self { columns, rows };
        table.check_shape()?;
        Ok(table)
    }

    /// Fails with `Malformed` if any row's width differs from the header.
    /// Tables assembled through the public fields are not checked otherwise.
    pub fn check_shape(&self) -> Result<()> {
        match self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
        {
            Some((i, row)) => Err(BenchError::malformed(format!(
                "row {i} has {} cells but the header has {} columns",
                row.len(),
                self.columns.len()
            ))),
            None => Ok(()),
        }
    }

    /// Build a table from keyed records, taking the union of keys as columns
    /// (sorted) and filling missing cells with `Null`.
    pub fn from_records(records: Vec<BTreeMap<String, CellValue>>) -> Self {
        let columns: Vec<String> = records
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows = records
            .into_iter()
            .map(|mut r| {
                columns
                    .iter()
                    .map(|c| r.remove(c).unwrap_or(CellValue::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the cells of one column.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &CellValue> + '_> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| BenchError::malformed(format!("missing '{name}' column")))?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Extract the `Y` column as numbers.
    pub fn labels(&self) -> Result<Vec<f64>> {
        self.column(LABEL_COLUMN)?
            .enumerate()
            .map(|(i, cell)| {
                cell.as_f64().ok_or_else(|| {
                    BenchError::malformed(format!("row {i}: label '{cell}' is not numeric"))
                })
            })
            .collect()
    }

    /// New table holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            vec!["Drug".into(), "Y".into()],
            vec![
                vec![CellValue::String("CCO".into()), CellValue::Integer(1)],
                vec![CellValue::String("c1ccccc1".into()), CellValue::Float(0.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn parse_guesses_types() {
        assert_eq!(CellValue::parse(""), CellValue::Null);
        assert_eq!(CellValue::parse("3"), CellValue::Integer(3));
        assert_eq!(CellValue::parse("0.25"), CellValue::Float(0.25));
        assert_eq!(CellValue::parse("true"), CellValue::Bool(true));
        assert_eq!(CellValue::parse("CCO"), CellValue::String("CCO".into()));
    }

    #[test]
    fn display_keeps_floats_as_floats() {
        assert_eq!(CellValue::Float(2.0).to_string(), "2.0");
        assert_eq!(CellValue::parse(&CellValue::Float(2.0).to_string()), CellValue::Float(2.0));
        assert_eq!(CellValue::Float(0.1).to_string(), "0.1");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn labels_reads_y_column() {
        assert_eq!(table().labels().unwrap(), vec![1.0, 0.5]);
    }

    #[test]
    fn labels_require_y_column() {
        let t = Table::new(vec!["Drug".into()], vec![]).unwrap();
        assert!(matches!(t.labels(), Err(BenchError::Malformed(_))));
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Table::new(vec!["a".into(), "b".into()], vec![vec![CellValue::Null]]);
        assert!(err.is_err());
    }

    #[test]
    fn select_keeps_order() {
        let t = table().select(&[1, 0]);
        assert_eq!(t.labels().unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn from_records_fills_missing_cells() {
        let mut a = BTreeMap::new();
        a.insert("Y".to_string(), CellValue::Integer(1));
        let mut b = BTreeMap::new();
        b.insert("Drug".to_string(), CellValue::String("C".into()));
        let t = Table::from_records(vec![a, b]);
        assert_eq!(t.columns, vec!["Drug".to_string(), "Y".to_string()]);
        assert_eq!(t.rows[0][0], CellValue::Null);
    }
}
