use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Table};
use crate::error::{BenchError, Result};

/// File extensions understood by [`read_table`], in lookup priority order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "tab", "tsv", "parquet", "json"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`           – comma-separated, header row
/// * `.tab` / `.tsv`  – tab-separated, header row
/// * `.parquet`       – scalar columns (strings, ints, floats, bools)
/// * `.json`          – `[{ "Drug": "...", "Y": 1.0, ... }, ...]`
///
/// Opening the file fails with [`BenchError::Io`]; bad contents fail with
/// [`BenchError::Table`].
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "csv" => load_delimited(file, b','),
        "tab" | "tsv" => load_delimited(file, b'\t'),
        "parquet" | "pq" => load_parquet(file),
        "json" => load_json(file),
        other => Err(anyhow::anyhow!("Unsupported file extension: .{other}")),
    };
    parsed.map_err(|e| BenchError::table(path, e))
}

/// Write a table as CSV with a header row and no index column.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let to_io = |e: csv::Error| BenchError::io(path, e.into());
    let mut writer = csv::Writer::from_path(path).map_err(to_io)?;
    writer.write_record(&table.columns).map_err(to_io)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .map_err(to_io)?;
    }
    writer.flush().map_err(|e| BenchError::io(path, e))
}

// ---------------------------------------------------------------------------
// CSV / TSV loader
// ---------------------------------------------------------------------------

/// Header row with column names, one record per row.  Cell types are inferred
/// per cell; empty cells become `Null`.
fn load_delimited(reader: impl Read, delimiter: u8) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .context("reading headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "row {row_no}: {} fields but the header has {}",
                record.len(),
                headers.len()
            );
        }
        rows.push(record.iter().map(CellValue::parse).collect());
    }

    Ok(Table {
        columns: headers,
        rows,
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Drug_ID": "D1", "Drug": "CCO", "Y": 0.53 },
///   ...
/// ]
/// ```
fn load_json(reader: impl Read) -> anyhow::Result<Table> {
    let root: JsonValue = serde_json::from_reader(reader).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut out = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let record: BTreeMap<String, CellValue> = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_cell(val)))
            .collect();
        out.push(record);
    }

    Ok(Table::from_records(out))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Nested columns are rendered as their
/// type name rather than rejected.
fn load_parquet(file: File) -> anyhow::Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_cell(col, row))
                    .collect::<anyhow::Result<Vec<_>>>()
                    .with_context(|| format!("Row {row}"))?,
            );
        }
    }

    Ok(Table { columns, rows })
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> anyhow::Result<CellValue> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    fn downcast<'a, T: 'static>(col: &'a Arc<dyn Array>) -> anyhow::Result<&'a T> {
        col.as_any()
            .downcast_ref::<T>()
            .with_context(|| format!("unexpected array for {:?}", col.data_type()))
    }
    let cell = match col.data_type() {
        DataType::Utf8 => CellValue::String(downcast::<StringArray>(col)?.value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(downcast::<Int32Array>(col)?.value(row) as i64),
        DataType::Int64 => CellValue::Integer(downcast::<Int64Array>(col)?.value(row)),
        DataType::Float32 => CellValue::Float(downcast::<Float32Array>(col)?.value(row) as f64),
        DataType::Float64 => CellValue::Float(downcast::<Float64Array>(col)?.value(row)),
        DataType::Boolean => CellValue::Bool(downcast::<BooleanArray>(col)?.value(row)),
        other => CellValue::String(format!("{other:?}")),
    };
    Ok(cell)
}
