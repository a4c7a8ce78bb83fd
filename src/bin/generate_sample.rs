//! Writes a small synthetic molecular property dataset (`Drug_ID`, `Drug`, `Y`)
//! as `<out>/<name>.parquet` and `<out>/<name>.csv`, in the layout the local
//! loader expects.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use benchmark_group::data::loader::write_csv;
use benchmark_group::{CellValue, Table};
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(about = "Generate a synthetic molecular dataset")]
struct Args {
    /// Dataset name (file stem)
    #[arg(long, default_value = "caco2_wang")]
    name: String,
    /// Output directory
    #[arg(long, default_value = "data")]
    out: PathBuf,
    /// Number of molecules
    #[arg(long, default_value_t = 200)]
    rows: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Ring systems with a base property value each.
const SCAFFOLDS: &[(&str, f64)] = &[
    ("c1ccccc1", -5.0),
    ("c1ccncc1", -5.4),
    ("c1ccc2ccccc2c1", -4.6),
    ("C1CCCCC1", -5.8),
    ("c1ccoc1", -5.2),
    ("c1ccc(cc1)-c1ccccc1", -4.8),
    ("C1CCNCC1", -6.0),
    ("c1cnc2ccccc2c1", -4.9),
];

/// Side chains with an additive contribution each.
const SUBSTITUENTS: &[(&str, f64)] = &[
    ("C", 0.1),
    ("CC", 0.2),
    ("O", -0.3),
    ("N", -0.4),
    ("Cl", 0.35),
    ("C(=O)O", -0.6),
    ("OC", 0.05),
    ("F", 0.15),
];

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut ids = Vec::with_capacity(args.rows);
    let mut smiles = Vec::with_capacity(args.rows);
    let mut labels = Vec::with_capacity(args.rows);
    for i in 0..args.rows {
        let (ring, base) = SCAFFOLDS[rng.gen_range(0..SCAFFOLDS.len())];
        let (chain, delta) = SUBSTITUENTS[rng.gen_range(0..SUBSTITUENTS.len())];
        let noise: f64 = rng.gen_range(-0.25..0.25);
        ids.push(format!("Drug {}", i + 1));
        smiles.push(format!("{chain}{ring}"));
        labels.push(((base + delta + noise) * 1000.0).round() / 1000.0);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    // Parquet
    let schema = Arc::new(Schema::new(vec![
        Field::new("Drug_ID", DataType::Utf8, false),
        Field::new("Drug", DataType::Utf8, false),
        Field::new("Y", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(ids.clone())),
            Arc::new(StringArray::from(smiles.clone())),
            Arc::new(Float64Array::from(labels.clone())),
        ],
    )
    .context("building record batch")?;

    let parquet_path = args.out.join(format!("{}.parquet", args.name));
    let file = std::fs::File::create(&parquet_path)
        .with_context(|| format!("creating {}", parquet_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    // CSV
    let table = Table {
        columns: vec!["Drug_ID".into(), "Drug".into(), "Y".into()],
        rows: ids
            .into_iter()
            .zip(smiles)
            .zip(labels)
            .map(|((id, s), y)| {
                vec![CellValue::String(id), CellValue::String(s), CellValue::Float(y)]
            })
            .collect(),
    };
    let csv_path = args.out.join(format!("{}.csv", args.name));
    write_csv(&table, &csv_path)?;

    println!(
        "Wrote {} molecules to {} and {}",
        args.rows,
        parquet_path.display(),
        csv_path.display()
    );
    Ok(())
}
