//! On-disk cache of materialized splits.
//!
//! Layout: `<base>/<group>_benchmark/<dataset>/{train,valid,test}.csv`.
//!
//! The three files of a dataset are committed as a unit.  Each is written to a
//! `.tmp` sibling first; `valid.csv` and `test.csv` are renamed into place and
//! `train.csv` goes last.  Since [`SplitCache::is_cached`] keys on
//! `train.csv`, an interrupted commit is never mistaken for a complete one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::data::loader::{read_table, write_csv};
use crate::data::{SplitBundle, Table};
use crate::error::{BenchError, Result};

pub const TRAIN_FILE: &str = "train.csv";
pub const VALID_FILE: &str = "valid.csv";
pub const TEST_FILE: &str = "test.csv";

/// Split files of one benchmark group.
#[derive(Debug, Clone)]
pub struct SplitCache {
    root: PathBuf,
}

impl SplitCache {
    /// Open (creating if needed) `<base>/<group>_benchmark`.
    pub fn open(base: &Path, group: &str) -> Result<Self> {
        fs::create_dir_all(base).map_err(|e| BenchError::io(base, e))?;
        let root = base.join(format!("{group}_benchmark"));
        fs::create_dir_all(&root).map_err(|e| BenchError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Directory holding every dataset of the group.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset)
    }

    /// Create the dataset directory if absent.
    pub fn ensure_dataset_dir(&self, dataset: &str) -> Result<PathBuf> {
        let dir = self.dataset_dir(dataset);
        fs::create_dir_all(&dir).map_err(|e| BenchError::io(&dir, e))?;
        Ok(dir)
    }

    /// Whether a committed split exists for `dataset`.
    pub fn is_cached(&self, dataset: &str) -> bool {
        self.dataset_dir(dataset).join(TRAIN_FILE).is_file()
    }

    /// Persist the three partitions of `dataset`.
    pub fn store(&self, dataset: &str, splits: &SplitBundle) -> Result<()> {
        let dir = self.ensure_dataset_dir(dataset)?;
        let parts = [
            (VALID_FILE, &splits.valid),
            (TEST_FILE, &splits.test),
            (TRAIN_FILE, &splits.train),
        ];

        let mut staged = Vec::with_capacity(parts.len());
        for (file, table) in parts {
            let tmp = dir.join(format!("{file}.tmp"));
            write_csv(table, &tmp)?;
            staged.push((tmp, dir.join(file)));
        }
        for (tmp, target) in staged {
            fs::rename(&tmp, &target).map_err(|e| BenchError::io(&target, e))?;
        }
        Ok(())
    }

    /// Read all three partitions of `dataset` from disk.
    pub fn load(&self, dataset: &str) -> Result<SplitBundle> {
        Ok(SplitBundle {
            train: self.load_part(dataset, TRAIN_FILE)?,
            valid: self.load_part(dataset, VALID_FILE)?,
            test: self.load_part(dataset, TEST_FILE)?,
        })
    }

    /// Read only the held-out test partition.
    pub fn load_test(&self, dataset: &str) -> Result<Table> {
        self.load_part(dataset, TEST_FILE)
    }

    fn load_part(&self, dataset: &str, file: &str) -> Result<Table> {
        read_table(&self.dataset_dir(dataset).join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellValue;

    fn bundle() -> SplitBundle {
        let table = |ys: &[i64]| Table {
            columns: vec!["Drug".into(), "Y".into()],
            rows: ys
                .iter()
                .map(|&y| vec![CellValue::String(format!("C{y}")), CellValue::Integer(y)])
                .collect(),
        };
        SplitBundle {
            train: table(&[1, 2, 3]),
            valid: table(&[4]),
            test: table(&[5, 6]),
        }
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("data");
        let a = SplitCache::open(&base, "admet_group").unwrap();
        let b = SplitCache::open(&base, "admet_group").unwrap();
        assert_eq!(a.root(), b.root());
        assert!(a.root().ends_with("admet_group_benchmark"));
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SplitCache::open(dir.path(), "g").unwrap();
        assert!(!cache.is_cached("ds"));
        cache.store("ds", &bundle()).unwrap();
        assert!(cache.is_cached("ds"));
        assert_eq!(cache.load("ds").unwrap(), bundle());
        assert_eq!(cache.load_test("ds").unwrap().labels().unwrap(), vec![5.0, 6.0]);

        let leftovers: Vec<_> = fs::read_dir(cache.dataset_dir("ds"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn partial_commit_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SplitCache::open(dir.path(), "g").unwrap();
        let ds = cache.ensure_dataset_dir("ds").unwrap();
        fs::write(ds.join(VALID_FILE), "Drug,Y\n").unwrap();
        fs::write(ds.join(TEST_FILE), "Drug,Y\n").unwrap();
        fs::write(ds.join("train.csv.tmp"), "Drug,Y\n").unwrap();
        assert!(!cache.is_cached("ds"));
    }

    #[test]
    fn missing_split_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SplitCache::open(dir.path(), "g").unwrap();
        assert!(matches!(cache.load("nope"), Err(BenchError::Io { .. })));
    }
}
