use std::collections::BTreeMap;

use log::warn;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::model::{CellValue, Table};
use super::scaffold::scaffold_key;
use crate::error::{BenchError, Result};

/// Seed used whenever a caller does not pick one.
pub const DEFAULT_SEED: u64 = 42;

/// Train/valid/test fractions used whenever a caller does not pick them.
pub const DEFAULT_FRAC: [f64; 3] = [0.7, 0.1, 0.2];

/// Column holding SMILES strings or entity ids unless a policy names another.
pub const DEFAULT_KEY_COLUMN: &str = "Drug";

// ---------------------------------------------------------------------------
// Split policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Rows are shuffled independently.
    Random,
    /// Rows sharing a molecular framework land in the same split.
    Scaffold,
    /// Rows sharing a key-column value land in the same split.
    Cold,
}

/// How a dataset is partitioned into train/valid/test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPolicy {
    pub method: SplitMethod,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_frac")]
    pub frac: [f64; 3],
    /// SMILES column for scaffold splits, entity column for cold splits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_frac() -> [f64; 3] {
    DEFAULT_FRAC
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self::random(DEFAULT_SEED, DEFAULT_FRAC)
    }
}

impl SplitPolicy {
    pub fn random(seed: u64, frac: [f64; 3]) -> Self {
        Self {
            method: SplitMethod::Random,
            seed,
            frac,
            column: None,
        }
    }

    pub fn scaffold(seed: u64, frac: [f64; 3]) -> Self {
        Self {
            method: SplitMethod::Scaffold,
            seed,
            frac,
            column: None,
        }
    }

    pub fn cold(column: impl Into<String>, seed: u64, frac: [f64; 3]) -> Self {
        Self {
            method: SplitMethod::Cold,
            seed,
            frac,
            column: Some(column.into()),
        }
    }

    /// Fixed policy of the ADMET benchmark group.
    pub fn admet() -> Self {
        Self::scaffold(DEFAULT_SEED, DEFAULT_FRAC)
    }

    pub fn key_column(&self) -> &str {
        self.column.as_deref().unwrap_or(DEFAULT_KEY_COLUMN)
    }

    /// Fractions must be non-negative and sum to one.
    pub fn validate(&self) -> Result<()> {
        if self.frac.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(BenchError::InvalidSplit(format!(
                "fractions must be non-negative, got {:?}",
                self.frac
            )));
        }
        let total: f64 = self.frac.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(BenchError::InvalidSplit(format!(
                "fractions must sum to 1, got {total}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// The three partitions of one dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitBundle {
    pub train: Table,
    pub valid: Table,
    pub test: Table,
}

/// Row indices of train/valid/test.  Together they cover every row of the
/// table exactly once.
pub fn split_indices(table: &Table, policy: &SplitPolicy) -> Result<[Vec<usize>; 3]> {
    policy.validate()?;
    table.check_shape()?;
    let mut rng = StdRng::seed_from_u64(policy.seed);
    match policy.method {
        SplitMethod::Random => {
            let groups = (0..table.len()).map(|i| vec![i]).collect();
            Ok(fold_groups(groups, &policy.frac, &mut rng))
        }
        SplitMethod::Cold => {
            let groups = group_by(table, policy.key_column(), |cell| Ok(cell.clone()))?;
            Ok(fold_groups(groups, &policy.frac, &mut rng))
        }
        SplitMethod::Scaffold => {
            let groups = group_by(table, policy.key_column(), |cell| {
                let smiles = cell.to_string();
                Ok(scaffold_key(&smiles).unwrap_or_else(|e| {
                    warn!("{e:#}; keeping the molecule in its own scaffold set");
                    format!("invalid:{smiles}")
                }))
            })?;
            Ok(scaffold_groups(groups, table.len(), &policy.frac, &mut rng))
        }
    }
}

/// Partition a table according to `policy`.
pub fn split_table(table: &Table, policy: &SplitPolicy) -> Result<SplitBundle> {
    let [train, valid, test] = split_indices(table, policy)?;
    Ok(SplitBundle {
        train: table.select(&train),
        valid: table.select(&valid),
        test: table.select(&test),
    })
}

/// Row indices grouped by a key derived from one column, groups in order of
/// first appearance.
fn group_by<K: Ord>(
    table: &Table,
    column: &str,
    key: impl Fn(&CellValue) -> Result<K>,
) -> Result<Vec<Vec<usize>>> {
    let mut order: Vec<Vec<usize>> = Vec::new();
    let mut slots: BTreeMap<K, usize> = BTreeMap::new();
    for (row, cell) in table.column(column)?.enumerate() {
        let k = key(cell)?;
        let slot = *slots.entry(k).or_insert_with(|| {
            order.push(Vec::new());
            order.len() - 1
        });
        order[slot].push(row);
    }
    Ok(order)
}

/// Shuffle groups, then draw the test share, then the valid share of what is
/// left; the rest is train.  Group counts are rounded to the nearest integer.
fn fold_groups(mut groups: Vec<Vec<usize>>, frac: &[f64; 3], rng: &mut StdRng) -> [Vec<usize>; 3] {
    groups.shuffle(rng);
    let n_groups = groups.len();
    let n_test = ((frac[2] * n_groups as f64).round() as usize).min(n_groups);
    let remaining = n_groups - n_test;
    let train_valid = frac[0] + frac[1];
    let n_valid = if train_valid > 0.0 {
        ((frac[1] / train_valid * remaining as f64).round() as usize).min(remaining)
    } else {
        0
    };

    let test: Vec<usize> = groups[..n_test].iter().flatten().copied().collect();
    let valid: Vec<usize> = groups[n_test..n_test + n_valid]
        .iter()
        .flatten()
        .copied()
        .collect();
    let mut train: Vec<usize> = groups[n_test + n_valid..]
        .iter()
        .flatten()
        .copied()
        .collect();
    train.sort_unstable();
    [train, valid, test]
}

/// Balanced scaffold assignment: sets too large for valid/test go first,
/// each class shuffled, then sets fill train, then valid, then test.
fn scaffold_groups(
    groups: Vec<Vec<usize>>,
    n_rows: usize,
    frac: &[f64; 3],
    rng: &mut StdRng,
) -> [Vec<usize>; 3] {
    let train_size = (frac[0] * n_rows as f64).floor() as usize;
    let valid_size = (frac[1] * n_rows as f64).floor() as usize;
    let big_threshold = |f: f64| f * n_rows as f64 / 2.0;

    let (mut big, mut small): (Vec<_>, Vec<_>) = groups.into_iter().partition(|g| {
        g.len() as f64 > big_threshold(frac[1]) || g.len() as f64 > big_threshold(frac[2])
    });
    big.shuffle(rng);
    small.shuffle(rng);

    let mut out: [Vec<usize>; 3] = Default::default();
    for group in big.into_iter().chain(small) {
        let slot = if out[0].len() + group.len() <= train_size {
            0
        } else if out[1].len() + group.len() <= valid_size {
            1
        } else {
            2
        };
        out[slot].extend(group);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn molecules(n: usize) -> Table {
        let smiles = [
            "c1ccccc1C",
            "CCO",
            "c1ccncc1",
            "C1CCCCC1O",
            "c1ccc2ccccc2c1",
            "CCN",
            "c1ccoc1",
            "C1CC1C",
        ];
        let rows = (0..n)
            .map(|i| {
                vec![
                    CellValue::String(format!("D{i}")),
                    CellValue::String(smiles[i % smiles.len()].to_string()),
                    CellValue::Float(i as f64),
                ]
            })
            .collect();
        Table::new(vec!["Drug_ID".into(), "Drug".into(), "Y".into()], rows).unwrap()
    }

    fn assert_partition(parts: &[Vec<usize>; 3], n: usize) {
        let all: BTreeSet<usize> = parts.iter().flatten().copied().collect();
        assert_eq!(parts.iter().map(Vec::len).sum::<usize>(), n);
        assert_eq!(all.len(), n, "splits overlap");
        assert_eq!(all, (0..n).collect());
    }

    #[test]
    fn every_method_partitions_rows() {
        let table = molecules(97);
        for policy in [
            SplitPolicy::default(),
            SplitPolicy::admet(),
            SplitPolicy::cold("Drug", 7, [0.8, 0.1, 0.1]),
        ] {
            let parts = split_indices(&table, &policy).unwrap();
            assert_partition(&parts, table.len());
        }
    }

    #[test]
    fn random_split_sizes_follow_fractions() {
        let table = molecules(100);
        let [train, valid, test] = split_indices(&table, &SplitPolicy::default()).unwrap();
        assert_eq!((train.len(), valid.len(), test.len()), (70, 10, 20));
    }

    #[test]
    fn same_seed_same_membership() {
        let table = molecules(64);
        let a = split_indices(&table, &SplitPolicy::admet()).unwrap();
        let b = split_indices(&table, &SplitPolicy::admet()).unwrap();
        assert_eq!(a, b);

        let r1 = split_indices(&table, &SplitPolicy::random(1, DEFAULT_FRAC)).unwrap();
        let r2 = split_indices(&table, &SplitPolicy::random(2, DEFAULT_FRAC)).unwrap();
        assert_ne!(r1, r2);
    }

    #[test]
    fn scaffold_sets_never_straddle_splits() {
        let table = molecules(80);
        let parts = split_indices(&table, &SplitPolicy::admet()).unwrap();
        let smiles: Vec<String> = table.column("Drug").unwrap().map(|c| c.to_string()).collect();
        let key_of = |i: usize| scaffold_key(&smiles[i]).unwrap();
        for (a, part_a) in parts.iter().enumerate() {
            for (b, part_b) in parts.iter().enumerate() {
                if a == b {
                    continue;
                }
                let keys_b: BTreeSet<String> = part_b.iter().map(|&i| key_of(i)).collect();
                assert!(part_a.iter().all(|&i| !keys_b.contains(&key_of(i))));
            }
        }
    }

    #[test]
    fn cold_split_keeps_entities_together() {
        let table = molecules(40);
        let [train, _, test] = split_indices(&table, &SplitPolicy::cold("Drug", 3, DEFAULT_FRAC)).unwrap();
        let drug = |i: usize| table.rows[i][1].clone();
        let train_drugs: BTreeSet<CellValue> = train.iter().map(|&i| drug(i)).collect();
        assert!(test.iter().all(|&i| !train_drugs.contains(&drug(i))));
    }

    #[test]
    fn split_table_keeps_columns() {
        let table = molecules(20);
        let bundle = split_table(&table, &SplitPolicy::default()).unwrap();
        assert_eq!(bundle.train.columns, table.columns);
        assert_eq!(bundle.train.len() + bundle.valid.len() + bundle.test.len(), 20);
    }

    #[test]
    fn bad_fractions_are_rejected() {
        let table = molecules(10);
        let policy = SplitPolicy::random(1, [0.5, 0.5, 0.5]);
        assert!(matches!(
            split_indices(&table, &policy),
            Err(BenchError::InvalidSplit(_))
        ));
        let policy = SplitPolicy::random(1, [1.2, -0.1, -0.1]);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn missing_key_column_is_reported() {
        let table = molecules(10);
        let policy = SplitPolicy::cold("Target", 1, DEFAULT_FRAC);
        assert!(matches!(
            split_indices(&table, &policy),
            Err(BenchError::Malformed(_))
        ));
    }

    #[test]
    fn ragged_rows_are_reported_not_indexed() {
        let mut table = molecules(10);
        table.rows[4].pop();
        for policy in [SplitPolicy::default(), SplitPolicy::admet()] {
            assert!(matches!(
                split_table(&table, &policy),
                Err(BenchError::Malformed(_))
            ));
        }
    }

    #[test]
    fn policy_reads_from_json_with_defaults() {
        let policy: SplitPolicy = serde_json::from_str(r#"{"method":"scaffold"}"#).unwrap();
        assert_eq!(policy, SplitPolicy::admet());
    }
}
