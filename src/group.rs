//! Benchmark groups: split materialization, iteration and scoring.
//!
//! ```rust,ignore
//! use benchmark_group::BenchmarkGroup;
//!
//! let group = BenchmarkGroup::open("ADMET_Group", "data/")?;
//! let mut predictions = BTreeMap::new();
//! for benchmark in &group {
//!     let benchmark = benchmark?;
//!     // --- train a model on benchmark.train / benchmark.valid --- //
//!     predictions.insert(benchmark.name, y_pred);
//! }
//! let scores = group.evaluate_all(&predictions)?;
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::cache::SplitCache;
use crate::data::{SplitPolicy, Table};
use crate::dataset::{DatasetLoader, LoaderRegistry};
use crate::error::{BenchError, Result};
use crate::metrics::resolve_scorer;
use crate::registry::{ADMET_GROUP, GroupSpec, Registry, TaskDatasets, fuzzy_resolve};

/// Runs required by [`BenchmarkGroup::evaluate_many`].
pub const MIN_RUNS: usize = 5;

/// Splits of one member dataset, as handed to a training loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Benchmark {
    pub name: String,
    pub train: Table,
    pub valid: Table,
    pub test: Table,
}

/// Mean and population standard deviation of one dataset's score across runs,
/// each rounded to three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std: f64,
}

/// dataset → metric → score.
pub type GroupScores = BTreeMap<String, BTreeMap<String, f64>>;

// ---------------------------------------------------------------------------
// BenchmarkGroup
// ---------------------------------------------------------------------------

pub struct BenchmarkGroup {
    name: String,
    spec: GroupSpec,
    cache: SplitCache,
    loaders: BTreeMap<String, Box<dyn DatasetLoader>>,
    all_datasets: Vec<String>,
}

impl std::fmt::Debug for BenchmarkGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkGroup")
            .field("name", &self.name)
            .field("root", &self.cache.root())
            .field("datasets", &self.all_datasets)
            .finish()
    }
}

impl BenchmarkGroup {
    /// Open a group with the built-in registry and local-file loaders.
    pub fn open(name: &str, path: impl AsRef<Path>) -> Result<Self> {
        Self::new(name, path, &Registry::builtin()?, &LoaderRegistry::builtin())
    }

    /// Resolve `name`, create the cache directories, and materialize every
    /// member's split that is not cached yet.
    ///
    /// Constructing the same group twice on the same path performs no split
    /// and no write the second time.
    pub fn new(
        name: &str,
        path: impl AsRef<Path>,
        registry: &Registry,
        loaders: &LoaderRegistry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let name = registry.resolve_group(name)?;
        let spec = registry
            .group(&name)
            .cloned()
            .ok_or_else(|| BenchError::UnknownGroup { name: name.clone() })?;
        let cache = SplitCache::open(path, &name)?;
        let policy = if name == ADMET_GROUP {
            if spec.split.as_ref().is_some_and(|p| *p != SplitPolicy::admet()) {
                warn!(
                    "ignoring the registry split of {name}: it always uses the ADMET scaffold split"
                );
            }
            Some(SplitPolicy::admet())
        } else {
            spec.split.clone()
        };

        let mut handles: BTreeMap<String, Box<dyn DatasetLoader>> = BTreeMap::new();
        let mut all_datasets = Vec::new();
        for (task, dataset) in spec.members() {
            if handles.contains_key(dataset) {
                continue;
            }
            let category = registry.category(task).ok_or_else(|| {
                BenchError::Registry(format!("task '{task}' has no category"))
            })?;
            info!("--- {dataset} ---");
            cache.ensure_dataset_dir(dataset)?;
            let loader = loaders.instantiate(category, task, dataset, path)?;

            if cache.is_cached(dataset) {
                info!("Local split is found for {dataset}...");
            } else {
                let splits = loader.get_split(policy.as_ref())?;
                cache.store(dataset, &splits)?;
            }
            handles.insert(dataset.to_string(), loader);
            all_datasets.push(dataset.to_string());
        }

        Ok(Self {
            name,
            spec,
            cache,
            loaders: handles,
            all_datasets,
        })
    }

    /// Canonical group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<base>/<group>_benchmark`.
    pub fn root(&self) -> &Path {
        self.cache.root()
    }

    /// Member datasets in registration order.
    pub fn datasets(&self) -> &[String] {
        &self.all_datasets
    }

    pub fn tasks(&self) -> &[TaskDatasets] {
        &self.spec.tasks
    }

    pub fn loader(&self, dataset: &str) -> Option<&dyn DatasetLoader> {
        self.loaders.get(dataset).map(|l| l.as_ref())
    }

    pub fn metric(&self, dataset: &str) -> Option<&str> {
        self.spec.metrics.get(dataset).map(String::as_str)
    }

    /// A fresh pass over every member, reading splits from disk.
    pub fn iter(&self) -> GroupIter<'_> {
        GroupIter {
            group: self,
            index: 0,
        }
    }

    /// Splits of one member, read from disk.
    pub fn get(&self, benchmark: &str) -> Result<Benchmark> {
        let dataset = self.resolve_dataset(benchmark)?;
        self.read_benchmark(&dataset)
    }

    /// Additional train/valid splits under other seeds.
    pub fn get_more_train_val_splits(&self, _seed: u64) -> Result<Vec<Benchmark>> {
        Err(BenchError::Unsupported("get_more_train_val_splits"))
    }

    /// Score predictions for one member: `{metric: score}`.
    pub fn evaluate(&self, pred: &[f64], benchmark: &str) -> Result<BTreeMap<String, f64>> {
        let dataset = self.resolve_dataset(benchmark)?;
        let (metric, score) = self.score_dataset(&dataset, pred)?;
        Ok(BTreeMap::from([(metric, score)]))
    }

    /// Score predictions for several members: `{dataset: {metric: score}}`.
    pub fn evaluate_all(&self, preds: &BTreeMap<String, Vec<f64>>) -> Result<GroupScores> {
        let mut out = GroupScores::new();
        for (name, pred) in preds {
            let dataset = self.resolve_dataset(name)?;
            let (metric, score) = self.score_dataset(&dataset, pred)?;
            out.insert(dataset, BTreeMap::from([(metric, score)]));
        }
        Ok(out)
    }

    /// Score at least [`MIN_RUNS`] independent prediction runs and summarise
    /// each dataset's score as mean and standard deviation.
    pub fn evaluate_many(
        &self,
        runs: &[BTreeMap<String, Vec<f64>>],
    ) -> Result<BTreeMap<String, ScoreSummary>> {
        if runs.len() < MIN_RUNS {
            return Err(BenchError::TooFewRuns {
                required: MIN_RUNS,
                actual: runs.len(),
            });
        }
        let mut per_dataset: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for run in runs {
            for (dataset, metrics) in self.evaluate_all(run)? {
                per_dataset
                    .entry(dataset)
                    .or_default()
                    .extend(metrics.into_values());
            }
        }
        Ok(per_dataset
            .into_iter()
            .map(|(dataset, scores)| (dataset, summarize(&scores)))
            .collect())
    }

    fn resolve_dataset(&self, name: &str) -> Result<String> {
        fuzzy_resolve(name, self.all_datasets.iter().map(String::as_str)).ok_or_else(|| {
            BenchError::UnknownDataset {
                name: name.to_string(),
            }
        })
    }

    fn read_benchmark(&self, dataset: &str) -> Result<Benchmark> {
        let splits = self.cache.load(dataset)?;
        Ok(Benchmark {
            name: dataset.to_string(),
            train: splits.train,
            valid: splits.valid,
            test: splits.test,
        })
    }

    /// `(metric name, score)` of `pred` against the cached test labels.
    fn score_dataset(&self, dataset: &str, pred: &[f64]) -> Result<(String, f64)> {
        let truth = self.cache.load_test(dataset)?.labels()?;
        if truth.len() != pred.len() {
            return Err(BenchError::MisalignedPredictions {
                dataset: dataset.to_string(),
                expected: truth.len(),
                actual: pred.len(),
            });
        }
        let metric = self
            .metric(dataset)
            .ok_or_else(|| BenchError::MetricResolution {
                metric: "(unset)".into(),
                reason: format!("no metric is configured for '{dataset}'"),
            })?;
        let scorer = resolve_scorer(metric)?;
        Ok((metric.to_string(), scorer.score(&truth, pred)?))
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn summarize(scores: &[f64]) -> ScoreSummary {
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    ScoreSummary {
        mean: round3(mean),
        std: round3(var.sqrt()),
    }
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Cursor over a group's members.  Every pass re-reads the split files.
pub struct GroupIter<'a> {
    group: &'a BenchmarkGroup,
    index: usize,
}

impl Iterator for GroupIter<'_> {
    type Item = Result<Benchmark>;

    fn next(&mut self) -> Option<Self::Item> {
        let dataset = self.group.all_datasets.get(self.index)?;
        self.index += 1;
        info!("--- {dataset} ---");
        Some(self.group.read_benchmark(dataset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.group.all_datasets.len() - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for GroupIter<'_> {}

impl<'a> IntoIterator for &'a BenchmarkGroup {
    type Item = Result<Benchmark>;
    type IntoIter = GroupIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_population_std_and_rounds() {
        let s = summarize(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(s.mean, 0.3);
        assert_eq!(s.std, 0.141);
    }

    #[test]
    fn round3_keeps_three_decimals() {
        assert_eq!(round3(0.12345), 0.123);
        assert_eq!(round3(2.0), 2.0);
    }
}
