//! Benchmark dataset groups.
//!
//! A [`BenchmarkGroup`] resolves a group name against a [`Registry`],
//! materializes each member's train/valid/test split under
//! `<path>/<group>_benchmark/` once, hands the cached splits to a training
//! loop, and scores predictions against the cached test labels.

pub mod cache;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod group;
pub mod metrics;
pub mod registry;

pub use cache::SplitCache;
pub use config::Config;
pub use data::{CellValue, SplitBundle, SplitMethod, SplitPolicy, Table};
pub use dataset::{DatasetLoader, LoaderRegistry, LocalFileLoader};
pub use error::{BenchError, Result};
pub use group::{Benchmark, BenchmarkGroup, GroupIter, GroupScores, ScoreSummary};
pub use metrics::{Scorer, resolve_scorer};
pub use registry::{Registry, fuzzy_resolve};
