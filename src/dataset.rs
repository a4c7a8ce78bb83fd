//! Dataset loaders and the category → constructor dispatch table.
//!
//! A group never builds loaders by name at runtime; it asks a
//! [`LoaderRegistry`] for the constructor registered under the task's
//! category.  Tests and embedders register their own constructors the same way.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;

use crate::data::loader::{SUPPORTED_EXTENSIONS, read_table};
use crate::data::split::split_table;
use crate::data::{SplitBundle, SplitPolicy, Table};
use crate::error::{BenchError, Result};

/// Produces the full labeled table of one dataset and partitions it.
pub trait DatasetLoader {
    /// Canonical dataset name.
    fn name(&self) -> &str;

    /// The complete dataset, including the `Y` label column.
    fn load(&self) -> Result<Table>;

    /// Policy used when the caller does not impose one.
    fn default_split(&self) -> SplitPolicy {
        SplitPolicy::default()
    }

    /// Partition the dataset with `policy`, or with [`Self::default_split`].
    fn get_split(&self, policy: Option<&SplitPolicy>) -> Result<SplitBundle> {
        let table = self.load()?;
        match policy {
            Some(policy) => split_table(&table, policy),
            None => split_table(&table, &self.default_split()),
        }
    }
}

/// Builds a loader for `(task, dataset name, base path)`.
pub type LoaderCtor =
    Box<dyn Fn(&str, &str, &Path) -> Result<Box<dyn DatasetLoader>> + Send + Sync>;

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// Category tag → loader constructor.
#[derive(Default)]
pub struct LoaderRegistry {
    ctors: BTreeMap<String, LoaderCtor>,
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ctors.keys()).finish()
    }
}

impl LoaderRegistry {
    /// No categories registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Local-file loaders for the single- and multi-instance prediction categories.
    pub fn builtin() -> Self {
        Self::empty()
            .with("single_pred", LocalFileLoader::boxed)
            .with("multi_pred", LocalFileLoader::boxed)
    }

    /// Register (or replace) the constructor for `category`.
    pub fn register<F>(&mut self, category: impl Into<String>, ctor: F)
    where
        F: Fn(&str, &str, &Path) -> Result<Box<dyn DatasetLoader>> + Send + Sync + 'static,
    {
        self.ctors.insert(category.into(), Box::new(ctor));
    }

    pub fn with<F>(mut self, category: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&str, &str, &Path) -> Result<Box<dyn DatasetLoader>> + Send + Sync + 'static,
    {
        self.register(category, ctor);
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }

    /// Instantiate the loader for one member dataset.
    pub fn instantiate(
        &self,
        category: &str,
        task: &str,
        dataset: &str,
        path: &Path,
    ) -> Result<Box<dyn DatasetLoader>> {
        let ctor = self
            .ctors
            .get(category)
            .ok_or_else(|| BenchError::UnsupportedCategory {
                category: category.to_string(),
                dataset: dataset.to_string(),
            })?;
        ctor(task, dataset, path)
    }
}

// ---------------------------------------------------------------------------
// Local file loader
// ---------------------------------------------------------------------------

/// Reads `<path>/<dataset>.{csv,tab,tsv,parquet,json}`.
///
/// The source file is located on first use, so a group whose splits are
/// already cached can be opened without the raw dataset present.
#[derive(Debug, Clone)]
pub struct LocalFileLoader {
    name: String,
    task: String,
    root: PathBuf,
}

impl LocalFileLoader {
    pub fn new(task: &str, name: &str, path: &Path) -> Self {
        Self {
            name: name.to_string(),
            task: task.to_string(),
            root: path.to_path_buf(),
        }
    }

    /// Constructor with the [`LoaderCtor`] shape.
    pub fn boxed(task: &str, name: &str, path: &Path) -> Result<Box<dyn DatasetLoader>> {
        Ok(Box::new(Self::new(task, name, path)))
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// First existing source file, in [`SUPPORTED_EXTENSIONS`] order.
    pub fn source_path(&self) -> Result<PathBuf> {
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{ext}", self.name)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                BenchError::loader(
                    &self.name,
                    format!(
                        "no source file {}.{{{}}} under {}",
                        self.name,
                        SUPPORTED_EXTENSIONS.join(","),
                        self.root.display()
                    ),
                )
            })
    }
}

impl DatasetLoader for LocalFileLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Table> {
        let source = self.source_path()?;
        debug!("loading {} ({}) from {}", self.name, self.task, source.display());
        read_table(&source)
    }
}
