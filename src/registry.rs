//! Static knowledge about benchmark groups: members, metrics, task categories.
//!
//! A [`Registry`] is loaded once (from the embedded defaults or a JSON file)
//! and handed to [`crate::BenchmarkGroup::new`]; nothing here is global.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::SplitPolicy;
use crate::error::{BenchError, Result};

/// Canonical name of the ADMET benchmark group.
pub const ADMET_GROUP: &str = "admet_group";

/// Minimum Jaro-Winkler similarity for a fuzzy match to be accepted.
pub const FUZZY_THRESHOLD: f64 = 0.8;

const BUILTIN: &str = include_str!("../assets/registry.json");

// ---------------------------------------------------------------------------
// Registry contents
// ---------------------------------------------------------------------------

/// Datasets of one task inside a group, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDatasets {
    pub task: String,
    pub datasets: Vec<String>,
}

/// Declaration of one benchmark group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub tasks: Vec<TaskDatasets>,
    /// dataset → metric name.
    pub metrics: BTreeMap<String, String>,
    /// Split applied on first materialization; loader default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitPolicy>,
}

impl GroupSpec {
    /// `(task, dataset)` pairs in registration order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tasks.iter().flat_map(|t| {
            t.datasets
                .iter()
                .map(move |d| (t.task.as_str(), d.as_str()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    groups: BTreeMap<String, GroupSpec>,
    /// task → loader category.
    #[serde(default)]
    task_categories: BTreeMap<String, String>,
}

impl Registry {
    /// Registry shipped with the crate (ADMET and DTI domain-generalization groups).
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: Registry = serde_json::from_str(json)
            .map_err(|e| BenchError::Registry(format!("parsing registry: {e}")))?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        Self::from_json_str(&text)
    }

    /// Every member needs a metric and every task a category.
    fn validate(&self) -> Result<()> {
        for (name, spec) in &self.groups {
            for (task, dataset) in spec.members() {
                if !self.task_categories.contains_key(task) {
                    return Err(BenchError::Registry(format!(
                        "group '{name}': task '{task}' has no category"
                    )));
                }
                if !spec.metrics.contains_key(dataset) {
                    return Err(BenchError::Registry(format!(
                        "group '{name}': dataset '{dataset}' has no metric"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.get(name)
    }

    pub fn category(&self, task: &str) -> Option<&str> {
        self.task_categories.get(task).map(String::as_str)
    }

    pub fn metric(&self, group: &str, dataset: &str) -> Option<&str> {
        self.groups
            .get(group)
            .and_then(|g| g.metrics.get(dataset))
            .map(String::as_str)
    }

    /// Canonical group name for user input such as `"ADMET_Group"`.
    pub fn resolve_group(&self, input: &str) -> Result<String> {
        fuzzy_resolve(input, self.group_names()).ok_or_else(|| BenchError::UnknownGroup {
            name: input.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Fuzzy resolution
// ---------------------------------------------------------------------------

/// Map an approximate name onto one of `candidates`.
///
/// A case-insensitive exact match wins; otherwise the candidate with the
/// highest Jaro-Winkler similarity is returned if it reaches
/// [`FUZZY_THRESHOLD`].  Ties keep the earlier candidate.
pub fn fuzzy_resolve<'a>(
    input: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let needle = input.trim().to_lowercase();
    let mut best: Option<(f64, &str)> = None;
    for candidate in candidates {
        let lowered = candidate.to_lowercase();
        if lowered == needle {
            return Some(candidate.to_string());
        }
        let score = strsim::jaro_winkler(&needle, &lowered);
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, candidate));
        }
    }
    best.filter(|(score, _)| *score >= FUZZY_THRESHOLD)
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_loads() {
        let registry = Registry::builtin().unwrap();
        let admet = registry.group(ADMET_GROUP).unwrap();
        assert_eq!(admet.members().count(), 22);
        assert_eq!(admet.members().next(), Some(("ADME", "caco2_wang")));
        assert_eq!(registry.metric(ADMET_GROUP, "caco2_wang"), Some("mae"));
        assert_eq!(registry.category("Tox"), Some("single_pred"));
        assert_eq!(admet.split, Some(SplitPolicy::admet()));
    }

    #[test]
    fn group_names_resolve_loosely() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.resolve_group("ADMET_Group").unwrap(), ADMET_GROUP);
        assert_eq!(registry.resolve_group("admet").unwrap(), ADMET_GROUP);
        assert!(matches!(
            registry.resolve_group("protein folding"),
            Err(BenchError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn fuzzy_prefers_exact_then_closest() {
        let names = ["caco2_wang", "hia_hou", "herg"];
        assert_eq!(fuzzy_resolve("HERG", names).as_deref(), Some("herg"));
        assert_eq!(fuzzy_resolve("caco2", names).as_deref(), Some("caco2_wang"));
        assert_eq!(fuzzy_resolve("zzzz", names), None);
        assert_eq!(fuzzy_resolve("caco2", Vec::<&str>::new()), None);
    }

    #[test]
    fn missing_metric_is_rejected() {
        let json = r#"{
            "groups": {"g": {"tasks": [{"task": "ADME", "datasets": ["a"]}], "metrics": {}}},
            "task_categories": {"ADME": "single_pred"}
        }"#;
        assert!(matches!(
            Registry::from_json_str(json),
            Err(BenchError::Registry(_))
        ));
    }

    #[test]
    fn missing_category_is_rejected() {
        let json = r#"{
            "groups": {"g": {"tasks": [{"task": "HTS", "datasets": ["a"]}], "metrics": {"a": "mae"}}}
        }"#;
        assert!(matches!(
            Registry::from_json_str(json),
            Err(BenchError::Registry(_))
        ));
    }
}
