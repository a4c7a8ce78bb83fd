//! Scorers keyed by metric name.
//!
//! Metric names found in the registry are looked up in a static table; an
//! unknown name is a [`BenchError::MetricResolution`], never a guess.

use crate::error::{BenchError, Result};

/// Predictions at or above this value count as the positive class.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Computes a quality score from ground truth and predictions.
pub trait Scorer {
    /// Canonical metric name, as reported in score results.
    fn name(&self) -> &'static str;

    /// Score aligned label and prediction slices.
    fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64>;
}

type ScoreFn = fn(&[f64], &[f64]) -> std::result::Result<f64, String>;

/// A scorer backed by a plain function from the static table.
#[derive(Clone, Copy)]
pub struct FnScorer {
    name: &'static str,
    score: ScoreFn,
}

impl Scorer for FnScorer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        let fail = |reason: String| BenchError::Scoring {
            metric: self.name.to_string(),
            reason,
        };
        if y_true.len() != y_pred.len() {
            return Err(fail(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(fail("no samples".into()));
        }
        if let Some(i) = y_true.iter().position(|v| !v.is_finite()) {
            return Err(fail(format!("label {i} is {}", y_true[i])));
        }
        if let Some(i) = y_pred.iter().position(|v| !v.is_finite()) {
            return Err(fail(format!("prediction {i} is {}", y_pred[i])));
        }
        (self.score)(y_true, y_pred).map_err(fail)
    }
}

/// `(accepted name, canonical name, function)`.
const SCORERS: &[(&str, &str, ScoreFn)] = &[
    ("mae", "mae", mae),
    ("mse", "mse", mse),
    ("rmse", "rmse", rmse),
    ("r2", "r2", r2),
    ("pearson", "pearson", pearson),
    ("pcc", "pearson", pearson),
    ("spearman", "spearman", spearman),
    ("roc-auc", "roc-auc", roc_auc),
    ("auroc", "roc-auc", roc_auc),
    ("pr-auc", "pr-auc", pr_auc),
    ("auprc", "pr-auc", pr_auc),
    ("accuracy", "accuracy", accuracy),
    ("precision", "precision", precision),
    ("recall", "recall", recall),
    ("f1", "f1", f1),
];

/// Look up a scorer by (case-insensitive) metric name.
pub fn resolve_scorer(name: &str) -> Result<Box<dyn Scorer>> {
    let wanted = name.trim().to_lowercase();
    SCORERS
        .iter()
        .find(|(alias, _, _)| *alias == wanted)
        .map(|&(_, canonical, score)| {
            Box::new(FnScorer {
                name: canonical,
                score,
            }) as Box<dyn Scorer>
        })
        .ok_or_else(|| BenchError::MetricResolution {
            metric: name.to_string(),
            reason: format!(
                "no scorer is registered under this name (known: {})",
                metric_names().collect::<Vec<_>>().join(", ")
            ),
        })
}

/// Names accepted by [`resolve_scorer`].
pub fn metric_names() -> impl Iterator<Item = &'static str> {
    SCORERS.iter().map(|(alias, _, _)| *alias)
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn mae(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    Ok(mean(&y.iter().zip(p).map(|(a, b)| (a - b).abs()).collect::<Vec<_>>()))
}

fn mse(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    Ok(mean(&y.iter().zip(p).map(|(a, b)| (a - b).powi(2)).collect::<Vec<_>>()))
}

fn rmse(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    mse(y, p).map(f64::sqrt)
}

fn r2(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let m = mean(y);
    let ss_tot: f64 = y.iter().map(|a| (a - m).powi(2)).sum();
    if ss_tot == 0.0 {
        return Err("labels are constant".into());
    }
    let ss_res: f64 = y.iter().zip(p).map(|(a, b)| (a - b).powi(2)).sum();
    Ok(1.0 - ss_res / ss_tot)
}

fn pearson(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let (my, mp) = (mean(y), mean(p));
    let cov: f64 = y.iter().zip(p).map(|(a, b)| (a - my) * (b - mp)).sum();
    let vy: f64 = y.iter().map(|a| (a - my).powi(2)).sum();
    let vp: f64 = p.iter().map(|b| (b - mp).powi(2)).sum();
    if vy == 0.0 || vp == 0.0 {
        return Err("correlation is undefined for constant input".into());
    }
    Ok(cov / (vy.sqrt() * vp.sqrt()))
}

/// 1-based ranks, ties receive the average of the ranks they span.
fn average_ranks(xs: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..xs.len()).collect();
    order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));
    let mut ranks = vec![0.0; xs.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && xs[order[end]] == xs[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

fn spearman(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    pearson(&average_ranks(y), &average_ranks(p))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn binary_labels(y: &[f64]) -> std::result::Result<Vec<bool>, String> {
    y.iter()
        .map(|&v| match v {
            v if v == 1.0 => Ok(true),
            v if v == 0.0 => Ok(false),
            other => Err(format!("label {other} is not binary")),
        })
        .collect()
}

fn roc_auc(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let labels = binary_labels(y)?;
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err("only one class present in labels".into());
    }
    let ranks = average_ranks(p);
    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(&labels)
        .filter(|&(_, &l)| l)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// Average precision: precision at each distinct threshold weighted by the
/// recall gained there.
fn pr_auc(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let labels = binary_labels(y)?;
    let n_pos = labels.iter().filter(|&&l| l).count();
    if n_pos == 0 {
        return Err("no positive labels".into());
    }
    let mut order: Vec<usize> = (0..p.len()).collect();
    order.sort_by(|&a, &b| p[b].total_cmp(&p[a]));

    let (mut tp, mut seen, mut prev_recall, mut ap) = (0usize, 0usize, 0.0, 0.0);
    let mut i = 0;
    while i < order.len() {
        let threshold = p[order[i]];
        while i < order.len() && p[order[i]].total_cmp(&threshold).is_eq() {
            tp += labels[order[i]] as usize;
            seen += 1;
            i += 1;
        }
        let recall = tp as f64 / n_pos as f64;
        let precision = tp as f64 / seen as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Ok(ap)
}

/// (tp, fp, tn, fn) at [`DECISION_THRESHOLD`].
fn confusion(y: &[f64], p: &[f64]) -> std::result::Result<[usize; 4], String> {
    let labels = binary_labels(y)?;
    let mut counts = [0usize; 4];
    for (&truth, &score) in labels.iter().zip(p) {
        let predicted = score >= DECISION_THRESHOLD;
        let slot = match (predicted, truth) {
            (true, true) => 0,
            (true, false) => 1,
            (false, false) => 2,
            (false, true) => 3,
        };
        counts[slot] += 1;
    }
    Ok(counts)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn accuracy(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let [tp, fp, tn, fn_] = confusion(y, p)?;
    Ok(ratio(tp + tn, tp + fp + tn + fn_))
}

fn precision(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let [tp, fp, _, _] = confusion(y, p)?;
    Ok(ratio(tp, tp + fp))
}

fn recall(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let [tp, _, _, fn_] = confusion(y, p)?;
    Ok(ratio(tp, tp + fn_))
}

fn f1(y: &[f64], p: &[f64]) -> std::result::Result<f64, String> {
    let [tp, fp, _, fn_] = confusion(y, p)?;
    Ok(ratio(2 * tp, 2 * tp + fp + fn_))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn score(metric: &str, y: &[f64], p: &[f64]) -> f64 {
        resolve_scorer(metric).unwrap().score(y, p).unwrap()
    }

    #[test]
    fn mae_counts_single_mismatch() {
        let y = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let p = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        assert_abs_diff_eq!(score("mae", &y, &p), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn regression_metrics() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let p = [1.5, 2.0, 2.5, 4.0];
        assert_abs_diff_eq!(score("mse", &y, &p), 0.125, epsilon = 1e-12);
        assert_abs_diff_eq!(score("rmse", &y, &p), 0.125f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(score("r2", &y, &p), 1.0 - 0.5 / 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(score("pearson", &y, &y), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn spearman_uses_ranks() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let p = [10.0, 20.0, 30.0, 1000.0];
        assert_abs_diff_eq!(score("spearman", &y, &p), 1.0, epsilon = 1e-12);
        let reversed = [4.0, 3.0, 2.0, 1.0];
        assert_abs_diff_eq!(score("spearman", &y, &reversed), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn average_ranks_share_ties() {
        assert_eq!(average_ranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn roc_auc_matches_pair_counting() {
        let y = [0.0, 0.0, 1.0, 1.0];
        let p = [0.1, 0.4, 0.35, 0.8];
        assert_abs_diff_eq!(score("roc-auc", &y, &p), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(score("AUROC", &y, &[0.5; 4]), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn pr_auc_is_average_precision() {
        let y = [0.0, 0.0, 1.0, 1.0];
        let p = [0.1, 0.4, 0.35, 0.8];
        // thresholds 0.8 → (P=1, R=.5), 0.4 → (.5, .5), 0.35 → (2/3, 1)
        assert_abs_diff_eq!(score("pr-auc", &y, &p), 0.5 + 0.5 * 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn thresholded_metrics() {
        let y = [1.0, 1.0, 0.0, 0.0];
        let p = [0.9, 0.2, 0.7, 0.1];
        assert_abs_diff_eq!(score("accuracy", &y, &p), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(score("precision", &y, &p), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(score("recall", &y, &p), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(score("f1", &y, &p), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let y = [0.0, 1.0, 1.0];
        for metric in ["pr-auc", "roc-auc", "mae", "f1"] {
            let scorer = resolve_scorer(metric).unwrap();
            for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                assert!(matches!(
                    scorer.score(&y, &[0.2, bad, 0.9]),
                    Err(BenchError::Scoring { .. })
                ));
            }
            assert!(scorer.score(&[0.0, f64::NAN, 1.0], &[0.2, 0.5, 0.9]).is_err());
        }
    }

    #[test]
    fn aliases_report_canonical_name() {
        assert_eq!(resolve_scorer("PCC").unwrap().name(), "pearson");
        assert_eq!(resolve_scorer("roc-auc").unwrap().name(), "roc-auc");
    }

    #[test]
    fn unknown_metric_is_rejected() {
        assert!(matches!(
            resolve_scorer("bleu"),
            Err(BenchError::MetricResolution { .. })
        ));
    }

    #[test]
    fn degenerate_inputs_fail_to_score() {
        let scorer = resolve_scorer("roc-auc").unwrap();
        assert!(matches!(
            scorer.score(&[1.0, 1.0], &[0.2, 0.9]),
            Err(BenchError::Scoring { .. })
        ));
        assert!(scorer.score(&[], &[]).is_err());
        assert!(scorer.score(&[0.0, 1.0], &[0.3]).is_err());
        assert!(resolve_scorer("roc-auc").unwrap().score(&[0.0, 2.0], &[0.1, 0.2]).is_err());
    }
}
