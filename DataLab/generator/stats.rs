use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::{
    expression::ExpressionMatrix,
    groups::{indices_of, Group, SampleRecord},
};

/// Differential-expression result for one gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneStat {
    /// Gene this row describes.
    pub gene_id: String,
    /// Treated mean minus Control mean on the log2 scale.
    pub log2_fold_change: f64,
    /// Two-sided Welch t-test p-value.
    pub p_value: f64,
    /// Benjamini–Hochberg adjusted p-value across all genes.
    pub adjusted_p_value: f64,
}

/// Welch two-sample t-test outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    /// Difference of means (`a − b`).
    pub mean_difference: f64,
    /// t statistic.
    pub t: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

#[allow(clippy::cast_precision_loss)]
fn mean_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Welch's unequal-variance t-test of `a` against `b`. Both slices need at
/// least two values.
///
/// A zero standard error yields `p = 1` when the means agree and `p = 0`
/// otherwise.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn welch_t_test(a: &[f64], b: &[f64]) -> WelchTest {
    let (mean_a, var_a) = mean_var(a);
    let (mean_b, var_b) = mean_var(b);
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (sa, sb) = (var_a / na, var_b / nb);
    let se = (sa + sb).sqrt();
    let diff = mean_a - mean_b;
    if se <= 0.0 {
        let tied = diff.abs() <= 0.0;
        return WelchTest {
            mean_difference: diff,
            t: if tied { 0.0 } else { diff.signum() * f64::INFINITY },
            df: na + nb - 2.0,
            p_value: if tied { 1.0 } else { 0.0 },
        };
    }
    let t = diff / se;
    let df = (sa + sb).powi(2) / (sa.powi(2) / (na - 1.0) + sb.powi(2) / (nb - 1.0));
    let p_value = StudentsT::new(0.0, 1.0, df)
        .map_or(1.0, |dist| 2.0 * (1.0 - dist.cdf(t.abs())))
        .clamp(0.0, 1.0);
    WelchTest {
        mean_difference: diff,
        t,
        df,
        p_value,
    }
}

/// Benjamini–Hochberg step-up adjustment. Output is aligned with the input,
/// monotone in the p-value order, and capped at 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]).then(a.cmp(&b)));
    let mut adjusted = vec![0.0; m];
    let mut running = 1.0_f64;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let candidate = p_values[idx] * m as f64 / (rank + 1) as f64;
        running = running.min(candidate);
        adjusted[idx] = running;
    }
    adjusted
}

/// Per-gene fold change, Welch p-value, and BH-adjusted p-value.
///
/// Pure: no randomness, so repeated calls on one dataset agree exactly.
#[must_use]
pub fn compute_stats(matrix: &ExpressionMatrix, samples: &[SampleRecord]) -> Vec<GeneStat> {
    let treated = indices_of(samples, Group::Treated);
    let control = indices_of(samples, Group::Control);
    let tests: Vec<WelchTest> = (0..matrix.n_genes())
        .map(|gene| {
            let row = matrix.row(gene);
            let a: Vec<f64> = treated.iter().map(|&col| row[col]).collect();
            let b: Vec<f64> = control.iter().map(|&col| row[col]).collect();
            welch_t_test(&a, &b)
        })
        .collect();
    let raw: Vec<f64> = tests.iter().map(|test| test.p_value).collect();
    let adjusted = benjamini_hochberg(&raw);
    matrix
        .gene_ids()
        .iter()
        .zip(tests)
        .zip(adjusted)
        .map(|((gene_id, test), adjusted_p_value)| GeneStat {
            gene_id: gene_id.clone(),
            log2_fold_change: test.mean_difference,
            p_value: test.p_value,
            adjusted_p_value,
        })
        .collect()
}
