//! Projections of a [`Dataset`] shaped for the heatmap, violin, volcano,
//! survival, and scatter explorers. Nothing here recomputes or mutates data.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    groups::{Group, Subtype},
    stats::GeneStat,
};

/// One gene's values split by arm (violin explorer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedValues {
    /// Gene shown.
    pub gene_id: String,
    /// Treated samples, column order.
    pub treated: Vec<f64>,
    /// Control samples, column order.
    pub control: Vec<f64>,
}

/// Values of `gene_id` grouped by arm.
#[must_use]
pub fn violin(dataset: &Dataset, gene_id: &str) -> Option<GroupedValues> {
    let row = dataset.expression().row_by_id(gene_id)?;
    let mut grouped = GroupedValues {
        gene_id: gene_id.to_string(),
        treated: Vec::new(),
        control: Vec::new(),
    };
    for (value, sample) in row.iter().zip(dataset.samples()) {
        match sample.group {
            Group::Treated => grouped.treated.push(*value),
            Group::Control => grouped.control.push(*value),
        }
    }
    Some(grouped)
}

/// Volcano significance cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolcanoThresholds {
    /// Minimum absolute log2 fold change.
    pub log2_fold_change: f64,
    /// Maximum adjusted p-value.
    pub adjusted_p_value: f64,
}

impl Default for VolcanoThresholds {
    fn default() -> Self {
        Self {
            log2_fold_change: 1.0,
            adjusted_p_value: 0.05,
        }
    }
}

/// Volcano classification of a gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regulation {
    /// Significant and higher in Treated.
    Up,
    /// Significant and lower in Treated.
    Down,
    /// Fails either cutoff.
    NotSignificant,
}

/// One volcano point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolcanoPoint {
    /// Gene shown.
    pub gene_id: String,
    /// x axis.
    pub log2_fold_change: f64,
    /// y axis, `-log10(p_value)`.
    pub neg_log10_p: f64,
    /// Call under the thresholds.
    pub regulation: Regulation,
}

/// Classifies every gene against `thresholds`.
#[must_use]
pub fn volcano(gene_stats: &[GeneStat], thresholds: &VolcanoThresholds) -> Vec<VolcanoPoint> {
    gene_stats
        .iter()
        .map(|stat| {
            let significant = stat.adjusted_p_value < thresholds.adjusted_p_value;
            let regulation = if significant && stat.log2_fold_change > thresholds.log2_fold_change
            {
                Regulation::Up
            } else if significant && stat.log2_fold_change < -thresholds.log2_fold_change {
                Regulation::Down
            } else {
                Regulation::NotSignificant
            };
            VolcanoPoint {
                gene_id: stat.gene_id.clone(),
                log2_fold_change: stat.log2_fold_change,
                neg_log10_p: -stat.p_value.max(f64::MIN_POSITIVE).log10(),
                regulation,
            }
        })
        .collect()
}

/// Counts of each call.
#[must_use]
pub fn regulation_counts(points: &[VolcanoPoint]) -> IndexMap<Regulation, usize> {
    let mut counts = IndexMap::new();
    for regulation in [Regulation::Up, Regulation::Down, Regulation::NotSignificant] {
        counts.insert(regulation, 0);
    }
    for point in points {
        *counts.entry(point.regulation).or_insert(0) += 1;
    }
    counts
}

/// Survival summary of one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmSurvival {
    /// Samples in the arm.
    pub samples: usize,
    /// Observed events.
    pub events: usize,
    /// Censored samples.
    pub censored: usize,
    /// Mean observed time in days.
    pub mean_time: f64,
}

/// Survival joined with arms (survival explorer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSurvival {
    /// Treated arm.
    pub treated: ArmSurvival,
    /// Control arm.
    pub control: ArmSurvival,
}

impl GroupSurvival {
    /// Treated mean minus Control mean, in days.
    #[must_use]
    pub fn mean_gap(&self) -> f64 {
        self.treated.mean_time - self.control.mean_time
    }
}

/// Summarises survival per arm.
#[must_use]
pub fn survival_by_group(dataset: &Dataset) -> GroupSurvival {
    GroupSurvival {
        treated: arm_survival(dataset, Group::Treated),
        control: arm_survival(dataset, Group::Control),
    }
}

#[allow(clippy::cast_precision_loss)]
fn arm_survival(dataset: &Dataset, group: Group) -> ArmSurvival {
    let records: Vec<_> = dataset
        .samples()
        .iter()
        .zip(dataset.survival())
        .filter(|(sample, _)| sample.group == group)
        .map(|(_, record)| record)
        .collect();
    let censored = records.iter().filter(|r| r.is_censored()).count();
    let total: f64 = records.iter().map(|r| r.time).sum();
    ArmSurvival {
        samples: records.len(),
        events: records.len() - censored,
        censored,
        mean_time: if records.is_empty() {
            0.0
        } else {
            total / records.len() as f64
        },
    }
}

/// Pearson correlation; `None` for fewer than two points or a constant input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    (denom > 0.0).then(|| (cov / denom).clamp(-1.0, 1.0))
}

/// Two genes against each other (scatter explorer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterView {
    /// x gene.
    pub gene_x: String,
    /// y gene.
    pub gene_y: String,
    /// (x, y) per sample, column order.
    pub points: Vec<(f64, f64)>,
    /// Correlation over all samples.
    pub pearson_r: Option<f64>,
    /// Correlation within each subtype.
    pub by_subtype: IndexMap<Subtype, Option<f64>>,
}

/// Pairs two genes' rows; `None` if either gene is unknown.
#[must_use]
pub fn scatter(dataset: &Dataset, gene_x: &str, gene_y: &str) -> Option<ScatterView> {
    let expression = dataset.expression();
    let xs = expression.row_by_id(gene_x)?;
    let ys = expression.row_by_id(gene_y)?;
    let mut by_subtype = IndexMap::new();
    for subtype in Subtype::ALL {
        let (sx, sy): (Vec<f64>, Vec<f64>) = dataset
            .samples()
            .iter()
            .zip(xs.iter().zip(ys))
            .filter(|(sample, _)| sample.subtype == subtype)
            .map(|(_, (x, y))| (*x, *y))
            .unzip();
        by_subtype.insert(subtype, pearson(&sx, &sy));
    }
    Some(ScatterView {
        gene_x: gene_x.to_string(),
        gene_y: gene_y.to_string(),
        points: xs.iter().copied().zip(ys.iter().copied()).collect(),
        pearson_r: pearson(xs, ys),
        by_subtype,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::ParameterOverrides, runtime::DataLab};

    fn dataset(overrides: &ParameterOverrides) -> Dataset {
        DataLab::builder()
            .build()
            .generate("Textbook Case", overrides)
            .unwrap()
    }

    #[test]
    fn violin_splits_by_arm() {
        let dataset = dataset(&ParameterOverrides::default());
        let grouped = violin(&dataset, "Gene_0001").unwrap();
        assert_eq!(grouped.treated.len(), dataset.samples().len() / 2);
        assert_eq!(grouped.control.len(), dataset.samples().len() / 2);
        assert!(violin(&dataset, "Gene_missing").is_none());
    }

    #[test]
    fn volcano_filters_without_recomputing() {
        let dataset = dataset(&ParameterOverrides::default());
        let strict = volcano(
            dataset.gene_stats(),
            &VolcanoThresholds {
                log2_fold_change: 1.0,
                adjusted_p_value: 0.01,
            },
        );
        let loose = volcano(dataset.gene_stats(), &VolcanoThresholds::default());
        let hits = |points: &[VolcanoPoint]| {
            points
                .iter()
                .filter(|p| p.regulation != Regulation::NotSignificant)
                .count()
        };
        assert!(hits(&strict) <= hits(&loose));
        assert!(hits(&loose) > 0);
        let counts = regulation_counts(&loose);
        assert_eq!(counts.values().sum::<usize>(), dataset.gene_stats().len());
        for point in loose.iter().filter(|p| p.regulation == Regulation::Up) {
            assert!(point.log2_fold_change > 1.0);
        }
    }

    #[test]
    fn survival_summary_counts_every_sample() {
        let dataset = dataset(&ParameterOverrides::default());
        let summary = survival_by_group(&dataset);
        let total = summary.treated.samples + summary.control.samples;
        assert_eq!(total, dataset.samples().len());
        assert_eq!(
            summary.treated.events + summary.treated.censored,
            summary.treated.samples
        );
    }

    #[test]
    fn scatter_sees_block_correlation() {
        let dataset = dataset(&ParameterOverrides {
            samples: Some(200),
            affected_fraction: Some(0.0),
            ..ParameterOverrides::default()
        });
        let view = scatter(&dataset, "Gene_0001", "Gene_0002").unwrap();
        assert_eq!(view.points.len(), 200);
        assert!(view.pearson_r.unwrap() > 0.6);
        assert_eq!(view.by_subtype.len(), 3);
        assert!(scatter(&dataset, "Gene_0001", "nope").is_none());
    }

    #[test]
    fn pearson_edge_cases() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }
}
