use rand::{seq::index, Rng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{
    error::GenerationError,
    groups::{Group, SampleRecord},
    params::ParameterSet,
};

/// Median baseline intensity before the log2 transform.
const BASELINE_MEDIAN: f64 = 50.0;
/// Log-scale spread of baseline intensities across genes.
const BASELINE_LOG_SD: f64 = 0.5;
/// Range of the per-gene multiplicative jitter on the effect size.
const EFFECT_JITTER: std::ops::Range<f64> = 0.85..1.15;

/// Gene × sample matrix of log2 expression, stored row-major.
///
/// Decoding goes through [`ExpressionMatrix::check_shape`], so a matrix that
/// exists always has exactly `genes × samples` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExpressionMatrix")]
pub struct ExpressionMatrix {
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    block_of: Vec<usize>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawExpressionMatrix {
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    block_of: Vec<usize>,
    values: Vec<f64>,
}

impl TryFrom<RawExpressionMatrix> for ExpressionMatrix {
    type Error = GenerationError;

    fn try_from(raw: RawExpressionMatrix) -> Result<Self, Self::Error> {
        let matrix = Self {
            gene_ids: raw.gene_ids,
            sample_ids: raw.sample_ids,
            block_of: raw.block_of,
            values: raw.values,
        };
        matrix.check_shape()?;
        Ok(matrix)
    }
}

impl ExpressionMatrix {
    /// Checks that values fill the `genes × samples` grid and every gene has
    /// a block.
    pub fn check_shape(&self) -> Result<(), GenerationError> {
        let expected = self.n_genes().checked_mul(self.n_samples());
        if expected != Some(self.values.len()) {
            return Err(GenerationError::Integrity(format!(
                "expression values do not fill the matrix: {} values for {} genes x {} samples",
                self.values.len(),
                self.n_genes(),
                self.n_samples()
            )));
        }
        if self.block_of.len() != self.n_genes() {
            return Err(GenerationError::Integrity(format!(
                "{} block labels for {} genes",
                self.block_of.len(),
                self.n_genes()
            )));
        }
        Ok(())
    }

    /// Gene identifiers, one per row.
    #[must_use]
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Sample identifiers, one per column.
    #[must_use]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Co-expression block of every gene.
    #[must_use]
    pub fn block_of(&self) -> &[usize] {
        &self.block_of
    }

    /// Number of rows.
    #[must_use]
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Flat row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at (`gene`, `sample`).
    #[must_use]
    pub fn get(&self, gene: usize, sample: usize) -> f64 {
        self.values[gene * self.n_samples() + sample]
    }

    /// Expression of one gene across all samples.
    #[must_use]
    pub fn row(&self, gene: usize) -> &[f64] {
        let width = self.n_samples();
        &self.values[gene * width..(gene + 1) * width]
    }

    /// Row index of `gene_id`.
    #[must_use]
    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|id| id == gene_id)
    }

    /// Row of `gene_id`.
    #[must_use]
    pub fn row_by_id(&self, gene_id: &str) -> Option<&[f64]> {
        self.gene_index(gene_id).map(|idx| self.row(idx))
    }

    /// Rows standardized to zero mean and unit sample variance. Constant rows
    /// become all zeros.
    #[must_use]
    pub fn row_zscores(&self) -> Vec<Vec<f64>> {
        (0..self.n_genes())
            .map(|gene| {
                let row = self.row(gene);
                let (mean, sd) = mean_sd(row);
                row.iter()
                    .map(|value| if sd > 0.0 { (value - mean) / sd } else { 0.0 })
                    .collect()
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// A gene carrying the treatment effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedGene {
    /// Row index.
    pub gene: usize,
    /// Signed log2 shift added to Treated samples.
    pub shift: f64,
}

/// Output of [`synthesize`].
#[derive(Debug, Clone)]
pub struct ExpressionDraw {
    /// The matrix.
    pub matrix: ExpressionMatrix,
    /// Affected genes sorted by row index.
    pub affected: Vec<AffectedGene>,
}

impl ExpressionDraw {
    /// Identifiers of the affected genes.
    #[must_use]
    pub fn affected_ids(&self) -> Vec<String> {
        self.affected
            .iter()
            .map(|gene| self.matrix.gene_ids[gene.gene].clone())
            .collect()
    }
}

/// Identifier for the zero-based gene `index`.
#[must_use]
pub fn gene_id(index: usize, total: usize) -> String {
    let width = total.to_string().len().max(4);
    format!("Gene_{:0width$}", index + 1)
}

/// Builds the expression matrix for `samples`.
///
/// Draw order is fixed (baselines, block factors, gene noise, affected set,
/// per-gene sign and jitter) so a seed maps to exactly one matrix.
pub fn synthesize<R: Rng + ?Sized>(
    params: &ParameterSet,
    samples: &[SampleRecord],
    rng: &mut R,
) -> ExpressionDraw {
    let genes = params.genes;
    let width = samples.len();
    let block_of: Vec<usize> = (0..genes).map(|gene| gene / params.block_size).collect();

    let baseline: Vec<f64> = (0..genes)
        .map(|_| {
            let z: f64 = rng.sample(StandardNormal);
            (BASELINE_MEDIAN.ln() + BASELINE_LOG_SD * z) / std::f64::consts::LN_2
        })
        .collect();

    let factors: Vec<f64> = (0..params.block_count() * width)
        .map(|_| rng.sample(StandardNormal))
        .collect();

    let shared = params.correlation.sqrt();
    let private = (1.0 - params.correlation).sqrt();
    let mut values = Vec::with_capacity(genes * width);
    for gene in 0..genes {
        let block = block_of[gene];
        for sample in 0..width {
            let noise: f64 = rng.sample(StandardNormal);
            let latent = shared * factors[block * width + sample] + private * noise;
            values.push(baseline[gene] + params.noise_sd * latent);
        }
    }

    let mut affected: Vec<AffectedGene> = index::sample(rng, genes, params.affected_count())
        .into_iter()
        .map(|gene| {
            let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
            let jitter = rng.gen_range(EFFECT_JITTER);
            AffectedGene {
                gene,
                shift: sign * params.effect_size * jitter,
            }
        })
        .collect();
    affected.sort_by_key(|gene| gene.gene);

    for gene in &affected {
        for (sample, record) in samples.iter().enumerate() {
            if record.group == Group::Treated {
                values[gene.gene * width + sample] += gene.shift;
            }
        }
    }

    ExpressionDraw {
        matrix: ExpressionMatrix {
            gene_ids: (0..genes).map(|gene| gene_id(gene, genes)).collect(),
            sample_ids: samples.iter().map(|s| s.sample_id.clone()).collect(),
            block_of,
            values,
        },
        affected,
    }
}
