use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::GenerationError,
    expression::ExpressionMatrix,
    groups::{Group, SampleRecord},
    params::ParameterSet,
    stats::GeneStat,
    survival::SurvivalRecord,
};

/// Namespace for dataset fingerprints.
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1c_2f0e_5b7d_4e39_9c58_d4a3_0b2e_71f6);

/// Fully materialized generator output.
///
/// There is no mutating API: a new roll means a new `Dataset`. All tables are
/// aligned with the expression axes (rows = genes, columns = samples).
/// Decoded documents are rebuilt through [`Dataset::new`], so they pass the
/// same checks as freshly generated ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    fingerprint: Uuid,
    params: ParameterSet,
    expression: ExpressionMatrix,
    samples: Vec<SampleRecord>,
    survival: Vec<SurvivalRecord>,
    gene_stats: Vec<GeneStat>,
    affected_genes: Vec<String>,
}

#[derive(Deserialize)]
struct RawDataset {
    fingerprint: Uuid,
    params: ParameterSet,
    expression: ExpressionMatrix,
    samples: Vec<SampleRecord>,
    survival: Vec<SurvivalRecord>,
    gene_stats: Vec<GeneStat>,
    affected_genes: Vec<String>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = GenerationError;

    fn try_from(raw: RawDataset) -> Result<Self, Self::Error> {
        let dataset = Self::new(
            raw.params,
            raw.expression,
            raw.samples,
            raw.survival,
            raw.gene_stats,
            raw.affected_genes,
        )?;
        if dataset.fingerprint != raw.fingerprint {
            return Err(GenerationError::Integrity(format!(
                "fingerprint {} does not match parameters ({})",
                raw.fingerprint, dataset.fingerprint
            )));
        }
        Ok(dataset)
    }
}

impl Dataset {
    /// Assembles a dataset and checks referential integrity.
    pub fn new(
        params: ParameterSet,
        expression: ExpressionMatrix,
        samples: Vec<SampleRecord>,
        survival: Vec<SurvivalRecord>,
        gene_stats: Vec<GeneStat>,
        affected_genes: Vec<String>,
    ) -> Result<Self, GenerationError> {
        let dataset = Self {
            fingerprint: fingerprint(&params),
            params,
            expression,
            samples,
            survival,
            gene_stats,
            affected_genes,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Deterministic identifier derived from the resolved parameters.
    #[must_use]
    pub const fn fingerprint(&self) -> Uuid {
        self.fingerprint
    }

    /// Parameters that produced the dataset.
    #[must_use]
    pub const fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Gene × sample expression.
    #[must_use]
    pub const fn expression(&self) -> &ExpressionMatrix {
        &self.expression
    }

    /// Sample metadata in column order.
    #[must_use]
    pub fn samples(&self) -> &[SampleRecord] {
        &self.samples
    }

    /// Survival outcomes in column order.
    #[must_use]
    pub fn survival(&self) -> &[SurvivalRecord] {
        &self.survival
    }

    /// Differential-expression results in row order.
    #[must_use]
    pub fn gene_stats(&self) -> &[GeneStat] {
        &self.gene_stats
    }

    /// Genes that carry the injected treatment effect.
    #[must_use]
    pub fn affected_genes(&self) -> &[String] {
        &self.affected_genes
    }

    /// Number of samples in `group`.
    #[must_use]
    pub fn group_count(&self, group: Group) -> usize {
        self.samples.iter().filter(|s| s.group == group).count()
    }

    /// Checks that every table references exactly the expression axes.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let expression = &self.expression;
        expression.check_shape()?;
        unique("gene", expression.gene_ids())?;
        unique("sample", expression.sample_ids())?;

        let sample_axis = expression.sample_ids().iter();
        if !sample_axis
            .clone()
            .eq(self.samples.iter().map(|s| &s.sample_id))
        {
            return Err(GenerationError::Integrity(
                "samples table does not match expression columns".into(),
            ));
        }
        if !sample_axis.eq(self.survival.iter().map(|s| &s.sample_id)) {
            return Err(GenerationError::Integrity(
                "survival table does not match expression columns".into(),
            ));
        }
        if !expression
            .gene_ids()
            .iter()
            .eq(self.gene_stats.iter().map(|s| &s.gene_id))
        {
            return Err(GenerationError::Integrity(
                "gene statistics do not match expression rows".into(),
            ));
        }
        if let Some(missing) = self
            .affected_genes
            .iter()
            .find(|id| expression.gene_index(id).is_none())
        {
            return Err(GenerationError::Integrity(format!(
                "affected gene {missing} is not an expression row"
            )));
        }

        let treated = self.group_count(Group::Treated);
        let control = self.group_count(Group::Control);
        if treated != control {
            return Err(GenerationError::Integrity(format!(
                "unbalanced groups: {treated} treated vs {control} control"
            )));
        }
        if let Some(bad) = self.survival.iter().find(|s| s.time.is_nan() || s.time < 0.0) {
            return Err(GenerationError::Integrity(format!(
                "negative survival time for {}",
                bad.sample_id
            )));
        }
        Ok(())
    }
}

fn unique(axis: &str, ids: &[String]) -> Result<(), GenerationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(id.as_str())) {
        Some(dup) => Err(GenerationError::Integrity(format!(
            "duplicate {axis} id {dup}"
        ))),
        None => Ok(()),
    }
}

fn fingerprint(params: &ParameterSet) -> Uuid {
    // Serializing a plain struct of numbers and strings cannot fail.
    let encoded = serde_json::to_vec(params).unwrap_or_default();
    Uuid::new_v5(&FINGERPRINT_NAMESPACE, &encoded)
}
