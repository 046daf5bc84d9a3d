use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Name of the free-form scenario seeded from the Textbook values.
pub const CUSTOM_SCENARIO: &str = "custom";
/// Clear effects on expression and survival.
pub const TEXTBOOK_CASE: &str = "Textbook Case";
/// Small effects, fewer hits, modest survival benefit.
pub const SUBTLE_EFFECTS: &str = "Subtle Effects";
/// Strong expression effect with no survival benefit.
pub const FAILED_DRUG_TRIAL: &str = "Failed Drug Trial";

/// Fully specified generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Scenario label (`custom` when not a preset).
    pub scenario: String,
    /// Number of genes (rows).
    pub genes: usize,
    /// Number of samples (columns), split evenly between groups.
    pub samples: usize,
    /// Mean log2 shift applied to affected genes in Treated samples.
    pub effect_size: f64,
    /// Fraction of genes carrying the treatment effect.
    pub affected_fraction: f64,
    /// Weight of the shared block factor against independent gene noise.
    pub correlation: f64,
    /// Standard deviation of the per-gene noise.
    pub noise_sd: f64,
    /// Treated event rate divided by Control event rate.
    pub hazard_ratio: f64,
    /// Fraction of samples lost to follow-up.
    pub censoring_fraction: f64,
    /// Seed for the random stream.
    pub seed: u64,
    /// Genes per co-expression block.
    pub block_size: usize,
    /// Mean Control survival time in days.
    pub baseline_survival_days: f64,
    /// Administrative end of follow-up in days.
    pub study_cutoff_days: Option<f64>,
    /// Log-hazard per unit of expression-derived risk.
    pub risk_coupling: f64,
}

impl ParameterSet {
    /// Checks every range invariant. No value is ever clamped.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.scenario.trim().is_empty() {
            return Err(GenerationError::validation("scenario", "must not be empty"));
        }
        if self.genes < 2 {
            return Err(GenerationError::validation(
                "genes",
                format!("need at least 2 genes, got {}", self.genes),
            ));
        }
        if self.samples < 4 || self.samples % 2 != 0 {
            return Err(GenerationError::validation(
                "samples",
                format!("must be even and at least 4, got {}", self.samples),
            ));
        }
        if !self.effect_size.is_finite() {
            return Err(GenerationError::validation("effect_size", "must be finite"));
        }
        unit_interval("affected_fraction", self.affected_fraction)?;
        unit_interval("correlation", self.correlation)?;
        positive("noise_sd", self.noise_sd)?;
        positive("hazard_ratio", self.hazard_ratio)?;
        if !(0.0..1.0).contains(&self.censoring_fraction) {
            return Err(GenerationError::validation(
                "censoring_fraction",
                format!("must lie in [0, 1), got {}", self.censoring_fraction),
            ));
        }
        if self.block_size == 0 {
            return Err(GenerationError::validation("block_size", "must be at least 1"));
        }
        positive("baseline_survival_days", self.baseline_survival_days)?;
        if let Some(cutoff) = self.study_cutoff_days {
            positive("study_cutoff_days", cutoff)?;
        }
        if !self.risk_coupling.is_finite() {
            return Err(GenerationError::validation("risk_coupling", "must be finite"));
        }
        Ok(())
    }

    /// Number of genes that receive the treatment effect.
    #[must_use]
    pub fn affected_count(&self) -> usize {
        scaled_count(self.affected_fraction, self.genes)
    }

    /// Number of samples lost to follow-up.
    #[must_use]
    pub fn censored_count(&self) -> usize {
        scaled_count(self.censoring_fraction, self.samples)
    }

    /// Number of co-expression blocks.
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.genes.div_ceil(self.block_size)
    }

    /// Samples per group.
    #[must_use]
    pub const fn group_size(&self) -> usize {
        self.samples / 2
    }

    fn preset(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            genes: 200,
            samples: 40,
            effect_size: 2.5,
            affected_fraction: 0.10,
            correlation: 0.8,
            noise_sd: 1.0,
            hazard_ratio: 0.4,
            censoring_fraction: 0.10,
            seed: 42,
            block_size: 10,
            baseline_survival_days: 365.0,
            study_cutoff_days: Some(365.0 * 4.0),
            risk_coupling: 0.3,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn scaled_count(fraction: f64, total: usize) -> usize {
    ((fraction * total as f64).round() as usize).min(total)
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), GenerationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GenerationError::validation(
            field,
            format!("must lie in [0, 1], got {value}"),
        ))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), GenerationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GenerationError::validation(
            field,
            format!("must be positive and finite, got {value}"),
        ))
    }
}

/// Partial parameter set; every present field replaces the scenario value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterOverrides {
    /// Number of genes.
    pub genes: Option<usize>,
    /// Number of samples.
    pub samples: Option<usize>,
    /// Treatment effect size.
    pub effect_size: Option<f64>,
    /// Fraction of affected genes.
    pub affected_fraction: Option<f64>,
    /// Inter-gene correlation.
    pub correlation: Option<f64>,
    /// Noise standard deviation.
    pub noise_sd: Option<f64>,
    /// Survival hazard ratio.
    pub hazard_ratio: Option<f64>,
    /// Lost-to-follow-up fraction.
    pub censoring_fraction: Option<f64>,
    /// Random seed.
    pub seed: Option<u64>,
    /// Genes per block.
    pub block_size: Option<usize>,
    /// Mean Control survival in days.
    pub baseline_survival_days: Option<f64>,
    /// Administrative cutoff in days.
    pub study_cutoff_days: Option<f64>,
    /// Removes the administrative cutoff when `true`.
    pub unlimited_follow_up: Option<bool>,
    /// Expression-risk coupling.
    pub risk_coupling: Option<f64>,
}

impl ParameterOverrides {
    /// Overrides carrying only a seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layers `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            genes,
            samples,
            effect_size,
            affected_fraction,
            correlation,
            noise_sd,
            hazard_ratio,
            censoring_fraction,
            seed,
            block_size,
            baseline_survival_days,
            study_cutoff_days,
            unlimited_follow_up,
            risk_coupling
        );
        self
    }

    fn apply(&self, params: &mut ParameterSet) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field { params.$field = value; })*
            };
        }
        set!(
            genes,
            samples,
            effect_size,
            affected_fraction,
            correlation,
            noise_sd,
            hazard_ratio,
            censoring_fraction,
            seed,
            block_size,
            baseline_survival_days,
            risk_coupling
        );
        if let Some(cutoff) = self.study_cutoff_days {
            params.study_cutoff_days = Some(cutoff);
        }
        if self.unlimited_follow_up == Some(true) {
            params.study_cutoff_days = None;
        }
    }
}

/// Ordered catalogue of the built-in scenarios.
#[must_use]
pub fn scenarios() -> &'static IndexMap<&'static str, ParameterSet> {
    static CATALOGUE: OnceLock<IndexMap<&'static str, ParameterSet>> = OnceLock::new();
    CATALOGUE.get_or_init(|| {
        let textbook = ParameterSet::preset(TEXTBOOK_CASE);
        let subtle = ParameterSet {
            effect_size: 0.8,
            affected_fraction: 0.05,
            correlation: 0.4,
            hazard_ratio: 0.67,
            censoring_fraction: 0.15,
            risk_coupling: 0.0,
            ..ParameterSet::preset(SUBTLE_EFFECTS)
        };
        // Expression is perturbed exactly as in the Textbook case; survival is not.
        let failed = ParameterSet {
            hazard_ratio: 1.0,
            risk_coupling: 0.0,
            ..ParameterSet::preset(FAILED_DRUG_TRIAL)
        };
        let mut catalogue = IndexMap::new();
        catalogue.insert(TEXTBOOK_CASE, textbook);
        catalogue.insert(SUBTLE_EFFECTS, subtle);
        catalogue.insert(FAILED_DRUG_TRIAL, failed);
        catalogue
    })
}

/// Kebab-case slug of a scenario name (`Failed Drug Trial` → `failed-drug-trial`).
#[must_use]
pub fn slug(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn lookup(name: &str) -> Result<ParameterSet, GenerationError> {
    let wanted = slug(name);
    if wanted == CUSTOM_SCENARIO {
        return Ok(ParameterSet {
            scenario: CUSTOM_SCENARIO.into(),
            ..ParameterSet::preset(TEXTBOOK_CASE)
        });
    }
    scenarios()
        .iter()
        .find(|(label, _)| slug(label) == wanted)
        .map(|(_, params)| params.clone())
        .ok_or_else(|| GenerationError::Configuration(name.to_string()))
}

/// Merges a named scenario with overrides and validates the result.
pub fn resolve(
    scenario_name: &str,
    overrides: &ParameterOverrides,
) -> Result<ParameterSet, GenerationError> {
    let mut params = lookup(scenario_name)?;
    overrides.apply(&mut params);
    params.validate()?;
    Ok(params)
}
