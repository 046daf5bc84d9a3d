use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    dataset::Dataset,
    error::GenerationError,
    expression::synthesize,
    groups::assign_groups,
    params::{resolve, ParameterOverrides, ParameterSet},
    rng::seeded_rng,
    stats::compute_stats,
    survival::synthesize_survival,
    telemetry::GeneratorTelemetry,
};

/// Adjusted p-value below which a gene counts as a hit in run summaries.
const HIT_ALPHA: f64 = 0.05;

/// Runs the full pipeline for already validated parameters.
///
/// Pure function of `params`: the only randomness is the stream seeded from
/// `params.seed`, consumed in a fixed order (groups, expression, survival).
pub fn build_dataset(params: ParameterSet) -> Result<Dataset, GenerationError> {
    params.validate()?;
    let mut rng = seeded_rng(params.seed);
    let samples = assign_groups(&params, &mut rng);
    let expression = synthesize(&params, &samples, &mut rng);
    let survival = synthesize_survival(&samples, &expression.matrix, &params, &mut rng);
    let gene_stats = compute_stats(&expression.matrix, &samples);
    let affected = expression.affected_ids();
    Dataset::new(
        params,
        expression.matrix,
        samples,
        survival.records,
        gene_stats,
        affected,
    )
}

/// Entry point used by hosts: resolves, generates, and logs.
#[derive(Debug, Clone, Default)]
pub struct DataLab {
    telemetry: Option<GeneratorTelemetry>,
}

impl DataLab {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> DataLabBuilder {
        DataLabBuilder::default()
    }

    /// Resolves `scenario` with `overrides` and generates a dataset.
    pub fn generate(
        &self,
        scenario: &str,
        overrides: &ParameterOverrides,
    ) -> Result<Dataset, GenerationError> {
        match resolve(scenario, overrides) {
            Ok(params) => self.generate_from(params),
            Err(err) => {
                self.rejected(scenario, &err);
                Err(err)
            }
        }
    }

    /// Generates from a complete parameter set.
    pub fn generate_from(&self, params: ParameterSet) -> Result<Dataset, GenerationError> {
        if let Err(err) = params.validate() {
            self.rejected(&params.scenario, &err);
            return Err(err);
        }
        self.log(
            LogLevel::Info,
            "datalab.generate.start",
            json!({
                "scenario": params.scenario,
                "genes": params.genes,
                "samples": params.samples,
                "seed": params.seed,
            }),
        );
        let dataset = build_dataset(params).inspect_err(|err| {
            self.log(
                LogLevel::Error,
                "datalab.generate.failed",
                json!({ "kind": err.kind(), "error": err.to_string() }),
            );
        })?;
        let hits = dataset
            .gene_stats()
            .iter()
            .filter(|stat| stat.adjusted_p_value < HIT_ALPHA)
            .count();
        let censored = dataset.survival().iter().filter(|r| r.is_censored()).count();
        self.log(
            LogLevel::Info,
            "datalab.generate.completed",
            json!({
                "fingerprint": dataset.fingerprint().to_string(),
                "genes": dataset.expression().n_genes(),
                "samples": dataset.expression().n_samples(),
                "affected": dataset.affected_genes().len(),
                "significant": hits,
                "censored": censored,
            }),
        );
        Ok(dataset)
    }

    /// Same parameters, different seed.
    pub fn reroll(&self, dataset: &Dataset, seed: u64) -> Result<Dataset, GenerationError> {
        let params = ParameterSet {
            seed,
            ..dataset.params().clone()
        };
        self.generate_from(params)
    }

    /// Telemetry handle, if any.
    #[must_use]
    pub const fn telemetry(&self) -> Option<&GeneratorTelemetry> {
        self.telemetry.as_ref()
    }

    fn rejected(&self, scenario: &str, err: &GenerationError) {
        self.log(
            LogLevel::Warn,
            "datalab.generate.rejected",
            json!({ "scenario": scenario, "kind": err.kind(), "error": err.to_string() }),
        );
    }

    fn log(&self, level: LogLevel, message: &str, fields: serde_json::Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, fields);
        }
    }
}

/// Builder for [`DataLab`].
#[derive(Debug, Default)]
pub struct DataLabBuilder {
    telemetry: Option<GeneratorTelemetry>,
}

impl DataLabBuilder {
    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: GeneratorTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the generator.
    #[must_use]
    pub fn build(self) -> DataLab {
        DataLab {
            telemetry: self.telemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        groups::Group,
        params::{FAILED_DRUG_TRIAL, TEXTBOOK_CASE},
        survival::EventStatus,
        views::survival_by_group,
    };
    use shared_logging::MemoryLogger;
    use std::{collections::HashSet, sync::Arc, thread};

    fn lab() -> DataLab {
        DataLab::builder().build()
    }

    fn custom(overrides: ParameterOverrides) -> Dataset {
        lab().generate("custom", &overrides).unwrap()
    }

    fn bits(values: &[f64]) -> Vec<u64> {
        values.iter().map(|v| v.to_bits()).collect()
    }

    #[test]
    fn same_parameters_and_seed_are_bit_identical() {
        let overrides = ParameterOverrides::with_seed(1234);
        let a = custom(overrides.clone());
        let b = custom(overrides);
        assert_eq!(bits(a.expression().values()), bits(b.expression().values()));
        assert_eq!(a.samples(), b.samples());
        let times = |d: &Dataset| {
            d.survival()
                .iter()
                .map(|r| (r.time.to_bits(), r.event))
                .collect::<Vec<_>>()
        };
        assert_eq!(times(&a), times(&b));
        let stats = |d: &Dataset| {
            d.gene_stats()
                .iter()
                .map(|s| {
                    (
                        s.log2_fold_change.to_bits(),
                        s.p_value.to_bits(),
                        s.adjusted_p_value.to_bits(),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(stats(&a), stats(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_gives_different_matrix() {
        let a = custom(ParameterOverrides::with_seed(1));
        let b = lab().reroll(&a, 2).unwrap();
        assert_eq!(b.params().seed, 2);
        assert_ne!(bits(a.expression().values()), bits(b.expression().values()));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn identifier_sets_agree_across_tables() {
        for scenario in [TEXTBOOK_CASE, "Subtle Effects", FAILED_DRUG_TRIAL] {
            let dataset = lab().generate(scenario, &ParameterOverrides::default()).unwrap();
            let columns: HashSet<_> = dataset.expression().sample_ids().iter().collect();
            let samples: HashSet<_> = dataset.samples().iter().map(|s| &s.sample_id).collect();
            let survival: HashSet<_> = dataset.survival().iter().map(|s| &s.sample_id).collect();
            let rows: HashSet<_> = dataset.expression().gene_ids().iter().collect();
            let stats: HashSet<_> = dataset.gene_stats().iter().map(|s| &s.gene_id).collect();
            assert_eq!(columns, samples);
            assert_eq!(columns, survival);
            assert_eq!(rows, stats);
            assert_eq!(columns.len(), dataset.params().samples);
            assert_eq!(rows.len(), dataset.params().genes);
        }
    }

    #[test]
    fn groups_are_balanced_for_every_even_size() {
        for samples in (4..=30).step_by(2) {
            let dataset = custom(ParameterOverrides {
                samples: Some(samples),
                genes: Some(10),
                ..ParameterOverrides::default()
            });
            assert_eq!(dataset.group_count(Group::Treated), samples / 2);
            assert_eq!(dataset.group_count(Group::Control), samples / 2);
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn no_affected_genes_centers_fold_changes_at_zero() {
        let dataset = custom(ParameterOverrides {
            genes: Some(1000),
            samples: Some(40),
            affected_fraction: Some(0.0),
            correlation: Some(0.0),
            ..ParameterOverrides::default()
        });
        assert!(dataset.affected_genes().is_empty());
        let stats = dataset.gene_stats();
        let mean = stats.iter().map(|s| s.log2_fold_change).sum::<f64>() / stats.len() as f64;
        assert!(mean.abs() < 0.05, "mean log2FC {mean}");
        let hits = stats.iter().filter(|s| s.adjusted_p_value < 0.05).count();
        assert!(hits <= 5, "{hits} false discoveries");
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn correlated_null_fold_changes_stay_within_block_noise() {
        for seed in 1..=8 {
            let dataset = custom(ParameterOverrides {
                affected_fraction: Some(0.0),
                seed: Some(seed),
                ..ParameterOverrides::default()
            });
            let params = dataset.params();
            assert!(params.correlation > 0.5);
            // Genes in a block share one factor, so the mean behaves like an
            // average over blocks rather than over genes.
            let arm_variance = params.noise_sd.powi(2) * 2.0 / params.group_size() as f64;
            let sd = (arm_variance
                * (params.correlation / params.block_count() as f64
                    + (1.0 - params.correlation) / params.genes as f64))
                .sqrt();
            let stats = dataset.gene_stats();
            let mean =
                stats.iter().map(|s| s.log2_fold_change).sum::<f64>() / stats.len() as f64;
            assert!(mean.abs() < 4.0 * sd, "seed {seed}: mean log2FC {mean}, sd {sd}");
        }
    }

    #[test]
    fn injected_effect_is_recovered() {
        let dataset = custom(ParameterOverrides {
            genes: Some(100),
            samples: Some(40),
            effect_size: Some(2.0),
            affected_fraction: Some(0.2),
            ..ParameterOverrides::default()
        });
        assert_eq!(dataset.affected_genes().len(), 20);
        let flagged = dataset
            .affected_genes()
            .iter()
            .filter(|id| {
                let stat = dataset
                    .gene_stats()
                    .iter()
                    .find(|s| &s.gene_id == *id)
                    .unwrap();
                stat.log2_fold_change.abs() > 1.0 && stat.adjusted_p_value < 0.05
            })
            .count();
        assert!(flagged >= 16, "only {flagged} of 20 affected genes flagged");
    }

    #[test]
    fn failed_drug_trial_has_hits_but_no_survival_gap() {
        let dataset = lab()
            .generate(
                FAILED_DRUG_TRIAL,
                &ParameterOverrides {
                    genes: Some(100),
                    samples: Some(2000),
                    affected_fraction: Some(0.3),
                    effect_size: Some(2.0),
                    ..ParameterOverrides::default()
                },
            )
            .unwrap();
        let hits = dataset
            .gene_stats()
            .iter()
            .filter(|s| s.adjusted_p_value < 0.05 && s.log2_fold_change.abs() > 1.0)
            .count();
        assert!(hits >= 24, "{hits} hits");

        let summary = survival_by_group(&dataset);
        let overall = (summary.treated.mean_time + summary.control.mean_time) / 2.0;
        assert!(
            summary.mean_gap().abs() < 0.15 * overall,
            "gap {} vs mean {overall}",
            summary.mean_gap()
        );
    }

    #[test]
    fn effective_drug_does_show_survival_gap() {
        let dataset = lab()
            .generate(
                TEXTBOOK_CASE,
                &ParameterOverrides {
                    genes: Some(20),
                    samples: Some(2000),
                    ..ParameterOverrides::default()
                },
            )
            .unwrap();
        let summary = survival_by_group(&dataset);
        assert!(summary.mean_gap() > 0.3 * summary.control.mean_time);
    }

    #[test]
    fn dataset_survival_is_the_censored_draw() {
        let params = resolve(
            "custom",
            &ParameterOverrides {
                samples: Some(200),
                censoring_fraction: Some(0.3),
                ..ParameterOverrides::default()
            },
        )
        .unwrap();
        let dataset = build_dataset(params.clone()).unwrap();

        let mut rng = seeded_rng(params.seed);
        let samples = assign_groups(&params, &mut rng);
        let expression = synthesize(&params, &samples, &mut rng);
        let draw = synthesize_survival(&samples, &expression.matrix, &params, &mut rng);
        assert_eq!(dataset.survival(), draw.records.as_slice());
        for (record, latent) in dataset.survival().iter().zip(&draw.latent_times) {
            if record.event == EventStatus::Censored {
                assert!(record.time < *latent);
            }
        }
    }

    #[test]
    fn invalid_requests_fail_before_generation_and_are_logged() {
        let memory = Arc::new(MemoryLogger::new(16));
        let telemetry = GeneratorTelemetry::builder("datalab")
            .sink(memory.clone())
            .build()
            .unwrap();
        let lab = DataLab::builder().telemetry(telemetry).build();

        let err = lab
            .generate("nonexistent_scenario", &ParameterOverrides::default())
            .unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        let err = lab
            .generate(
                "custom",
                &ParameterOverrides {
                    samples: Some(3),
                    ..ParameterOverrides::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, GenerationError::Validation { .. }));
        assert_eq!(memory.find("datalab.generate.rejected").len(), 2);
        assert!(memory.find("datalab.generate.start").is_empty());

        // A failed attempt leaves nothing behind: the corrected retry matches a fresh run.
        let retry = lab.generate("custom", &ParameterOverrides::default()).unwrap();
        assert_eq!(retry, custom(ParameterOverrides::default()));
        assert_eq!(memory.find("datalab.generate.completed").len(), 1);
    }

    #[test]
    fn concurrent_requests_are_independent_and_readers_share() {
        let handles: Vec<_> = (0..4)
            .map(|_| thread::spawn(|| custom(ParameterOverrides::with_seed(77))))
            .collect();
        let datasets: Vec<Dataset> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(datasets.windows(2).all(|w| w[0] == w[1]));

        let shared = Arc::new(datasets.into_iter().next().unwrap());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let dataset = Arc::clone(&shared);
                thread::spawn(move || dataset.gene_stats().len())
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), shared.params().genes);
        }
    }

    #[test]
    fn stats_are_stable_on_recompute() {
        let dataset = custom(ParameterOverrides::default());
        let again = compute_stats(dataset.expression(), dataset.samples());
        assert_eq!(again.as_slice(), dataset.gene_stats());
    }
}
