use rand::{distributions::Open01, seq::index, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    expression::ExpressionMatrix,
    groups::{Group, SampleRecord},
    params::ParameterSet,
};

/// Fraction of the latent time a lost-to-follow-up sample is observed for.
const FOLLOW_UP_SHARE: std::ops::Range<f64> = 0.05..0.95;

/// Whether the event was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Event occurred at `time`.
    Observed,
    /// Follow-up ended at `time`; the event happens later.
    Censored,
}

/// Observed survival for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalRecord {
    /// Sample this outcome belongs to.
    pub sample_id: String,
    /// Observed time in days.
    pub time: f64,
    /// Event or censoring.
    pub event: EventStatus,
}

impl SurvivalRecord {
    /// True when the record is censored.
    #[must_use]
    pub fn is_censored(&self) -> bool {
        self.event == EventStatus::Censored
    }
}

/// Output of [`synthesize_survival`].
#[derive(Debug, Clone)]
pub struct SurvivalDraw {
    /// Public survival table aligned with the samples.
    pub records: Vec<SurvivalRecord>,
    /// True event times, never exposed by the dataset.
    pub latent_times: Vec<f64>,
    /// Expression-derived risk per sample.
    pub risk_scores: Vec<f64>,
}

/// Risk score per sample from the genes of co-expression block 0.
///
/// Each gene is centered on the mean of the sample's own group and scaled by
/// the noise level, so treatment shifts cancel and the score has the same
/// distribution in both arms.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn risk_scores(
    matrix: &ExpressionMatrix,
    samples: &[SampleRecord],
    params: &ParameterSet,
) -> Vec<f64> {
    let prognostic: Vec<usize> = matrix
        .block_of()
        .iter()
        .enumerate()
        .filter(|(_, block)| **block == 0)
        .map(|(gene, _)| gene)
        .collect();
    let mut scores = vec![0.0; samples.len()];
    for &gene in &prognostic {
        let row = matrix.row(gene);
        let treated_mean = group_mean(row, samples, Group::Treated);
        let control_mean = group_mean(row, samples, Group::Control);
        for (sample, record) in samples.iter().enumerate() {
            let center = match record.group {
                Group::Treated => treated_mean,
                Group::Control => control_mean,
            };
            scores[sample] += (row[sample] - center) / params.noise_sd;
        }
    }
    let count = prognostic.len().max(1) as f64;
    scores.iter_mut().for_each(|score| *score /= count);
    scores
}

#[allow(clippy::cast_precision_loss)]
fn group_mean(row: &[f64], samples: &[SampleRecord], group: Group) -> f64 {
    let (sum, n) = samples
        .iter()
        .zip(row)
        .filter(|(record, _)| record.group == group)
        .fold((0.0, 0usize), |(sum, n), (_, value)| (sum + value, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Draws survival outcomes for `samples`.
///
/// Control hazard is `1 / baseline_survival_days`; Treated hazard is scaled by
/// the hazard ratio and nothing else, so with `HR = 1` the arms share one
/// time distribution however strongly expression was perturbed.
pub fn synthesize_survival<R: Rng + ?Sized>(
    samples: &[SampleRecord],
    matrix: &ExpressionMatrix,
    params: &ParameterSet,
    rng: &mut R,
) -> SurvivalDraw {
    let risk = risk_scores(matrix, samples, params);
    let base_rate = params.baseline_survival_days.recip();

    let latent_times: Vec<f64> = samples
        .iter()
        .zip(&risk)
        .map(|(record, score)| {
            let arm = match record.group {
                Group::Treated => params.hazard_ratio,
                Group::Control => 1.0,
            };
            let rate = base_rate * arm * (params.risk_coupling * score).exp();
            let u: f64 = rng.sample(Open01);
            -u.ln() / rate
        })
        .collect();

    let mut observed: Vec<(f64, EventStatus)> = latent_times
        .iter()
        .map(|&time| (time, EventStatus::Observed))
        .collect();
    for sample in index::sample(rng, samples.len(), params.censored_count()) {
        let share = rng.gen_range(FOLLOW_UP_SHARE);
        observed[sample] = (latent_times[sample] * share, EventStatus::Censored);
    }
    if let Some(cutoff) = params.study_cutoff_days {
        for entry in &mut observed {
            if entry.0 > cutoff {
                *entry = (cutoff, EventStatus::Censored);
            }
        }
    }

    let records = samples
        .iter()
        .zip(observed)
        .map(|(record, (time, event))| SurvivalRecord {
            sample_id: record.sample_id.clone(),
            time,
            event,
        })
        .collect();
    SurvivalDraw {
        records,
        latent_times,
        risk_scores: risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        expression::synthesize,
        groups::assign_groups,
        params::{resolve, ParameterOverrides, FAILED_DRUG_TRIAL, TEXTBOOK_CASE},
        rng::seeded_rng,
    };

    fn run(scenario: &str, overrides: &ParameterOverrides) -> (Vec<SampleRecord>, SurvivalDraw) {
        let params = resolve(scenario, overrides).unwrap();
        let mut rng = seeded_rng(params.seed);
        let samples = assign_groups(&params, &mut rng);
        let expression = synthesize(&params, &samples, &mut rng);
        let survival = synthesize_survival(&samples, &expression.matrix, &params, &mut rng);
        (samples, survival)
    }

    fn arm_means(samples: &[SampleRecord], values: &[f64]) -> (f64, f64) {
        let (mut t, mut nt, mut c, mut nc) = (0.0, 0.0, 0.0, 0.0);
        for (record, value) in samples.iter().zip(values) {
            match record.group {
                Group::Treated => {
                    t += value;
                    nt += 1.0;
                }
                Group::Control => {
                    c += value;
                    nc += 1.0;
                }
            }
        }
        (t / nt, c / nc)
    }

    #[test]
    fn censored_time_is_strictly_before_event() {
        let overrides = ParameterOverrides {
            samples: Some(400),
            censoring_fraction: Some(0.4),
            ..ParameterOverrides::default()
        };
        let (_, draw) = run(TEXTBOOK_CASE, &overrides);
        let censored = draw.records.iter().filter(|r| r.is_censored()).count();
        assert!(censored >= 160);
        for (record, latent) in draw.records.iter().zip(&draw.latent_times) {
            assert!(record.time >= 0.0);
            match record.event {
                EventStatus::Censored => assert!(record.time < *latent),
                EventStatus::Observed => assert!((record.time - latent).abs() < f64::EPSILON),
            }
        }
    }

    #[test]
    fn cutoff_caps_follow_up() {
        let overrides = ParameterOverrides {
            samples: Some(200),
            study_cutoff_days: Some(100.0),
            censoring_fraction: Some(0.0),
            ..ParameterOverrides::default()
        };
        let (_, draw) = run(TEXTBOOK_CASE, &overrides);
        assert!(draw.records.iter().all(|r| r.time <= 100.0));
        assert!(draw
            .records
            .iter()
            .filter(|r| (r.time - 100.0).abs() < f64::EPSILON)
            .all(SurvivalRecord::is_censored));
    }

    #[test]
    fn hazard_ratio_below_one_lengthens_treated_survival() {
        let overrides = ParameterOverrides {
            samples: Some(2000),
            genes: Some(20),
            ..ParameterOverrides::default()
        };
        let (samples, draw) = run(TEXTBOOK_CASE, &overrides);
        let (treated, control) = arm_means(&samples, &draw.latent_times);
        // Textbook HR = 0.4 → expected Treated mean 2.5x Control.
        assert!(treated / control > 1.8, "{treated} vs {control}");
    }

    #[test]
    fn unit_hazard_ratio_gives_no_survival_gap() {
        let overrides = ParameterOverrides {
            samples: Some(2000),
            genes: Some(20),
            risk_coupling: Some(0.5),
            ..ParameterOverrides::default()
        };
        let (samples, draw) = run(FAILED_DRUG_TRIAL, &overrides);
        let (treated, control) = arm_means(&samples, &draw.latent_times);
        assert!((treated / control - 1.0).abs() < 0.2, "{treated} vs {control}");
        let (risk_t, risk_c) = arm_means(&samples, &draw.risk_scores);
        assert!(risk_t.abs() < 1e-9 && risk_c.abs() < 1e-9);
    }
}
