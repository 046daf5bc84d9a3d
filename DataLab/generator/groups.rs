use std::fmt;

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;

/// Treatment arm of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    /// Received the drug.
    Treated,
    /// Received placebo.
    Control,
}

impl Group {
    /// Label used in tables and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Treated => "Treated",
            Self::Control => "Control",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tumour subtype annotation, independent of treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subtype {
    /// Drawn with weight 0.40.
    #[serde(rename = "Subtype_A")]
    A,
    /// Drawn with weight 0.35.
    #[serde(rename = "Subtype_B")]
    B,
    /// Drawn with weight 0.25.
    #[serde(rename = "Subtype_C")]
    C,
}

impl Subtype {
    /// All subtypes in display order.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let u: f64 = rng.gen();
        if u < 0.40 {
            Self::A
        } else if u < 0.75 {
            Self::B
        } else {
            Self::C
        }
    }
}

/// One column of the expression matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Unique sample identifier.
    pub sample_id: String,
    /// Treatment arm.
    pub group: Group,
    /// Subtype annotation.
    pub subtype: Subtype,
}

/// Identifier for the zero-based sample `index`.
#[must_use]
pub fn sample_id(index: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("Sample_{:0width$}", index + 1)
}

/// Assigns exactly half the samples to each arm in shuffled order.
pub fn assign_groups<R: Rng + ?Sized>(params: &ParameterSet, rng: &mut R) -> Vec<SampleRecord> {
    let half = params.group_size();
    let mut arms: Vec<Group> = std::iter::repeat(Group::Treated)
        .take(half)
        .chain(std::iter::repeat(Group::Control).take(params.samples - half))
        .collect();
    arms.shuffle(rng);
    arms.into_iter()
        .enumerate()
        .map(|(idx, group)| SampleRecord {
            sample_id: sample_id(idx, params.samples),
            group,
            subtype: Subtype::draw(rng),
        })
        .collect()
}

/// Column indices of `group`, in sample order.
#[must_use]
pub fn indices_of(samples: &[SampleRecord], group: Group) -> Vec<usize> {
    samples
        .iter()
        .enumerate()
        .filter(|(_, sample)| sample.group == group)
        .map(|(idx, _)| idx)
        .collect()
}
