//! Per-group meta parameters
//!
//! Quantities such as a PSF drift amplitude that should be fixed for every
//! task of a top-level group and change from group to group. They are drawn
//! from a stream seeded with the group's top-level seed, in declaration order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// A named parameter drawn uniformly from `[min, max)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaParam {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl MetaParam {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BuildError::config("meta parameter with an empty name"));
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(BuildError::config(format!(
                "meta parameter '{}' has an invalid range [{}, {}]",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Evaluated meta parameters for one group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaValues {
    values: Vec<(String, f64)>,
}

impl MetaValues {
    /// Draw every parameter from a stream seeded with `top_level_seed`
    ///
    /// Each parameter consumes exactly one draw, so adding a parameter at the
    /// end never changes the values of the ones before it.
    pub fn draw(params: &[MetaParam], top_level_seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(top_level_seed);
        let values = params
            .iter()
            .map(|p| {
                let u: f64 = rng.gen();
                (p.name.clone(), p.min + u * (p.max - p.min))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
