//! Deterministic seed derivation
//!
//! Every object in a run gets three seeds built from the base seed by plain
//! `u64` addition:
//!
//! - **per-object**: `base + obj_num`, unique across the run, for noise
//! - **group-repeating**: `base + group_start + (obj_num - group_start) % N`,
//!   the same for local object `k` in every sibling task of a group, for
//!   intrinsic object properties
//! - **top-level**: `base + top_index`, constant within a top-level group, for
//!   quantities that should only change between groups
//!
//! A [`SeedPlan`] decides which random-number stream each of these feeds.

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// Which of the three derived seeds a random stream receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedRole {
    GroupRepeating,
    PerObject,
    TopLevel,
}

/// Assignment of one seed role to one random stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRule {
    pub role: SeedRole,
    pub stream: usize,
}

/// The three seeds derived for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeedTriple {
    pub per_object: u64,
    pub group_repeating: u64,
    pub top_level: u64,
}

impl SeedTriple {
    pub fn get(&self, role: SeedRole) -> u64 {
        match role {
            SeedRole::PerObject => self.per_object,
            SeedRole::GroupRepeating => self.group_repeating,
            SeedRole::TopLevel => self.top_level,
        }
    }
}

/// Seeds for one object of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSeeds {
    /// Global object number across the run
    pub obj_num: u64,
    /// Index of the object within its task
    pub local: usize,
    pub triple: SeedTriple,
    /// Seed for each random stream, indexed by stream number
    pub streams: Vec<u64>,
}

/// Seed for the noise stream of object `obj_num`
pub fn per_object_seed(base_seed: u64, obj_num: u64) -> u64 {
    base_seed.wrapping_add(obj_num)
}

/// First object number of the group a task belongs to
///
/// # Arguments
/// * `first_object` - Global number of the task's first object
/// * `index_within_group` - Position of the task among its group siblings
/// * `group_count` - Objects per task in the group
pub fn group_start_object(first_object: u64, index_within_group: u64, group_count: u64) -> u64 {
    first_object.wrapping_sub(index_within_group.wrapping_mul(group_count))
}

/// Seed that repeats for the same local object across a group's sibling tasks
///
/// With `group_count == 0` no repetition is possible and the per-object seed
/// is returned.
pub fn group_repeating_seed(base_seed: u64, obj_num: u64, group_start: u64, group_count: u64) -> u64 {
    if group_count == 0 {
        return per_object_seed(base_seed, obj_num);
    }
    let offset = obj_num.wrapping_sub(group_start) % group_count;
    base_seed.wrapping_add(group_start).wrapping_add(offset)
}

/// Seed shared by everything under one top-level node
pub fn top_level_seed(base_seed: u64, top_index: u64) -> u64 {
    base_seed.wrapping_add(top_index)
}

/// Base seed plus the ordered stream assignments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlan {
    base_seed: u64,
    rules: Vec<SeedRule>,
}

impl SeedPlan {
    /// Create a plan, checking that streams are numbered `0..rules.len()` without repeats
    pub fn new(base_seed: u64, mut rules: Vec<SeedRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(BuildError::config("seed plan needs at least one rule"));
        }
        rules.sort_by_key(|r| r.stream);
        for (expected, rule) in rules.iter().enumerate() {
            if rule.stream != expected {
                return Err(BuildError::config(format!(
                    "seed streams must be numbered 0..{} without gaps or repeats, found stream {} at position {}",
                    rules.len(),
                    rule.stream,
                    expected
                )));
            }
        }
        Ok(Self { base_seed, rules })
    }

    /// Stream 0 repeats per group, stream 1 is per-object noise, stream 2 is top-level
    pub fn standard(base_seed: u64) -> Self {
        Self {
            base_seed,
            rules: Self::standard_rules(),
        }
    }

    pub fn standard_rules() -> Vec<SeedRule> {
        vec![
            SeedRule {
                role: SeedRole::GroupRepeating,
                stream: 0,
            },
            SeedRule {
                role: SeedRole::PerObject,
                stream: 1,
            },
            SeedRule {
                role: SeedRole::TopLevel,
                stream: 2,
            },
        ]
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn rules(&self) -> &[SeedRule] {
        &self.rules
    }

    pub fn stream_count(&self) -> usize {
        self.rules.len()
    }

    /// Derive the seed triple for one object
    ///
    /// # Arguments
    /// * `obj_num` - Global object number
    /// * `group_start` - First object number of the object's group
    /// * `group_count` - Objects per task in the group
    /// * `top_index` - Outermost hierarchy index
    pub fn triple(&self, obj_num: u64, group_start: u64, group_count: u64, top_index: u64) -> SeedTriple {
        SeedTriple {
            per_object: per_object_seed(self.base_seed, obj_num),
            group_repeating: group_repeating_seed(self.base_seed, obj_num, group_start, group_count),
            top_level: top_level_seed(self.base_seed, top_index),
        }
    }

    /// Seed for every stream, in stream order
    pub fn stream_seeds(&self, triple: &SeedTriple) -> Vec<u64> {
        self.rules.iter().map(|rule| triple.get(rule.role)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_object_seeds_are_sequential() {
        let plan = SeedPlan::standard(100);
        let seeds: Vec<u64> = (0..5).map(|k| plan.triple(k, 0, 5, 0).per_object).collect();
        assert_eq!(seeds, vec![100, 101, 102, 103, 104]);
    }

    #[test]
    fn test_group_seed_repeats_across_siblings() {
        let plan = SeedPlan::standard(100);
        let n = 5;

        // Second sibling starts at object 5 and is index 1 in its group
        let start = group_start_object(5, 1, n);
        assert_eq!(start, 0);

        for k in 0..n {
            let first = plan.triple(k, 0, n, 0);
            let second = plan.triple(5 + k, start, n, 0);
            assert_eq!(first.group_repeating, second.group_repeating);
            assert_ne!(second.group_repeating, second.per_object);
        }
    }

    #[test]
    fn test_group_seed_in_later_group() {
        // Group 1 starts at object 20 with 4 objects per chip; chip 2 of that group
        let first_object = 20 + 2 * 4;
        let start = group_start_object(first_object, 2, 4);
        assert_eq!(start, 20);
        assert_eq!(group_repeating_seed(7, first_object + 3, start, 4), 7 + 20 + 3);
    }

    #[test]
    fn test_zero_group_count_falls_back_to_per_object() {
        assert_eq!(group_repeating_seed(50, 12, 10, 0), per_object_seed(50, 12));
        assert_eq!(group_start_object(12, 3, 0), 12);
    }

    #[test]
    fn test_top_level_seed() {
        let plan = SeedPlan::standard(1000);
        assert_eq!(plan.triple(17, 10, 3, 4).top_level, 1004);
    }

    #[test]
    fn test_seed_arithmetic_wraps() {
        assert_eq!(per_object_seed(u64::MAX, 2), 1);
    }

    #[test]
    fn test_stream_order_follows_rules() {
        let plan = SeedPlan::new(
            10,
            vec![
                SeedRule {
                    role: SeedRole::TopLevel,
                    stream: 1,
                },
                SeedRule {
                    role: SeedRole::PerObject,
                    stream: 0,
                },
            ],
        )
        .unwrap();
        let triple = plan.triple(3, 0, 0, 2);
        assert_eq!(plan.stream_seeds(&triple), vec![13, 12]);

        let standard = SeedPlan::standard(10);
        let triple = standard.triple(3, 1, 2, 2);
        assert_eq!(
            standard.stream_seeds(&triple),
            vec![triple.group_repeating, triple.per_object, triple.top_level]
        );
    }

    #[test]
    fn test_invalid_stream_numbering() {
        let duplicate = vec![
            SeedRule {
                role: SeedRole::PerObject,
                stream: 0,
            },
            SeedRule {
                role: SeedRole::TopLevel,
                stream: 0,
            },
        ];
        assert!(matches!(
            SeedPlan::new(0, duplicate),
            Err(BuildError::Configuration(_))
        ));

        let gap = vec![SeedRule {
            role: SeedRole::PerObject,
            stream: 1,
        }];
        assert!(SeedPlan::new(0, gap).is_err());
        assert!(SeedPlan::new(0, Vec::new()).is_err());
    }
}
