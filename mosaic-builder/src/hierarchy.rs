//! Build hierarchy and the flat task number resolver
//!
//! A run is a tree of levels, outermost first (for example tile -> exposure ->
//! chip). Every leaf is one build task, numbered by a single flat counter in
//! depth-first order. Because the number of children can differ from parent to
//! parent, a flat number is resolved by searching per-level prefix sums of leaf
//! counts rather than by fixed-radix division.
//!
//! All cardinalities are evaluated once, level by level and parent by parent,
//! before any task is resolved. Data-dependent counts draw from a random stream
//! scoped to their level so the counts never depend on how object seeds are
//! consumed.

use std::fmt;
use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BuildError, Result};

/// Multiplier separating the seeds of level-scoped random streams
pub const LEVEL_STREAM_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed of the random stream used to evaluate cardinalities at `level`
///
/// Level `depth` (one past the innermost level) is reserved for object counts.
pub fn level_stream_seed(base_seed: u64, level: usize) -> u64 {
    base_seed.wrapping_add(LEVEL_STREAM_STRIDE.wrapping_mul(level as u64 + 1))
}

/// Host-side evaluator for data-dependent child counts
///
/// Called once per parent, in parent order, with the level's own random stream.
pub trait CardinalitySource: Send + Sync + fmt::Debug {
    /// Number of children of `parent` (global ordinal at the previous level) at `level`
    fn count(&self, level: &str, parent: usize, rng: &mut StdRng) -> Result<usize>;
}

/// How many children each parent node has at one level
#[derive(Debug, Clone)]
pub enum Cardinality {
    /// Same count under every parent
    Constant(usize),
    /// Explicit count per parent, indexed by the parent's global ordinal
    PerParent(Vec<usize>),
    /// Uniform integer in `[min, max]`, one draw per parent from the level stream
    Uniform { min: usize, max: usize },
    /// Delegated to a host evaluator
    Custom(Arc<dyn CardinalitySource>),
}

impl Cardinality {
    /// Evaluate the count for every one of `parents` parent nodes, in order
    ///
    /// # Arguments
    /// * `level` - Level name, used in errors and passed to custom sources
    /// * `parents` - Number of nodes at the previous level
    /// * `rng` - The level-scoped random stream
    pub fn resolve_all(&self, level: &str, parents: usize, rng: &mut StdRng) -> Result<Vec<usize>> {
        match self {
            Cardinality::Constant(n) => Ok(vec![*n; parents]),
            Cardinality::PerParent(values) => {
                if values.len() < parents {
                    return Err(BuildError::MissingCardinality {
                        level: level.to_string(),
                        parent: values.len(),
                    });
                }
                if values.len() > parents {
                    return Err(BuildError::config(format!(
                        "level '{level}' lists {} counts for {parents} parents",
                        values.len()
                    )));
                }
                Ok(values.clone())
            }
            Cardinality::Uniform { min, max } => {
                if min > max {
                    return Err(BuildError::config(format!(
                        "level '{level}' has an empty range [{min}, {max}]"
                    )));
                }
                Ok((0..parents).map(|_| rng.gen_range(*min..=*max)).collect())
            }
            Cardinality::Custom(source) => (0..parents)
                .map(|parent| source.count(level, parent, rng))
                .collect(),
        }
    }
}

/// One level of the build hierarchy
#[derive(Debug, Clone)]
pub struct HierarchyLevel {
    pub name: String,
    pub cardinality: Cardinality,
}

impl HierarchyLevel {
    pub fn new(name: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            cardinality,
        }
    }
}

/// Position of one build task in the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskIndex {
    task: usize,
    indices: Vec<usize>,
    nodes: Vec<usize>,
}

impl TaskIndex {
    /// Flat task number this index was resolved from
    pub fn task(&self) -> usize {
        self.task
    }

    /// Index within the parent at every level, outermost first
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Index within the parent at `level`
    pub fn index_at(&self, level: usize) -> Option<usize> {
        self.indices.get(level).copied()
    }

    /// Global ordinal of the node at `level` (unique across the whole level)
    pub fn node_at(&self, level: usize) -> Option<usize> {
        self.nodes.get(level).copied()
    }

    /// Outermost index, which identifies the top-level group
    pub fn top(&self) -> usize {
        self.indices.first().copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.indices.len()
    }
}

impl fmt::Display for TaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.indices.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// A hierarchy whose cardinalities have all been evaluated
///
/// Immutable once built. Node ordinals at every level follow depth-first
/// order, so prefix sums over a whole level line up with flat task numbers.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    names: Vec<String>,
    /// `counts[l][p]`: children at level `l` of node `p` at level `l - 1`
    counts: Vec<Vec<usize>>,
    /// `first_child[l][p]`: ordinal at level `l` of the first child of `p`
    first_child: Vec<Vec<usize>>,
    /// `parents[l][g]`: ordinal at level `l - 1` of the parent of node `g`
    parents: Vec<Vec<usize>>,
    /// `leaf_offset[l][g]`: first task under node `g`; a trailing entry holds the total
    leaf_offset: Vec<Vec<usize>>,
}

impl Hierarchy {
    /// Evaluate every level's cardinality and build the prefix-sum tables
    ///
    /// Level 0 has a single implicit root parent. Each level draws from its own
    /// stream seeded by [`level_stream_seed`].
    ///
    /// # Errors
    /// * `Configuration` - no levels, or a cardinality spec is invalid
    /// * `MissingCardinality` - a per-parent list is shorter than the parent count
    pub fn resolve(levels: &[HierarchyLevel], base_seed: u64) -> Result<Self> {
        if levels.is_empty() {
            return Err(BuildError::config("hierarchy needs at least one level"));
        }
        let depth = levels.len();

        let mut names = Vec::with_capacity(depth);
        let mut counts = Vec::with_capacity(depth);
        let mut first_child = Vec::with_capacity(depth);
        let mut parents = Vec::with_capacity(depth);
        let mut parent_count = 1usize;

        for (level_num, level) in levels.iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(level_stream_seed(base_seed, level_num));
            let level_counts = level
                .cardinality
                .resolve_all(&level.name, parent_count, &mut rng)?;

            let mut starts = Vec::with_capacity(parent_count);
            let mut owners = Vec::new();
            let mut next = 0usize;
            for (parent, &count) in level_counts.iter().enumerate() {
                starts.push(next);
                next += count;
                owners.extend(std::iter::repeat(parent).take(count));
            }

            debug!(
                "Level {} '{}': {} nodes under {} parents",
                level_num, level.name, next, parent_count
            );

            names.push(level.name.clone());
            counts.push(level_counts);
            first_child.push(starts);
            parents.push(owners);
            parent_count = next;
        }

        // Leaf counts, innermost level first
        let mut leaves: Vec<Vec<usize>> = vec![Vec::new(); depth];
        leaves[depth - 1] = vec![1; parent_count];
        for level in (0..depth - 1).rev() {
            let child_leaves = &leaves[level + 1];
            let sums: Vec<usize> = counts[level + 1]
                .iter()
                .zip(&first_child[level + 1])
                .map(|(&count, &start)| child_leaves[start..start + count].iter().sum())
                .collect();
            leaves[level] = sums;
        }

        let leaf_offset = leaves
            .iter()
            .map(|level| {
                let mut offsets = Vec::with_capacity(level.len() + 1);
                let mut acc = 0usize;
                for &n in level {
                    offsets.push(acc);
                    acc += n;
                }
                offsets.push(acc);
                offsets
            })
            .collect();

        Ok(Self {
            names,
            counts,
            first_child,
            parents,
            leaf_offset,
        })
    }

    /// Total number of leaf tasks
    pub fn total_tasks(&self) -> usize {
        self.leaf_offset[0].last().copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }

    pub fn level_name(&self, level: usize) -> Option<&str> {
        self.names.get(level).map(String::as_str)
    }

    /// Position of the level called `name`
    pub fn level_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of nodes at `level` across the whole run
    pub fn node_count(&self, level: usize) -> usize {
        self.leaf_offset
            .get(level)
            .map_or(0, |offsets| offsets.len() - 1)
    }

    /// Resolved child counts at `level`, one per parent node
    pub fn counts(&self, level: usize) -> &[usize] {
        self.counts.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ordinal at `level - 1` of the parent of `node` at `level`
    pub fn parent_of(&self, level: usize, node: usize) -> Option<usize> {
        if level == 0 {
            return (node < self.node_count(0)).then_some(0);
        }
        self.parents.get(level)?.get(node).copied()
    }

    /// Number of tasks under `node` at `level`
    pub fn tasks_under(&self, level: usize, node: usize) -> usize {
        let Some(offsets) = self.leaf_offset.get(level) else {
            return 0;
        };
        match (offsets.get(node), offsets.get(node + 1)) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        }
    }

    /// First flat task number under `node` at `level`
    pub fn first_task_of(&self, level: usize, node: usize) -> Option<usize> {
        let offsets = self.leaf_offset.get(level)?;
        (node + 1 < offsets.len()).then(|| offsets[node])
    }

    /// Map a flat task number to its per-level indices
    ///
    /// At each level the children of the current parent are searched for the
    /// last one whose first task is `<= task`. Children with no tasks share
    /// their first task with the next sibling and are passed over.
    ///
    /// # Errors
    /// * `TaskOutOfRange` - `task` is not below [`Hierarchy::total_tasks`]
    pub fn task_index(&self, task: usize) -> Result<TaskIndex> {
        let total = self.total_tasks();
        if task >= total {
            return Err(BuildError::TaskOutOfRange { task, total });
        }

        let depth = self.depth();
        let mut indices = Vec::with_capacity(depth);
        let mut nodes = Vec::with_capacity(depth);
        let mut parent = 0usize;

        for level in 0..depth {
            let start = self.first_child[level][parent];
            let end = start + self.counts[level][parent];
            let offsets = &self.leaf_offset[level][start..end];
            let Some(local) = offsets.partition_point(|&first| first <= task).checked_sub(1)
            else {
                return Err(BuildError::TaskOutOfRange { task, total });
            };
            indices.push(local);
            nodes.push(start + local);
            parent = start + local;
        }

        Ok(TaskIndex {
            task,
            indices,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_three() -> Hierarchy {
        Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(2)),
                HierarchyLevel::new("chip", Cardinality::Constant(3)),
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_two_by_three_resolution() {
        let hierarchy = two_by_three();
        assert_eq!(hierarchy.total_tasks(), 6);

        let expected = [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)];
        for (task, (e, c)) in expected.iter().enumerate() {
            let index = hierarchy.task_index(task).unwrap();
            assert_eq!(index.indices(), &[*e, *c]);
            assert_eq!(index.task(), task);
            assert_eq!(index.node_at(1), Some(e * 3 + c));
        }

        match hierarchy.task_index(6) {
            Err(BuildError::TaskOutOfRange { task, total }) => {
                assert_eq!(task, 6);
                assert_eq!(total, 6);
            }
            other => panic!("expected TaskOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_per_parent_counts_with_empty_node() {
        let hierarchy = Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(3)),
                HierarchyLevel::new("chip", Cardinality::PerParent(vec![2, 0, 1])),
            ],
            0,
        )
        .unwrap();

        assert_eq!(hierarchy.total_tasks(), 3);
        assert_eq!(hierarchy.task_index(0).unwrap().indices(), &[0, 0]);
        assert_eq!(hierarchy.task_index(1).unwrap().indices(), &[0, 1]);
        // Exposure 1 has no chips and is skipped
        assert_eq!(hierarchy.task_index(2).unwrap().indices(), &[2, 0]);
        assert_eq!(hierarchy.tasks_under(0, 1), 0);
        assert_eq!(hierarchy.first_task_of(0, 2), Some(2));
    }

    #[test]
    fn test_three_levels_vary_per_parent() {
        // tile 0: exposures with 2 and 1 chips; tile 1: one exposure with 3 chips
        let hierarchy = Hierarchy::resolve(
            &[
                HierarchyLevel::new("tile", Cardinality::Constant(2)),
                HierarchyLevel::new("exposure", Cardinality::PerParent(vec![2, 1])),
                HierarchyLevel::new("chip", Cardinality::PerParent(vec![2, 1, 3])),
            ],
            0,
        )
        .unwrap();

        assert_eq!(hierarchy.total_tasks(), 6);
        let resolved: Vec<Vec<usize>> = (0..6)
            .map(|n| hierarchy.task_index(n).unwrap().indices().to_vec())
            .collect();
        assert_eq!(
            resolved,
            vec![
                vec![0, 0, 0],
                vec![0, 0, 1],
                vec![0, 1, 0],
                vec![1, 0, 0],
                vec![1, 0, 1],
                vec![1, 0, 2],
            ]
        );

        let last = hierarchy.task_index(5).unwrap();
        assert_eq!(last.node_at(1), Some(2));
        assert_eq!(hierarchy.parent_of(1, 2), Some(1));
        assert_eq!(hierarchy.first_task_of(0, 1), Some(3));
        assert_eq!(hierarchy.tasks_under(0, 0), 3);
        assert_eq!(hierarchy.level_of("exposure"), Some(1));
        assert_eq!(last.to_string(), "1/0/2");
    }

    #[test]
    fn test_short_per_parent_list_is_missing_cardinality() {
        let result = Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(3)),
                HierarchyLevel::new("chip", Cardinality::PerParent(vec![2])),
            ],
            0,
        );
        match result {
            Err(BuildError::MissingCardinality { level, parent }) => {
                assert_eq!(level, "chip");
                assert_eq!(parent, 1);
            }
            other => panic!("expected MissingCardinality, got {other:?}"),
        }
    }

    #[test]
    fn test_long_per_parent_list_is_configuration_error() {
        let result = Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(1)),
                HierarchyLevel::new("chip", Cardinality::PerParent(vec![2, 2])),
            ],
            0,
        );
        assert!(matches!(result, Err(BuildError::Configuration(_))));
    }

    #[test]
    fn test_empty_hierarchy_rejected() {
        assert!(matches!(
            Hierarchy::resolve(&[], 0),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn test_uniform_counts_are_reproducible() {
        let levels = [
            HierarchyLevel::new("exposure", Cardinality::Constant(20)),
            HierarchyLevel::new("chip", Cardinality::Uniform { min: 1, max: 6 }),
        ];
        let first = Hierarchy::resolve(&levels, 1234).unwrap();
        let second = Hierarchy::resolve(&levels, 1234).unwrap();

        assert_eq!(first.counts(1), second.counts(1));
        assert!(first.counts(1).iter().all(|&c| (1..=6).contains(&c)));
        assert_eq!(first.total_tasks(), first.counts(1).iter().sum::<usize>());
    }

    #[test]
    fn test_uniform_empty_range_rejected() {
        let result = Hierarchy::resolve(
            &[HierarchyLevel::new("exposure", Cardinality::Uniform { min: 4, max: 2 })],
            0,
        );
        assert!(matches!(result, Err(BuildError::Configuration(_))));
    }

    #[derive(Debug)]
    struct ParentPlusOne;

    impl CardinalitySource for ParentPlusOne {
        fn count(&self, _level: &str, parent: usize, _rng: &mut StdRng) -> Result<usize> {
            Ok(parent + 1)
        }
    }

    #[test]
    fn test_custom_source_called_per_parent() {
        let hierarchy = Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(3)),
                HierarchyLevel::new("chip", Cardinality::Custom(Arc::new(ParentPlusOne))),
            ],
            0,
        )
        .unwrap();

        assert_eq!(hierarchy.counts(1), &[1, 2, 3]);
        assert_eq!(hierarchy.total_tasks(), 6);
        assert_eq!(hierarchy.task_index(3).unwrap().indices(), &[2, 0]);
    }

    #[test]
    fn test_level_streams_differ() {
        assert_ne!(level_stream_seed(0, 0), level_stream_seed(0, 1));
        assert_eq!(level_stream_seed(5, 2), level_stream_seed(5, 2));
    }
}
