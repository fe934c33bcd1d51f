//! Frozen run plan: resolved hierarchy, object counts and seed rules
//!
//! A [`RunPlanBuilder`] collects the run description and evaluates every
//! data-dependent count up front. The resulting [`RunPlan`] is immutable and
//! answers, for any flat task number, where the task sits in the hierarchy,
//! which objects it renders, and which seeds those objects use.

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sky_geometry::{Angle, AngleExt, DEFAULT_BORDER_ARCSEC};

use crate::error::{BuildError, Result};
use crate::hierarchy::{level_stream_seed, Cardinality, Hierarchy, HierarchyLevel, TaskIndex};
use crate::meta::{MetaParam, MetaValues};
use crate::seeds::{group_start_object, top_level_seed, ObjectSeeds, SeedPlan, SeedRule};

/// Name used for the object-count level in errors and custom sources
pub const OBJECTS_LEVEL_NAME: &str = "objects";

/// Collects a run description and freezes it into a [`RunPlan`]
#[derive(Debug, Clone)]
pub struct RunPlanBuilder {
    base_seed: u64,
    levels: Vec<HierarchyLevel>,
    objects: Option<(usize, Cardinality)>,
    group_level: Option<usize>,
    seed_rules: Vec<SeedRule>,
    meta_params: Vec<MetaParam>,
    border_arcsec: f64,
}

impl RunPlanBuilder {
    pub fn new(base_seed: u64) -> Self {
        Self {
            base_seed,
            levels: Vec::new(),
            objects: None,
            group_level: None,
            seed_rules: SeedPlan::standard_rules(),
            meta_params: Vec::new(),
            border_arcsec: DEFAULT_BORDER_ARCSEC,
        }
    }

    /// Append a hierarchy level below the ones already added
    pub fn level(mut self, name: impl Into<String>, cardinality: Cardinality) -> Self {
        self.levels.push(HierarchyLevel::new(name, cardinality));
        self
    }

    /// Object count per task, evaluated once per node of `level`
    pub fn objects(mut self, level: usize, cardinality: Cardinality) -> Self {
        self.objects = Some((level, cardinality));
        self
    }

    /// Level whose sibling tasks share group-repeating seeds (defaults to the object level)
    pub fn group_level(mut self, level: usize) -> Self {
        self.group_level = Some(level);
        self
    }

    pub fn seed_rules(mut self, rules: Vec<SeedRule>) -> Self {
        self.seed_rules = rules;
        self
    }

    pub fn meta_param(mut self, param: MetaParam) -> Self {
        self.meta_params.push(param);
        self
    }

    pub fn border_arcsec(mut self, border: f64) -> Self {
        self.border_arcsec = border;
        self
    }

    /// Evaluate every cardinality and freeze the plan
    ///
    /// Hierarchy levels are evaluated outermost first, then the object counts
    /// from their own stream. Nothing here depends on object seeds, so counts
    /// are identical on every run with the same base seed.
    ///
    /// # Errors
    /// * `Configuration` - missing object count, bad level numbers, invalid seed
    ///   rules, meta parameters or border
    /// * `MissingCardinality` - a per-parent count list is too short
    pub fn build(self) -> Result<RunPlan> {
        let (object_level, objects) = self
            .objects
            .ok_or_else(|| BuildError::config("no object count configured"))?;

        let hierarchy = Hierarchy::resolve(&self.levels, self.base_seed)?;
        let depth = hierarchy.depth();

        if object_level >= depth {
            return Err(BuildError::config(format!(
                "object count attached to level {object_level}, but the hierarchy has {depth} levels"
            )));
        }
        let group_level = self.group_level.unwrap_or(object_level);
        if group_level < object_level || group_level >= depth {
            return Err(BuildError::config(format!(
                "seed group level {group_level} must be between the object level {object_level} and {}",
                depth - 1
            )));
        }

        let seed_plan = SeedPlan::new(self.base_seed, self.seed_rules)?;
        for param in &self.meta_params {
            param.validate()?;
        }
        if !(self.border_arcsec.is_finite() && self.border_arcsec >= 0.0) {
            return Err(BuildError::config(format!(
                "border must be a non-negative number of arcseconds, got {}",
                self.border_arcsec
            )));
        }

        let nodes = hierarchy.node_count(object_level);
        let mut rng = StdRng::seed_from_u64(level_stream_seed(self.base_seed, depth));
        let object_counts = objects.resolve_all(OBJECTS_LEVEL_NAME, nodes, &mut rng)?;

        let mut object_start = Vec::with_capacity(nodes + 1);
        let mut acc = 0u64;
        for (node, &count) in object_counts.iter().enumerate() {
            object_start.push(acc);
            acc += (hierarchy.tasks_under(object_level, node) * count) as u64;
        }
        object_start.push(acc);

        info!(
            "Run plan: {} levels, {} tasks, {} objects, base seed {}",
            depth,
            hierarchy.total_tasks(),
            acc,
            self.base_seed
        );

        Ok(RunPlan {
            hierarchy,
            object_level,
            group_level,
            object_counts,
            object_start,
            seed_plan,
            meta_params: self.meta_params,
            border: Angle::from_arcseconds(self.border_arcsec),
        })
    }
}

/// Immutable description of a whole run
#[derive(Debug, Clone)]
pub struct RunPlan {
    hierarchy: Hierarchy,
    object_level: usize,
    group_level: usize,
    /// Objects per task under each node of `object_level`
    object_counts: Vec<usize>,
    /// First object number under each node of `object_level`, plus the total
    object_start: Vec<u64>,
    seed_plan: SeedPlan,
    meta_params: Vec<MetaParam>,
    border: Angle,
}

impl RunPlan {
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn seed_plan(&self) -> &SeedPlan {
        &self.seed_plan
    }

    pub fn meta_params(&self) -> &[MetaParam] {
        &self.meta_params
    }

    /// Containment margin around each chip
    pub fn border(&self) -> Angle {
        self.border
    }

    pub fn object_level(&self) -> usize {
        self.object_level
    }

    pub fn group_level(&self) -> usize {
        self.group_level
    }

    pub fn total_tasks(&self) -> usize {
        self.hierarchy.total_tasks()
    }

    pub fn total_objects(&self) -> u64 {
        self.object_start.last().copied().unwrap_or(0)
    }

    /// Number of top-level groups
    pub fn group_count(&self) -> usize {
        self.hierarchy.node_count(0)
    }

    pub fn task_index(&self, task: usize) -> Result<TaskIndex> {
        self.hierarchy.task_index(task)
    }

    fn node(&self, index: &TaskIndex, level: usize) -> Result<usize> {
        index.node_at(level).ok_or_else(|| {
            BuildError::config(format!("task {} has no level {}", index.task(), level))
        })
    }

    fn first_task_of(&self, level: usize, node: usize) -> Result<usize> {
        self.hierarchy.first_task_of(level, node).ok_or_else(|| {
            BuildError::config(format!("level {level} has no node {node}"))
        })
    }

    /// Objects rendered by the task
    pub fn objects_in_task(&self, index: &TaskIndex) -> Result<usize> {
        let node = self.node(index, self.object_level)?;
        self.object_counts
            .get(node)
            .copied()
            .ok_or_else(|| BuildError::MissingCardinality {
                level: OBJECTS_LEVEL_NAME.to_string(),
                parent: node,
            })
    }

    /// Global number of the task's first object
    pub fn first_object(&self, index: &TaskIndex) -> Result<u64> {
        let node = self.node(index, self.object_level)?;
        let count = self.objects_in_task(index)?;
        let first_task = self.first_task_of(self.object_level, node)?;
        Ok(self.object_start[node] + ((index.task() - first_task) * count) as u64)
    }

    /// Position of the task among the siblings sharing group-repeating seeds
    pub fn index_within_group(&self, index: &TaskIndex) -> Result<usize> {
        let node = self.node(index, self.group_level)?;
        Ok(index.task() - self.first_task_of(self.group_level, node)?)
    }

    pub fn top_level_seed(&self, index: &TaskIndex) -> u64 {
        top_level_seed(self.seed_plan.base_seed(), index.top() as u64)
    }

    /// Meta parameter values for the task's top-level group
    pub fn meta_values(&self, index: &TaskIndex) -> MetaValues {
        MetaValues::draw(&self.meta_params, self.top_level_seed(index))
    }

    /// Seeds for every object of the task
    pub fn object_seeds(&self, index: &TaskIndex) -> Result<Vec<ObjectSeeds>> {
        let count = self.objects_in_task(index)?;
        let first = self.first_object(index)?;
        let within = self.index_within_group(index)? as u64;
        let group_start = group_start_object(first, within, count as u64);
        let top = index.top() as u64;

        Ok((0..count)
            .map(|local| {
                let obj_num = first + local as u64;
                let triple = self.seed_plan.triple(obj_num, group_start, count as u64, top);
                ObjectSeeds {
                    obj_num,
                    local,
                    triple,
                    streams: self.seed_plan.stream_seeds(&triple),
                }
            })
            .collect())
    }
}
