//! Build task enumeration and dispatch
//!
//! Turns a frozen [`RunPlan`] into concrete [`BuildTask`]s: hierarchy indices,
//! object seeds, meta parameters and the shared group geometry. Tasks are
//! independent once the plan exists, so they can be handed to the renderer
//! serially or in parallel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;
use sky_geometry::{GeometryError, SkyPoint, SkyPointRandomizer};

use crate::error::{BuildError, Result};
use crate::focal_plane::{ChipGeometry, GroupGeometry};
use crate::geometry_cache::GeometryCache;
use crate::hierarchy::TaskIndex;
use crate::plan::RunPlan;
use crate::seeds::ObjectSeeds;
use crate::wcs::WcsService;

/// How tasks are handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Serial,
    Parallel,
}

/// Host renderer for one task
pub trait TaskRenderer: Send + Sync {
    fn render(&self, task: &BuildTask) -> Result<()>;
}

/// Everything the renderer needs for one leaf task
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub index: TaskIndex,
    pub first_object: u64,
    pub objects: Vec<ObjectSeeds>,
    pub top_level_seed: u64,
    pub group: Arc<GroupGeometry>,
}

impl BuildTask {
    /// Flat task number
    pub fn number(&self) -> usize {
        self.index.task()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// WCS and outline of the chip this task renders, when the run has a WCS
    pub fn chip(&self) -> Option<&ChipGeometry> {
        self.group.chip_for_task(self.number())
    }

    /// Skip mask for candidate object positions (`true` = skip)
    ///
    /// Without chip geometry nothing can be excluded and every object is kept.
    pub fn prune(&self, positions: &[SkyPoint]) -> Vec<bool> {
        match self.chip() {
            Some(chip) => chip.quad.prune(positions),
            None => vec![false; positions.len()],
        }
    }

    /// Positions scattered over the group footprint, one per object
    ///
    /// Each position is drawn from the object's group-repeating seed, so local
    /// object `k` lands on the same sky position in every sibling task.
    pub fn scatter_positions(&self) -> Option<Vec<SkyPoint>> {
        let bounds = *self.group.footprint()?.bounds_radec();
        Some(
            self.objects
                .iter()
                .map(|o| {
                    SkyPointRandomizer::new(o.triple.group_repeating).generate_within(
                        bounds.min_ra,
                        bounds.max_ra,
                        bounds.min_dec,
                        bounds.max_dec,
                    )
                })
                .collect(),
        )
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub tasks: usize,
    pub objects: usize,
    pub groups: usize,
    pub elapsed: Duration,
}

/// Produces build tasks from a frozen plan
pub struct BuildTaskEnumerator<'a> {
    plan: &'a RunPlan,
    wcs: Option<Arc<dyn WcsService>>,
    cache: GeometryCache,
}

impl<'a> BuildTaskEnumerator<'a> {
    pub fn new(plan: &'a RunPlan) -> Self {
        Self {
            plan,
            wcs: None,
            cache: GeometryCache::new(),
        }
    }

    /// Attach the host WCS service used for group geometry
    pub fn with_wcs(mut self, wcs: Arc<dyn WcsService>) -> Self {
        self.wcs = Some(wcs);
        self
    }

    pub fn plan(&self) -> &RunPlan {
        self.plan
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    /// Total number of tasks, for the external scheduler
    pub fn total_tasks(&self) -> usize {
        self.plan.total_tasks()
    }

    /// Geometry of top-level group `group`, computed on first request
    pub fn group_geometry(&self, group: usize) -> Result<Arc<GroupGeometry>> {
        let hierarchy = self.plan.hierarchy();
        let first = hierarchy
            .first_task_of(0, group)
            .ok_or_else(|| BuildError::config(format!("run has no group {group}")))?;
        let count = hierarchy.tasks_under(0, group);

        self.cache.get_or_compute(group, || {
            let tasks = (first..first + count)
                .map(|n| hierarchy.task_index(n))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| GeometryError::Transform(e.to_string()))?;
            let seed_index = tasks.first().cloned();
            let (meta, top_seed) = match &seed_index {
                Some(index) => (
                    self.plan.meta_values(index),
                    self.plan.top_level_seed(index),
                ),
                None => Default::default(),
            };
            GroupGeometry::compute(
                group,
                &tasks,
                self.wcs.as_deref(),
                self.plan.border(),
                meta,
                top_seed,
            )
        })
    }

    /// Build task number `n`
    ///
    /// # Errors
    /// * `TaskOutOfRange` - `n` is not below [`Self::total_tasks`]
    /// * `GroupGeometry` - the task's group geometry could not be computed
    pub fn task(&self, n: usize) -> Result<BuildTask> {
        let index = self.plan.task_index(n)?;
        let group = self.group_geometry(index.top())?;
        let objects = self.plan.object_seeds(&index)?;
        let first_object = self.plan.first_object(&index)?;
        let top_level_seed = self.plan.top_level_seed(&index);

        debug!(
            "Task {} ({}): {} objects from {}",
            n,
            index,
            objects.len(),
            first_object
        );

        Ok(BuildTask {
            index,
            first_object,
            objects,
            top_level_seed,
            group,
        })
    }

    /// Every task in flat order
    pub fn tasks(&self) -> impl Iterator<Item = Result<BuildTask>> + '_ {
        (0..self.total_tasks()).map(move |n| self.task(n))
    }

    /// Build and render every task
    ///
    /// The first error stops the run and is returned.
    pub fn run<R>(&self, renderer: &R, dispatch: Dispatch) -> Result<RunSummary>
    where
        R: TaskRenderer + ?Sized,
    {
        let start = Instant::now();
        let total = self.total_tasks();
        info!(
            "Dispatching {} tasks {}",
            total,
            match dispatch {
                Dispatch::Serial => "serially",
                Dispatch::Parallel => "in parallel",
            }
        );

        let render_one = |n: usize| -> Result<usize> {
            let task = self.task(n)?;
            renderer.render(&task)?;
            Ok(task.object_count())
        };

        let counts: Vec<usize> = match dispatch {
            Dispatch::Serial => (0..total).map(render_one).collect::<Result<_>>()?,
            Dispatch::Parallel => (0..total)
                .into_par_iter()
                .map(render_one)
                .collect::<Result<_>>()?,
        };

        Ok(RunSummary {
            tasks: counts.len(),
            objects: counts.iter().sum(),
            groups: self.cache.groups().len(),
            elapsed: start.elapsed(),
        })
    }
}
