//! mosaic-builder - Deterministic build planning for multi-level image simulations
//!
//! A run is a hierarchy of levels (exposures, chips, tiles, ...) whose leaves
//! are independent build tasks. This crate resolves the hierarchy up front and
//! then, for any flat task number, produces:
//!
//! - **Indices** - the task's position at every level
//! - **Seeds** - per-object, group-repeating and top-level seeds for each object
//! - **Meta parameters** - values shared by every task of a top-level group
//! - **Group geometry** - chip outlines, footprint and named scalars, computed once per group
//!
//! Tasks can be dispatched serially or across a rayon pool and always yield the
//! same seeds and geometry.
//!
//! # Example
//!
//! ```text
//! use mosaic_builder::{BuildTaskEnumerator, Cardinality, Dispatch, RunPlanBuilder};
//!
//! let plan = RunPlanBuilder::new(100)
//!     .level("exposure", Cardinality::Constant(1))
//!     .level("chip", Cardinality::Constant(2))
//!     .objects(0, Cardinality::Constant(5))
//!     .build()?;
//! let summary = BuildTaskEnumerator::new(&plan).run(&renderer, Dispatch::Parallel)?;
//! ```

pub mod chip_array;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod focal_plane;
pub mod geometry_cache;
pub mod hierarchy;
pub mod manifest;
pub mod meta;
pub mod plan;
pub mod seeds;
pub mod tile;
pub mod wcs;

// Re-export commonly used types
pub use chip_array::{ChipArray, ChipPosition, FocalPlaneService, PositionedChip};
pub use config::{ChipLayout, CountSpec, RunConfig};
pub use enumerator::{BuildTask, BuildTaskEnumerator, Dispatch, RunSummary, TaskRenderer};
pub use error::{BuildError, Result};
pub use focal_plane::{ChipGeometry, GroupGeometry};
pub use geometry_cache::GeometryCache;
pub use hierarchy::{Cardinality, CardinalitySource, Hierarchy, HierarchyLevel, TaskIndex};
pub use manifest::{write_group_summaries, TaskManifest};
pub use meta::{MetaParam, MetaValues};
pub use plan::{RunPlan, RunPlanBuilder};
pub use seeds::{ObjectSeeds, SeedPlan, SeedRole, SeedRule, SeedTriple};
pub use tile::TileSourceList;
pub use wcs::{DetectorWcs, PixelShape, TangentPlaneWcs, WcsService, WorldPosition};
