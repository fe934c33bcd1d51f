//! JSON run configuration
//!
//! A run file names the hierarchy levels with their counts, the object count,
//! seed rules, meta parameters and, optionally, a focal plane or tile source
//! list that supplies WCS information and data-dependent counts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sky_geometry::{SkyPoint, DEFAULT_BORDER_ARCSEC};

use crate::chip_array::{ChipArray, FocalPlaneService};
use crate::error::{BuildError, Result};
use crate::hierarchy::Cardinality;
use crate::meta::MetaParam;
use crate::plan::{RunPlan, RunPlanBuilder};
use crate::seeds::SeedRule;
use crate::tile::TileSourceList;
use crate::wcs::{PixelShape, WcsService};

/// Count specification for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CountSpec {
    Constant {
        value: usize,
    },
    PerParent {
        counts: Vec<usize>,
    },
    Uniform {
        min: usize,
        max: usize,
    },
    /// Number of exposures in the tile source list
    TileExposures,
    /// Chips in each exposure of the tile source list
    TileChips,
}

impl CountSpec {
    /// Turn the spec into a cardinality, reading tile counts from `tile`
    pub fn to_cardinality(&self, tile: Option<&TileSourceList>) -> Result<Cardinality> {
        let tile_list = || {
            tile.ok_or_else(|| BuildError::config("tile counts require a tile source list"))
        };
        Ok(match self {
            CountSpec::Constant { value } => Cardinality::Constant(*value),
            CountSpec::PerParent { counts } => Cardinality::PerParent(counts.clone()),
            CountSpec::Uniform { min, max } => Cardinality::Uniform {
                min: *min,
                max: *max,
            },
            CountSpec::TileExposures => Cardinality::Constant(tile_list()?.exposure_count()),
            CountSpec::TileChips => Cardinality::PerParent(tile_list()?.chips_per_exposure()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub name: String,
    pub count: CountSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Level whose nodes each get one object count
    #[serde(default)]
    pub level: usize,
    pub count: CountSpec,
}

/// Chip layout of a focal plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChipLayout {
    Grid {
        pixel_scale_arcsec: f64,
        width: usize,
        height: usize,
        nx: usize,
        ny: usize,
        #[serde(default)]
        gap_arcsec: f64,
    },
    Explicit {
        array: ChipArray,
    },
}

impl ChipLayout {
    pub fn to_array(&self) -> ChipArray {
        match self {
            ChipLayout::Grid {
                pixel_scale_arcsec,
                width,
                height,
                nx,
                ny,
                gap_arcsec,
            } => ChipArray::grid(
                *pixel_scale_arcsec,
                PixelShape::new(*width, *height),
                *nx,
                *ny,
                *gap_arcsec,
            ),
            ChipLayout::Explicit { array } => array.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalPlaneConfig {
    /// Level whose nodes are exposures
    #[serde(default)]
    pub exposure_level: usize,
    /// One (RA, Dec) pointing in degrees per exposure
    pub pointings_deg: Vec<(f64, f64)>,
    pub layout: ChipLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileConfig {
    pub source_list: PathBuf,
}

fn default_border() -> f64 {
    DEFAULT_BORDER_ARCSEC
}

/// Complete description of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_seed: u64,
    #[serde(default)]
    pub levels: Vec<LevelConfig>,
    pub objects: ObjectConfig,
    #[serde(default)]
    pub group_level: Option<usize>,
    #[serde(default)]
    pub seed_rules: Option<Vec<SeedRule>>,
    #[serde(default)]
    pub meta_params: Vec<MetaParam>,
    #[serde(default = "default_border")]
    pub border_arcsec: f64,
    #[serde(default)]
    pub focal_plane: Option<FocalPlaneConfig>,
    #[serde(default)]
    pub tile: Option<TileConfig>,
    /// Scatter objects over each group footprint and prune them per chip
    #[serde(default)]
    pub wide: bool,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read the tile source list, if the run has one
    pub fn load_tile(&self) -> Result<Option<TileSourceList>> {
        self.tile
            .as_ref()
            .map(|tile| TileSourceList::load(&tile.source_list))
            .transpose()
    }

    /// Freeze the configuration into a run plan
    ///
    /// Without explicit levels, a tile run uses the exposure and chip levels
    /// of its source list.
    pub fn build_plan(&self, tile: Option<&TileSourceList>) -> Result<RunPlan> {
        let mut builder = RunPlanBuilder::new(self.base_seed);

        if self.levels.is_empty() {
            if let Some(list) = tile {
                for level in list.hierarchy_levels() {
                    builder = builder.level(level.name, level.cardinality);
                }
            }
        }
        for level in &self.levels {
            builder = builder.level(level.name.clone(), level.count.to_cardinality(tile)?);
        }

        builder = builder.objects(self.objects.level, self.objects.count.to_cardinality(tile)?);
        if let Some(group_level) = self.group_level {
            builder = builder.group_level(group_level);
        }
        if let Some(rules) = &self.seed_rules {
            builder = builder.seed_rules(rules.clone());
        }
        for param in &self.meta_params {
            builder = builder.meta_param(param.clone());
        }

        builder.border_arcsec(self.border_arcsec).build()
    }

    /// WCS service described by the focal plane section, checked against `plan`
    ///
    /// # Errors
    /// * `Configuration` - invalid pointings or layout, fewer pointings than
    ///   exposures, or more chips per exposure than the layout holds
    pub fn wcs_service(&self, plan: &RunPlan) -> Result<Option<Arc<dyn WcsService>>> {
        let Some(focal_plane) = &self.focal_plane else {
            return Ok(None);
        };

        let pointings = focal_plane
            .pointings_deg
            .iter()
            .map(|&(ra, dec)| {
                let point = SkyPoint::from_degrees(ra, dec);
                if point.is_finite() && dec.abs() <= 90.0 {
                    Ok(point)
                } else {
                    Err(BuildError::config(format!("invalid pointing ({ra}, {dec})")))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let array = focal_plane.layout.to_array();
        if array.chip_count() == 0 {
            return Err(BuildError::config("focal plane has no chips"));
        }
        if !(array.pixel_scale_arcsec.is_finite() && array.pixel_scale_arcsec > 0.0) {
            return Err(BuildError::config(format!(
                "pixel scale must be positive, got {}",
                array.pixel_scale_arcsec
            )));
        }

        let service = FocalPlaneService::new(array, pointings, focal_plane.exposure_level);
        service.validate(plan.hierarchy())?;
        Ok(Some(Arc::new(service)))
    }
}
