//! CSV task manifest and per-group summaries
//!
//! The manifest records, for every object of every task, where it sits in the
//! hierarchy and which seeds it was given, so two runs can be compared line by
//! line for reproducibility.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::enumerator::BuildTask;
use crate::error::Result;
use crate::focal_plane::GroupGeometry;

/// Manifest column names, in order
pub const MANIFEST_COLUMNS: [&str; 8] = [
    "task",
    "indices",
    "obj_num",
    "local_obj",
    "per_object_seed",
    "group_seed",
    "top_level_seed",
    "kept",
];

/// Thread-safe CSV writer for task manifests
#[derive(Debug, Clone)]
pub struct TaskManifest {
    file: Arc<Mutex<File>>,
}

impl TaskManifest {
    /// Create the file and write the header
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = File::create(path)?;
        writeln!(file, "{}", MANIFEST_COLUMNS.join(","))?;
        Ok(TaskManifest {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Write one row per object of `task`
    ///
    /// `skip` is an optional skip mask from containment pruning; objects are
    /// marked kept when it is absent. Rows of one task are written together.
    pub fn write_task(&self, task: &BuildTask, skip: Option<&[bool]>) -> Result<()> {
        let mut rows = String::new();
        for (k, seeds) in task.objects.iter().enumerate() {
            let kept = !skip.and_then(|mask| mask.get(k).copied()).unwrap_or(false);
            // Writing into a String cannot fail
            let _ = writeln!(
                rows,
                "{},{},{},{},{},{},{},{}",
                task.number(),
                task.index,
                seeds.obj_num,
                seeds.local,
                seeds.triple.per_object,
                seeds.triple.group_repeating,
                seeds.triple.top_level,
                kept
            );
        }

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(rows.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct GroupSummary {
    group: usize,
    first_task: usize,
    top_level_seed: u64,
    scalars: BTreeMap<String, f64>,
}

/// Write the named scalars of every group as a JSON array
pub fn write_group_summaries(path: &Path, groups: &[Arc<GroupGeometry>]) -> Result<()> {
    let summaries: Vec<GroupSummary> = groups
        .iter()
        .map(|g| GroupSummary {
            group: g.group(),
            first_task: g.first_task(),
            top_level_seed: g.top_level_seed(),
            scalars: g.scalars(),
        })
        .collect();
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &summaries)?;
    Ok(())
}
