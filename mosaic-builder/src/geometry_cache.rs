//! Once-per-group geometry cache
//!
//! The first task to reach a group computes its geometry; every other task of
//! the group, on any thread, waits for and then shares that one result.
//! Failures are cached too, so every sibling reports the same error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use sky_geometry::GeometryError;

use crate::error::{BuildError, Result};
use crate::focal_plane::GroupGeometry;

type Slot = Arc<OnceCell<std::result::Result<Arc<GroupGeometry>, GeometryError>>>;

/// Group geometry keyed by top-level group index
#[derive(Debug, Default)]
pub struct GeometryCache {
    slots: Mutex<HashMap<usize, Slot>>,
    computed: AtomicUsize,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached geometry for `group`, computing it on first use
    ///
    /// The map lock is only held long enough to fetch the group's slot, so
    /// different groups compute concurrently while siblings of one group
    /// block on its slot.
    pub fn get_or_compute<F>(&self, group: usize, compute: F) -> Result<Arc<GroupGeometry>>
    where
        F: FnOnce() -> std::result::Result<GroupGeometry, GeometryError>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(group).or_default())
        };

        let outcome = slot.get_or_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            compute().map(Arc::new)
        });

        outcome
            .clone()
            .map_err(|source| BuildError::GroupGeometry { group, source })
    }

    /// Geometry for `group` if it has been computed successfully
    pub fn get(&self, group: usize) -> Option<Arc<GroupGeometry>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&group)
            .and_then(|slot| slot.get())
            .and_then(|outcome| outcome.as_ref().ok().cloned())
    }

    /// Every successfully computed group, ordered by group index
    pub fn groups(&self) -> Vec<Arc<GroupGeometry>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut groups: Vec<Arc<GroupGeometry>> = slots
            .values()
            .filter_map(|slot| slot.get())
            .filter_map(|outcome| outcome.as_ref().ok().cloned())
            .collect();
        groups.sort_by_key(|g| g.group());
        groups
    }

    /// Number of times a computation has actually run
    pub fn computed_count(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }
}
