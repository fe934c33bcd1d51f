use sky_geometry::GeometryError;
use thiserror::Error;

/// Errors raised while planning or enumerating build tasks.
///
/// Every variant is fatal for the run except `GroupGeometry`, which callers may
/// choose to report and skip when partial output is acceptable.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("task number {task} is out of range; the run has {total} tasks")]
    TaskOutOfRange { task: usize, total: usize },

    #[error("no cardinality for level '{level}' under parent {parent}")]
    MissingCardinality { level: String, parent: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("geometry for group {group} failed: {source}")]
    GroupGeometry {
        group: usize,
        #[source]
        source: GeometryError,
    },

    #[error("rendering task {task} failed: {message}")]
    Render { task: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    /// Shorthand for a `Configuration` error
    pub fn config(message: impl Into<String>) -> Self {
        BuildError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
