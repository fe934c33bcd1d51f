//! sky-geometry - Spherical geometry for focal-plane footprints
//!
//! This crate provides the sky-side math used when building multi-chip
//! exposures and tiles, including:
//!
//! - **SkyPoint** - RA/Dec positions, unit vectors, great-circle offsets, triple products
//! - **Projection** - Gnomonic (tangent-plane) projection about a pointing
//! - **Footprint** - Pointing, RA/Dec box, tangent-plane bounds and radius of a set of corners
//! - **Containment** - Border-expanded spherical quadrilateral membership test
//!
//! Tangent-plane coordinates put +u toward increasing RA and +v toward north,
//! in arcseconds. This is the mirror image of GalSim's east-left convention;
//! see [`projection`].
//!
//! # Example
//!
//! ```text
//! use sky_geometry::{Footprint, SkyPoint};
//!
//! let corners = [
//!     SkyPoint::from_degrees(10.0, -10.0),
//!     SkyPoint::from_degrees(10.0, -9.0),
//!     SkyPoint::from_degrees(11.0, -10.0),
//!     SkyPoint::from_degrees(11.0, -9.0),
//! ];
//! let footprint = Footprint::from_corners(&corners)?;
//! println!("pointing = {}", footprint.pointing());
//! ```

pub mod bounds;
pub mod containment;
pub mod error;
pub mod footprint;
pub mod projection;
pub mod sky_point;
pub mod units;

// Re-export commonly used types
pub use bounds::{RaDecBounds, TangentBounds};
pub use containment::{Containment, DirectedEdge, SkyQuad, DEFAULT_BORDER_ARCSEC};
pub use error::GeometryError;
pub use footprint::Footprint;
pub use projection::GnomonicProjector;
pub use sky_point::{mean_direction, SkyPoint, SkyPointRandomizer};
pub use units::{Angle, AngleExt};
