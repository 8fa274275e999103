//! Format parameters for new HFS Plus volumes.

pub mod clump;
pub mod consts;
pub mod error;
pub mod fatal;
pub mod geometry;
pub mod overrides;
pub mod params;
pub mod probe;
pub mod report;

pub use error::{Error, Result};
pub use geometry::DriveGeometry;
pub use overrides::Overrides;
pub use params::{derive, Advisory, Derivation, Environment, VolumeParameters};
