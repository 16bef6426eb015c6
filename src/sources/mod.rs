//! Trajectory sources API

use crate::UserTrajectory;

/// Trajectory source
pub trait PositionsSource {
    /// Fetch the trajectories of every user found by the source
    fn fetch(&mut self) -> Result<Vec<UserTrajectory>, String>;
}

pub(crate) mod geolife;
pub(crate) mod plt_file;

pub use geolife::GeolifeSource;
pub use plt_file::{PltSource, PLT_HEADER_LINES};
