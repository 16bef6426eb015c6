//! geolife2shp - GeoLife trajectories to staypoints, places and triplegs

pub mod export;
mod generator;
pub mod sources;

pub use export::{epoch_seconds, ExportOptions, MovementSink};
pub use generator::places::{extract_places, Place};
pub use generator::position::{merge_users, PositionFix, UserTrajectory, FEET2METER};
pub use generator::staypoints::{extract_staypoints, Staypoint};
pub use generator::triplegs::{extract_triplegs, Tripleg};
pub use generator::{
    extract, ExtractionOptions, Movement, PlaceOptions, StaypointOptions, TriplegOptions,
};
pub use sources::{GeolifeSource, PltSource, PositionsSource};

/// Read the whole dataset under `root` and extract the movement features
pub fn import<P: AsRef<std::path::Path>>(
    root: P,
    op: &ExtractionOptions,
) -> Result<Movement, String> {
    let mut source = GeolifeSource::new(root);
    let users = source.fetch()?;

    let fixes = merge_users(users);
    log::info!("{} positionfixes loaded", fixes.len());

    Ok(extract(fixes, op))
}
