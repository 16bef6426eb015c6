//! Movement features generator API
//!
//! Derives staypoints, places and triplegs from a position fix table. Every
//! extraction runs per user, visiting the fixes in time order without
//! reordering the table itself.

use std::collections::BTreeMap;

use serde::Deserialize;

pub mod places;
pub mod position;
pub mod staypoints;
pub mod triplegs;


use places::Place;
use position::PositionFix;
use staypoints::Staypoint;
use triplegs::Tripleg;

/// Sliding window staypoint detection options
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StaypointOptions {
    /// Max distance, in meters, from the first fix of a staypoint
    pub dist_threshold: f64,
    /// Min dwell duration in seconds
    pub time_threshold: i64,
}

impl Default for StaypointOptions {
    fn default() -> Self {
        Self {
            dist_threshold: 100.0,
            time_threshold: 5 * 60,
        }
    }
}

/// DBSCAN place clustering options
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaceOptions {
    /// Neighbourhood radius in meters
    pub epsilon: f64,
    /// Staypoints, itself included, needed around a core staypoint
    pub num_samples: usize,
}

impl Default for PlaceOptions {
    fn default() -> Self {
        Self {
            epsilon: 100.0,
            num_samples: 1,
        }
    }
}

/// Tripleg generation options
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TriplegOptions {
    /// Split a leg when two fixes are more than this many seconds apart
    pub gap_threshold: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    pub staypoints: StaypointOptions,
    pub places: PlaceOptions,
    pub triplegs: TriplegOptions,
}

/// Everything the exporters write
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Movement {
    pub positionfixes: Vec<PositionFix>,
    pub staypoints: Vec<Staypoint>,
    pub places: Vec<Place>,
    pub triplegs: Vec<Tripleg>,
}

/// Run the staypoints, places and triplegs extraction over the fixes
pub fn extract(mut positionfixes: Vec<PositionFix>, op: &ExtractionOptions) -> Movement {
    let mut staypoints = staypoints::extract_staypoints(&mut positionfixes, &op.staypoints);
    log::info!(
        "{} staypoints from {} positionfixes",
        staypoints.len(),
        positionfixes.len()
    );

    let places = places::extract_places(&mut staypoints, &op.places);
    log::info!("{} places", places.len());

    let triplegs = triplegs::extract_triplegs(&mut positionfixes, &staypoints, &op.triplegs);
    log::info!("{} triplegs", triplegs.len());

    Movement {
        positionfixes,
        staypoints,
        places,
        triplegs,
    }
}

/// Indexes of the fixes of each user, sorted by time
pub(crate) fn by_user(fixes: &[PositionFix]) -> BTreeMap<i64, Vec<usize>> {
    let mut users: BTreeMap<i64, Vec<usize>> = BTreeMap::new();

    for (i, fix) in fixes.iter().enumerate() {
        users.entry(fix.user_id).or_insert(vec![]).push(i);
    }

    for idx in users.values_mut() {
        idx.sort_by_key(|&i| fixes[i].tracked_at);
    }

    users
}
