//! Staypoint detection

use geo::geometry::{MultiPoint, Point};
use geo::{Centroid, HaversineDistance};
use time::{Duration, OffsetDateTime};

use super::position::PositionFix;
use super::{by_user, StaypointOptions};

/// A dwell: the user stayed around `geom` between the two times
#[derive(Clone, Debug, PartialEq)]
pub struct Staypoint {
    pub id: usize,
    pub user_id: i64,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    /// Mean of the member fixes
    pub geom: Point,
    /// Mean elevation of the member fixes, meters
    pub elevation: f64,
    pub place_id: Option<usize>,
}

/// Sliding window detection, tags the member fixes with their staypoint id
///
/// From an anchor fix, the window grows until a fix is farther than
/// `dist_threshold`. If that fix is more than `time_threshold` after the
/// anchor, the window (without it) is a staypoint. Either way the next anchor
/// is that fix.
pub fn extract_staypoints(fixes: &mut [PositionFix], op: &StaypointOptions) -> Vec<Staypoint> {
    let mut staypoints = vec![];
    let min_duration = Duration::seconds(op.time_threshold);

    for (user_id, idx) in by_user(fixes) {
        let n = idx.len();
        let mut i = 0;

        while i < n {
            let anchor = &fixes[idx[i]];
            let leaving = (i + 1..n)
                .find(|&j| anchor.geom.haversine_distance(&fixes[idx[j]].geom) > op.dist_threshold);

            let j = match leaving {
                Some(j) => j,
                // Never left the anchor before the end of the data
                None => break,
            };

            let started_at = anchor.tracked_at;
            let finished_at = fixes[idx[j]].tracked_at;

            if finished_at - started_at > min_duration {
                let members = &idx[i..j];
                let id = staypoints.len();

                let points: MultiPoint = members.iter().map(|&k| fixes[k].geom).collect();
                let geom = points.centroid().unwrap_or(fixes[idx[i]].geom);
                let elevation =
                    members.iter().map(|&k| fixes[k].elevation).sum::<f64>() / members.len() as f64;

                for &k in members {
                    fixes[k].staypoint_id = Some(id);
                }

                staypoints.push(Staypoint {
                    id,
                    user_id,
                    started_at,
                    finished_at,
                    geom,
                    elevation,
                    place_id: None,
                });
            }

            i = j;
        }
    }

    staypoints
}
