//! Tripleg generation

use std::collections::BTreeMap;

use geo::geometry::{Coord, LineString};
use time::{Duration, OffsetDateTime};

use super::position::PositionFix;
use super::staypoints::Staypoint;
use super::{by_user, TriplegOptions};

/// Movement of a user between two staypoints
#[derive(Clone, Debug, PartialEq)]
pub struct Tripleg {
    pub id: usize,
    pub user_id: i64,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub geom: LineString,
}

/// Build the legs between each pair of consecutive staypoints of a user
///
/// A leg holds the fixes tracked from the `finished_at` of the staypoint it
/// leaves up to the `started_at` of the next one, both included. The last one
/// is the first fix of the next staypoint, so the legs and the staypoints are
/// connected without overlapping in time. Fixes before the first staypoint or
/// after the last one don't belong to any leg. Legs with less than two fixes
/// are dropped.
pub fn extract_triplegs(
    fixes: &mut [PositionFix],
    staypoints: &[Staypoint],
    op: &TriplegOptions,
) -> Vec<Tripleg> {
    let mut triplegs = vec![];
    let max_gap = op.gap_threshold.map(Duration::seconds);

    for fix in fixes.iter_mut() {
        fix.tripleg_id = None;
    }

    let mut stays: BTreeMap<i64, Vec<&Staypoint>> = BTreeMap::new();
    for spt in staypoints {
        stays.entry(spt.user_id).or_insert(vec![]).push(spt);
    }

    for (user_id, idx) in by_user(fixes) {
        let user_stays = match stays.get_mut(&user_id) {
            Some(s) => s,
            None => continue,
        };
        user_stays.sort_by_key(|s| s.started_at);

        for pair in user_stays.windows(2) {
            let (from, to) = (pair[0], pair[1]);

            let start = idx.partition_point(|&k| fixes[k].tracked_at < from.finished_at);
            let end = idx.partition_point(|&k| fixes[k].tracked_at <= to.started_at);
            if end <= start {
                continue;
            }

            for piece in split_on_gaps(fixes, &idx[start..end], max_gap) {
                close_leg(user_id, &piece, fixes, &mut triplegs);
            }
        }
    }

    triplegs
}

/// Break a time-ordered run wherever two fixes are more than `max_gap` apart
fn split_on_gaps(
    fixes: &[PositionFix],
    run: &[usize],
    max_gap: Option<Duration>,
) -> Vec<Vec<usize>> {
    let mut pieces = vec![];
    let mut current: Vec<usize> = vec![];

    for &k in run {
        if let (Some(&p), Some(max)) = (current.last(), max_gap) {
            if fixes[k].tracked_at - fixes[p].tracked_at > max {
                pieces.push(std::mem::take(&mut current));
            }
        }
        current.push(k);
    }
    pieces.push(current);

    pieces
}

fn close_leg(
    user_id: i64,
    points: &[usize],
    fixes: &mut [PositionFix],
    triplegs: &mut Vec<Tripleg>,
) {
    let (first, last) = match (points.first(), points.last()) {
        (Some(&f), Some(&l)) if points.len() >= 2 => (f, l),
        _ => return,
    };

    let id = triplegs.len();
    let coords: Vec<Coord> = points.iter().map(|&k| fixes[k].geom.0).collect();

    // The staypoint boundary fix keeps its staypoint only
    for &k in points {
        if fixes[k].staypoint_id.is_none() {
            fixes[k].tripleg_id = Some(id);
        }
    }

    triplegs.push(Tripleg {
        id,
        user_id,
        started_at: fixes[first].tracked_at,
        finished_at: fixes[last].tracked_at,
        geom: LineString::new(coords),
    });
}
