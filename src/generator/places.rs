//! Place clustering

use std::collections::{BTreeMap, VecDeque};

use geo::geometry::{MultiPoint, Point, Polygon};
use geo::{Centroid, ConvexHull, HaversineDistance};

use super::staypoints::Staypoint;
use super::PlaceOptions;

/// A location the user keeps coming back to
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    pub id: usize,
    pub user_id: i64,
    /// Mean of the member staypoints
    pub center: Point,
    /// Convex hull of the member staypoints, degenerate for one or two of them
    pub extent: Polygon,
    pub staypoint_count: usize,
}

/// DBSCAN over the staypoints of each user, tags the members with their place id
pub fn extract_places(staypoints: &mut [Staypoint], op: &PlaceOptions) -> Vec<Place> {
    let mut users: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, spt) in staypoints.iter().enumerate() {
        users.entry(spt.user_id).or_insert(vec![]).push(i);
    }

    let mut places = vec![];

    for (user_id, idx) in users {
        let points: Vec<Point> = idx.iter().map(|&i| staypoints[i].geom).collect();
        let labels = dbscan(&points, op.epsilon, op.num_samples);

        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (pos, label) in labels.iter().enumerate() {
            if let Some(cluster) = label {
                clusters.entry(*cluster).or_insert(vec![]).push(idx[pos]);
            }
        }

        for members in clusters.into_values() {
            let id = places.len();

            let mpoints: MultiPoint = members.iter().map(|&i| staypoints[i].geom).collect();
            let center = mpoints.centroid().unwrap_or(staypoints[members[0]].geom);
            let extent = mpoints.convex_hull();

            for &i in &members {
                staypoints[i].place_id = Some(id);
            }

            places.push(Place {
                id,
                user_id,
                center,
                extent,
                staypoint_count: members.len(),
            });
        }
    }

    places
}

/// Cluster label of each point, `None` for noise
fn dbscan(points: &[Point], epsilon: f64, min_samples: usize) -> Vec<Option<usize>> {
    let neighbours = |p: usize| -> Vec<usize> {
        (0..points.len())
            .filter(|&q| points[p].haversine_distance(&points[q]) <= epsilon)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut next_cluster = 0;

    for p in 0..points.len() {
        if visited[p] {
            continue;
        }
        visited[p] = true;

        let around = neighbours(p);
        if around.len() < min_samples {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[p] = Some(cluster);

        let mut queue: VecDeque<usize> = around.into();
        while let Some(q) = queue.pop_front() {
            if labels[q].is_none() {
                labels[q] = Some(cluster);
            }
            if visited[q] {
                continue;
            }
            visited[q] = true;

            let around_q = neighbours(q);
            if around_q.len() >= min_samples {
                queue.extend(around_q);
            }
        }
    }

    labels
}
