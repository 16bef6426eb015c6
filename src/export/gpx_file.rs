//! GPX export: triplegs as tracks, staypoints as waypoints

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use super::MovementSink;
use crate::{Movement, Staypoint, Tripleg};

pub struct GpxGenerator {
    pub tracks: Vec<Track>,
    pub waypoints: Vec<Waypoint>,
}

impl GpxGenerator {
    pub fn empty() -> Self {
        Self {
            tracks: vec![],
            waypoints: vec![],
        }
    }

    pub fn generate(self) -> Result<Gpx, String> {
        let mut gpx: Gpx = Default::default();
        gpx.version = GpxVersion::Gpx11;
        gpx.creator = Some("geolife2shp".to_string());
        gpx.tracks = self.tracks;
        gpx.waypoints = self.waypoints;

        Ok(gpx)
    }
}

/// One track of a single segment, timed at both ends
pub fn tripleg_track(tpl: &Tripleg) -> Track {
    let mut track = Track::new();
    track.name = Some(format!("tripleg {}", tpl.id));
    track.description = Some(format!("Tracked by `{}`", tpl.user_id));

    let mut segment = TrackSegment::new();
    for point in tpl.geom.points() {
        segment.points.push(Waypoint::new(point));
    }

    if let Some(first) = segment.points.first_mut() {
        first.time = Some(tpl.started_at.into());
    }
    if let Some(last) = segment.points.last_mut() {
        last.time = Some(tpl.finished_at.into());
    }

    track.segments.push(segment);

    track
}

pub fn staypoint_waypoint(spt: &Staypoint) -> Waypoint {
    let mut wp = Waypoint::new(spt.geom);
    wp.name = Some(format!("staypoint {}", spt.id));
    wp.description = Some(format!(
        "Stayed by `{}` until {}",
        spt.user_id,
        super::epoch_seconds(spt.finished_at)
    ));
    wp.time = Some(spt.started_at.into());
    wp.elevation = Some(spt.elevation);

    wp
}

/// Single GPX file sink
pub struct GpxSink {
    destination: PathBuf,
}

impl GpxSink {
    pub fn new<P: AsRef<Path>>(destination: P) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
        }
    }
}

impl MovementSink for GpxSink {
    fn export(&mut self, movement: &Movement) -> Result<(), String> {
        let mut gpx = GpxGenerator::empty();
        gpx.tracks = movement.triplegs.iter().map(tripleg_track).collect();
        gpx.waypoints = movement.staypoints.iter().map(staypoint_waypoint).collect();

        let doc = gpx.generate()?;

        let destination = File::create(&self.destination)
            .map_err(|e| format!("Failed on create the destination file: {}", e.to_string()))?;
        let mut writer = BufWriter::new(destination);
        gpx::write(&doc, &mut writer).map_err(|e| e.to_string())?;

        log::info!(
            "{} tracks and {} waypoints written to {}",
            movement.triplegs.len(),
            movement.staypoints.len(),
            self.destination.display()
        );

        Ok(())
    }
}
