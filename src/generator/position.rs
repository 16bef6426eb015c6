//! Position fix definition and table assembly

use geo::geometry::Point;
use time::OffsetDateTime;

/// Feet to meters, GeoLife elevations are recorded in feet
pub const FEET2METER: f64 = 0.3048;

/// One recorded GPS observation
#[derive(Clone, Debug, PartialEq)]
pub struct PositionFix {
    pub user_id: i64,
    pub tracked_at: OffsetDateTime,
    /// x = longitude, y = latitude
    pub geom: Point,
    /// Elevation in meters
    pub elevation: f64,
    pub accuracy: Option<f64>,
    pub staypoint_id: Option<usize>,
    pub tripleg_id: Option<usize>,
}

impl PositionFix {
    pub fn basic(user_id: i64, geom: Point, tracked_at: OffsetDateTime) -> Self {
        Self {
            user_id,
            tracked_at,
            geom,
            elevation: 0.0,
            accuracy: None,
            staypoint_id: None,
            tripleg_id: None,
        }
    }

    /// Build a fix from the raw dataset values, elevation still in feet
    pub fn from_raw(
        user_id: i64,
        lat: f64,
        lon: f64,
        elevation_feet: f64,
        tracked_at: OffsetDateTime,
    ) -> Self {
        let mut fix = Self::basic(user_id, Point::new(lon, lat), tracked_at);
        fix.elevation = elevation_feet * FEET2METER;

        fix
    }

    pub fn lat(&self) -> f64 {
        self.geom.y()
    }

    pub fn lon(&self) -> f64 {
        self.geom.x()
    }
}

/// All the fixes of one user, across every daily file
#[derive(Clone, Debug, PartialEq)]
pub struct UserTrajectory {
    pub user_id: i64,
    pub fixes: Vec<PositionFix>,
}

impl UserTrajectory {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            fixes: vec![],
        }
    }

    /// Concatenate a per-file table, keeping the file order
    pub fn append(&mut self, fixes: Vec<PositionFix>) -> Result<(), String> {
        if let Some(other) = fixes.iter().find(|f| f.user_id != self.user_id) {
            return Err(format!(
                "Fix of user {} can't be added to the trajectory of user {}",
                other.user_id, self.user_id
            ));
        }

        self.fixes.extend(fixes);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

/// Merge every user into a single table, with a null accuracy column
pub fn merge_users(users: Vec<UserTrajectory>) -> Vec<PositionFix> {
    let total = users.iter().map(|u| u.len()).sum();
    let mut fixes = Vec::with_capacity(total);

    for user in users {
        fixes.extend(user.fixes);
    }

    for fix in fixes.iter_mut() {
        fix.accuracy = None;
    }

    fixes
}
