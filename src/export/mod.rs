//! Exporters API

use serde::Deserialize;
use time::OffsetDateTime;

use crate::Movement;

/// Destination of the extracted tables
pub trait MovementSink {
    fn export(&mut self, movement: &Movement) -> Result<(), String>;
}

/// What gets written besides the mandatory tables
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Also export the places table
    pub places: bool,
    /// Read the staypoints back once written
    pub verify: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            places: false,
            verify: true,
        }
    }
}

/// Whole seconds since the unix epoch, rounded down
pub fn epoch_seconds(time: OffsetDateTime) -> i64 {
    time.unix_timestamp_nanos().div_euclid(1_000_000_000) as i64
}

pub mod gpx_file;
#[cfg(feature = "mongo")]
pub mod mongo;
pub mod shp;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
pub mod tests {
    use time::macros::datetime;

    use super::epoch_seconds;

    #[test]
    fn known_epoch() {
        assert_eq!(1224730384, epoch_seconds(datetime!(2008-10-23 2:53:04 UTC)));
        assert_eq!(0, epoch_seconds(datetime!(1970-01-01 0:00 UTC)));
    }

    #[test]
    fn sub_second_rounds_down() {
        assert_eq!(1224730384, epoch_seconds(datetime!(2008-10-23 2:53:04.999 UTC)));
        assert_eq!(-1, epoch_seconds(datetime!(1969-12-31 23:59:59.5 UTC)));
    }

    #[test]
    fn offset_is_normalized() {
        assert_eq!(1224730384, epoch_seconds(datetime!(2008-10-23 10:53:04 +8)));
    }
}
