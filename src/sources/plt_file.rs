//! GeoLife `.plt` file integration

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::PositionFix;

/// Lines of preamble before the first fix
pub const PLT_HEADER_LINES: usize = 6;

/// One `.plt` file of one user
pub struct PltSource<T>
where
    T: BufRead,
{
    rdr: T,
    user_id: i64,
}

impl PltSource<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P, user_id: i64) -> Result<Self, String> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            format!("Failed on open the file {}: {}", path.display(), e.to_string())
        })?;

        Ok(Self::new(BufReader::new(file), user_id))
    }
}

impl<T> PltSource<T>
where
    T: BufRead,
{
    pub fn new(rdr: T, user_id: i64) -> Self {
        Self { rdr, user_id }
    }

    /// Parse every fix of the file, the first malformed row aborts
    pub fn fetch(mut self) -> Result<Vec<PositionFix>, String> {
        let mut line = String::new();
        for n in 0..PLT_HEADER_LINES {
            line.clear();
            let read = self
                .rdr
                .read_line(&mut line)
                .map_err(|e| format!("Failed on read the header: {}", e.to_string()))?;
            if read == 0 {
                return Err(format!(
                    "File ended in the header, after {} of {} lines",
                    n, PLT_HEADER_LINES
                ));
            }
        }

        let mut csv = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(self.rdr);

        let mut fixes = vec![];
        let mut rec = StringRecord::new();
        loop {
            let more = csv
                .read_record(&mut rec)
                .map_err(|e| format!("Failed on read some row: {}", e.to_string()))?;
            if !more {
                break;
            }

            if rec.len() == 1 && rec[0].is_empty() {
                continue;
            }

            let line = rec.position().map(|p| p.line()).unwrap_or(0) + PLT_HEADER_LINES as u64;
            let fix = parse_row(self.user_id, &rec)
                .map_err(|e| format!("Error with line {} {:?}: {}", line, rec, e))?;

            fixes.push(fix);
        }

        Ok(fixes)
    }
}

/// lat, lon, 0, elevation (feet), days since 1899-12-30, date, time
fn parse_row(user_id: i64, row: &StringRecord) -> Result<PositionFix, String> {
    if row.len() != 7 {
        return Err(format!("Expected 7 fields, found {}", row.len()));
    }

    let lat = row[0]
        .parse::<f64>()
        .map_err(|e| format!("Invalid latitude format: {}", e.to_string()))?;
    let lon = row[1]
        .parse::<f64>()
        .map_err(|e| format!("Invalid longitude format: {}", e.to_string()))?;
    let elevation = row[3]
        .parse::<f64>()
        .map_err(|e| format!("Invalid elevation format: {}", e.to_string()))?;

    let stamp = format!("{} {}", &row[5], &row[6]);
    let tracked_at = PrimitiveDateTime::parse(
        &stamp,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .map_err(|e| format!("Failed on parse the time: {}", e.to_string()))?
    .assume_utc();

    Ok(PositionFix::from_raw(user_id, lat, lon, elevation, tracked_at))
}
