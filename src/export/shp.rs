//! ESRI shapefile export
//!
//! Every timestamp goes out as a numeric column of epoch seconds. dBase field
//! names are limited to 10 bytes, hence `finished_a` and `staypt_id`. Each
//! table gets a `.prj` declaring WGS84 lon/lat coordinates.

use std::fs;
use std::path::{Path, PathBuf};

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::record::EsriShape;
use shapefile::{Point, Polyline, Writer};

use super::{epoch_seconds, ExportOptions, MovementSink};
use crate::{Movement, Place, PositionFix, Staypoint, Tripleg};

pub const POSITIONFIXES_FILE: &str = "geolife_positionfixes.shp";
pub const STAYPOINTS_FILE: &str = "geolife_staypoints.shp";
pub const PLACES_FILE: &str = "geolife_places.shp";
pub const TRIPLEGS_FILE: &str = "geolife_triplegs.shp";

/// WGS84 (EPSG:4326) in the ESRI WKT flavour
pub const WGS84_PRJ: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]";

/// Files making one shapefile table
const TABLE_EXTENSIONS: [&str; 4] = ["shp", "shx", "dbf", "prj"];

/// Numeric dBase column
struct Column {
    name: &'static str,
    length: u8,
    decimals: u8,
}

const fn real(name: &'static str) -> Column {
    Column {
        name,
        length: 24,
        decimals: 15,
    }
}

const fn integer(name: &'static str) -> Column {
    Column {
        name,
        length: 12,
        decimals: 0,
    }
}

const FIX_COLUMNS: [Column; 8] = [
    real("lat"),
    real("lon"),
    real("elevation"),
    integer("tracked_at"),
    integer("user_id"),
    real("accuracy"),
    integer("staypt_id"),
    integer("tripleg_id"),
];

const STAYPOINT_COLUMNS: [Column; 6] = [
    integer("id"),
    integer("user_id"),
    integer("started_at"),
    integer("finished_a"),
    real("elevation"),
    integer("place_id"),
];

const PLACE_COLUMNS: [Column; 3] = [integer("id"), integer("user_id"), integer("n_spts")];

const TRIPLEG_COLUMNS: [Column; 4] = [
    integer("id"),
    integer("user_id"),
    integer("started_at"),
    integer("finished_a"),
];

/// Shapefiles written into one directory
pub struct ShapefileSink {
    destination: PathBuf,
    options: ExportOptions,
}

impl ShapefileSink {
    pub fn new<P: AsRef<Path>>(destination: P, options: ExportOptions) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
            options,
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.destination.join(file)
    }

    pub fn write_positionfixes(&self, fixes: &[PositionFix]) -> Result<(), String> {
        let rows = fixes.iter().map(|fix| {
            let shape = Point::new(fix.lon(), fix.lat());
            let record = record(vec![
                ("lat", Some(fix.lat())),
                ("lon", Some(fix.lon())),
                ("elevation", Some(fix.elevation)),
                ("tracked_at", Some(epoch_seconds(fix.tracked_at) as f64)),
                ("user_id", Some(fix.user_id as f64)),
                ("accuracy", fix.accuracy),
                ("staypt_id", fix.staypoint_id.map(|v| v as f64)),
                ("tripleg_id", fix.tripleg_id.map(|v| v as f64)),
            ]);
            (shape, record)
        });

        write_table(&self.path(POSITIONFIXES_FILE), &FIX_COLUMNS, rows)
    }

    pub fn write_staypoints(&self, staypoints: &[Staypoint]) -> Result<(), String> {
        let rows = staypoints.iter().map(|spt| {
            let shape = Point::new(spt.geom.x(), spt.geom.y());
            let record = record(vec![
                ("id", Some(spt.id as f64)),
                ("user_id", Some(spt.user_id as f64)),
                ("started_at", Some(epoch_seconds(spt.started_at) as f64)),
                ("finished_a", Some(epoch_seconds(spt.finished_at) as f64)),
                ("elevation", Some(spt.elevation)),
                ("place_id", spt.place_id.map(|v| v as f64)),
            ]);
            (shape, record)
        });

        write_table(&self.path(STAYPOINTS_FILE), &STAYPOINT_COLUMNS, rows)
    }

    pub fn write_places(&self, places: &[Place]) -> Result<(), String> {
        let rows = places.iter().map(|plc| {
            let shape = Point::new(plc.center.x(), plc.center.y());
            let record = record(vec![
                ("id", Some(plc.id as f64)),
                ("user_id", Some(plc.user_id as f64)),
                ("n_spts", Some(plc.staypoint_count as f64)),
            ]);
            (shape, record)
        });

        write_table(&self.path(PLACES_FILE), &PLACE_COLUMNS, rows)
    }

    pub fn write_triplegs(&self, triplegs: &[Tripleg]) -> Result<(), String> {
        let rows = triplegs.iter().map(|tpl| {
            let points = tpl.geom.points().map(|p| Point::new(p.x(), p.y())).collect();
            let shape = Polyline::new(points);
            let record = record(vec![
                ("id", Some(tpl.id as f64)),
                ("user_id", Some(tpl.user_id as f64)),
                ("started_at", Some(epoch_seconds(tpl.started_at) as f64)),
                ("finished_a", Some(epoch_seconds(tpl.finished_at) as f64)),
            ]);
            (shape, record)
        });

        write_table(&self.path(TRIPLEGS_FILE), &TRIPLEG_COLUMNS, rows)
    }

    /// Shapes and attributes of a points shapefile
    pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<(Point, Record)>, String> {
        let path = path.as_ref();

        shapefile::read_as::<_, Point, Record>(path)
            .map_err(|e| format!("Failed on read {}: {}", path.display(), e.to_string()))
    }

    /// Read the staypoints table back and compare its size to what was written
    pub fn verify_staypoints(&self, expected: usize) -> Result<(), String> {
        let path = self.path(STAYPOINTS_FILE);

        let found = if path.exists() {
            Self::read_points(&path)?.len()
        } else {
            0
        };
        log::info!("{} staypoints read back", found);

        if found != expected {
            return Err(format!("{} staypoints written but {} read back", expected, found));
        }

        Ok(())
    }
}

impl MovementSink for ShapefileSink {
    fn export(&mut self, movement: &Movement) -> Result<(), String> {
        fs::create_dir_all(&self.destination).map_err(|e| {
            format!(
                "Failed on create the directory {}: {}",
                self.destination.display(),
                e.to_string()
            )
        })?;

        self.write_positionfixes(&movement.positionfixes)?;
        self.write_staypoints(&movement.staypoints)?;
        if self.options.places {
            self.write_places(&movement.places)?;
        } else {
            remove_table(&self.path(PLACES_FILE))?;
        }
        self.write_triplegs(&movement.triplegs)?;

        if self.options.verify {
            self.verify_staypoints(movement.staypoints.len())?;
        }

        Ok(())
    }
}

fn record(values: Vec<(&str, Option<f64>)>) -> Record {
    let mut record = Record::default();
    for (name, value) in values {
        record.insert(name.to_string(), FieldValue::Numeric(value));
    }

    record
}

fn write_table<S, I>(path: &Path, columns: &[Column], rows: I) -> Result<(), String>
where
    S: EsriShape,
    I: ExactSizeIterator<Item = (S, Record)>,
{
    remove_table(path)?;

    if rows.len() == 0 {
        log::warn!("Nothing to write in {}, skipped", path.display());
        return Ok(());
    }

    let mut table = TableWriterBuilder::new();
    for col in columns {
        let name = FieldName::try_from(col.name)
            .map_err(|e| format!("Invalid field name `{}`: {:?}", col.name, e))?;
        table = table.add_numeric_field(name, col.length, col.decimals);
    }

    let count = rows.len();
    let mut writer = Writer::from_path(path, table)
        .map_err(|e| format!("Failed on create {}: {}", path.display(), e.to_string()))?;

    for (shape, record) in rows {
        writer
            .write_shape_and_record(&shape, &record)
            .map_err(|e| format!("Failed on write {}: {}", path.display(), e.to_string()))?;
    }

    let prj = path.with_extension("prj");
    fs::write(&prj, WGS84_PRJ)
        .map_err(|e| format!("Failed on write {}: {}", prj.display(), e.to_string()))?;

    log::info!("{} rows written to {}", count, path.display());

    Ok(())
}

/// Delete what a previous export left for this table
fn remove_table(path: &Path) -> Result<(), String> {
    for ext in TABLE_EXTENSIONS {
        let file = path.with_extension(ext);
        if file.exists() {
            fs::remove_file(&file)
                .map_err(|e| format!("Failed on remove {}: {}", file.display(), e.to_string()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use shapefile::dbase::FieldValue;
    use shapefile::{Polyline, Shape};
    use time::macros::datetime;

    use super::{
        ShapefileSink, PLACES_FILE, POSITIONFIXES_FILE, STAYPOINTS_FILE, TRIPLEGS_FILE, WGS84_PRJ,
    };
    use crate::export::{ExportOptions, MovementSink};
    use crate::{extract_places, Movement, PlaceOptions, PositionFix, Staypoint};
    use geo::geometry::Point;

    fn staypoint(id: usize, lon: f64) -> Staypoint {
        Staypoint {
            id,
            user_id: 1,
            started_at: datetime!(2008-10-23 0:00 UTC),
            finished_at: datetime!(2008-10-23 0:10 UTC),
            geom: Point::new(lon, 39.98),
            elevation: 12.0,
            place_id: None,
        }
    }

    fn numeric(value: Option<&FieldValue>) -> Option<f64> {
        match value {
            Some(FieldValue::Numeric(v)) => *v,
            _ => None,
        }
    }

    #[test]
    fn positionfixes_round_trip() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let sink = ShapefileSink::new(dir.path(), ExportOptions::default());

        let fixes = vec![
            PositionFix::from_raw(3, 39.984702, 116.318417, 492.0, datetime!(2008-10-23 2:53:04 UTC)),
            PositionFix::from_raw(3, 39.984683, 116.31845, 492.0, datetime!(2008-10-23 2:53:10 UTC)),
        ];
        sink.write_positionfixes(&fixes)?;

        let rows = ShapefileSink::read_points(dir.path().join(POSITIONFIXES_FILE))?;
        assert_eq!(2, rows.len());

        let (shape, record) = &rows[0];
        assert!((shape.x - 116.318417).abs() < 1e-9);
        assert!((shape.y - 39.984702).abs() < 1e-9);
        assert_eq!(Some(1224730384.0), numeric(record.get("tracked_at")));
        assert_eq!(Some(3.0), numeric(record.get("user_id")));
        assert_eq!(None, numeric(record.get("accuracy")));

        Ok(())
    }

    #[test]
    fn movement_export() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let mut sink = ShapefileSink::new(dir.path().join("shp"), ExportOptions::default());

        let mut movement = Movement::default();
        movement.positionfixes = vec![PositionFix::basic(
            1,
            Point::new(116.3, 39.98),
            datetime!(2008-10-23 0:00 UTC),
        )];
        movement.staypoints = vec![Staypoint {
            id: 0,
            user_id: 1,
            started_at: datetime!(2008-10-23 0:00 UTC),
            finished_at: datetime!(2008-10-23 0:10 UTC),
            geom: Point::new(116.3, 39.98),
            elevation: 12.0,
            place_id: Some(0),
        }];

        sink.export(&movement)?;

        let spts = ShapefileSink::read_points(dir.path().join("shp").join(STAYPOINTS_FILE))?;
        assert_eq!(1, spts.len());
        let (_, record) = &spts[0];
        assert_eq!(Some(1224720000.0), numeric(record.get("started_at")));
        assert_eq!(Some(1224720600.0), numeric(record.get("finished_a")));

        // No triplegs and places export disabled
        assert!(!dir.path().join("shp").join(TRIPLEGS_FILE).exists());
        assert!(!dir.path().join("shp").join(PLACES_FILE).exists());

        for file in [POSITIONFIXES_FILE, STAYPOINTS_FILE] {
            let prj = dir.path().join("shp").join(file).with_extension("prj");
            let content = std::fs::read_to_string(&prj).map_err(|e| e.to_string())?;
            assert_eq!(WGS84_PRJ, content);
        }
        assert!(!dir.path().join("shp").join("geolife_triplegs.prj").exists());

        Ok(())
    }

    #[test]
    fn places_export() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let options = ExportOptions {
            places: true,
            verify: true,
        };
        let mut sink = ShapefileSink::new(dir.path(), options);

        let mut movement = Movement::default();
        movement.staypoints = vec![staypoint(0, 116.3000), staypoint(1, 116.3005), staypoint(2, 116.4)];
        movement.places = extract_places(&mut movement.staypoints, &PlaceOptions::default());

        sink.export(&movement)?;

        let places = ShapefileSink::read_points(dir.path().join(PLACES_FILE))?;
        assert_eq!(2, places.len());

        let (shape, record) = &places[0];
        assert!((shape.x - 116.30025).abs() < 1e-9);
        assert_eq!(Some(0.0), numeric(record.get("id")));
        assert_eq!(Some(2.0), numeric(record.get("n_spts")));
        assert_eq!(Some(1.0), numeric(places[1].1.get("n_spts")));

        let spts = ShapefileSink::read_points(dir.path().join(STAYPOINTS_FILE))?;
        assert_eq!(Some(1.0), numeric(spts[2].1.get("place_id")));
        assert!(dir.path().join("geolife_places.prj").exists());

        Ok(())
    }

    #[test]
    fn stale_tables_removed() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let options = ExportOptions {
            places: true,
            verify: true,
        };

        let mut first = Movement::default();
        first.staypoints = vec![staypoint(0, 116.3)];
        first.places = extract_places(&mut first.staypoints, &PlaceOptions::default());
        ShapefileSink::new(dir.path(), options).export(&first)?;
        assert!(dir.path().join(STAYPOINTS_FILE).exists());
        assert!(dir.path().join(PLACES_FILE).exists());

        // Same folder, nothing found this time and places not requested
        ShapefileSink::new(dir.path(), ExportOptions::default()).export(&Movement::default())?;

        for name in ["geolife_staypoints", "geolife_places"] {
            for ext in ["shp", "shx", "dbf", "prj"] {
                let file = dir.path().join(format!("{}.{}", name, ext));
                assert!(!file.exists(), "{} left behind", file.display());
            }
        }

        Ok(())
    }

    #[test]
    fn verify_counts_staypoints() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let sink = ShapefileSink::new(dir.path(), ExportOptions::default());

        // Nothing written yet
        sink.verify_staypoints(0)?;
        assert!(sink.verify_staypoints(1).is_err());

        sink.write_staypoints(&[staypoint(0, 116.3)])?;
        sink.verify_staypoints(1)?;

        let err = sink.verify_staypoints(2).err().unwrap_or_default();
        assert_eq!("2 staypoints written but 1 read back", err);

        Ok(())
    }

    #[test]
    fn triplegs_as_polylines() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let sink = ShapefileSink::new(dir.path(), ExportOptions::default());

        let tpl = crate::Tripleg {
            id: 4,
            user_id: 1,
            started_at: datetime!(2008-10-23 0:00 UTC),
            finished_at: datetime!(2008-10-23 0:05 UTC),
            geom: vec![(116.30, 39.98), (116.31, 39.98), (116.32, 39.99)].into(),
        };
        sink.write_triplegs(&[tpl])?;

        let mut reader = shapefile::Reader::from_path(dir.path().join(TRIPLEGS_FILE))
            .map_err(|e| e.to_string())?;
        let mut count = 0;
        for res in reader.iter_shapes_and_records() {
            let (shape, record) = res.map_err(|e| e.to_string())?;
            let line: Polyline = match shape {
                Shape::Polyline(line) => line,
                other => return Err(format!("Unexpected shape {:?}", other.shapetype())),
            };
            assert_eq!(3, line.parts()[0].len());
            assert_eq!(Some(4.0), numeric(record.get("id")));
            count += 1;
        }
        assert_eq!(1, count);

        Ok(())
    }
}
