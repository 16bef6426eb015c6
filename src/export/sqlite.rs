//! SQLite relational store
//!
//! Each export replaces the content of the four tables. Timestamps are stored
//! as epoch seconds and geometries as WKT.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, ToSql, Transaction};
use wkt::ToWkt;

use super::{epoch_seconds, MovementSink};
use crate::{Movement, Place, PositionFix, Staypoint, Tripleg};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open, or create, the database file and make sure the tables exist
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| format!("Failed on open {}: {}", path.display(), e.to_string()))?;

        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed on open the database: {}", e.to_string()))?;

        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, String> {
        const QUERY: &str = include_str!("sql/create_db.sql");
        conn.execute_batch(QUERY)
            .map_err(|e| format!("Failed on create the tables: {}", e.to_string()))?;

        Ok(Self { conn })
    }

    /// Number of rows in one of the tables
    pub fn count(&self, table: &str) -> Result<i64, String> {
        if !["positionfixes", "staypoints", "places", "triplegs"].contains(&table) {
            return Err(format!("Unknown table {}", table));
        }

        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .map_err(|e| format!("Failed on count the {}: {}", table, e.to_string()))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl MovementSink for SqliteStore {
    fn export(&mut self, movement: &Movement) -> Result<(), String> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| format!("Failed on start the transaction: {}", e.to_string()))?;

        tx.execute_batch(include_str!("sql/clear_tables.sql"))
            .map_err(|e| format!("Failed on clear the tables: {}", e.to_string()))?;

        add_positionfixes(&tx, &movement.positionfixes)
            .map_err(|e| format!("Failed on insert the positionfixes: {}", e.to_string()))?;
        add_staypoints(&tx, &movement.staypoints)
            .map_err(|e| format!("Failed on insert the staypoints: {}", e.to_string()))?;
        add_places(&tx, &movement.places)
            .map_err(|e| format!("Failed on insert the places: {}", e.to_string()))?;
        add_triplegs(&tx, &movement.triplegs)
            .map_err(|e| format!("Failed on insert the triplegs: {}", e.to_string()))?;

        tx.commit()
            .map_err(|e| format!("Failed on commit: {}", e.to_string()))?;

        log::info!(
            "{} positionfixes, {} staypoints, {} places and {} triplegs stored",
            movement.positionfixes.len(),
            movement.staypoints.len(),
            movement.places.len(),
            movement.triplegs.len()
        );

        Ok(())
    }
}

fn add_positionfixes(tx: &Transaction, fixes: &[PositionFix]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(include_str!("sql/add_positionfix.sql"))?;

    for fix in fixes {
        stmt.execute([
            &fix.user_id as &dyn ToSql,
            &epoch_seconds(fix.tracked_at),
            &fix.lat(),
            &fix.lon(),
            &fix.elevation,
            &fix.accuracy,
            &fix.staypoint_id.map(|v| v as i64),
            &fix.tripleg_id.map(|v| v as i64),
            &fix.geom.wkt_string(),
        ])?;
    }

    Ok(())
}

fn add_staypoints(tx: &Transaction, staypoints: &[Staypoint]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(include_str!("sql/add_staypoint.sql"))?;

    for spt in staypoints {
        stmt.execute([
            &(spt.id as i64) as &dyn ToSql,
            &spt.user_id,
            &epoch_seconds(spt.started_at),
            &epoch_seconds(spt.finished_at),
            &spt.geom.y(),
            &spt.geom.x(),
            &spt.elevation,
            &spt.place_id.map(|v| v as i64),
            &spt.geom.wkt_string(),
        ])?;
    }

    Ok(())
}

fn add_places(tx: &Transaction, places: &[Place]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(include_str!("sql/add_place.sql"))?;

    for plc in places {
        stmt.execute([
            &(plc.id as i64) as &dyn ToSql,
            &plc.user_id,
            &plc.center.y(),
            &plc.center.x(),
            &(plc.staypoint_count as i64),
            &plc.center.wkt_string(),
            &plc.extent.wkt_string(),
        ])?;
    }

    Ok(())
}

fn add_triplegs(tx: &Transaction, triplegs: &[Tripleg]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(include_str!("sql/add_tripleg.sql"))?;

    for tpl in triplegs {
        stmt.execute([
            &(tpl.id as i64) as &dyn ToSql,
            &tpl.user_id,
            &epoch_seconds(tpl.started_at),
            &epoch_seconds(tpl.finished_at),
            &tpl.geom.wkt_string(),
        ])?;
    }

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use std::str::FromStr;

    use geo::geometry::{Geometry, LineString, Point};
    use time::macros::datetime;
    use wkt::Wkt;

    use super::SqliteStore;
    use crate::export::MovementSink;
    use crate::{extract_places, Movement, PlaceOptions, PositionFix, Staypoint, Tripleg};

    fn movement() -> Movement {
        let mut movement = Movement::default();
        movement.positionfixes = vec![
            PositionFix::basic(1, Point::new(116.3, 39.98), datetime!(2008-10-23 2:53:04 UTC)),
            PositionFix::basic(1, Point::new(116.31, 39.98), datetime!(2008-10-23 2:54:04 UTC)),
        ];
        // Three visits around the same spot
        movement.staypoints = [(116.3, 39.98), (116.3004, 39.98), (116.3002, 39.9803)]
            .iter()
            .enumerate()
            .map(|(id, &(x, y))| Staypoint {
                id,
                user_id: 1,
                started_at: datetime!(2008-10-23 2:00 UTC),
                finished_at: datetime!(2008-10-23 2:53:04 UTC),
                geom: Point::new(x, y),
                elevation: 40.0,
                place_id: None,
            })
            .collect();
        movement.places = extract_places(&mut movement.staypoints, &PlaceOptions::default());
        movement.triplegs = vec![Tripleg {
            id: 0,
            user_id: 1,
            started_at: datetime!(2008-10-23 2:53:04 UTC),
            finished_at: datetime!(2008-10-23 2:54:04 UTC),
            geom: vec![(116.3, 39.98), (116.31, 39.98)].into(),
        }];
        movement
    }

    fn parse(text: &str) -> Result<Geometry, String> {
        let wkt = Wkt::<f64>::from_str(text).map_err(|e| e.to_string())?;
        Geometry::try_from(wkt).map_err(|e| e.to_string())
    }

    #[test]
    fn store_movement() -> Result<(), String> {
        let mut store = SqliteStore::open_in_memory()?;
        store.export(&movement())?;

        assert_eq!(2, store.count("positionfixes")?);
        assert_eq!(3, store.count("staypoints")?);
        assert_eq!(1, store.count("places")?);
        assert_eq!(1, store.count("triplegs")?);

        let tracked_at: i64 = store
            .connection()
            .query_row("SELECT MIN(tracked_at) FROM positionfixes", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        assert_eq!(1224730384, tracked_at);

        let (places, members): (i64, i64) = store
            .connection()
            .query_row(
                "SELECT COUNT(DISTINCT place_id), COUNT(place_id) FROM staypoints",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| e.to_string())?;
        assert_eq!((1, 3), (places, members));

        Ok(())
    }

    #[test]
    fn geometries_as_wkt() -> Result<(), String> {
        let mut store = SqliteStore::open_in_memory()?;
        store.export(&movement())?;

        let geom: String = store
            .connection()
            .query_row("SELECT geom FROM triplegs", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        let line: LineString = vec![(116.3, 39.98), (116.31, 39.98)].into();
        assert_eq!(Geometry::LineString(line), parse(&geom)?);

        let geom: String = store
            .connection()
            .query_row(
                "SELECT geom FROM positionfixes ORDER BY tracked_at",
                [],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        assert_eq!(Geometry::Point(Point::new(116.3, 39.98)), parse(&geom)?);

        let extent: String = store
            .connection()
            .query_row("SELECT extent FROM places", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        assert!(matches!(parse(&extent)?, Geometry::Polygon(_)));

        Ok(())
    }

    #[test]
    fn export_replaces_rows() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
        let path = dir.path().join("geolife.sqlite");

        SqliteStore::connect(&path)?.export(&movement())?;
        SqliteStore::connect(&path)?.export(&movement())?;

        let store = SqliteStore::connect(&path)?;
        assert_eq!(2, store.count("positionfixes")?);
        assert_eq!(1, store.count("places")?);
        assert_eq!(1, store.count("triplegs")?);

        Ok(())
    }

    #[test]
    fn unknown_table() -> Result<(), String> {
        let store = SqliteStore::open_in_memory()?;
        assert!(store.count("users; DROP TABLE places").is_err());

        Ok(())
    }
}
