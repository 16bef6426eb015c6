//! Mongodb sink integration

use bson::{doc, Bson, DateTime, Document};
use geojson::{Geometry, Value};
use mongodb::sync::Database;

use super::MovementSink;
use crate::{Movement, Place, PositionFix, Staypoint, Tripleg};

/// MongoDB movement sink, one collection per table
pub struct MongoDbSink {
    db: Database,
}

impl MongoDbSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn replace(&self, name: &str, docs: Vec<Document>) -> Result<(), String> {
        let collection = self.db.collection::<Document>(name);
        collection
            .drop(None)
            .map_err(|e| format!("Failed on drop the {}: {}", name, e.to_string()))?;

        if docs.is_empty() {
            log::warn!("No {} to insert", name);
            return Ok(());
        }

        let count = docs.len();
        collection
            .insert_many(docs, None)
            .map_err(|e| format!("Failed on insert the {}: {}", name, e.to_string()))?;
        log::info!("{} {} inserted", count, name);

        Ok(())
    }
}

impl MovementSink for MongoDbSink {
    fn export(&mut self, movement: &Movement) -> Result<(), String> {
        self.replace(
            "positionfixes",
            movement
                .positionfixes
                .iter()
                .map(positionfix_doc)
                .collect::<Result<_, _>>()?,
        )?;
        self.replace(
            "staypoints",
            movement
                .staypoints
                .iter()
                .map(staypoint_doc)
                .collect::<Result<_, _>>()?,
        )?;
        self.replace(
            "places",
            movement.places.iter().map(place_doc).collect::<Result<_, _>>()?,
        )?;
        self.replace(
            "triplegs",
            movement
                .triplegs
                .iter()
                .map(tripleg_doc)
                .collect::<Result<_, _>>()?,
        )?;

        Ok(())
    }
}

fn optional_id(id: Option<usize>) -> Bson {
    match id {
        Some(v) => Bson::Int64(v as i64),
        None => Bson::Null,
    }
}

/// GeoJSON geometry as an embedded document
fn geometry_doc(value: Value) -> Result<Document, String> {
    bson::to_document(&Geometry::new(value))
        .map_err(|e| format!("Failed on encode the geometry: {}", e.to_string()))
}

fn positionfix_doc(fix: &PositionFix) -> Result<Document, String> {
    Ok(doc! {
        "user_id": fix.user_id,
        "tracked_at": DateTime::from_time_0_3(fix.tracked_at),
        "elevation": fix.elevation,
        "accuracy": fix.accuracy,
        "staypoint_id": optional_id(fix.staypoint_id),
        "tripleg_id": optional_id(fix.tripleg_id),
        "geom": geometry_doc(Value::from(&fix.geom))?,
    })
}

fn staypoint_doc(spt: &Staypoint) -> Result<Document, String> {
    Ok(doc! {
        "_id": spt.id as i64,
        "user_id": spt.user_id,
        "started_at": DateTime::from_time_0_3(spt.started_at),
        "finished_at": DateTime::from_time_0_3(spt.finished_at),
        "elevation": spt.elevation,
        "place_id": optional_id(spt.place_id),
        "geom": geometry_doc(Value::from(&spt.geom))?,
    })
}

fn place_doc(plc: &Place) -> Result<Document, String> {
    Ok(doc! {
        "_id": plc.id as i64,
        "user_id": plc.user_id,
        "staypoint_count": plc.staypoint_count as i64,
        "center": geometry_doc(Value::from(&plc.center))?,
        "extent": geometry_doc(Value::from(&plc.extent))?,
    })
}

fn tripleg_doc(tpl: &Tripleg) -> Result<Document, String> {
    Ok(doc! {
        "_id": tpl.id as i64,
        "user_id": tpl.user_id,
        "started_at": DateTime::from_time_0_3(tpl.started_at),
        "finished_at": DateTime::from_time_0_3(tpl.finished_at),
        "geom": geometry_doc(Value::from(&tpl.geom))?,
    })
}
