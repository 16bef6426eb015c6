//! geolife2shp cli - Staypoints, places and triplegs from the GeoLife dataset

use std::fs;

use argopt::{cmd_group, subcmd};
use log::LevelFilter;
use mongodb::sync::Client;
use serde::Deserialize;
use simple_logger::SimpleLogger;

use geolife2shp::export::gpx_file::GpxSink;
use geolife2shp::export::mongo::MongoDbSink;
use geolife2shp::export::shp::ShapefileSink;
use geolife2shp::export::sqlite::SqliteStore;
use geolife2shp::{ExportOptions, ExtractionOptions, MovementSink};

/// CLI of geolife2shp - Convert the GeoLife trajectories into movement features
#[cmd_group(commands = [shp, sqlite, gpx, mongo])]
fn main() -> Result<(), String> {}

/// Export the movement features to shapefiles
#[subcmd]
fn shp(
    /// GeoLife data folder, with one folder per user
    data_root: String,
    /// Destination folder of the shapefiles
    destination: String,
    /// Thresholds and export configuration. Default: .geolife2shp.yaml, ~/.geolife2shp.yaml
    #[opt(long)]
    config: Option<String>,
    /// Debug output
    #[opt(short, long)]
    verbose: bool,
) -> Result<(), String> {
    init_logger(verbose)?;
    let conf = load_configs(config);

    let mut sink = ShapefileSink::new(destination, conf.export.clone());
    run(&data_root, &conf, &mut sink)
}

/// Store the movement features in a SQLite database
#[subcmd]
fn sqlite(
    /// GeoLife data folder, with one folder per user
    data_root: String,
    /// SQLite database file, created when missing
    database: String,
    /// Thresholds and export configuration. Default: .geolife2shp.yaml, ~/.geolife2shp.yaml
    #[opt(long)]
    config: Option<String>,
    /// Debug output
    #[opt(short, long)]
    verbose: bool,
) -> Result<(), String> {
    init_logger(verbose)?;
    let conf = load_configs(config);

    let mut store = SqliteStore::connect(database)?;
    run(&data_root, &conf, &mut store)
}

/// Export the triplegs and staypoints to a GPX file
#[subcmd]
fn gpx(
    /// GeoLife data folder, with one folder per user
    data_root: String,
    /// GPX path file destination
    destination: String,
    /// Thresholds and export configuration. Default: .geolife2shp.yaml, ~/.geolife2shp.yaml
    #[opt(long)]
    config: Option<String>,
    /// Debug output
    #[opt(short, long)]
    verbose: bool,
) -> Result<(), String> {
    init_logger(verbose)?;
    let conf = load_configs(config);

    let mut sink = GpxSink::new(destination);
    run(&data_root, &conf, &mut sink)
}

/// Store the movement features in a mongodb database
#[subcmd]
fn mongo(
    /// GeoLife data folder, with one folder per user
    data_root: String,
    /// Mongo connection string, with the database
    connection: String,
    /// Thresholds and export configuration. Default: .geolife2shp.yaml, ~/.geolife2shp.yaml
    #[opt(long)]
    config: Option<String>,
    /// Debug output
    #[opt(short, long)]
    verbose: bool,
) -> Result<(), String> {
    init_logger(verbose)?;
    let conf = load_configs(config);

    let client = Client::with_uri_str(connection)
        .map_err(|e| format!("Failed on connect: {0}", e.to_string()))?;
    let db = client
        .default_database()
        .ok_or("Default database not provided")?;

    let mut sink = MongoDbSink::new(db);
    run(&data_root, &conf, &mut sink)
}

fn run<S: MovementSink>(data_root: &str, conf: &Configs, sink: &mut S) -> Result<(), String> {
    let movement = geolife2shp::import(data_root, &conf.extraction())?;
    sink.export(&movement)
}

fn init_logger(verbose: bool) -> Result<(), String> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|e| format!("Failed on init the logger: {}", e.to_string()))
}

/// Load the current config
fn load_configs(provided: Option<String>) -> Configs {
    let mut options = vec![];

    if let Some(sprovided) = provided {
        options.push(sprovided);
    }

    options.push(".geolife2shp.yaml".to_string());

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.geolife2shp.yaml", shome));
        }
    }

    for fi in options {
        if let Ok(s) = fs::read_to_string(&fi) {
            match serde_yaml::from_str::<Configs>(&s) {
                Ok(conf) => {
                    log::info!("Configuration loaded from {}", fi);
                    return conf;
                }
                Err(e) => log::warn!("Invalid configuration {}: {}", fi, e),
            }
        }
    }

    log::debug!("No configuration found, using the defaults");

    Configs::default()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct Configs {
    pub staypoints: geolife2shp::StaypointOptions,
    pub places: geolife2shp::PlaceOptions,
    pub triplegs: geolife2shp::TriplegOptions,
    pub export: ExportOptions,
}

impl Configs {
    fn extraction(&self) -> ExtractionOptions {
        ExtractionOptions {
            staypoints: self.staypoints.clone(),
            places: self.places.clone(),
            triplegs: self.triplegs.clone(),
        }
    }
}

#[test]
fn parse_configs() -> Result<(), String> {
    let yaml = "\nstaypoints:\nplaces:";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(Configs::default(), conf);
    assert_eq!(100.0, conf.staypoints.dist_threshold);
    assert_eq!(300, conf.staypoints.time_threshold);
    assert_eq!(100.0, conf.places.epsilon);
    assert_eq!(1, conf.places.num_samples);
    assert_eq!(None, conf.triplegs.gap_threshold);
    assert!(!conf.export.places);
    assert!(conf.export.verify);

    let yaml = "\nstaypoints:\n  time_threshold: 600\ntriplegs:\n  gap_threshold: 900\nexport:\n  places: true";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(100.0, conf.staypoints.dist_threshold);
    assert_eq!(600, conf.staypoints.time_threshold);
    assert_eq!(Some(900), conf.triplegs.gap_threshold);
    assert!(conf.export.places);
    assert!(conf.export.verify);

    Ok(())
}
