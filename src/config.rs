use std::path::{Path, PathBuf};

use crate::airports::AirportSource;
use crate::fetch::FetchConfig;
use crate::links::Site;

pub const DEFAULT_LISTING_URL: &str = "https://www.prioritypass.com/airport-lounges";
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Airport pages held in memory at once between fetch and extraction.
pub const CHUNK_SIZE: usize = 200;

pub const DB_FILE: &str = "lounges.sqlite";
pub const MAP_FILE: &str = "lounges_map.html";

/// Read-only run configuration, resolved from the command line and
/// `LOUNGE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub workers: usize,
    pub max_airports: Option<usize>,
    pub chunk_size: usize,
    pub listing_url: String,
    pub airports: AirportSource,
    pub site: Site,
    pub fetch: FetchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            workers: DEFAULT_WORKERS,
            max_airports: None,
            chunk_size: CHUNK_SIZE,
            listing_url: DEFAULT_LISTING_URL.to_string(),
            airports: AirportSource::Url(crate::airports::DEFAULT_AIRPORTS_CSV_URL.to_string()),
            site: Site::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Settings {
    pub fn data_dir(&self) -> PathBuf {
        self.output_dir.join("data")
    }

    pub fn map_dir(&self) -> PathBuf {
        self.output_dir.join("map")
    }

    pub fn db_path(&self) -> PathBuf {
        db_path_in(&self.output_dir)
    }

    pub fn map_path(&self) -> PathBuf {
        self.map_dir().join(MAP_FILE)
    }
}

/// Database location for an output directory; `stats` reads it without a full config.
pub fn db_path_in(output_dir: &Path) -> PathBuf {
    output_dir.join("data").join(DB_FILE)
}
