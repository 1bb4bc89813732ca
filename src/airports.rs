use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fetch::Fetcher;

pub const DEFAULT_AIRPORTS_CSV_URL: &str = "https://ourairports.com/data/airports.csv";
const DOWNLOAD_TIMEOUT_SECS: u64 = 90;

/// One row of the OurAirports reference table. Extra columns are ignored and
/// missing ones stay empty; coordinates that do not parse become `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirportRef {
    pub id: String,
    pub ident: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(alias = "lat", deserialize_with = "csv::invalid_option")]
    pub latitude_deg: Option<f64>,
    #[serde(alias = "lon", deserialize_with = "csv::invalid_option")]
    pub longitude_deg: Option<f64>,
    #[serde(alias = "elevation", deserialize_with = "csv::invalid_option")]
    pub elevation_ft: Option<f64>,
    pub continent: String,
    #[serde(alias = "country")]
    pub iso_country: String,
    #[serde(alias = "region")]
    pub iso_region: String,
    pub municipality: String,
    pub scheduled_service: String,
    pub gps_code: String,
    pub iata_code: String,
    pub local_code: String,
    pub home_link: String,
    pub wikipedia_link: String,
    pub keywords: String,
}

impl AirportRef {
    pub fn has_coordinates(&self) -> bool {
        self.latitude_deg.is_some() && self.longitude_deg.is_some()
    }
}

/// Where the reference table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AirportSource {
    Url(String),
    File(PathBuf),
}

impl AirportSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

pub async fn load(fetcher: &Fetcher, source: &AirportSource) -> Result<Vec<AirportRef>> {
    let airports = match source {
        AirportSource::Url(url) => {
            info!("Downloading airport reference from {}", url);
            let body = fetcher
                .get_text_with_timeout(url, Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
                .await
                .with_context(|| format!("downloading {url}"))?;
            parse_airports(body.as_bytes())?
        }
        AirportSource::File(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            parse_airports(file)?
        }
    };
    info!("Loaded {} reference airports", airports.len());
    Ok(airports)
}

/// Parse the reference CSV. Rows that fail to deserialize are skipped.
pub fn parse_airports<R: Read>(reader: R) -> Result<Vec<AirportRef>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut airports = Vec::new();
    let mut skipped = 0usize;
    for row in rdr.deserialize::<AirportRef>() {
        match row {
            Ok(mut airport) => {
                airport.iata_code = airport.iata_code.trim().to_uppercase();
                airports.push(airport);
            }
            Err(e) => {
                skipped += 1;
                if skipped <= 5 {
                    warn!("Skipping airport row: {}", e);
                }
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} unreadable airport rows", skipped);
    }
    Ok(airports)
}
