use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::aggregate::AggregatedAirport;
use crate::airports::AirportRef;
use crate::config::Settings;
use crate::db;
use crate::types::{AirportSummary, LoungeRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sources {
    pub listing: String,
    pub airports: String,
}

/// Run summary written next to the data files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub generated_at_unix: i64,
    pub sources: Sources,
    pub airports_scraped: usize,
    pub lounges_retained: usize,
    pub map_pins: usize,
    pub urls_rechecked: usize,
    pub urls_valid_after_recheck: usize,
    pub urls_discarded: usize,
    pub notes: String,
}

/// Flat CSV row for a validated lounge.
#[derive(Serialize)]
struct LoungeRow<'a> {
    airport_url: &'a str,
    airport_slug: &'a str,
    country_slug: &'a str,
    airport_name: &'a str,
    airport_title: &'a str,
    experience_type: &'a str,
    experience_name: &'a str,
    experience_detail_url: &'a str,
    experience_detail_slug: &'a str,
    iata_code: Option<&'a str>,
    lounge_image_url: Option<&'a str>,
    lounge_title: Option<&'a str>,
}

impl<'a> From<&'a LoungeRecord> for LoungeRow<'a> {
    fn from(r: &'a LoungeRecord) -> Self {
        let e = &r.experience;
        Self {
            airport_url: &e.airport_url,
            airport_slug: &e.airport_slug,
            country_slug: &e.country_slug,
            airport_name: &e.airport_name,
            airport_title: &e.airport_title,
            experience_type: e.experience_type.as_str(),
            experience_name: &e.experience_name,
            experience_detail_url: &e.experience_detail_url,
            experience_detail_slug: &e.experience_detail_slug,
            iata_code: e.iata_code.as_deref(),
            lounge_image_url: r.lounge_image_url.as_deref(),
            lounge_title: r.lounge_title.as_deref(),
        }
    }
}

const AIRPORT_COLUMNS: [&str; 18] = [
    "id", "ident", "type", "name", "latitude_deg", "longitude_deg", "elevation_ft", "continent",
    "iso_country", "iso_region", "municipality", "scheduled_service", "gps_code", "iata_code",
    "local_code", "home_link", "wikipedia_link", "keywords",
];
const JOINED_EXTRA_COLUMNS: [&str; 4] = ["lounge_count", "lounge_names", "lounge_items_json", "has_lounge"];

/// Write every data file and the SQLite database under `<output>/data`.
pub fn write_all(
    settings: &Settings,
    world: &[AirportRef],
    summaries: &[AirportSummary],
    lounges: &[LoungeRecord],
    joined: &[AggregatedAirport],
    metadata: &Metadata,
) -> Result<()> {
    let data = settings.data_dir();
    fs::create_dir_all(&data).with_context(|| format!("creating {}", data.display()))?;
    fs::create_dir_all(settings.map_dir())?;

    write_serialized(&data.join("world_airports.csv"), world)?;
    write_serialized(&data.join("lounge_airports.csv"), summaries)?;
    let rows: Vec<LoungeRow> = lounges.iter().map(LoungeRow::from).collect();
    write_serialized(&data.join("lounges_only.csv"), &rows)?;
    write_joined(&data.join("world_airports_with_lounges.csv"), joined.iter())?;
    write_joined(
        &data.join("map_airports_with_lounges.csv"),
        joined.iter().filter(|a| a.is_pin()),
    )?;
    write_metadata(&data.join("metadata.json"), metadata)?;

    let conn = db::connect(&settings.db_path())?;
    db::reset_schema(&conn)?;
    db::save_world_airports(&conn, world)?;
    db::save_lounge_airports(&conn, summaries)?;
    db::save_lounges(&conn, lounges)?;
    db::save_joined(&conn, joined)?;

    info!(
        "Wrote {} airports, {} lounges, {} joined rows to {}",
        world.len(),
        lounges.len(),
        joined.len(),
        data.display()
    );
    Ok(())
}

fn write_serialized<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reference columns followed by the lounge columns. Written by hand since
/// the csv serializer cannot flatten the nested reference row.
fn write_joined<'a>(path: &Path, rows: impl Iterator<Item = &'a AggregatedAirport>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let columns: Vec<&str> = AIRPORT_COLUMNS.into_iter().chain(JOINED_EXTRA_COLUMNS).collect();
    wtr.write_record(&columns)?;

    for row in rows {
        let a = &row.airport;
        let group = row.lounges.as_ref();
        let mut record = vec![
            a.id.clone(),
            a.ident.clone(),
            a.kind.clone(),
            a.name.clone(),
            opt_num(a.latitude_deg),
            opt_num(a.longitude_deg),
            opt_num(a.elevation_ft),
            a.continent.clone(),
            a.iso_country.clone(),
            a.iso_region.clone(),
            a.municipality.clone(),
            a.scheduled_service.clone(),
            a.gps_code.clone(),
            a.iata_code.clone(),
            a.local_code.clone(),
            a.home_link.clone(),
            a.wikipedia_link.clone(),
            a.keywords.clone(),
        ];
        record.push(row.lounge_count().to_string());
        record.push(group.map(|g| g.lounge_names.clone()).unwrap_or_default());
        record.push(group.map(|g| g.items_json()).unwrap_or_default());
        record.push(row.has_lounge().to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

pub fn write_metadata(path: &Path, metadata: &Metadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
