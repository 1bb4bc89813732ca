use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::aggregate::{AggregatedAirport, LoungeItem};

const TEMPLATE: &str = include_str!("map_template.html");

/// Marker payload consumed by the page script.
#[derive(Debug, Serialize)]
struct Point<'a> {
    lat: f64,
    lon: f64,
    iata: &'a str,
    name: &'a str,
    municipality: &'a str,
    country: &'a str,
    lounge_count: usize,
    lounges: &'a [LoungeItem],
}

fn points<'a>(pins: &[&'a AggregatedAirport]) -> Vec<Point<'a>> {
    pins.iter()
        .filter_map(|a| {
            let group = a.lounges.as_ref()?;
            Some(Point {
                lat: a.airport.latitude_deg?,
                lon: a.airport.longitude_deg?,
                iata: &a.airport.iata_code,
                name: &a.airport.name,
                municipality: &a.airport.municipality,
                country: &a.airport.iso_country,
                lounge_count: group.lounge_count,
                lounges: &group.items,
            })
        })
        .collect()
}

/// Standalone Leaflet page with one clustered marker per pin.
pub fn render(pins: &[&AggregatedAirport]) -> Result<String> {
    let points = points(pins);
    // "</" would end the inline script early
    let json = serde_json::to_string(&points)?.replace("</", "<\\/");
    Ok(TEMPLATE
        .replace("__PIN_COUNT__", &points.len().to_string())
        .replace("__POINTS__", &json))
}

pub fn write_map(path: &Path, pins: &[&AggregatedAirport]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let html = render(pins)?;
    fs::write(path, html).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
