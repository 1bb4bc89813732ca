use std::path::Path;

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::aggregate::AggregatedAirport;
use crate::airports::AirportRef;
use crate::types::{AirportSummary, LoungeRecord};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Drop and recreate every output table; each run replaces the previous one.
pub fn reset_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS world_airports;
        DROP TABLE IF EXISTS lounge_airports;
        DROP TABLE IF EXISTS lounges;
        DROP TABLE IF EXISTS world_airports_with_lounges;
        ",
    )?;
    init_schema(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS world_airports (
            {AIRPORT_COLUMNS}
        );
        CREATE INDEX IF NOT EXISTS idx_world_iata ON world_airports(iata_code);

        CREATE TABLE IF NOT EXISTS lounge_airports (
            id               INTEGER PRIMARY KEY,
            airport_url      TEXT NOT NULL,
            airport_slug     TEXT,
            country_slug     TEXT,
            airport_name     TEXT,
            airport_title    TEXT,
            airport_iata     TEXT,
            lounge_count     INTEGER NOT NULL DEFAULT 0,
            non_lounge_count INTEGER NOT NULL DEFAULT 0,
            total            INTEGER NOT NULL DEFAULT 0,
            error            TEXT
        );

        CREATE TABLE IF NOT EXISTS lounges (
            id                     INTEGER PRIMARY KEY,
            airport_url            TEXT NOT NULL,
            airport_slug           TEXT,
            country_slug           TEXT,
            airport_name           TEXT,
            airport_title          TEXT,
            experience_type        TEXT NOT NULL CHECK(experience_type IN ('LOUNGE','DINING','RELAX')),
            experience_name        TEXT NOT NULL,
            experience_detail_url  TEXT NOT NULL,
            experience_detail_slug TEXT NOT NULL,
            iata_code              TEXT,
            lounge_image_url       TEXT,
            lounge_title           TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_lounges_iata ON lounges(iata_code);

        CREATE TABLE IF NOT EXISTS world_airports_with_lounges (
            {AIRPORT_COLUMNS},
            lounge_count      INTEGER NOT NULL DEFAULT 0,
            lounge_names      TEXT,
            lounge_items_json TEXT,
            has_lounge        BOOLEAN NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_joined_iata ON world_airports_with_lounges(iata_code);
        "
    ))?;
    Ok(())
}

const AIRPORT_COLUMNS: &str = "
            id                TEXT,
            ident             TEXT,
            type              TEXT,
            name              TEXT,
            latitude_deg      REAL,
            longitude_deg     REAL,
            elevation_ft      REAL,
            continent         TEXT,
            iso_country       TEXT,
            iso_region        TEXT,
            municipality      TEXT,
            scheduled_service TEXT,
            gps_code          TEXT,
            iata_code         TEXT,
            local_code        TEXT,
            home_link         TEXT,
            wikipedia_link    TEXT,
            keywords          TEXT";

const AIRPORT_INSERT_COLUMNS: &str = "id, ident, type, name, latitude_deg, longitude_deg, elevation_ft,
     continent, iso_country, iso_region, municipality, scheduled_service, gps_code,
     iata_code, local_code, home_link, wikipedia_link, keywords";

fn airport_values(a: &AirportRef) -> Vec<&dyn ToSql> {
    rusqlite::params![
        a.id, a.ident, a.kind, a.name, a.latitude_deg, a.longitude_deg, a.elevation_ft,
        a.continent, a.iso_country, a.iso_region, a.municipality, a.scheduled_service,
        a.gps_code, a.iata_code, a.local_code, a.home_link, a.wikipedia_link, a.keywords,
    ]
    .to_vec()
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

// ── Saving ──

pub fn save_world_airports(conn: &Connection, rows: &[AirportRef]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO world_airports ({AIRPORT_INSERT_COLUMNS}) VALUES ({})",
            placeholders(18)
        ))?;
        for a in rows {
            count += stmt.execute(airport_values(a).as_slice())?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn save_lounge_airports(conn: &Connection, rows: &[AirportSummary]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO lounge_airports
             (airport_url, airport_slug, country_slug, airport_name, airport_title,
              airport_iata, lounge_count, non_lounge_count, total, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for s in rows {
            count += stmt.execute(rusqlite::params![
                s.airport_url, s.airport_slug, s.country_slug, s.airport_name, s.airport_title,
                s.airport_iata, s.lounge_count, s.non_lounge_count, s.total, s.error,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn save_lounges(conn: &Connection, rows: &[LoungeRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO lounges
             (airport_url, airport_slug, country_slug, airport_name, airport_title,
              experience_type, experience_name, experience_detail_url, experience_detail_slug,
              iata_code, lounge_image_url, lounge_title)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for r in rows {
            let e = &r.experience;
            count += stmt.execute(rusqlite::params![
                e.airport_url, e.airport_slug, e.country_slug, e.airport_name, e.airport_title,
                e.experience_type.as_str(), e.experience_name, e.experience_detail_url,
                e.experience_detail_slug, e.iata_code, r.lounge_image_url, r.lounge_title,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn save_joined(conn: &Connection, rows: &[AggregatedAirport]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO world_airports_with_lounges
             ({AIRPORT_INSERT_COLUMNS}, lounge_count, lounge_names, lounge_items_json, has_lounge)
             VALUES ({})",
            placeholders(22)
        ))?;
        for row in rows {
            let lounge_count = row.lounge_count();
            let names = row.lounges.as_ref().map(|g| g.lounge_names.clone());
            let items = row.lounges.as_ref().map(|g| g.items_json());
            let has_lounge = row.has_lounge();

            let mut values = airport_values(&row.airport);
            values.extend(rusqlite::params![lounge_count, names, items, has_lounge]);
            count += stmt.execute(values.as_slice())?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Stats ──

pub struct Stats {
    pub world_airports: usize,
    pub airports_scraped: usize,
    pub airport_errors: usize,
    pub lounges: usize,
    pub lounge_codes: usize,
    pub airports_with_lounges: usize,
    pub map_pins: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    Ok(Stats {
        world_airports: count("SELECT COUNT(*) FROM world_airports")?,
        airports_scraped: count("SELECT COUNT(*) FROM lounge_airports")?,
        airport_errors: count("SELECT COUNT(*) FROM lounge_airports WHERE error IS NOT NULL")?,
        lounges: count("SELECT COUNT(*) FROM lounges")?,
        lounge_codes: count("SELECT COUNT(DISTINCT iata_code) FROM lounges")?,
        airports_with_lounges: count(
            "SELECT COUNT(*) FROM world_airports_with_lounges WHERE has_lounge = 1",
        )?,
        map_pins: count(
            "SELECT COUNT(*) FROM world_airports_with_lounges
             WHERE has_lounge = 1 AND latitude_deg IS NOT NULL AND longitude_deg IS NOT NULL",
        )?,
    })
}

pub struct TopAirport {
    pub iata_code: String,
    pub name: String,
    pub lounge_count: usize,
}

/// Airports with the most lounges, busiest first.
pub fn fetch_top_airports(conn: &Connection, limit: usize) -> Result<Vec<TopAirport>> {
    let mut stmt = conn.prepare(
        "SELECT iata_code, COALESCE(name, ''), lounge_count
         FROM world_airports_with_lounges
         WHERE has_lounge = 1
         ORDER BY lounge_count DESC, iata_code
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(TopAirport {
                iata_code: row.get(0)?,
                name: row.get(1)?,
                lounge_count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
