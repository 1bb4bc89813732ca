//! End-to-end run: listing, airport pages, detail validation, aggregation,
//! recheck of map URLs, exports.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::aggregate::{self, AggregatedAirport};
use crate::airports;
use crate::config::Settings;
use crate::export::{self, Metadata, Sources};
use crate::fetch::Fetcher;
use crate::links::{last_segment, Site};
use crate::map;
use crate::parser::{self, listing};
use crate::pool;
use crate::types::{AirportPage, AirportSummary, ExperienceRecord, LoungeRecord};
use crate::validate::{Validation, Validator};

const NOTES: &str = "Only LOUNGE experiences are retained; DINING and RELAX are counted per airport but not mapped.";

/// What the airport page phase produced.
#[derive(Debug, Default)]
pub struct Crawl {
    pub summaries: Vec<AirportSummary>,
    pub lounges: Vec<ExperienceRecord>,
    pub non_lounges: usize,
    pub failures: usize,
}

#[derive(Debug)]
pub struct RunReport {
    pub metadata: Metadata,
    pub airport_failures: usize,
    pub lounges_extracted: usize,
}

pub async fn run(settings: &Settings) -> Result<RunReport> {
    let site = Arc::new(settings.site.clone());
    let fetcher = Arc::new(Fetcher::new(settings.fetch.clone()).context("building HTTP client")?);

    // Phase 1: airport pages
    let t = Instant::now();
    let crawl = crawl_airports(settings, &site, &fetcher).await?;
    println!(
        "Scraped {} airport pages ({} failed): {} lounges, {} other experiences in {:.1}s",
        crawl.summaries.len(),
        crawl.failures,
        crawl.lounges.len(),
        crawl.non_lounges,
        t.elapsed().as_secs_f64()
    );
    if crawl.lounges.is_empty() {
        bail!(
            "no lounge records extracted from {} airport pages",
            crawl.summaries.len()
        );
    }
    let lounges_extracted = crawl.lounges.len();

    let world = airports::load(&fetcher, &settings.airports).await?;

    // Phase 2: validate every detail URL once
    let validator = Validator::new(Arc::clone(&site), Arc::clone(&fetcher));
    let lounges = retain_mappable(&site, crawl.lounges);
    info!("{} lounge records with a code and detail URL", lounges.len());

    let t = Instant::now();
    let urls = unique_urls(lounges.iter());
    let results = validate_all(&validator, urls, settings.workers, "validate").await;
    let mut discarded = HashSet::new();
    let lounges = apply_validations(lounges, &results, &mut discarded);
    println!(
        "Validated {} detail URLs ({} discarded) in {:.1}s",
        results.len(),
        discarded.len(),
        t.elapsed().as_secs_f64()
    );

    // Phase 3: recheck what the map will link to, then aggregate again
    let joined = aggregate::aggregate(&world, &lounges);
    let targets = recheck_targets(&lounges, &joined, &discarded);
    let t = Instant::now();
    let rechecked = validate_all(&validator, targets.clone(), settings.workers, "recheck").await;
    let valid_after_recheck = rechecked.values().filter(|v| !v.outcome.is_discarded()).count();
    let lounges = apply_validations(lounges, &rechecked, &mut discarded);
    println!(
        "Rechecked {} map URLs ({} still valid) in {:.1}s",
        targets.len(),
        valid_after_recheck,
        t.elapsed().as_secs_f64()
    );

    let joined = aggregate::aggregate(&world, &lounges);
    let pins = aggregate::pins(&joined);

    let metadata = Metadata {
        generated_at_unix: chrono::Utc::now().timestamp(),
        sources: Sources {
            listing: settings.listing_url.clone(),
            airports: settings.airports.describe(),
        },
        airports_scraped: crawl.summaries.len(),
        lounges_retained: lounges.len(),
        map_pins: pins.len(),
        urls_rechecked: targets.len(),
        urls_valid_after_recheck: valid_after_recheck,
        urls_discarded: discarded.len(),
        notes: NOTES.to_string(),
    };

    // Phase 4: single-threaded output
    export::write_all(settings, &world, &crawl.summaries, &lounges, &joined, &metadata)?;
    map::write_map(&settings.map_path(), &pins)?;
    info!("Map written to {}", settings.map_path().display());

    Ok(RunReport {
        metadata,
        airport_failures: crawl.failures,
        lounges_extracted,
    })
}

/// Fetch the listing, then every airport page in chunks: the pool fetches a
/// chunk, rayon extracts it, and the HTML is dropped before the next chunk.
pub async fn crawl_airports(settings: &Settings, site: &Arc<Site>, fetcher: &Arc<Fetcher>) -> Result<Crawl> {
    let listing_html = fetcher
        .get_text(&settings.listing_url)
        .await
        .with_context(|| format!("fetching listing page {}", settings.listing_url))?;
    let mut links = listing::parse_airport_links(site, &listing_html);
    if let Some(max) = settings.max_airports {
        links.truncate(max);
    }
    println!("Found {} airport pages", links.len());

    let mut crawl = Crawl::default();
    for chunk in links.chunks(settings.chunk_size.max(1)) {
        let pages = fetch_pages(fetcher, chunk.to_vec(), settings.workers).await;
        let site = Arc::clone(site);
        let extracted: Vec<AirportPage> = tokio::task::spawn_blocking(move || {
            pages
                .par_iter()
                .map(|(url, body)| match body {
                    Ok(html) => parser::extract_airport_page(&site, url, html),
                    Err(e) => AirportPage {
                        summary: AirportSummary::failed(url, e.clone()),
                        ..AirportPage::default()
                    },
                })
                .collect()
        })
        .await
        .context("airport extraction worker")?;

        for page in extracted {
            if page.summary.error.is_some() {
                crawl.failures += 1;
            }
            crawl.non_lounges += page.others.len();
            crawl.lounges.extend(page.lounges);
            crawl.summaries.push(page.summary);
        }
    }
    Ok(crawl)
}

async fn fetch_pages(
    fetcher: &Arc<Fetcher>,
    urls: Vec<String>,
    workers: usize,
) -> Vec<(String, Result<String, String>)> {
    let fetcher = Arc::clone(fetcher);
    pool::run(urls, workers, "airports", move |url: String| {
        let fetcher = Arc::clone(&fetcher);
        async move {
            let body = fetcher.get_text(&url).await.map_err(|e| {
                warn!("Airport page {} failed: {}", url, e);
                e.to_string()
            });
            (url, body)
        }
    })
    .await
}

/// Lounges that can end up on the map: a well-formed IATA code and a detail URL.
pub fn retain_mappable(site: &Site, lounges: Vec<ExperienceRecord>) -> Vec<LoungeRecord> {
    lounges
        .into_iter()
        .filter(|r| {
            r.iata_code
                .as_deref()
                .is_some_and(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_uppercase()))
        })
        .filter(|r| site.is_detail_url(&r.experience_detail_url))
        .map(LoungeRecord::from)
        .collect()
}

fn unique_urls<'a>(lounges: impl Iterator<Item = &'a LoungeRecord>) -> Vec<String> {
    lounges
        .map(|r| r.detail_url().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub async fn validate_all(
    validator: &Validator,
    urls: Vec<String>,
    workers: usize,
    label: &str,
) -> HashMap<String, Validation> {
    let validator = validator.clone();
    pool::run(urls, workers, label, move |url: String| {
        let validator = validator.clone();
        async move {
            let validation = validator.validate(&url).await;
            (url, validation)
        }
    })
    .await
    .into_iter()
    .collect()
}

/// Rewrite each record to its validated URL, keeping the slug in step with
/// it, and attach page metadata. Records whose URL was discarded are dropped
/// and the URL remembered.
/// Records not covered by `results` are kept as they are.
pub fn apply_validations(
    lounges: Vec<LoungeRecord>,
    results: &HashMap<String, Validation>,
    discarded: &mut HashSet<String>,
) -> Vec<LoungeRecord> {
    lounges
        .into_iter()
        .filter_map(|mut record| {
            let Some(validation) = results.get(record.detail_url()) else {
                return Some(record);
            };
            let Some(url) = validation.outcome.url() else {
                discarded.insert(record.detail_url().to_string());
                return None;
            };
            if let Some(slug) = last_segment(url) {
                record.experience.experience_detail_slug = slug;
            }
            record.experience.experience_detail_url = url.to_string();
            if validation.meta.image_url.is_some() {
                record.lounge_image_url = validation.meta.image_url.clone();
            }
            if validation.meta.title.is_some() {
                record.lounge_title = validation.meta.title.clone();
            }
            Some(record)
        })
        .collect()
}

/// Unique detail URLs behind map pins, minus anything already discarded.
pub fn recheck_targets(
    lounges: &[LoungeRecord],
    joined: &[AggregatedAirport],
    discarded: &HashSet<String>,
) -> Vec<String> {
    let pin_codes: HashSet<&str> = joined
        .iter()
        .filter(|a| a.is_pin())
        .map(|a| a.airport.iata_code.as_str())
        .collect();
    unique_urls(
        lounges
            .iter()
            .filter(|r| r.iata().is_some_and(|c| pin_codes.contains(c)))
            .filter(|r| !discarded.contains(r.detail_url())),
    )
}
