mod aggregate;
mod airports;
mod config;
mod db;
mod error;
mod export;
mod fetch;
mod links;
mod map;
mod parser;
mod pipeline;
mod pool;
mod types;
mod validate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use crate::airports::AirportSource;
use crate::config::Settings;
use crate::fetch::{FetchConfig, Fetcher};
use crate::links::Site;
use crate::types::ExperienceRecord;
use crate::validate::Validator;

#[derive(Parser)]
#[command(name = "lounge_scraper", about = "Airport lounge scraper and map builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every airport, validate lounge links, write data files and the map
    Run {
        /// Directory for data/ and map/
        #[arg(short, long, env = "LOUNGE_OUTPUT_DIR", default_value = config::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Concurrent requests per phase
        #[arg(short, long, env = "LOUNGE_WORKERS", default_value_t = config::DEFAULT_WORKERS)]
        workers: usize,
        /// Only scrape the first N airports (default: all)
        #[arg(short = 'n', long, env = "LOUNGE_MAX_AIRPORTS")]
        max_airports: Option<usize>,
        /// Read the airport reference from a local CSV instead of downloading it
        #[arg(long, env = "LOUNGE_AIRPORTS_CSV")]
        airports_csv: Option<PathBuf>,
        #[arg(long, env = "LOUNGE_AIRPORTS_URL", default_value = airports::DEFAULT_AIRPORTS_CSV_URL)]
        airports_url: String,
        #[command(flatten)]
        site: SiteArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Fetch one airport page and print what was extracted
    Extract {
        airport_url: String,
        /// Include DINING and RELAX experiences
        #[arg(short, long)]
        all: bool,
        #[command(flatten)]
        site: SiteArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Run the validation ladder on one lounge detail URL
    Check {
        url: String,
        #[command(flatten)]
        site: SiteArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Summarize the database of a previous run
    Stats {
        #[arg(short, long, env = "LOUNGE_OUTPUT_DIR", default_value = config::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Rows in the top airports table
        #[arg(short = 'n', long, default_value = "15")]
        limit: usize,
    },
}

#[derive(Args)]
struct SiteArgs {
    /// Airport listing page; also the base for airport links
    #[arg(long, env = "LOUNGE_LISTING_URL", default_value = config::DEFAULT_LISTING_URL)]
    listing_url: String,
    /// Host that serves canonical lounge detail pages
    #[arg(long, env = "LOUNGE_CANONICAL_BASE", default_value = links::DEFAULT_CANONICAL_BASE)]
    canonical_base: String,
    /// Language prefix of canonical detail paths
    #[arg(long, env = "LOUNGE_LANG", default_value = links::DEFAULT_LANG_PREFIX)]
    lang: String,
}

impl SiteArgs {
    fn site(&self) -> anyhow::Result<Site> {
        Site::new(&self.canonical_base, &self.listing_url, &self.lang).context("invalid site URL")
    }
}

#[derive(Args)]
struct FetchArgs {
    /// Per-request timeout in seconds
    #[arg(long, env = "LOUNGE_TIMEOUT", default_value_t = fetch::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    /// Retries on 429, 5xx and network errors
    #[arg(long, env = "LOUNGE_RETRIES", default_value_t = fetch::MAX_RETRIES)]
    retries: u32,
    /// Base backoff in milliseconds, doubled on every retry
    #[arg(long, env = "LOUNGE_BACKOFF_MS", default_value_t = fetch::BASE_BACKOFF_MS)]
    backoff_ms: u64,
    #[arg(long, env = "LOUNGE_USER_AGENT", default_value = fetch::DEFAULT_USER_AGENT)]
    user_agent: String,
}

impl FetchArgs {
    fn config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.retries,
            backoff: Duration::from_millis(self.backoff_ms),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            output_dir,
            workers,
            max_airports,
            airports_csv,
            airports_url,
            site,
            fetch,
        } => {
            let settings = Settings {
                output_dir,
                workers: workers.max(1),
                max_airports,
                listing_url: site.listing_url.clone(),
                airports: match airports_csv {
                    Some(path) => AirportSource::File(path),
                    None => AirportSource::Url(airports_url),
                },
                site: site.site()?,
                fetch: fetch.config(),
                ..Settings::default()
            };
            let report = pipeline::run(&settings).await?;
            let m = &report.metadata;
            println!(
                "Airports scraped: {} ({} failed)",
                m.airports_scraped, report.airport_failures
            );
            println!(
                "Lounges: {} extracted, {} retained, {} URLs discarded",
                report.lounges_extracted, m.lounges_retained, m.urls_discarded
            );
            println!(
                "Map: {} pins, {}/{} URLs valid after recheck",
                m.map_pins, m.urls_valid_after_recheck, m.urls_rechecked
            );
            println!("Data: {}", settings.data_dir().display());
            println!("Map:  {}", settings.map_path().display());
            Ok(())
        }
        Commands::Extract {
            airport_url,
            all,
            site,
            fetch,
        } => {
            let site = site.site()?;
            let fetcher = Fetcher::new(fetch.config())?;
            let html = fetcher
                .get_text(&airport_url)
                .await
                .with_context(|| format!("fetching {airport_url}"))?;
            let page = parser::extract_airport_page(&site, &airport_url, &html);
            let s = &page.summary;
            println!(
                "{} [{}] {} lounges, {} other",
                if s.airport_name.is_empty() { &s.airport_slug } else { &s.airport_name },
                s.airport_iata.as_deref().unwrap_or("-"),
                s.lounge_count,
                s.non_lounge_count
            );
            print_records(&page.lounges);
            if all {
                print_records(&page.others);
            }
            Ok(())
        }
        Commands::Check { url, site, fetch } => {
            let site = Arc::new(site.site()?);
            let url = site.canonicalize(&url);
            let fetcher = Arc::new(Fetcher::new(fetch.config())?);
            let validation = Validator::new(site, fetcher).validate(&url).await;
            println!("{url}");
            println!("  outcome: {}", validation.outcome);
            if let Some(title) = &validation.meta.title {
                println!("  title:   {title}");
            }
            if let Some(image) = &validation.meta.image_url {
                println!("  image:   {image}");
            }
            Ok(())
        }
        Commands::Stats { output_dir, limit } => {
            let path = config::db_path_in(&output_dir);
            if !path.exists() {
                bail!("no database at {}. Run 'run' first.", path.display());
            }
            let conn = db::connect(&path)?;
            let s = db::get_stats(&conn)?;
            println!("Reference airports:  {}", s.world_airports);
            println!("Airports scraped:    {}", s.airports_scraped);
            println!("  with errors:       {}", s.airport_errors);
            println!("Lounges:             {}", s.lounges);
            println!("  distinct codes:    {}", s.lounge_codes);
            println!("Airports w/ lounges: {}", s.airports_with_lounges);
            println!("Map pins:            {}", s.map_pins);

            let top = db::fetch_top_airports(&conn, limit)?;
            if !top.is_empty() {
                println!("\n{:>3} | {:<4} | {:<40} | {:>7}", "#", "IATA", "Airport", "Lounges");
                println!("{}", "-".repeat(64));
                for (i, t) in top.iter().enumerate() {
                    println!(
                        "{:>3} | {:<4} | {:<40} | {:>7}",
                        i + 1,
                        t.iata_code,
                        truncate(&t.name, 40),
                        t.lounge_count
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_records(records: &[ExperienceRecord]) {
    for r in records {
        println!(
            "  {:<6} {:<3} {:<40} {}",
            r.experience_type.as_str(),
            r.iata_code.as_deref().unwrap_or("-"),
            truncate(&r.experience_name, 40),
            r.experience_detail_url
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
