//! Parse one display title and resolve its reference page.
//! Usage: cargo run --bin resolve-title -- "[Dubstep] Artist - Title (feat. Other)"

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use metaresolve::config::Config;
use metaresolve::fetch::HttpFetcher;
use metaresolve::models::FieldKey;
use metaresolve::progress::init_logging;
use metaresolve::rate_limit::RateLimiter;
use metaresolve::reference::{PageRegistry, ReferencePageResolver};
use metaresolve::sources::FandomClient;
use metaresolve::state::to_pretty_json;
use metaresolve::title::{order_extras, TitlePatternParser};

#[derive(Parser)]
#[command(name = "resolve-title")]
#[command(about = "Parse a display title and look up its reference page")]
struct Args {
    title: String,

    #[arg(long)]
    title_pattern: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    wiki: Option<String>,

    /// Only parse the title; no network access
    #[arg(long)]
    offline: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(pattern) = args.title_pattern {
        config.title_pattern = pattern;
    }
    if let Some(wiki) = args.wiki {
        config.wiki = wiki;
    }

    let parser = TitlePatternParser::new(&config.title_pattern).context("Invalid title pattern")?;
    let (fields, found_extras) = parser.parse_with_extras(&args.title);
    println!("{}", to_pretty_json(&fields)?);

    if args.offline {
        return Ok(());
    }
    if !fields.contains(FieldKey::Titles) {
        bail!("No title parsed from {:?}", args.title);
    }

    let fetcher = HttpFetcher::new(&config.user_agent, config.timeout())
        .with_limiter(RateLimiter::with_interval(config.min_request_interval()))
        .with_backoff(config.rate_limit_backoff());
    let fandom = FandomClient::new(&fetcher, &config.wiki);
    let registry = PageRegistry::new(&fandom);
    let resolver =
        ReferencePageResolver::new(&registry, &config.brand).with_search_limit(config.search_limit);

    let page = resolver.resolve(
        fields.list(FieldKey::Titles),
        fields.list(FieldKey::Artists),
        &order_extras(&fields.extras(), &found_extras),
    )?;

    println!("\nPage: {}", page.url());
    println!("  Type: {}", page.page_type());
    println!("  Titles: {:?}", page.page.titles);
    println!("  Genres: {:?}", page.page.genres);
    if let Some(query) = &page.query {
        println!("  Query: {}", query);
    }

    Ok(())
}
