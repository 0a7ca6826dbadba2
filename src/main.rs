use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use metaresolve::combine::FieldCombiner;
use metaresolve::config::{check_fingerprint_key, Args};
use metaresolve::fetch::HttpFetcher;
use metaresolve::item::ItemPipeline;
use metaresolve::orchestrator::RunOrchestrator;
use metaresolve::progress::{format_duration, init_logging, set_log_only};
use metaresolve::rate_limit::RateLimiter;
use metaresolve::reference::{PageRegistry, ReferencePageResolver};
use metaresolve::sources::{AcousticBrainzClient, AcoustIdClient, FandomClient, MusicBrainzClient};
use metaresolve::state::RunState;
use metaresolve::tags::LoftyTagStore;
use metaresolve::title::{DescriptionGenreParser, TitlePatternParser};

/// Exit status after an interrupted (but saved) run
const EXIT_INTERRUPTED: i32 = 130;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    set_log_only(args.log_only);

    let config = args.load_config()?;
    let sources = args.enabled_sources();
    check_fingerprint_key(&sources, args.acoustid_key.as_deref())?;
    let paths = args.input_paths()?;

    let title_parser =
        TitlePatternParser::new(&config.title_pattern).context("Invalid title pattern")?;
    let description_parser = DescriptionGenreParser::new(&config.description_genre_pattern)
        .context("Invalid description genre pattern")?;

    let mut state = RunState::load(&args.results_file, &args.failed_file)?;

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        ctrlc::set_handler(move || {
            if interrupt.swap(true, Ordering::SeqCst) {
                eprintln!("Second interrupt; exiting without saving");
                process::exit(EXIT_INTERRUPTED);
            }
            eprintln!("Interrupt received; stopping and saving (Ctrl-C again to exit now)");
        })
        .context("Failed to install interrupt handler")?;
    }

    let fetcher = HttpFetcher::new(&config.user_agent, config.timeout())
        .with_limiter(RateLimiter::with_interval(config.min_request_interval()))
        .with_backoff(config.rate_limit_backoff())
        .with_interrupt(Arc::clone(&interrupt));
    let acoustid_key = args.acoustid_key.clone().unwrap_or_default();
    let acoustid = AcoustIdClient::new(&fetcher, &acoustid_key).with_fpcalc(config.fpcalc.clone());
    let musicbrainz = MusicBrainzClient::new(&fetcher);
    let acousticbrainz = AcousticBrainzClient::new(&fetcher);
    let fandom = FandomClient::new(&fetcher, &config.wiki);
    let registry = PageRegistry::new(&fandom);
    let reference =
        ReferencePageResolver::new(&registry, &config.brand).with_search_limit(config.search_limit);
    let tags = LoftyTagStore;

    let pipeline = ItemPipeline::new(
        &tags,
        title_parser,
        description_parser,
        FieldCombiner::new(config.genre_exclusions(args.profile)),
        &sources,
    )
    .with_fingerprint(&acoustid)
    .with_recording(&musicbrainz)
    .with_low_level(&acousticbrainz)
    .with_reference(&reference);

    info!(
        "Resolving {} path(s) with sources [{}], retry {:?}",
        paths.len(),
        pipeline
            .sources()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        args.retry_mode()
    );

    let start = Instant::now();
    let orchestrator =
        RunOrchestrator::new(&pipeline, args.retry_mode()).with_interrupt(Arc::clone(&interrupt));
    let summary = orchestrator.run(&paths, &mut state);

    if args.readonly {
        warn!("Read-only run; results and failures not written");
    } else {
        state.save(&args.results_file, &args.failed_file)?;
    }

    println!("\n{:=<60}", "");
    println!("Resolution complete!");
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed: {}", summary.failed);
    println!("  Skipped (already done): {}", summary.skipped_done);
    println!("  Skipped (already failed): {}", summary.skipped_failed);
    println!("  Unsupported: {}", summary.unsupported);
    println!("  Reference pages fetched: {}", registry.cached_pages());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    if summary.interrupted {
        process::exit(EXIT_INTERRUPTED);
    }
    Ok(())
}
