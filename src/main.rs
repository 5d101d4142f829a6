use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use natal_input::config::Config;
use natal_input::correction::user_offset;
use natal_input::form::{FormController, FormSession, LocationInput, Update};
use natal_input::location::{format_coords, Location, LocationResolver, Nominatim, SearchCache};
use natal_input::server::{self, AppState};
use natal_input::timezone::{Timezone, TimezoneResolution, TimezoneResolver};

/// natal: birth date, time and place, corrected to UTC.
///
/// Examples:
///   natal search "Москва"
///   natal timezone --lat 55.7558 --lon 37.6173
///   natal report --date 1990-06-15 --time 04:20 --place "Moscow"
///   natal report --date 2000-01-01 --time 12:00 --lat 19.076 --lon 72.8777 --tz Asia/Kolkata --json
///   natal interactive
///   natal serve --port 3000
#[derive(Parser)]
#[command(name = "natal", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Offline mode: cached searches and longitude approximation only.
    #[arg(long, global = true)]
    offline: bool,

    /// Search cache file (default ~/.natal/search-cache.json).
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Keep the search cache in memory only.
    #[arg(long, global = true)]
    no_cache: bool,

    /// The user's own IANA timezone (defaults to the system zone).
    #[arg(long, global = true)]
    user_tz: Option<String>,

    /// accept-language for place names (e.g. ru, en).
    #[arg(long, global = true)]
    language: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Search for a place by name.
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Resolve the timezone at coordinates.
    Timezone {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long)]
        json: bool,
    },
    /// Produce the corrected birth report.
    Report {
        /// Birth date (YYYY-MM-DD).
        #[arg(long, short = 'd')]
        date: String,
        /// Birth time at the birth place (HH:MM).
        #[arg(long, short = 't')]
        time: String,
        /// Place to search for.
        #[arg(long, short = 'p')]
        place: Option<String>,
        /// Which search result to use (1-based).
        #[arg(long, default_value_t = 1)]
        pick: usize,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Display name for --lat/--lon.
        #[arg(long)]
        name: Option<String>,
        /// IANA zone of the birth place; skips timezone lookups.
        #[arg(long)]
        tz: Option<String>,
        /// Also print the JSON block.
        #[arg(long)]
        json: bool,
    },
    /// Fill the form line by line on stdin.
    Interactive,
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natal_input=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = &cli.cache {
        config.cache_path = Some(path.clone());
    }
    if let Some(language) = &cli.language {
        config.language = language.clone();
    }

    let resolver = build_resolver(&cli, &config);
    let timezones = if cli.offline {
        TimezoneResolver::offline()
    } else {
        TimezoneResolver::from_config(&config)
    };
    match cli.command {
        Command::Search { query, json } => run_search(resolver, &query, json),
        Command::Timezone { lat, lon, json } => run_timezone(&timezones, lat, lon, json),
        Command::Report {
            date,
            time,
            place,
            pick,
            lat,
            lon,
            name,
            tz,
            json,
        } => {
            let offset = user_offset(cli.user_tz.as_deref())?;
            let mut session = FormSession::new();
            session.set_date(&date)?;
            session.set_time(&time)?;

            match (place, lat, lon) {
                (Some(place), _, _) => {
                    select_place(&mut session, resolver, &timezones, &place, pick, tz.as_deref())?
                }
                (None, Some(lat), Some(lon)) => {
                    check_coords(lat, lon)?;
                    let timezone = zone_for(&timezones, lat, lon, tz.as_deref())?;
                    session.select_location(
                        Location::from_coords(name.as_deref(), lat, lon).with_timezone(timezone),
                    );
                }
                _ => bail!("no birth place given: use --place, or --lat with --lon"),
            }

            let report = session.generate(offset)?;
            println!("{}", report.to_text());
            if json {
                println!();
                println!("{}", report.to_json_pretty());
            }
            Ok(())
        }
        Command::Interactive => {
            let offset = user_offset(cli.user_tz.as_deref())?;
            let controller = FormController::new(resolver, timezones, config.debounce);
            tokio::runtime::Runtime::new()?.block_on(run_interactive(controller, offset))
        }
        Command::Serve { host, port } => {
            let mut state = AppState::new(resolver, timezones);
            if let Some(zone) = cli.user_tz.as_deref() {
                state.user_offset = Some(user_offset(Some(zone))?);
            }
            tokio::runtime::Runtime::new()?
                .block_on(server::start(state, &host, port))
                .with_context(|| format!("server on {}:{} failed", host, port))
        }
    }
}

fn check_coords(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        bail!("invalid coordinates. Lat: -90..90, Lon: -180..180");
    }
    Ok(())
}

/// `--pick` is 1-based.
fn pick_index(pick: usize) -> Result<usize> {
    match pick.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("--pick counts from 1"),
    }
}

fn build_resolver(cli: &Cli, config: &Config) -> LocationResolver {
    let mut resolver = if cli.no_cache {
        LocationResolver::new(
            Box::new(Nominatim::from_config(config)),
            SearchCache::in_memory(),
        )
    } else {
        LocationResolver::from_config(config)
    };
    resolver.set_offline(cli.offline);
    resolver
}

fn zone_for(
    timezones: &TimezoneResolver,
    lat: f64,
    lon: f64,
    manual: Option<&str>,
) -> Result<Timezone> {
    match manual {
        Some(zone) => Ok(Timezone::manual(zone)?),
        None => {
            let resolution = timezones.resolve(lat, lon);
            print_failures(&resolution);
            Ok(resolution.timezone)
        }
    }
}

fn print_failures(resolution: &TimezoneResolution) {
    for failure in &resolution.failures {
        eprintln!("  timezone lookup via {} failed: {}", failure.strategy, failure.error);
    }
}

fn print_candidates(candidates: &[Location]) {
    for (i, c) in candidates.iter().enumerate() {
        println!("  {}. {}", i + 1, c.name);
        println!("     {}", c.display_name);
        println!("     {}", format_coords(c.latitude, c.longitude));
    }
}

fn run_search(mut resolver: LocationResolver, query: &str, json: bool) -> Result<()> {
    let outcome = resolver.search(query);
    if let Some(notice) = &outcome.notice {
        eprintln!("  {}", notice);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.candidates.is_empty() {
        println!("  No places found.");
    } else {
        print_candidates(&outcome.candidates);
    }
    Ok(())
}

fn run_timezone(timezones: &TimezoneResolver, lat: f64, lon: f64, json: bool) -> Result<()> {
    check_coords(lat, lon)?;
    let resolution = timezones.resolve(lat, lon);
    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print_failures(&resolution);
        println!("  {} via {}", resolution.timezone, resolution.timezone.source);
    }
    Ok(())
}

fn select_place(
    session: &mut FormSession,
    mut resolver: LocationResolver,
    timezones: &TimezoneResolver,
    place: &str,
    pick: usize,
    manual_zone: Option<&str>,
) -> Result<()> {
    let index = pick_index(pick)?;
    let LocationInput::Search { generation, query } = session.input_location(place) else {
        bail!("empty place name");
    };
    let outcome = resolver.search(&query);
    if let Some(notice) = &outcome.notice {
        eprintln!("  {}", notice);
    }
    session.complete_search(generation, outcome);
    if session.candidates().is_empty() {
        bail!("no places found for '{}'", place);
    }

    let ticket = session.select(index)?;
    let timezone = zone_for(timezones, ticket.latitude, ticket.longitude, manual_zone)?;
    session.attach_timezone(ticket.generation, timezone);
    Ok(())
}

const HELP: &str = "commands: date <YYYY-MM-DD> | time <HH:MM> | place <text> | pick <n> | status | generate | json | quit";

async fn run_interactive(mut controller: FormController, offset: i32) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut controller, line.trim(), offset).await {
                    break;
                }
            }
            Some(update) = controller.next_update() => print_update(&controller, &update),
        }
    }
    Ok(())
}

/// Returns false when the session should end.
async fn handle_line(controller: &mut FormController, line: &str, offset: i32) -> bool {
    let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "date" => report_error(controller.set_date(arg)),
        "time" => report_error(controller.set_time(arg)),
        "place" => controller.input_location(arg),
        "pick" => {
            settle(controller).await;
            match arg.trim().parse::<usize>() {
                Ok(n) if n > 0 => report_error(controller.select(n - 1)),
                _ => println!("  pick needs a number from the list"),
            }
        }
        "status" => print_status(controller.session()),
        "generate" | "json" => {
            settle(controller).await;
            match controller.generate(offset) {
                Ok(report) if command == "json" => println!("{}", report.to_json_pretty()),
                Ok(report) => println!("{}", report.to_text()),
                Err(e) => println!("  {}", e),
            }
        }
        "quit" | "exit" => return false,
        _ => println!("{}", HELP),
    }
    true
}

async fn settle(controller: &mut FormController) {
    for update in controller.settle().await {
        print_update(controller, &update);
    }
}

fn report_error<E: std::fmt::Display>(result: std::result::Result<(), E>) {
    if let Err(e) = result {
        println!("  {}", e);
    }
}

fn print_update(controller: &FormController, update: &Update) {
    match update {
        Update::Results { count, notice } => {
            if let Some(notice) = notice {
                println!("  {}", notice);
            }
            if *count == 0 {
                println!("  No places found.");
            } else {
                print_candidates(controller.session().candidates());
            }
        }
        Update::Timezone(resolution) => {
            print_failures(resolution);
            if let Some(location) = controller.session().selected() {
                println!("  selected {}: {}", location.name, resolution.timezone);
            }
        }
        Update::Stale => {}
    }
}

fn print_status(session: &FormSession) {
    let validation = session.validate();
    println!("  date: {}", session.date().map(|d| d.to_string()).unwrap_or_else(|| "-".into()));
    println!(
        "  time: {}",
        session.time().map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".into())
    );
    match session.selected() {
        Some(location) => println!(
            "  place: {} [{}]",
            location,
            location.timezone.as_ref().map(|tz| tz.to_string()).unwrap_or_default()
        ),
        None => println!("  place: -"),
    }
    if validation.can_submit() {
        println!("  ready to generate");
    } else {
        println!("  cannot generate: {}", validation);
    }
}
