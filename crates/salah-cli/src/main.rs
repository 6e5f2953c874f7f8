use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use salah_core::{AppError, Config, TimelineConfig};
use salah_times::presentation::{render_medium, render_small};
use salah_times::{
    update_location, CalculationMethod, Coordinates, Entry, HighLatitudeRule, LocationSetting,
    Madhab, ManualLocationService, NominatimGeocoder, Prayer, Settings, SettingsStore,
    TimelineProvider,
};

mod watch;

#[derive(Parser)]
#[command(name = "salah", version, about = "Prayer times for your location")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the shared settings and saved location
    Settings,
    /// Change calculation settings
    Configure(ConfigureArgs),
    /// Save a location fix for "Auto" mode
    Locate(LocateArgs),
    /// Print one timeline
    Timeline(TimelineArgs),
    /// Keep rendering the current entry, regenerating per reload policy
    Watch(WatchArgs),
}

#[derive(Args)]
struct ConfigureArgs {
    /// e.g. "Karachi", "Muslim World League"
    #[arg(long)]
    method: Option<CalculationMethod>,
    #[arg(long)]
    madhab: Option<Madhab>,
    /// e.g. "Middle of the Night", "Twilight Angle"
    #[arg(long)]
    high_latitude_rule: Option<HighLatitudeRule>,
    /// "Auto" or a place name
    #[arg(long)]
    location: Option<String>,
    #[arg(long, allow_negative_numbers = true, value_parser = adjustment)]
    fajr: Option<i32>,
    #[arg(long, allow_negative_numbers = true, value_parser = adjustment)]
    sunrise: Option<i32>,
    #[arg(long, allow_negative_numbers = true, value_parser = adjustment)]
    dhuhr: Option<i32>,
    #[arg(long, allow_negative_numbers = true, value_parser = adjustment)]
    asr: Option<i32>,
    #[arg(long, allow_negative_numbers = true, value_parser = adjustment)]
    maghrib: Option<i32>,
    #[arg(long, allow_negative_numbers = true, value_parser = adjustment)]
    isha: Option<i32>,
}

#[derive(Args)]
struct LocateArgs {
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,
    /// Behave as if location access was refused
    #[arg(long, conflicts_with_all = ["lat", "lon", "clear"])]
    deny: bool,
    /// Forget the saved location
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    clear: bool,
}

#[derive(Args)]
struct TimelineArgs {
    /// Hourly entries over a day instead of the configured schedule
    #[arg(long)]
    hourly: bool,
    /// Print the preview entry without touching the store or network
    #[arg(long)]
    preview: bool,
    #[arg(long)]
    json: bool,
    #[arg(long, value_enum, default_value_t = Size::Medium)]
    size: Size,
}

#[derive(Args)]
struct WatchArgs {
    #[arg(long)]
    hourly: bool,
    #[arg(long, value_enum, default_value_t = Size::Small)]
    size: Size,
}

#[derive(Clone, Copy, ValueEnum)]
enum Size {
    Small,
    Medium,
}

impl Size {
    fn render(self, entry: &Entry, now: chrono::DateTime<Utc>, window: Duration) -> String {
        match self {
            Size::Small => render_small(entry, now, window),
            Size::Medium => render_medium(entry, now, window),
        }
    }
}

fn adjustment(s: &str) -> Result<i32, String> {
    let minutes: i32 = s.parse().map_err(|e| format!("{e}"))?;
    if salah_times::ADJUSTMENT_RANGE.contains(&minutes) {
        Ok(minutes)
    } else {
        Err(format!(
            "must be between {} and {} minutes",
            salah_times::ADJUSTMENT_RANGE.start(),
            salah_times::ADJUSTMENT_RANGE.end()
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    salah_core::init()?;
    let opts = Opts::parse();

    let (config, _) = Config::load_validated().context("Failed to load configuration")?;
    let store_path = config.storage.store_path();
    let store = Arc::new(
        SettingsStore::open(&store_path)
            .with_context(|| format!("Failed to open settings at {}", store_path.display()))?,
    );

    match opts.command {
        Command::Settings => print_settings(&store),
        Command::Configure(args) => configure(&store, args),
        Command::Locate(args) => locate(&store, args).await,
        Command::Timeline(args) => timeline(store, config, args).await,
        Command::Watch(args) => {
            let config = with_schedule(config, args.hourly);
            let window = countdown_window(&config);
            let provider = build_provider(store, &config)?;
            watch::run(&provider, window, args.size).await
        }
    }
}

fn with_schedule(mut config: Config, hourly: bool) -> Config {
    if hourly {
        config.timeline = TimelineConfig::hourly();
    }
    config
}

fn countdown_window(config: &Config) -> Duration {
    Duration::hours(i64::from(config.timeline.countdown_window_hours))
}

fn build_provider(
    store: Arc<SettingsStore>,
    config: &Config,
) -> Result<TimelineProvider<NominatimGeocoder>> {
    let geocoder =
        NominatimGeocoder::new(&config.geocoding).context("Failed to build geocoding client")?;
    Ok(TimelineProvider::new(store, Arc::new(geocoder), config))
}

fn print_settings(store: &SettingsStore) -> Result<()> {
    let settings = store.get();
    println!("Calculation method:  {}", settings.calculation_method);
    println!("Madhab:              {}", settings.madhab);
    println!("High latitude rule:  {}", settings.high_latitude_rule);
    println!("Location:            {}", settings.location);
    for prayer in Prayer::ALL {
        println!(
            "{:<20} {:+}",
            format!("{} adjustment:", prayer.name()),
            settings.adjustments.get(prayer)
        );
    }
    match store.saved_coordinates() {
        Some(coordinates) => println!("Saved coordinates:   {coordinates}"),
        None => println!("Saved coordinates:   none"),
    }
    for prayer in settings.out_of_range_adjustments() {
        tracing::warn!(
            "{} adjustment {} is outside the configurable range",
            prayer,
            settings.adjustments.get(prayer)
        );
    }
    Ok(())
}

fn configure(store: &SettingsStore, args: ConfigureArgs) -> Result<()> {
    let mut settings: Settings = store.get();

    if let Some(method) = args.method {
        settings.calculation_method = method;
    }
    if let Some(madhab) = args.madhab {
        settings.madhab = madhab;
    }
    if let Some(rule) = args.high_latitude_rule {
        settings.high_latitude_rule = rule;
    }
    if let Some(location) = args.location {
        settings.location = LocationSetting::from(location);
    }

    let adjustments = [
        (Prayer::Fajr, args.fajr),
        (Prayer::Sunrise, args.sunrise),
        (Prayer::Dhuhr, args.dhuhr),
        (Prayer::Asr, args.asr),
        (Prayer::Maghrib, args.maghrib),
        (Prayer::Isha, args.isha),
    ];
    for (prayer, minutes) in adjustments {
        if let Some(minutes) = minutes {
            settings.adjustments.set(prayer, minutes);
        }
    }

    store.set(&settings).context("Failed to save settings")?;
    tracing::info!("Settings updated");
    print_settings(store)
}

async fn locate(store: &SettingsStore, args: LocateArgs) -> Result<()> {
    if args.clear {
        store.clear_coordinates().context("Failed to clear location")?;
        println!("Saved location cleared");
        return Ok(());
    }

    let service = if args.deny {
        ManualLocationService::denied()
    } else {
        let fix = args.lat.zip(args.lon).map(|(lat, lon)| Coordinates::new(lat, lon));
        ManualLocationService::new(fix)
    };

    match update_location(&service, store).await {
        Ok(coordinates) => {
            println!("Latitude: {:.4}", coordinates.latitude);
            println!("Longitude: {:.4}", coordinates.longitude);
            Ok(())
        }
        Err(e @ AppError::Location(_)) => {
            tracing::warn!("Location update failed: {}", e);
            println!("{}", e.user_message());
            Ok(())
        }
        Err(e) => Err(e).context("Failed to update location"),
    }
}

async fn timeline(store: Arc<SettingsStore>, config: Config, args: TimelineArgs) -> Result<()> {
    let config = with_schedule(config, args.hourly);
    let window = countdown_window(&config);
    let provider = build_provider(store, &config)?;
    let now = Utc::now();

    let entries = if args.preview {
        vec![provider.snapshot(now)]
    } else {
        provider.timeline_at(now).await.entries
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!("== {} ==", entry.date.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"));
        println!("{}", args.size.render(entry, entry.date, window));
        println!();
    }
    Ok(())
}
