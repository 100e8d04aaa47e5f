use anyhow::{bail, Context};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use skytheme::config::Settings;
use skytheme::error::AmbiguousBody;
use skytheme::location::{LocationResolver, OpenWeatherGeocoder, Resolution};
use skytheme::server::{self, AppState};
use skytheme::store::Store;
use skytheme::theme::{classify, ColdPolicy, TempUnit, ThemeInput, ThemeRules};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// skytheme: weather lookup with fuzzy city resolution and themed pages.
///
/// Examples:
///   skytheme serve --port 8080
///   skytheme resolve Springfield
///   skytheme resolve "Lodnon" --country GB
///   skytheme theme --temp -3 --desc "Clear sky" --unit c
///   skytheme theme --temp 18 --desc "Overcast" --now 06:10 --sunrise 05:50 --sunset 20:30
#[derive(Parser)]
#[command(name = "skytheme", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults to config/skytheme.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Resolve a city name and print the result as JSON.
    Resolve {
        city: String,
        /// Country hint (ISO 3166-1 alpha-2, e.g. US, FR).
        #[arg(long)]
        country: Option<String>,
    },
    /// Classify conditions into a theme and print it as JSON.
    Theme {
        #[arg(long, allow_hyphen_values = true)]
        temp: f64,
        #[arg(long)]
        desc: String,
        /// "c" or "f".
        #[arg(long, default_value = "c")]
        unit: String,
        /// Local time, HH:MM. Requires --sunrise and --sunset.
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        sunrise: Option<String>,
        #[arg(long)]
        sunset: Option<String>,
        /// "freezing" or "chilly".
        #[arg(long, default_value = "freezing", value_parser = parse_cold_policy)]
        cold_policy: ColdPolicy,
    },
}

fn parse_cold_policy(s: &str) -> Result<ColdPolicy, String> {
    match s.to_lowercase().as_str() {
        "freezing" => Ok(ColdPolicy::Freezing),
        "chilly" => Ok(ColdPolicy::Chilly),
        _ => Err(format!("Unknown cold policy '{}'. Use 'freezing' or 'chilly'.", s)),
    }
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(p) => Settings::load_from(Some(p.as_path()), skytheme::config::ENV_PREFIX),
        None => Settings::load(),
    };
    settings.context("failed to load configuration")
}

fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port } => {
            let settings = load_settings(cli.config.as_ref())?;
            init_tracing(&settings.logging.level);

            let store = Store::connect(&settings.database.url, settings.database.max_connections)
                .await
                .with_context(|| format!("cannot open database {}", settings.database.url))?;
            tracing::info!(url = %settings.database.url, "database ready");

            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            let state = AppState::new(&settings, store);
            server::start(state, &host, port)
                .await
                .with_context(|| format!("server on {}:{} failed", host, port))?;
        }

        Command::Resolve { city, country } => {
            let settings = load_settings(cli.config.as_ref())?;
            init_tracing(&settings.logging.level);

            let upstream = &settings.upstream;
            let geocoder = OpenWeatherGeocoder::new(
                &upstream.openweather_base_url,
                &upstream.openweather_api_key,
                upstream.timeout(),
            );
            let resolver = LocationResolver::new(Arc::new(geocoder))
                .with_policy(settings.resolver.policy)
                .with_limit(settings.resolver.limit);

            let resolution =
                tokio::task::spawn_blocking(move || resolver.resolve(&city, country.as_deref())).await??;

            let json = match &resolution {
                Resolution::Located(resolved) => serde_json::to_string_pretty(resolved)?,
                Resolution::Ambiguous { query, candidates } => serde_json::to_string_pretty(&AmbiguousBody {
                    multiple: true,
                    query,
                    options: candidates,
                })?,
            };
            println!("{}", json);
        }

        Command::Theme { temp, desc, unit, now, sunrise, sunset, cold_policy } => {
            init_tracing("warn");

            let mut input = ThemeInput::new(temp, desc, TempUnit::parse(&unit));
            match (now, sunrise, sunset) {
                (Some(now), Some(sunrise), Some(sunset)) => {
                    let now = NaiveTime::parse_from_str(&now, "%H:%M")
                        .with_context(|| format!("invalid --now '{}', expected HH:MM", now))?;
                    input = input.at(now, &sunrise, &sunset);
                }
                (None, _, _) => {}
                _ => bail!("--now requires both --sunrise and --sunset"),
            }

            let rules = ThemeRules { cold_policy, ..ThemeRules::default() };
            println!("{}", serde_json::to_string_pretty(&classify(&input, &rules))?);
        }
    }

    Ok(())
}
