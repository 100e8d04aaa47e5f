//! Theme classification: current conditions and local sun position → a
//! background theme tag and the colour group it belongs to.
//!
//! Rules, first match wins:
//!   1. time of day (polar season, night, sunrise window, sunset window)
//!   2. description keywords, matched at the start of words
//!   3. unit-aware temperature thresholds
//!
//! Classification is total: malformed time strings fall through to rule 2.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sunrise/sunset value the forecast reports when the sun never rises or sets.
const POLAR_SENTINEL: &str = "00:00";

/// Longest sunrise/sunset window accepted from configuration.
pub const MAX_WINDOW_MINUTES: u32 = 24 * 60;

const SEVERE_TERMS: &[&str] = &["thunder", "storm", "lightning"];
const FOG_TERMS: &[&str] = &["fog", "mist"];

/// Background theme for a rendered forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    StormCase,
    RainCase,
    SnowyCase,
    ColdCase,
    FoggyCase,
    CloudyCase,
    ClearCase,
    SunnyCase,
    SunriseCase,
    SunsetCase,
    MoonCase,
    PolarSeasonCase,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StormCase => "stormcase",
            Self::RainCase => "raincase",
            Self::SnowyCase => "snowycase",
            Self::ColdCase => "coldcase",
            Self::FoggyCase => "foggycase",
            Self::CloudyCase => "cloudycase",
            Self::ClearCase => "clearcase",
            Self::SunnyCase => "sunnycase",
            Self::SunriseCase => "sunrisecase",
            Self::SunsetCase => "sunsetcase",
            Self::MoonCase => "mooncase",
            Self::PolarSeasonCase => "polarseasoncase",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        let t = match tag.trim().to_lowercase().as_str() {
            "stormcase" => Self::StormCase,
            "raincase" => Self::RainCase,
            "snowycase" => Self::SnowyCase,
            "coldcase" => Self::ColdCase,
            "foggycase" => Self::FoggyCase,
            "cloudycase" => Self::CloudyCase,
            "clearcase" => Self::ClearCase,
            "sunnycase" => Self::SunnyCase,
            "sunrisecase" => Self::SunriseCase,
            "sunsetcase" => Self::SunsetCase,
            "mooncase" => Self::MoonCase,
            "polarseasoncase" => Self::PolarSeasonCase,
            _ => return None,
        };
        Some(t)
    }

    /// Colour palette bucket. Snow themes are checked first, so `snowycase`
    /// belongs to `snowtype`.
    pub fn theme_group(&self) -> ThemeGroup {
        match self {
            Self::SnowyCase | Self::ColdCase => ThemeGroup::SnowType,
            Self::MoonCase | Self::PolarSeasonCase => ThemeGroup::SpecialCase,
            Self::StormCase
            | Self::RainCase
            | Self::FoggyCase
            | Self::CloudyCase
            | Self::ClearCase
            | Self::SunnyCase
            | Self::SunriseCase
            | Self::SunsetCase => ThemeGroup::DarkAndSoft,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour palette shared by several themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeGroup {
    #[serde(rename = "snowtype")]
    SnowType,
    DarkAndSoft,
    SpecialCase,
}

impl ThemeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnowType => "snowtype",
            Self::DarkAndSoft => "dark_and_soft",
            Self::SpecialCase => "special_case",
        }
    }

    /// Group for a theme tag by name; unknown tags land in `dark_and_soft`.
    pub fn for_tag(tag: &str) -> Self {
        ImageType::parse(tag)
            .map(|t| t.theme_group())
            .unwrap_or(ThemeGroup::DarkAndSoft)
    }
}

impl fmt::Display for ThemeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature unit the caller displays in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempUnit {
    Celsius,
    Fahrenheit,
    Unknown,
}

impl TempUnit {
    /// "c"/"celsius" and "f"/"fahrenheit", case-insensitive; anything else is unknown.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "c" | "celsius" => Self::Celsius,
            "f" | "fahrenheit" => Self::Fahrenheit,
            _ => Self::Unknown,
        }
    }

    /// Single-letter code stored with search records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Celsius => "c",
            Self::Fahrenheit => "f",
            Self::Unknown => "?",
        }
    }
}

/// How low temperatures are themed when no description keyword matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColdPolicy {
    /// Below freezing (0 °C / 32 °F) → `snowycase`.
    #[default]
    Freezing,
    /// Below 10 °C / 50 °F → `coldcase`, which outranks the clear/sun keywords.
    Chilly,
}

/// Tunable thresholds for the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThemeRules {
    pub cold_policy: ColdPolicy,
    pub sunrise_window_minutes: u32,
    pub sunset_window_minutes: u32,
}

impl Default for ThemeRules {
    fn default() -> Self {
        Self {
            cold_policy: ColdPolicy::Freezing,
            sunrise_window_minutes: 30,
            sunset_window_minutes: 20,
        }
    }
}

/// Everything the classifier looks at.
#[derive(Debug, Clone)]
pub struct ThemeInput {
    pub temperature: f64,
    pub description: String,
    pub unit: TempUnit,
    pub local_time: Option<NaiveTime>,
    /// "HH:MM"
    pub sunrise: Option<String>,
    /// "HH:MM"
    pub sunset: Option<String>,
}

impl ThemeInput {
    pub fn new(temperature: f64, description: impl Into<String>, unit: TempUnit) -> Self {
        Self {
            temperature,
            description: description.into(),
            unit,
            local_time: None,
            sunrise: None,
            sunset: None,
        }
    }

    pub fn at(mut self, local_time: NaiveTime, sunrise: &str, sunset: &str) -> Self {
        self.local_time = Some(local_time);
        self.sunrise = Some(sunrise.to_string());
        self.sunset = Some(sunset.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeResult {
    pub image_type: ImageType,
    pub theme_group: ThemeGroup,
}

/// Classify conditions into a theme. Never fails.
pub fn classify(input: &ThemeInput, rules: &ThemeRules) -> ThemeResult {
    let image_type = image_type(input, rules);
    ThemeResult {
        image_type,
        theme_group: image_type.theme_group(),
    }
}

fn image_type(input: &ThemeInput, rules: &ThemeRules) -> ImageType {
    if let (Some(now), Some(sunrise), Some(sunset)) =
        (input.local_time, input.sunrise.as_deref(), input.sunset.as_deref())
    {
        if let Some(t) = by_sun_position(now, sunrise, sunset, rules) {
            return t;
        }
    }

    let desc = input.description.to_lowercase();
    // Keywords match at word starts, so "Snow grains" is not rain.
    let words: Vec<&str> = desc.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    let has = |term: &str| words.iter().any(|w| w.starts_with(term));

    if SEVERE_TERMS.iter().any(|t| has(*t)) {
        return ImageType::StormCase;
    }
    if has("rain") {
        return ImageType::RainCase;
    }
    if has("snow") {
        return ImageType::SnowyCase;
    }
    if FOG_TERMS.iter().any(|t| has(*t)) {
        return ImageType::FoggyCase;
    }
    if has("cloud") {
        return ImageType::CloudyCase;
    }
    if rules.cold_policy == ColdPolicy::Chilly && is_chilly(input.temperature, input.unit) {
        return ImageType::ColdCase;
    }
    if has("clear") {
        return ImageType::ClearCase;
    }
    if has("sun") {
        return ImageType::SunnyCase;
    }

    by_temperature(input.temperature, input.unit, rules.cold_policy)
}

fn by_sun_position(now: NaiveTime, sunrise: &str, sunset: &str, rules: &ThemeRules) -> Option<ImageType> {
    if sunrise == POLAR_SENTINEL && sunset == POLAR_SENTINEL {
        return Some(ImageType::PolarSeasonCase);
    }

    let now = now.hour() * 60 + now.minute();
    let sr = minutes_since_midnight(sunrise)?;
    let ss = minutes_since_midnight(sunset)?;

    if now < sr {
        Some(ImageType::MoonCase)
    } else if now <= sr.saturating_add(rules.sunrise_window_minutes) {
        Some(ImageType::SunriseCase)
    } else if now.saturating_add(rules.sunset_window_minutes) >= ss && now <= ss {
        Some(ImageType::SunsetCase)
    } else if now > ss.saturating_add(rules.sunset_window_minutes) {
        Some(ImageType::MoonCase)
    } else {
        None
    }
}

/// "07:30" → 450. `None` for anything that is not a valid `HH:MM`.
fn minutes_since_midnight(hhmm: &str) -> Option<u32> {
    let t = NaiveTime::parse_from_str(hhmm.trim(), "%H:%M").ok()?;
    Some(t.hour() * 60 + t.minute())
}

fn is_chilly(temp: f64, unit: TempUnit) -> bool {
    match unit {
        TempUnit::Celsius => temp < 10.0,
        TempUnit::Fahrenheit => temp < 50.0,
        TempUnit::Unknown => false,
    }
}

fn by_temperature(temp: f64, unit: TempUnit, policy: ColdPolicy) -> ImageType {
    let (freezing, hot) = match unit {
        TempUnit::Celsius => (0.0, 25.0),
        TempUnit::Fahrenheit => (32.0, 77.0),
        TempUnit::Unknown => return ImageType::ClearCase,
    };

    if policy == ColdPolicy::Freezing && temp < freezing {
        ImageType::SnowyCase
    } else if temp > hot {
        ImageType::SunnyCase
    } else {
        ImageType::ClearCase
    }
}
