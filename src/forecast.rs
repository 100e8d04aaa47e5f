//! Upstream weather clients: Open-Meteo daily/hourly forecast and
//! OpenWeather current conditions, parsed into explicit structs.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::location::providers::{build_agent, urlencode};

const DAILY_FIELDS: &str =
    "temperature_2m_max,temperature_2m_min,weathercode,sunrise,sunset,rain_sum,precipitation_probability_max";
const HOURLY_FIELDS: &str = "relative_humidity_2m,temperature_2m,weathercode";

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response from {source_name}: {message}")]
    Malformed { source_name: &'static str, message: String },
}

impl ForecastError {
    fn malformed(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed { source_name, message: message.into() }
    }
}

// ─── Open-Meteo ─────────────────────────────────────────────────

/// Open-Meteo `/v1/forecast` response with the fields this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Forecast {
    /// IANA zone picked by `timezone=auto`.
    #[serde(default)]
    pub timezone: Option<String>,
    pub daily: DailySeries,
    pub hourly: HourlySeries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailySeries {
    /// "2025-08-22"
    pub time: Vec<String>,
    pub temperature_2m_max: Vec<f64>,
    pub temperature_2m_min: Vec<f64>,
    pub weathercode: Vec<Option<u8>>,
    /// "2025-08-22T05:27"
    pub sunrise: Vec<String>,
    pub sunset: Vec<String>,
    pub rain_sum: Vec<Option<f64>>,
    pub precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlySeries {
    /// "2025-08-22T13:00"
    pub time: Vec<String>,
    pub relative_humidity_2m: Vec<Option<f64>>,
    pub temperature_2m: Vec<f64>,
    pub weathercode: Vec<Option<u8>>,
}

impl Forecast {
    /// Parse and check that every series is present, non-empty and aligned.
    pub fn from_json(body: &str) -> Result<Self, ForecastError> {
        let forecast: Forecast = parse_json("open-meteo", body)?;
        forecast.validate()?;
        Ok(forecast)
    }

    fn validate(&self) -> Result<(), ForecastError> {
        let d = &self.daily;
        let days = d.time.len();
        if days == 0 {
            return Err(ForecastError::malformed("open-meteo", "daily series is empty"));
        }
        let daily_lens = [
            ("temperature_2m_max", d.temperature_2m_max.len()),
            ("temperature_2m_min", d.temperature_2m_min.len()),
            ("weathercode", d.weathercode.len()),
            ("sunrise", d.sunrise.len()),
            ("sunset", d.sunset.len()),
            ("rain_sum", d.rain_sum.len()),
            ("precipitation_probability_max", d.precipitation_probability_max.len()),
        ];
        if let Some((name, len)) = daily_lens.iter().find(|(_, len)| *len != days) {
            return Err(ForecastError::malformed(
                "open-meteo",
                format!("daily.{} has {} entries, expected {}", name, len, days),
            ));
        }

        let h = &self.hourly;
        let hours = h.time.len();
        if hours == 0 {
            return Err(ForecastError::malformed("open-meteo", "hourly series is empty"));
        }
        let hourly_lens = [
            ("relative_humidity_2m", h.relative_humidity_2m.len()),
            ("temperature_2m", h.temperature_2m.len()),
            ("weathercode", h.weathercode.len()),
        ];
        if let Some((name, len)) = hourly_lens.iter().find(|(_, len)| *len != hours) {
            return Err(ForecastError::malformed(
                "open-meteo",
                format!("hourly.{} has {} entries, expected {}", name, len, hours),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct OpenMeteoClient {
    agent: ureq::Agent,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn fetch(&self, lat: f64, lon: f64) -> Result<Forecast, ForecastError> {
        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&daily={}&hourly={}&timezone=auto",
            self.base_url, lat, lon, DAILY_FIELDS, HOURLY_FIELDS,
        );
        let body = get_text(&self.agent, &url)?;
        debug!(lat, lon, bytes = body.len(), "open-meteo forecast fetched");
        Forecast::from_json(&body)
    }
}

// ─── OpenWeather current conditions ─────────────────────────────

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    weather: Vec<CurrentWeather>,
    main: CurrentMain,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct CurrentMain {
    temp: f64,
    #[serde(default)]
    humidity: Option<f64>,
}

/// Current conditions at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature_kelvin: f64,
    pub description: String,
    pub humidity: Option<f64>,
}

impl CurrentConditions {
    pub fn from_json(body: &str) -> Result<Self, ForecastError> {
        let raw: CurrentResponse = parse_json("openweather", body)?;
        let description = raw
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| ForecastError::malformed("openweather", "empty weather list"))?;
        Ok(Self {
            temperature_kelvin: raw.main.temp,
            description,
            humidity: raw.main.humidity,
        })
    }
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn current(&self, lat: f64, lon: f64) -> Result<CurrentConditions, ForecastError> {
        let url = format!(
            "{}/data/2.5/weather?lat={}&lon={}&appid={}",
            self.base_url,
            lat,
            lon,
            urlencode(&self.api_key),
        );
        let body = get_text(&self.agent, &url)?;
        CurrentConditions::from_json(&body)
    }
}

// ─── WMO weather codes ──────────────────────────────────────────

/// Human description of a WMO weather interpretation code.
pub fn wmo_description(code: Option<u8>) -> &'static str {
    match code {
        Some(0) => "Clear sky",
        Some(1) => "Mainly clear",
        Some(2) => "Partly cloudy",
        Some(3) => "Overcast",
        Some(45) => "Fog",
        Some(48) => "Depositing rime fog",
        Some(51) => "Light drizzle",
        Some(53) => "Moderate drizzle",
        Some(55) => "Dense drizzle",
        Some(56) => "Light freezing drizzle",
        Some(57) => "Dense freezing drizzle",
        Some(61) => "Slight rain",
        Some(63) => "Moderate rain",
        Some(65) => "Heavy rain",
        Some(66) => "Light freezing rain",
        Some(67) => "Heavy freezing rain",
        Some(71) => "Slight snow fall",
        Some(73) => "Moderate snow fall",
        Some(75) => "Heavy snow fall",
        Some(77) => "Snow grains",
        Some(80) => "Slight rain showers",
        Some(81) => "Moderate rain showers",
        Some(82) => "Violent rain showers",
        Some(85) => "Slight snow showers",
        Some(86) => "Heavy snow showers",
        Some(95) => "Thunderstorm",
        Some(96) => "Thunderstorm with slight hail",
        Some(99) => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

// ─── HTTP helpers ───────────────────────────────────────────────

pub(crate) fn get_text(agent: &ureq::Agent, url: &str) -> Result<String, ForecastError> {
    agent
        .get(url)
        .call()
        .map_err(|e| ForecastError::Network(e.to_string()))?
        .into_string()
        .map_err(|e| ForecastError::Network(e.to_string()))
}

fn parse_json<T: DeserializeOwned>(source_name: &'static str, body: &str) -> Result<T, ForecastError> {
    serde_json::from_str(body).map_err(|e| ForecastError::malformed(source_name, e.to_string()))
}
