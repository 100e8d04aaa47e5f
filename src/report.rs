//! Forecast page model: turns raw upstream series into the display rows the
//! weather page shows (weekly, hourly, humidity) plus the theme.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;

use crate::forecast::{wmo_description, CurrentConditions, DailySeries, Forecast, ForecastError, HourlySeries};
use crate::theme::{classify, TempUnit, ThemeInput, ThemeResult, ThemeRules};

const KELVIN_OFFSET: f64 = 273.15;
const HOURLY_ROWS: usize = 24;

const DAY_NAMES: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRow {
    /// "Friday"
    pub day: String,
    /// "Friday, August 22nd"
    pub label: String,
    pub temperature_max: f64,
    pub temperature_min: f64,
    /// Maximum precipitation probability, percent.
    pub rain_chance: Option<f64>,
    pub weathercode: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourRow {
    /// "1:00 PM"
    pub display_hour: String,
    pub temperature: String,
    /// "2025-08-22"
    pub date: String,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HumidityRow {
    pub day: &'static str,
    pub average: Option<f64>,
}

/// Everything the weather page renders for one location.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    #[serde(flatten)]
    pub theme: ThemeResult,
    pub temperature: String,
    pub temperature_unit: TempUnit,
    /// Description of the current hour's weather code.
    pub description: String,
    /// OpenWeather's own wording for the current conditions.
    pub conditions: String,
    pub local_time: String,
    pub sunrise: String,
    pub sunset: String,
    pub rain: Option<f64>,
    pub weekly: Vec<DayRow>,
    pub hourly: Vec<HourRow>,
    pub humidity: Vec<HumidityRow>,
}

/// Assemble the page model for local wall-clock time `now`.
pub fn build_report(
    forecast: &Forecast,
    current: &CurrentConditions,
    now: NaiveDateTime,
    unit: TempUnit,
    rules: &ThemeRules,
) -> Result<WeatherReport, ForecastError> {
    let daily = &forecast.daily;
    let hourly = &forecast.hourly;

    let (sunrise_ts, sunset_ts) = match (daily.sunrise.first(), daily.sunset.first()) {
        (Some(sr), Some(ss)) => (sr.as_str(), ss.as_str()),
        _ => return Err(malformed("daily sunrise/sunset missing")),
    };
    let sunrise_clock = clock_time(sunrise_ts).ok_or_else(|| malformed(format!("bad sunrise '{}'", sunrise_ts)))?;
    let sunset_clock = clock_time(sunset_ts).ok_or_else(|| malformed(format!("bad sunset '{}'", sunset_ts)))?;

    let description = current_hour_description(hourly, now);
    // Unknown units theme on the Celsius value; the classifier ignores thresholds for them.
    let theme_temp = kelvin_to(current.temperature_kelvin, unit)
        .unwrap_or(current.temperature_kelvin - KELVIN_OFFSET);
    let theme = classify(
        &ThemeInput::new(theme_temp, description, unit).at(now.time(), sunrise_clock, sunset_clock),
        rules,
    );

    Ok(WeatherReport {
        theme,
        temperature: format_temperature(current.temperature_kelvin, unit),
        temperature_unit: unit,
        description: description.to_string(),
        conditions: current.description.clone(),
        local_time: now.format("%Y-%m-%dT%H:%M").to_string(),
        sunrise: display_time(sunrise_ts).unwrap_or_default(),
        sunset: display_time(sunset_ts).unwrap_or_default(),
        rain: daily.rain_sum.first().copied().flatten(),
        weekly: weekly_rows(daily, unit)?,
        hourly: hourly_rows(hourly, now, unit, HOURLY_ROWS),
        humidity: humidity_rows(hourly, now.weekday()),
    })
}

fn malformed(message: impl Into<String>) -> ForecastError {
    ForecastError::Malformed { source_name: "open-meteo", message: message.into() }
}

// ─── Temperatures ───────────────────────────────────────────────

/// Kelvin → display unit. `None` for units we cannot display.
pub fn kelvin_to(temp_k: f64, unit: TempUnit) -> Option<f64> {
    let c = temp_k - KELVIN_OFFSET;
    match unit {
        TempUnit::Celsius => Some(c),
        TempUnit::Fahrenheit => Some(c * 9.0 / 5.0 + 32.0),
        TempUnit::Unknown => None,
    }
}

/// 294.5 K → "21.35°C" / "70.43°F".
pub fn format_temperature(temp_k: f64, unit: TempUnit) -> String {
    match (unit, kelvin_to(temp_k, unit)) {
        (TempUnit::Celsius, Some(t)) => format!("{:.2}°C", t),
        (TempUnit::Fahrenheit, Some(t)) => format!("{:.2}°F", t),
        _ => "Invalid temperature type".to_string(),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ─── Calendar labels ────────────────────────────────────────────

/// English ordinal suffix: 1st, 2nd, 3rd, 4th, 11th, 12th, 13th, 21st.
pub fn day_suffix(n: u32) -> &'static str {
    if (11..=13).contains(&(n % 100)) {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Weekday name `offset` days after `base`; offset 0 is `base` itself.
pub fn day_label(base: Weekday, offset: usize) -> &'static str {
    let idx = (base.num_days_from_monday() as usize + offset) % 7;
    DAY_NAMES[idx]
}

/// "Friday, August 22nd"
pub fn date_label(date: NaiveDate) -> String {
    let day = date.day();
    format!(
        "{}, {} {}{}",
        DAY_NAMES[date.weekday().num_days_from_monday() as usize],
        MONTH_NAMES[date.month0() as usize],
        day,
        day_suffix(day),
    )
}

/// 24-hour clock → "1:00 PM", "12:05 AM".
pub fn hour_label(hour: u32, minute: u32) -> String {
    let (h, meridiem) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{}:{:02} {}", h, minute, meridiem)
}

/// "2025-08-22T05:27" → "05:27".
pub fn clock_time(ts: &str) -> Option<&str> {
    let hhmm = ts.get(11..16)?;
    chrono::NaiveTime::parse_from_str(hhmm, "%H:%M").ok()?;
    Some(hhmm)
}

/// "2025-08-22T05:27" → "5:27 am", "2025-08-22T20:14" → "8:14 pm".
pub fn display_time(ts: &str) -> Option<String> {
    let t = chrono::NaiveTime::parse_from_str(clock_time(ts)?, "%H:%M").ok()?;
    let (hour, minute) = (t.hour(), t.minute());
    let meridiem = if hour < 12 { "am" } else { "pm" };
    let h = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    Some(format!("{}:{:02} {}", h, minute, meridiem))
}

// ─── Rows ───────────────────────────────────────────────────────

/// One row per forecast day, temperatures in the requested unit.
pub fn weekly_rows(daily: &DailySeries, unit: TempUnit) -> Result<Vec<DayRow>, ForecastError> {
    daily
        .time
        .iter()
        .enumerate()
        .map(|(i, day)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|e| malformed(format!("bad daily date '{}': {}", day, e)))?;
            let convert = |c: f64| match unit {
                TempUnit::Fahrenheit => round_to(c * 9.0 / 5.0 + 32.0, 1),
                _ => c,
            };
            Ok(DayRow {
                day: DAY_NAMES[date.weekday().num_days_from_monday() as usize].to_string(),
                label: date_label(date),
                temperature_max: convert(daily.temperature_2m_max[i]),
                temperature_min: convert(daily.temperature_2m_min[i]),
                rain_chance: daily.precipitation_probability_max[i],
                weathercode: daily.weathercode[i],
            })
        })
        .collect()
}

/// `count` hourly rows starting at the current local hour, wrapping around
/// the series. Starts at the first entry when the hour is not in the series.
pub fn hourly_rows(hourly: &HourlySeries, now: NaiveDateTime, unit: TempUnit, count: usize) -> Vec<HourRow> {
    let total = hourly.time.len();
    if total == 0 {
        return Vec::new();
    }
    let key = now.format("%Y-%m-%dT%H:00").to_string();
    let start = hourly.time.iter().position(|t| *t == key).unwrap_or(0);

    (0..count)
        .map(|i| {
            let idx = (start + i) % total;
            let ts = &hourly.time[idx];
            let (date, hour, minute) = match NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M") {
                Ok(dt) => (dt.date().to_string(), dt.hour(), dt.minute()),
                Err(_) => (ts.get(..10).unwrap_or(ts.as_str()).to_string(), 0, 0),
            };
            HourRow {
                display_hour: hour_label(hour, minute),
                temperature: format_temperature(hourly.temperature_2m[idx] + KELVIN_OFFSET, unit),
                date,
                description: wmo_description(hourly.weathercode[idx]),
            }
        })
        .collect()
}

/// Average humidity per 24-hour block, rounded to two decimals. Day 0 is
/// labelled `base`. Missing readings are left out of the average.
pub fn humidity_rows(hourly: &HourlySeries, base: Weekday) -> Vec<HumidityRow> {
    hourly
        .relative_humidity_2m
        .chunks_exact(24)
        .enumerate()
        .map(|(day, block)| {
            let readings: Vec<f64> = block.iter().flatten().copied().collect();
            let average = if readings.is_empty() {
                None
            } else {
                Some(round_to(readings.iter().sum::<f64>() / readings.len() as f64, 2))
            };
            HumidityRow { day: day_label(base, day), average }
        })
        .collect()
}

/// WMO description for the hourly entry closest to `now`.
pub fn current_hour_description(hourly: &HourlySeries, now: NaiveDateTime) -> &'static str {
    let nearest = hourly
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let t = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M").ok()?;
            Some((i, (t - now).num_seconds().abs()))
        })
        .min_by_key(|&(_, distance)| distance);

    match nearest {
        Some((i, _)) => wmo_description(hourly.weathercode[i]),
        None => wmo_description(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::tests::sample_forecast_json;
    use crate::theme::{ImageType, ThemeGroup};
    use approx::assert_relative_eq;

    fn forecast() -> Forecast {
        Forecast::from_json(&sample_forecast_json()).unwrap()
    }

    fn at(date: &str, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn current(kelvin: f64) -> CurrentConditions {
        CurrentConditions {
            temperature_kelvin: kelvin,
            description: "scattered clouds".into(),
            humidity: Some(60.0),
        }
    }

    #[test]
    fn test_format_temperature() {
        assert_eq!(format_temperature(294.5, TempUnit::Celsius), "21.35°C");
        assert_eq!(format_temperature(294.5, TempUnit::Fahrenheit), "70.43°F");
        assert_eq!(format_temperature(294.5, TempUnit::Unknown), "Invalid temperature type");
    }

    #[test]
    fn test_kelvin_to() {
        assert_relative_eq!(kelvin_to(273.15, TempUnit::Celsius).unwrap(), 0.0);
        assert_relative_eq!(kelvin_to(273.15, TempUnit::Fahrenheit).unwrap(), 32.0);
        assert!(kelvin_to(273.15, TempUnit::Unknown).is_none());
    }

    #[test]
    fn test_day_suffix() {
        let cases = [(1, "st"), (2, "nd"), (3, "rd"), (4, "th"), (11, "th"), (12, "th"), (13, "th"), (21, "st"), (22, "nd"), (23, "rd"), (31, "st")];
        for (n, suffix) in cases {
            assert_eq!(day_suffix(n), suffix, "day {n}");
        }
    }

    #[test]
    fn test_day_label_wraps() {
        assert_eq!(day_label(Weekday::Fri, 0), "Friday");
        assert_eq!(day_label(Weekday::Fri, 1), "Saturday");
        assert_eq!(day_label(Weekday::Fri, 3), "Monday");
        assert_eq!(day_label(Weekday::Sun, 7), "Sunday");
    }

    #[test]
    fn test_date_label() {
        let d = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap();
        assert_eq!(date_label(d), "Friday, August 22nd");
        let d = NaiveDate::from_ymd_opt(2025, 9, 11).unwrap();
        assert_eq!(date_label(d), "Thursday, September 11th");
    }

    #[test]
    fn test_hour_label() {
        assert_eq!(hour_label(0, 0), "12:00 AM");
        assert_eq!(hour_label(9, 5), "9:05 AM");
        assert_eq!(hour_label(12, 0), "12:00 PM");
        assert_eq!(hour_label(13, 0), "1:00 PM");
        assert_eq!(hour_label(23, 30), "11:30 PM");
    }

    #[test]
    fn test_display_time() {
        assert_eq!(display_time("2025-08-22T05:27").as_deref(), Some("5:27 am"));
        assert_eq!(display_time("2025-08-22T20:14").as_deref(), Some("8:14 pm"));
        assert_eq!(display_time("2025-08-22T12:00").as_deref(), Some("12:00 pm"));
        assert_eq!(display_time("2025-08-22T00:00").as_deref(), Some("12:00 am"));
        assert_eq!(display_time("garbage"), None);
        assert_eq!(clock_time("2025-08-22T05:27"), Some("05:27"));
    }

    #[test]
    fn test_weekly_rows_fahrenheit() {
        let f = forecast();
        let rows = weekly_rows(&f.daily, TempUnit::Fahrenheit).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].day, "Friday");
        assert_eq!(rows[0].label, "Friday, August 22nd");
        assert_relative_eq!(rows[0].temperature_max, 76.1);
        assert_relative_eq!(rows[0].temperature_min, 53.6);
        assert_eq!(rows[1].label, "Saturday, August 23rd");
        assert_eq!(rows[1].rain_chance, Some(85.0));
        assert_eq!(rows[1].weathercode, Some(71));
    }

    #[test]
    fn test_weekly_rows_celsius_untouched() {
        let f = forecast();
        let rows = weekly_rows(&f.daily, TempUnit::Celsius).unwrap();
        assert_relative_eq!(rows[0].temperature_max, 24.5);
        assert_relative_eq!(rows[1].temperature_min, 9.5);
    }

    #[test]
    fn test_hourly_rows_start_at_now_and_wrap() {
        let f = forecast();
        let rows = hourly_rows(&f.hourly, at("2025-08-23", 13, 42), TempUnit::Celsius, 24);
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].display_hour, "1:00 PM");
        assert_eq!(rows[0].date, "2025-08-23");
        assert_eq!(rows[0].temperature, "23.00°C");
        assert_eq!(rows[0].description, "Slight rain");
        // 48 entries, starting at index 37: the 12th row wraps to the first day.
        assert_eq!(rows[11].display_hour, "12:00 AM");
        assert_eq!(rows[11].date, "2025-08-22");
        assert_eq!(rows[11].description, "Clear sky");
    }

    #[test]
    fn test_hourly_rows_unknown_hour_starts_at_zero() {
        let f = forecast();
        let rows = hourly_rows(&f.hourly, at("2030-01-01", 8, 0), TempUnit::Fahrenheit, 3);
        assert_eq!(rows[0].date, "2025-08-22");
        assert_eq!(rows[0].display_hour, "12:00 AM");
        assert_eq!(rows[0].temperature, "50.00°F");
    }

    #[test]
    fn test_humidity_rows() {
        let f = forecast();
        let rows = humidity_rows(&f.hourly, Weekday::Fri);
        assert_eq!(
            rows,
            vec![
                HumidityRow { day: "Friday", average: Some(50.0) },
                HumidityRow { day: "Saturday", average: Some(70.0) },
            ]
        );
    }

    #[test]
    fn test_humidity_rows_ignore_missing_readings() {
        let mut f = forecast();
        f.hourly.relative_humidity_2m[0] = None;
        f.hourly.relative_humidity_2m[1] = Some(73.0);
        let rows = humidity_rows(&f.hourly, Weekday::Mon);
        // (73 + 22 * 50) / 23
        assert_eq!(rows[0].average, Some(51.0));
        assert_eq!(rows[0].day, "Monday");
    }

    #[test]
    fn test_current_hour_description_uses_nearest_hour() {
        let f = forecast();
        assert_eq!(current_hour_description(&f.hourly, at("2025-08-22", 11, 20)), "Clear sky");
        assert_eq!(current_hour_description(&f.hourly, at("2025-08-22", 11, 40)), "Slight rain");
    }

    #[test]
    fn test_build_report() {
        let f = forecast();
        let r = build_report(&f, &current(294.5), at("2025-08-22", 14, 0), TempUnit::Celsius, &ThemeRules::default())
            .unwrap();
        assert_eq!(r.temperature, "21.35°C");
        assert_eq!(r.description, "Slight rain");
        assert_eq!(r.conditions, "scattered clouds");
        assert_eq!(r.theme.image_type, ImageType::RainCase);
        assert_eq!(r.theme.theme_group, ThemeGroup::DarkAndSoft);
        assert_eq!(r.sunrise, "5:27 am");
        assert_eq!(r.sunset, "8:14 pm");
        assert_eq!(r.rain, Some(1.2));
        assert_eq!(r.weekly.len(), 2);
        assert_eq!(r.hourly.len(), 24);
        assert_eq!(r.hourly[0].display_hour, "2:00 PM");
        assert_eq!(r.humidity[0].day, "Friday");
    }

    #[test]
    fn test_build_report_night_is_moon() {
        let f = forecast();
        let r = build_report(&f, &current(280.0), at("2025-08-22", 23, 0), TempUnit::Fahrenheit, &ThemeRules::default())
            .unwrap();
        assert_eq!(r.theme.image_type, ImageType::MoonCase);
        assert_eq!(r.theme.theme_group, ThemeGroup::SpecialCase);
        assert!(r.temperature.ends_with("°F"));
    }

    #[test]
    fn test_build_report_bad_sunrise_is_malformed() {
        let mut f = forecast();
        f.daily.sunrise[0] = "nope".into();
        let err = build_report(&f, &current(290.0), at("2025-08-22", 9, 0), TempUnit::Celsius, &ThemeRules::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::Malformed { .. }));
    }
}
