//! SQLite persistence: user accounts, the search log and its analytics.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TOP_CITIES: i64 = 10;
const ANALYTICS_DAYS: i64 = 7;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS search_events (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        city       TEXT NOT NULL,
        country    TEXT,
        lat        REAL NOT NULL,
        lon        REAL NOT NULL,
        temp_unit  TEXT NOT NULL,
        user_id    INTEGER REFERENCES users(id),
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_search_events_created_at ON search_events(created_at)",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0}")]
    Duplicate(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// One successful weather search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRecord {
    pub city: String,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// "c", "f" or "?"
    pub temp_unit: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityCount {
    pub city: String,
    pub country: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitCount {
    pub unit: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    /// "2025-08-22"
    pub day: String,
    pub count: i64,
}

/// Aggregate view over the search log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub total_searches: i64,
    pub distinct_cities: i64,
    pub top_cities: Vec<CityCount>,
    pub by_unit: Vec<UnitCount>,
    /// Oldest first, one entry per day including days without searches.
    pub per_day: Vec<DayCount>,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url` and make sure the
    /// schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Idempotent schema creation.
    pub async fn init(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("schema ready");
        Ok(())
    }

    // ─── Users ──────────────────────────────────────────────────

    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<i64, StoreError> {
        let result = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(email)
        .bind(password_hash)
        .bind(timestamp(Utc::now()))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, email, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    // ─── Search log ─────────────────────────────────────────────

    pub async fn insert_search(&self, record: &SearchRecord, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO search_events (city, country, lat, lon, temp_unit, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.city)
        .bind(&record.country)
        .bind(record.lat)
        .bind(record.lon)
        .bind(&record.temp_unit)
        .bind(record.user_id)
        .bind(timestamp(at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Log a search without letting a storage failure reach the caller.
    pub async fn record_search(&self, record: &SearchRecord) {
        if let Err(e) = self.insert_search(record, Utc::now()).await {
            warn!(city = %record.city, error = %e, "failed to record search");
        }
    }

    /// Aggregates over the whole log; the per-day series covers the seven
    /// days ending at `now`.
    pub async fn analytics(&self, now: DateTime<Utc>) -> Result<Analytics, StoreError> {
        let total_searches = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM search_events")
            .fetch_one(&self.pool)
            .await?;

        // Same key as `top_cities`: case-insensitive name plus country.
        let distinct_cities = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM (SELECT 1 FROM search_events GROUP BY lower(city), country)",
        )
        .fetch_one(&self.pool)
        .await?;

        let top_cities = sqlx::query_as::<_, (String, Option<String>, i64)>(
            r#"
            SELECT MIN(city) AS name, country, COUNT(*) AS n
            FROM search_events
            GROUP BY lower(city), country
            ORDER BY n DESC, name ASC
            LIMIT ?
            "#,
        )
        .bind(TOP_CITIES)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(city, country, count)| CityCount { city, country, count })
        .collect();

        let by_unit = sqlx::query_as::<_, (String, i64)>(
            "SELECT temp_unit, COUNT(*) AS n FROM search_events GROUP BY temp_unit ORDER BY n DESC, temp_unit ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(unit, count)| UnitCount { unit, count })
        .collect();

        let first_day = (now - Duration::days(ANALYTICS_DAYS - 1)).date_naive();
        let cutoff = first_day.format("%Y-%m-%d").to_string();
        let counted: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT substr(created_at, 1, 10) AS day, COUNT(*)
            FROM search_events
            WHERE created_at >= ?
            GROUP BY day
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let per_day = (0..ANALYTICS_DAYS)
            .map(|offset| {
                let day = (first_day + Duration::days(offset)).format("%Y-%m-%d").to_string();
                let count = counted.get(&day).copied().unwrap_or(0);
                DayCount { day, count }
            })
            .collect();

        Ok(Analytics {
            total_searches,
            distinct_cities,
            top_cities,
            by_unit,
            per_day,
        })
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
