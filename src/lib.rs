pub mod auth;
pub mod config;
pub mod error;
pub mod forecast;
pub mod location;
pub mod report;
pub mod server;
pub mod store;
pub mod theme;
pub mod timezone;
