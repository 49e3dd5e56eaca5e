//! Environment-backed runtime configuration.
//!
//! All settings come from the process environment (a `.env` file is loaded
//! at startup when present). Only the portal credentials are required;
//! everything else carries a default.

use figment::{Figment, providers::Env};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub wodboard_username: String,
    pub wodboard_password: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Numeric id of the gym's timetable, i.e. the `/calendars/{id}` path.
    #[serde(default = "default_calendar_id")]
    pub calendar_id: u32,

    /// Activity keyword a session entry must contain to be a candidate.
    #[serde(default = "default_activity")]
    pub activity: String,

    /// Control id of the portal's class-type filter checkbox, e.g.
    /// `ct-ClassType4458`. When unset the crawler relies on keyword
    /// filtering alone.
    #[serde(default = "default_class_type_filter")]
    pub class_type_filter: Option<String>,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default = "default_months_to_scan")]
    pub months_to_scan: u32,

    /// Upper bound on concurrently executing booking attempts.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new().merge(Env::raw()).extract()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.wodboard_username.clone(),
            password: self.wodboard_password.clone(),
        }
    }
}

/// Portal login credentials. Opaque to the rest of the system; only the
/// login flow ever reads them.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_base_url() -> String {
    "https://www.wodboard.com".to_owned()
}

fn default_calendar_id() -> u32 {
    423
}

fn default_activity() -> String {
    "Calisthenics".to_owned()
}

fn default_class_type_filter() -> Option<String> {
    Some("ct-ClassType4458".to_owned())
}

fn default_store_path() -> PathBuf {
    PathBuf::from("events.csv")
}

fn default_months_to_scan() -> u32 {
    6
}

fn default_pool_size() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_headless() -> bool {
    true
}
