use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://yearseq.db?mode=rwc";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How the issuer derives the next sequence of a partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Allocation {
    /// Read the latest record of the partition (id descending) and add one.
    #[default]
    Latest,
    /// Atomically bump a per-partition counter row.
    Counter,
}

impl FromStr for Allocation {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Allocation::Latest),
            "counter" => Ok(Allocation::Counter),
            other => Err(SettingsError::Invalid {
                key: "YEARSEQ_ALLOCATION",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    /// Attempts per issue call, including the first one.
    pub max_attempts: u32,
    pub allocation: Allocation,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            allocation: Allocation::Latest,
        }
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            settings.database_url = url;
        }
        if let Some(raw) = lookup("YEARSEQ_MAX_CONNECTIONS") {
            settings.max_connections = parse_positive("YEARSEQ_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("YEARSEQ_MAX_ATTEMPTS") {
            settings.max_attempts = parse_positive("YEARSEQ_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("YEARSEQ_ALLOCATION") {
            settings.allocation = raw.parse()?;
        }
        Ok(settings)
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u32, SettingsError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SettingsError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}
