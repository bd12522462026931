//! Application configuration.
//!
//! Values come from Rocket's figment (`Rocket.toml`, `ROCKET_*` environment
//! variables) under the `organizer` table, e.g.
//!
//! ```toml
//! [default.organizer]
//! data_dir = "data"
//! default_route = "dashboard"
//!
//! [default.organizer.weather]
//! api_key = "..."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use rocket::figment::Figment;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::router::DEFAULT_ROUTES;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub data_dir: PathBuf,
    pub default_route: String,
    pub max_sessions: i64,
    pub cache_ttl_secs: u64,
    pub weather: WeatherConfig,
    pub news: NewsConfig,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            default_route: "dashboard".to_string(),
            max_sessions: 5,
            cache_ttl_secs: 600,
            weather: WeatherConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_city: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            default_city: "London".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub country: String,
    pub page_size: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://newsapi.org/v2".to_string(),
            country: "us".to_string(),
            page_size: 10,
        }
    }
}

#[derive(Deserialize)]
struct ConfigRoot {
    #[serde(default)]
    organizer: OrganizerConfig,
}

impl OrganizerConfig {
    pub fn from_figment(figment: &Figment) -> AppResult<Self> {
        let root: ConfigRoot = figment
            .extract()
            .map_err(|err| AppError::Config(err.to_string()))?;
        root.organizer.validate()?;
        Ok(root.organizer)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !DEFAULT_ROUTES
            .iter()
            .any(|(name, _, _)| *name == self.default_route)
        {
            return Err(AppError::Config(format!(
                "default_route '{}' is not a known route",
                self.default_route
            )));
        }
        if self.max_sessions < 1 {
            return Err(AppError::Config("max_sessions must be at least 1".into()));
        }
        if self.news.page_size == 0 {
            return Err(AppError::Config("news.page_size must be positive".into()));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("organizer.sqlite")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn ensure_data_dir(&self) -> AppResult<&Path> {
        std::fs::create_dir_all(&self.data_dir).map_err(|err| {
            AppError::Config(format!(
                "cannot create data directory {}: {err}",
                self.data_dir.display()
            ))
        })?;
        Ok(&self.data_dir)
    }
}
