use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::ResponseCache;
use crate::config::OrganizerConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub country: Option<String>,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: String,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Deserialize)]
struct RawWeather {
    name: String,
    main: RawMain,
    #[serde(default)]
    weather: Vec<RawCondition>,
    wind: Option<RawWind>,
    sys: Option<RawSys>,
}

#[derive(Deserialize)]
struct RawMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Deserialize)]
struct RawCondition {
    main: String,
    description: String,
    icon: Option<String>,
}

#[derive(Deserialize)]
struct RawWind {
    speed: f64,
}

#[derive(Deserialize)]
struct RawSys {
    country: Option<String>,
}

impl From<RawWeather> for WeatherReport {
    fn from(raw: RawWeather) -> Self {
        let condition = raw.weather.into_iter().next();
        Self {
            city: raw.name,
            country: raw.sys.and_then(|sys| sys.country),
            temperature_c: raw.main.temp,
            feels_like_c: raw.main.feels_like,
            humidity: raw.main.humidity,
            wind_speed: raw.wind.map(|wind| wind.speed).unwrap_or_default(),
            condition: condition
                .as_ref()
                .map(|c| c.main.clone())
                .unwrap_or_default(),
            description: condition
                .as_ref()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            icon: condition.and_then(|c| c.icon),
        }
    }
}

#[derive(Deserialize)]
struct ProviderError {
    message: Option<String>,
}

/// Current conditions by city name, OpenWeatherMap-compatible.
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cache: ResponseCache<WeatherReport>,
}

impl WeatherClient {
    pub fn new(config: &OrganizerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.weather.base_url.trim_end_matches('/').to_string(),
            api_key: config.weather.api_key.clone().filter(|key| !key.is_empty()),
            cache: ResponseCache::new(config.cache_ttl()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn cache_key(city: &str) -> String {
        format!("weather:{}", city.trim().to_lowercase())
    }

    pub async fn current(&self, city: &str) -> AppResult<WeatherReport> {
        let key = Self::cache_key(city);
        if let Some(report) = self.cache.get(&key).await {
            debug!(city, "weather cache hit");
            return Ok(report);
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::ModuleUnavailable {
            module: "weather".into(),
            reason: "no weather api key configured".into(),
        })?;

        let response = self
            .http
            .get(format!("{}/weather", self.base_url))
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ProviderError>()
                .await
                .ok()
                .and_then(|err| err.message)
                .unwrap_or_else(|| status.to_string());
            warn!(city, %status, "weather provider rejected request");
            return Err(AppError::validation(format!("weather lookup failed: {message}")));
        }
        let report = WeatherReport::from(response.json::<RawWeather>().await?);
        self.cache.store(key, report.clone()).await;
        Ok(report)
    }

    pub async fn invalidate(&self, city: &str) {
        self.cache.invalidate(&Self::cache_key(city)).await;
    }

    #[cfg(test)]
    pub(crate) async fn prime(&self, city: &str, report: WeatherReport) {
        self.cache.store(Self::cache_key(city), report).await;
    }
}
