//! Weather lookup against the OpenWeatherMap current-conditions API.

use crate::capability::{WeatherLookup, WeatherReport};
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    name: String,
    main: WeatherMain,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

pub struct OpenWeatherClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn report_from(response: WeatherResponse) -> WeatherReport {
        let description = response
            .weather
            .first()
            .map(|c| c.description.clone())
            .unwrap_or_else(|| "unknown conditions".to_string());
        WeatherReport {
            city: response.name,
            temperature_c: response.main.temp,
            description,
            humidity: response.main.humidity,
        }
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    async fn get(&self, city: &str) -> anyhow::Result<WeatherReport> {
        debug!(city = %city, "querying weather service");
        let response = self
            .http_client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .context("weather request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("weather service returned {status} for {city}");
        }

        let parsed: WeatherResponse = response
            .json()
            .await
            .context("weather response parse failed")?;
        Ok(Self::report_from(parsed))
    }
}
