use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

const ABSOLUTE_ZERO_C: f64 = 273.15;

/// Kelvin to whole degrees Celsius. Halves round up, so -1.5 becomes -1.
pub fn kelvin_to_celsius(kelvin: f64) -> i64 {
    (kelvin - ABSOLUTE_ZERO_C + 0.5).floor() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    /// Kelvin.
    pub temp: f64,
    /// Kelvin.
    pub feels_like: f64,
    pub humidity: u8,
    /// hPa.
    pub pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub icon: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// m/s.
    pub speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(default)]
    pub country: Option<String>,
}

/// Current conditions as returned by the weather endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub name: String,
    /// Observation time, unix seconds.
    pub dt: i64,
    /// Metres.
    #[serde(default)]
    pub visibility: Option<u32>,
    pub main: Readings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub wind: Wind,
    #[serde(default)]
    pub sys: SysInfo,
}

impl CurrentWeather {
    pub fn temperature_c(&self) -> i64 {
        kelvin_to_celsius(self.main.temp)
    }

    pub fn feels_like_c(&self) -> i64 {
        kelvin_to_celsius(self.main.feels_like)
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.weather.first()
    }

    pub fn icon_url(&self) -> Option<String> {
        self.condition()
            .map(|c| format!("https://openweathermap.org/img/wn/{}@2x.png", c.icon))
    }
}

/// Weather lookup result, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherResult {
    pub data: CurrentWeather,
    pub from_cache: bool,
}

/// One slot of a multi-city lookup.
#[derive(Debug, Clone)]
pub struct CityWeatherOutcome {
    pub city: String,
    pub result: Result<WeatherResult, FetchError>,
}

impl CityWeatherOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// City identifier as the service sends it. json-server 0.x uses numbers,
/// 1.x generates strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CityId {
    Number(u64),
    Text(String),
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CityId::Number(n) => fmt::Display::fmt(n, f),
            CityId::Text(s) => f.pad(s),
        }
    }
}

/// One item of the city list. Only the fields shown by the CLI are named;
/// none of them is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Whatever else the city service returns.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page of the city list.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub data: Vec<City>,
    pub page: u32,
    pub limit: u32,
    /// From `X-Total-Count`, when the server sends it.
    pub total: Option<u64>,
    pub has_more: bool,
    pub from_cache: bool,
    pub cache_hit: bool,
}
