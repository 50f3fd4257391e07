//! Core library for the `meteo` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A two-kind error taxonomy (network vs. business failures)
//! - Cooperative cancellation tokens
//! - TTL and ETag caches
//! - A retrying, timeout-bounded JSON fetch over a pluggable HTTP transport
//! - Weather and city-list clients built on top of the above
//!
//! It is used by `meteo-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod model;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheInfo, EtagCache, TtlCache};
pub use cancel::CancellationToken;
pub use client::{CityClient, PageQuery, WeatherClient, WeatherQuery};
pub use config::Config;
pub use error::{ErrorCode, FetchError, NetworkCause};
pub use fetch::{FetchOptions, FetchResponse, RequestOutcome, fetch_json};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use model::{City, CityId, CityWeatherOutcome, CurrentWeather, PageResult, WeatherResult};
