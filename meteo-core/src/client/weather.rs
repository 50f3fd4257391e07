use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tracing::debug;

use crate::{
    cache::{CacheInfo, TtlCache},
    cancel::CancellationToken,
    error::{ErrorCode, FetchError, NetworkCause},
    fetch::{FetchOptions, fetch_json},
    http::HttpTransport,
    model::{CityWeatherOutcome, CurrentWeather, WeatherResult},
};

use super::{endpoint, unexpected_payload};

/// How long a weather lookup stays fresh.
pub const WEATHER_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone, Default)]
pub struct WeatherQuery {
    /// Skip the cache read. The fresh result is still written back.
    pub ignore_cache: bool,
    pub cancel: Option<CancellationToken>,
}

/// Current-weather lookups by city name, in front of a TTL cache.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Arc<dyn HttpTransport>,
    cache: Arc<TtlCache<CurrentWeather>>,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        cache: Arc<TtlCache<CurrentWeather>>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cache,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn cache(&self) -> &TtlCache<CurrentWeather> {
        &self.cache
    }

    fn cache_key(city: &str) -> String {
        format!("weather:{}", city.to_lowercase())
    }

    pub async fn get_weather_by_city(
        &self,
        city: &str,
        query: WeatherQuery,
    ) -> Result<WeatherResult, FetchError> {
        let key = Self::cache_key(city);

        if !query.ignore_cache {
            if let Some(data) = self.cache.get(&key) {
                debug!(city, "weather cache hit");
                return Ok(WeatherResult {
                    data,
                    from_cache: true,
                });
            }
            debug!(city, "weather cache miss");
        }

        let url = endpoint(
            &self.base_url,
            "weather",
            &[("q", city), ("appid", self.api_key.as_str()), ("lang", "ru")],
        )?;
        let options = FetchOptions::default()
            .retries(2)
            .backoff(Duration::from_millis(500))
            .timeout(Duration::from_millis(5000))
            .cancel(query.cancel);

        let response = fetch_json(self.http.as_ref(), &url, &options)
            .await
            .map_err(remap_error)?;

        let data: CurrentWeather =
            serde_json::from_value(response.data).map_err(|e| unexpected_payload("weather", e))?;

        self.cache.set(key, data.clone());

        Ok(WeatherResult {
            data,
            from_cache: false,
        })
    }

    /// Lookup several cities at once. Results keep the input order and one
    /// failing city does not affect the others.
    pub async fn get_weather_for_cities<S: AsRef<str>>(
        &self,
        cities: &[S],
        query: WeatherQuery,
    ) -> Vec<CityWeatherOutcome> {
        let lookups = cities.iter().map(|city| {
            let city = city.as_ref();
            let query = query.clone();
            async move {
                CityWeatherOutcome {
                    city: city.to_string(),
                    result: self.get_weather_by_city(city, query).await,
                }
            }
        });

        join_all(lookups).await
    }

    pub fn cache_info(&self, city: &str) -> Option<CacheInfo> {
        self.cache.cache_info(&Self::cache_key(city))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn remap_error(err: FetchError) -> FetchError {
    // Cancellation is a Network error too, so this also keeps it untouched.
    if matches!(err, FetchError::Network { .. }) {
        return err;
    }

    match err.status() {
        Some(404) => FetchError::business("city not found", ErrorCode::CityNotFound, Some(404)),
        Some(401) => {
            FetchError::business("invalid weather API key", ErrorCode::ApiKeyError, Some(401))
        }
        Some(429) => FetchError::business(
            "weather API rate limit exceeded",
            ErrorCode::RateLimitExceeded,
            Some(429),
        ),
        status => FetchError::network(
            format!("weather request failed: {}", err.message()),
            status,
            NetworkCause::Unclassified,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, Step, empty, json, moscow_weather};

    fn client_with(transport: Arc<ScriptedTransport>) -> WeatherClient {
        WeatherClient::new(
            transport,
            Arc::new(TtlCache::new(WEATHER_CACHE_TTL)),
            "http://weather.test/data/2.5",
            "KEY",
        )
    }

    fn moscow_ok() -> Step {
        Step::Respond(json(200, moscow_weather()))
    }

    #[tokio::test(start_paused = true)]
    async fn second_lookup_is_served_from_cache_case_insensitively() {
        let transport = Arc::new(ScriptedTransport::new().on("q=Moscow", moscow_ok()));
        let client = client_with(transport.clone());

        let first = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.data.name, "Moscow");

        let second = client.get_weather_by_city("moscow", WeatherQuery::default()).await;
        let second = second.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.data, first.data);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_carries_city_key_and_language() {
        let transport = Arc::new(ScriptedTransport::new().on("q=Moscow", moscow_ok()));
        let client = client_with(transport.clone());

        client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();

        let requests = transport.requests();
        let url = &requests[0].url;
        assert!(url.starts_with("http://weather.test/data/2.5/weather?"), "{url}");
        assert!(url.contains("appid=KEY"));
        assert!(url.contains("lang=ru"));
    }

    #[tokio::test(start_paused = true)]
    async fn ignore_cache_bypasses_read_but_writes_back() {
        let mut updated = moscow_weather();
        updated["main"]["temp"] = serde_json::json!(280.15);

        let transport = Arc::new(
            ScriptedTransport::new()
                .on("q=Moscow", moscow_ok())
                .on("q=Moscow", Step::Respond(json(200, updated))),
        );
        let client = client_with(transport.clone());

        client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        let fresh = client
            .get_weather_by_city(
                "Moscow",
                WeatherQuery {
                    ignore_cache: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!fresh.from_cache);
        assert_eq!(transport.calls(), 2);

        let cached = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        assert!(cached.from_cache);
        assert_eq!(cached.data.temperature_c(), 7);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ten_minutes() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("q=Moscow", moscow_ok())
                .on("q=Moscow", moscow_ok()),
        );
        let client = client_with(transport.clone());

        client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        assert_eq!(client.cache_info("MOSCOW").map(|i| i.remaining_secs), Some(600));

        tokio::time::advance(WEATHER_CACHE_TTL + Duration::from_secs(1)).await;

        let again = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cache_forces_network() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("q=Moscow", moscow_ok())
                .on("q=Moscow", moscow_ok()),
        );
        let client = client_with(transport.clone());

        client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        client.clear_cache();
        assert!(client.cache_info("Moscow").is_none());

        let again = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap();
        assert!(!again.from_cache);
    }

    #[tokio::test(start_paused = true)]
    async fn status_errors_are_remapped_to_weather_codes() {
        for (status, code) in [
            (404, ErrorCode::CityNotFound),
            (401, ErrorCode::ApiKeyError),
            (429, ErrorCode::RateLimitExceeded),
        ] {
            let transport = Arc::new(ScriptedTransport::new().on("weather", Step::Respond(empty(status))));
            let client = client_with(transport.clone());

            let err = client.get_weather_by_city("Atlantis", WeatherQuery::default()).await.unwrap_err();

            assert_eq!(err.code(), Some(code), "status {status}");
            assert_eq!(err.status(), Some(status));
            assert_eq!(transport.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn forbidden_is_wrapped_as_network() {
        let transport = Arc::new(ScriptedTransport::new().on("weather", Step::Respond(empty(403))));
        let client = client_with(transport);

        let err = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap_err();

        assert!(matches!(err, FetchError::Network { status: Some(403), .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_pass_through_after_retries() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("weather", Step::Respond(empty(500)))
                .on("weather", Step::Respond(empty(500)))
                .on("weather", Step::Respond(empty(502))),
        );
        let client = client_with(transport.clone());

        let err = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Network { status: Some(502), cause: NetworkCause::Status, .. }
        ));
        assert_eq!(transport.calls(), 3);
        assert!(client.cache_info("Moscow").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_surfaces_as_cancelled_network_error() {
        let transport = Arc::new(ScriptedTransport::new().on("weather", Step::Hang));
        let client = client_with(transport);
        let token = CancellationToken::new();

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = client
            .get_weather_by_city(
                "Moscow",
                WeatherQuery {
                    ignore_cache: false,
                    cancel: Some(token),
                },
            )
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(err.message(), "request was cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_becomes_network_error_and_is_not_cached() {
        let transport = Arc::new(
            ScriptedTransport::new().on("weather", Step::Respond(json(200, serde_json::json!({ "cod": 200 })))),
        );
        let client = client_with(transport);

        let err = client.get_weather_by_city("Moscow", WeatherQuery::default()).await.unwrap_err();

        assert!(matches!(err, FetchError::Network { cause: NetworkCause::Unclassified, .. }));
        assert!(client.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn batch_lookup_keeps_order_and_isolates_failures() {
        let mut kazan = moscow_weather();
        kazan["name"] = serde_json::json!("Kazan");

        let transport = Arc::new(
            ScriptedTransport::new()
                .on("q=Moscow", moscow_ok())
                .on("q=Atlantis", Step::Respond(empty(404)))
                .on("q=Kazan", Step::Respond(json(200, kazan))),
        );
        let client = client_with(transport.clone());

        let results = client
            .get_weather_for_cities(&["Moscow", "Atlantis", "Kazan"], WeatherQuery::default())
            .await;

        assert_eq!(results.len(), 3);
        let names: Vec<_> = results.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, ["Moscow", "Atlantis", "Kazan"]);

        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());
        assert_eq!(
            results[1].result.as_ref().unwrap_err().code(),
            Some(ErrorCode::CityNotFound)
        );
        assert_eq!(results[2].result.as_ref().unwrap().data.name, "Kazan");
        assert_eq!(transport.calls(), 3);
    }
}
