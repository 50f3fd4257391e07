use std::{sync::Arc, time::Duration};

use reqwest::Url;

use crate::{
    Config,
    cache::{EtagCache, TtlCache},
    error::{FetchError, NetworkCause},
    http::{HttpTransport, ReqwestTransport},
};

pub mod cities;
pub mod weather;

pub use cities::{CityClient, PageQuery};
pub use weather::{WeatherClient, WeatherQuery};

/// Build `{base}/{path}?{params}`. Params are form-encoded.
pub(crate) fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));

    let url = if params.is_empty() {
        Url::parse(&raw)
    } else {
        Url::parse_with_params(&raw, params)
    }
    .map_err(|e| {
        FetchError::network(format!("invalid endpoint '{raw}': {e}"), None, NetworkCause::Unclassified)
    })?;

    Ok(url.into())
}

pub(crate) fn unexpected_payload(what: &str, err: serde_json::Error) -> FetchError {
    FetchError::network(
        format!("unexpected {what} payload: {err}"),
        None,
        NetworkCause::Unclassified,
    )
}

/// Construct a weather client from config, with a fresh cache.
pub fn weather_client_from_config(
    config: &Config,
    http: Arc<dyn HttpTransport>,
) -> anyhow::Result<WeatherClient> {
    let api_key = config.api_key()?;
    let cache = Arc::new(TtlCache::new(Duration::from_secs(config.weather_cache_ttl_secs)));

    Ok(WeatherClient::new(http, cache, config.weather_base_url.clone(), api_key))
}

/// Construct a city client from config, with a fresh ETag cache.
pub fn city_client_from_config(config: &Config, http: Arc<dyn HttpTransport>) -> CityClient {
    CityClient::new(http, Arc::new(EtagCache::new()), config.cities_base_url.clone())
}

/// Default transport shared by clients built from config.
pub fn default_transport() -> Arc<dyn HttpTransport> {
    Arc::new(ReqwestTransport::new())
}
