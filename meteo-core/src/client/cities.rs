use std::{sync::Arc, time::Duration};

use reqwest::Url;
use tracing::debug;

use crate::{
    cache::EtagCache,
    cancel::CancellationToken,
    error::{ErrorCode, FetchError, NetworkCause},
    fetch::{FetchOptions, FetchResponse, fetch_json},
    http::HttpTransport,
    model::{City, PageResult},
};

use super::{endpoint, unexpected_payload};

pub const DEFAULT_CITIES_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct PageQuery {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
    pub cancel: Option<CancellationToken>,
    /// Send and store validators for conditional requests.
    pub use_etag: bool,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            cancel: None,
            use_etag: true,
        }
    }
}

/// Client for the city list service.
#[derive(Debug, Clone)]
pub struct CityClient {
    http: Arc<dyn HttpTransport>,
    etags: Arc<EtagCache<PageResult>>,
    base_url: String,
}

impl CityClient {
    pub fn new(
        http: Arc<dyn HttpTransport>,
        etags: Arc<EtagCache<PageResult>>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            etags,
            base_url: base_url.into(),
        }
    }

    pub fn etag_cache(&self) -> &EtagCache<PageResult> {
        &self.etags
    }

    pub fn clear_cache(&self) {
        self.etags.clear();
    }

    /// One page of cities. With `use_etag`, a repeat request for the same page
    /// is made conditional and a `304` answer is served from the ETag cache.
    pub async fn get_cities_paginated(&self, query: PageQuery) -> Result<PageResult, FetchError> {
        let page = query.page.to_string();
        let limit = query.limit.to_string();
        let url = endpoint(
            &self.base_url,
            "cities",
            &[("_page", page.as_str()), ("_limit", limit.as_str())],
        )?;

        let mut options = FetchOptions::default()
            .retries(2)
            .backoff(Duration::from_millis(500))
            .timeout(Duration::from_millis(5000))
            .cancel(query.cancel);

        if query.use_etag {
            if let Some(etag) = self.etags.get_etag(&url) {
                options = options.header("If-None-Match", etag);
            }
        }

        let response = fetch_json(self.http.as_ref(), &url, &options).await?;

        if response.is_not_modified() {
            debug!(url = %url, "conditional hit, serving cached page");
            return match self.etags.get_data(&url) {
                Some(cached) => Ok(PageResult {
                    from_cache: true,
                    cache_hit: true,
                    ..cached
                }),
                None => Err(FetchError::network(
                    "server reported no change for a page that is not cached",
                    Some(304),
                    NetworkCause::Unclassified,
                )),
            };
        }

        let etag = response.header("etag").map(str::to_owned);
        let total = total_count(&response);
        let has_more = has_next_link(&response);

        let data: Vec<City> =
            serde_json::from_value(response.data).map_err(|e| unexpected_payload("city list", e))?;

        let result = PageResult {
            data,
            page: query.page,
            limit: query.limit,
            total,
            has_more,
            from_cache: false,
            cache_hit: false,
        };

        if query.use_etag {
            if let Some(etag) = etag {
                self.etags.set(url, etag, result.clone());
            }
        }

        Ok(result)
    }

    /// Cities whose name contains `query`. Never cached.
    pub async fn search_cities(
        &self,
        query: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<City>, FetchError> {
        let url = endpoint(&self.base_url, "cities", &[("name_like", query)])?;
        let options = FetchOptions::default().retries(1).cancel(cancel);

        let response = fetch_json(self.http.as_ref(), &url, &options).await?;

        serde_json::from_value(response.data).map_err(|e| unexpected_payload("city list", e))
    }

    pub async fn get_city_by_id(
        &self,
        id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<City, FetchError> {
        let url = city_url(&self.base_url, id)?;
        let options = FetchOptions::default()
            .retries(1)
            .timeout(Duration::from_millis(3000))
            .cancel(cancel);

        let response = fetch_json(self.http.as_ref(), &url, &options)
            .await
            .map_err(|err| match err.code() {
                Some(ErrorCode::NotFound) => FetchError::business(
                    format!("city {id} not found"),
                    ErrorCode::CityNotFound,
                    err.status(),
                ),
                _ => err,
            })?;

        serde_json::from_value(response.data).map_err(|e| unexpected_payload("city", e))
    }
}

/// `{base}/cities/{id}` with `id` percent-encoded as a single path segment.
fn city_url(base: &str, id: &str) -> Result<String, FetchError> {
    let mut url = Url::parse(&endpoint(base, "cities", &[])?).map_err(|e| {
        FetchError::network(format!("invalid endpoint: {e}"), None, NetworkCause::Unclassified)
    })?;

    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.push(id);
        }
        Err(()) => {
            return Err(FetchError::network(
                format!("cannot append a path to '{base}'"),
                None,
                NetworkCause::Unclassified,
            ));
        }
    }

    Ok(url.into())
}

fn total_count(response: &FetchResponse) -> Option<u64> {
    response
        .header("x-total-count")
        .and_then(|v| v.trim().parse().ok())
}

fn has_next_link(response: &FetchResponse) -> bool {
    response
        .header("link")
        .is_some_and(|link| link.contains("rel=\"next\""))
}
