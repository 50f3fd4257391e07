//! Human-friendly output formatting.

use std::fmt::Write as _;

use chrono::Local;
use meteo_core::{
    CacheInfo, City, CityWeatherOutcome, ErrorCode, FetchError, PageResult, WeatherResult,
};

pub fn weather(result: &WeatherResult) -> String {
    let w = &result.data;
    let mut out = String::new();

    let place = match &w.sys.country {
        Some(country) => format!("{}, {}", w.name, country),
        None => w.name.clone(),
    };
    let tag = if result.from_cache { "  [cached]" } else { "" };
    let _ = writeln!(out, "{place}{tag}");

    let condition = w
        .condition()
        .map(|c| c.description.as_str())
        .unwrap_or("unknown");
    let _ = writeln!(
        out,
        "  {condition}, {}°C (feels like {}°C)",
        w.temperature_c(),
        w.feels_like_c()
    );

    let _ = write!(
        out,
        "  humidity {}%  pressure {} hPa  wind {:.1} m/s",
        w.main.humidity, w.main.pressure, w.wind.speed
    );
    if let Some(visibility) = w.visibility {
        let _ = write!(out, "  visibility {:.1} km", f64::from(visibility) / 1000.0);
    }
    out.push('\n');

    if let Some(observed) = w.observed_at() {
        let local = observed.with_timezone(&Local);
        let _ = writeln!(out, "  observed {}", local.format("%Y-%m-%d %H:%M"));
    }

    out
}

pub fn outcome(outcome: &CityWeatherOutcome) -> String {
    match &outcome.result {
        Ok(result) => weather(result),
        Err(err) => format!("{}\n  {}\n", outcome.city, failure(err).replace('\n', "\n  ")),
    }
}

/// `[network]` or `[CODE]` badge and message, plus a hint for weather API
/// key and throttling errors.
pub fn failure(err: &FetchError) -> String {
    let badge = match err {
        FetchError::Network { .. } => "[network]".to_string(),
        FetchError::Business { code, .. } => format!("[{code}]"),
    };

    let mut out = format!("{badge} {}", err.message());
    match err.code() {
        Some(ErrorCode::RateLimitExceeded) => out.push_str(
            "\nHint: the weather provider is throttling requests, wait a minute and try again.",
        ),
        Some(ErrorCode::ApiKeyError) => {
            out.push_str("\nHint: check your API key with `meteo configure`.")
        }
        _ => {}
    }
    out
}

pub fn city(city: &City) -> String {
    let id = city
        .id
        .as_ref()
        .map_or_else(|| "?".to_string(), ToString::to_string);
    let name = city.name.as_deref().unwrap_or("(unnamed)");

    match &city.country {
        Some(country) => format!("#{id:<4} {name} ({country})"),
        None => format!("#{id:<4} {name}"),
    }
}

pub fn page(page: &PageResult) -> String {
    let mut out = String::new();

    let mut header = format!("Cities, page {}", page.page);
    if let Some(total) = page.total {
        let pages = total.div_ceil(u64::from(page.limit.max(1)));
        let _ = write!(header, " of {pages} ({total} total)");
    }
    if page.cache_hit {
        header.push_str("  [not modified, cached]");
    }
    let _ = writeln!(out, "{header}");

    if page.data.is_empty() {
        out.push_str("  (no cities)\n");
    }
    for c in &page.data {
        let _ = writeln!(out, "  {}", city(c));
    }
    if page.has_more {
        out.push_str("  ...more on the next page\n");
    }

    out
}

pub fn cache_info(city: &str, info: Option<CacheInfo>) -> String {
    match info {
        None => format!("{city}: not cached"),
        Some(info) if info.expired => format!("{city}: cached entry expired"),
        Some(info) => format!("{city}: cached, fresh for {} s", info.remaining_secs),
    }
}
