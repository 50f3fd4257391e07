//! Scripted [`HttpTransport`] for unit tests.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use crate::{
    error::TransportError,
    http::{HttpRequest, HttpResponse, HttpTransport},
};

#[derive(Debug)]
pub(crate) enum Step {
    Respond(HttpResponse),
    Fail(String),
    /// Never completes; only a timeout or cancellation ends the attempt.
    Hang,
}

#[derive(Debug, Default)]
struct Route {
    pattern: String,
    steps: VecDeque<Step>,
}

/// Replays queued steps for every request whose URL contains a route's pattern.
/// Routes are matched in the order they were added.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, pattern: &str, step: Step) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|r| r.pattern == pattern) {
                Some(route) => route.steps.push_back(step),
                None => routes.push(Route {
                    pattern: pattern.to_string(),
                    steps: VecDeque::from([step]),
                }),
            }
        }
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn calls_matching(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(pattern))
            .count()
    }

    fn next_step(&self, url: &str) -> Option<Step> {
        let mut routes = self.routes.lock().unwrap();
        routes
            .iter_mut()
            .filter(|r| url.contains(&r.pattern))
            .find_map(|r| r.steps.pop_front())
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        match self.next_step(&request.url) {
            Some(Step::Respond(res)) => Ok(res),
            Some(Step::Fail(msg)) => Err(TransportError(msg)),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportError(format!("no scripted response for {}", request.url))),
        }
    }
}

pub(crate) fn json(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: Default::default(),
        body: serde_json::to_vec(&body).unwrap(),
    }
}

pub(crate) fn empty(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        ..Default::default()
    }
}

pub(crate) fn with_header(mut res: HttpResponse, name: &str, value: &str) -> HttpResponse {
    res.headers.insert(
        HeaderName::from_bytes(name.as_bytes()).unwrap(),
        HeaderValue::from_str(value).unwrap(),
    );
    res
}

pub(crate) fn moscow_weather() -> serde_json::Value {
    serde_json::json!({
        "name": "Moscow",
        "dt": 1_700_000_000,
        "visibility": 10000,
        "main": { "temp": 271.15, "feels_like": 268.4, "humidity": 86, "pressure": 1012 },
        "weather": [{ "icon": "13n", "description": "light snow" }],
        "wind": { "speed": 4.1 },
        "sys": { "country": "RU" }
    })
}
