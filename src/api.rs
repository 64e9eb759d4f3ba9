//! Typed access to the monitoring backend.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;

use crate::http_client::{self, HttpReply, MAX_DOWNLOAD_BYTES, MAX_JSON_BYTES, TransportError};
use crate::session::SessionStore;

/// Backend endpoints consumed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Stars,
    Predictions,
    Datasets,
    Pipeline,
    UserStats,
    SolarFlux,
    News,
    EarthLive,
    SyntheticUpload,
    SyntheticGenerate,
    SyntheticGenerateAi,
    Chat,
}

impl Endpoint {
    /// Resources fetched on every state refresh, in settle order.
    pub const POLLED: [Endpoint; 7] = [
        Endpoint::Stars,
        Endpoint::Predictions,
        Endpoint::Datasets,
        Endpoint::Pipeline,
        Endpoint::UserStats,
        Endpoint::SolarFlux,
        Endpoint::News,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Stars => "/api/stars",
            Self::Predictions => "/api/predictions/upcoming",
            Self::Datasets => "/api/datasets/status",
            Self::Pipeline => "/api/pipeline/status",
            Self::UserStats => "/api/user/stats",
            Self::SolarFlux => "/api/solar/flux",
            Self::News => "/api/news",
            Self::EarthLive => "/api/earth/live",
            Self::SyntheticUpload => "/api/synthetic/upload",
            Self::SyntheticGenerate => "/api/synthetic/generate",
            Self::SyntheticGenerateAi => "/api/synthetic/generate_ai",
            Self::Chat => "/api/chat",
        }
    }
}

/// Outcome of one request: a reply with any status, or no reply at all.
pub type FetchResult = Result<HttpReply, TransportError>;

/// Request body for POST endpoints.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart { boundary: String, bytes: Vec<u8> },
}

/// Seam between the dashboard and the network.
///
/// `Sync` because a refresh issues its GETs from scoped worker threads.
pub trait ResourceFetcher: Sync {
    fn get(&self, endpoint: Endpoint) -> FetchResult;

    fn post(&self, endpoint: Endpoint, body: RequestBody) -> FetchResult;
}

impl<F: ResourceFetcher + ?Sized> ResourceFetcher for &F {
    fn get(&self, endpoint: Endpoint) -> FetchResult {
        (**self).get(endpoint)
    }

    fn post(&self, endpoint: Endpoint, body: RequestBody) -> FetchResult {
        (**self).post(endpoint, body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid base URL '{url}': {source}")]
    BaseUrl {
        url: String,
        source: url::ParseError,
    },
}

/// HTTP implementation of [`ResourceFetcher`] with bearer auth.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|source| ApiError::BaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self { base, session })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Absolute URL for `endpoint`, with a cache-busting `t` query parameter.
    pub fn url_for(&self, endpoint: Endpoint, cache_bust: u128) -> Url {
        let mut url = self.base.clone();
        url.set_path(endpoint.path());
        url.query_pairs_mut()
            .clear()
            .append_pair("t", &cache_bust.to_string());
        url
    }

    fn request(&self, method: &str, endpoint: Endpoint) -> ureq::Request {
        let url = self.url_for(endpoint, unix_millis());
        let mut request = http_client::agent()
            .request_url(method, &url)
            .set("Accept", "application/json");
        match self.session.token() {
            Ok(Some(token)) => {
                request = request.set("Authorization", &format!("Bearer {}", token.trim()));
            }
            Ok(None) => {}
            Err(err) => tracing::warn!("Session token unavailable: {err}"),
        }
        request
    }
}

impl ResourceFetcher for ApiClient {
    fn get(&self, endpoint: Endpoint) -> FetchResult {
        http_client::settle(self.request("GET", endpoint).call(), MAX_JSON_BYTES)
    }

    fn post(&self, endpoint: Endpoint, body: RequestBody) -> FetchResult {
        let request = self.request("POST", endpoint);
        let result = match body {
            RequestBody::Json(value) => request.send_json(value),
            RequestBody::Multipart { boundary, bytes } => request
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={boundary}"),
                )
                .send_bytes(&bytes),
        };
        http_client::settle(result, MAX_DOWNLOAD_BYTES)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
