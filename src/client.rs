//! Catalog API client.
//!
//! Provides blocking HTTP access to the dashboard API.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, instrument};

use crate::errors::QuakeError;
use crate::filters::{EarthquakeSource, RequestParams};
use crate::models::{Catalog, CatalogsResponse, EarthquakesResponse, ErrorBody};

/// Default request timeout in seconds. Large catalogs take a while.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakescope/", env!("CARGO_PKG_VERSION"));

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3002";

/// Client for the catalog API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str) -> Result<Self, QuakeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL for an endpoint path.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Fetch the active catalogs.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or response cannot be parsed.
    #[instrument(skip(self))]
    pub fn fetch_catalogs(&self) -> Result<Vec<Catalog>, QuakeError> {
        let response = self.client.get(self.url("/api/catalogs")).send()?;
        let body: CatalogsResponse = Self::parse(response)?;

        debug!("fetched {} catalogs", body.catalogs.len());
        Ok(body.catalogs)
    }

    /// Fetch earthquakes matching the given parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or response cannot be parsed.
    #[instrument(skip_all, fields(params = %params))]
    pub fn fetch_earthquakes(
        &self,
        params: &RequestParams,
    ) -> Result<EarthquakesResponse, QuakeError> {
        let response = self
            .client
            .get(self.url("/api/earthquakes"))
            .query(params.pairs())
            .send()?;
        let body: EarthquakesResponse = Self::parse(response)?;

        debug!("fetched {} events", body.count);
        Ok(body)
    }

    fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, QuakeError> {
        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(api_error(status.as_u16(), body));
        }

        let text = response.text()?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Map an error response to [`QuakeError::Api`], preferring the
/// `{ "error": ... }` message over the raw body.
fn api_error(status: u16, body: String) -> QuakeError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    QuakeError::Api { status, message }
}

impl EarthquakeSource for ApiClient {
    fn fetch(&self, params: &RequestParams) -> Result<EarthquakesResponse, QuakeError> {
        self.fetch_earthquakes(params)
    }
}
