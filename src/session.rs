//! Browser-like HTTP session shared by page probes and transfers
//!
//! Two [`reqwest::Client`]s share one cookie jar and carry the default
//! desktop-browser headers. Extraction wraps the page client in a
//! [`SessionContext`] bound to the page being probed, so every follow-up
//! request (iframes, AJAX endpoints, player configs) carries the page as its
//! `Referer` and shares the cookies the page set.

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// `Accept` value of a top-level browser navigation
const NAVIGATION_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Default headers sent with every request made through the shared client
pub fn default_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::USER_AGENT, user_agent);
    insert(&mut headers, header::ACCEPT, NAVIGATION_ACCEPT);
    insert(&mut headers, header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    insert(&mut headers, header::UPGRADE_INSECURE_REQUESTS, "1");
    insert(&mut headers, HeaderName::from_static("sec-fetch-dest"), "document");
    insert(&mut headers, HeaderName::from_static("sec-fetch-mode"), "navigate");
    insert(&mut headers, HeaderName::from_static("sec-fetch-site"), "none");
    insert(&mut headers, HeaderName::from_static("sec-fetch-user"), "?1");
    insert(&mut headers, header::CACHE_CONTROL, "max-age=0");
    headers
}

/// Insert a header, skipping values that are not valid header text
pub(crate) fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => {
            tracing::warn!(header = %name, error = %e, "skipping invalid header value");
        }
    }
}

/// The two clients a downloader runs with
///
/// Both carry the browser defaults and share one cookie jar, so cookies set
/// while probing a page ride along with the media request.
#[derive(Clone, Debug)]
pub struct HttpClients {
    /// Page fetches and probes; reqwest negotiates and decodes gzip
    pub page: reqwest::Client,
    /// Media bodies; never decodes, so bytes on disk match the server's offsets
    pub transfer: reqwest::Client,
}

/// Build the page and transfer clients over a shared cookie jar
pub fn build_clients(config: &ExtractionConfig, connect_timeout: Duration) -> Result<HttpClients> {
    let jar = Arc::new(Jar::default());
    let page = reqwest::Client::builder()
        .default_headers(default_headers(&config.user_agent))
        .cookie_provider(Arc::clone(&jar))
        .gzip(true)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| Error::Other(format!("failed to build HTTP client: {}", e)))?;
    let transfer = reqwest::Client::builder()
        .default_headers(default_headers(&config.user_agent))
        .cookie_provider(jar)
        .no_gzip()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| Error::Other(format!("failed to build transfer client: {}", e)))?;
    Ok(HttpClients { page, transfer })
}

/// Session bound to one probed page
#[derive(Clone, Debug)]
pub struct SessionContext {
    client: reqwest::Client,
    page_url: Url,
}

impl SessionContext {
    /// Bind a shared client to a canonical page URL
    pub fn new(client: reqwest::Client, page_url: Url) -> Self {
        Self { client, page_url }
    }

    /// The underlying client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Canonical URL of the probed page
    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Referer sent with every follow-up request
    pub fn referer(&self) -> &str {
        self.page_url.as_str()
    }

    /// Fetch the probed page itself (no `Referer`, like a typed-in navigation)
    pub async fn fetch_page(&self, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(self.page_url.clone())
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    /// GET a URL and return its body as text
    ///
    /// Adds `Referer` unless `extra` already carries one. Non-2xx responses are errors.
    pub async fn fetch_text(&self, url: &str, timeout: Duration, extra: HeaderMap) -> Result<String> {
        let response = self.get(url, timeout, extra).await?;
        Ok(response.text().await?)
    }

    /// GET a URL and parse its body as JSON
    pub async fn fetch_json(
        &self,
        url: &str,
        timeout: Duration,
        extra: HeaderMap,
    ) -> Result<serde_json::Value> {
        let body = self.fetch_text(url, timeout, extra).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get(&self, url: &str, timeout: Duration, extra: HeaderMap) -> Result<reqwest::Response> {
        let mut headers = extra;
        if !headers.contains_key(header::REFERER) {
            insert(&mut headers, header::REFERER, self.referer());
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }
}
