/*
[INPUT]:  HTTP configuration (base URL, timeouts, pooling, authenticator)
[OUTPUT]: Configured reqwest client and request executor for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderValue;
use reqwest::{Client, Method, Request, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::http::signature::Authenticator;
use crate::http::{BitflyerError, Result};

/// Base URL for bitFlyer Lightning REST API
pub const API_BASE_URL: &str = "https://api.bitflyer.jp";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Bind outgoing connections to this local address.
    pub local_address: Option<IpAddr>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(180),
            pool_max_idle_per_host: 100,
            local_address: None,
        }
    }
}

/// Main HTTP client for bitFlyer Lightning API
pub struct BitflyerClient {
    http_client: Client,
    base_url: Url,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl fmt::Debug for BitflyerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitflyerClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.authenticator.is_some())
            .finish()
    }
}

impl BitflyerClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, API_BASE_URL)
    }

    /// Create a new client against a custom base URL
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(addr) = config.local_address {
            builder = builder.local_address(addr);
        }

        Ok(Self {
            http_client: builder.build()?,
            base_url: Url::parse(base_url)?,
            authenticator: None,
        })
    }

    /// Attach an authenticator for private endpoints
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn set_authenticator(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticator = Some(authenticator);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticator.is_some()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build request builder for an endpoint path
    pub(crate) fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Send a public request and decode its JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.execute(builder.build()?).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Sign and send a private request, decoding its JSON body
    pub(crate) async fn send_signed_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T> {
        let request = self.sign(builder.build()?)?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Sign and send a private request whose success response has no body
    pub(crate) async fn send_signed_empty(&self, builder: RequestBuilder) -> Result<()> {
        let request = self.sign(builder.build()?)?;
        self.execute(request).await?;
        Ok(())
    }

    fn sign(&self, mut request: Request) -> Result<Request> {
        let authenticator = self.authenticator.as_ref().ok_or_else(|| {
            BitflyerError::Config("private endpoint requires an authenticator".to_string())
        })?;

        let timestamp = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string();
        let url = request.url();
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .unwrap_or_default();
        let headers = authenticator.auth_headers(
            &timestamp,
            request.method().as_str(),
            &path_and_query,
            body,
        );

        for (name, value) in headers {
            let value = HeaderValue::from_str(&value).map_err(|e| {
                BitflyerError::Config(format!("invalid {name} header value: {e}"))
            })?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }

    async fn execute(&self, request: Request) -> Result<Vec<u8>> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending request");

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status != StatusCode::OK {
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(%method, %url, %status, %body, "unexpected status");
            return Err(BitflyerError::api_error(status, body));
        }
        Ok(body.to_vec())
    }
}
