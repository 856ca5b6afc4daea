//! HTTP transport shared by every tidefs RPC client

use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tidefs_common::{Error, ErrorBody, Result};
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection to one tidefs service
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct RpcClient {
    address: String,
    base_url: String,
    http: reqwest::Client,
}

impl RpcClient {
    /// Create a client for `address` (`host:port` or a full URL)
    ///
    /// No connection is made until the first call.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let base_url = if address.contains("://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{address}")
        };

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::configuration(format!("http client for {address}: {e}")))?;

        Ok(Self {
            address,
            base_url,
            http,
        })
    }

    /// Address this client was created with
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Absolute URL of `path` on this service
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send the request built by `build`, retrying once on transport errors
    ///
    /// Any HTTP status counts as delivered; use [`RpcClient::check`] to turn
    /// error statuses into errors.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        match self.send_once(&build).await {
            Err(e) if e.is_retryable() => {
                debug!(address = %self.address, error = %e, "rpc failed, retrying once");
                self.send_once(&build).await
            }
            other => other,
        }
    }

    async fn send_once<F>(&self, build: &F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        build(&self.http).send().await.map_err(transport_error)
    }

    /// Pass successful responses through, map the others to an `Error`
    ///
    /// `map` sees the status code first; statuses it leaves
    /// alone fall back to [`Error::from_status`].
    pub async fn check<M>(response: Response, map: M) -> Result<Response>
    where
        M: FnOnce(u16) -> Option<Error>,
    {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        if let Some(err) = map(code) {
            return Err(err);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Err(Error::from_status(code, message))
    }
}

/// Classify a reqwest failure
pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else if e.is_connect() {
        Error::ConnectionFailed(e.to_string())
    } else if e.is_decode() {
        Error::Serialization(e.to_string())
    } else {
        Error::remote(e.to_string())
    }
}
