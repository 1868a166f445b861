//! Outbound HTTP for business logic.
//!
//! One blocking client is shared by every transaction; it is built once at
//! chaincode startup with the configured timeouts. Only `http` and `https`
//! URLs are accepted; everything else is reported through the callback
//! channel like any other service failure.

use std::sync::Arc;

use scriptbridge_common::config::HttpConfig;
use scriptbridge_common::error::ServiceError;
use scriptbridge_core::Args;
use tracing::debug;
use url::Url;

use crate::registry::{ServiceObject, ServiceReply};

/// Builds the shared outbound HTTP client.
pub fn build_client(config: &HttpConfig) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(concat!("scriptbridge/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
}

pub struct HttpService {
    client: Arc<reqwest::blocking::Client>,
}

impl HttpService {
    pub fn new(client: Arc<reqwest::blocking::Client>) -> Self {
        Self { client }
    }

    fn post(&self, url: &str, data: &serde_json::Value) -> Result<ServiceReply, ServiceError> {
        let parsed = Url::parse(url)
            .map_err(|err| ServiceError::failed(format!("Invalid URL '{url}': {err}")))?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ServiceError::failed(format!(
                "URL scheme '{scheme}' is not supported, only http and https are"
            )));
        }

        debug!(url = %parsed, "Posting to external service");
        let response = self
            .client
            .post(parsed)
            .json(data)
            .send()
            .map_err(|err| ServiceError::failed(format!("HTTP POST failed: {err}")))?;

        let status_code = i64::from(response.status().as_u16());
        let body = response.text().map_err(|err| {
            ServiceError::failed(format!("Failed to read HTTP response body: {err}"))
        })?;
        Ok(ServiceReply::json(serde_json::json!({
            "status_code": status_code,
            "body": body,
        })))
    }
}

impl ServiceObject for HttpService {
    fn invoke(&self, method: &str, args: Args<'_>) -> Result<ServiceReply, ServiceError> {
        match method {
            "post" => self.post(args.text(0, "url")?, args.json(1, "data")?),
            other => Err(ServiceError::violation(format!(
                "unknown http service method '{other}'"
            ))),
        }
    }
}

impl std::fmt::Debug for HttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpService").finish_non_exhaustive()
    }
}
