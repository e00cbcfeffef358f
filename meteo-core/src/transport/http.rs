use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::TransportError;

use super::{HttpRequest, HttpResponse, Transport};

/// Base stage: performs the request over the network.
///
/// Non-2xx statuses become [`TransportError::Status`] so outer stages only ever
/// see successful responses in `Ok`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        tracing::debug!(url = %request.url, params = ?request.params, "sending request");

        let res = self.http.get(&request.url).query(&request.params).send().await?;

        let status = res.status();
        let body = res.bytes().await?.to_vec();

        if !status.is_success() {
            return Err(TransportError::status(status.as_u16(), &body));
        }

        Ok(HttpResponse { status: status.as_u16(), body })
    }
}
