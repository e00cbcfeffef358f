//! Request-handling stages sharing one contract.
//!
//! The production stack is `RetryTransport<CachedTransport<HttpTransport>>`:
//! retries wrap the cache so a cached response short-circuits every attempt.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Debug;

use crate::error::TransportError;

pub mod cache;
pub mod http;
pub mod retry;

pub use cache::CachedTransport;
pub use http::HttpTransport;
pub use retry::{RetryPolicy, RetryTransport};

/// An outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), params: Vec::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn signature(&self) -> RequestSignature {
        RequestSignature::of(self)
    }
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Normalised identity of a request, used as the cache key.
///
/// Parameter order and a trailing slash on the URL do not change the signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature {
    method: &'static str,
    url: String,
    params: Vec<(String, String)>,
}

impl RequestSignature {
    fn of(request: &HttpRequest) -> Self {
        let mut params = request.params.clone();
        params.sort();
        Self {
            method: "GET",
            url: request.url.trim_end_matches('/').to_string(),
            params,
        }
    }

    /// Canonical `METHOD url?k=v&k=v` form.
    pub fn canonical(&self) -> String {
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{} {}?{}", self.method, self.url, query)
    }

    /// Hex SHA-256 of the canonical form.
    pub fn key(&self) -> String {
        let digest = Sha256::digest(self.canonical().as_bytes());
        format!("{digest:x}")
    }
}

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn issue(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn issue(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).issue(request).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the stage tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub type Outcome = Result<HttpResponse, TransportError>;

    /// Replays queued outcomes; once the queue is empty, repeats `fallback`.
    #[derive(Debug)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Outcome>>,
        fallback: fn() -> Outcome,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Outcome>, fallback: fn() -> Outcome) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        pub fn calls(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn issue(&self, _request: &HttpRequest) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| (self.fallback)())
        }
    }

    pub fn ok(body: &str) -> Outcome {
        Ok(HttpResponse { status: 200, body: body.as_bytes().to_vec() })
    }

    pub fn unavailable() -> Outcome {
        Err(TransportError::status(503, b"try later"))
    }

    pub fn not_found() -> Outcome {
        Err(TransportError::status(404, b"nope"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_ignores_param_order() {
        let a = HttpRequest::get("https://api.example.com/v1/forecast")
            .param("latitude", 52.52)
            .param("longitude", 13.405);
        let b = HttpRequest::get("https://api.example.com/v1/forecast/")
            .param("longitude", 13.405)
            .param("latitude", 52.52);

        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature().key(), b.signature().key());
    }

    #[test]
    fn signature_distinguishes_values() {
        let a = HttpRequest::get("https://api.example.com").param("latitude", 52.52);
        let b = HttpRequest::get("https://api.example.com").param("latitude", 52.53);

        assert_ne!(a.signature().key(), b.signature().key());
    }

    #[test]
    fn canonical_form_is_readable() {
        let req = HttpRequest::get("https://api.example.com/")
            .param("b", "2")
            .param("a", "1");
        assert_eq!(req.signature().canonical(), "GET https://api.example.com?a=1&b=2");
        assert_eq!(req.signature().key().len(), 64);
    }
}
