use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::ensure;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use tracing::debug;
use url::Url;

use crate::http::handler::{perform, RequestParts};
use crate::metrics::aggregate;
use crate::result::res::TraceResult;
use crate::tls::verifier::build_tls_config;

/// Single-use façade for one trace attempt.
///
/// Construction validates the request parameters and is the only place a
/// caller can get an error from; once a `Tracer` exists, `trace` always
/// produces a [`TraceResult`], degraded on failure rather than raised.
/// `trace` consumes the tracer, so one instance performs exactly one
/// request attempt.
///
/// ```no_run
/// # async fn run() -> Result<(), anyhow::Error> {
/// use htracer::Tracer;
///
/// let result = Tracer::new("https://example.com")?.trace().await;
/// println!("{}", result.as_json());
/// # Ok(())
/// # }
/// ```
pub struct Tracer {
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    verify_tls: bool,
    ca_path: Option<PathBuf>,
    floor_negative_handshake: bool,
}

impl Tracer {
    /// Defaults: GET, no extra headers, empty body, TLS verification OFF
    /// (reachability diagnostics come first; see [`Tracer::verify_tls`]),
    /// negative handshake figures kept.
    pub fn new(url: &str) -> Result<Self, anyhow::Error> {
        let url = Url::parse(url)?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "unsupported scheme in url: {}",
            url.scheme()
        );
        ensure!(url.host_str().is_some(), "url has no host: {url}");
        Ok(Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            verify_tls: false,
            ca_path: None,
            floor_negative_handshake: false,
        })
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a request header. Invalid names or values error here, at
    /// construction time, never during the trace.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, anyhow::Error> {
        self.headers
            .append(HeaderName::from_str(name)?, HeaderValue::from_str(value)?);
        Ok(self)
    }

    /// Request body. Text types are encoded to bytes on the way in.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Enables certificate and hostname verification. Off by default:
    /// a target with a broken chain should still yield timing figures.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// PEM bundle to use as the trust root instead of the webpki set.
    pub fn ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// Floors a negative derived handshake figure at 0. Kept negative by
    /// default, which documents resolver-caching effects.
    pub fn floor_negative_handshake(mut self, floor: bool) -> Self {
        self.floor_negative_handshake = floor;
        self
    }

    /// Performs the one request attempt. Blocks (asynchronously) from DNS
    /// resolution through the final body byte; no internal timeout.
    pub async fn trace(self) -> TraceResult {
        let tls_config = match build_tls_config(self.verify_tls, self.ca_path.as_deref()) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                debug!("tls config failed, returning empty trace: {e:#}");
                return TraceResult::default();
            }
        };

        let parts = RequestParts {
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
        };
        let raw = perform(&parts, tls_config).await;
        aggregate(&raw, self.floor_negative_handshake)
    }

    /// Convenience for synchronous callers: runs [`Tracer::trace`] on a
    /// fresh current-thread runtime. Errs only if the runtime itself
    /// cannot be built.
    pub fn trace_blocking(self) -> Result<TraceResult, anyhow::Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.trace()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_url() {
        assert!(Tracer::new("not a url").is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(Tracer::new("ftp://example.com/file").is_err());
    }

    #[test]
    fn rejects_invalid_header_name() {
        let tracer = Tracer::new("http://example.com").unwrap();
        assert!(tracer.header("bad header", "x").is_err());
    }

    #[test]
    fn builder_accumulates_headers() {
        let tracer = Tracer::new("http://example.com")
            .unwrap()
            .header("x-one", "1")
            .unwrap()
            .header("x-two", "2")
            .unwrap()
            .method(Method::PUT)
            .body("hello".to_string());
        assert_eq!(tracer.headers.len(), 2);
        assert_eq!(tracer.method, Method::PUT);
        assert_eq!(tracer.body, Bytes::from_static(b"hello"));
    }
}
