use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT, HOST, LOCATION, USER_AGENT};
use http::{HeaderMap, Method};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use pki_types::ServerName;
use rustls::ClientConfig;
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};
use url::Url;

use crate::timing::PhaseTimings;

const MAX_REDIRECTS: u8 = 10;

/// Immutable request parameters handed down from the tracer façade.
pub(crate) struct RequestParts {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Everything one transaction produced, before normalization.
#[derive(Debug, Default)]
pub(crate) struct RawTrace {
    pub timings: PhaseTimings,
    pub status_code: u16,
    pub ip: Option<String>,
    pub headers_length: u64,
    pub body_length: u64,
}

/// Performs exactly one HTTP transaction (following redirects) and records
/// phase windows along the way.
///
/// Network failures never surface: the error is logged at debug level and
/// whatever was populated before the failing phase is returned, remaining
/// fields at their defaults. This is the silent-degradation contract the
/// whole crate is built around.
pub(crate) async fn perform(parts: &RequestParts, tls_config: Arc<ClientConfig>) -> RawTrace {
    let mut raw = RawTrace::default();
    raw.timings.start_total();
    if let Err(e) = drive(&mut raw, parts, tls_config).await {
        debug!("trace degraded: {e:#}");
    }
    raw
}

async fn drive(
    raw: &mut RawTrace,
    parts: &RequestParts,
    tls_config: Arc<ClientConfig>,
) -> Result<(), anyhow::Error> {
    let mut url = parts.url.clone();

    // Fresh lookup per trace. The connect call below resolves again on its
    // own, which is why the open window is cumulative and the aggregator
    // subtracts the dns share out of it.
    let host = url.host_str().context("url has no host")?.to_string();
    let port = url
        .port_or_known_default()
        .context("url has no usable port")?;
    raw.timings.start_dns();
    let mut addrs = lookup_host((host.as_str(), port)).await?;
    let addr = addrs
        .next()
        .with_context(|| format!("no addresses found for host {host}"))?;
    raw.timings.end_dns();
    raw.ip = Some(addr.ip().to_string());
    trace!("resolved {host} to {}", addr.ip());

    for _hop in 0..MAX_REDIRECTS {
        let host = url
            .host_str()
            .context("redirect target has no host")?
            .to_string();
        let port = url
            .port_or_known_default()
            .context("redirect target has no usable port")?;
        let hop_start = Instant::now();

        raw.timings.start_open();
        raw.timings.start_tcp_connect();
        let stream = TcpStream::connect((host.as_str(), port)).await?;
        raw.timings.end_tcp_connect();
        // The final connection's address wins; redirects may change hosts.
        raw.ip = Some(stream.peer_addr()?.ip().to_string());

        let request = build_request(&url, parts)?;
        let res = if url.scheme() == "https" {
            let connector = TlsConnector::from(tls_config.clone());
            let domain = ServerName::try_from(host.clone())?;
            let tls_stream = connector.connect(domain, stream).await?;
            raw.timings.end_open();
            exchange(raw, TokioIo::new(tls_stream), request).await?
        } else {
            raw.timings.end_open();
            exchange(raw, TokioIo::new(stream), request).await?
        };

        raw.status_code = res.status().as_u16();
        trace!("{} {} -> {}", parts.method, url, res.status());

        if res.status().is_redirection() {
            if let Some(location) = res.headers().get(LOCATION) {
                let next = url.join(location.to_str()?)?;
                // Drain the hop's body so its transfer time counts toward
                // the redirect figure instead of the final transfer's.
                let _ = res.into_body().collect().await;
                raw.timings.add_redirect(hop_start.elapsed());
                raw.timings.reset_hop();
                url = next;
                continue;
            }
            // A redirect status without a location header is served as-is.
        }

        raw.headers_length = head_bytes(&res);
        let body = res.into_body().collect().await?.to_bytes();
        raw.body_length = body.len() as u64;
        raw.timings.end_total();
        return Ok(());
    }

    anyhow::bail!("exceeded maximum number of redirects ({MAX_REDIRECTS})")
}

/// Speaks HTTP/1.1 over an established stream. `send_request` resolves
/// once the response head has been parsed, which is exactly the first
/// bytes of the response on the wire, so that window is the
/// time-to-first-byte figure.
async fn exchange<T>(
    raw: &mut RawTrace,
    io: T,
    request: Request<Full<Bytes>>,
) -> Result<Response<Incoming>, anyhow::Error>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(io).await?;
    tokio::task::spawn(async move {
        if let Err(err) = conn.await {
            debug!("connection closed with error: {err:?}");
        }
    });

    raw.timings.start_first_byte();
    let res = sender.send_request(request).await?;
    raw.timings.end_first_byte();
    Ok(res)
}

fn build_request(url: &Url, parts: &RequestParts) -> Result<Request<Full<Bytes>>, anyhow::Error> {
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(path)
        .body(Full::new(parts.body.clone()))?;

    let headers = request.headers_mut();
    for (name, value) in &parts.headers {
        headers.append(name, value.clone());
    }
    if !headers.contains_key(HOST) {
        let host_value = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => String::new(),
        };
        headers.insert(HOST, HeaderValue::from_str(&host_value)?);
    }
    if !headers.contains_key(USER_AGENT) {
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("htracer/", env!("CARGO_PKG_VERSION"))),
        );
    }
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    }

    Ok(request)
}

/// Bytes of the response head as it would appear on the wire: status line,
/// one `name: value` line per header, terminating blank line. hyper does
/// not expose the raw head, so this is reconstructed from the parsed parts.
fn head_bytes(res: &Response<Incoming>) -> u64 {
    let mut len = format!("{:?} {}\r\n", res.version(), res.status()).len();
    for (name, value) in res.headers() {
        len += name.as_str().len() + 2 + value.len() + 2;
    }
    (len + 2) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_gets_host_and_default_headers() {
        let parts = RequestParts {
            url: Url::parse("http://example.com:8080/a/b?x=1").unwrap(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let req = build_request(&parts.url, &parts).unwrap();
        assert_eq!(req.uri(), "/a/b?x=1");
        assert_eq!(req.headers()[HOST], "example.com:8080");
        assert_eq!(req.headers()[ACCEPT], "*/*");
        assert!(req.headers()[USER_AGENT]
            .to_str()
            .unwrap()
            .starts_with("htracer/"));
    }

    #[test]
    fn caller_headers_are_not_overridden() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("probe/1"));
        headers.insert(HOST, HeaderValue::from_static("other.example"));
        let parts = RequestParts {
            url: Url::parse("https://example.com/").unwrap(),
            method: Method::POST,
            headers,
            body: Bytes::from_static(b"payload"),
        };
        let req = build_request(&parts.url, &parts).unwrap();
        assert_eq!(req.headers()[USER_AGENT], "probe/1");
        assert_eq!(req.headers()[HOST], "other.example");
        assert_eq!(req.method(), Method::POST);
    }
}
