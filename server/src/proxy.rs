use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::uri::{Authority, PathAndQuery, Scheme, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tower::Service;
use tracing::{debug, warn};

use crate::GateBody;
use crate::utils::json_response::deliver_error_json;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("upstream {0:?} is not a valid URL: {1}")]
    InvalidUrl(String, String),

    #[error("upstream {0:?} must be a plain http:// origin")]
    UnsupportedScheme(String),
}

/// Connection headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Scheme and authority of the dashboard origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    pub fn parse(url: &str) -> Result<Self, ProxyError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| ProxyError::InvalidUrl(url.to_string(), e.to_string()))?;

        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| ProxyError::InvalidUrl(url.to_string(), "missing host".into()))?;

        match uri.scheme() {
            Some(s) if *s == Scheme::HTTP => Ok(Self {
                scheme: Scheme::HTTP,
                authority,
            }),
            _ => Err(ProxyError::UnsupportedScheme(url.to_string())),
        }
    }

    /// Same path and query, upstream origin.
    pub fn uri_for(&self, original: &Uri) -> Result<Uri, http::Error> {
        let path_and_query = original
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

/// Forwards allowed traffic to the dashboard.
#[derive(Clone, Debug)]
pub struct UpstreamProxy {
    client: Client<HttpConnector, Incoming>,
    upstream: Arc<Upstream>,
    timeout: Duration,
}

impl UpstreamProxy {
    pub fn new(upstream: Upstream, timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            upstream: Arc::new(upstream),
            timeout,
        }
    }
}

impl Service<Request<Incoming>> for UpstreamProxy {
    type Response = Response<GateBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The pooled client queues internally
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Incoming>) -> Self::Future {
        let client = self.client.clone();
        let upstream = Arc::clone(&self.upstream);
        let timeout = self.timeout;

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            parts.uri = match upstream.uri_for(&parts.uri) {
                Ok(uri) => uri,
                Err(e) => {
                    warn!("Could not build upstream URI for {}: {}", parts.uri, e);
                    return Ok(deliver_error_json(
                        "BAD_REQUEST",
                        "Malformed request target",
                        StatusCode::BAD_REQUEST,
                    ));
                }
            };

            let peer = parts.extensions.get::<SocketAddr>().copied();
            strip_hop_by_hop(&mut parts.headers);
            add_forwarding_headers(&mut parts.headers, peer);

            debug!("Proxying {} {}", parts.method, parts.uri);
            let forwarded = Request::from_parts(parts, body);

            match tokio::time::timeout(timeout, client.request(forwarded)).await {
                Ok(Ok(response)) => {
                    let (mut parts, body) = response.into_parts();
                    strip_hop_by_hop(&mut parts.headers);
                    Ok(Response::from_parts(parts, body.boxed()))
                }
                Ok(Err(e)) => {
                    warn!("Upstream request failed: {}", e);
                    Ok(deliver_error_json(
                        "BAD_GATEWAY",
                        "Upstream unavailable",
                        StatusCode::BAD_GATEWAY,
                    ))
                }
                Err(_) => {
                    warn!("Upstream timed out after {:?}", timeout);
                    Ok(deliver_error_json(
                        "GATEWAY_TIMEOUT",
                        "Upstream timed out",
                        StatusCode::GATEWAY_TIMEOUT,
                    ))
                }
            }
        })
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop too.
    let named: Vec<HeaderName> = headers
        .get_all(hyper::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn add_forwarding_headers(headers: &mut HeaderMap, peer: Option<SocketAddr>) {
    if let Some(host) = headers.get(HOST).cloned() {
        headers.insert("x-forwarded-host", host);
    }
    // Keep a value set by a TLS terminator in front of the gate.
    if !headers.contains_key("x-forwarded-proto") {
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    }

    if let Some(addr) = peer {
        let ip = addr.ip().to_string();
        let value = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, ip),
            None => ip,
        };
        if let Ok(v) = HeaderValue::from_str(&value) {
            headers.insert("x-forwarded-for", v);
        }
    }
}
