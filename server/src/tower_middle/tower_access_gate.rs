use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::uri::{PathAndQuery, Uri};
use hyper::header::{CACHE_CONTROL, HeaderValue, LOCATION, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use shared::types::{Decision, Evaluation};
use tower::{Layer, Service};
use tracing::{info, warn};

use crate::gate::{AccessGate, normalize_path};
use crate::utils::headers::{delete_cookie, get_cookie};

/// Header added to rewritten requests so the upstream can tell it is serving
/// a substitute page.
pub const REWRITE_HEADER: &str = "x-gate-rewrite";

#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: Arc<str>,
    pub secure: bool,
}

/// Tower layer for the access gate
///
/// Evaluates every request before it reaches the inner service and turns the
/// decision into a redirect, a rewritten request, or a pass-through.
#[derive(Clone, Debug)]
pub struct AccessGateLayer {
    gate: AccessGate,
    cookie: SessionCookie,
}

impl AccessGateLayer {
    pub fn new(gate: AccessGate, cookie_name: &str, secure: bool) -> Self {
        Self {
            gate,
            cookie: SessionCookie {
                name: Arc::from(cookie_name),
                secure,
            },
        }
    }
}

impl<S> Layer<S> for AccessGateLayer {
    type Service = AccessGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessGateService {
            inner,
            gate: self.gate.clone(),
            cookie: self.cookie.clone(),
        }
    }
}

/// The actual service that applies gate decisions
#[derive(Clone, Debug)]
pub struct AccessGateService<S> {
    inner: S,
    gate: AccessGate,
    cookie: SessionCookie,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AccessGateService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let gate = self.gate.clone();
        let cookie = self.cookie.clone();

        // Take the service that was driven to readiness, leave a fresh clone
        // behind for the next call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            // Judge, and forward, the path the upstream would resolve.
            let path = match normalize_path(req.uri().path()) {
                Ok(path) => path.into_owned(),
                Err(e) => {
                    warn!("Rejecting request target: {}", e);
                    return Ok(status_response(StatusCode::BAD_REQUEST));
                }
            };
            if path != req.uri().path() {
                if let Err(e) = replace_path(&mut req, &path) {
                    warn!("Could not forward normalized path {}: {}", path, e);
                    return Ok(status_response(StatusCode::BAD_REQUEST));
                }
            }

            let token = get_cookie(req.headers(), &cookie.name);

            let evaluation = gate.evaluate(&path, token.as_deref()).await;
            log_evaluation(&path, &evaluation);

            match evaluation.decision {
                Decision::Allow => {
                    if let Some(user) = evaluation.user {
                        req.extensions_mut().insert(user);
                    }
                    inner.call(req).await
                }

                Decision::Rewrite { path: target } => {
                    rewrite_path(&mut req, target);
                    inner.call(req).await
                }

                Decision::Redirect {
                    location,
                    clear_session,
                } => Ok(redirect_response(location, clear_session.then_some(&cookie))),
            }
        })
    }
}

/// One structured event per decision.
fn log_evaluation(path: &str, evaluation: &Evaluation) {
    info!(
        path,
        stage = %evaluation.stage,
        reason = %evaluation.reason,
        decision = %evaluation.decision,
        user = ?evaluation.user.as_ref().map(|u| u.id.to_string()),
        "access gate decision"
    );
}

/// Point the request at `target`, keeping scheme and authority, and mark it
/// with [`REWRITE_HEADER`]. The query string is dropped.
fn rewrite_path<B>(req: &mut Request<B>, target: &'static str) {
    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::from_static(target));

    match Uri::from_parts(parts) {
        Ok(uri) => *req.uri_mut() = uri,
        Err(e) => {
            warn!("Could not rewrite {} to {}: {}", req.uri(), target, e);
            *req.uri_mut() = Uri::from_static(target);
        }
    }
    req.headers_mut()
        .insert(REWRITE_HEADER, HeaderValue::from_static(target));
}

/// Swap in `path`, keeping the query string.
fn replace_path<B>(req: &mut Request<B>, path: &str) -> Result<(), http::Error> {
    let path_and_query = match req.uri().query() {
        Some(query) => PathAndQuery::try_from(format!("{}?{}", path, query))?,
        None => PathAndQuery::try_from(path)?,
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    *req.uri_mut() = Uri::from_parts(parts)?;
    Ok(())
}

fn status_response<B: Default>(status: StatusCode) -> Response<B> {
    let mut response = Response::new(B::default());
    *response.status_mut() = status;
    response
}

fn redirect_response<B: Default>(
    location: &'static str,
    clear: Option<&SessionCookie>,
) -> Response<B> {
    let mut response = status_response(StatusCode::TEMPORARY_REDIRECT);

    let headers = response.headers_mut();
    headers.insert(LOCATION, HeaderValue::from_static(location));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    if let Some(cookie) = clear {
        match delete_cookie(&cookie.name, cookie.secure) {
            Ok(value) => {
                headers.insert(SET_COOKIE, value);
            }
            Err(e) => warn!("Could not build session-clearing cookie: {}", e),
        }
    }

    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
