#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

pub const COOKIE_NAME: &str = "realsmile.session";

/// Serve `handler` on an ephemeral local port and return the address.
pub async fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(handler))
                    .await;
            });
        }
    });

    addr
}

pub fn json(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn session_from(req: &Request<Incoming>) -> Option<String> {
    let header = req.headers().get("cookie")?.to_str().ok()?;
    header.split(';').find_map(|c| {
        let (name, value) = c.trim().split_once('=')?;
        (name == COOKIE_NAME).then(|| value.to_string())
    })
}

/// Fake identity API. Cookie values name the account that owns them:
/// `admin`, `doctor`, `doctor-nowhere` (no coordinates), `patient`,
/// `inactive`, `malformed`. Anything else gets a 401 `fail` envelope.
pub async fn spawn_identity() -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let addr = spawn_server(move |req: Request<Incoming>| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);

            let user = |role: &str, status: bool, located: bool| {
                serde_json::json!({
                    "status": "success",
                    "data": { "user": {
                        "id": 17,
                        "role": role,
                        "status": status,
                        "two_factor_enabled": false,
                        "phone_verified": true,
                        "email_verified": true,
                        "latitude": if located { Some(36.8) } else { None },
                        "longitude": if located { Some(10.1) } else { None },
                    } }
                })
            };

            let res = match session_from(&req).as_deref() {
                Some("admin") => json(StatusCode::OK, user("admin", true, true)),
                Some("doctor") => json(StatusCode::OK, user("doctor", true, true)),
                Some("doctor-nowhere") => json(StatusCode::OK, user("doctor", true, false)),
                Some("patient") => json(StatusCode::OK, user("patient", true, false)),
                Some("inactive") => json(StatusCode::OK, user("admin", false, true)),
                Some("malformed") => Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from_static(b"<html>oops</html>")))
                    .unwrap(),
                _ => json(
                    StatusCode::UNAUTHORIZED,
                    serde_json::json!({ "status": "fail", "message": "Not logged in" }),
                ),
            };
            Ok::<_, Infallible>(res)
        }
    })
    .await;

    (addr, calls)
}

/// Fake dashboard that echoes the path it was asked for.
pub async fn spawn_upstream() -> SocketAddr {
    spawn_server(|req: Request<Incoming>| async move {
        let body = format!("upstream:{}", req.uri().path());
        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
    })
    .await
}
