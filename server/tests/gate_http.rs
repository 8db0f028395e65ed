/// End-to-end tests: the gate binary's service stack in front of a fake
/// dashboard, validating sessions against a fake identity API.
mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{LOCATION, SET_COOKIE};
use server::providers::{HttpIdentityProvider, IdentityError, IdentityProvider};
use shared::config::parse_config;
use shared::types::Role;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use common::{COOKIE_NAME, spawn_identity, spawn_upstream};

async fn spawn_gate(identity: SocketAddr, upstream: SocketAddr) -> SocketAddr {
    let config = parse_config(&format!(
        r#"
        [server]
        upstream = "http://{upstream}"

        [session]
        secure = false

        [identity]
        base_url = "http://{identity}"
        me_path = "/me"
        timeout_ms = 2000
        "#
    ))
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::app::serve(listener, Arc::new(config)));
    addr
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn get(gate: SocketAddr, path: &str, session: Option<&str>) -> reqwest::Response {
    let mut req = client().get(format!("http://{}{}", gate, path));
    if let Some(s) = session {
        req = req.header("cookie", format!("{}={}", COOKIE_NAME, s));
    }
    req.send().await.unwrap()
}

fn location(res: &reqwest::Response) -> &str {
    res.headers()[LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn gate_end_to_end() {
    let (identity, calls) = spawn_identity().await;
    let upstream = spawn_upstream().await;
    let gate = spawn_gate(identity, upstream).await;

    // Static asset: straight through, identity never asked.
    let res = get(gate, "/favicon.ico", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "upstream:/favicon.ico");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // No cookie on a protected page.
    let res = get(gate, "/cases", None).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "/signin");
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Valid admin session.
    let res = get(gate, "/users/5", Some("admin")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "upstream:/users/5");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Same path, doctor session.
    let res = get(gate, "/users/5", Some("doctor")).await;
    assert_eq!(location(&res), "/access-denied");

    // Doctor on a permitted page.
    let res = get(gate, "/doctors", Some("doctor")).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Patient on invoices.
    let res = get(gate, "/invoices", Some("patient")).await;
    assert_eq!(location(&res), "/access-denied");

    // Doctor with no coordinates.
    let res = get(gate, "/cases", Some("doctor-nowhere")).await;
    assert_eq!(location(&res), "/verify-location");

    // Signed in user on the sign-in page.
    let res = get(gate, "/signin", Some("admin")).await;
    assert_eq!(location(&res), "/");

    // Revalidated on every request, no caching.
    let before = calls.load(Ordering::SeqCst);
    get(gate, "/cases", Some("admin")).await;
    get(gate, "/cases", Some("admin")).await;
    assert_eq!(calls.load(Ordering::SeqCst), before + 2);
}

/// Send `target` verbatim as the request line. HTTP clients resolve dot
/// segments before sending, so this goes over a bare socket.
async fn raw_get(gate: SocketAddr, target: &str, session: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(gate).await.unwrap();
    let cookie = session
        .map(|s| format!("Cookie: {}={}\r\n", COOKIE_NAME, s))
        .unwrap_or_default();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\n{}Connection: close\r\n\r\n",
        target, gate, cookie
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw).into_owned();

    let status = text
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    (status, text)
}

#[tokio::test]
async fn dot_segments_do_not_bypass_the_gate() {
    let (identity, calls) = spawn_identity().await;
    let upstream = spawn_upstream().await;
    let gate = spawn_gate(identity, upstream).await;

    for target in [
        "/api/../users/5",
        "/api/%2e%2e/users/5",
        "/_next/static/../../users/5",
        "/favicon.ico/../users/5",
    ] {
        let (status, text) = raw_get(gate, target, None).await;
        assert_eq!(status, 307, "{}", target);
        assert!(text.contains("location: /signin"), "{}", text);
        assert!(!text.contains("upstream:"), "{}", text);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Authorised callers reach the page under its canonical path.
    let (status, text) = raw_get(gate, "/api/../users/5", Some("admin")).await;
    assert_eq!(status, 200);
    assert!(text.contains("upstream:/users/5"), "{}", text);

    let (status, _) = raw_get(gate, "/api/..%2fusers/5", None).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn page_data_and_nested_files_are_gated() {
    let (identity, calls) = spawn_identity().await;
    let upstream = spawn_upstream().await;
    let gate = spawn_gate(identity, upstream).await;

    for path in ["/_next/data/b1/users/5.json", "/users/5/x.json", "/cases/12/upper.stl"] {
        let res = get(gate, path, None).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "{}", path);
        assert_eq!(location(&res), "/signin");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let res = get(gate, "/_next/data/b1/users/5.json", Some("doctor")).await;
    assert_eq!(location(&res), "/access-denied");

    let res = get(gate, "/_next/data/b1/users/5.json", Some("admin")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "upstream:/_next/data/b1/users/5.json");
}

#[tokio::test]
async fn rejected_sessions_are_cleared() {
    let (identity, _calls) = spawn_identity().await;
    let upstream = spawn_upstream().await;
    let gate = spawn_gate(identity, upstream).await;

    for session in ["expired", "inactive", "malformed"] {
        let res = get(gate, "/cases", Some(session)).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT, "{}", session);
        assert_eq!(location(&res), "/signin");
        let cookie = res.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("realsmile.session=;"), "{}", cookie);
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    // A dead session on the sign-in page just shows sign-in.
    let res = get(gate, "/signin", Some("expired")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "upstream:/signin");
}

#[tokio::test]
async fn unreachable_identity_fails_closed() {
    // Bind then drop to get a port nothing listens on.
    let dead = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let upstream = spawn_upstream().await;
    let gate = spawn_gate(dead, upstream).await;

    let res = get(gate, "/cases", Some("admin")).await;
    assert_eq!(location(&res), "/signin");
    assert!(res.headers().get(SET_COOKIE).is_some());
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() {
    let (identity, _calls) = spawn_identity().await;
    let dead = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };
    let gate = spawn_gate(identity, dead).await;

    let res = get(gate, "/signup", None).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "BAD_GATEWAY");
}

// ---------------------------------------------------------------------------
// Identity adapter
// ---------------------------------------------------------------------------

fn provider(addr: SocketAddr) -> HttpIdentityProvider {
    HttpIdentityProvider::new(
        format!("http://{}/me", addr),
        COOKIE_NAME.to_string(),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[tokio::test]
async fn identity_adapter_decodes_success_envelope() {
    let (addr, calls) = spawn_identity().await;
    let user = provider(addr).fetch_session("doctor").await.unwrap().unwrap();
    assert_eq!(user.role, Role::Doctor);
    assert!(user.has_location());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn identity_adapter_reports_failures() {
    let (addr, _calls) = spawn_identity().await;
    let p = provider(addr);

    assert!(matches!(
        p.fetch_session("nobody").await,
        Err(IdentityError::Status(401))
    ));
    assert!(matches!(
        p.fetch_session("malformed").await,
        Err(IdentityError::Malformed(_))
    ));
}
