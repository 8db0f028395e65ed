use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use shared::types::AppConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{info, warn};

use crate::access::AccessTable;
use crate::gate::{AccessGate, RouteClassifier};
use crate::providers::{
    FailurePolicy, FlagStore, HttpFlagStore, HttpIdentityProvider, StaticFlagStore,
};
use crate::proxy::{Upstream, UpstreamProxy};
use crate::tower_middle::{AccessGateLayer, AccessGateService};

/// Pause after a failed `accept` before trying again.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Wire the gate's dependencies from config. Fails on an unusable access
/// table or client setup, so a bad deploy never starts serving.
pub fn build_gate(config: &AppConfig) -> Result<AccessGate> {
    let identity = HttpIdentityProvider::new(
        config.identity.me_url(),
        config.session.cookie_name.clone(),
        Duration::from_millis(config.identity.timeout_ms),
    )
    .context("Failed to build identity client")?;

    let flags: Arc<dyn FlagStore> = match &config.flags.url {
        Some(url) => {
            let policy = if config.flags.fail_open {
                FailurePolicy::Open
            } else {
                FailurePolicy::Closed
            };
            Arc::new(
                HttpFlagStore::new(
                    url.clone(),
                    config.flags.maintenance_key.clone(),
                    Duration::from_millis(config.flags.timeout_ms),
                    policy,
                )
                .context("Failed to build flag store client")?,
            )
        }
        None => {
            info!("No flag store configured, maintenance mode is off");
            Arc::new(StaticFlagStore::default())
        }
    };

    let table = AccessTable::from_rules(&config.access).context("Invalid access table")?;
    info!("Access table loaded for {} roles", table.roles().count());

    Ok(AccessGate::new(
        RouteClassifier::new(&config.routes, &config.access),
        Arc::new(identity),
        flags,
        Arc::new(table),
    ))
}

/// Gate layered over the upstream proxy.
pub fn build_service(config: &AppConfig) -> Result<AccessGateService<UpstreamProxy>> {
    let gate = build_gate(config)?;
    let upstream = Upstream::parse(&config.server.upstream).context("Invalid server.upstream")?;
    let proxy = UpstreamProxy::new(
        upstream,
        Duration::from_millis(config.server.upstream_timeout_ms),
    );

    Ok(ServiceBuilder::new()
        .layer(AccessGateLayer::new(
            gate,
            &config.session.cookie_name,
            config.session.secure,
        ))
        .service(proxy))
}

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, config: Arc<AppConfig>) -> Result<()> {
    let service = build_service(&config)?;

    info!(
        "Gate listening on http://{} → {}",
        listener.local_addr().context("Listener has no local address")?,
        config.server.upstream
    );

    loop {
        let (stream, peer) = accept_with_backoff(|| listener.accept()).await;
        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::task::spawn(async move {
            // Record the peer for forwarding headers
            let service = ServiceBuilder::new()
                .map_request(move |mut req: Request<Incoming>| {
                    req.extensions_mut().insert::<SocketAddr>(peer);
                    req
                })
                .service(service);

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, TowerToHyperService::new(service))
                .await
            {
                warn!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

/// Retry `accept` until it yields a connection. EMFILE and friends persist
/// until something closes, so each failure pauses instead of spinning.
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}
