use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::Metrics;
use crate::error::{Error, Result};

/// How long shutdown waits for in-flight scrapes.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// HTTP server exposing `GET /metrics`.
#[derive(Debug)]
pub struct MetricsServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl MetricsServer {
    /// Bind `addr` and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::MetricsServer {
                address: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let app = router(metrics);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(address = %local_addr, "metrics server listening");
        Ok(Self {
            local_addr,
            shutdown_tx,
            handle,
        })
    }

    /// The bound address; differs from the requested one for port 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the server, waiting at most five seconds.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.handle).await {
            Ok(Ok(Ok(()))) => info!("metrics server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "metrics server failed"),
            Ok(Err(e)) => warn!(error = %e, "metrics server task panicked"),
            Err(_) => warn!("metrics server did not stop within 5s"),
        }
    }
}

fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .with_state(metrics)
}

async fn serve_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], metrics.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_metrics() {
        let metrics = Arc::new(Metrics::new());
        metrics.record_change("added", "aws_instance");

        let server = MetricsServer::start("127.0.0.1:0".parse().unwrap(), Arc::clone(&metrics))
            .await
            .unwrap();
        let url = format!("http://{}/metrics", server.local_addr());

        let response = reqwest::get(&url).await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            CONTENT_TYPE
        );
        let body = response.text().await.unwrap();
        assert!(body.contains("infralog_changes_total{resource_type=\"aws_instance\",type=\"added\"} 1"));

        server.shutdown().await;
        assert!(reqwest::get(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let server = MetricsServer::start("127.0.0.1:0".parse().unwrap(), Arc::new(Metrics::new()))
            .await
            .unwrap();
        let response = reqwest::get(format!("http://{}/other", server.local_addr()))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let first = MetricsServer::start("127.0.0.1:0".parse().unwrap(), Arc::new(Metrics::new()))
            .await
            .unwrap();
        let err = MetricsServer::start(first.local_addr(), Arc::new(Metrics::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetricsServer { .. }));
        first.shutdown().await;
    }
}
