//! HTTP exposition of the metric snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::constants::METRICS_PATH;
use crate::error::ExporterResult;
use crate::telemetry::PrometheusSink;

pub fn router(sink: Arc<PrometheusSink>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics))
        .with_state(sink)
}

async fn metrics(State(sink): State<Arc<PrometheusSink>>) -> Response {
    match sink.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Listen on all interfaces.
pub async fn bind(port: u16) -> ExporterResult<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    Ok(TcpListener::bind(addr).await?)
}

/// Serve until `shutdown` turns true or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    sink: Arc<PrometheusSink>,
    mut shutdown: watch::Receiver<bool>,
) -> ExporterResult<()> {
    info!("Serving metrics on http://{}{}", listener.local_addr()?, METRICS_PATH);
    axum::serve(listener, router(sink))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LabelSet, MetricModel, StaticLayout};
    use crate::telemetry::MetricsSink;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let model = MetricModel::with_layout("plc", "master", LabelSet::new(), Box::new(StaticLayout));
        let sink = Arc::new(PrometheusSink::new(&model).unwrap());
        sink.set_connection_up(true).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, sink, rx));

        let response = get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains("plc_connection_up{plc=\"master\"} 1"));
        assert!(response.contains("plc_info{plc=\"master\"} 1"));

        let response = get(addr, "/other").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
