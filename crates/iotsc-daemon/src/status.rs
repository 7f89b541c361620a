//! Loopback status endpoint
//!
//! Answers whether a remote peer is connected so that supervising tools
//! (e.g. a network watchdog) leave the daemon alone while a peer uses it.
//! The endpoint only reads the connection flag and never changes the
//! peripheral.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{combinators::BoxBody, BodyExt, Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use iotsc_core::ConnectionStatus;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::StatusConfig;
use crate::error::{DaemonError, Result};
use crate::rpc;

pub type HttpResponse = Response<BoxBody<Bytes, Infallible>>;

/// Largest request body accepted
const MAX_BODY_SIZE: usize = 16 * 1024;

/// Pause after the first failed accept
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Longest pause between failed accepts
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Pause before accepting again after `failures` consecutive errors
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF
        .saturating_mul(1 << failures.saturating_sub(1).min(5))
        .min(MAX_ACCEPT_BACKOFF)
}

// ----------------------------------------------------------------------------
// Server
// ----------------------------------------------------------------------------

/// Bound, not yet serving, status endpoint
pub struct StatusServer {
    listener: TcpListener,
    path: Arc<str>,
    status: ConnectionStatus,
}

impl StatusServer {
    pub async fn bind(config: &StatusConfig, status: ConnectionStatus) -> Result<Self> {
        if !config.bind.ip().is_loopback() {
            return Err(DaemonError::Config(format!(
                "Refusing to expose status endpoint on {}",
                config.bind
            )));
        }

        let listener = TcpListener::bind(config.bind).await.map_err(|e| {
            DaemonError::Status(format!("Failed to bind to {}: {}", config.bind, e))
        })?;
        Ok(Self {
            listener,
            path: Arc::from(config.path.as_str()),
            status,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self) -> Result<()> {
        info!("Starting RPC server on {}", self.local_addr()?);

        let mut failures = 0u32;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    failures = 0;
                    debug!("Status connection from {}", peer);
                    tokio::spawn(handle_connection(
                        stream,
                        self.path.clone(),
                        self.status.clone(),
                    ));
                }
                Err(e) => {
                    // Errors such as EMFILE persist until connections close
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    warn!(
                        "Failed to accept status connection: {} (retrying in {:?})",
                        e, pause
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, path: Arc<str>, status: ConnectionStatus) {
    let io = TokioIo::new(stream);
    let builder =
        hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new());

    let service = hyper::service::service_fn(move |req| {
        let path = path.clone();
        let status = status.clone();
        async move { Ok::<_, Infallible>(handle_request(req, &path, &status).await) }
    });

    if let Err(e) = builder.serve_connection(io, service).await {
        debug!("Status connection error: {}", e);
    }
}

/// Route one HTTP request
pub async fn handle_request<B>(req: Request<B>, path: &str, status: &ConnectionStatus) -> HttpResponse
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.uri().path() != path {
        return text(StatusCode::NOT_FOUND, format!("not found: {}", req.uri().path()));
    }
    if req.method() != Method::POST {
        let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "only POST is supported".to_string());
        response
            .headers_mut()
            .insert(header::ALLOW, header::HeaderValue::from_static("POST"));
        return response;
    }

    let body = match Limited::new(req.into_body(), MAX_BODY_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return text(StatusCode::BAD_REQUEST, format!("cannot read request: {}", e));
        }
    };
    let body = String::from_utf8_lossy(&body);

    let reply = match rpc::method_name(&body) {
        Ok(rpc::IS_CONNECTED) | Ok(rpc::LEGACY_IS_CONNECTED) => {
            rpc::boolean_response(status.is_connected())
        }
        Ok(method) => {
            warn!("Unsupported status method '{}'", method);
            rpc::fault_response(
                rpc::FAULT_UNKNOWN_METHOD,
                &format!("method \"{}\" is not supported", method),
            )
        }
        Err(e) => rpc::fault_response(rpc::FAULT_MALFORMED, &e.to_string()),
    };
    xml(reply)
}

fn text(status: StatusCode, message: String) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(message)).boxed());
    *response.status_mut() = status;
    response
}

fn xml(document: String) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(document)).boxed());
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/xml"));
    response
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// Ask the daemon listening on `addr` whether a peer is connected
pub async fn query_status(addr: SocketAddr, path: &str) -> Result<bool> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| DaemonError::Status(format!("Cannot reach daemon at {}: {}", addr, e)))?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(status_error)?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("Status client connection error: {}", e);
        }
    });

    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::HOST, addr.to_string())
        .header(header::CONTENT_TYPE, "text/xml")
        .body(Full::new(Bytes::from(rpc::method_call(rpc::IS_CONNECTED))))
        .map_err(status_error)?;

    let response = sender.send_request(request).await.map_err(status_error)?;
    if !response.status().is_success() {
        return Err(DaemonError::Status(format!(
            "Daemon answered {}",
            response.status()
        )));
    }

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(status_error)?
        .to_bytes();
    rpc::parse_boolean_response(&String::from_utf8_lossy(&body)).map_err(status_error)
}

fn status_error<E: std::fmt::Display>(err: E) -> DaemonError {
    DaemonError::Status(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcError;

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    #[test]
    fn test_accept_backoff_grows_and_is_capped() {
        assert_eq!(accept_backoff(1), Duration::from_millis(50));
        assert_eq!(accept_backoff(2), Duration::from_millis(100));
        assert!(accept_backoff(4) > accept_backoff(3));
        assert_eq!(accept_backoff(6), MAX_ACCEPT_BACKOFF);
        assert_eq!(accept_backoff(u32::MAX), MAX_ACCEPT_BACKOFF);
    }

    async fn body_text(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_is_connected_follows_flag() {
        let status = ConnectionStatus::new();
        let call = rpc::method_call(rpc::IS_CONNECTED);

        let response = handle_request(request(Method::POST, "/RPC2", &call), "/RPC2", &status).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rpc::parse_boolean_response(&body_text(response).await), Ok(false));

        status.set_connected(true);
        let response = handle_request(request(Method::POST, "/RPC2", &call), "/RPC2", &status).await;
        assert_eq!(rpc::parse_boolean_response(&body_text(response).await), Ok(true));
    }

    #[tokio::test]
    async fn test_legacy_method_name() {
        let status = ConnectionStatus::new();
        status.set_connected(true);
        let call = rpc::method_call(rpc::LEGACY_IS_CONNECTED);
        let response = handle_request(request(Method::POST, "/RPC2", &call), "/RPC2", &status).await;
        assert_eq!(rpc::parse_boolean_response(&body_text(response).await), Ok(true));
    }

    #[tokio::test]
    async fn test_unknown_method_is_fault() {
        let status = ConnectionStatus::new();
        let call = rpc::method_call("set_connected");
        let response = handle_request(request(Method::POST, "/RPC2", &call), "/RPC2", &status).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(matches!(
            rpc::parse_boolean_response(&body_text(response).await),
            Err(RpcError::Fault {
                code: rpc::FAULT_UNKNOWN_METHOD,
                ..
            })
        ));
        assert!(!status.is_connected());
    }

    #[tokio::test]
    async fn test_wrong_path_and_method() {
        let status = ConnectionStatus::new();
        let response = handle_request(request(Method::POST, "/other", ""), "/RPC2", &status).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = handle_request(request(Method::GET, "/RPC2", ""), "/RPC2", &status).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_bind_rejects_non_loopback() {
        let config = StatusConfig {
            bind: "0.0.0.0:0".parse().unwrap(),
            path: "/RPC2".to_string(),
        };
        assert!(matches!(
            StatusServer::bind(&config, ConnectionStatus::new()).await,
            Err(DaemonError::Config(_))
        ));
    }
}
