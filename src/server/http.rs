// src/server/http.rs
//! Shared HTTP/1 plumbing for the service facades
//!
//! Each facade implements [`HttpService`]; [`serve`] owns the accept loop and
//! turns handler errors into `{"detail": ...}` responses carrying the
//! error's status code.

use crate::observability::HTTP_REQUESTS;
use crate::utils::errors::{LabError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

pub type HttpResponse = Response<Full<Bytes>>;

/// A request handler served by [`serve`]
pub trait HttpService: Send + Sync + 'static {
    /// Label used in logs and the request counter
    fn name(&self) -> &'static str;

    fn handle(&self, req: Request<Incoming>) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_json_body(status, Bytes::from(bytes)),
        Err(e) => {
            error!("Failed to encode response: {}", e);
            with_json_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"detail":"response encoding failed"}"#),
            )
        }
    }
}

pub fn error_response(err: &LabError) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    json_response(status, &json!({ "detail": err.to_string() }))
}

pub fn not_found() -> HttpResponse {
    json_response(StatusCode::NOT_FOUND, &json!({ "detail": "Not Found" }))
}

pub fn method_not_allowed() -> HttpResponse {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({ "detail": "Method Not Allowed" }),
    )
}

fn with_json_body(status: StatusCode, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Read a JSON request body; an empty body reads as `{}`
pub async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| LabError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();

    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes[..]
    };

    serde_json::from_slice(body).map_err(|e| LabError::BadRequest(e.to_string()))
}

/// Parse an id path segment; an unparseable id is simply unknown
pub fn parse_id(segment: &str, entity: &'static str) -> Result<Ulid> {
    Ulid::from_string(segment).map_err(|_| LabError::NotFound {
        entity,
        id: segment.to_string(),
    })
}

/// Non-empty path segments of `path`
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Accept connections until `shutdown` resolves
pub async fn serve<S: HttpService>(
    listener: TcpListener,
    service: Arc<S>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("{} service listening on {}", service.name(), addr);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("{} service on {} shutting down", service.name(), addr);
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    debug!("Accepted connection from {}", peer);
                    let io = TokioIo::new(stream);

                    let handler = service_fn(move |req| {
                        let service = Arc::clone(&service);
                        async move { Ok::<_, Infallible>(dispatch(service.as_ref(), req).await) }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                        debug!("Connection from {} closed with error: {}", peer, e);
                    }
                });
            }
        }
    }
}

async fn dispatch<S: HttpService>(service: &S, req: Request<Incoming>) -> HttpResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match service.handle(req).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    };

    debug!("{} {} {} -> {}", service.name(), method, path, response.status());
    metrics::counter!(
        HTTP_REQUESTS,
        "service" => service.name(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    response
}
