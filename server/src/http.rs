//! HTTP facade: the primary listener (`/hello`, `/stop`) and the trigger
//! listener (`/trigger`) that calls back into the primary one.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, Request, Response, StatusCode};
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1 as client_http1;
use hyper::server::conn::http1 as server_http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use loadgen::{workload, CancellationSignal};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::profile::ProfileSink;

pub const HELLO_BODY: &str = "Hello World";
pub const STOP_BODY: &str = "Stopping the program...";
pub const TRIGGER_OK_PREFIX: &str = "call to main service succeeded: ";
pub const TRIGGER_FAILED_BODY: &str = "call to main service failed";

type HttpResponse = Response<Full<Bytes>>;

/// Everything the primary listener's handlers need.
pub struct PrimaryState {
    pub cancel: CancellationSignal,
    pub profile: Arc<ProfileSink>,
    pub hello_matrix_size: usize,
}

/// Accepts connections on `listener` and serves `/hello` and `/stop`.
pub async fn serve_primary(listener: TcpListener, state: Arc<PrimaryState>) -> Result<(), ServerError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let service = service_fn(move |req| handle_primary(req, Arc::clone(&state)));
            if let Err(e) = server_http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, error = %e, "primary connection closed with error");
            }
        });
    }
}

/// Accepts connections on `listener` and serves `/trigger`, which fetches
/// `/hello` from `hello_target` (`host:port`).
pub async fn serve_trigger(listener: TcpListener, hello_target: String) -> Result<(), ServerError> {
    let hello_target: Arc<str> = hello_target.into();
    loop {
        let (stream, peer) = listener.accept().await?;
        let target = Arc::clone(&hello_target);
        tokio::spawn(async move {
            let service = service_fn(move |req| handle_trigger(req, Arc::clone(&target)));
            if let Err(e) = server_http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, error = %e, "trigger connection closed with error");
            }
        });
    }
}

async fn handle_primary(
    req: Request<Incoming>,
    state: Arc<PrimaryState>,
) -> Result<HttpResponse, Infallible> {
    let response = match req.uri().path() {
        "/hello" => hello(state.hello_matrix_size).await,
        "/stop" => stop(&state).await,
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

async fn handle_trigger(req: Request<Incoming>, target: Arc<str>) -> Result<HttpResponse, Infallible> {
    if req.uri().path() != "/trigger" {
        return Ok(text(StatusCode::NOT_FOUND, "not found"));
    }

    let response = match fetch(&target, "/hello").await {
        Ok((_, body)) => {
            let mut relayed = TRIGGER_OK_PREFIX.as_bytes().to_vec();
            relayed.extend_from_slice(&body);
            text(StatusCode::OK, relayed)
        }
        Err(e) => {
            warn!(%target, error = %e, "call to main service failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, TRIGGER_FAILED_BODY)
        }
    };
    Ok(response)
}

async fn hello(size: usize) -> HttpResponse {
    match tokio::task::spawn_blocking(move || workload::hello_round(size)).await {
        Ok(Ok(())) => text(StatusCode::OK, HELLO_BODY),
        Ok(Err(e)) => {
            warn!(error = %e, "hello workload failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            warn!(error = %e, "hello workload panicked");
            text(StatusCode::INTERNAL_SERVER_ERROR, "workload failed")
        }
    }
}

async fn stop(state: &PrimaryState) -> HttpResponse {
    info!("stopping profile");
    match state.profile.stop().await {
        Ok(true) => info!(path = %state.profile.path().display(), "profile stopped"),
        Ok(false) => debug!("profile already stopped"),
        Err(e) => warn!(error = %e, "failed to finalize profile"),
    }
    if state.cancel.cancel() {
        info!("cancellation signalled");
    }
    text(StatusCode::OK, STOP_BODY)
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Issues `GET path` to `target` (`host:port`) over a fresh HTTP/1.1
/// connection and returns the status and full body.
pub async fn fetch(target: &str, path: &str) -> Result<(StatusCode, Bytes), ServerError> {
    let stream = TcpStream::connect(target).await?;
    let (mut sender, conn) = client_http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "client connection terminated");
        }
    });

    let request = Request::builder()
        .uri(path)
        .header(header::HOST, target)
        .body(Empty::<Bytes>::new())?;
    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, body))
}
