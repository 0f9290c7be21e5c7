//! HTTP Server Module
//!
//! The request-handling collaborator: a small hyper front that turns
//! query parameters into filters, calls the aggregation engine, and maps
//! engine errors onto status codes. The engine itself never formats
//! user-facing text.
//!
//! Routes:
//! - `GET /data?image_exists=&min_age=&max_age=` — filtered aggregate as JSON
//! - `POST /data` — publish the unfiltered CSV aggregate to the store
//! - `GET /stats?image_exists=&min_age=&max_age=` — average age as JSON

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::aggregator::UserDataAggregator;
use crate::export::ExportOptions;
use crate::filter::{filters_from_params, FilterParams};
use crate::{AggregatorError, Result};

/// Accept loop. Runs until the listener fails; graceful shutdown is the
/// caller's concern (select against a shutdown future).
pub async fn serve(addr: SocketAddr, aggregator: Arc<UserDataAggregator>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AggregatorError::IoError(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Aggregation server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| AggregatorError::IoError(format!("Failed to accept connection: {}", e)))?;

        let io = TokioIo::new(stream);
        let aggregator = Arc::clone(&aggregator);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let aggregator = Arc::clone(&aggregator);
                async move { handle_request(req, aggregator).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

/// Routes one request and renders the outcome, mapping engine errors to
/// status codes (configuration errors are the caller's fault, storage
/// errors are upstream failures).
async fn handle_request(
    req: Request<Incoming>,
    aggregator: Arc<UserDataAggregator>,
) -> Result<Response<Full<Bytes>>> {
    let query = req.uri().query().unwrap_or("");

    let outcome = match (req.method(), req.uri().path()) {
        (&Method::GET, "/data") => data_response(query, &aggregator).await,
        (&Method::POST, "/data") => publish_response(&aggregator).await,
        (&Method::GET, "/stats") => stats_response(query, &aggregator).await,
        _ => {
            return respond(StatusCode::NOT_FOUND, "text/plain", Bytes::from_static(b"Not found"));
        }
    };

    match outcome {
        Ok((content_type, body)) => respond(StatusCode::OK, content_type, body),
        Err(err) => {
            let status = match &err {
                e if e.is_configuration() => StatusCode::BAD_REQUEST,
                AggregatorError::StorageError(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            respond(status, "text/plain", Bytes::from(err.to_string()))
        }
    }
}

async fn data_response(
    query: &str,
    aggregator: &UserDataAggregator,
) -> Result<(&'static str, Bytes)> {
    let params = parse_filter_params(query)?;
    let filters = filters_from_params(&params, &aggregator.config().empty_value, Utc::now());

    let output = aggregator
        .aggregate(None, &filters, None, Some(ExportOptions::json()))
        .await?;
    Ok(("application/json", output.into_bytes()))
}

async fn publish_response(aggregator: &UserDataAggregator) -> Result<(&'static str, Bytes)> {
    let output_key = aggregator.config().output_key.clone();
    let confirmation = aggregator.publish(&output_key, None).await?;

    let body = serde_json::json!({
        "name": output_key,
        "e_tag": confirmation.e_tag,
        "version": confirmation.version,
    });
    Ok(("application/json", Bytes::from(body.to_string())))
}

async fn stats_response(
    query: &str,
    aggregator: &UserDataAggregator,
) -> Result<(&'static str, Bytes)> {
    let params = parse_filter_params(query)?;
    let filters = filters_from_params(&params, &aggregator.config().empty_value, Utc::now());

    let age = aggregator.average_age(&filters, None).await?;
    Ok(("application/json", Bytes::from(serde_json::to_string(&age)?)))
}

fn respond(
    status: StatusCode,
    content_type: &str,
    body: Bytes,
) -> Result<Response<Full<Bytes>>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(body))
        .map_err(|e| AggregatorError::HttpError(format!("Failed to build response: {}", e)))
}

/// Extracts the filter parameters from a query string. Unknown parameters
/// are ignored; malformed values are configuration errors the caller sees
/// as 400s.
fn parse_filter_params(query: &str) -> Result<FilterParams> {
    let mut params = FilterParams::default();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        match name {
            "image_exists" => params.image_exists = Some(parse_bool_param(name, value)?),
            "min_age" => params.min_age = Some(parse_age_param(name, value)?),
            "max_age" => params.max_age = Some(parse_age_param(name, value)?),
            _ => {}
        }
    }

    Ok(params)
}

fn parse_bool_param(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        other => Err(AggregatorError::ConfigError(format!(
            "Boolean parameter {} must be \"true\" or \"false\", got {:?}",
            name, other
        ))),
    }
}

fn parse_age_param(name: &str, value: &str) -> Result<f64> {
    let age: f64 = value.parse().map_err(|e| {
        AggregatorError::ConfigError(format!("Parameter {} is not a number: {}", name, e))
    })?;
    if !age.is_finite() || age < 0.0 {
        return Err(AggregatorError::ConfigError(format!(
            "Parameter {} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(age)
}
