//! HTTP listener for browser events.
//!
//! Stands in for the collector's listener: it assembles a request context,
//! maps it, and returns the record instead of forwarding it to a sink.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | GET    | `/csc-event`      | Map one browser event                |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::{ConnectInfo, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, log_success, LOG_BROADCASTER};
use super::request::{build_context, EventParams};
use super::types::{error_response, EventResponse};
use crate::config::CollectorConfig;
use crate::error::ServerError;
use crate::transform::pipeline::RecordMapper;

/// Load and validate the mapping, then serve until the process stops.
///
/// A configuration error is returned before the socket is bound.
pub async fn start_server(config: &CollectorConfig) -> Result<(), ServerError> {
    let mapper = RecordMapper::load(&config.schema_file, &config.mapping_file)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    log_success(format!("Clickmap collector running on http://localhost:{}", config.port));
    log_info("   GET  /csc-event  - Map a browser event");
    log_info("   GET  /api/logs   - SSE log stream");
    log_info("   GET  /health     - Health check");

    axum::serve(
        listener,
        router(mapper).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Routes, with the mapper shared by every handler
pub fn router(mapper: RecordMapper) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/csc-event", get(csc_event))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(mapper)
}

/// Health check endpoint
async fn health(State(mapper): State<RecordMapper>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "clickmap",
        "version": env!("CARGO_PKG_VERSION"),
        "schema": mapper.schema().name(),
        "endpoints": {
            "event": "GET /csc-event",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Browser event endpoint
async fn csc_event(
    State(mapper): State<RecordMapper>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Json<EventResponse>, (StatusCode, Json<Value>)> {
    let params = EventParams::from_query(query.as_deref().unwrap_or(""));
    let ctx = build_context(params, &headers, Some(remote)).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(error_response("Event has no location (parameter 'l')")),
        )
    })?;

    let record = mapper
        .build(&ctx)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, Json(error_response(&e.to_string()))))?;

    Ok(Json(EventResponse::new(
        &ctx.envelope().event_id,
        mapper.schema().name(),
        ctx.envelope().unreliable,
        &record,
    )))
}
