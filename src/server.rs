//! HTTP surface
//!
//! Every POST endpoint comes from [`ROUTES`]: a path bound to a template, a
//! page layout and optional spreadsheet bindings. All of them share one
//! handler, so adding a document type is one table entry.
//!
//! Bodies are read as raw bytes and parsed here. A request without a
//! `Content-Type` is still read as JSON; one that declares any other media
//! type is refused with 415.

use crate::{
    check_health, ErrorEnvelope, OutputEnvelope, PageLayout, RenderError, RenderRequest,
    RenderService, TableBinding,
};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// One document endpoint
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub path: &'static str,
    pub template_id: &'static str,
    pub layout: PageLayout,
    pub tables: &'static [TableBinding],
    pub load_timeout: Option<Duration>,
}

pub const ROUTES: &[RouteSpec] = &[
    RouteSpec {
        path: "/generate-quote",
        template_id: "manager_report",
        layout: PageLayout::a4_landscape(),
        tables: &[],
        load_timeout: None,
    },
    RouteSpec {
        path: "/generate-report",
        template_id: "sales_report",
        layout: PageLayout::a4_portrait(0.4),
        tables: &[TableBinding {
            source: "excelBase64",
            target: "excelRows",
        }],
        load_timeout: Some(Duration::from_secs(90)),
    },
];

const BANNER: &str = "quote-render is running";
const POST_HINT: &str = "OK (POST required)";

#[derive(Clone)]
pub struct AppState {
    pub service: RenderService,
    pub metrics: Option<PrometheusHandle>,
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorEnvelope::from_error(&self))).into_response()
    }
}

pub fn build_router(state: AppState, routes: &[RouteSpec], body_limit: usize) -> Router {
    let mut router = Router::new()
        .route("/", get(|| async { BANNER }))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text));

    for spec in routes {
        let spec = spec.clone();
        router = router.route(
            spec.path,
            get(|| async { POST_HINT }).post(
                move |State(state): State<AppState>, headers: HeaderMap, body: Bytes| {
                    let spec = spec.clone();
                    async move {
                        check_content_type(&headers)?;
                        generate(state, spec, body).await
                    }
                },
            ),
        );
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn generate(
    state: AppState,
    spec: RouteSpec,
    body: Bytes,
) -> Result<Json<OutputEnvelope>, RenderError> {
    let data = parse_payload(&body)?;
    let request = RenderRequest {
        template_id: spec.template_id.to_string(),
        data,
        layout: spec.layout,
        tables: spec.tables.to_vec(),
        load_timeout: spec.load_timeout,
        ..Default::default()
    };

    let envelope = state.service.handle(request).await?;
    Ok(Json(envelope))
}

/// Accept `application/json`, any `+json` type, or no declared type at all
pub fn check_content_type(headers: &HeaderMap) -> Result<(), RenderError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };

    let declared = value
        .to_str()
        .map_err(|_| RenderError::UnsupportedMediaType("unreadable header".to_string()))?;
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        Ok(())
    } else {
        Err(RenderError::UnsupportedMediaType(declared.to_string()))
    }
}

/// Decode a request body into the template data object
///
/// An empty body or a literal `null` counts as `{}`.
pub fn parse_payload(body: &[u8]) -> Result<Value, RenderError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    match serde_json::from_slice::<Value>(body)? {
        Value::Null => Ok(Value::Object(Map::new())),
        object @ Value::Object(_) => Ok(object),
        other => Err(RenderError::InvalidPayload(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(check_health(&state.service))
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Bind, optionally warm the browser, and serve until SIGINT/SIGTERM
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    body_limit: usize,
    warm_start: bool,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    let service = state.service.clone();
    if warm_start {
        let warm = service.clone();
        tokio::spawn(async move { warm.warm_up().await });
    }

    let router = build_router(state, ROUTES, body_limit);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
