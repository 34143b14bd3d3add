use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing::{debug, error};

use crate::middleware::request_logging;
use crate::models::{ScenarioId, SimulationInput};
use crate::report::{Report, ReportError, ReportFormat, PDF_FILENAME};
use crate::scenarios::{ScenarioStore, StoreError};
use crate::simulation::simulate;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: ScenarioStore,
}

/// Create the API router: `/health` plus everything under `/api`.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/simulate", post(run_simulation))
        .route("/scenarios", post(create_scenario).get(list_scenarios))
        .route(
            "/scenarios/:id",
            get(get_scenario).delete(delete_scenario),
        )
        .route("/report/generate", post(generate_report));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_logging))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Live preview. Any subset of fields is accepted, including no body at all.
async fn run_simulation(body: Option<Json<Value>>) -> Json<Value> {
    let input = parse_input(body);
    let result = simulate(&input);
    Json(json!({ "ok": true, "result": result }))
}

async fn create_scenario(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let scenario = state.store.create(parse_input(body)).await?;
    debug!(id = %scenario.id, "scenario saved");
    Ok(Json(json!({ "ok": true, "id": scenario.id })))
}

async fn list_scenarios(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let scenarios = state.store.list().await?;
    Ok(Json(json!({ "ok": true, "scenarios": scenarios })))
}

async fn get_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let scenario = state.store.get(&ScenarioId::parse(&id)).await?;
    Ok(Json(json!({ "ok": true, "scenario": scenario })))
}

/// Succeeds whether or not the record existed; `deleted` tells which.
async fn delete_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.store.delete(&ScenarioId::parse(&id)).await?;
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

/// The body is read leniently: a missing or non-JSON body counts as `{}`, and
/// a non-string `email` counts as absent, so every bad request gets the same
/// 400 envelope.
async fn generate_report(body: Option<Json<Value>>) -> Result<Response, ApiError> {
    let req = ReportRequest::from(body.map(|Json(v)| v).unwrap_or(Value::Null));
    let input = SimulationInput::from(req.input);
    let result = simulate(&input);
    let report = Report::new(&input, &result, req.email.as_deref().unwrap_or_default())?;

    match ReportFormat::parse(req.format.as_deref()) {
        ReportFormat::Html => Ok(Json(json!({ "ok": true, "html": report.render_html() }))
            .into_response()),
        ReportFormat::Pdf => {
            let pdf = report.render_pdf()?;
            Ok((
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{PDF_FILENAME}\""),
                    ),
                ],
                pdf,
            )
                .into_response())
        }
    }
}

fn parse_input(body: Option<Json<Value>>) -> SimulationInput {
    body.map(|Json(v)| SimulationInput::from(v)).unwrap_or_default()
}

/// Turns a handler panic into the usual error envelope.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(detail).into_response()
}

// ===== Request Types =====

#[derive(Debug)]
struct ReportRequest {
    email: Option<String>,
    input: Value,
    format: Option<String>,
}

impl From<Value> for ReportRequest {
    fn from(mut body: Value) -> Self {
        let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
        Self {
            email: text(body.get("email")),
            format: text(body.get("format")),
            input: body.get_mut("input").map(Value::take).unwrap_or(Value::Null),
        }
    }
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Report(ReportError),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::Report(err)
    }
}

const INTERNAL: &str = "Internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(StoreError::Unavailable(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            ApiError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Scenario not found".to_string())
            }
            ApiError::Store(StoreError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Store(err @ StoreError::Backend(_)) => {
                error!("Store error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
            ApiError::Report(err @ ReportError::MissingEmail) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Report(err) => {
                error!("Report error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
            ApiError::Internal(detail) => {
                error!("Handler panicked: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
        };

        let body = Json(json!({
            "ok": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            status_of(StoreError::not_configured().into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(StoreError::NotFound(ScenarioId::mint_durable()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ReportError::MissingEmail.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_report_request_is_lenient() {
        let req = ReportRequest::from(json!({ "email": 5, "format": ["pdf"], "input": { "error_cost": 9 } }));
        assert_eq!(req.email, None);
        assert_eq!(req.format, None);
        assert_eq!(req.input, json!({ "error_cost": 9 }));

        let req = ReportRequest::from(Value::Null);
        assert_eq!(req.email, None);
        assert!(req.input.is_null());
    }

    #[test]
    fn test_missing_body_uses_defaults() {
        assert_eq!(parse_input(None), SimulationInput::default());
    }

    #[test]
    fn test_panic_payloads() {
        let resp = handle_panic(Box::new("static message"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = handle_panic(Box::new(42_u8));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
