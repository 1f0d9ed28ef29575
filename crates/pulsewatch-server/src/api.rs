//! Read-only admin API: health, latest insights, watermarks, run history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::now(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

fn map_db_error(error: &pulsewatch_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new("internal_error", "database query failed")
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/clients/{client_id}/insight/latest",
            get(latest_insight),
        )
        .route("/api/clients/{client_id}/watermark", get(watermark))
        .route("/api/runs", get(list_runs))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let meta = ResponseMeta::now();

    match pulsewatch_db::ping(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct InsightItem {
    insight_id: Uuid,
    client_id: String,
    run_time: DateTime<Utc>,
    body: serde_json::Value,
    created_at: DateTime<Utc>,
}

async fn latest_insight(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ApiResponse<InsightItem>>, ApiError> {
    let row = pulsewatch_db::get_latest_insight(&state.pool, &client_id)
        .await
        .map_err(|e| map_db_error(&e))?
        .ok_or_else(|| {
            ApiError::new("not_found", format!("no insight recorded for '{client_id}'"))
        })?;

    Ok(Json(ApiResponse {
        data: InsightItem {
            insight_id: row.public_id,
            client_id: row.client_id,
            run_time: row.run_time,
            body: row.body,
            created_at: row.created_at,
        },
        meta: ResponseMeta::now(),
    }))
}

#[derive(Debug, Serialize)]
struct WatermarkItem {
    client_id: String,
    last_sync_time: Option<DateTime<Utc>>,
}

async fn watermark(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ApiResponse<WatermarkItem>>, ApiError> {
    let last_sync_time = pulsewatch_db::get_watermark(&state.pool, &client_id)
        .await
        .map_err(|e| map_db_error(&e))?;

    Ok(Json(ApiResponse {
        data: WatermarkItem {
            client_id,
            last_sync_time,
        },
        meta: ResponseMeta::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct RunsQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RunItem {
    sync_run_id: Uuid,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    clients_processed: i32,
    clients_skipped: i32,
    clients_failed: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = pulsewatch_db::list_sync_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(&e))?;

    let data = rows
        .into_iter()
        .map(|row| RunItem {
            sync_run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            clients_processed: row.clients_processed,
            clients_skipped: row.clients_skipped,
            clients_failed: row.clients_failed,
            error_message: row.error_message,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::now(),
    }))
}
