use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use sofra_db::DbPool;

const READY: &str = "ready";
const DEGRADED: &str = "degraded";

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: READY, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: DEGRADED, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Readiness probe. Degrades, with 503, as soon as the database stops
/// answering; the service check reports the process itself.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await
    {
        Ok(_) => HealthCheck::ready("database answered"),
        Err(error) => HealthCheck::degraded(format!("database query failed: {error}")),
    };
    let all_ready = database.status == READY;

    let payload = HealthResponse {
        status: if all_ready { READY } else { DEGRADED },
        service: HealthCheck::ready("sofra-server runtime initialized"),
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if all_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
