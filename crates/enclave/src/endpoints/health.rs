//! # /health エンドポイント

use axum::Json;
use redactor_types::HealthResponse;

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "redactor-enclave".to_string(),
    })
}
