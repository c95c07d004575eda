use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{post, State};
use serde_json::{json, Value};
use tracing::error;

use crate::api::ApiResponse;
use crate::models::PipelineError;
use crate::push::{PushOrchestrator, PushRequest};
use crate::server::ServerState;

#[post("/push", data = "<request>")]
pub async fn push_records(
    state: &State<ServerState>,
    request: Json<PushRequest>,
) -> (Status, Json<ApiResponse<Value>>) {
    let orchestrator = PushOrchestrator::new(state.db_pool.clone(), state.registry.clone());

    match orchestrator.push(&request).await {
        Ok(report) => match serde_json::to_value(&report) {
            Ok(value) => (Status::Ok, Json(ApiResponse::success(value))),
            Err(e) => (
                Status::InternalServerError,
                Json(ApiResponse::error(e.to_string())),
            ),
        },
        Err(e) => match e.downcast_ref::<PipelineError>() {
            // Rejected up front: nothing was sent anywhere, and the caller
            // gets every offending record.
            Some(PipelineError::PushPrecondition(violations)) => (
                Status::Conflict,
                Json(ApiResponse {
                    success: false,
                    data: Some(json!({ "violations": violations })),
                    error: Some(e.to_string()),
                }),
            ),
            Some(PipelineError::RegistryUnavailable { .. }) => (
                Status::ServiceUnavailable,
                Json(ApiResponse::error(e.to_string())),
            ),
            _ => {
                error!("push failed: {}", e);
                (
                    Status::InternalServerError,
                    Json(ApiResponse::error(e.to_string())),
                )
            }
        },
    }
}
