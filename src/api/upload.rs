// The ingestion entrypoint: CSV body in, reconciliation report out.
use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{post, State};
use tracing::error;

use crate::api::ApiResponse;
use crate::ingest::{UploadOptions, UploadProcessor, UploadReport};
use crate::models::{PipelineError, Role};
use crate::server::ServerState;

const MAX_CSV_SIZE_MIB: u64 = 25;

#[post("/upload?<assigned_to>&<uploaded_by>&<role>", data = "<file>")]
pub async fn upload_csv(
    state: &State<ServerState>,
    assigned_to: Option<String>,
    uploaded_by: Option<String>,
    role: Option<String>,
    file: Data<'_>,
) -> (Status, Json<ApiResponse<UploadReport>>) {
    let role = match role.as_deref() {
        None | Some("super_admin") => Role::SuperAdmin,
        Some("contributor") => Role::Contributor,
        Some(other) => {
            return (
                Status::BadRequest,
                Json(ApiResponse::error(format!("unknown role: {}", other))),
            )
        }
    };

    let bytes = match file.open(MAX_CSV_SIZE_MIB.mebibytes()).into_bytes().await {
        Ok(capped) if capped.is_complete() => capped.into_inner(),
        Ok(_) => {
            return (
                Status::PayloadTooLarge,
                Json(ApiResponse::error(format!(
                    "CSV larger than {} MiB",
                    MAX_CSV_SIZE_MIB
                ))),
            )
        }
        Err(e) => {
            return (
                Status::BadRequest,
                Json(ApiResponse::error(format!("unreadable upload body: {}", e))),
            )
        }
    };

    let options = UploadOptions {
        assigned_to,
        uploaded_by: uploaded_by.unwrap_or_else(|| "system".to_string()),
        role,
    };

    let processor = UploadProcessor::new(state.db_pool.clone(), state.registry.clone());
    match processor.process(&bytes, &options).await {
        Ok(report) => (Status::Ok, Json(ApiResponse::success(report))),
        // Connectivity problems get their own status so callers can tell
        // "registry down" apart from "bad file".
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(PipelineError::RegistryUnavailable { .. }) => {
                (Status::ServiceUnavailable, Json(ApiResponse::error(e.to_string())))
            }
            Some(PipelineError::InvalidCsv(_)) => {
                (Status::UnprocessableEntity, Json(ApiResponse::error(e.to_string())))
            }
            _ => {
                error!("upload failed: {}", e);
                (Status::InternalServerError, Json(ApiResponse::error(e.to_string())))
            }
        },
    }
}
