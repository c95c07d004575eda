use rocket::serde::json::Json;
use rocket::{get, State};

use crate::api::ApiResponse;
use crate::database::{self, UploadTask};
use crate::server::ServerState;

/// The surface the review UI polls while an upload drains; counts move as
/// rows are promoted or deleted.
#[get("/tasks/<id>")]
pub async fn get_task(state: &State<ServerState>, id: &str) -> Json<ApiResponse<UploadTask>> {
    match database::get_upload_task(&state.db_pool, id).await {
        Ok(Some(task)) => Json(ApiResponse::success(task)),
        Ok(None) => Json(ApiResponse::error(format!("task {} not found", id))),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}
