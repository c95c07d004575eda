use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ApiResponse;
use crate::database::{self, FinalRecord, InProcessRecord, SiteTable};
use crate::models::{InProcessStatus, PublisherIdentity};
use crate::publisher::resolver::mint_pending_identity;
use crate::server::ServerState;

#[get("/records/in-process?<page>&<per_page>")]
pub async fn list_in_process(
    state: &State<ServerState>,
    page: Option<usize>,
    per_page: Option<usize>,
) -> Json<ApiResponse<Vec<InProcessRecord>>> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(50).min(1000);
    let offset = (page - 1) * per_page;

    match database::list_in_process(&state.db_pool, per_page, offset).await {
        Ok(records) => Json(ApiResponse::success(records)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

#[get("/records/final?<page>&<per_page>")]
pub async fn list_final(
    state: &State<ServerState>,
    page: Option<usize>,
    per_page: Option<usize>,
) -> Json<ApiResponse<Vec<FinalRecord>>> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(50).min(1000);
    let offset = (page - 1) * per_page;

    match database::list_final(&state.db_pool, per_page, offset).await {
        Ok(records) => Json(ApiResponse::success(records)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// Review transition for an in-process record. REACHED is the promotion
/// path: the record moves to the final table and leaves this one.
#[put("/records/in-process/<id>/status", data = "<request>")]
pub async fn update_record_status(
    state: &State<ServerState>,
    id: i64,
    request: Json<StatusUpdateRequest>,
) -> Json<ApiResponse<Value>> {
    let status = match InProcessStatus::parse(&request.status) {
        Some(status) => status,
        None => {
            return Json(ApiResponse::error(format!(
                "unknown status: {}",
                request.status
            )))
        }
    };

    let record = match database::get_in_process_by_id(&state.db_pool, id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Json(ApiResponse::error(format!("record {} not found", id))),
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    match status {
        InProcessStatus::Reached => {
            match database::promote_to_final(&state.db_pool, &record).await {
                Ok(final_id) => Json(ApiResponse::success(json!({
                    "promoted": true,
                    "final_record_id": final_id,
                }))),
                Err(e) => Json(ApiResponse::error(e.to_string())),
            }
        }
        other => match database::update_in_process_status(&state.db_pool, id, other).await {
            Ok(()) => Json(ApiResponse::success(json!({
                "promoted": false,
                "status": other.as_str(),
            }))),
            Err(e) => Json(ApiResponse::error(e.to_string())),
        },
    }
}

#[delete("/records/in-process/<id>")]
pub async fn delete_record(state: &State<ServerState>, id: i64) -> Json<ApiResponse<Value>> {
    let record = match database::get_in_process_by_id(&state.db_pool, id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Json(ApiResponse::error(format!("record {} not found", id))),
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    match database::delete_in_process(&state.db_pool, &record).await {
        Ok(()) => Json(ApiResponse::success(json!({ "deleted": true }))),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

/// Promotes a contact-only record to a pending publisher identity so it
/// becomes push-eligible without waiting for the remote directory. Reuses an
/// existing pending identity when the email already has one.
#[post("/records/<table>/<id>/mark-publisher")]
pub async fn mark_as_publisher(
    state: &State<ServerState>,
    table: &str,
    id: i64,
) -> Json<ApiResponse<Value>> {
    let (site_table, identity) = match table {
        "in-process" => match database::get_in_process_by_id(&state.db_pool, id).await {
            Ok(Some(record)) => (SiteTable::InProcess, record.identity()),
            Ok(None) => return Json(ApiResponse::error(format!("record {} not found", id))),
            Err(e) => return Json(ApiResponse::error(e.to_string())),
        },
        "final" => match database::get_final_by_id(&state.db_pool, id).await {
            Ok(Some(record)) => (SiteTable::Final, record.identity()),
            Ok(None) => return Json(ApiResponse::error(format!("record {} not found", id))),
            Err(e) => return Json(ApiResponse::error(e.to_string())),
        },
        other => return Json(ApiResponse::error(format!("unknown table: {}", other))),
    };

    let (name, email) = match &identity {
        PublisherIdentity::Contact {
            name,
            email: Some(email),
        } => (name.clone(), email.clone()),
        PublisherIdentity::Contact { email: None, .. } | PublisherIdentity::Unknown => {
            return Json(ApiResponse::error(
                "record has no contact email to promote".to_string(),
            ))
        }
        PublisherIdentity::Matched { .. } | PublisherIdentity::Pending { .. } => {
            return Json(ApiResponse::error(
                "record already carries a publisher identity".to_string(),
            ))
        }
    };

    // One pending identity per real-world email, across both tables.
    let pending = match database::find_pending_identity_by_email(&state.db_pool, &email).await {
        Ok(Some(existing)) => PublisherIdentity::Pending {
            local_id: existing.local_id,
            name: existing.name,
            email: Some(existing.email),
        },
        Ok(None) => mint_pending_identity(name.as_deref(), &email),
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    let (local_id, pending_name, pending_email) = match pending {
        PublisherIdentity::Pending {
            local_id,
            name,
            email: pending_email,
        } => (local_id, name, pending_email.unwrap_or(email)),
        _ => unreachable!("mark-publisher always yields a pending identity"),
    };

    match database::mark_record_as_publisher(
        &state.db_pool,
        site_table,
        id,
        &local_id,
        pending_name.as_deref(),
        &pending_email,
    )
    .await
    {
        Ok(()) => Json(ApiResponse::success(json!({
            "publisher_id": local_id,
            "publisher_email": pending_email,
        }))),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}
