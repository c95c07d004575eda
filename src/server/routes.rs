pub mod health {
    use rocket::{get, serde::json::Json};
    use serde_json::{json, Value};

    #[get("/health")]
    pub async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "outreach-sync-api"
        }))
    }

    #[get("/")]
    pub async fn index() -> Json<Value> {
        Json(json!({
            "name": "Outreach Sync API",
            "version": "0.1.0",
            "description": "CSV ingestion, reconciliation and push pipeline for guest-blog outreach",
            "endpoints": {
                "health": "/api/health",
                "upload": "/api/upload",
                "push": "/api/push",
                "in_process": "/api/records/in-process",
                "final": "/api/records/final",
                "tasks": "/api/tasks/<id>"
            }
        }))
    }
}
