use std::sync::Arc;

use rocket::{routes, Build, Rocket};

use crate::api::*;
use crate::config::Config;
use crate::database::DbPool;
use crate::registry::RegistryApi;

pub mod routes;

pub struct ServerState {
    pub config: Config,
    pub db_pool: DbPool,
    pub registry: Arc<dyn RegistryApi>,
}

pub fn build_rocket(config: Config, db_pool: DbPool, registry: Arc<dyn RegistryApi>) -> Rocket<Build> {
    let state = ServerState {
        config,
        db_pool,
        registry,
    };

    rocket::build().manage(state).mount(
        "/api",
        routes![
            // Health and info endpoints
            routes::health::health_check,
            routes::health::index,
            // Ingestion
            upload_csv,
            // Promotion
            push_records,
            // Records and review transitions
            list_in_process,
            list_final,
            update_record_status,
            delete_record,
            mark_as_publisher,
            // Upload tasks
            get_task,
        ],
    )
}
