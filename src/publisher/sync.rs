use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::{self, DbPool};
use crate::models::Result;
use crate::registry::RegistryApi;

#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub emails_checked: usize,
    pub records_upgraded: usize,
}

/// Periodic sweep that upgrades pending/unmatched local identities to
/// canonical remote publisher ids once the directory knows the email.
///
/// Safe to run alongside in-flight uploads: it only touches records already
/// in an unconfirmed state, and uploads always write a terminal identity
/// state on creation.
pub struct PublisherSyncService {
    db_pool: DbPool,
    registry: Arc<dyn RegistryApi>,
    interval: Duration,
}

impl PublisherSyncService {
    pub fn new(db_pool: DbPool, registry: Arc<dyn RegistryApi>, interval_seconds: u64) -> Self {
        Self {
            db_pool,
            registry,
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run_loop(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.sync_once().await {
                Ok(report) if report.records_upgraded > 0 => {
                    info!(
                        "🔁 publisher sync: {} records upgraded across {} emails",
                        report.records_upgraded, report.emails_checked
                    );
                }
                Ok(report) => {
                    debug!(
                        "publisher sync: nothing to upgrade ({} emails checked)",
                        report.emails_checked
                    );
                }
                Err(e) => warn!("publisher sync pass failed: {}", e),
            }
        }
    }

    /// One reconciliation pass. Idempotent: with no newly-resolved emails it
    /// performs zero writes. Directory fetch failure is non-fatal; the next
    /// tick simply tries again.
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let emails = database::fetch_unresolved_emails(&self.db_pool).await?;
        if emails.is_empty() {
            return Ok(SyncReport::default());
        }

        let directory = match self.registry.fetch_publishers().await {
            Ok(publishers) => publishers,
            Err(e) => {
                warn!("publisher directory unavailable, sync deferred: {}", e);
                return Ok(SyncReport {
                    emails_checked: emails.len(),
                    records_upgraded: 0,
                });
            }
        };

        let by_email: HashMap<String, _> = directory
            .iter()
            .filter_map(|p| {
                p.email
                    .as_ref()
                    .map(|e| (e.trim().to_lowercase(), p))
            })
            .collect();

        let mut upgraded = 0usize;
        for email in &emails {
            if let Some(publisher) = by_email.get(email) {
                upgraded += database::upgrade_publisher_identity(
                    &self.db_pool,
                    email,
                    &publisher.id,
                    publisher.publisher_name.as_deref(),
                )
                .await?;
            }
        }

        Ok(SyncReport {
            emails_checked: emails.len(),
            records_upgraded: upgraded,
        })
    }
}
