use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::{self, DbPool, FinalRecord};
use crate::ingest::normalize::normalize_domain;
use crate::models::{PipelineError, RecordViolation, Result, Role};
use crate::publisher::PublisherSyncService;
use crate::registry::{ImportSite, PriceAction, PriceCheckSite, RegistryApi};

#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    /// Empty or absent means every eligible unpushed final record.
    #[serde(default)]
    pub record_ids: Option<Vec<i64>>,
    pub requested_by: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedPush {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct PushDetails {
    pub submitted: Vec<String>,
    pub skipped: Vec<SkippedPush>,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub direct_import: usize,
    pub pending_approval: usize,
    pub failed: usize,
    pub skipped: usize,
    pub details: PushDetails,
}

/// Moves reviewed final records into the main project. Records split into a
/// direct-import batch and a submit-for-approval batch by role and remote
/// price standing; local rows get their pushed markers only after the remote
/// call that covers them succeeds.
pub struct PushOrchestrator {
    db_pool: DbPool,
    registry: Arc<dyn RegistryApi>,
}

impl PushOrchestrator {
    pub fn new(db_pool: DbPool, registry: Arc<dyn RegistryApi>) -> Self {
        Self { db_pool, registry }
    }

    pub async fn push(&self, request: &PushRequest) -> Result<PushReport> {
        let records =
            database::fetch_final_unpushed(&self.db_pool, request.record_ids.as_deref()).await?;
        if records.is_empty() {
            info!("push requested but no eligible unpushed records");
            return Ok(PushReport::default());
        }

        // Every record must be pushable before anything leaves the building;
        // one offender rejects the whole request with the full list.
        let violations = validate_preconditions(&records);
        if !violations.is_empty() {
            return Err(PipelineError::PushPrecondition(violations).into());
        }

        let mut report = PushReport::default();
        let (direct, approval) = self.split_by_destination(&records, request, &mut report).await?;

        if !direct.is_empty() {
            let sites: Vec<ImportSite> = direct.iter().map(import_site).collect();
            match self.registry.bulk_import(&sites, true).await {
                Ok(result) => {
                    for outcome in &result.results {
                        let url = normalize_domain(&outcome.site_url);
                        match (&outcome.success, &outcome.main_project_id) {
                            (true, Some(remote_id)) => {
                                database::mark_final_pushed(
                                    &self.db_pool,
                                    &url,
                                    remote_id,
                                    &request.requested_by,
                                )
                                .await?;
                                report.direct_import += 1;
                            }
                            _ => {
                                report.failed += 1;
                                report.details.errors.push(format!(
                                    "{}: {}",
                                    url,
                                    outcome.error.as_deref().unwrap_or("import failed")
                                ));
                            }
                        }
                    }
                }
                Err(e) => {
                    report.failed += direct.len();
                    report
                        .details
                        .errors
                        .push(format!("bulk import failed: {}", e));
                }
            }
        }

        if !approval.is_empty() {
            let sites: Vec<ImportSite> = approval.iter().map(import_site).collect();
            match self.registry.submit_for_approval(&sites).await {
                Ok(result) => {
                    for submitted in &result.details.submitted {
                        let url = normalize_domain(&submitted.site_url);
                        if let Some(remote_id) = &submitted.id {
                            database::mark_final_pushed(
                                &self.db_pool,
                                &url,
                                remote_id,
                                &request.requested_by,
                            )
                            .await?;
                        }
                        report.pending_approval += 1;
                        report.details.submitted.push(url);
                    }
                    for skipped in &result.details.skipped {
                        report.skipped += 1;
                        report.details.skipped.push(SkippedPush {
                            url: normalize_domain(&skipped.site_url),
                            reason: skipped
                                .reason
                                .clone()
                                .unwrap_or_else(|| "skipped by approval queue".to_string()),
                        });
                    }
                    report.details.errors.extend(result.details.errors.clone());
                }
                Err(e) => {
                    report.failed += approval.len();
                    report
                        .details
                        .errors
                        .push(format!("approval submission failed: {}", e));
                }
            }
        }

        // Newly-imported sites may have created publishers remotely; give
        // local pending identities a chance to catch up right away.
        let sync = PublisherSyncService::new(self.db_pool.clone(), Arc::clone(&self.registry), 0);
        if let Err(e) = sync.sync_once().await {
            warn!("post-push publisher sync failed: {}", e);
        }

        info!(
            "🚚 push complete: {} direct, {} approval, {} skipped, {} failed",
            report.direct_import, report.pending_approval, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Role decides the split. Contributors never get direct-import rights;
    /// admins go direct only for sites the registry doesn't know, with price
    /// standing routing the rest.
    async fn split_by_destination<'a>(
        &self,
        records: &'a [FinalRecord],
        request: &PushRequest,
        report: &mut PushReport,
    ) -> Result<(Vec<&'a FinalRecord>, Vec<&'a FinalRecord>)> {
        match request.role {
            Role::Contributor => Ok((Vec::new(), records.iter().collect())),
            Role::SuperAdmin => {
                let urls: Vec<String> = records.iter().map(|r| r.website_url.clone()).collect();
                // Unknown duplicate state is as fatal here as during upload.
                let remote = self.registry.check_duplicates(&urls).await?;
                let dup_urls: Vec<&str> = remote
                    .iter()
                    .filter(|d| d.is_duplicate)
                    .map(|d| d.url.as_str())
                    .collect();

                let price_sites: Vec<PriceCheckSite> = records
                    .iter()
                    .filter(|r| dup_urls.contains(&r.website_url.as_str()))
                    .map(|r| PriceCheckSite {
                        site_url: r.website_url.clone(),
                        price: r.fields.gb_base_price,
                    })
                    .collect();
                let price_answers: HashMap<String, PriceAction> = if price_sites.is_empty() {
                    HashMap::new()
                } else {
                    match self.registry.check_prices_all_modules(&price_sites).await {
                        Ok(results) => results
                            .into_iter()
                            .map(|r| (r.site_url.clone(), r.action))
                            .collect(),
                        Err(e) => {
                            // No price info: the conservative default routes
                            // every remote duplicate to the approval queue.
                            warn!("price comparison unavailable during push: {}", e);
                            HashMap::new()
                        }
                    }
                };

                let mut direct = Vec::new();
                let mut approval = Vec::new();
                for record in records {
                    if !dup_urls.contains(&record.website_url.as_str()) {
                        direct.push(record);
                        continue;
                    }
                    match price_answers.get(&record.website_url) {
                        // Our price wins, but an existing remote record is
                        // never overwritten blind; a reviewer confirms it.
                        Some(PriceAction::Update) => approval.push(record),
                        Some(PriceAction::SkipSame) | Some(PriceAction::SkipHigher) => {
                            report.skipped += 1;
                            report.details.skipped.push(SkippedPush {
                                url: record.website_url.clone(),
                                reason: "higher/same price in main project".to_string(),
                            });
                        }
                        Some(PriceAction::Create) | None => approval.push(record),
                    }
                }
                Ok((direct, approval))
            }
        }
    }
}

fn validate_preconditions(records: &[FinalRecord]) -> Vec<RecordViolation> {
    let mut violations = Vec::new();
    for record in records {
        let mut reasons = Vec::new();
        if record.fields.gb_base_price.map(|p| p <= 0.0).unwrap_or(true) {
            reasons.push("missing positive price".to_string());
        }
        if record.identity().email().is_none() {
            reasons.push("no publisher or contact email".to_string());
        }
        if !reasons.is_empty() {
            violations.push(RecordViolation {
                url: record.website_url.clone(),
                reasons,
            });
        }
    }
    violations
}

fn import_site(record: &&FinalRecord) -> ImportSite {
    let identity = record.identity();
    ImportSite {
        site_url: record.website_url.clone(),
        price: record.fields.gb_base_price,
        publisher_email: identity.email().map(|e| e.to_string()),
        publisher_name: record
            .fields
            .publisher_name
            .clone()
            .or_else(|| record.fields.contact_name.clone()),
        category: record.fields.category.clone(),
        country: record.fields.country.clone(),
        language: record.fields.language.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::test_pool;
    use crate::models::{PublisherIdentity, SiteFields};
    use crate::registry::fake::FakeRegistry;

    async fn seed_final(
        pool: &DbPool,
        url: &str,
        price: Option<f64>,
        identity: &PublisherIdentity,
    ) -> i64 {
        let in_process_id = database::insert_in_process(
            pool,
            url,
            &SiteFields {
                gb_base_price: price,
                ..Default::default()
            },
            identity,
            None,
            None,
        )
        .await
        .unwrap();
        let record = database::get_in_process_by_id(pool, in_process_id)
            .await
            .unwrap()
            .unwrap();
        database::promote_to_final(pool, &record).await.unwrap()
    }

    fn contact(email: &str) -> PublisherIdentity {
        PublisherIdentity::Contact {
            name: None,
            email: Some(email.to_string()),
        }
    }

    fn admin_request() -> PushRequest {
        PushRequest {
            record_ids: None,
            requested_by: "admin".to_string(),
            role: Role::SuperAdmin,
        }
    }

    #[tokio::test]
    async fn splits_direct_import_and_pending_approval() {
        let pool = test_pool().await;
        seed_final(&pool, "fresh.com", Some(50.0), &contact("a@x.com")).await;
        seed_final(&pool, "better.com", Some(30.0), &contact("b@x.com")).await;

        let registry = FakeRegistry::new()
            .with_existing("better.com", Some("901"))
            .with_price_action("better.com", PriceAction::Update, Some(80.0));
        let orchestrator = PushOrchestrator::new(pool.clone(), Arc::new(registry));

        let report = orchestrator.push(&admin_request()).await.unwrap();
        assert_eq!(report.direct_import, 1);
        assert_eq!(report.pending_approval, 1);
        assert_eq!(report.failed, 0);

        // Both got their pushed marker from their respective remote call.
        let fresh = database::get_final_by_url(&pool, "fresh.com")
            .await
            .unwrap()
            .unwrap();
        assert!(fresh.main_project_id.is_some());
        assert!(fresh.pushed_at.is_some());
        assert_eq!(fresh.pushed_by.as_deref(), Some("admin"));

        let better = database::get_final_by_url(&pool, "better.com")
            .await
            .unwrap()
            .unwrap();
        assert!(better.main_project_id.is_some());
    }

    #[tokio::test]
    async fn precondition_failures_reject_before_any_remote_call() {
        let pool = test_pool().await;
        seed_final(&pool, "no-price.com", None, &contact("a@x.com")).await;
        seed_final(&pool, "no-identity.com", Some(40.0), &PublisherIdentity::Unknown).await;
        seed_final(&pool, "fine.com", Some(40.0), &contact("c@x.com")).await;

        let registry = Arc::new(FakeRegistry::new());
        let orchestrator = PushOrchestrator::new(pool.clone(), Arc::clone(&registry) as Arc<dyn RegistryApi>);

        let err = orchestrator.push(&admin_request()).await.unwrap_err();
        let pipeline = err.downcast_ref::<PipelineError>().unwrap();
        match pipeline {
            PipelineError::PushPrecondition(violations) => {
                let urls: Vec<&str> = violations.iter().map(|v| v.url.as_str()).collect();
                assert_eq!(urls, vec!["no-price.com", "no-identity.com"]);
            }
            other => panic!("expected precondition error, got {:?}", other),
        }

        // The registry was never contacted.
        assert!(registry.call_log().is_empty());
    }

    #[tokio::test]
    async fn contributors_always_go_through_approval() {
        let pool = test_pool().await;
        seed_final(&pool, "site.com", Some(25.0), &contact("a@x.com")).await;

        let registry = Arc::new(FakeRegistry::new());
        let orchestrator = PushOrchestrator::new(pool.clone(), Arc::clone(&registry) as Arc<dyn RegistryApi>);

        let report = orchestrator
            .push(&PushRequest {
                record_ids: None,
                requested_by: "contrib".to_string(),
                role: Role::Contributor,
            })
            .await
            .unwrap();

        assert_eq!(report.direct_import, 0);
        assert_eq!(report.pending_approval, 1);
        // Contributors skip the duplicate check entirely; nothing imports
        // directly.
        let calls = registry.call_log();
        assert!(!calls.contains(&"bulk_import".to_string()));
        assert!(calls.contains(&"submit_for_approval".to_string()));
    }

    #[tokio::test]
    async fn equal_or_higher_remote_price_skips_the_record() {
        let pool = test_pool().await;
        seed_final(&pool, "worse.com", Some(90.0), &contact("a@x.com")).await;

        let registry = FakeRegistry::new()
            .with_existing("worse.com", Some("902"))
            .with_price_action("worse.com", PriceAction::SkipSame, Some(90.0));
        let orchestrator = PushOrchestrator::new(pool.clone(), Arc::new(registry));

        let report = orchestrator.push(&admin_request()).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.direct_import, 0);
        assert_eq!(report.pending_approval, 0);
        assert_eq!(
            report.details.skipped[0].reason,
            "higher/same price in main project"
        );

        let record = database::get_final_by_url(&pool, "worse.com")
            .await
            .unwrap()
            .unwrap();
        assert!(record.main_project_id.is_none());
    }

    #[tokio::test]
    async fn explicit_id_list_narrows_the_push() {
        let pool = test_pool().await;
        let first = seed_final(&pool, "one.com", Some(10.0), &contact("a@x.com")).await;
        seed_final(&pool, "two.com", Some(10.0), &contact("b@x.com")).await;

        let orchestrator = PushOrchestrator::new(pool.clone(), Arc::new(FakeRegistry::new()));
        let report = orchestrator
            .push(&PushRequest {
                record_ids: Some(vec![first]),
                requested_by: "admin".to_string(),
                role: Role::SuperAdmin,
            })
            .await
            .unwrap();

        assert_eq!(report.direct_import, 1);
        let untouched = database::get_final_by_url(&pool, "two.com")
            .await
            .unwrap()
            .unwrap();
        assert!(untouched.main_project_id.is_none());
    }
}
