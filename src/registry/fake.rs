//! In-memory registry used by orchestrator tests.
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{PipelineError, Result};
use crate::registry::{
    ApprovalDetails, ApprovalResult, BulkImportResult, ImportOutcome, ImportSite, PriceAction,
    PriceCheckResult, PriceCheckSite, RegistryApi, RemoteDuplicate, RemotePublisher,
    SubmittedSite,
};

#[derive(Default)]
pub struct FakeRegistry {
    /// normalized url -> existing remote id
    pub existing: HashMap<String, Option<String>>,
    /// normalized url -> (action, current price)
    pub price_actions: HashMap<String, (PriceAction, Option<f64>)>,
    pub publishers: Vec<RemotePublisher>,
    pub fail_duplicate_check: bool,
    pub fail_publisher_fetch: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(mut self, url: &str, id: Option<&str>) -> Self {
        self.existing
            .insert(url.to_string(), id.map(|s| s.to_string()));
        self
    }

    pub fn with_price_action(mut self, url: &str, action: PriceAction, price: Option<f64>) -> Self {
        self.price_actions.insert(url.to_string(), (action, price));
        self
    }

    pub fn with_publisher(mut self, id: &str, email: Option<&str>, name: Option<&str>) -> Self {
        self.publishers.push(RemotePublisher {
            id: id.to_string(),
            email: email.map(|s| s.to_string()),
            publisher_name: name.map(|s| s.to_string()),
        });
        self
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait::async_trait]
impl RegistryApi for FakeRegistry {
    async fn check_duplicates(&self, urls: &[String]) -> Result<Vec<RemoteDuplicate>> {
        self.record("check_duplicates");
        if self.fail_duplicate_check {
            return Err(PipelineError::RegistryUnavailable {
                context: "duplicate check".to_string(),
            }
            .into());
        }
        Ok(urls
            .iter()
            .map(|url| match self.existing.get(url) {
                Some(id) => RemoteDuplicate {
                    url: url.clone(),
                    is_duplicate: true,
                    existing_id: id.clone(),
                },
                None => RemoteDuplicate {
                    url: url.clone(),
                    is_duplicate: false,
                    existing_id: None,
                },
            })
            .collect())
    }

    async fn fetch_publishers(&self) -> Result<Vec<RemotePublisher>> {
        self.record("fetch_publishers");
        if self.fail_publisher_fetch {
            return Err(PipelineError::RegistryUnavailable {
                context: "publisher directory fetch".to_string(),
            }
            .into());
        }
        Ok(self.publishers.clone())
    }

    async fn check_prices_all_modules(
        &self,
        sites: &[PriceCheckSite],
    ) -> Result<Vec<PriceCheckResult>> {
        self.record("check_prices_all_modules");
        Ok(sites
            .iter()
            .map(|site| {
                let (action, current_price) = self
                    .price_actions
                    .get(&site.site_url)
                    .cloned()
                    .unwrap_or((PriceAction::Create, None));
                PriceCheckResult {
                    site_url: site.site_url.clone(),
                    action,
                    current_price,
                }
            })
            .collect())
    }

    async fn bulk_import(
        &self,
        sites: &[ImportSite],
        _auto_create_publisher: bool,
    ) -> Result<BulkImportResult> {
        self.record("bulk_import");
        let results: Vec<ImportOutcome> = sites
            .iter()
            .enumerate()
            .map(|(i, site)| ImportOutcome {
                site_url: site.site_url.clone(),
                success: true,
                main_project_id: Some(format!("mp_{}", i + 1)),
                error: None,
            })
            .collect();
        Ok(BulkImportResult {
            pushed_count: results.len() as i64,
            failed_count: 0,
            results,
        })
    }

    async fn submit_for_approval(&self, sites: &[ImportSite]) -> Result<ApprovalResult> {
        self.record("submit_for_approval");
        let submitted: Vec<SubmittedSite> = sites
            .iter()
            .enumerate()
            .map(|(i, site)| SubmittedSite {
                site_url: site.site_url.clone(),
                id: Some(format!("appr_{}", i + 1)),
            })
            .collect();
        Ok(ApprovalResult {
            submitted: submitted.len() as i64,
            skipped: 0,
            errors: 0,
            details: ApprovalDetails {
                submitted,
                skipped: Vec::new(),
                errors: Vec::new(),
            },
        })
    }
}
