use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ingest::normalize::normalize_domain;
use crate::models::{PipelineError, Result};
use crate::registry::token::TokenProvider;
use crate::registry::{
    ApprovalResult, BulkImportResult, ImportSite, PriceCheckResult, PriceCheckSite,
    RegistryApi, RemoteDuplicate, RemotePublisher,
};

pub struct RegistryClient {
    base_url: String,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout_seconds: u64, tokens: Arc<dyn TokenProvider>) -> Self {
        let client = Client::builder()
            .user_agent("outreach-sync/0.1")
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
        }
    }

    /// POST with bearer auth. Every failure mode here (connect, timeout,
    /// HTTP status, body shape) collapses into RegistryUnavailable so
    /// callers can decide whether the operation is fatal.
    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<T> {
        let unavailable = |detail: String| {
            warn!("registry call failed during {}: {}", context, detail);
            PipelineError::RegistryUnavailable {
                context: context.to_string(),
            }
        };

        let token = self
            .tokens
            .bearer()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status)).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| unavailable(format!("bad response body: {}", e)).into())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> Result<T> {
        let unavailable = |detail: String| {
            warn!("registry call failed during {}: {}", context, detail);
            PipelineError::RegistryUnavailable {
                context: context.to_string(),
            }
        };

        let token = self
            .tokens
            .bearer()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status)).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| unavailable(format!("bad response body: {}", e)).into())
    }
}

#[derive(Serialize)]
struct CheckDuplicatesRequest {
    domains: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckDuplicatesResponse {
    #[serde(default)]
    existing_domains: Vec<String>,
    #[serde(default)]
    existing_sites: Vec<ExistingSite>,
}

#[derive(Deserialize)]
struct ExistingSite {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(
        default,
        alias = "domain",
        alias = "siteUrl",
        alias = "site_url",
        alias = "url"
    )]
    site: Option<String>,
}

fn id_to_string(id: &serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The remote normalizes inconsistently, so each URL goes out in every
/// spelling it might be stored under.
fn url_variants(normalized: &str) -> Vec<String> {
    vec![
        normalized.to_string(),
        format!("https://{}", normalized),
        format!("https://{}/", normalized),
        format!("http://{}", normalized),
        format!("www.{}", normalized),
    ]
}

#[derive(Serialize)]
struct PriceCheckRequest<'a> {
    sites: &'a [PriceCheckSite],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkImportRequest<'a> {
    sites: &'a [ImportSite],
    auto_create_publisher: bool,
}

#[derive(Serialize)]
struct ApprovalRequest<'a> {
    sites: &'a [ImportSite],
}

#[async_trait::async_trait]
impl RegistryApi for RegistryClient {
    async fn check_duplicates(&self, urls: &[String]) -> Result<Vec<RemoteDuplicate>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let domains: Vec<String> = urls.iter().flat_map(|u| url_variants(u)).collect();
        debug!(
            "checking {} urls against registry ({} variants)",
            urls.len(),
            domains.len()
        );

        let response: CheckDuplicatesResponse = self
            .post_json(
                "/api/check-duplicates",
                &CheckDuplicatesRequest { domains },
                "duplicate check",
            )
            .await?;

        // Re-normalize everything the registry sent back before comparing;
        // its stored spellings are as inconsistent as its matching.
        let mut existing: HashMap<String, Option<String>> = HashMap::new();
        for domain in &response.existing_domains {
            existing.entry(normalize_domain(domain)).or_insert(None);
        }
        for site in &response.existing_sites {
            if let Some(url) = &site.site {
                let id = site.id.as_ref().and_then(id_to_string);
                let entry = existing.entry(normalize_domain(url)).or_insert(None);
                if entry.is_none() {
                    *entry = id;
                }
            }
        }

        let duplicates = urls
            .iter()
            .map(|url| match existing.get(url) {
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
            .collect();
        Ok(duplicates)
    }

    async fn fetch_publishers(&self) -> Result<Vec<RemotePublisher>> {
        let publishers: Vec<RemotePublisher> = self
            .get_json("/api/publishers", "publisher directory fetch")
            .await?;
        info!("📇 fetched {} publishers from registry", publishers.len());
        Ok(publishers)
    }

    async fn check_prices_all_modules(
        &self,
        sites: &[PriceCheckSite],
    ) -> Result<Vec<PriceCheckResult>> {
        if sites.is_empty() {
            return Ok(Vec::new());
        }
        self.post_json(
            "/api/check-prices-all-modules",
            &PriceCheckRequest { sites },
            "price comparison",
        )
        .await
    }

    async fn bulk_import(
        &self,
        sites: &[ImportSite],
        auto_create_publisher: bool,
    ) -> Result<BulkImportResult> {
        let result: BulkImportResult = self
            .post_json(
                "/api/bulk-import",
                &BulkImportRequest {
                    sites,
                    auto_create_publisher,
                },
                "bulk import",
            )
            .await?;
        info!(
            "📤 bulk import: {} pushed, {} failed",
            result.pushed_count, result.failed_count
        );
        Ok(result)
    }

    async fn submit_for_approval(&self, sites: &[ImportSite]) -> Result<ApprovalResult> {
        let result: ApprovalResult = self
            .post_json(
                "/api/submit-for-approval",
                &ApprovalRequest { sites },
                "approval submission",
            )
            .await?;
        info!(
            "📤 approval queue: {} submitted, {} skipped",
            result.submitted, result.skipped
        );
        Ok(result)
    }
}
