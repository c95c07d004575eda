// Client for the main-project link management system: the system of record
// for published sites and publishers.
use serde::{Deserialize, Serialize};

use crate::models::Result;

pub mod client;
pub mod token;

#[cfg(test)]
pub mod fake;

pub use client::RegistryClient;
pub use token::{CachedTokenProvider, StaticTokenProvider, TokenProvider};

#[derive(Debug, Clone, Serialize)]
pub struct RemoteDuplicate {
    pub url: String,
    pub is_duplicate: bool,
    pub existing_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePublisher {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "publisherName")]
    pub publisher_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceAction {
    Create,
    Update,
    SkipSame,
    SkipHigher,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCheckSite {
    pub site_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceCheckResult {
    pub site_url: String,
    pub action: PriceAction,
    #[serde(default)]
    pub current_price: Option<f64>,
}

/// One site as the remote bulk-import and approval endpoints expect it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSite {
    pub site_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub site_url: String,
    pub success: bool,
    #[serde(default)]
    pub main_project_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportResult {
    pub pushed_count: i64,
    pub failed_count: i64,
    #[serde(default)]
    pub results: Vec<ImportOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedSite {
    pub site_url: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSite {
    pub site_url: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalDetails {
    #[serde(default)]
    pub submitted: Vec<SubmittedSite>,
    #[serde(default)]
    pub skipped: Vec<SkippedSite>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalResult {
    pub submitted: i64,
    pub skipped: i64,
    #[serde(default)]
    pub errors: i64,
    #[serde(default)]
    pub details: ApprovalDetails,
}

/// Everything the pipeline needs from the remote registry. A trait so the
/// orchestrators can run against a fake in tests.
#[async_trait::async_trait]
pub trait RegistryApi: Send + Sync {
    /// Batched duplicate check. Input URLs are normalized; results come back
    /// keyed by the same normalized URLs.
    async fn check_duplicates(&self, urls: &[String]) -> Result<Vec<RemoteDuplicate>>;

    /// Full publisher directory; there is no usable remote search for bulk
    /// work, matching happens in memory here.
    async fn fetch_publishers(&self) -> Result<Vec<RemotePublisher>>;

    /// Remote-side price comparison across the active catalog and the
    /// pending-approval queue.
    async fn check_prices_all_modules(
        &self,
        sites: &[PriceCheckSite],
    ) -> Result<Vec<PriceCheckResult>>;

    async fn bulk_import(
        &self,
        sites: &[ImportSite],
        auto_create_publisher: bool,
    ) -> Result<BulkImportResult>;

    async fn submit_for_approval(&self, sites: &[ImportSite]) -> Result<ApprovalResult>;
}
