use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{self, DbPool, SiteTable, UploadTask};
use crate::ingest::csv_parser::{CsvIngestor, InvalidRow};
use crate::ingest::dedup::{
    dedupe_within_csv, DuplicateResolver, LocalTableProbe, RemoteRegistryProbe,
};
use crate::ingest::field_compare::{self, FieldUpdates};
use crate::models::{CandidateRow, DuplicateSource, Result, Role, SiteFields, TaskStatus};
use crate::publisher::{PublisherResolver, SubstringMatcher};
use crate::registry::{PriceAction, PriceCheckSite, RegistryApi};

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub assigned_to: Option<String>,
    pub uploaded_by: String,
    pub role: Role,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub unique_rows: usize,
    pub duplicate_rows: usize,
    pub duplicates_in_csv: usize,
    pub duplicates_in_main_project: usize,
    pub duplicates_in_current_system: usize,
    pub price_skipped: usize,
    pub price_updates: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateDetail {
    pub url: String,
    pub source: String,
    pub existing_id: Option<String>,
    pub resolution: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSkippedDomain {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub summary: UploadSummary,
    pub new_domains: Vec<String>,
    pub duplicate_domains: Vec<String>,
    pub duplicate_details: Vec<DuplicateDetail>,
    pub price_skipped_domains: Vec<PriceSkippedDomain>,
    pub price_updated_domains: Vec<String>,
    pub invalid_rows: Vec<InvalidRow>,
    pub upload_task_id: Option<String>,
}

/// Terminal outcome for one CSV row, decided before any write happens.
enum RowOutcome {
    /// Insert a fresh in-process record. `price_update` marks the remote
    /// re-push path, where the row exists remotely but our price wins.
    New {
        row: CandidateRow,
        price_update: bool,
    },
    UpdateLocal {
        row: CandidateRow,
        table: SiteTable,
        record_id: i64,
        updates: FieldUpdates,
    },
    Skip,
}

/// The upload entrypoint: stitches the CSV ingestor, duplicate resolver,
/// field comparison and publisher resolution into per-row outcomes, then
/// commits row by row. Each row's write is independent: a failure mid-loop
/// leaves earlier rows persisted, and the task counts make that partial
/// progress visible to pollers.
pub struct UploadProcessor {
    db_pool: DbPool,
    registry: Arc<dyn RegistryApi>,
}

impl UploadProcessor {
    pub fn new(db_pool: DbPool, registry: Arc<dyn RegistryApi>) -> Self {
        Self { db_pool, registry }
    }

    pub async fn process(&self, csv_bytes: &[u8], options: &UploadOptions) -> Result<UploadReport> {
        let parsed = CsvIngestor::new().parse(csv_bytes)?;
        let total_rows = parsed.total_rows;
        let valid_count = parsed.valid_count;
        let invalid_count = parsed.invalid_count;
        let invalid_rows = parsed.invalid_rows;

        // Pass 1: the file against itself, first occurrence wins.
        let (unique_rows, csv_duplicates) = dedupe_within_csv(parsed.valid_rows);
        let urls: Vec<String> = unique_rows
            .iter()
            .map(|r| r.normalized_url.clone())
            .collect();

        // Pass 2: the batch against all three sources of truth. A failure
        // here fails the whole upload, since proceeding with unknown duplicate
        // state risks double-creating remote records.
        let remote = self.registry.check_duplicates(&urls).await?;
        let remote_hits: HashMap<String, Option<String>> = remote
            .into_iter()
            .filter(|d| d.is_duplicate)
            .map(|d| (d.url, d.existing_id))
            .collect();

        let in_process_urls = database::fetch_in_process_urls(&self.db_pool).await?;
        let final_urls = database::fetch_final_urls(&self.db_pool).await?;

        let resolver = DuplicateResolver::new(vec![
            Box::new(RemoteRegistryProbe::new(remote_hits)),
            Box::new(LocalTableProbe::new(
                DuplicateSource::DataInProcess,
                in_process_urls,
            )),
            Box::new(LocalTableProbe::new(DuplicateSource::DataFinal, final_urls)),
        ]);
        let bulk = resolver.check_bulk(&urls);

        // Remote-side price comparison for the rows the registry already
        // owns. Errors degrade to "no answer", which resolves to skip.
        let remote_dup_sites: Vec<PriceCheckSite> = unique_rows
            .iter()
            .filter(|row| {
                bulk.hit_for(&row.normalized_url)
                    .map(|h| h.source == Some(DuplicateSource::MainProject))
                    .unwrap_or(false)
            })
            .map(|row| PriceCheckSite {
                site_url: row.normalized_url.clone(),
                price: row.raw_price,
            })
            .collect();
        let price_answers: HashMap<String, (PriceAction, Option<f64>)> = if remote_dup_sites
            .is_empty()
        {
            HashMap::new()
        } else {
            match self.registry.check_prices_all_modules(&remote_dup_sites).await {
                Ok(results) => results
                    .into_iter()
                    .map(|r| (r.site_url.clone(), (r.action, r.current_price)))
                    .collect(),
                Err(e) => {
                    warn!("price comparison unavailable, remote duplicates will be skipped: {}", e);
                    HashMap::new()
                }
            }
        };

        // Identity resolution inputs, fetched once for the batch. Directory
        // failure degrades every row to contact identity, never blocks.
        let directory = match self.registry.fetch_publishers().await {
            Ok(publishers) => publishers,
            Err(e) => {
                warn!("publisher directory unavailable, storing raw contacts: {}", e);
                Vec::new()
            }
        };
        let pending_identities = database::fetch_pending_identities(&self.db_pool).await?;
        let publisher_resolver = PublisherResolver::new(directory, Box::new(SubstringMatcher));

        // Decide every row before writing anything, so the task row can be
        // created first with its final counts.
        let mut outcomes = Vec::with_capacity(unique_rows.len());
        let mut report = UploadReport {
            summary: UploadSummary {
                total_rows,
                valid_rows: valid_count,
                invalid_rows: invalid_count,
                unique_rows: bulk.unique_count,
                duplicates_in_csv: csv_duplicates.len(),
                ..Default::default()
            },
            new_domains: Vec::new(),
            duplicate_domains: Vec::new(),
            duplicate_details: Vec::new(),
            price_skipped_domains: Vec::new(),
            price_updated_domains: Vec::new(),
            invalid_rows,
            upload_task_id: None,
        };

        for row in csv_duplicates {
            report.duplicate_details.push(DuplicateDetail {
                url: row.normalized_url.clone(),
                source: "csv".to_string(),
                existing_id: None,
                resolution: "dropped, earlier row in same file wins".to_string(),
            });
        }

        for row in unique_rows {
            let url = row.normalized_url.clone();
            let hit = bulk.hit_for(&url);

            let outcome = match hit.and_then(|h| h.source) {
                None => RowOutcome::New {
                    row,
                    price_update: false,
                },
                Some(DuplicateSource::MainProject) => {
                    report.summary.duplicates_in_main_project += 1;
                    report.duplicate_domains.push(url.clone());
                    let existing_id = hit.and_then(|h| h.existing_id.clone());
                    self.resolve_remote_duplicate(row, existing_id, &price_answers, &mut report)
                }
                Some(source) => {
                    report.summary.duplicates_in_current_system += 1;
                    report.duplicate_domains.push(url.clone());
                    self.resolve_local_duplicate(row, source, &mut report).await?
                }
            };
            outcomes.push(outcome);
        }

        report.summary.duplicate_rows = report.summary.duplicates_in_csv
            + report.summary.duplicates_in_main_project
            + report.summary.duplicates_in_current_system;

        let actionable = outcomes
            .iter()
            .filter(|o| !matches!(o, RowOutcome::Skip))
            .count();

        // No task for an all-duplicates upload; the report alone goes back.
        let task_id = if actionable > 0 {
            let task = UploadTask {
                id: Uuid::new_v4().to_string(),
                assigned_to: options.assigned_to.clone(),
                status: TaskStatus::Pending,
                total_records: total_rows as i64,
                valid_records: valid_count as i64,
                invalid_records: invalid_count as i64,
                processed_records: actionable as i64,
                duplicate_records: report.summary.duplicate_rows as i64,
                pushed_records: 0,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            database::create_upload_task(&self.db_pool, &task).await?;
            Some(task.id)
        } else {
            None
        };

        // Commit pass, still in file order. Each row is its own write.
        for outcome in outcomes {
            match outcome {
                RowOutcome::New { row, price_update } => {
                    let identity =
                        publisher_resolver.resolve(row.contact.as_deref(), &pending_identities);
                    let fields = site_fields_from_row(&row);
                    database::insert_in_process(
                        &self.db_pool,
                        &row.normalized_url,
                        &fields,
                        &identity,
                        task_id.as_deref(),
                        Some(&options.uploaded_by),
                    )
                    .await?;
                    report.new_domains.push(row.normalized_url.clone());
                    if price_update {
                        report.price_updated_domains.push(row.normalized_url);
                    }
                }
                RowOutcome::UpdateLocal {
                    row,
                    table,
                    record_id,
                    updates,
                } => {
                    let price_improved = updates.touches_price();
                    let stamp = match options.role {
                        Role::SuperAdmin => Some(options.uploaded_by.as_str()),
                        Role::Contributor if price_improved => Some(options.uploaded_by.as_str()),
                        Role::Contributor => None,
                    };
                    database::apply_field_updates(&self.db_pool, table, record_id, &updates, stamp)
                        .await?;
                    if price_improved {
                        report.price_updated_domains.push(row.normalized_url);
                    }
                }
                RowOutcome::Skip => {}
            }
        }

        report.summary.price_updates = report.price_updated_domains.len();
        report.summary.price_skipped = report.price_skipped_domains.len();
        report.upload_task_id = task_id;

        info!(
            "📥 upload processed: {} new, {} updated, {} skipped, task {:?}",
            report.new_domains.len(),
            report.price_updated_domains.len(),
            report.summary.duplicate_rows,
            report.upload_task_id
        );
        Ok(report)
    }

    /// The registry already owns this URL; its price comparison decides.
    /// UPDATE re-enters the pipeline as a new local row (the re-push path);
    /// everything else, including no answer at all, is a skip, because the
    /// registry's price always outranks local reconciliation.
    fn resolve_remote_duplicate(
        &self,
        row: CandidateRow,
        existing_id: Option<String>,
        price_answers: &HashMap<String, (PriceAction, Option<f64>)>,
        report: &mut UploadReport,
    ) -> RowOutcome {
        let url = row.normalized_url.clone();
        match price_answers.get(&url).copied() {
            Some((PriceAction::Update, _)) => {
                report.duplicate_details.push(DuplicateDetail {
                    url,
                    source: DuplicateSource::MainProject.as_str().to_string(),
                    existing_id,
                    resolution: "price improvement, queued for re-push".to_string(),
                });
                RowOutcome::New {
                    row,
                    price_update: true,
                }
            }
            Some((PriceAction::SkipSame, _)) | Some((PriceAction::SkipHigher, _)) => {
                report.price_skipped_domains.push(PriceSkippedDomain {
                    url: url.clone(),
                    reason: "higher/same price in main project".to_string(),
                });
                report.duplicate_details.push(DuplicateDetail {
                    url,
                    source: DuplicateSource::MainProject.as_str().to_string(),
                    existing_id,
                    resolution: "skipped, higher/same price in main project".to_string(),
                });
                RowOutcome::Skip
            }
            // CREATE contradicts the duplicate check, and no answer means
            // the comparison failed; both sides default to skip.
            Some((PriceAction::Create, _)) | None => {
                report.duplicate_details.push(DuplicateDetail {
                    url,
                    source: DuplicateSource::MainProject.as_str().to_string(),
                    existing_id,
                    resolution: "skipped, already in main project".to_string(),
                });
                RowOutcome::Skip
            }
        }
    }

    /// The URL exists in one of our own tables; field comparison decides
    /// between patch-in-place and skip.
    async fn resolve_local_duplicate(
        &self,
        row: CandidateRow,
        source: DuplicateSource,
        report: &mut UploadReport,
    ) -> Result<RowOutcome> {
        let url = row.normalized_url.clone();
        let (table, record_id, existing_fields) = match source {
            DuplicateSource::DataInProcess => {
                match database::get_in_process_by_url(&self.db_pool, &url).await? {
                    Some(record) => (SiteTable::InProcess, record.id, record.fields),
                    None => {
                        // Deleted since the membership snapshot; treat as new.
                        return Ok(RowOutcome::New {
                            row,
                            price_update: false,
                        });
                    }
                }
            }
            DuplicateSource::DataFinal => {
                match database::get_final_by_url(&self.db_pool, &url).await? {
                    Some(record) => (SiteTable::Final, record.id, record.fields),
                    None => {
                        return Ok(RowOutcome::New {
                            row,
                            price_update: false,
                        });
                    }
                }
            }
            DuplicateSource::MainProject => unreachable!("remote duplicates handled separately"),
        };

        match field_compare::compare_and_get_updates(&row, &existing_fields) {
            Some(updates) => {
                report.duplicate_details.push(DuplicateDetail {
                    url: url.clone(),
                    source: source.as_str().to_string(),
                    existing_id: None,
                    resolution: format!("updated fields: {}", updates.columns().join(", ")),
                });
                Ok(RowOutcome::UpdateLocal {
                    row,
                    table,
                    record_id,
                    updates,
                })
            }
            None => {
                // A candidate price that lost to the stored one is reported
                // as a price skip, not a plain duplicate.
                let lost_on_price = match (row.raw_price, existing_fields.gb_base_price) {
                    (Some(candidate), Some(existing)) => candidate >= existing,
                    _ => false,
                };
                if lost_on_price {
                    report.price_skipped_domains.push(PriceSkippedDomain {
                        url: url.clone(),
                        reason: "higher price (in current system)".to_string(),
                    });
                }
                report.duplicate_details.push(DuplicateDetail {
                    url,
                    source: source.as_str().to_string(),
                    existing_id: None,
                    resolution: if lost_on_price {
                        "skipped, higher price (in current system)".to_string()
                    } else {
                        "skipped, no field changes".to_string()
                    },
                });
                Ok(RowOutcome::Skip)
            }
        }
    }
}

fn site_fields_from_row(row: &CandidateRow) -> SiteFields {
    SiteFields {
        category: row.category.clone(),
        country: row.country.clone(),
        language: row.language.clone(),
        da: row.da.clone(),
        dr: row.dr.clone(),
        traffic: row.traffic.clone(),
        spam_score: row.spam_score.clone(),
        keyword_count: row.keyword_count.clone(),
        tat: row.tat.clone(),
        gb_base_price: row.raw_price,
        publisher_name: None,
        publisher_email: None,
        contact_name: None,
        contact_email: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::test_pool;
    use crate::models::{PipelineError, PublisherIdentity};
    use crate::registry::fake::FakeRegistry;

    fn options(role: Role) -> UploadOptions {
        UploadOptions {
            assigned_to: Some("reviewer-1".to_string()),
            uploaded_by: "admin".to_string(),
            role,
        }
    }

    async fn processor(registry: FakeRegistry) -> (UploadProcessor, DbPool) {
        let pool = test_pool().await;
        let processor = UploadProcessor::new(pool.clone(), Arc::new(registry));
        (processor, pool)
    }

    #[tokio::test]
    async fn brand_new_site_creates_record_and_task() {
        let (processor, pool) = processor(FakeRegistry::new()).await;

        let report = processor
            .process(b"url,price\nnewsite.com,50\n", &options(Role::SuperAdmin))
            .await
            .unwrap();

        assert_eq!(report.new_domains, vec!["newsite.com"]);
        assert_eq!(report.summary.unique_rows, 1);
        assert_eq!(report.summary.duplicate_rows, 0);

        let task_id = report.upload_task_id.expect("task should be created");
        let task = database::get_upload_task(&pool, &task_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.processed_records, 1);
        assert_eq!(task.status, TaskStatus::Pending);

        let record = database::get_in_process_by_url(&pool, "newsite.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.gb_base_price, Some(50.0));
        assert_eq!(record.upload_task_id.as_deref(), Some(task_id.as_str()));
        assert_eq!(record.uploaded_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn lower_candidate_price_patches_local_record() {
        let (processor, pool) = processor(FakeRegistry::new()).await;
        database::insert_in_process(
            &pool,
            "existing.com",
            &SiteFields {
                gb_base_price: Some(60.0),
                ..Default::default()
            },
            &PublisherIdentity::Unknown,
            None,
            None,
        )
        .await
        .unwrap();

        let report = processor
            .process(b"url,price\nexisting.com,40\n", &options(Role::SuperAdmin))
            .await
            .unwrap();

        assert_eq!(report.price_updated_domains, vec!["existing.com"]);
        assert_eq!(report.summary.price_updates, 1);
        assert!(report.new_domains.is_empty());

        let record = database::get_in_process_by_url(&pool, "existing.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.gb_base_price, Some(40.0));
    }

    #[tokio::test]
    async fn higher_candidate_price_is_skipped_with_reason() {
        let (processor, pool) = processor(FakeRegistry::new()).await;
        database::insert_in_process(
            &pool,
            "existing.com",
            &SiteFields {
                gb_base_price: Some(30.0),
                ..Default::default()
            },
            &PublisherIdentity::Unknown,
            None,
            None,
        )
        .await
        .unwrap();

        let report = processor
            .process(b"url,price\nexisting.com,40\n", &options(Role::SuperAdmin))
            .await
            .unwrap();

        assert_eq!(report.price_skipped_domains.len(), 1);
        assert_eq!(report.price_skipped_domains[0].url, "existing.com");
        assert_eq!(
            report.price_skipped_domains[0].reason,
            "higher price (in current system)"
        );
        // Nothing actionable: no task.
        assert!(report.upload_task_id.is_none());

        let record = database::get_in_process_by_url(&pool, "existing.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.gb_base_price, Some(30.0));
    }

    #[tokio::test]
    async fn csv_internal_duplicates_drop_later_rows() {
        let (processor, pool) = processor(FakeRegistry::new()).await;

        let report = processor
            .process(
                b"url,price\na.com,50\nA.com,60\nb.com,10\n",
                &options(Role::SuperAdmin),
            )
            .await
            .unwrap();

        assert_eq!(report.summary.duplicates_in_csv, 1);
        assert_eq!(report.new_domains, vec!["a.com", "b.com"]);
        let detail = report
            .duplicate_details
            .iter()
            .find(|d| d.source == "csv")
            .unwrap();
        assert_eq!(detail.url, "a.com");

        // First occurrence's price wins.
        let record = database::get_in_process_by_url(&pool, "a.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.gb_base_price, Some(50.0));
    }

    #[tokio::test]
    async fn remote_duplicate_with_better_price_re_enters_as_new() {
        let registry = FakeRegistry::new()
            .with_existing("cheap.com", Some("777"))
            .with_price_action("cheap.com", PriceAction::Update, Some(90.0));
        let (processor, _pool) = processor(registry).await;

        let report = processor
            .process(b"url,price\ncheap.com,40\n", &options(Role::SuperAdmin))
            .await
            .unwrap();

        assert_eq!(report.summary.duplicates_in_main_project, 1);
        assert_eq!(report.new_domains, vec!["cheap.com"]);
        assert_eq!(report.price_updated_domains, vec!["cheap.com"]);
        assert!(report.upload_task_id.is_some());
    }

    #[tokio::test]
    async fn remote_duplicate_with_worse_price_is_price_skipped() {
        let registry = FakeRegistry::new()
            .with_existing("pricey.com", Some("778"))
            .with_price_action("pricey.com", PriceAction::SkipHigher, Some(20.0));
        let (processor, _pool) = processor(registry).await;

        let report = processor
            .process(b"url,price\npricey.com,40\n", &options(Role::SuperAdmin))
            .await
            .unwrap();

        assert_eq!(report.price_skipped_domains.len(), 1);
        assert_eq!(
            report.price_skipped_domains[0].reason,
            "higher/same price in main project"
        );
        assert!(report.upload_task_id.is_none());
    }

    #[tokio::test]
    async fn registry_outage_fails_the_whole_upload() {
        let registry = FakeRegistry {
            fail_duplicate_check: true,
            ..FakeRegistry::new()
        };
        let (processor, pool) = processor(registry).await;

        let err = processor
            .process(b"url\nany.com\n", &options(Role::SuperAdmin))
            .await
            .unwrap_err();
        let pipeline = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(
            pipeline,
            PipelineError::RegistryUnavailable { .. }
        ));

        // Nothing was written.
        assert!(database::get_in_process_by_url(&pool, "any.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn publisher_directory_outage_degrades_to_contact() {
        let registry = FakeRegistry {
            fail_publisher_fetch: true,
            ..FakeRegistry::new()
        };
        let (processor, pool) = processor(registry).await;

        processor
            .process(
                b"url,contact\nsite.com,jane@pub.io\n",
                &options(Role::SuperAdmin),
            )
            .await
            .unwrap();

        let record = database::get_in_process_by_url(&pool, "site.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            record.identity(),
            PublisherIdentity::Contact {
                name: None,
                email: Some("jane@pub.io".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn matched_contact_resolves_against_directory() {
        let registry =
            FakeRegistry::new().with_publisher("55", Some("jane@pub.io"), Some("Jane Pub"));
        let (processor, pool) = processor(registry).await;

        processor
            .process(
                b"url,contact\nsite.com,jane@pub.io\n",
                &options(Role::SuperAdmin),
            )
            .await
            .unwrap();

        let record = database::get_in_process_by_url(&pool, "site.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            record.identity(),
            PublisherIdentity::Matched {
                id: "55".to_string(),
                name: Some("Jane Pub".to_string()),
                email: Some("jane@pub.io".to_string()),
            }
        );
        // Matched identity keeps the contact columns empty.
        assert!(record.fields.contact_email.is_none());
    }

    #[tokio::test]
    async fn contributor_update_without_price_gain_is_not_attributed() {
        let (processor, pool) = processor(FakeRegistry::new()).await;
        database::insert_in_process(
            &pool,
            "site.com",
            &SiteFields {
                da: Some("10".to_string()),
                gb_base_price: Some(30.0),
                ..Default::default()
            },
            &PublisherIdentity::Unknown,
            None,
            None,
        )
        .await
        .unwrap();

        // DA changes but price does not improve.
        processor
            .process(
                b"url,price,da\nsite.com,50,99\n",
                &UploadOptions {
                    assigned_to: None,
                    uploaded_by: "contrib-7".to_string(),
                    role: Role::Contributor,
                },
            )
            .await
            .unwrap();

        let record = database::get_in_process_by_url(&pool, "site.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.da.as_deref(), Some("99"));
        assert_eq!(record.uploaded_by, None);

        // With a genuine price improvement the stamp lands.
        processor
            .process(
                b"url,price\nsite.com,20\n",
                &UploadOptions {
                    assigned_to: None,
                    uploaded_by: "contrib-7".to_string(),
                    role: Role::Contributor,
                },
            )
            .await
            .unwrap();
        let record = database::get_in_process_by_url(&pool, "site.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.uploaded_by.as_deref(), Some("contrib-7"));
    }
}
