use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::models::{CandidateRow, DuplicateSource};

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateHit {
    pub url: String,
    pub is_duplicate: bool,
    pub existing_id: Option<String>,
    pub source: Option<DuplicateSource>,
}

#[derive(Debug)]
pub struct BulkCheckResult {
    pub duplicates: Vec<DuplicateHit>,
    pub duplicate_count: usize,
    pub unique_count: usize,
}

impl BulkCheckResult {
    pub fn hit_for(&self, url: &str) -> Option<&DuplicateHit> {
        self.duplicates.iter().find(|h| h.url == url)
    }
}

/// One source of truth a URL can already live in. Probes run over data
/// fetched once per batch, so lookups are pure set membership.
pub trait DuplicateSourceProbe: Send + Sync {
    fn source(&self) -> DuplicateSource;

    /// `Some(existing_id)` when the source owns this URL; the id itself is
    /// optional because only the remote registry hands one back.
    fn lookup(&self, normalized_url: &str) -> Option<Option<String>>;
}

/// The remote registry's answer for a batch, keyed by re-normalized URL.
pub struct RemoteRegistryProbe {
    hits: HashMap<String, Option<String>>,
}

impl RemoteRegistryProbe {
    pub fn new(hits: HashMap<String, Option<String>>) -> Self {
        Self { hits }
    }
}

impl DuplicateSourceProbe for RemoteRegistryProbe {
    fn source(&self) -> DuplicateSource {
        DuplicateSource::MainProject
    }

    fn lookup(&self, normalized_url: &str) -> Option<Option<String>> {
        self.hits.get(normalized_url).cloned()
    }
}

/// Membership snapshot of one local table.
pub struct LocalTableProbe {
    source: DuplicateSource,
    urls: HashSet<String>,
}

impl LocalTableProbe {
    pub fn new(source: DuplicateSource, urls: HashSet<String>) -> Self {
        Self { source, urls }
    }
}

impl DuplicateSourceProbe for LocalTableProbe {
    fn source(&self) -> DuplicateSource {
        self.source
    }

    fn lookup(&self, normalized_url: &str) -> Option<Option<String>> {
        if self.urls.contains(normalized_url) {
            Some(None)
        } else {
            None
        }
    }
}

/// Tries each source in a fixed order and stops at the first match, so a URL
/// is a duplicate of exactly one source. The remote registry probe must come
/// first: it is the authoritative truth and stale local state must never
/// contradict it.
pub struct DuplicateResolver {
    probes: Vec<Box<dyn DuplicateSourceProbe>>,
}

impl DuplicateResolver {
    pub fn new(probes: Vec<Box<dyn DuplicateSourceProbe>>) -> Self {
        Self { probes }
    }

    pub fn check_bulk(&self, urls: &[String]) -> BulkCheckResult {
        let mut duplicates = Vec::with_capacity(urls.len());
        let mut duplicate_count = 0usize;

        for url in urls {
            let mut hit = DuplicateHit {
                url: url.clone(),
                is_duplicate: false,
                existing_id: None,
                source: None,
            };

            for probe in &self.probes {
                if let Some(existing_id) = probe.lookup(url) {
                    hit.is_duplicate = true;
                    hit.existing_id = existing_id;
                    hit.source = Some(probe.source());
                    break;
                }
            }

            if hit.is_duplicate {
                duplicate_count += 1;
                debug!(
                    "duplicate: {} in {}",
                    url,
                    hit.source.map(|s| s.as_str()).unwrap_or("?")
                );
            }
            duplicates.push(hit);
        }

        BulkCheckResult {
            unique_count: urls.len() - duplicate_count,
            duplicate_count,
            duplicates,
        }
    }
}

/// First pass over the file itself, before any cross-source check: rows are
/// scanned in file order and a URL seen earlier in the same file wins.
/// Later occurrences are reported separately as CSV-internal duplicates.
pub fn dedupe_within_csv(rows: Vec<CandidateRow>) -> (Vec<CandidateRow>, Vec<CandidateRow>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut csv_duplicates = Vec::new();

    for row in rows {
        if seen.insert(row.normalized_url.clone()) {
            unique.push(row);
        } else {
            csv_duplicates.push(row);
        }
    }

    (unique, csv_duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str) -> CandidateRow {
        CandidateRow {
            normalized_url: url.to_string(),
            ..Default::default()
        }
    }

    fn resolver(
        remote: &[(&str, Option<&str>)],
        in_process: &[&str],
        final_urls: &[&str],
    ) -> DuplicateResolver {
        let remote_hits: HashMap<String, Option<String>> = remote
            .iter()
            .map(|(u, id)| (u.to_string(), id.map(|s| s.to_string())))
            .collect();
        DuplicateResolver::new(vec![
            Box::new(RemoteRegistryProbe::new(remote_hits)),
            Box::new(LocalTableProbe::new(
                DuplicateSource::DataInProcess,
                in_process.iter().map(|s| s.to_string()).collect(),
            )),
            Box::new(LocalTableProbe::new(
                DuplicateSource::DataFinal,
                final_urls.iter().map(|s| s.to_string()).collect(),
            )),
        ])
    }

    #[test]
    fn intra_csv_first_occurrence_wins() {
        let rows = vec![row("a.com"), row("a.com"), row("b.com")];
        let (unique, dups) = dedupe_within_csv(rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].normalized_url, "a.com");
        assert_eq!(unique[1].normalized_url, "b.com");
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].normalized_url, "a.com");
    }

    #[test]
    fn remote_registry_outranks_local_tables() {
        // Same URL in both the remote registry and the local in-process
        // table: the remote source must win.
        let r = resolver(&[("x.com", Some("101"))], &["x.com"], &[]);
        let result = r.check_bulk(&["x.com".to_string()]);
        let hit = result.hit_for("x.com").unwrap();
        assert!(hit.is_duplicate);
        assert_eq!(hit.source, Some(DuplicateSource::MainProject));
        assert_eq!(hit.existing_id.as_deref(), Some("101"));
    }

    #[test]
    fn in_process_outranks_final() {
        let r = resolver(&[], &["y.com"], &["y.com"]);
        let result = r.check_bulk(&["y.com".to_string()]);
        assert_eq!(
            result.hit_for("y.com").unwrap().source,
            Some(DuplicateSource::DataInProcess)
        );
    }

    #[test]
    fn counts_split_unique_and_duplicate() {
        let r = resolver(&[("a.com", None)], &["b.com"], &[]);
        let urls: Vec<String> = ["a.com", "b.com", "c.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let result = r.check_bulk(&urls);
        assert_eq!(result.duplicate_count, 2);
        assert_eq!(result.unique_count, 1);
        assert!(!result.hit_for("c.com").unwrap().is_duplicate);
    }
}
