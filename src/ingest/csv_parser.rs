use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::ingest::normalize::{normalize_domain, DomainValidator};
use crate::models::{CandidateRow, PipelineError, Result};

#[derive(Debug, Serialize)]
pub struct InvalidRow {
    pub row_number: usize,
    pub raw: Vec<String>,
    pub reasons: Vec<String>,
}

#[derive(Debug)]
pub struct ParsedCsv {
    pub valid_rows: Vec<CandidateRow>,
    pub invalid_rows: Vec<InvalidRow>,
    pub total_rows: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
}

const URL_HEADERS: &[&str] = &["site", "domain", "website_url", "websiteurl", "url", "website"];
const PRICE_HEADERS: &[&str] = &["gb_base_price", "price", "base_price", "gbbaseprice"];
const CONTACT_HEADERS: &[&str] = &["contact", "contact_name", "contact_email", "publisher", "email"];

// Enrichment columns are optional; review fills anything the file lacks.
const SCALAR_HEADERS: &[(&str, &[&str])] = &[
    ("category", &["category", "niche"]),
    ("country", &["country"]),
    ("language", &["language"]),
    ("da", &["da", "domain_authority"]),
    ("dr", &["dr", "domain_rating"]),
    ("traffic", &["traffic", "monthly_traffic"]),
    ("spam_score", &["spam_score", "ss"]),
    ("keyword_count", &["keyword_count", "keywords"]),
    ("tat", &["tat", "turnaround_time"]),
];

pub struct CsvIngestor {
    validator: DomainValidator,
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self {
            validator: DomainValidator::new(),
        }
    }

    /// Streams the uploaded bytes row by row. Rows never abort the parse:
    /// a bad row lands in `invalid_rows` with every reason that applied,
    /// and everything else keeps its file order.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedCsv> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::InvalidCsv(format!("unreadable header row: {}", e)))?
            .clone();

        let columns = self.map_columns(&headers);
        let url_idx = columns.get("__url").copied().ok_or_else(|| {
            PipelineError::InvalidCsv(format!(
                "no website column found (expected one of: {})",
                URL_HEADERS.join(", ")
            ))
        })?;

        let mut valid_rows = Vec::new();
        let mut invalid_rows = Vec::new();
        let mut total_rows = 0usize;

        for (i, record) in reader.records().enumerate() {
            let row_number = i + 1;
            total_rows += 1;

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    invalid_rows.push(InvalidRow {
                        row_number,
                        raw: Vec::new(),
                        reasons: vec![format!("unparseable row: {}", e)],
                    });
                    continue;
                }
            };

            let raw: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            let mut reasons = Vec::new();

            let raw_url = record.get(url_idx).unwrap_or("").trim();
            let normalized = normalize_domain(raw_url);
            if raw_url.is_empty() {
                reasons.push("missing website url".to_string());
            } else if !self.validator.is_valid_domain(&normalized) {
                reasons.push(format!("invalid domain format: {}", raw_url));
            }

            if !reasons.is_empty() {
                invalid_rows.push(InvalidRow {
                    row_number,
                    raw,
                    reasons,
                });
                continue;
            }

            let mut row = CandidateRow {
                row_number,
                normalized_url: normalized,
                raw_price: columns
                    .get("__price")
                    .and_then(|idx| record.get(*idx))
                    .and_then(sanitize_price),
                contact: columns
                    .get("__contact")
                    .and_then(|idx| record.get(*idx))
                    .and_then(non_empty),
                ..Default::default()
            };

            for (field, _) in SCALAR_HEADERS {
                let value = columns
                    .get(*field)
                    .and_then(|idx| record.get(*idx))
                    .and_then(non_empty);
                match *field {
                    "category" => row.category = value,
                    "country" => row.country = value,
                    "language" => row.language = value,
                    "da" => row.da = value,
                    "dr" => row.dr = value,
                    "traffic" => row.traffic = value,
                    "spam_score" => row.spam_score = value,
                    "keyword_count" => row.keyword_count = value,
                    "tat" => row.tat = value,
                    _ => unreachable!(),
                }
            }

            debug!("row {}: {} parsed ok", row_number, row.normalized_url);
            valid_rows.push(row);
        }

        let parsed = ParsedCsv {
            valid_count: valid_rows.len(),
            invalid_count: invalid_rows.len(),
            total_rows,
            valid_rows,
            invalid_rows,
        };
        info!(
            "📄 CSV parsed: {} rows, {} valid, {} invalid",
            parsed.total_rows, parsed.valid_count, parsed.invalid_count
        );
        Ok(parsed)
    }

    /// Maps logical field names to column indexes. Header matching is
    /// case/whitespace-insensitive; first matching alias wins.
    fn map_columns(&self, headers: &csv::StringRecord) -> HashMap<&'static str, usize> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut columns = HashMap::new();

        let locate = |aliases: &[&str]| -> Option<usize> {
            normalized
                .iter()
                .position(|h| aliases.contains(&h.as_str()))
        };

        if let Some(idx) = locate(URL_HEADERS) {
            columns.insert("__url", idx);
        }
        if let Some(idx) = locate(PRICE_HEADERS) {
            columns.insert("__price", idx);
        }
        if let Some(idx) = locate(CONTACT_HEADERS) {
            columns.insert("__contact", idx);
        }
        for (field, aliases) in SCALAR_HEADERS {
            if let Some(idx) = locate(aliases) {
                columns.insert(*field, idx);
            }
        }
        columns
    }
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// "$1,250.50" -> 1250.5. Anything that doesn't survive as a non-negative
/// number is dropped silently; a bad price is never a row error.
fn sanitize_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Some(price),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str) -> ParsedCsv {
        CsvIngestor::new().parse(data.as_bytes()).unwrap()
    }

    #[test]
    fn accepts_url_header_aliases() {
        for header in ["site", "Domain", "Website URL", "websiteurl", "url", "WEBSITE"] {
            let csv = format!("{}\nexample.com\n", header);
            let parsed = parse(&csv);
            assert_eq!(parsed.valid_count, 1, "header {:?}", header);
            assert_eq!(parsed.valid_rows[0].normalized_url, "example.com");
        }
    }

    #[test]
    fn accepts_price_header_aliases_and_sanitizes() {
        let parsed = parse("website,GB Base Price\nexample.com,\"$1,250.50\"\n");
        assert_eq!(parsed.valid_rows[0].raw_price, Some(1250.50));
    }

    #[test]
    fn bad_price_is_omitted_not_an_error() {
        let parsed = parse("url,price\na.com,n/a\nb.com,free\nc.com,\n");
        assert_eq!(parsed.valid_count, 3);
        assert!(parsed.valid_rows.iter().all(|r| r.raw_price.is_none()));
    }

    #[test]
    fn price_sanitizer_keeps_digits_and_one_dot() {
        // '-' is stripped, so "-5" survives as 5; a negative price can never
        // come out of the sanitizer.
        assert_eq!(sanitize_price("-5"), Some(5.0));
        assert_eq!(sanitize_price("abc"), None);
        assert_eq!(sanitize_price("1.2.3"), None);
        assert_eq!(sanitize_price(""), None);
    }

    #[test]
    fn invalid_rows_carry_row_number_and_reasons() {
        let parsed = parse("url,price\n,10\nnodots,20\ngood.com,30\n");
        assert_eq!(parsed.total_rows, 3);
        assert_eq!(parsed.valid_count, 1);
        assert_eq!(parsed.invalid_count, 2);

        assert_eq!(parsed.invalid_rows[0].row_number, 1);
        assert_eq!(parsed.invalid_rows[0].reasons, vec!["missing website url"]);
        assert_eq!(parsed.invalid_rows[1].row_number, 2);
        assert!(parsed.invalid_rows[1].reasons[0].contains("invalid domain format"));
    }

    #[test]
    fn missing_url_column_is_a_structural_error() {
        let err = CsvIngestor::new()
            .parse(b"name,price\nfoo,10\n")
            .unwrap_err();
        assert!(err.to_string().contains("no website column"));
    }

    #[test]
    fn preserves_input_order() {
        let parsed = parse("url\nc.com\na.com\nb.com\n");
        let urls: Vec<&str> = parsed
            .valid_rows
            .iter()
            .map(|r| r.normalized_url.as_str())
            .collect();
        assert_eq!(urls, vec!["c.com", "a.com", "b.com"]);
    }

    #[test]
    fn picks_up_enrichment_and_contact_columns() {
        let parsed = parse(
            "url,price,contact,DA,Country\nhttps://www.example.com/,45,jane@pub.io,55,US\n",
        );
        let row = &parsed.valid_rows[0];
        assert_eq!(row.normalized_url, "example.com");
        assert_eq!(row.raw_price, Some(45.0));
        assert_eq!(row.contact.as_deref(), Some("jane@pub.io"));
        assert_eq!(row.da.as_deref(), Some("55"));
        assert_eq!(row.country.as_deref(), Some("US"));
    }
}
