use regex::Regex;

/// Canonical comparison key for a site. Strips scheme, leading www, path,
/// query, fragment and port, then lower-cases. This is the only equality key
/// used anywhere duplicates or identities are compared.
///
/// Never fails: input that doesn't look like a URL at all comes back
/// trimmed and lower-cased, so duplicate detection degrades instead of
/// rejecting the row.
pub fn normalize_domain(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();

    let mut rest = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    rest = rest.strip_prefix("www.").unwrap_or(rest);

    let end = rest
        .find(|c| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    let mut host = &rest[..end];

    if let Some(idx) = host.rfind(':') {
        let port = &host[idx + 1..];
        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            host = &host[..idx];
        }
    }

    let host = host.trim();
    if host.is_empty() {
        lowered
    } else {
        host.to_string()
    }
}

pub struct DomainValidator {
    domain_regex: Regex,
}

impl DomainValidator {
    pub fn new() -> Self {
        // Labels of letters/digits/hyphens, at least one dot. Hyphens can't
        // lead or trail a label.
        Self {
            domain_regex: Regex::new(
                r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$",
            )
            .unwrap(),
        }
    }

    /// Checks the already-normalized key, not the raw input.
    pub fn is_valid_domain(&self, normalized: &str) -> bool {
        self.domain_regex.is_match(normalized)
    }
}

impl Default for DomainValidator {
    fn default() -> Self {
        Self::new()
    }
}
