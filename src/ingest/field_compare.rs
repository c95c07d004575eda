use rusqlite::types::{ToSql, ToSqlOutput};

use crate::models::{CandidateRow, SiteFields};

/// A value headed for one column of a site table.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Real(f64),
    Integer(i64),
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Text(s) => s.to_sql(),
            FieldValue::Real(f) => f.to_sql(),
            FieldValue::Integer(i) => i.to_sql(),
        }
    }
}

/// The minimal diff to apply to an existing record. Guaranteed non-empty:
/// a comparison with nothing to change yields `None`, never an empty set.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdates {
    entries: Vec<(&'static str, FieldValue)>,
}

impl FieldUpdates {
    pub fn entries(&self) -> &[(&'static str, FieldValue)] {
        &self.entries
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(col, _)| *col).collect()
    }

    pub fn touches_price(&self) -> bool {
        self.entries.iter().any(|(col, _)| *col == "gb_base_price")
    }
}

/// Field-by-field comparison of an uploaded row against an existing local
/// record. Returns exactly the changed columns so concurrent edits to other
/// fields are never clobbered.
pub fn compare_and_get_updates(
    candidate: &CandidateRow,
    existing: &SiteFields,
) -> Option<FieldUpdates> {
    let mut entries: Vec<(&'static str, FieldValue)> = Vec::new();

    if let Some(price) = candidate.raw_price {
        if price_improves(Some(price), existing.gb_base_price) {
            entries.push(("gb_base_price", FieldValue::Real(price)));
        }
    }

    let scalars: [(&'static str, &Option<String>, &Option<String>); 9] = [
        ("category", &candidate.category, &existing.category),
        ("country", &candidate.country, &existing.country),
        ("language", &candidate.language, &existing.language),
        ("da", &candidate.da, &existing.da),
        ("dr", &candidate.dr, &existing.dr),
        ("traffic", &candidate.traffic, &existing.traffic),
        ("spam_score", &candidate.spam_score, &existing.spam_score),
        (
            "keyword_count",
            &candidate.keyword_count,
            &existing.keyword_count,
        ),
        ("tat", &candidate.tat, &existing.tat),
    ];
    for (column, candidate_value, existing_value) in scalars {
        if let Some(changed) = scalar_change(candidate_value, existing_value) {
            entries.push((column, FieldValue::Text(changed)));
        }
    }

    // At upload time we don't yet know whether this contact will resolve to
    // a matched publisher, so both the contact and publisher columns get the
    // value.
    if let Some(contact) = candidate.contact.as_deref().map(str::trim) {
        if !contact.is_empty() {
            if contact.contains('@') {
                let email = contact.to_lowercase();
                if differs(Some(email.as_str()), existing.contact_email.as_deref()) {
                    entries.push(("contact_email", FieldValue::Text(email.clone())));
                    entries.push(("publisher_email", FieldValue::Text(email)));
                }
            } else if differs(Some(contact), existing.contact_name.as_deref()) {
                entries.push(("contact_name", FieldValue::Text(contact.to_string())));
                entries.push(("publisher_name", FieldValue::Text(contact.to_string())));
            }
        }
    }

    if entries.is_empty() {
        None
    } else {
        Some(FieldUpdates { entries })
    }
}

/// Price moves only downward: a candidate updates the stored price iff it is
/// strictly lower, or the record has no price yet.
pub fn should_update_based_on_price(candidate: &CandidateRow, existing: &SiteFields) -> bool {
    price_improves(candidate.raw_price, existing.gb_base_price)
}

/// True when anything other than the price would change.
pub fn has_field_updates(candidate: &CandidateRow, existing: &SiteFields) -> bool {
    match compare_and_get_updates(candidate, existing) {
        Some(updates) => updates.entries().iter().any(|(col, _)| *col != "gb_base_price"),
        None => false,
    }
}

fn price_improves(candidate: Option<f64>, existing: Option<f64>) -> bool {
    match (candidate, existing) {
        (Some(new), Some(old)) => new < old,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn scalar_change(candidate: &Option<String>, existing: &Option<String>) -> Option<String> {
    let candidate = candidate.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    if differs(Some(candidate), existing.as_deref()) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Trim-compared difference, where "existing empty, candidate present"
/// always counts as different.
fn differs(candidate: Option<&str>, existing: Option<&str>) -> bool {
    match (candidate, existing) {
        (Some(c), Some(e)) => c.trim() != e.trim(),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(url: &str) -> CandidateRow {
        CandidateRow {
            row_number: 1,
            normalized_url: url.to_string(),
            ..Default::default()
        }
    }

    fn existing_with_price(price: Option<f64>) -> SiteFields {
        SiteFields {
            gb_base_price: price,
            ..Default::default()
        }
    }

    #[test]
    fn lower_price_updates() {
        let mut candidate = row("a.com");
        candidate.raw_price = Some(40.0);
        let updates = compare_and_get_updates(&candidate, &existing_with_price(Some(60.0))).unwrap();
        assert_eq!(
            updates.entries(),
            &[("gb_base_price", FieldValue::Real(40.0))]
        );
    }

    #[test]
    fn equal_or_higher_price_never_updates() {
        let mut candidate = row("a.com");
        for price in [60.0, 80.0] {
            candidate.raw_price = Some(price);
            assert!(compare_and_get_updates(&candidate, &existing_with_price(Some(60.0))).is_none());
            assert!(!should_update_based_on_price(
                &candidate,
                &existing_with_price(Some(60.0))
            ));
        }
    }

    #[test]
    fn absent_existing_price_always_updates() {
        let mut candidate = row("a.com");
        candidate.raw_price = Some(100.0);
        assert!(should_update_based_on_price(
            &candidate,
            &existing_with_price(None)
        ));
    }

    #[test]
    fn scalar_updates_on_difference_or_empty_existing() {
        let mut candidate = row("a.com");
        candidate.da = Some("55".to_string());
        candidate.country = Some("US".to_string());

        let existing = SiteFields {
            da: Some("40".to_string()),
            country: None,
            ..Default::default()
        };

        let updates = compare_and_get_updates(&candidate, &existing).unwrap();
        let columns = updates.columns();
        assert!(columns.contains(&"da"));
        assert!(columns.contains(&"country"));
    }

    #[test]
    fn identical_scalars_do_not_trigger() {
        let mut candidate = row("a.com");
        candidate.da = Some(" 55 ".to_string());
        let existing = SiteFields {
            da: Some("55".to_string()),
            ..Default::default()
        };
        assert!(compare_and_get_updates(&candidate, &existing).is_none());
    }

    #[test]
    fn no_op_returns_none_never_empty() {
        let candidate = row("a.com");
        assert_eq!(compare_and_get_updates(&candidate, &SiteFields::default()), None);
    }

    #[test]
    fn contact_email_dual_writes() {
        let mut candidate = row("a.com");
        candidate.contact = Some("Jane@Pub.io".to_string());
        let updates = compare_and_get_updates(&candidate, &SiteFields::default()).unwrap();
        let columns = updates.columns();
        assert!(columns.contains(&"contact_email"));
        assert!(columns.contains(&"publisher_email"));
        assert!(!columns.contains(&"contact_name"));
    }

    #[test]
    fn contact_name_dual_writes() {
        let mut candidate = row("a.com");
        candidate.contact = Some("Jane Doe".to_string());
        let updates = compare_and_get_updates(&candidate, &SiteFields::default()).unwrap();
        let columns = updates.columns();
        assert!(columns.contains(&"contact_name"));
        assert!(columns.contains(&"publisher_name"));
        assert!(!columns.contains(&"contact_email"));
    }

    #[test]
    fn has_field_updates_ignores_price_only_diffs() {
        let mut candidate = row("a.com");
        candidate.raw_price = Some(10.0);
        let existing = existing_with_price(Some(50.0));
        assert!(should_update_based_on_price(&candidate, &existing));
        assert!(!has_field_updates(&candidate, &existing));

        candidate.da = Some("55".to_string());
        assert!(has_field_updates(&candidate, &existing));
    }
}
