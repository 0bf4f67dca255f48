//! Compiles loosely-typed inbound filters into store predicates.
//!
//! Policy is fail-soft per field: a malformed value is dropped with a
//! warning and never aborts compilation of the remaining filters, so reads
//! degrade to "show all" rather than fail outright.

use chrono::{DateTime, NaiveDate, Utc};

use helm_store::{Clause, Predicate};

use crate::protocol::{weak_f64, weak_i64, OrderFilters, PorterFilters};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_LIMIT: usize = 10;

const ALL_SENTINEL: &str = "all";

/// Build the orders predicate. Single-bound ranges become flat clauses;
/// both bounds of a range family go to the conjunction list, which is
/// extended (never overwritten) when a second family is present.
pub fn compile_order_filters(filters: &OrderFilters) -> Predicate {
    let mut predicate = Predicate::empty();

    if let Some(status) = filters.status.as_deref() {
        if !status.is_empty() && status != ALL_SENTINEL {
            predicate.push(Clause::eq("status", status));
        }
    }

    let mut date_clauses = Vec::new();
    if let Some(raw) = filters.from_date.as_deref() {
        match parse_timestamp(raw) {
            Some(from) => date_clauses.push(Clause::gte("created_at", from.to_rfc3339())),
            None => tracing::warn!(from_date = raw, "invalid from_date, dropping filter"),
        }
    }
    if let Some(raw) = filters.to_date.as_deref() {
        match parse_timestamp(raw) {
            Some(to) => date_clauses.push(Clause::lte("created_at", to.to_rfc3339())),
            None => tracing::warn!(to_date = raw, "invalid to_date, dropping filter"),
        }
    }
    append_range(&mut predicate, date_clauses);

    let mut amount_clauses = Vec::new();
    if let Some(raw) = filters.min_amount.as_ref() {
        match weak_f64(raw) {
            Some(min) => amount_clauses.push(Clause::gte("total_amount", min)),
            None => tracing::warn!(min_amount = %raw, "invalid min_amount, dropping filter"),
        }
    }
    if let Some(raw) = filters.max_amount.as_ref() {
        match weak_f64(raw) {
            Some(max) => amount_clauses.push(Clause::lte("total_amount", max)),
            None => tracing::warn!(max_amount = %raw, "invalid max_amount, dropping filter"),
        }
    }
    append_range(&mut predicate, amount_clauses);

    if let Some(raw) = filters.search.as_deref() {
        let term = raw.trim();
        let term = term.strip_prefix('#').unwrap_or(term);
        if !term.is_empty() {
            // Matches the human-assigned order code, never the store key
            predicate.push(Clause::contains("code", term));
        }
    }

    predicate
}

fn append_range(predicate: &mut Predicate, clauses: Vec<Clause>) {
    match clauses.len() {
        0 => {}
        1 => predicate.push(clauses.into_iter().next().expect("len checked")),
        _ => {
            for clause in clauses {
                predicate.push_conjunction(clause);
            }
        }
    }
}

/// Page number (≥ 1) and page size (≥ 1) from weakly-typed filter fields.
pub fn page_params(filters: &OrderFilters) -> (usize, usize) {
    let page = filters
        .page
        .as_ref()
        .and_then(weak_i64)
        .filter(|&p| p >= 1)
        .map(|p| p as usize)
        .unwrap_or(DEFAULT_PAGE);
    let limit = filters
        .limit
        .as_ref()
        .and_then(weak_i64)
        .filter(|&l| l >= 1)
        .map(|l| l as usize)
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    (page, limit)
}

pub fn compile_porter_filters(filters: &PorterFilters) -> Predicate {
    let mut predicate = Predicate::empty();

    if let Some(status) = filters.status.as_deref() {
        if !status.is_empty() && status != ALL_SENTINEL {
            predicate.push(Clause::eq("status", status));
        }
    }
    if let Some(urgent) = filters.urgent {
        predicate.push(Clause::eq("urgent", urgent));
    }
    if let Some(size) = filters.package_size.as_deref() {
        if !size.is_empty() && size != ALL_SENTINEL {
            predicate.push(Clause::eq("package_size", size));
        }
    }

    predicate
}

/// RFC 3339 timestamp, or a bare date taken as UTC midnight.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(value: serde_json::Value) -> OrderFilters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn status_all_is_dropped() {
        let pred = compile_order_filters(&filters(json!({"status": "all"})));
        assert!(pred.is_empty());
    }

    #[test]
    fn status_becomes_equality() {
        let pred = compile_order_filters(&filters(json!({"status": "pending"})));
        assert_eq!(pred.clauses, vec![Clause::eq("status", "pending")]);
    }

    #[test]
    fn single_date_bound_is_flat() {
        let pred = compile_order_filters(&filters(json!({"from_date": "2026-01-01T00:00:00Z"})));
        assert_eq!(pred.clauses.len(), 1);
        assert!(pred.all_of.is_empty());
        assert!(pred.constrains("created_at"));
    }

    #[test]
    fn both_date_bounds_form_conjunction() {
        let pred = compile_order_filters(&filters(json!({
            "from_date": "2026-01-01T00:00:00Z",
            "to_date": "2026-02-01T00:00:00Z",
        })));
        assert!(pred.clauses.is_empty());
        assert_eq!(pred.all_of.len(), 2);
    }

    #[test]
    fn both_families_extend_one_conjunction_list() {
        let pred = compile_order_filters(&filters(json!({
            "from_date": "2026-01-01T00:00:00Z",
            "to_date": "2026-02-01T00:00:00Z",
            "min_amount": 100,
            "max_amount": "500",
        })));
        // Neither family overwrote the other
        assert_eq!(pred.all_of.len(), 4);
    }

    #[test]
    fn malformed_dates_drop_without_failing_rest() {
        let pred = compile_order_filters(&filters(json!({
            "status": "delivered",
            "from_date": "not-a-date",
            "to_date": "also-bad",
        })));
        assert!(!pred.constrains("created_at"));
        assert_eq!(pred.clauses, vec![Clause::eq("status", "delivered")]);
    }

    #[test]
    fn malformed_amount_drops_only_itself() {
        let pred = compile_order_filters(&filters(json!({
            "min_amount": "cheap",
            "max_amount": 500,
        })));
        assert_eq!(pred.clauses, vec![Clause::lte("total_amount", 500.0)]);
        assert!(pred.all_of.is_empty());
    }

    #[test]
    fn search_strips_hash_and_matches_code() {
        let pred = compile_order_filters(&filters(json!({
            "status": "all",
            "search": "  #ABC12 ",
        })));
        assert_eq!(pred.clauses, vec![Clause::contains("code", "ABC12")]);
        assert!(!pred.constrains("status"));
    }

    #[test]
    fn search_matches_case_insensitively() {
        let pred = compile_order_filters(&filters(json!({"search": "#abc12"})));
        assert!(pred.matches(&json!({"code": "ORDABC123"})));
    }

    #[test]
    fn empty_search_is_dropped() {
        let pred = compile_order_filters(&filters(json!({"search": "  #  "})));
        assert!(pred.is_empty());
    }

    #[test]
    fn bare_date_parses_as_midnight() {
        let pred = compile_order_filters(&filters(json!({"from_date": "2026-03-01"})));
        assert!(pred.constrains("created_at"));
        assert!(pred.matches(&json!({"created_at": "2026-03-01T08:00:00Z"})));
        assert!(!pred.matches(&json!({"created_at": "2026-02-28T23:59:00Z"})));
    }

    #[test]
    fn page_params_defaults_and_weak_types() {
        let (page, limit) = page_params(&OrderFilters::default());
        assert_eq!((page, limit), (DEFAULT_PAGE, DEFAULT_PAGE_LIMIT));

        let (page, limit) = page_params(&filters(json!({"page": "3", "limit": 25})));
        assert_eq!((page, limit), (3, 25));

        let (page, limit) = page_params(&filters(json!({"page": 0, "limit": "junk"})));
        assert_eq!((page, limit), (DEFAULT_PAGE, DEFAULT_PAGE_LIMIT));
    }

    #[test]
    fn porter_filters_compile() {
        let f: PorterFilters = serde_json::from_value(json!({
            "status": "pending",
            "urgent": true,
            "package_size": "all",
        }))
        .unwrap();
        let pred = compile_porter_filters(&f);
        assert_eq!(pred.clauses.len(), 2);
        assert!(pred.constrains("status"));
        assert!(pred.constrains("urgent"));
        assert!(!pred.constrains("package_size"));
    }
}
