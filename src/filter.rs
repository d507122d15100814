use crate::models::{AdRecord, GroupId, ViewQuery};
use chrono::NaiveDate;

/// Normalized filter selection. Empty strings from the query layer collapse to
/// `None` so "no brand picked" and "brand param absent" behave identically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    pub brand: Option<String>,
    pub library_id_query: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<ViewQuery> for FilterParams {
    fn from(query: ViewQuery) -> Self {
        Self {
            brand: query.brand.filter(|value| !value.trim().is_empty()),
            library_id_query: query.q.filter(|value| !value.trim().is_empty()),
            start_date: query.start_date,
            end_date: query.end_date,
        }
    }
}

/// Applies brand, library-id substring, and date-range filters in order,
/// preserving the record store's relative order.
///
/// Date-range semantics: inclusive on both bounds. A record whose start date
/// does not parse passes the date filter only when neither bound is set.
pub fn apply<'a>(records: &'a [AdRecord], params: &FilterParams) -> Vec<&'a AdRecord> {
    records
        .iter()
        .filter(|ad| matches_brand(ad, params))
        .filter(|ad| matches_library_id(ad, params))
        .filter(|ad| matches_date_range(ad, params))
        .collect()
}

fn matches_brand(ad: &AdRecord, params: &FilterParams) -> bool {
    match &params.brand {
        Some(brand) => ad.brand == *brand,
        None => true,
    }
}

fn matches_library_id(ad: &AdRecord, params: &FilterParams) -> bool {
    match &params.library_id_query {
        Some(query) => ad
            .library_id
            .to_lowercase()
            .contains(&query.to_lowercase()),
        None => true,
    }
}

fn matches_date_range(ad: &AdRecord, params: &FilterParams) -> bool {
    if params.start_date.is_none() && params.end_date.is_none() {
        return true;
    }
    let Some(date) = ad.start_date_parsed() else {
        return false;
    };
    if let Some(start) = params.start_date {
        if date < start {
            return false;
        }
    }
    if let Some(end) = params.end_date {
        if date > end {
            return false;
        }
    }
    true
}

/// Distinct non-empty brands, sorted, for the dashboard's brand dropdown. The
/// client auto-selects the first entry once brands are known.
pub fn brand_list(records: &[AdRecord]) -> Vec<String> {
    let mut brands: Vec<String> = records
        .iter()
        .map(|ad| ad.brand.clone())
        .filter(|brand| !brand.is_empty())
        .collect();
    brands.sort();
    brands.dedup();
    brands
}

/// Registry entries owned by the selected brand, in registry (creation) order.
/// Empty groups stay listed; that is the point of tracking brand on the group
/// itself rather than deriving it from members.
pub fn groups_for_brand<'a>(registry: &'a [GroupId], brand: &str) -> Vec<&'a GroupId> {
    registry.iter().filter(|group| group.brand == brand).collect()
}
