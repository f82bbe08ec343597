use crate::record::Observation;
use crate::selection::Selection;

/// Apply every active filter in `selection` to `rows`.
///
/// Predicates are conjunctive and unset filters are no-ops. The output is a
/// subsequence of the input in its original order.
pub fn filter_rows<'a, I>(rows: I, selection: &Selection) -> Vec<&'a Observation>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let needle = selection.search_needle();
    rows.into_iter().filter(|row| matches_selection(row, selection, needle.as_deref())).collect()
}

/// `needle` is the lowercase, trimmed search query (see
/// [`Selection::search_needle`]).
#[must_use]
pub fn matches_selection(row: &Observation, selection: &Selection, needle: Option<&str>) -> bool {
    if !selection.active_month.contains(row.period_month) {
        return false;
    }
    if let Some(date_range) = selection.active_date_range.as_deref() {
        if row.date_range != date_range {
            return false;
        }
    }
    if let Some(module) = selection.active_module.as_deref() {
        if row.module.as_deref() != Some(module) {
            return false;
        }
    }
    if let Some(category) = selection.active_category.as_deref() {
        if row.category.as_deref() != Some(category) {
            return false;
        }
    }
    if let Some(impact) = selection.active_impact.as_deref() {
        if !impact_has_prefix(row.impact.as_deref(), impact) {
            return false;
        }
    }
    match needle {
        Some(needle) => row.matches_search(needle),
        None => true,
    }
}

fn impact_has_prefix(impact: Option<&str>, prefix: &str) -> bool {
    impact.is_some_and(|impact| impact.to_lowercase().starts_with(&prefix.to_lowercase()))
}
