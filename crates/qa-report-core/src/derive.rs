use std::collections::BTreeSet;

use crate::record::{MonthKey, Observation};
use crate::selection::{MonthSelection, Selection};

/// Distinct month keys in chronological order.
#[must_use]
pub fn distinct_months(rows: &[Observation]) -> Vec<MonthKey> {
    rows.iter().map(|row| row.period_month).collect::<BTreeSet<_>>().into_iter().collect()
}

#[must_use]
pub fn rows_for_month<'a>(rows: &'a [Observation], month: &MonthSelection) -> Vec<&'a Observation> {
    rows.iter().filter(|row| month.contains(row.period_month)).collect()
}

/// Non-empty date ranges belonging to `month`, sorted by label.
#[must_use]
pub fn date_ranges_for_month<'a>(rows: &'a [Observation], month: &MonthSelection) -> Vec<&'a str> {
    rows.iter()
        .filter(|row| month.contains(row.period_month))
        .map(|row| row.date_range.as_str())
        .filter(|date_range| !date_range.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[must_use]
pub fn rows_for_date_range<'a>(rows: &'a [Observation], date_range: &str) -> Vec<&'a Observation> {
    rows.iter().filter(|row| row.date_range == date_range).collect()
}

/// Distinct present modules in first-encountered order.
#[must_use]
pub fn distinct_modules<'a>(rows: &[&'a Observation]) -> Vec<&'a str> {
    let mut modules: Vec<&'a str> = Vec::new();
    for module in rows.iter().filter_map(|row| row.module.as_deref()) {
        if !module.is_empty() && !modules.contains(&module) {
            modules.push(module);
        }
    }
    modules
}

/// Rows a module facet is drawn from: the active date range when set,
/// otherwise the active month.
#[must_use]
pub fn module_scope<'a>(rows: &'a [Observation], selection: &Selection) -> Vec<&'a Observation> {
    match selection.active_date_range.as_deref() {
        Some(date_range) => rows
            .iter()
            .filter(|row| selection.active_month.contains(row.period_month))
            .filter(|row| row.date_range == date_range)
            .collect(),
        None => rows_for_month(rows, &selection.active_month),
    }
}
