//! Filter, grouping, and selection core for the QA report dashboard.
//!
//! Everything here is pure and synchronous: callers hand in the loaded
//! [`RowStore`] and a [`Selection`] and get fresh derived values back.

mod classify;
mod derive;
mod filter;
mod grouping;
mod record;
mod selection;

pub use classify::{
    module_icon, CategoryClass, ImpactClass, ModuleStyle, StatusClass, CATEGORY_FACETS,
};
pub use derive::{
    date_ranges_for_month, distinct_months, distinct_modules, module_scope, rows_for_date_range,
    rows_for_month,
};
pub use filter::{filter_rows, matches_selection};
pub use grouping::{group_observations, GroupSummary, ObservationGroup};
pub use record::{MonthKey, Observation, GENERAL_SUB_MODULE, UNKNOWN_MODULE, UNKNOWN_MONTH};
pub use selection::{
    ExpandedSections, MonthSelection, Selection, SelectionError, SelectionEvent, SidebarSection,
    ViewTab, ALL_MONTHS_KEY,
};

/// Loaded observations. Read-only once constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowStore {
    rows: Vec<Observation>,
}

impl RowStore {
    #[must_use]
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn months(&self) -> Vec<MonthKey> {
        distinct_months(&self.rows)
    }

    /// Rows matching every active filter in `selection`, in store order.
    #[must_use]
    pub fn filtered(&self, selection: &Selection) -> Vec<&Observation> {
        filter_rows(&self.rows, selection)
    }
}
