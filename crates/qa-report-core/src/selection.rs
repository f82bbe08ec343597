use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::classify::{ImpactClass, CATEGORY_FACETS};
use crate::derive::{date_ranges_for_month, distinct_modules, module_scope};
use crate::record::MonthKey;
use crate::RowStore;

pub const ALL_MONTHS_KEY: &str = "all";

/// Month tab selection: one month bucket, or every row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(into = "String", try_from = "String")]
pub enum MonthSelection {
    #[default]
    All,
    Month(MonthKey),
}

impl MonthSelection {
    #[must_use]
    pub fn contains(&self, month: MonthKey) -> bool {
        match self {
            Self::All => true,
            Self::Month(selected) => *selected == month,
        }
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case(ALL_MONTHS_KEY) {
            return Some(Self::All);
        }
        MonthKey::parse(value).map(Self::Month)
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::All => "Overall Review".to_string(),
            Self::Month(month) => month.label(),
        }
    }
}

impl Display for MonthSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(ALL_MONTHS_KEY),
            Self::Month(month) => write!(f, "{month}"),
        }
    }
}

impl From<MonthSelection> for String {
    fn from(value: MonthSelection) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for MonthSelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid month selection `{value}`"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ViewTab {
    Observations,
    OverallMonth,
    OverallAll,
}

impl ViewTab {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observations => "observations",
            Self::OverallMonth => "overall-month",
            Self::OverallAll => "overall-all",
        }
    }

    /// Tab shown right after `month` is selected.
    #[must_use]
    pub fn landing_for(month: &MonthSelection) -> Self {
        if month.is_all() {
            Self::OverallAll
        } else {
            Self::Observations
        }
    }

    #[must_use]
    pub fn available_for(self, month: &MonthSelection) -> bool {
        match self {
            Self::OverallAll => month.is_all(),
            Self::Observations | Self::OverallMonth => !month.is_all(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SidebarSection {
    Dates,
    Modules,
    Categories,
    Impacts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct ExpandedSections {
    pub dates: bool,
    pub modules: bool,
    pub categories: bool,
    pub impacts: bool,
}

impl Default for ExpandedSections {
    fn default() -> Self {
        Self { dates: true, modules: true, categories: true, impacts: true }
    }
}

impl ExpandedSections {
    #[must_use]
    pub fn is_expanded(&self, section: SidebarSection) -> bool {
        match section {
            SidebarSection::Dates => self.dates,
            SidebarSection::Modules => self.modules,
            SidebarSection::Categories => self.categories,
            SidebarSection::Impacts => self.impacts,
        }
    }

    #[must_use]
    pub fn toggled(mut self, section: SidebarSection) -> Self {
        let flag = match section {
            SidebarSection::Dates => &mut self.dates,
            SidebarSection::Modules => &mut self.modules,
            SidebarSection::Categories => &mut self.categories,
            SidebarSection::Impacts => &mut self.impacts,
        };
        *flag = !*flag;
        self
    }
}

/// Active dashboard filters and view.
///
/// Values are never mutated in place: [`Selection::apply`] returns the next
/// state and leaves the receiver untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Selection {
    pub active_month: MonthSelection,
    pub active_date_range: Option<String>,
    pub active_module: Option<String>,
    pub active_category: Option<String>,
    pub active_impact: Option<String>,
    pub search_query: String,
    pub active_tab: ViewTab,
    pub expanded_sections: ExpandedSections,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            active_month: MonthSelection::All,
            active_date_range: None,
            active_module: None,
            active_category: None,
            active_impact: None,
            search_query: String::new(),
            active_tab: ViewTab::OverallAll,
            expanded_sections: ExpandedSections::default(),
        }
    }
}

/// User interaction that moves the selection to its next state.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SelectionEvent {
    SelectMonth(MonthSelection),
    /// Selecting the already active range clears it.
    SelectDateRange(String),
    SelectModule(Option<String>),
    SelectCategory(Option<String>),
    SelectImpact(Option<String>),
    Search(String),
    SwitchTab(ViewTab),
    ToggleSection(SidebarSection),
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum SelectionError {
    #[error("unknown month `{0}`")]
    UnknownMonth(String),
    #[error("date range `{date_range}` does not belong to `{month}`")]
    DateRangeOutOfScope { date_range: String, month: String },
    #[error("module `{0}` is not present in the selected scope")]
    ModuleOutOfScope(String),
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("unknown impact `{0}`")]
    UnknownImpact(String),
    #[error("tab `{tab}` is not available for `{month}`")]
    TabUnavailable { tab: String, month: String },
}

impl Selection {
    /// Lowercase trimmed search query, `None` when blank.
    #[must_use]
    pub fn search_needle(&self) -> Option<String> {
        let trimmed = self.search_query.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }

    /// Produce the state that follows `event`.
    ///
    /// Coarser selections reset finer ones: a new month clears every filter
    /// and the search; a new date range clears the module filter and the
    /// search but keeps category and impact.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] when the event would leave the selection
    /// pointing at a month, date range, module, category, impact, or tab that
    /// is not valid for the current scope.
    pub fn apply(&self, event: &SelectionEvent, store: &RowStore) -> Result<Self, SelectionError> {
        match event {
            SelectionEvent::SelectMonth(month) => {
                check_month(month, store)?;
                Ok(Self {
                    active_month: *month,
                    active_tab: ViewTab::landing_for(month),
                    expanded_sections: self.expanded_sections,
                    ..Self::default()
                })
            }
            SelectionEvent::SelectDateRange(date_range) => {
                check_date_range(&self.active_month, date_range, store)?;
                let next_range = if self.active_date_range.as_deref() == Some(date_range.as_str()) {
                    None
                } else {
                    Some(date_range.clone())
                };
                Ok(Self {
                    active_date_range: next_range,
                    active_module: None,
                    search_query: String::new(),
                    ..self.clone()
                })
            }
            SelectionEvent::SelectModule(module) => {
                if let Some(module) = module {
                    check_module(self, module, store)?;
                }
                Ok(Self { active_module: module.clone(), ..self.clone() })
            }
            SelectionEvent::SelectCategory(category) => {
                if let Some(category) = category {
                    check_category(category)?;
                }
                Ok(Self { active_category: category.clone(), ..self.clone() })
            }
            SelectionEvent::SelectImpact(impact) => {
                let normalized = match impact {
                    Some(impact) => Some(
                        ImpactClass::parse_key(impact)
                            .ok_or_else(|| SelectionError::UnknownImpact(impact.clone()))?
                            .key()
                            .to_string(),
                    ),
                    None => None,
                };
                Ok(Self { active_impact: normalized, ..self.clone() })
            }
            SelectionEvent::Search(query) => {
                Ok(Self { search_query: query.trim().to_string(), ..self.clone() })
            }
            SelectionEvent::SwitchTab(tab) => {
                if !tab.available_for(&self.active_month) {
                    return Err(SelectionError::TabUnavailable {
                        tab: tab.as_str().to_string(),
                        month: self.active_month.to_string(),
                    });
                }
                Ok(Self { active_tab: *tab, ..self.clone() })
            }
            SelectionEvent::ToggleSection(section) => Ok(Self {
                expanded_sections: self.expanded_sections.toggled(*section),
                ..self.clone()
            }),
        }
    }

    /// Check a selection received from outside (for example a request body)
    /// against the same scope rules [`Selection::apply`] enforces.
    ///
    /// Returns the selection with the impact filter keyed as `S1`..`S4`, the
    /// form [`SelectionEvent::SelectImpact`] produces.
    ///
    /// # Errors
    /// Returns the first [`SelectionError`] found.
    pub fn validate(&self, store: &RowStore) -> Result<Self, SelectionError> {
        check_month(&self.active_month, store)?;
        if let Some(date_range) = self.active_date_range.as_deref() {
            check_date_range(&self.active_month, date_range, store)?;
        }
        if let Some(module) = self.active_module.as_deref() {
            check_module(self, module, store)?;
        }
        if let Some(category) = self.active_category.as_deref() {
            check_category(category)?;
        }
        let active_impact = match self.active_impact.as_deref() {
            Some(impact) => Some(
                ImpactClass::parse_key(impact)
                    .ok_or_else(|| SelectionError::UnknownImpact(impact.to_string()))?
                    .key()
                    .to_string(),
            ),
            None => None,
        };
        if !self.active_tab.available_for(&self.active_month) {
            return Err(SelectionError::TabUnavailable {
                tab: self.active_tab.as_str().to_string(),
                month: self.active_month.to_string(),
            });
        }
        Ok(Self { active_impact, ..self.clone() })
    }
}

fn check_month(month: &MonthSelection, store: &RowStore) -> Result<(), SelectionError> {
    match month {
        MonthSelection::All => Ok(()),
        MonthSelection::Month(key) if store.months().contains(key) => Ok(()),
        MonthSelection::Month(key) => Err(SelectionError::UnknownMonth(key.to_string())),
    }
}

fn check_date_range(
    month: &MonthSelection,
    date_range: &str,
    store: &RowStore,
) -> Result<(), SelectionError> {
    let in_scope =
        !month.is_all() && date_ranges_for_month(store.rows(), month).contains(&date_range);
    if in_scope {
        Ok(())
    } else {
        Err(SelectionError::DateRangeOutOfScope {
            date_range: date_range.to_string(),
            month: month.to_string(),
        })
    }
}

fn check_module(
    selection: &Selection,
    module: &str,
    store: &RowStore,
) -> Result<(), SelectionError> {
    let scope = module_scope(store.rows(), selection);
    if distinct_modules(&scope).contains(&module) {
        Ok(())
    } else {
        Err(SelectionError::ModuleOutOfScope(module.to_string()))
    }
}

fn check_category(category: &str) -> Result<(), SelectionError> {
    if CATEGORY_FACETS.contains(&category) {
        Ok(())
    } else {
        Err(SelectionError::UnknownCategory(category.to_string()))
    }
}
