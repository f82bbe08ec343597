//! Serializable description of one dashboard render.
//!
//! A presentation layer turns this tree into markup; nothing here knows
//! about HTML.

use qa_report_core::{
    date_ranges_for_month, distinct_modules, group_observations, module_icon, module_scope,
    rows_for_month, CategoryClass, GroupSummary, ImpactClass, ModuleStyle, MonthSelection,
    Observation, ObservationGroup, RowStore, Selection, SidebarSection, StatusClass, ViewTab,
    CATEGORY_FACETS,
};
use serde::Serialize;

pub const DATA_NOT_LOADED_TITLE: &str = "Data Not Loaded";
pub const NO_MATCHES_MESSAGE: &str = "No observations match the current filters.";
pub const NO_DATA_MESSAGE: &str = "No data available for the current filters.";
pub const SELECT_DATE_RANGE_MESSAGE: &str =
    "Select a date range from the left panel to view observations.";
pub const OVERALL_ALL_HEADING: &str = "Overall Review — All Months";

const ALL_MODULES_LABEL: &str = "All Modules";
const ALL_LABEL: &str = "All";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum DashboardScreen {
    /// No row store is available. Distinct from a store that filters to zero rows.
    DataNotLoaded { title: String, message: String },
    Ready(DashboardView),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardView {
    pub snapshot_id: String,
    pub selection: Selection,
    pub month_tabs: Vec<MonthTab>,
    pub sidebar: Vec<SidebarSectionView>,
    pub content: ContentPanel,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthTab {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub active: bool,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SidebarSectionView {
    pub section: SidebarSection,
    pub title: &'static str,
    pub icon: &'static str,
    pub hidden: bool,
    pub expanded: bool,
    pub count: usize,
    /// A concrete value (not the "All" entry) is selected in this section.
    pub has_active: bool,
    /// Empty while the section is collapsed.
    pub items: Vec<SidebarItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SidebarItem {
    pub value: Option<String>,
    pub label: String,
    pub active: bool,
    pub icon: Option<&'static str>,
    pub style: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPanel {
    OverallAll { heading: String, observation_count: usize, review: ReviewPanel },
    SelectDateRange { icon: &'static str, message: String },
    Month(MonthPanel),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthPanel {
    pub month_label: String,
    pub date_range: String,
    pub tabs: Vec<ContentTab>,
    pub active_tab: ViewTab,
    pub body: MonthBody,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContentTab {
    pub tab: ViewTab,
    pub label: String,
    pub icon: &'static str,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum MonthBody {
    Observations(ObservationsPanel),
    Review(ReviewPanel),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ObservationsPanel {
    pub search_query: String,
    /// Active module, category, and impact filters joined with `" · "`.
    pub filter_badge: Option<String>,
    pub result_count: usize,
    pub result_label: String,
    pub table: TableBody,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableBody {
    Rows { rows: Vec<ObservationRow> },
    NoMatches { icon: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ObservationRow {
    pub sequence_number: u32,
    pub date_range: String,
    pub module: Option<String>,
    pub module_style: ModuleStyle,
    pub sub_module: Option<String>,
    pub text_lines: Vec<String>,
    pub category: Badge<CategoryClass>,
    pub impact: Badge<ImpactClass>,
    pub status: Badge<StatusClass>,
    pub link: Option<String>,
}

/// Display value plus the style bucket it falls into.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Badge<C> {
    pub label: Option<String>,
    pub class: C,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewPanel {
    Groups { summary: GroupSummary, groups: Vec<GroupView> },
    NoData { message: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupView {
    pub module: String,
    pub module_style: ModuleStyle,
    pub sub_module: String,
    pub recurring: bool,
    pub period_count: usize,
    pub periods: Vec<String>,
    pub observation_count: usize,
    pub items: Vec<ReviewItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReviewItem {
    pub sequence_number: u32,
    pub date_range: String,
    pub text_lines: Vec<String>,
    pub category: Badge<CategoryClass>,
    pub impact: Badge<ImpactClass>,
    pub status: Badge<StatusClass>,
}

pub(crate) fn render_view(
    store: &RowStore,
    selection: &Selection,
    snapshot_id: &str,
) -> DashboardView {
    DashboardView {
        snapshot_id: snapshot_id.to_string(),
        selection: selection.clone(),
        month_tabs: month_tabs(store, selection),
        sidebar: vec![
            date_section(store, selection),
            module_section(store, selection),
            category_section(selection),
            impact_section(selection),
        ],
        content: content_panel(store, selection),
    }
}

fn month_tabs(store: &RowStore, selection: &Selection) -> Vec<MonthTab> {
    std::iter::once(MonthSelection::All)
        .chain(store.months().into_iter().map(MonthSelection::Month))
        .map(|month| MonthTab {
            key: month.to_string(),
            label: month.label(),
            count: rows_for_month(store.rows(), &month).len(),
            active: month == selection.active_month,
            icon: if month.is_all() { "layers" } else { "calendar_month" },
        })
        .collect()
}

impl SidebarSectionView {
    fn new(
        section: SidebarSection,
        title: &'static str,
        icon: &'static str,
        selection: &Selection,
        count: usize,
        items: Vec<SidebarItem>,
    ) -> Self {
        let expanded = selection.expanded_sections.is_expanded(section);
        let has_active = items.iter().any(|item| item.active && item.value.is_some());
        Self {
            section,
            title,
            icon,
            hidden: false,
            expanded,
            count,
            has_active,
            items: if expanded { items } else { Vec::new() },
        }
    }
}

impl SidebarItem {
    fn all(label: &str, active: bool, icon: Option<&'static str>) -> Self {
        Self { value: None, label: label.to_string(), active, icon, style: None }
    }

    fn value(value: &str, label: &str, active: bool) -> Self {
        Self {
            value: Some(value.to_string()),
            label: label.to_string(),
            active,
            icon: None,
            style: None,
        }
    }
}

fn date_section(store: &RowStore, selection: &Selection) -> SidebarSectionView {
    let (title, icon) = ("Date Range", "date_range");
    if selection.active_month.is_all() {
        let mut section =
            SidebarSectionView::new(SidebarSection::Dates, title, icon, selection, 0, Vec::new());
        section.hidden = true;
        return section;
    }

    let ranges = date_ranges_for_month(store.rows(), &selection.active_month);
    let items = ranges
        .iter()
        .map(|range| {
            SidebarItem::value(range, range, selection.active_date_range.as_deref() == Some(*range))
        })
        .collect();
    SidebarSectionView::new(SidebarSection::Dates, title, icon, selection, ranges.len(), items)
}

fn module_section(store: &RowStore, selection: &Selection) -> SidebarSectionView {
    let scope = module_scope(store.rows(), selection);
    let modules = distinct_modules(&scope);

    let all_active = selection.active_module.is_none();
    let mut items = vec![SidebarItem::all(ALL_MODULES_LABEL, all_active, Some("grid_view"))];
    items.extend(modules.iter().map(|module| SidebarItem {
        icon: Some(module_icon(module)),
        style: Some(ModuleStyle::classify(Some(*module)).as_str()),
        ..SidebarItem::value(module, module, selection.active_module.as_deref() == Some(*module))
    }));
    SidebarSectionView::new(
        SidebarSection::Modules,
        "Modules",
        "widgets",
        selection,
        modules.len(),
        items,
    )
}

fn category_section(selection: &Selection) -> SidebarSectionView {
    let mut items = vec![SidebarItem::all(ALL_LABEL, selection.active_category.is_none(), None)];
    items.extend(CATEGORY_FACETS.iter().map(|category| SidebarItem {
        style: Some(CategoryClass::classify(Some(*category)).as_str()),
        ..SidebarItem::value(
            category,
            category,
            selection.active_category.as_deref() == Some(*category),
        )
    }));
    SidebarSectionView::new(
        SidebarSection::Categories,
        "Category",
        "label",
        selection,
        CATEGORY_FACETS.len(),
        items,
    )
}

fn impact_section(selection: &Selection) -> SidebarSectionView {
    let active = selection.active_impact.as_deref().and_then(ImpactClass::parse_key);
    let mut items = vec![SidebarItem::all(ALL_LABEL, selection.active_impact.is_none(), None)];
    items.extend(ImpactClass::ALL.iter().map(|impact| SidebarItem {
        style: Some(impact.key()),
        ..SidebarItem::value(impact.key(), impact.label(), active == Some(*impact))
    }));
    SidebarSectionView::new(
        SidebarSection::Impacts,
        "Impact",
        "bolt",
        selection,
        ImpactClass::ALL.len(),
        items,
    )
}

fn content_panel(store: &RowStore, selection: &Selection) -> ContentPanel {
    let filtered = store.filtered(selection);

    if selection.active_month.is_all() {
        return ContentPanel::OverallAll {
            heading: OVERALL_ALL_HEADING.to_string(),
            observation_count: filtered.len(),
            review: review_panel(&filtered),
        };
    }

    let Some(date_range) = selection.active_date_range.clone() else {
        return ContentPanel::SelectDateRange {
            icon: "touch_app",
            message: SELECT_DATE_RANGE_MESSAGE.to_string(),
        };
    };

    let month_label = selection.active_month.label();
    let active_tab = match selection.active_tab {
        ViewTab::OverallMonth => ViewTab::OverallMonth,
        ViewTab::Observations | ViewTab::OverallAll => ViewTab::Observations,
    };
    let tabs = vec![
        ContentTab {
            tab: ViewTab::Observations,
            label: "Observations".to_string(),
            icon: "table_view",
            active: active_tab == ViewTab::Observations,
        },
        ContentTab {
            tab: ViewTab::OverallMonth,
            label: format!("Overall – {month_label}"),
            icon: "summarize",
            active: active_tab == ViewTab::OverallMonth,
        },
    ];
    let body = match active_tab {
        ViewTab::OverallMonth => MonthBody::Review(review_panel(&filtered)),
        ViewTab::Observations | ViewTab::OverallAll => {
            MonthBody::Observations(observations_panel(selection, &filtered))
        }
    };

    ContentPanel::Month(MonthPanel { month_label, date_range, tabs, active_tab, body })
}

fn filter_badge(selection: &Selection) -> Option<String> {
    let parts = [
        selection.active_module.as_deref(),
        selection.active_category.as_deref(),
        selection.active_impact.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    (!parts.is_empty()).then(|| parts.join(" · "))
}

#[must_use]
pub fn result_label(count: usize) -> String {
    if count == 1 {
        "1 result".to_string()
    } else {
        format!("{count} results")
    }
}

fn observations_panel(selection: &Selection, rows: &[&Observation]) -> ObservationsPanel {
    let table = if rows.is_empty() {
        TableBody::NoMatches { icon: "search_off", message: NO_MATCHES_MESSAGE.to_string() }
    } else {
        TableBody::Rows { rows: rows.iter().map(|row| observation_row(row)).collect() }
    };
    ObservationsPanel {
        search_query: selection.search_query.clone(),
        filter_badge: filter_badge(selection),
        result_count: rows.len(),
        result_label: result_label(rows.len()),
        table,
    }
}

fn lines(row: &Observation) -> Vec<String> {
    row.text_lines().into_iter().map(str::to_string).collect()
}

fn category_badge(row: &Observation) -> Badge<CategoryClass> {
    Badge { label: row.category.clone(), class: row.category_class() }
}

fn impact_badge(row: &Observation) -> Badge<ImpactClass> {
    Badge { label: row.impact.clone(), class: row.impact_class() }
}

fn status_badge(row: &Observation) -> Badge<StatusClass> {
    Badge { label: Some(row.status_label().to_string()), class: row.status_class() }
}

fn observation_row(row: &Observation) -> ObservationRow {
    ObservationRow {
        sequence_number: row.sequence_number,
        date_range: row.date_range.clone(),
        module: row.module.clone(),
        module_style: row.module_style(),
        sub_module: row.sub_module.clone(),
        text_lines: lines(row),
        category: category_badge(row),
        impact: impact_badge(row),
        status: status_badge(row),
        link: row.link.clone(),
    }
}

fn review_panel(rows: &[&Observation]) -> ReviewPanel {
    if rows.is_empty() {
        return ReviewPanel::NoData { message: NO_DATA_MESSAGE.to_string() };
    }
    let groups = group_observations(rows.iter().copied());
    ReviewPanel::Groups {
        summary: GroupSummary::from_groups(&groups),
        groups: groups.iter().map(group_view).collect(),
    }
}

fn group_view(group: &ObservationGroup<'_>) -> GroupView {
    GroupView {
        module: group.module.to_string(),
        module_style: ModuleStyle::classify(Some(group.module)),
        sub_module: group.sub_module.to_string(),
        recurring: group.recurring,
        period_count: group.date_range_count,
        periods: group.date_ranges().into_iter().map(str::to_string).collect(),
        observation_count: group.members.len(),
        items: group
            .members
            .iter()
            .map(|row| ReviewItem {
                sequence_number: row.sequence_number,
                date_range: row.date_range.clone(),
                text_lines: lines(row),
                category: category_badge(row),
                impact: impact_badge(row),
                status: status_badge(row),
            })
            .collect(),
    }
}
