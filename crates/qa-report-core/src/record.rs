use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use time::Month;

use crate::classify::{CategoryClass, ImpactClass, ModuleStyle, StatusClass};

pub const UNKNOWN_MODULE: &str = "Unknown";
pub const GENERAL_SUB_MODULE: &str = "General";
pub const UNKNOWN_MONTH: &str = "Unknown";

const MONTH_ABBREVIATIONS: [(&str, Month); 12] = [
    ("jan", Month::January),
    ("feb", Month::February),
    ("mar", Month::March),
    ("apr", Month::April),
    ("may", Month::May),
    ("jun", Month::June),
    ("jul", Month::July),
    ("aug", Month::August),
    ("sep", Month::September),
    ("oct", Month::October),
    ("nov", Month::November),
    ("dec", Month::December),
];

static MONTH_YEAR: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\s+(\d{4})\b").ok()
});

/// Coarse month bucket every observation belongs to.
///
/// Serialized as `"Feb 2026"` or `"Unknown"`. Orders chronologically with
/// `Unknown` last.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(into = "String", try_from = "String")]
pub enum MonthKey {
    Month { year: i32, month: Month },
    Unknown,
}

impl MonthKey {
    #[must_use]
    pub fn new(year: i32, month: Month) -> Self {
        Self::Month { year, month }
    }

    /// Parse a key in its canonical `"Mon YYYY"` form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(UNKNOWN_MONTH) {
            return Some(Self::Unknown);
        }
        let mut parts = trimmed.split_whitespace();
        let month = month_from_abbreviation(parts.next()?)?;
        let year = parts.next()?.parse::<i32>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::Month { year, month })
    }

    /// Derive the bucket from a free-form date range label such as
    /// `"16th - 21th Feb 2026"`.
    ///
    /// Looks for a three-letter month abbreviation followed by a four-digit
    /// year. When several months occur, the earliest calendar month wins.
    #[must_use]
    pub fn from_date_range(date_range: &str) -> Self {
        let Some(pattern) = MONTH_YEAR.as_ref() else {
            return Self::Unknown;
        };
        let mut best: Option<(Month, i32)> = None;
        for captures in pattern.captures_iter(date_range) {
            let Some(month) = captures.get(1).and_then(|m| month_from_abbreviation(m.as_str()))
            else {
                continue;
            };
            let Some(year) = captures.get(2).and_then(|m| m.as_str().parse::<i32>().ok()) else {
                continue;
            };
            let replace = match best {
                Some((current, _)) => u8::from(month) < u8::from(current),
                None => true,
            };
            if replace {
                best = Some((month, year));
            }
        }
        best.map_or(Self::Unknown, |(month, year)| Self::Month { year, month })
    }

    /// Human label, e.g. `"February 2026"`.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Month { year, month } => format!("{month} {year}"),
            Self::Unknown => UNKNOWN_MONTH.to_string(),
        }
    }
}

impl Ord for MonthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Month { year: lhs_year, month: lhs_month },
                Self::Month { year: rhs_year, month: rhs_month },
            ) => lhs_year
                .cmp(rhs_year)
                .then_with(|| u8::from(*lhs_month).cmp(&u8::from(*rhs_month))),
            (Self::Month { .. }, Self::Unknown) => Ordering::Less,
            (Self::Unknown, Self::Month { .. }) => Ordering::Greater,
            (Self::Unknown, Self::Unknown) => Ordering::Equal,
        }
    }
}

impl PartialOrd for MonthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Month { year, month } => {
                let name = month.to_string();
                write!(f, "{} {year}", &name[..3])
            }
            Self::Unknown => f.write_str(UNKNOWN_MONTH),
        }
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid month key `{value}`"))
    }
}

fn month_from_abbreviation(value: &str) -> Option<Month> {
    MONTH_ABBREVIATIONS
        .iter()
        .find(|(abbreviation, _)| value.eq_ignore_ascii_case(abbreviation))
        .map(|(_, month)| *month)
}

/// One row of QA testing data.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Observation {
    pub sequence_number: u32,
    pub date_range: String,
    pub period_month: MonthKey,
    pub module: Option<String>,
    pub sub_module: Option<String>,
    pub observation_text: String,
    pub category: Option<String>,
    pub impact: Option<String>,
    pub link: Option<String>,
    pub status: Option<String>,
}

impl Observation {
    /// Module used for grouping; never empty.
    #[must_use]
    pub fn module_key(&self) -> &str {
        non_blank(self.module.as_deref()).unwrap_or(UNKNOWN_MODULE)
    }

    /// Sub-module used for grouping; never empty.
    #[must_use]
    pub fn sub_module_key(&self) -> &str {
        non_blank(self.sub_module.as_deref()).unwrap_or(GENERAL_SUB_MODULE)
    }

    #[must_use]
    pub fn category_class(&self) -> CategoryClass {
        CategoryClass::classify(self.category.as_deref())
    }

    #[must_use]
    pub fn impact_class(&self) -> ImpactClass {
        ImpactClass::classify(self.impact.as_deref())
    }

    #[must_use]
    pub fn status_class(&self) -> StatusClass {
        StatusClass::classify(self.status.as_deref())
    }

    #[must_use]
    pub fn module_style(&self) -> ModuleStyle {
        ModuleStyle::classify(self.module.as_deref())
    }

    /// Display status, `"Open"` when absent.
    #[must_use]
    pub fn status_label(&self) -> &str {
        non_blank(self.status.as_deref()).unwrap_or("Open")
    }

    /// Observation text split on embedded line breaks.
    #[must_use]
    pub fn text_lines(&self) -> Vec<&str> {
        self.observation_text.lines().collect()
    }

    /// String forms of every present field. Absent fields yield nothing.
    pub fn searchable_fields(&self) -> impl Iterator<Item = Cow<'_, str>> {
        let required = [
            Cow::Owned(self.sequence_number.to_string()),
            Cow::Borrowed(self.date_range.as_str()),
            Cow::Owned(self.period_month.to_string()),
            Cow::Borrowed(self.observation_text.as_str()),
        ];
        let optional = [
            self.module.as_deref(),
            self.sub_module.as_deref(),
            self.category.as_deref(),
            self.impact.as_deref(),
            self.link.as_deref(),
            self.status.as_deref(),
        ];
        required.into_iter().chain(optional.into_iter().flatten().map(Cow::Borrowed))
    }

    /// Case-insensitive substring match against every present field.
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        self.searchable_fields().any(|field| field.to_lowercase().contains(needle))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> Observation {
        Observation {
            sequence_number: 4,
            date_range: "16th - 21th Feb 2026".to_string(),
            period_month: MonthKey::new(2026, Month::February),
            module: Some("Production".to_string()),
            sub_module: None,
            observation_text: "Timeout occurred on save\nRetry shows blank form".to_string(),
            category: Some("Performance".to_string()),
            impact: None,
            link: None,
            status: None,
        }
    }

    #[test]
    fn month_key_is_parsed_from_date_range_label() {
        assert_eq!(
            MonthKey::from_date_range("16th - 21th Feb 2026"),
            MonthKey::new(2026, Month::February)
        );
        assert_eq!(
            MonthKey::from_date_range("2nd - 7th mar 2026"),
            MonthKey::new(2026, Month::March)
        );
        assert_eq!(
            MonthKey::from_date_range("(Apr 2026)"),
            MonthKey::new(2026, Month::April)
        );
        assert_eq!(
            MonthKey::from_date_range("2nd-Mar 2026"),
            MonthKey::new(2026, Month::March)
        );
        assert_eq!(
            MonthKey::from_date_range("2nd-7th/Apr 2026"),
            MonthKey::new(2026, Month::April)
        );
        assert_eq!(MonthKey::from_date_range("Week 1"), MonthKey::Unknown);
        assert_eq!(MonthKey::from_date_range("February 2026"), MonthKey::Unknown);
        assert_eq!(MonthKey::from_date_range("Feb 20261"), MonthKey::Unknown);
    }

    #[test]
    fn earliest_calendar_month_wins_when_label_spans_months() {
        assert_eq!(
            MonthKey::from_date_range("30th Mar 2026 - 4th Feb 2026"),
            MonthKey::new(2026, Month::February)
        );
    }

    #[test]
    fn month_keys_order_chronologically_with_unknown_last() {
        let mut keys = vec![
            MonthKey::Unknown,
            MonthKey::new(2026, Month::March),
            MonthKey::new(2025, Month::December),
            MonthKey::new(2026, Month::February),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                MonthKey::new(2025, Month::December),
                MonthKey::new(2026, Month::February),
                MonthKey::new(2026, Month::March),
                MonthKey::Unknown,
            ]
        );
    }

    #[test]
    fn month_key_serializes_as_short_label() {
        let key = MonthKey::new(2026, Month::February);
        assert_eq!(key.to_string(), "Feb 2026");
        assert_eq!(key.label(), "February 2026");
        let json = serde_json::to_string(&key).unwrap_or_else(|err| panic!("serialize: {err}"));
        assert_eq!(json, "\"Feb 2026\"");
        let parsed: MonthKey =
            serde_json::from_str(&json).unwrap_or_else(|err| panic!("deserialize: {err}"));
        assert_eq!(parsed, key);
        assert!(serde_json::from_str::<MonthKey>("\"Smarch 2026\"").is_err());
    }

    #[test]
    fn absent_grouping_fields_fall_back_to_sentinels() {
        let mut row = observation();
        assert_eq!(row.module_key(), "Production");
        assert_eq!(row.sub_module_key(), GENERAL_SUB_MODULE);
        row.module = None;
        assert_eq!(row.module_key(), UNKNOWN_MODULE);
        assert_eq!(row.status_label(), "Open");
    }

    #[test]
    fn search_never_matches_text_of_absent_fields() {
        let row = observation();
        assert!(row.matches_search("timeout"));
        assert!(row.matches_search("feb 2026"));
        assert!(!row.matches_search("undefined"));
        assert!(!row.matches_search("none"));
        assert!(!row.matches_search("null"));
    }

    #[test]
    fn text_lines_preserve_embedded_line_breaks() {
        let row = observation();
        assert_eq!(row.text_lines(), vec!["Timeout occurred on save", "Retry shows blank form"]);
    }
}
