use serde::{Deserialize, Serialize};

/// Category labels offered as filter facets, in display order.
pub const CATEGORY_FACETS: [&str; 5] =
    ["UI", "UX", "Functionality", "Logical/Business Logic", "Performance"];

const MODULE_ICONS: [(&str, &str); 5] = [
    ("production", "factory"),
    ("heat", "local_fire_department"),
    ("inventory", "inventory_2"),
    ("purchase", "shopping_cart"),
    ("quality", "verified"),
];
const DEFAULT_MODULE_ICON: &str = "widgets";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CategoryClass {
    Ui,
    Ux,
    Functionality,
    Logic,
    Performance,
}

impl CategoryClass {
    /// Unrecognized or absent categories fall back to `Functionality`.
    #[must_use]
    pub fn classify(category: Option<&str>) -> Self {
        let value = category.unwrap_or_default().to_lowercase();
        if value.contains("ux") {
            Self::Ux
        } else if value.contains("ui") {
            Self::Ui
        } else if value.contains("logical") || value.contains("business") {
            Self::Logic
        } else if value.contains("performance") {
            Self::Performance
        } else {
            Self::Functionality
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Ux => "ux",
            Self::Functionality => "functionality",
            Self::Logic => "logic",
            Self::Performance => "performance",
        }
    }
}

/// Severity bucket. `S1` is the most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ImpactClass {
    S1,
    S2,
    S3,
    S4,
}

impl ImpactClass {
    pub const ALL: [Self; 4] = [Self::S1, Self::S2, Self::S3, Self::S4];

    /// Classify by prefix. Absent or unrecognized impacts are the lowest severity.
    #[must_use]
    pub fn classify(impact: Option<&str>) -> Self {
        let value = impact.unwrap_or_default().trim_start().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|class| value.starts_with(&class.key().to_lowercase()))
            .unwrap_or(Self::S4)
    }

    #[must_use]
    pub fn parse_key(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.key().eq_ignore_ascii_case(value.trim()))
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
            Self::S4 => "S4",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::S1 => "S1 – Critical",
            Self::S2 => "S2 – Major",
            Self::S3 => "S3 – Minor",
            Self::S4 => "S4 – Low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StatusClass {
    Open,
    InReview,
    Fixed,
    Unrecognized,
}

impl StatusClass {
    /// Absent status means `Open`; anything outside the known vocabulary is
    /// kept apart from `Open` as `Unrecognized`.
    #[must_use]
    pub fn classify(status: Option<&str>) -> Self {
        let Some(raw) = status.filter(|value| !value.trim().is_empty()) else {
            return Self::Open;
        };
        let normalized = raw
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match normalized.as_str() {
            "open" | "new" | "reopened" => Self::Open,
            "in review" | "review" | "in progress" => Self::InReview,
            "fixed" | "resolved" | "closed" | "done" => Self::Fixed,
            _ => Self::Unrecognized,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InReview => "in-review",
            Self::Fixed => "fixed",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStyle {
    Production,
    Heat,
    Default,
}

impl ModuleStyle {
    #[must_use]
    pub fn classify(module: Option<&str>) -> Self {
        let value = module.unwrap_or_default().to_lowercase();
        if value.contains("production") {
            Self::Production
        } else if value.contains("heat") {
            Self::Heat
        } else {
            Self::Default
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Heat => "heat",
            Self::Default => "default",
        }
    }
}

/// Material icon name for a module, matched by substring.
#[must_use]
pub fn module_icon(module: &str) -> &'static str {
    let value = module.to_lowercase();
    MODULE_ICONS
        .iter()
        .find(|(needle, _)| value.contains(needle))
        .map_or(DEFAULT_MODULE_ICON, |(_, icon)| *icon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_classification_falls_back_to_functionality() {
        assert_eq!(CategoryClass::classify(Some("UI")), CategoryClass::Ui);
        assert_eq!(CategoryClass::classify(Some("UX")), CategoryClass::Ux);
        assert_eq!(CategoryClass::classify(Some("Logical/Business Logic")), CategoryClass::Logic);
        assert_eq!(CategoryClass::classify(Some("Performance")), CategoryClass::Performance);
        assert_eq!(CategoryClass::classify(Some("Functionality")), CategoryClass::Functionality);
        assert_eq!(CategoryClass::classify(Some("Security")), CategoryClass::Functionality);
        assert_eq!(CategoryClass::classify(None), CategoryClass::Functionality);
    }

    #[test]
    fn impact_classification_uses_prefix_and_defaults_to_lowest() {
        assert_eq!(ImpactClass::classify(Some("S1 – Critical")), ImpactClass::S1);
        assert_eq!(ImpactClass::classify(Some("s2 – major")), ImpactClass::S2);
        assert_eq!(ImpactClass::classify(Some("S3")), ImpactClass::S3);
        assert_eq!(ImpactClass::classify(Some("Blocker")), ImpactClass::S4);
        assert_eq!(ImpactClass::classify(None), ImpactClass::S4);
        assert_eq!(ImpactClass::parse_key("s2"), Some(ImpactClass::S2));
        assert_eq!(ImpactClass::parse_key("S5"), None);
    }

    #[test]
    fn status_unrecognized_is_distinct_from_open() {
        assert_eq!(StatusClass::classify(None), StatusClass::Open);
        assert_eq!(StatusClass::classify(Some("  ")), StatusClass::Open);
        assert_eq!(StatusClass::classify(Some("Open")), StatusClass::Open);
        assert_eq!(StatusClass::classify(Some("In-Review")), StatusClass::InReview);
        assert_eq!(StatusClass::classify(Some("in review")), StatusClass::InReview);
        assert_eq!(StatusClass::classify(Some("FIXED")), StatusClass::Fixed);
        assert_eq!(StatusClass::classify(Some("Deferred")), StatusClass::Unrecognized);
    }

    #[test]
    fn module_styles_and_icons_match_by_substring() {
        assert_eq!(ModuleStyle::classify(Some("Production Planning")), ModuleStyle::Production);
        assert_eq!(ModuleStyle::classify(Some("Heat")), ModuleStyle::Heat);
        assert_eq!(ModuleStyle::classify(None), ModuleStyle::Default);
        assert_eq!(module_icon("Quality Control"), "verified");
        assert_eq!(module_icon("Dispatch"), "widgets");
    }
}
