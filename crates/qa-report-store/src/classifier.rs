//! Rule-based classification for observations that arrive without a
//! category or impact.

use once_cell::sync::Lazy;
use regex_lite::Regex;

pub const CATEGORY_PERFORMANCE: &str = "Performance";
pub const CATEGORY_LOGIC: &str = "Logical/Business Logic";
pub const CATEGORY_UX: &str = "UX";
pub const CATEGORY_UI: &str = "UI";
pub const CATEGORY_FUNCTIONALITY: &str = "Functionality";

pub const IMPACT_CRITICAL: &str = "S1 – Critical";
pub const IMPACT_MAJOR: &str = "S2 – Major";
pub const IMPACT_MINOR: &str = "S3 – Minor";
pub const IMPACT_LOW: &str = "S4 – Low/Cosmetic";

// Plain substrings.
const PERFORMANCE_TERMS: &[&str] = &[
    "slow",
    "crash",
    "timeout",
    "load time",
    "memory leak",
    "latency",
    "100 users",
    "under load",
];

const LOGIC_PATTERNS: &[&str] = &[
    "logic",
    "calculation",
    "formula",
    "90%",
    "100%",
    "wrong count",
    "chargemix",
    "incorrect picture",
    "planned chargemix",
    "liquid metal wt",
    "decimal place",
    "tapping min",
    "tapping max",
    "min max value",
    "should be between",
];

const UX_PATTERNS: &[&str] = &[
    "should not show",
    "better to",
    "counter-intuitive",
    "confusing",
    "too many click",
    "not similar",
    "format are not",
    "validation.*remark",
    "error remark.*display",
    "clarity",
    "filter before",
    "casting type filter",
    "before grade",
    "repeated grade",
    "fix size",
    "default.*size",
    "expand but do not",
    "no workaround",
    "every validation",
];

const UI_PATTERNS: &[&str] = &[
    "fade",
    "spelling",
    "typo",
    "blurry",
    "misalign",
    "overlap",
    "color",
    "colour",
    "font",
    "icon",
    "logo",
    "pixel",
    "button.*size",
    "box size",
    "format.*date",
    "date.*format",
    "whatsapp",
    "whatapp",
    "spacing",
    "visual",
];

const CRITICAL_PATTERNS: &[&str] =
    &["crash", "cannot login", "app.*crash", "system.*unusable", "blocker"];

const MAJOR_PATTERNS: &[&str] = &[
    "failed to create",
    "failed to",
    "error not a valid",
    "not a valid json",
    "wrong count",
    "incorrect picture",
    "please retry",
    "tapping min max",
    "error occured",
    "error.*remark.*not show",
    "logic recheck",
    "90%",
];

const LOW_PATTERNS: &[&str] = &[
    "fade",
    "spelling",
    "typo",
    "whatapp",
    "whatsapp",
    "2 pixels",
    "cosmetic",
    "blurry",
    "should not show.*-",
    "better to use",
    r#"use "|""#,
    "decimal place",
    "format.*not similar",
    "not similar.*format",
    "box size.*not fix",
    "repeated grade",
];

struct RuleSet {
    logic: Vec<Regex>,
    ux: Vec<Regex>,
    ui: Vec<Regex>,
    critical: Vec<Regex>,
    major: Vec<Regex>,
    low: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|pattern| Regex::new(pattern).ok()).collect()
}

static RULES: Lazy<RuleSet> = Lazy::new(|| RuleSet {
    logic: compile(LOGIC_PATTERNS),
    ux: compile(UX_PATTERNS),
    ui: compile(UI_PATTERNS),
    critical: compile(CRITICAL_PATTERNS),
    major: compile(MAJOR_PATTERNS),
    low: compile(LOW_PATTERNS),
});

fn any_match(rules: &[Regex], text: &str) -> bool {
    rules.iter().any(|rule| rule.is_match(text))
}

/// Category and impact labels inferred from observation text.
#[must_use]
pub fn classify_observation(text: &str) -> (&'static str, &'static str) {
    let lowered = text.to_lowercase();
    let rules = &*RULES;

    let category = if PERFORMANCE_TERMS.iter().any(|term| lowered.contains(term)) {
        CATEGORY_PERFORMANCE
    } else if any_match(&rules.logic, &lowered) {
        CATEGORY_LOGIC
    } else if any_match(&rules.ux, &lowered) {
        CATEGORY_UX
    } else if any_match(&rules.ui, &lowered) {
        CATEGORY_UI
    } else {
        CATEGORY_FUNCTIONALITY
    };

    let impact = if any_match(&rules.critical, &lowered) {
        IMPACT_CRITICAL
    } else if any_match(&rules.major, &lowered) {
        IMPACT_MAJOR
    } else if any_match(&rules.low, &lowered) {
        IMPACT_LOW
    } else {
        IMPACT_MINOR
    };

    (category, impact)
}
