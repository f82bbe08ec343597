use std::fmt::Write as _;

use qa_report_core::{MonthKey, MonthSelection, Observation, Selection};
use serde::Serialize;

/// Prompt for one reporting period, ready to send to the insight endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PeriodPrompt {
    pub month: MonthKey,
    pub date_range: String,
    pub period: String,
    pub prompt: String,
}

/// Period name used in a prompt built from the current selection.
#[must_use]
pub fn selection_period(selection: &Selection) -> String {
    match (&selection.active_date_range, selection.active_month) {
        (Some(date_range), _) => date_range.clone(),
        (None, MonthSelection::Month(month)) => month.label(),
        (None, MonthSelection::All) => "all months".to_string(),
    }
}

/// Build the analyst prompt for `rows`, grouped by module in first-seen order.
#[must_use]
pub fn build_insight_prompt(period: &str, rows: &[&Observation]) -> String {
    let mut modules: Vec<(&str, Vec<&Observation>)> = Vec::new();
    for row in rows.iter().copied() {
        let module = row.module_key();
        match modules.iter_mut().find(|(name, _)| *name == module) {
            Some((_, members)) => members.push(row),
            None => modules.push((module, vec![row])),
        }
    }

    let mut prompt = format!(
        "You are a senior QA analyst. Below are software testing observations grouped by \
         module for the period \"{period}\". For each module, write:\n\
         1. A short summary paragraph of the issues found.\n\
         2. Specific, actionable fix suggestions for the development team.\n\n\
         Keep the tone professional but concise. Format with module names as bold headings \
         (**Module Name**).\n\n"
    );
    for (module, members) in modules {
        let _ = writeln!(prompt, "**Module: {module}**");
        for row in members {
            let _ = writeln!(
                prompt,
                "- [{}] {} (Status: {})",
                row.sub_module.as_deref().unwrap_or_default(),
                row.observation_text,
                row.status_label()
            );
        }
        prompt.push('\n');
    }
    prompt
}

/// One prompt per `(month, date range)` period, in first-seen order.
#[must_use]
pub fn period_prompts(rows: &[Observation]) -> Vec<PeriodPrompt> {
    let mut periods: Vec<(MonthKey, &str, Vec<&Observation>)> = Vec::new();
    for row in rows {
        let key = (row.period_month, row.date_range.as_str());
        match periods.iter_mut().find(|(month, range, _)| (*month, *range) == key) {
            Some((_, _, members)) => members.push(row),
            None => periods.push((key.0, key.1, vec![row])),
        }
    }

    periods
        .into_iter()
        .map(|(month, date_range, members)| {
            let period =
                if date_range.is_empty() { month.to_string() } else { date_range.to_string() };
            PeriodPrompt {
                month,
                date_range: date_range.to_string(),
                prompt: build_insight_prompt(&period, &members),
                period,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        date_range: &str,
        module: Option<&str>,
        sub_module: Option<&str>,
        text: &str,
    ) -> Observation {
        Observation {
            sequence_number: 1,
            date_range: date_range.to_string(),
            period_month: MonthKey::from_date_range(date_range),
            module: module.map(str::to_string),
            sub_module: sub_module.map(str::to_string),
            observation_text: text.to_string(),
            category: None,
            impact: None,
            link: None,
            status: None,
        }
    }

    #[test]
    fn prompt_lists_modules_as_bold_headings_in_first_seen_order() {
        let mut fixed =
            row("Week 1 Mar 2026", Some("Heat"), Some("Casting"), "Casting list freezes");
        fixed.status = Some("Fixed".to_string());
        let rows = [
            row("Week 1 Mar 2026", Some("Production"), Some("Scheduling"), "Timeout on save"),
            fixed,
            row("Week 1 Mar 2026", Some("Production"), None, "Blank screen"),
        ];
        let refs = rows.iter().collect::<Vec<_>>();
        let prompt = build_insight_prompt("Week 1 Mar 2026", &refs);

        assert!(prompt.starts_with("You are a senior QA analyst."));
        assert!(prompt.contains("for the period \"Week 1 Mar 2026\""));
        let production = prompt.find("**Module: Production**").unwrap_or(usize::MAX);
        let heat = prompt.find("**Module: Heat**").unwrap_or(usize::MAX);
        assert!(production < heat && heat != usize::MAX);
        assert!(prompt.contains("- [Scheduling] Timeout on save (Status: Open)\n"));
        assert!(prompt.contains("- [] Blank screen (Status: Open)\n"));
        assert!(prompt.contains("- [Casting] Casting list freezes (Status: Fixed)\n"));
    }

    #[test]
    fn period_prompts_split_by_month_and_date_range() {
        let rows = vec![
            row("Week 1 Mar 2026", Some("Production"), None, "a"),
            row("Week 2 Mar 2026", Some("Production"), None, "b"),
            row("Week 1 Mar 2026", Some("Heat"), None, "c"),
            row("", None, None, "d"),
        ];
        let prompts = period_prompts(&rows);
        let periods = prompts.iter().map(|prompt| prompt.period.as_str()).collect::<Vec<_>>();
        assert_eq!(periods, vec!["Week 1 Mar 2026", "Week 2 Mar 2026", "Unknown"]);
        assert!(prompts[0].prompt.contains("**Module: Heat**"));
        assert!(prompts[2].prompt.contains("**Module: Unknown**"));
    }

    #[test]
    fn selection_period_prefers_date_range_then_month() {
        let mut selection = Selection::default();
        assert_eq!(selection_period(&selection), "all months");
        selection.active_month =
            MonthSelection::Month(MonthKey::from_date_range("Week 1 Mar 2026"));
        assert_eq!(selection_period(&selection), "March 2026");
        selection.active_date_range = Some("Week 1 Mar 2026".to_string());
        assert_eq!(selection_period(&selection), "Week 1 Mar 2026");
    }
}
