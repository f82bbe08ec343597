use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::record::Observation;

/// Observations sharing one `(module, sub_module)` key.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ObservationGroup<'a> {
    pub module: &'a str,
    pub sub_module: &'a str,
    pub members: Vec<&'a Observation>,
    pub date_range_count: usize,
    pub recurring: bool,
}

impl<'a> ObservationGroup<'a> {
    fn new(module: &'a str, sub_module: &'a str) -> Self {
        Self { module, sub_module, members: Vec::new(), date_range_count: 0, recurring: false }
    }

    /// Distinct date ranges among members, first-encountered order.
    #[must_use]
    pub fn date_ranges(&self) -> Vec<&'a str> {
        let mut ranges: Vec<&'a str> = Vec::new();
        for member in &self.members {
            if !ranges.contains(&member.date_range.as_str()) {
                ranges.push(member.date_range.as_str());
            }
        }
        ranges
    }

    fn seal(mut self) -> Self {
        self.date_range_count = self.date_ranges().len();
        self.recurring = self.date_range_count > 1;
        self
    }

    fn cmp_rank(lhs: &Self, rhs: &Self) -> Ordering {
        rhs.date_range_count
            .cmp(&lhs.date_range_count)
            .then_with(|| rhs.members.len().cmp(&lhs.members.len()))
    }
}

/// Group rows by `(module, sub_module)` and rank the groups for triage.
///
/// Groups spanning more date ranges come first, then larger groups; remaining
/// ties keep first-encountered order.
pub fn group_observations<'a, I>(rows: I) -> Vec<ObservationGroup<'a>>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut index: HashMap<(&'a str, &'a str), usize> = HashMap::new();
    let mut groups: Vec<ObservationGroup<'a>> = Vec::new();
    for row in rows {
        let key = (row.module_key(), row.sub_module_key());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(ObservationGroup::new(key.0, key.1));
            groups.len() - 1
        });
        groups[slot].members.push(row);
    }

    let mut sealed = groups.into_iter().map(ObservationGroup::seal).collect::<Vec<_>>();
    sealed.sort_by(ObservationGroup::cmp_rank);
    sealed
}

/// Totals shown above a grouped review.
#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
pub struct GroupSummary {
    pub group_count: usize,
    pub observation_count: usize,
    pub recurring_count: usize,
}

impl GroupSummary {
    #[must_use]
    pub fn from_groups(groups: &[ObservationGroup<'_>]) -> Self {
        Self {
            group_count: groups.len(),
            observation_count: groups.iter().map(|group| group.members.len()).sum(),
            recurring_count: groups.iter().filter(|group| group.recurring).count(),
        }
    }
}
