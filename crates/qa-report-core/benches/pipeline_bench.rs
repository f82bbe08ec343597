use criterion::{criterion_group, criterion_main, Criterion};
use qa_report_core::{
    group_observations, GroupSummary, MonthKey, MonthSelection, Observation, RowStore, Selection,
};
use time::Month;

const MODULES: [&str; 5] = ["Production", "Heat", "Inventory", "Purchase", "Quality"];
const SUB_MODULES: [&str; 4] = ["Scheduling", "Casting", "Stores", "Lab"];
const IMPACTS: [&str; 4] = ["S1 – Critical", "S2 – Major", "S3 – Minor", "S4 – Low/Cosmetic"];

fn mk_observation(index: usize) -> Observation {
    let week = index % 4 + 1;
    let month = if index % 2 == 0 { "Mar" } else { "Apr" };
    let date_range = format!("Week {week} {month} 2026");
    Observation {
        sequence_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
        period_month: MonthKey::from_date_range(&date_range),
        date_range,
        module: Some(MODULES[index % MODULES.len()].to_string()),
        sub_module: Some(SUB_MODULES[index % SUB_MODULES.len()].to_string()),
        observation_text: format!("Benchmark observation {index}: save action times out"),
        category: Some("Functionality".to_string()),
        impact: Some(IMPACTS[index % IMPACTS.len()].to_string()),
        link: None,
        status: None,
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let store = RowStore::new((0..5_000).map(mk_observation).collect());
    let overall = Selection::default();
    let searched = Selection {
        active_month: MonthSelection::Month(MonthKey::new(2026, Month::March)),
        active_impact: Some("S2".to_string()),
        search_query: "times out".to_string(),
        active_tab: qa_report_core::ViewTab::Observations,
        ..Selection::default()
    };

    c.bench_function("filter_and_group_overall", |b| {
        b.iter(|| {
            let groups = group_observations(store.filtered(&overall));
            GroupSummary::from_groups(&groups)
        });
    });

    c.bench_function("filter_month_impact_search", |b| {
        b.iter(|| store.filtered(&searched).len());
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
