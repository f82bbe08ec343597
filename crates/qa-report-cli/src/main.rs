use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use qa_report_api::{Dashboard, DashboardScreen, ViewRequest, API_CONTRACT_VERSION};
use qa_report_core::{
    group_observations, GroupSummary, MonthSelection, Selection, SelectionEvent, ViewTab,
};
use qa_report_insights::{GeminiClient, DEFAULT_GEMINI_ENDPOINT};
use qa_report_store::{load_path, write_json, LoadedDataset};
use serde::Serialize;
use serde_json::{Map, Value};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const PREVIEW_ROWS: usize = 10;
const PREVIEW_TEXT_CHARS: usize = 50;

#[derive(Debug, Parser)]
#[command(name = "qar")]
#[command(about = "QA observation report CLI")]
struct Cli {
    /// Observation data: `.json`, `.js`, or a spreadsheet export.
    #[arg(long, global = true, env = "QA_REPORT_DATA")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a report, fill in missing classifications, and write normalized JSON.
    Convert(ConvertArgs),
    Months,
    View(SelectionArgs),
    Groups(SelectionArgs),
    Insights {
        #[command(subcommand)]
        command: Box<InsightsCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum InsightsCommand {
    Prompt(SelectionArgs),
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[arg(long = "in")]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, default_value = "insights.json")]
    out: PathBuf,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_GEMINI_ENDPOINT)]
    gemini_endpoint: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TabArg {
    Observations,
    OverallMonth,
    OverallAll,
}

impl From<TabArg> for ViewTab {
    fn from(value: TabArg) -> Self {
        match value {
            TabArg::Observations => Self::Observations,
            TabArg::OverallMonth => Self::OverallMonth,
            TabArg::OverallAll => Self::OverallAll,
        }
    }
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// `all` or a month key such as `Mar 2026`.
    #[arg(long, default_value = "all", value_parser = parse_month)]
    month: MonthSelection,
    #[arg(long)]
    date_range: Option<String>,
    #[arg(long)]
    module: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// `S1`..`S4`, case-insensitive.
    #[arg(long)]
    impact: Option<String>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_enum)]
    tab: Option<TabArg>,
}

impl SelectionArgs {
    /// Events replayed from the default selection, coarsest first so that no
    /// later event is reset by an earlier one.
    fn events(&self) -> Vec<SelectionEvent> {
        let mut events = vec![SelectionEvent::SelectMonth(self.month)];
        if let Some(date_range) = &self.date_range {
            events.push(SelectionEvent::SelectDateRange(date_range.clone()));
        }
        if self.module.is_some() {
            events.push(SelectionEvent::SelectModule(self.module.clone()));
        }
        if self.category.is_some() {
            events.push(SelectionEvent::SelectCategory(self.category.clone()));
        }
        if self.impact.is_some() {
            events.push(SelectionEvent::SelectImpact(self.impact.clone()));
        }
        if let Some(search) = &self.search {
            events.push(SelectionEvent::Search(search.clone()));
        }
        if let Some(tab) = self.tab {
            events.push(SelectionEvent::SwitchTab(tab.into()));
        }
        events
    }

    fn selection(&self, dataset: &LoadedDataset) -> Result<Selection> {
        self.events().iter().try_fold(Selection::default(), |selection, event| {
            selection
                .apply(event, &dataset.store)
                .with_context(|| format!("invalid selection flags ({event:?})"))
        })
    }
}

fn parse_month(value: &str) -> Result<MonthSelection, String> {
    MonthSelection::parse(value)
        .ok_or_else(|| format!("expected `all` or a month like `Mar 2026`, got `{value}`"))
}

#[derive(Debug, Serialize)]
struct PreviewRow {
    sequence_number: u32,
    category: Option<String>,
    impact: Option<String>,
    observation: String,
}

#[derive(Debug, Serialize)]
struct GroupLine<'a> {
    module: &'a str,
    sub_module: &'a str,
    observation_count: usize,
    date_ranges: Vec<&'a str>,
    recurring: bool,
    sequence_numbers: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PeriodOutcome {
    Text { month: String, date_range: String, text: String },
    Failed { month: String, date_range: String, error: String },
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Convert(args) => run_convert(&args),
        Command::Months => run_months(&open_dataset(cli.data.as_deref())?),
        Command::View(args) => run_view(&args, open_dataset(cli.data.as_deref())?),
        Command::Groups(args) => run_groups(&args, &open_dataset(cli.data.as_deref())?),
        Command::Insights { command } => {
            let dataset = open_dataset(cli.data.as_deref())?;
            run_insights(*command, dataset)
        }
    }
}

fn open_dataset(path: Option<&Path>) -> Result<LoadedDataset> {
    let path = path.ok_or_else(|| anyhow!("--data <path> (or QA_REPORT_DATA) is required"))?;
    load_path(path)
        .with_context(|| format!("failed to load observation data from {}", path.display()))
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let dataset = open_dataset(Some(&args.input))?;
    write_json(&args.out, dataset.store.rows())
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    tracing::info!(
        rows = dataset.stats.row_count,
        out = %args.out.display(),
        "converted report data"
    );

    let preview = dataset
        .store
        .rows()
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| PreviewRow {
            sequence_number: row.sequence_number,
            category: row.category.clone(),
            impact: row.impact.clone(),
            observation: row.observation_text.chars().take(PREVIEW_TEXT_CHARS).collect(),
        })
        .collect::<Vec<_>>();

    emit_json(serde_json::json!({
        "input": args.input,
        "output": args.out,
        "row_count": dataset.stats.row_count,
        "auto_classified": dataset.stats.auto_classified,
        "skipped_blank_rows": dataset.stats.skipped_blank_rows,
        "months": dataset.stats.months,
        "snapshot_id": dataset.snapshot_id,
        "preview": preview
    }))
}

fn run_months(dataset: &LoadedDataset) -> Result<()> {
    let months = dataset.store.months();
    let counts = months
        .iter()
        .map(|month| {
            let count =
                dataset.store.rows().iter().filter(|row| row.period_month == *month).count();
            serde_json::json!({
                "key": month,
                "label": month.label(),
                "count": count
            })
        })
        .collect::<Vec<_>>();
    emit_json(serde_json::json!({
        "snapshot_id": dataset.snapshot_id,
        "row_count": dataset.store.len(),
        "months": counts
    }))
}

fn run_view(args: &SelectionArgs, dataset: LoadedDataset) -> Result<()> {
    let selection = args.selection(&dataset)?;
    let dashboard = Dashboard::from_dataset(dataset);
    let screen = dashboard.view(&ViewRequest { selection })?;
    if let DashboardScreen::Ready(view) = &screen {
        tracing::debug!(tabs = view.month_tabs.len(), "rendered dashboard");
    }
    emit_json(serde_json::json!({
        "api_contract_version": API_CONTRACT_VERSION,
        "screen": screen
    }))
}

fn run_groups(args: &SelectionArgs, dataset: &LoadedDataset) -> Result<()> {
    let selection = args.selection(dataset)?;
    let rows = dataset.store.filtered(&selection);
    let groups = group_observations(rows.iter().copied());
    let summary = GroupSummary::from_groups(&groups);
    let lines = groups
        .iter()
        .map(|group| GroupLine {
            module: group.module,
            sub_module: group.sub_module,
            observation_count: group.members.len(),
            date_ranges: group.date_ranges(),
            recurring: group.recurring,
            sequence_numbers: group.members.iter().map(|row| row.sequence_number).collect(),
        })
        .collect::<Vec<_>>();
    emit_json(serde_json::json!({
        "selection": selection,
        "summary": summary,
        "groups": lines
    }))
}

fn run_insights(command: InsightsCommand, dataset: LoadedDataset) -> Result<()> {
    match command {
        InsightsCommand::Prompt(args) => {
            let selection = args.selection(&dataset)?;
            let dashboard = Dashboard::from_dataset(dataset);
            let prompt = dashboard.insight_prompt(&selection)?;
            emit_json(serde_json::to_value(prompt)?)
        }
        InsightsCommand::Generate(args) => run_insights_generate(&args, dataset),
    }
}

fn run_insights_generate(args: &GenerateArgs, dataset: LoadedDataset) -> Result<()> {
    let api_key = args
        .gemini_api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("--gemini-api-key (or GEMINI_API_KEY) is required"))?;
    let client = GeminiClient::with_endpoint(api_key, args.gemini_endpoint.as_str());
    let prompts = Dashboard::from_dataset(dataset).period_prompts()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut periods = Map::new();
    let mut failed = 0_usize;
    for period in prompts {
        let month = period.month.to_string();
        let outcome = match runtime.block_on(client.generate(&period.prompt)) {
            Ok(text) => {
                tracing::info!(period = %period.period, "insight generated");
                PeriodOutcome::Text { month, date_range: period.date_range, text }
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(
                    period = %period.period,
                    status = err.status_code(),
                    "insight failed"
                );
                PeriodOutcome::Failed {
                    month,
                    date_range: period.date_range,
                    error: err.to_string(),
                }
            }
        };
        periods.insert(period.period, serde_json::to_value(outcome)?);
    }

    let generated_at = OffsetDateTime::now_utc()
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .context("failed to format timestamp")?;
    let period_names = periods.keys().cloned().collect::<Vec<_>>();
    let document = serde_json::json!({
        "generated_at": generated_at,
        "periods": periods
    });
    fs::write(&args.out, serde_json::to_string_pretty(&document)?)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    emit_json(serde_json::json!({
        "output": args.out,
        "generated_at": generated_at,
        "periods": period_names,
        "failed": failed
    }))
}
