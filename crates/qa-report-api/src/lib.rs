//! Dashboard facade shared by the HTTP service and the `qar` CLI.

mod prompt;
mod view;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use qa_report_core::{RowStore, Selection, SelectionError, SelectionEvent};
use qa_report_store::{load_path, ImportStats, LoadedDataset};
use serde::{Deserialize, Serialize};

pub use prompt::{build_insight_prompt, period_prompts, selection_period, PeriodPrompt};
pub use view::{
    result_label, Badge, ContentPanel, ContentTab, DashboardScreen, DashboardView, GroupView,
    MonthBody, MonthPanel, MonthTab, ObservationRow, ObservationsPanel, ReviewItem, ReviewPanel,
    SidebarItem, SidebarSectionView, TableBody, DATA_NOT_LOADED_TITLE, NO_DATA_MESSAGE,
    NO_MATCHES_MESSAGE, OVERALL_ALL_HEADING, SELECT_DATE_RANGE_MESSAGE,
};

pub const API_CONTRACT_VERSION: &str = "api.v1";

const NOT_LOADED_HINT: &str =
    "Start with --data <path> pointing at data.json, data.js, or an .xlsx export, then retry.";

/// Whether a row store is available at all.
#[derive(Debug, Clone)]
pub enum DataSource {
    Loaded(Arc<LoadedDataset>),
    NotLoaded { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("data not loaded: {0}")]
    DataNotLoaded(String),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ViewRequest {
    #[serde(default)]
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionRequest {
    #[serde(default)]
    pub selection: Selection,
    pub event: SelectionEvent,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransitionResult {
    pub selection: Selection,
    pub screen: DashboardScreen,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InsightPrompt {
    pub period: String,
    pub observation_count: usize,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DataStatus {
    pub loaded: bool,
    pub row_count: usize,
    pub snapshot_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    source: DataSource,
}

impl Dashboard {
    #[must_use]
    pub fn new(source: DataSource) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn from_dataset(dataset: LoadedDataset) -> Self {
        Self::new(DataSource::Loaded(Arc::new(dataset)))
    }

    /// Load `path` when given. A missing path or a failed load leaves the
    /// dashboard in the not-loaded state instead of failing startup.
    #[must_use]
    pub fn open(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::warn!("no data file configured");
            return Self::new(DataSource::NotLoaded {
                reason: "no data file configured".to_string(),
            });
        };
        match load_dataset(path) {
            Ok(dataset) => Self::from_dataset(dataset),
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::warn!(error = %reason, "observation data not loaded");
                Self::new(DataSource::NotLoaded { reason })
            }
        }
    }

    #[must_use]
    pub fn dataset(&self) -> Option<&LoadedDataset> {
        match &self.source {
            DataSource::Loaded(dataset) => Some(dataset.as_ref()),
            DataSource::NotLoaded { .. } => None,
        }
    }

    /// # Errors
    /// Returns [`DashboardError::DataNotLoaded`] when no row store is available.
    pub fn store(&self) -> Result<&RowStore, DashboardError> {
        match &self.source {
            DataSource::Loaded(dataset) => Ok(&dataset.store),
            DataSource::NotLoaded { reason } => Err(DashboardError::DataNotLoaded(reason.clone())),
        }
    }

    #[must_use]
    pub fn import_stats(&self) -> Option<&ImportStats> {
        self.dataset().map(|dataset| &dataset.stats)
    }

    #[must_use]
    pub fn data_status(&self) -> DataStatus {
        match &self.source {
            DataSource::Loaded(dataset) => DataStatus {
                loaded: true,
                row_count: dataset.store.len(),
                snapshot_id: Some(dataset.snapshot_id.clone()),
                reason: None,
            },
            DataSource::NotLoaded { reason } => DataStatus {
                loaded: false,
                row_count: 0,
                snapshot_id: None,
                reason: Some(reason.clone()),
            },
        }
    }

    /// Render the whole dashboard for `selection`.
    ///
    /// Every call recomputes from the full row store.
    #[must_use]
    pub fn render(&self, selection: &Selection) -> DashboardScreen {
        match &self.source {
            DataSource::Loaded(dataset) => DashboardScreen::Ready(view::render_view(
                &dataset.store,
                selection,
                &dataset.snapshot_id,
            )),
            DataSource::NotLoaded { reason } => DashboardScreen::DataNotLoaded {
                title: DATA_NOT_LOADED_TITLE.to_string(),
                message: format!("{NOT_LOADED_HINT} ({reason})"),
            },
        }
    }

    /// Validate `selection`, then render it.
    ///
    /// # Errors
    /// Returns a [`DashboardError::Selection`] when the selection does not fit
    /// the loaded data. A missing row store is not an error here: it renders
    /// the not-loaded screen.
    pub fn view(&self, request: &ViewRequest) -> Result<DashboardScreen, DashboardError> {
        match self.store() {
            Ok(store) => Ok(self.render(&request.selection.validate(store)?)),
            Err(_) => Ok(self.render(&request.selection)),
        }
    }

    /// Apply one event and render the resulting selection.
    ///
    /// # Errors
    /// Returns an error when no data is loaded or the event is rejected. The
    /// caller's selection is unchanged either way.
    pub fn transition(
        &self,
        request: &TransitionRequest,
    ) -> Result<TransitionResult, DashboardError> {
        let store = self.store()?;
        let selection = request.selection.apply(&request.event, store)?;
        let screen = self.render(&selection);
        Ok(TransitionResult { selection, screen })
    }

    /// Prompt covering the rows visible under `selection`.
    ///
    /// # Errors
    /// Returns an error when no data is loaded or the selection is invalid.
    pub fn insight_prompt(&self, selection: &Selection) -> Result<InsightPrompt, DashboardError> {
        let store = self.store()?;
        let selection = selection.validate(store)?;
        let rows = store.filtered(&selection);
        let period = selection_period(&selection);
        Ok(InsightPrompt {
            prompt: build_insight_prompt(&period, &rows),
            observation_count: rows.len(),
            period,
        })
    }

    /// # Errors
    /// Returns [`DashboardError::DataNotLoaded`] when no row store is available.
    pub fn period_prompts(&self) -> Result<Vec<PeriodPrompt>, DashboardError> {
        Ok(period_prompts(self.store()?.rows()))
    }
}

fn load_dataset(path: &Path) -> Result<LoadedDataset> {
    load_path(path)
        .with_context(|| format!("failed to load observation data from {}", path.display()))
}
