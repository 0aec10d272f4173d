use crate::charts::{tooltip_entries, ChartLayout, ChartSpec};
use crate::data::{spawn_load, DataSource, LoadMessage, ProjectionRow};
use crate::tooltip::Tooltip;
use crate::view::ViewMode;
use chrono::{DateTime, Local};
use ratatui::layout::Rect;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

/// Tracks clickable UI regions for mouse interaction
#[derive(Debug, Default, Clone)]
pub struct ClickableRegions {
    /// Tab button areas, left to right
    pub view_tabs: Vec<(Rect, ViewMode)>,
    /// Chart geometry from the last frame
    pub chart: Option<ChartLayout>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Pending,
    Loaded { at: DateTime<Local> },
}

/// All dashboard state. Created at startup, dropped on quit.
pub struct App {
    pub rows: Vec<ProjectionRow>,
    pub view: ViewMode,
    /// Year under the mouse or keyboard cursor. Cleared whenever the view changes.
    pub hovered_year: Option<u32>,
    pub load_status: LoadStatus,
    pub clickable_regions: ClickableRegions,
    source: DataSource,
    load_receiver: Receiver<LoadMessage>,
    // Taken by the one and only load.
    load_sender: Option<Sender<LoadMessage>>,
}

impl App {
    pub fn new(source: DataSource) -> Self {
        let (load_sender, load_receiver) = mpsc::channel();
        App {
            rows: Vec::new(),
            view: ViewMode::default(),
            hovered_year: None,
            load_status: LoadStatus::Pending,
            clickable_regions: ClickableRegions::default(),
            source,
            load_receiver,
            load_sender: Some(load_sender),
        }
    }

    /// Start the background load. Only the first call does anything.
    /// Needs a tokio runtime.
    pub fn start_load(&mut self) -> bool {
        let Some(sender) = self.load_sender.take() else {
            return false;
        };
        info!(source = %self.source, "loading projection");
        spawn_load(self.source.clone(), sender);
        true
    }

    /// Process any pending load results (non-blocking).
    /// Returns true if anything changed.
    pub fn process_load_results(&mut self) -> bool {
        let mut updated = false;
        while let Ok(msg) = self.load_receiver.try_recv() {
            self.apply(msg);
            updated = true;
        }
        updated
    }

    pub fn apply(&mut self, msg: LoadMessage) {
        match msg {
            LoadMessage::Rows(rows) => {
                debug!(rows = rows.len(), "rows received");
                self.rows = rows;
                self.load_status = LoadStatus::Loaded { at: Local::now() };
                if self
                    .hovered_year
                    .is_some_and(|year| !self.years().contains(&year))
                {
                    self.hovered_year = None;
                }
            }
        }
    }

    pub fn select_view(&mut self, view: ViewMode) {
        if self.view == view {
            return;
        }
        debug!(from = ?self.view, to = ?view, "view changed");
        self.view = view;
        self.hovered_year = None;
    }

    pub fn chart_spec(&self) -> &'static ChartSpec {
        ChartSpec::for_mode(self.view)
    }

    /// Years present in the data, in row order, without repeats.
    pub fn years(&self) -> Vec<u32> {
        let mut years: Vec<u32> = Vec::with_capacity(self.rows.len());
        for year in self.rows.iter().filter_map(|r| r.year) {
            if !years.contains(&year) {
                years.push(year);
            }
        }
        years
    }

    pub fn clear_hover(&mut self) {
        self.hovered_year = None;
    }

    pub fn hover_next(&mut self) {
        let years = self.years();
        let position = self
            .hovered_year
            .and_then(|year| years.iter().position(|y| *y == year));
        self.hovered_year = match position {
            Some(i) => years.get((i + 1).min(years.len() - 1)).copied(),
            None => years.first().copied(),
        };
    }

    pub fn hover_prev(&mut self) {
        let years = self.years();
        let position = self
            .hovered_year
            .and_then(|year| years.iter().position(|y| *y == year));
        self.hovered_year = match position {
            Some(i) => years.get(i.saturating_sub(1)).copied(),
            None => years.last().copied(),
        };
    }

    /// Hover from a mouse position; outside the plot clears it.
    pub fn hover_at(&mut self, column: u16, row: u16) {
        let years = self.years();
        self.hovered_year = self.clickable_regions.chart.and_then(|layout| {
            let plot = layout.plot;
            if row < plot.y || row >= plot.y + plot.height {
                return None;
            }
            crate::charts::year_at_column(&layout.bounds, plot, column, &years)
        });
    }

    pub fn tooltip(&self) -> Option<Tooltip> {
        let year = self.hovered_year?;
        Tooltip::build(Some(year), tooltip_entries(self.chart_spec(), &self.rows, year))
    }

    pub fn status_text(&self) -> String {
        match &self.load_status {
            LoadStatus::Pending => "Loading projection...".to_string(),
            LoadStatus::Loaded { at } => {
                format!("{} years  |  loaded {}", self.rows.len(), at.format("%H:%M:%S"))
            }
        }
    }
}
