use crate::data::{ProjectionRow, SeriesKey};
use crate::format::ValueFormat;
use crate::tooltip::TooltipEntry;
use crate::view::ViewMode;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition},
    Frame,
};

const ORANGE: Color = Color::Rgb(0xff, 0x73, 0x00);
const GREEN: Color = Color::Rgb(0x82, 0xca, 0x9d);
const PURPLE: Color = Color::Rgb(0x88, 0x84, 0xd8);

/// Horizontal spacing between paired bars, in years.
const BAR_SPREAD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
}

/// One plotted line or bar set, bound to a single column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSpec {
    pub key: SeriesKey,
    pub label: &'static str,
    pub color: Color,
    pub format: ValueFormat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSpec {
    pub mode: ViewMode,
    pub title: &'static str,
    pub kind: ChartKind,
    pub y_format: ValueFormat,
    pub series: &'static [SeriesSpec],
}

static PORTFOLIO_SERIES: [SeriesSpec; 3] = [
    SeriesSpec {
        key: SeriesKey::PortfolioSellingStrategy,
        label: "Selling Strategy",
        color: ORANGE,
        format: ValueFormat::Currency,
    },
    SeriesSpec {
        key: SeriesKey::PortfolioMarginNoRepay,
        label: "Margin - No Repayment",
        color: GREEN,
        format: ValueFormat::Currency,
    },
    SeriesSpec {
        key: SeriesKey::PortfolioMarginOscillating,
        label: "Margin - Oscillating Repayment",
        color: PURPLE,
        format: ValueFormat::Currency,
    },
];

static MARGIN_SERIES: [SeriesSpec; 2] = [
    SeriesSpec {
        key: SeriesKey::MarginBalanceNoRepay,
        label: "No Repayment",
        color: GREEN,
        format: ValueFormat::Currency,
    },
    SeriesSpec {
        key: SeriesKey::MarginBalanceOscillating,
        label: "Oscillating Repayment",
        color: PURPLE,
        format: ValueFormat::Currency,
    },
];

static MARKET_SERIES: [SeriesSpec; 2] = [
    SeriesSpec {
        key: SeriesKey::MarketReturnPercent,
        label: "Market Return",
        color: PURPLE,
        format: ValueFormat::Percent,
    },
    SeriesSpec {
        key: SeriesKey::RandomRepaymentPercent,
        label: "Repayment Rate",
        color: GREEN,
        format: ValueFormat::Percent,
    },
];

static PORTFOLIO_CHART: ChartSpec = ChartSpec {
    mode: ViewMode::Portfolio,
    title: " Portfolio Value by Strategy ",
    kind: ChartKind::Line,
    y_format: ValueFormat::Currency,
    series: &PORTFOLIO_SERIES,
};

static MARGIN_CHART: ChartSpec = ChartSpec {
    mode: ViewMode::Margin,
    title: " Margin Loan Balance ",
    kind: ChartKind::Line,
    y_format: ValueFormat::Currency,
    series: &MARGIN_SERIES,
};

static MARKET_CHART: ChartSpec = ChartSpec {
    mode: ViewMode::Market,
    title: " Market Return and Repayment Rate ",
    kind: ChartKind::Bar,
    y_format: ValueFormat::Percent,
    series: &MARKET_SERIES,
};

impl ChartSpec {
    pub fn for_mode(mode: ViewMode) -> &'static ChartSpec {
        match mode {
            ViewMode::Portfolio => &PORTFOLIO_CHART,
            ViewMode::Margin => &MARGIN_CHART,
            ViewMode::Market => &MARKET_CHART,
        }
    }
}

/// `(year, value)` points per series, skipping rows missing either.
pub fn series_points(spec: &ChartSpec, rows: &[ProjectionRow]) -> Vec<Vec<(f64, f64)>> {
    spec.series
        .iter()
        .map(|series| {
            rows.iter()
                .filter_map(|row| Some((f64::from(row.year?), series.key.value(row)?)))
                .collect()
        })
        .collect()
}

/// Values of every series at one year, in legend order.
pub fn tooltip_entries(spec: &ChartSpec, rows: &[ProjectionRow], year: u32) -> Vec<TooltipEntry> {
    let Some(row) = rows.iter().find(|r| r.year == Some(year)) else {
        return Vec::new();
    };

    spec.series
        .iter()
        .map(|series| TooltipEntry {
            label: series.label,
            value: series.key.value(row),
            color: series.color,
            format: series.format,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartBounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl ChartBounds {
    pub fn compute(kind: ChartKind, points: &[Vec<(f64, f64)>]) -> Self {
        let all = || points.iter().flatten();

        let (x_min, x_max) = min_max(all().map(|&(x, _)| x)).unwrap_or((0.0, 1.0));
        let x = match kind {
            ChartKind::Bar => [x_min - 0.5, x_max + 0.5],
            ChartKind::Line if x_min == x_max => [x_min - 0.5, x_max + 0.5],
            ChartKind::Line => [x_min, x_max],
        };

        let (mut y_min, mut y_max) = min_max(all().map(|&(_, y)| y)).unwrap_or((0.0, 1.0));
        if kind == ChartKind::Bar {
            y_min = y_min.min(0.0);
            y_max = y_max.max(0.0);
        }

        let span = if y_max > y_min {
            y_max - y_min
        } else {
            y_max.abs().max(1.0)
        };
        let pad = span * 0.05;
        let lower = if y_min >= 0.0 {
            (y_min - pad).max(0.0)
        } else {
            y_min - pad
        };

        ChartBounds {
            x,
            y: [lower, y_max + pad],
        }
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Bottom, middle and top of the y axis, in the chart's value format.
pub fn y_labels(bounds: &ChartBounds, format: ValueFormat) -> Vec<String> {
    let [lo, hi] = bounds.y;
    vec![format.apply(lo), format.apply((lo + hi) / 2.0), format.apply(hi)]
}

/// First, middle and last year plotted.
pub fn x_labels(points: &[Vec<(f64, f64)>]) -> Vec<String> {
    match min_max(points.iter().flatten().map(|&(x, _)| x)) {
        Some((first, last)) if first < last => vec![
            format!("{:.0}", first),
            format!("{:.0}", ((first + last) / 2.0).floor()),
            format!("{:.0}", last),
        ],
        Some((only, _)) => vec![format!("{:.0}", only)],
        None => Vec::new(),
    }
}

/// Where the data is drawn inside `area`, once the border and axis labels
/// are taken out. Used for mouse hit-testing.
pub fn plot_area(area: Rect, y_labels: &[String]) -> Rect {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let label_width = y_labels.iter().map(|l| l.len() as u16).max().unwrap_or(0) + 1;
    Rect::new(
        inner.x + label_width.min(inner.width),
        inner.y,
        inner.width.saturating_sub(label_width),
        inner.height.saturating_sub(2),
    )
}

/// Year nearest to a mouse column inside `plot`, limited to `years`.
pub fn year_at_column(bounds: &ChartBounds, plot: Rect, column: u16, years: &[u32]) -> Option<u32> {
    if plot.width == 0 || column < plot.x || column >= plot.x + plot.width {
        return None;
    }

    let fraction = (f64::from(column - plot.x) + 0.5) / f64::from(plot.width);
    let x = bounds.x[0] + fraction * (bounds.x[1] - bounds.x[0]);

    years.iter().copied().min_by(|a, b| {
        let da = (f64::from(*a) - x).abs();
        let db = (f64::from(*b) - x).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Screen geometry of the last drawn chart, kept for mouse hover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub plot: Rect,
    pub bounds: ChartBounds,
}

/// Draw `spec` over `rows`, marking `hovered_year` with a vertical rule.
pub fn render_chart(
    f: &mut Frame,
    area: Rect,
    spec: &ChartSpec,
    rows: &[ProjectionRow],
    hovered_year: Option<u32>,
) -> ChartLayout {
    let points = series_points(spec, rows);
    let bounds = ChartBounds::compute(spec.kind, &points);
    let y_text = y_labels(&bounds, spec.y_format);
    let x_text = x_labels(&points);

    // Paired bars sit side by side around their year.
    let plotted: Vec<Vec<(f64, f64)>> = match spec.kind {
        ChartKind::Line => points,
        ChartKind::Bar => {
            let center = (spec.series.len() as f64 - 1.0) / 2.0;
            points
                .into_iter()
                .enumerate()
                .map(|(i, series)| {
                    let offset = (i as f64 - center) * BAR_SPREAD;
                    series.into_iter().map(|(x, y)| (x + offset, y)).collect()
                })
                .collect()
        }
    };

    let marker: Vec<(f64, f64)> = hovered_year
        .map(|year| vec![(f64::from(year), bounds.y[0]), (f64::from(year), bounds.y[1])])
        .unwrap_or_default();

    let graph_type = match spec.kind {
        ChartKind::Line => GraphType::Line,
        ChartKind::Bar => GraphType::Bar,
    };

    let mut datasets: Vec<Dataset> = spec
        .series
        .iter()
        .zip(&plotted)
        .map(|(series, data)| {
            Dataset::default()
                .name(series.label)
                .marker(symbols::Marker::Braille)
                .graph_type(graph_type)
                .style(Style::default().fg(series.color))
                .data(data)
        })
        .collect();

    if !marker.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::DarkGray))
                .data(&marker),
        );
    }

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(spec.title))
        .legend_position(Some(LegendPosition::TopLeft))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
        .x_axis(
            Axis::default()
                .title("Year")
                .style(Style::default().fg(Color::Gray))
                .bounds(bounds.x)
                .labels(x_text.into_iter().map(Span::raw).collect::<Vec<_>>()),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(bounds.y)
                .labels(y_text.iter().cloned().map(Span::raw).collect::<Vec<_>>()),
        );

    f.render_widget(chart, area);

    ChartLayout {
        plot: plot_area(area, &y_text),
        bounds,
    }
}
