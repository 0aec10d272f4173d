use crate::app::{App, ClickableRegions, LoadStatus};
use crate::charts::render_chart;
use crate::tooltip::render_tooltip;
use crate::view::ViewMode;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Frame,
};

pub const BANNER: &str = "This dashboard compares different portfolio strategies over a 20-year \
period with various market conditions and repayment approaches.";

/// Rows given to the chart at minimum.
const CHART_MIN_HEIGHT: u16 = 20;

const TAB_DIVIDER: &str = "|";

pub fn ui(f: &mut Frame, app: &mut App) {
    // Clear clickable regions before each render
    app.clickable_regions = ClickableRegions::default();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),                 // Banner
            Constraint::Length(3),                 // Tabs
            Constraint::Min(CHART_MIN_HEIGHT),     // Chart
            Constraint::Length(1),                 // Footer
        ])
        .split(f.area());

    render_banner(f, chunks[0]);
    render_tabs(f, app, chunks[1]);
    render_chart_region(f, app, chunks[2]);
    render_footer(f, app, chunks[3]);
}

fn render_banner(f: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(BANNER)
        .style(Style::default().fg(Color::LightBlue))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Blue)));
    f.render_widget(paragraph, area);
}

fn render_tabs(f: &mut Frame, app: &mut App, area: Rect) {
    let titles: Vec<Line> = ViewMode::ALL
        .iter()
        .map(|mode| {
            let title = format!(" {}:{} ", mode.index() + 1, mode.label());
            if *mode == app.view {
                Line::from(title).white().on_blue().bold()
            } else {
                Line::from(title).dark_gray()
            }
        })
        .collect();

    // Calculate clickable regions for tabs (inside the border)
    let inner_x = area.x + 1;
    let tab_y = area.y + 1;
    let mut current_x = inner_x;

    for mode in ViewMode::ALL {
        // Tabs pads each title with one space on either side
        let width = format!(" {}:{} ", mode.index() + 1, mode.label()).len() as u16 + 2;
        app.clickable_regions
            .view_tabs
            .push((Rect::new(current_x, tab_y, width, 1), mode));
        current_x += width + TAB_DIVIDER.len() as u16;
    }

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" Views "))
        .select(app.view.index())
        .highlight_style(Style::default())
        .divider(TAB_DIVIDER);

    f.render_widget(tabs, area);
}

fn render_chart_region(f: &mut Frame, app: &mut App, area: Rect) {
    let spec = app.chart_spec();
    debug_assert_eq!(spec.mode, app.view);
    let layout = render_chart(f, area, spec, &app.rows, app.hovered_year);
    app.clickable_regions.chart = Some(layout);

    if let Some(tooltip) = app.tooltip() {
        render_tooltip(f, layout.plot, &tooltip);
    }
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let keys = " 1-3/Tab=View | ←→=Year | Esc=Clear | q=Quit | ";
    let status_color = match app.load_status {
        LoadStatus::Pending => Color::Yellow,
        LoadStatus::Loaded { .. } => Color::Green,
    };

    let spans = vec![
        Span::styled(keys, Style::default().fg(Color::Yellow)),
        Span::styled(
            app.status_text(),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
    ];

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
