use crate::format::ValueFormat;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// One series' value at the hovered year.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipEntry {
    pub label: &'static str,
    pub value: Option<f64>,
    pub color: Color,
    pub format: ValueFormat,
}

impl TooltipEntry {
    pub fn text(&self) -> String {
        format!("{}: {}", self.label, self.format.apply_opt(self.value))
    }
}

/// Hover panel: the year, then one line per series that has a value there.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub year: u32,
    pub entries: Vec<TooltipEntry>,
}

impl Tooltip {
    /// `None` when nothing is hovered or no series has a value at that year.
    pub fn build(hovered_year: Option<u32>, entries: Vec<TooltipEntry>) -> Option<Self> {
        let year = hovered_year?;
        let entries: Vec<TooltipEntry> = entries.into_iter().filter(|e| e.value.is_some()).collect();
        if entries.is_empty() {
            return None;
        }
        Some(Tooltip { year, entries })
    }

    pub fn heading(&self) -> String {
        format!("Year {}", self.year)
    }

    pub fn text_lines(&self) -> Vec<String> {
        std::iter::once(self.heading())
            .chain(self.entries.iter().map(TooltipEntry::text))
            .collect()
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![Line::styled(
            self.heading(),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        lines.extend(
            self.entries
                .iter()
                .map(|e| Line::styled(e.text(), Style::default().fg(e.color))),
        );
        lines
    }

    /// Width and height including the border.
    pub fn size(&self) -> (u16, u16) {
        let width = self
            .text_lines()
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0) as u16;
        (width + 4, self.entries.len() as u16 + 3)
    }
}

/// Draw the tooltip in the top-right corner of `anchor`.
pub fn render_tooltip(f: &mut Frame, anchor: Rect, tooltip: &Tooltip) {
    let (width, height) = tooltip.size();
    let width = width.min(anchor.width);
    let height = height.min(anchor.height);
    if width == 0 || height == 0 {
        return;
    }

    let area = Rect::new(anchor.right() - width, anchor.y, width, height);
    f.render_widget(Clear, area);

    let paragraph = Paragraph::new(tooltip.lines()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray)),
    );
    f.render_widget(paragraph, area);
}
