use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap},
    Frame,
};

use polymarket_intel::controller::SortKey;
use polymarket_intel::dashboard::{CategoryRow, Panel, SignalCard};
use polymarket_intel::metrics::{
    calibration_points, format_brier, resolved_markets_label, BrierBand, ConfidenceBand,
};
use polymarket_intel::types::{CalibrationData, MarketsPage, Signal};

use crate::{App, Tab};

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    match app.tab {
        Tab::Dashboard => render_dashboard(f, app, chunks[1]),
        Tab::Calibration => render_calibration(f, app, chunks[1]),
    }
    render_footer(f, app, chunks[2]);
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

fn titled_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn header_row(cells: Vec<String>) -> Row<'static> {
    Row::new(
        cells
            .into_iter()
            .map(|h| Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .height(1)
}

/// Draws the placeholder for a panel without data. Returns the data and the
/// block title suffix when there is something to draw.
fn unwrap_panel<T>(
    f: &mut Frame,
    panel: Panel<T>,
    block: Block<'static>,
    empty_text: &str,
    area: Rect,
) -> Option<(std::sync::Arc<T>, Block<'static>)> {
    let (text, color) = match panel {
        Panel::Ready { data, stale } => {
            let block = match stale {
                Some(e) => block.title_bottom(Span::styled(
                    format!(" stale: {} ", truncate(&e, 50)),
                    Style::default().fg(Color::Red),
                )),
                None => block,
            };
            return Some((data, block));
        }
        Panel::Loading => ("Loading...".to_string(), Color::DarkGray),
        Panel::Failed(e) => (format!("✗ {e}"), Color::Red),
        Panel::Empty => (empty_text.to_string(), Color::DarkGray),
    };
    f.render_widget(
        Paragraph::new(Span::styled(text, Style::default().fg(color))).block(block),
        area,
    );
    None
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

// ---------------------------------------------------------------------------
// Header / footer
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let tab_style = |t: Tab| {
        if app.tab == t {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let mut spans = vec![
        Span::styled(
            " Polymarket Intel  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("Dashboard", tab_style(Tab::Dashboard)),
        Span::raw("  "),
        Span::styled("Calibration", tab_style(Tab::Calibration)),
    ];

    for health in app.dashboard.query_health() {
        spans.push(Span::raw("  │  "));
        let name = health.name;
        let (text, color) = match (health.loading, &health.error) {
            (true, _) => (format!("◌ {name}"), Color::Yellow),
            (false, Some(_)) => (format!("✗ {name}"), Color::Red),
            (false, None) => (format!("● {name}"), Color::Green),
        };
        spans.push(Span::styled(text, Style::default().fg(color)));
        if health.age.is_some() {
            spans.push(Span::styled(
                format!(" {}", health.age_label()),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let line = if let Some(input) = &app.search_input {
        Line::from(vec![
            key(" search: "),
            Span::raw(format!("{input}▏")),
            Span::styled("  [enter] apply  [esc] cancel", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        let mut spans = vec![key(" [q] "), Span::raw("quit  "), key("[r] "), Span::raw("refresh  "), key("[tab] "), Span::raw("switch  ")];
        match app.tab {
            Tab::Dashboard => spans.extend([
                key("[f] "),
                Span::raw("filter  "),
                key("[v/y/n] "),
                Span::raw("sort  "),
                key("[←→] "),
                Span::raw("page  "),
                key("[/] "),
                Span::raw("search  "),
                key("[enter/esc] "),
                Span::raw("history"),
            ]),
            Tab::Calibration => spans.extend([key("[c] "), Span::raw("category")]),
        }
        Line::from(spans)
    };
    f.render_widget(Paragraph::new(line).style(Style::default().fg(Color::White)), area);
}

// ---------------------------------------------------------------------------
// Dashboard tab
// ---------------------------------------------------------------------------

fn render_dashboard(f: &mut Frame, app: &mut App, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let now = Utc::now();
    if app.dashboard.history().is_some() {
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(halves[0]);
        render_signals(f, app, now, left[0]);
        render_history(f, app, now, left[1]);
    } else {
        render_signals(f, app, now, halves[0]);
    }
    render_markets(f, app, halves[1]);
}

fn confidence_color(band: ConfidenceBand) -> Color {
    match band {
        ConfidenceBand::High => Color::Red,
        ConfidenceBand::Medium => Color::Yellow,
        ConfidenceBand::Low => Color::Blue,
    }
}

fn confidence_bar(card: &SignalCard) -> String {
    let filled = (card.confidence_fill() * 10.0).round() as usize;
    format!("{}{} {}", "█".repeat(filled), "░".repeat(10 - filled), card.confidence_label())
}

fn signal_rows<'a>(signals: &'a [Signal], now: DateTime<Utc>, with_market: bool) -> Vec<Row<'a>> {
    signals
        .iter()
        .map(|s| {
            let card = SignalCard::new(s);
            let color = confidence_color(card.band);
            let mut cells = vec![Cell::from(card.label()).style(Style::default().fg(Color::Cyan))];
            if with_market {
                cells.push(Cell::from(truncate(card.title(), 28)));
            }
            cells.extend([
                Cell::from(confidence_bar(&card)).style(Style::default().fg(color)),
                Cell::from(card.time_ago(now)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(card.details().join("  ")),
            ]);
            Row::new(cells)
        })
        .collect()
}

fn render_signals(f: &mut Frame, app: &App, now: DateTime<Utc>, area: Rect) {
    let title = format!(" ACTIVE SIGNALS [{}] ", app.dashboard.signal_filter().label());
    let Some((signals, block)) = unwrap_panel(
        f,
        app.dashboard.signals_panel(),
        titled_block(title),
        "No active signals",
        area,
    ) else {
        return;
    };

    let header = header_row(["Type", "Market", "Confidence", "Age", "Details"].map(String::from).to_vec());
    let table = Table::new(
        signal_rows(&signals, now, true),
        [
            Constraint::Length(14),
            Constraint::Min(12),
            Constraint::Length(16),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(block);
    f.render_widget(table, area);
}

fn render_history(f: &mut Frame, app: &App, now: DateTime<Utc>, area: Rect) {
    let Some(view) = app.dashboard.history() else {
        return;
    };
    let name = view.question.as_deref().unwrap_or(&view.market_id);
    let title = format!(" HISTORY: {} ", truncate(name, 40));
    let Some((signals, block)) =
        unwrap_panel(f, view.panel(), titled_block(title), "No signals for this market", area)
    else {
        return;
    };

    let header = header_row(["Type", "Confidence", "Age", "Details"].map(String::from).to_vec());
    let table = Table::new(
        signal_rows(&signals, now, false),
        [
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(block);
    f.render_widget(table, area);
}

fn render_markets(f: &mut Frame, app: &mut App, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let title = match app.dashboard.search() {
        Some(s) => format!(" MARKETS  \"{}\" ", truncate(s, 20)),
        None => " MARKETS ".to_string(),
    };
    let panel = app.dashboard.markets_panel();
    if let Some((page, block)) = unwrap_panel(f, panel, titled_block(title), "No markets found", parts[0]) {
        render_market_table(f, app, &page, block, parts[0]);
    }
    render_pagination(f, app, parts[1]);
}

fn render_market_table(f: &mut Frame, app: &mut App, page: &MarketsPage, block: Block<'static>, area: Rect) {
    let sort = app.dashboard.sort();
    let header = header_row(vec![
        "Market".to_string(),
        "Category".to_string(),
        format!("{}{}", SortKey::Volume.label(), sort.indicator(SortKey::Volume)),
        format!("Yes{}", sort.indicator(SortKey::Yes)),
        format!("No{}", sort.indicator(SortKey::No)),
    ]);

    let rows: Vec<Row> = app
        .dashboard
        .market_rows(page)
        .into_iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(truncate(&r.market.question, 36)),
                Cell::from(r.category_label().to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(r.volume_label()).style(Style::default().fg(Color::Cyan)),
                Cell::from(r.yes_label()).style(Style::default().fg(Color::Green)),
                Cell::from(r.no_label()).style(Style::default().fg(Color::Red)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, &mut app.market_table);
}

fn render_pagination(f: &mut Frame, app: &App, area: Rect) {
    let p = app.dashboard.pagination();
    let control = |enabled: bool, text: &'static str| {
        let style = if enabled {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
        };
        Span::styled(text, style)
    };
    let line = Line::from(vec![
        control(p.has_previous(), " ◀ prev "),
        Span::raw(format!(" Page {} of {} ({} markets) ", p.page(), p.total_pages(), p.total())),
        control(p.has_next(), " next ▶ "),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

// ---------------------------------------------------------------------------
// Calibration tab
// ---------------------------------------------------------------------------

fn brier_color(band: BrierBand) -> Color {
    match band {
        BrierBand::Good => Color::Green,
        BrierBand::Fair => Color::Yellow,
        BrierBand::Poor => Color::Red,
        BrierBand::Unknown => Color::DarkGray,
    }
}

fn render_calibration(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.dashboard.calibration_category() {
        Some(c) => format!(" CALIBRATION [{c}] "),
        None => " CALIBRATION [All] ".to_string(),
    };
    let Some((data, block)) = unwrap_panel(
        f,
        app.dashboard.calibration_panel(),
        titled_block(title),
        "No resolved markets yet. Calibration appears once markets resolve.",
        area,
    ) else {
        return;
    };

    let inner = block.inner(area);
    f.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(inner);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(halves[0]);

    render_brier_card(f, &data, left[0]);
    render_categories(f, &data, left[1]);
    render_curve(f, &data, halves[1]);
}

fn render_brier_card(f: &mut Frame, data: &CalibrationData, area: Rect) {
    let band = BrierBand::from_score(data.brier_score);
    let lines = vec![
        Line::from(Span::styled(
            format_brier(data.brier_score),
            Style::default().fg(brier_color(band)).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(band.to_string(), Style::default().fg(brier_color(band)))),
        Line::from(Span::styled(
            resolved_markets_label(data.market_count),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(titled_block(" BRIER SCORE ".to_string())), area);
}

fn render_categories(f: &mut Frame, data: &CalibrationData, area: Rect) {
    let block = titled_block(" BY CATEGORY ".to_string());
    if data.category_breakdown.is_empty() {
        let text = Span::styled(
            "No category data yet. Breakdowns appear once markets in a category resolve.",
            Style::default().fg(Color::DarkGray),
        );
        f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }).block(block), area);
        return;
    }

    let rows: Vec<Row> = data
        .category_breakdown
        .iter()
        .map(|b| {
            let row = CategoryRow::new(b);
            Row::new(vec![
                Cell::from(b.category.clone()),
                Cell::from(row.score_label()).style(Style::default().fg(brier_color(row.band))),
                Cell::from(b.count.to_string()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Min(10), Constraint::Length(8), Constraint::Length(6)],
    )
    .header(header_row(["Category", "Brier", "N"].map(String::from).to_vec()))
    .block(block);
    f.render_widget(table, area);
}

/// Rows plus header and borders.
fn bins_table_height(rows: usize) -> u16 {
    u16::try_from(rows).unwrap_or(u16::MAX).saturating_add(3)
}

fn render_curve(f: &mut Frame, data: &CalibrationData, area: Rect) {
    let points = calibration_points(&data.calibration_curve);
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(bins_table_height(points.len()))])
        .split(area);

    let actual: Vec<(f64, f64)> = points.iter().map(|p| (p.predicted, p.actual)).collect();
    let perfect = [(0.0, 0.0), (1.0, 1.0)];

    let datasets = vec![
        Dataset::default()
            .name("perfect")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&perfect),
        Dataset::default()
            .name("actual")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&actual),
    ];

    let axis = |title: &'static str| {
        Axis::default()
            .title(title)
            .style(Style::default().fg(Color::DarkGray))
            .bounds([0.0, 1.0])
            .labels(["0%", "50%", "100%"])
    };
    let chart = Chart::new(datasets)
        .block(titled_block(" CALIBRATION CURVE ".to_string()))
        .x_axis(axis("predicted"))
        .y_axis(axis("actual"));
    f.render_widget(chart, parts[0]);

    let rows: Vec<Row> = points
        .iter()
        .map(|p| {
            Row::new(vec![
                Cell::from(p.label.clone()),
                Cell::from(format!("{:.0}%", p.predicted * 100.0)),
                Cell::from(format!("{:.0}%", p.actual * 100.0)),
                Cell::from(p.count.to_string()).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [Constraint::Length(9), Constraint::Length(10), Constraint::Length(8), Constraint::Length(6)],
    )
    .header(header_row(["Bin", "Predicted", "Actual", "N"].map(String::from).to_vec()))
    .block(titled_block(" BINS ".to_string()));
    f.render_widget(table, parts[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn draw(data: &CalibrationData) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 8)).unwrap();
        terminal.draw(|f| render_categories(f, data, f.area())).unwrap();
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn empty_breakdown_shows_placeholder() {
        let screen = draw(&CalibrationData::default());
        assert!(screen.contains("No category data yet"));
        assert!(!screen.contains("Brier"));
    }

    #[test]
    fn breakdown_rows_are_listed() {
        let data = CalibrationData {
            category_breakdown: vec![polymarket_intel::types::CategoryBreakdown {
                category: "Sports".to_string(),
                brier_score: 0.08,
                count: 4,
            }],
            ..CalibrationData::default()
        };
        let screen = draw(&data);
        assert!(screen.contains("Sports"));
        assert!(screen.contains("0.0800"));
        assert!(!screen.contains("No category data yet"));
    }

    #[test]
    fn bins_table_height_saturates() {
        assert_eq!(bins_table_height(0), 3);
        assert_eq!(bins_table_height(2), 5);
        assert_eq!(bins_table_height(70_000), u16::MAX);
    }
}
