mod render;

use std::fs::File;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, widgets::TableState, Terminal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use polymarket_intel::config::{Config, UI_TICK_MS};
use polymarket_intel::controller::SortKey;
use polymarket_intel::dashboard::Dashboard;
use polymarket_intel::error::Result;
use polymarket_intel::query::{ApiClient, QueryClient};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // The terminal is ours, so logs go to a file.
    let log_file = match File::create(&cfg.log_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", cfg.log_file);
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        eprintln!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let client = ApiClient::from_config(&cfg)?;
    info!(api = client.base_url(), "dashboard starting");
    let mut app = App::new(Dashboard::new(QueryClient::new(client), cfg.signals_limit));

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    info!("dashboard stopped");
    Ok(result?)
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Calibration,
}

pub struct App {
    pub dashboard: Dashboard,
    pub tab: Tab,
    pub market_table: TableState,
    /// Some while the search prompt is open.
    pub search_input: Option<String>,
}

impl App {
    fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            tab: Tab::Dashboard,
            market_table: TableState::default().with_selected(Some(0)),
            search_input: None,
        }
    }

    /// New page content starts at the top of the table.
    fn scroll_to_top(&mut self) {
        self.market_table.select(Some(0));
        *self.market_table.offset_mut() = 0;
    }

    fn selected_market(&self) -> Option<(String, String)> {
        let panel = self.dashboard.markets_panel();
        let page = panel.data()?;
        let rows = self.dashboard.market_rows(page);
        let row = rows.get(self.market_table.selected()?)?;
        Some((row.market.id.clone(), row.market.question.clone()))
    }

    /// Returns false when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if let Some(input) = self.search_input.as_mut() {
            match code {
                KeyCode::Enter => {
                    let text = std::mem::take(input);
                    self.search_input = None;
                    self.dashboard.apply_search(&text);
                    self.scroll_to_top();
                }
                KeyCode::Esc => self.search_input = None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return true;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return false,
            KeyCode::Char('r') | KeyCode::Char('R') => self.dashboard.refresh_all(),
            KeyCode::Tab => {
                self.tab = match self.tab {
                    Tab::Dashboard => Tab::Calibration,
                    Tab::Calibration => Tab::Dashboard,
                };
            }
            _ if self.tab == Tab::Calibration => self.handle_calibration_key(code),
            _ => self.handle_dashboard_key(code),
        }
        true
    }

    fn handle_dashboard_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('f') => {
                self.dashboard.cycle_signal_filter();
            }
            KeyCode::Char('v') => self.dashboard.select_sort(SortKey::Volume),
            KeyCode::Char('y') => self.dashboard.select_sort(SortKey::Yes),
            KeyCode::Char('n') => self.dashboard.select_sort(SortKey::No),
            KeyCode::Right | KeyCode::Char(']') => {
                if self.dashboard.next_page() {
                    self.scroll_to_top();
                }
            }
            KeyCode::Left | KeyCode::Char('[') => {
                if self.dashboard.previous_page() {
                    self.scroll_to_top();
                }
            }
            KeyCode::Char('/') => {
                self.search_input = Some(self.dashboard.search().unwrap_or_default().to_string());
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self
                    .dashboard
                    .markets_panel()
                    .data()
                    .map_or(0, |p| p.markets.len());
                let max = len.saturating_sub(1);
                let next = self.market_table.selected().map_or(0, |i| (i + 1).min(max));
                self.market_table.select(Some(next));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let prev = self
                    .market_table
                    .selected()
                    .map_or(0, |i| i.saturating_sub(1));
                self.market_table.select(Some(prev));
            }
            KeyCode::Enter => {
                if let Some((id, question)) = self.selected_market() {
                    self.dashboard.open_history(&id, Some(question));
                }
            }
            KeyCode::Esc => self.dashboard.close_history(),
            _ => {}
        }
    }

    fn handle_calibration_key(&mut self, code: KeyCode) {
        if code == KeyCode::Char('c') {
            let known: Vec<String> = self
                .dashboard
                .calibration_panel()
                .data()
                .map(|d| d.category_breakdown.iter().map(|b| b.category.clone()).collect())
                .unwrap_or_default();
            self.dashboard.cycle_calibration_category(&known);
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    let tick = Duration::from_millis(UI_TICK_MS);

    loop {
        app.dashboard.sync_total();
        terminal.draw(|f| render::render(f, app))?;

        if event::poll(tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key.code) {
                    return Ok(());
                }
            }
        }
    }
}
