/// QuantStream Terminal
///
/// Terminal dashboard over the QuantStream analytics service. Each page mounts its view on
/// entry and unmounts it on exit; the health monitor runs for the whole session.
///
/// Keys: [1-5] page, [←/→] symbol, [Q] quit, plus page-specific keys shown in the footer.
use std::{
    error::Error,
    fs::OpenOptions,
    io,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use parking_lot::Mutex;
use quantstream_client::{
    AlertExporter, AlertsView, AnalyticsView, ControlsView, DashboardConfig, HealthMonitor,
    LiveView, RemoteClient, Severity, StatisticsView, Symbol, ViewContext,
    views::controls::SYMBOL_CATALOGUE,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod ui;

const TICK_RATE: Duration = Duration::from_millis(250);

const DEFAULT_LOG_FILE: &str = "quantstream-terminal.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Controls,
    Live,
    Statistics,
    Analytics,
    Alerts,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Controls,
        Page::Live,
        Page::Statistics,
        Page::Analytics,
        Page::Alerts,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Page::Controls => "Controls",
            Page::Live => "Live Data",
            Page::Statistics => "Statistics",
            Page::Analytics => "Analytics",
            Page::Alerts => "Alerts",
        }
    }

    fn from_key(key: char) -> Option<Self> {
        key.to_digit(10)
            .and_then(|digit| Self::ALL.get((digit as usize).checked_sub(1)?).copied())
    }
}

/// The view mounted for the current page.
pub enum PageView {
    Controls(ControlsView),
    Live(LiveView),
    Statistics(StatisticsView),
    Analytics(AnalyticsView),
    Alerts(AlertsView),
}

impl PageView {
    fn mount(page: Page, context: &ViewContext) -> Self {
        match page {
            Page::Controls => PageView::Controls(ControlsView::mount(context)),
            Page::Live => PageView::Live(LiveView::mount(context)),
            Page::Statistics => PageView::Statistics(StatisticsView::mount(context)),
            Page::Analytics => PageView::Analytics(AnalyticsView::mount(context)),
            Page::Alerts => PageView::Alerts(AlertsView::mount(context)),
        }
    }
}

pub struct App {
    context: ViewContext,
    pub health: HealthMonitor,
    pub page: Page,
    pub view: PageView,
    /// Highlighted row of the symbol catalogue on the controls page
    pub cursor: usize,
    /// Outcome of the last background action (export)
    pub notice: Arc<Mutex<Option<String>>>,
    export_dir: PathBuf,
}

impl App {
    fn new(context: ViewContext) -> Self {
        let health = HealthMonitor::mount(&context);
        let page = Page::Controls;
        let view = PageView::mount(page, &context);

        Self {
            context,
            health,
            page,
            view,
            cursor: 0,
            notice: Arc::default(),
            export_dir: std::env::var("QUANTSTREAM_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn switch_page(&mut self, page: Page) {
        if page == self.page {
            return;
        }
        self.view = PageView::mount(page, &self.context);
        self.page = page;
        *self.notice.lock() = None;
    }

    /// Returns `true` when the user asked to quit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char(digit @ '1'..='5') => {
                if let Some(page) = Page::from_key(digit) {
                    self.switch_page(page);
                }
                return false;
            }
            _ => {}
        }

        match &mut self.view {
            PageView::Controls(view) => self.cursor = handle_controls_key(view, self.cursor, key),
            PageView::Live(view) => match key.code {
                KeyCode::Left | KeyCode::Right => {
                    if let Some(symbol) = step_symbol(view.symbol(), &view.symbols(), key.code) {
                        view.select_symbol(symbol);
                    }
                }
                KeyCode::Char('r') => {
                    let rate = view.cycle_refresh_rate();
                    info!(%rate, "refresh rate changed");
                }
                _ => {}
            },
            PageView::Statistics(view) => {
                if let Some(symbol) = step_symbol(view.symbol(), &view.symbols(), key.code) {
                    view.select_symbol(symbol);
                }
            }
            PageView::Analytics(view) => handle_analytics_key(view, key),
            PageView::Alerts(view) => match key.code {
                KeyCode::Char('l') => view.toggle_severity(Severity::Low),
                KeyCode::Char('m') => view.toggle_severity(Severity::Medium),
                KeyCode::Char('h') => view.toggle_severity(Severity::High),
                KeyCode::Char('c') => view.toggle_severity(Severity::Critical),
                KeyCode::Char('e') => {
                    spawn_export(view.exporter(), Arc::clone(&self.notice), self.export_dir.clone())
                }
                _ => {}
            },
        }

        false
    }
}

fn handle_controls_key(view: &ControlsView, cursor: usize, key: KeyEvent) -> usize {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => cursor.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => (cursor + 1).min(SYMBOL_CATALOGUE.len() - 1),
        KeyCode::Char(' ') => {
            if let Some(symbol) = SYMBOL_CATALOGUE.get(cursor) {
                view.toggle_symbol(Symbol::from(*symbol));
            }
            cursor
        }
        KeyCode::Char('a') => {
            view.select_all();
            cursor
        }
        KeyCode::Char('x') => {
            view.clear_all();
            cursor
        }
        KeyCode::Char('s') => {
            let actions = view.actions();
            tokio::spawn(async move { actions.start().await });
            cursor
        }
        KeyCode::Char('o') => {
            let actions = view.actions();
            tokio::spawn(async move { actions.stop().await });
            cursor
        }
        _ => cursor,
    }
}

fn handle_analytics_key(view: &mut AnalyticsView, key: KeyEvent) {
    let symbols = view.symbols();
    match key.code {
        KeyCode::Tab => view.select_tab(view.tab().next()),
        KeyCode::Left | KeyCode::Right => {
            if let Some(symbol) = step_symbol(view.symbol(), &symbols, key.code) {
                view.select_symbol(symbol);
            }
        }
        KeyCode::Char('t') => view.select_timeframe(view.timeframe().next()),
        KeyCode::Char('[') => {
            let first = view.pair().map(|pair| pair.first);
            if let Some(symbol) = step_symbol(first, &symbols, KeyCode::Right) {
                view.select_pair_first(symbol);
            }
        }
        KeyCode::Char(']') => {
            let second = view.pair().map(|pair| pair.second);
            if let Some(symbol) = step_symbol(second, &symbols, KeyCode::Right) {
                view.select_pair_second(symbol);
            }
        }
        _ => {}
    }
}

/// Neighbour of `current` in `available`, wrapping around. Left steps back, anything else
/// steps forward; with no current selection the first symbol is picked.
fn step_symbol(current: Option<Symbol>, available: &[Symbol], code: KeyCode) -> Option<Symbol> {
    if !matches!(code, KeyCode::Left | KeyCode::Right) || available.is_empty() {
        return None;
    }

    let step = if code == KeyCode::Left { -1 } else { 1 };
    let len = available.len() as isize;
    let index = current
        .and_then(|current| available.iter().position(|symbol| *symbol == current))
        .map_or(0, |index| (index as isize + step).rem_euclid(len));

    available.get(index as usize).cloned()
}

fn spawn_export(exporter: AlertExporter, notice: Arc<Mutex<Option<String>>>, dir: PathBuf) {
    tokio::spawn(async move {
        let message = match exporter.export().await {
            None => return,
            Some(Ok(artifact)) => {
                let path = dir.join(&artifact.file_name);
                match tokio::fs::write(&path, &artifact.bytes).await {
                    Ok(()) => format!(
                        "Exported {} ({} bytes)",
                        path.display(),
                        artifact.bytes.len()
                    ),
                    Err(error) => {
                        error!(%error, path = %path.display(), "failed to write export");
                        format!("Failed to write {}: {error}", path.display())
                    }
                }
            }
            Some(Err(error)) => format!("Export failed: {error}"),
        };
        *notice.lock() = Some(message);
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = DashboardConfig::from_env();
    let client = RemoteClient::http(&config.client)?;
    let context = ViewContext::new(client, &config);
    info!(base_url = %config.client.base_url, "starting terminal");

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(context);
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(error) = &result {
        error!(%error, "terminal loop failed");
    }
    info!("terminal closed");
    result.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }
}

/// Log to a file so the stream does not corrupt the alternate screen
fn init_logging() -> io::Result<()> {
    let path = std::env::var("QUANTSTREAM_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();

    Ok(())
}
