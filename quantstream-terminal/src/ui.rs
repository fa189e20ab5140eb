use chrono::{DateTime, Utc};
use itertools::Itertools;
use quantstream_client::{
    AlertsView, AnalyticsView, ControlsView, LiveView, Severity, Slot, Snapshot, StatisticsView,
    model::{OutlierLevel, PairSignal},
    views::{
        analytics::{ADF_MIN_OBSERVATIONS, AnalyticsTab, TabPanel},
        controls::{BannerKind, SYMBOL_CATALOGUE},
    },
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
};

use crate::{App, Page, PageView};

pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], app);

    match &app.view {
        PageView::Controls(view) => render_controls(f, chunks[1], view, app.cursor),
        PageView::Live(view) => render_live(f, chunks[1], view),
        PageView::Statistics(view) => render_statistics(f, chunks[1], view),
        PageView::Analytics(view) => render_analytics(f, chunks[1], view),
        PageView::Alerts(view) => render_alerts(f, chunks[1], view),
    }

    render_footer(f, chunks[2], app);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(44)])
        .split(area);

    let titles = Page::ALL
        .iter()
        .enumerate()
        .map(|(index, page)| format!("{} {}", index + 1, page.title()))
        .collect::<Vec<_>>();
    let selected = Page::ALL
        .iter()
        .position(|page| *page == app.page)
        .unwrap_or_default();
    let tabs = Tabs::new(titles)
        .select(selected)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" QUANTSTREAM "),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[0]);

    let health = app.health.status();
    let (service, service_color) = if health.service_reachable {
        ("● ONLINE", Color::Green)
    } else {
        ("○ OFFLINE", Color::Red)
    };
    let (ingestion, ingestion_color) = if health.ingestion_active {
        ("INGESTING", Color::Green)
    } else {
        ("IDLE", Color::DarkGray)
    };
    let checked = health
        .checked_at
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let line = Line::from(vec![
        Span::styled(
            format!(" {service} "),
            Style::default()
                .fg(service_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {ingestion} "), Style::default().fg(ingestion_color)),
        Span::styled(format!(" {checked} "), Style::default().fg(Color::Gray)),
    ]);
    let status = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[1]);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let keys = match &app.view {
        PageView::Controls(_) => "[↑/↓] move [Space] toggle [A] all [X] clear [S] start [O] stop",
        PageView::Live(_) => "[←/→] symbol [R] refresh rate",
        PageView::Statistics(_) => "[←/→] symbol",
        PageView::Analytics(_) => "[Tab] tab [←/→] symbol [T] timeframe [ [ / ] ] pair legs",
        PageView::Alerts(_) => "[L/M/H/C] toggle severity [E] export csv",
    };

    let mut spans = vec![Span::styled(
        format!(" [1-5] page [Q] quit {keys} "),
        Style::default().fg(Color::DarkGray),
    )];
    if let Some(notice) = app.notice.lock().as_ref() {
        spans.push(Span::styled(
            format!(" {notice} "),
            Style::default().fg(Color::Cyan),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn block(title: impl Into<String>, stale: bool) -> Block<'static> {
    let title = title.into();
    let (title, color) = if stale {
        (format!(" {title} (stale) "), Color::Red)
    } else {
        (format!(" {title} "), Color::White)
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(color))
}

/// Panel title annotated with the age of the slot's last successful update
fn aged_title<T: Clone>(title: String, slot: &Slot<T>) -> String {
    match updated_label(slot.updated_at(), Utc::now()) {
        Some(label) => format!("{title} [{label}]"),
        None => title,
    }
}

fn updated_label(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<String> {
    let updated_at = updated_at?;
    let label = match (now - updated_at).num_seconds() {
        ..=0 => "updated just now".to_string(),
        seconds @ 1..=59 => format!("updated {seconds}s ago"),
        _ => format!("updated {}", updated_at.format("%H:%M:%S")),
    };
    Some(label)
}

/// Text to show while a slot has nothing to render
fn placeholder<T: Clone>(slot: &Slot<T>, empty: &str) -> Option<String> {
    let stale = slot.is_stale();
    slot.with(|snapshot| match snapshot {
        Snapshot::Ready(_) => None,
        Snapshot::Empty => Some(empty.to_string()),
        Snapshot::Pending if stale => Some("Service unreachable, retrying...".to_string()),
        Snapshot::Pending => Some("Loading...".to_string()),
    })
}

fn render_placeholder(f: &mut Frame, area: Rect, title: &str, text: String) {
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .block(block(title, false))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn signed_color(value: f64) -> Color {
    if value >= 0.0 { Color::Green } else { Color::Red }
}

fn metric(label: &str, value: String) -> Row<'static> {
    Row::new(vec![
        Cell::from(label.to_string()).style(Style::default().fg(Color::Gray)),
        Cell::from(value),
    ])
}

fn render_controls(f: &mut Frame, area: Rect, view: &ControlsView, cursor: usize) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let items = SYMBOL_CATALOGUE
        .iter()
        .enumerate()
        .map(|(index, symbol)| {
            let mark = if view.is_candidate(symbol) { "[x]" } else { "[ ]" };
            let mut style = Style::default();
            if index == cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(format!("{mark} {symbol}")).style(style)
        })
        .collect::<Vec<_>>();
    let selected = view.candidates().len();
    f.render_widget(
        List::new(items).block(block(format!("Symbols ({selected} selected)"), false)),
        chunks[0],
    );

    let mut lines = match view.status().ready() {
        Some(status) => {
            let (state, color) = if status.running {
                ("RUNNING", Color::Green)
            } else {
                ("STOPPED", Color::Red)
            };
            vec![
                Line::from(vec![
                    Span::raw("Status:    "),
                    Span::styled(state, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                ]),
                Line::from(format!("Symbols:   {}", status.symbols.iter().join(", "))),
                Line::from(format!(
                    "Connected: {}",
                    status.connected_symbols.iter().join(", ")
                )),
                Line::from(format!("Ticks:     {}", status.tick_count)),
            ]
        }
        None => vec![Line::from(
            placeholder(view.status(), "No status").unwrap_or_default(),
        )],
    };

    lines.push(Line::from(""));
    if view.is_busy() {
        lines.push(Line::styled("Working...", Style::default().fg(Color::Yellow)));
    }
    if let Some(banner) = view.banner() {
        let color = match banner.kind {
            BannerKind::Success => Color::Green,
            BannerKind::Error => Color::Red,
        };
        lines.push(Line::styled(banner.text, Style::default().fg(color)));
    }

    f.render_widget(
        Paragraph::new(lines)
            .block(block("Ingestion", view.status().is_stale()))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}

fn render_live(f: &mut Frame, area: Rect, view: &LiveView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let title = format!("Latest Prices (every {})", view.refresh_rate());
    match view.prices().ready() {
        Some(prices) if !prices.prices.is_empty() => {
            let selected = view.symbol();
            let rows = prices.prices.iter().map(|(symbol, price)| {
                let style = if selected.as_ref() == Some(symbol) {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Row::new(vec![symbol.to_string(), format!("{price:.4}")]).style(style)
            });
            let table = Table::new(rows, [Constraint::Length(12), Constraint::Length(16)])
                .header(Row::new(vec!["Symbol", "Price"]).style(Style::default().fg(Color::Gray)))
                .block(block(aged_title(title, view.prices()), view.prices().is_stale()));
            f.render_widget(table, chunks[0]);
        }
        _ => {
            let text = placeholder(view.prices(), "No prices yet")
                .unwrap_or_else(|| "No prices yet. Start ingestion from Controls.".to_string());
            render_placeholder(f, chunks[0], &title, text);
        }
    }

    let title = format!(
        "Recent Ticks {}",
        view.symbol().map(|symbol| symbol.to_string()).unwrap_or_default()
    );
    let ticks = view.displayed_ticks();
    if ticks.is_empty() {
        let text = placeholder(view.ticks(), "No ticks yet").unwrap_or_else(|| "No ticks yet".to_string());
        render_placeholder(f, chunks[1], &title, text);
        return;
    }

    let rows = ticks.iter().map(|tick| {
        Row::new(vec![
            tick.timestamp.format("%H:%M:%S%.3f").to_string(),
            format!("{:.4}", tick.price),
            format!("{:.6}", tick.size),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Length(14),
        ],
    )
    .header(Row::new(vec!["Time", "Price", "Size"]).style(Style::default().fg(Color::Gray)))
    .block(block(aged_title(title, view.ticks()), view.ticks().is_stale()));
    f.render_widget(table, chunks[1]);
}

fn render_statistics(f: &mut Frame, area: Rect, view: &StatisticsView) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let symbol = view.symbol().map(|symbol| symbol.to_string()).unwrap_or_default();
    let Some(stats) = view.selected_stats() else {
        let text = placeholder(view.stats(), "No statistics available yet")
            .unwrap_or_else(|| "No statistics available yet. Start ingestion to generate statistics.".to_string());
        render_placeholder(f, area, "Statistics", text);
        return;
    };

    let rows = vec![
        metric("Current", format!("{:.4}", stats.current_price)),
        metric("Mean", format!("{:.4}", stats.mean)),
        metric("Median", format!("{:.4}", stats.median)),
        metric("Std Dev", format!("{:.4}", stats.std)),
        metric("Min / Max", format!("{:.4} / {:.4}", stats.min, stats.max)),
        metric("Range", format!("{:.4}", stats.range)),
        metric("VWAP", format!("{:.4}", stats.vwap)),
        metric(
            "Change",
            format!("{:+.4} ({:+.2}%)", stats.price_change, stats.price_change_pct),
        ),
        metric("Volume", format!("{:.4}", stats.total_volume)),
        metric("Samples", stats.count.to_string()),
        metric(
            "Volatility",
            stats
                .volatility
                .map(|volatility| format!("{volatility:.6}"))
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];
    let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(10)])
        .block(block(
            aged_title(format!("Statistics {symbol}"), view.stats()),
            view.stats().is_stale(),
        ));
    f.render_widget(table, chunks[0]);

    let level = view.outlier_level();
    let color = match level {
        OutlierLevel::Normal => Color::Green,
        OutlierLevel::Moderate => Color::Yellow,
        OutlierLevel::High => Color::LightRed,
        OutlierLevel::Extreme => Color::Red,
    };
    let zscore = view.zscore().ready().map(|snapshot| snapshot.zscore).unwrap_or_default();
    let lines = vec![
        Line::styled(
            format!("{zscore:+.3}"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Line::styled(level.to_string(), Style::default().fg(color)),
    ];
    f.render_widget(
        Paragraph::new(lines).block(block("Z-Score", view.zscore().is_stale())),
        chunks[1],
    );
}

fn render_analytics(f: &mut Frame, area: Rect, view: &AnalyticsView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    if view.symbols().is_empty() {
        let text = placeholder(view.summary(), "No active symbols")
            .unwrap_or_else(|| "No active symbols. Start ingestion from Controls.".to_string());
        render_placeholder(f, area, "Analytics", text);
        return;
    }

    let selected = AnalyticsTab::ALL
        .iter()
        .position(|tab| *tab == view.tab())
        .unwrap_or_default();
    let selection = format!(
        " {} | {} | pair {} ",
        view.symbol().map(|symbol| symbol.to_string()).unwrap_or_default(),
        view.timeframe(),
        view.pair().map(|pair| pair.to_string()).unwrap_or_default(),
    );
    let tabs = Tabs::new(AnalyticsTab::ALL.iter().map(|tab| tab.to_string()))
        .select(selected)
        .block(block(selection, view.summary().is_stale()))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[0]);

    let area = chunks[1];
    match view.panel() {
        TabPanel::Price(panel) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0)])
                .split(area);

            let summary = panel
                .stats
                .ready()
                .map(|stats| {
                    Line::from(vec![
                        Span::raw(format!("Last {:.4}  ", stats.current_price)),
                        Span::styled(
                            format!("{:+.2}%", stats.price_change_pct),
                            Style::default().fg(signed_color(stats.price_change_pct)),
                        ),
                        Span::raw(format!("  VWAP {:.4}  Std {:.4}", stats.vwap, stats.std)),
                    ])
                })
                .unwrap_or_else(|| Line::from(placeholder(&panel.stats, "No stats yet").unwrap_or_default()));
            f.render_widget(
                Paragraph::new(summary).block(block("Stats", panel.stats.is_stale())),
                parts[0],
            );

            let Some(series) = panel.candles.ready().filter(|series| !series.candles.is_empty()) else {
                let text = placeholder(&panel.candles, "No candles yet")
                    .unwrap_or_else(|| "No candles yet".to_string());
                render_placeholder(f, parts[1], "Candles", text);
                return;
            };
            let visible = parts[1].height.saturating_sub(3) as usize;
            let rows = series.candles.iter().rev().take(visible).map(|candle| {
                let color = signed_color(candle.close - candle.open);
                Row::new(vec![
                    candle.timestamp.format("%H:%M:%S").to_string(),
                    format!("{:.4}", candle.open),
                    format!("{:.4}", candle.high),
                    format!("{:.4}", candle.low),
                    format!("{:.4}", candle.close),
                    format!("{:.4}", candle.volume),
                ])
                .style(Style::default().fg(color))
            });
            let table = Table::new(rows, [Constraint::Length(10); 6])
                .header(
                    Row::new(vec!["Time", "Open", "High", "Low", "Close", "Volume"])
                        .style(Style::default().fg(Color::Gray)),
                )
                .block(block(
                    format!("Candles {} {}", series.symbol, series.timeframe),
                    panel.candles.is_stale(),
                ));
            f.render_widget(table, parts[1]);
        }
        TabPanel::ZScore(panel) => {
            let Some(zscore) = panel.zscore.ready() else {
                let text = placeholder(&panel.zscore, "Not enough data for z-score")
                    .unwrap_or_default();
                render_placeholder(f, area, "Z-Score", text);
                return;
            };
            let level = OutlierLevel::from_zscore(zscore.zscore);
            let optional = |value: Option<f64>| {
                value
                    .map(|value| format!("{value:.4}"))
                    .unwrap_or_else(|| "-".to_string())
            };
            let rows = vec![
                metric("Z-Score", format!("{:+.3}", zscore.zscore)),
                metric("Level", level.to_string()),
                metric("Price", optional(zscore.current_price)),
                metric("Mean", optional(zscore.mean)),
                metric("Std Dev", optional(zscore.std)),
            ];
            let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(10)]).block(
                block(format!("Z-Score {}", zscore.symbol), panel.zscore.is_stale()),
            );
            f.render_widget(table, area);
        }
        TabPanel::Correlation(panel) => {
            let parts = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(area);

            match panel.matrix.ready().filter(|matrix| matrix.is_renderable()) {
                Some(matrix) => {
                    let header = std::iter::once(String::new())
                        .chain(matrix.symbols.iter().map(|symbol| symbol.to_string()));
                    let rows = matrix.symbols.iter().zip(&matrix.matrix).map(|(symbol, row)| {
                        let cells = std::iter::once(Cell::from(symbol.to_string())).chain(
                            row.iter().map(|value| {
                                Cell::from(format!("{value:.2}"))
                                    .style(Style::default().fg(correlation_color(*value)))
                            }),
                        );
                        Row::new(cells)
                    });
                    let widths = vec![Constraint::Length(11); matrix.symbols.len() + 1];
                    let table = Table::new(rows, widths)
                        .header(Row::new(header).style(Style::default().fg(Color::Yellow)))
                        .block(block("Correlation Matrix", panel.matrix.is_stale()));
                    f.render_widget(table, parts[0]);
                }
                None => render_placeholder(
                    f,
                    parts[0],
                    "Correlation Matrix",
                    "Need at least 2 symbols with data for correlation analysis".to_string(),
                ),
            }

            let rows = panel
                .pairs
                .ready()
                .map(|list| list.correlations)
                .unwrap_or_default()
                .into_iter()
                .map(|entry| {
                    Row::new(vec![
                        Cell::from(format!("{}/{}", entry.symbol1, entry.symbol2)),
                        Cell::from(format!("{:.3}", entry.correlation))
                            .style(Style::default().fg(correlation_color(entry.correlation))),
                    ])
                });
            let table = Table::new(rows, [Constraint::Length(20), Constraint::Length(8)])
                .block(block("Pairs", panel.pairs.is_stale()));
            f.render_widget(table, parts[1]);
        }
        TabPanel::Pairs(panel) => {
            let Some(pair) = view.pair() else {
                render_placeholder(
                    f,
                    area,
                    "Pairs Trading",
                    "Need at least 2 symbols for pairs trading analysis".to_string(),
                );
                return;
            };
            if pair.is_degenerate() {
                render_placeholder(
                    f,
                    area,
                    "Pairs Trading",
                    "Select two different symbols".to_string(),
                );
                return;
            }

            let mut rows = Vec::new();
            if let Some(regression) = panel.regression() {
                let optional = |value: Option<f64>, precision: usize| {
                    value
                        .map(|value| format!("{value:.precision$}"))
                        .unwrap_or_else(|| "-".to_string())
                };
                rows.push(metric("Beta", optional(regression.beta, 4)));
                rows.push(metric("Alpha", optional(regression.alpha, 4)));
                rows.push(metric("R²", optional(regression.r_squared, 4)));
                rows.push(metric("P-Value", optional(regression.p_value, 6)));
            }

            let signal = match panel.spread() {
                Some(spread) => {
                    rows.push(metric("Spread", format!("{:.4}", spread.current_spread)));
                    rows.push(metric("Mean", format!("{:.4}", spread.spread_mean)));
                    rows.push(metric("Std Dev", format!("{:.4}", spread.spread_std)));
                    rows.push(metric("Z-Score", format!("{:+.3}", spread.spread_zscore)));
                    match spread.signal() {
                        PairSignal::ShortSpread => Line::styled(
                            format!(
                                "SHORT SPREAD: sell {} / buy {:.4}x {}",
                                pair.first, spread.hedge_ratio, pair.second
                            ),
                            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                        ),
                        PairSignal::LongSpread => Line::styled(
                            format!(
                                "LONG SPREAD: buy {} / sell {:.4}x {}",
                                pair.first, spread.hedge_ratio, pair.second
                            ),
                            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                        ),
                        PairSignal::Wait => Line::styled(
                            "NO SIGNAL: spread within ±2σ",
                            Style::default().fg(Color::Gray),
                        ),
                    }
                }
                None => Line::from(
                    placeholder(&panel.slots().spread, "Not enough data for spread")
                        .unwrap_or_else(|| "Waiting for spread...".to_string()),
                ),
            };

            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(3)])
                .split(area);
            let stale = panel.slots().regression.is_stale() || panel.slots().spread.is_stale();
            let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(10)])
                .block(block(format!("Pairs {pair}"), stale));
            f.render_widget(table, parts[0]);
            f.render_widget(Paragraph::new(signal).block(block("Signal", false)), parts[1]);
        }
        TabPanel::Adf(panel) => {
            let Some(adf) = panel.adf.ready() else {
                let empty = format!(
                    "Not enough data for ADF test (need {ADF_MIN_OBSERVATIONS}+ observations)"
                );
                let text = placeholder(&panel.adf, &empty).unwrap_or(empty);
                render_placeholder(f, area, "ADF Test", text);
                return;
            };
            let (verdict, color) = if adf.is_stationary {
                ("STATIONARY", Color::Green)
            } else {
                ("NON-STATIONARY", Color::Red)
            };
            let rows = vec![
                Row::new(vec![Cell::from("Result"), Cell::from(verdict)])
                    .style(Style::default().fg(color).add_modifier(Modifier::BOLD)),
                metric("Statistic", format!("{:.4}", adf.adf_statistic)),
                metric("P-Value", format!("{:.6}", adf.p_value)),
                metric("1% Critical", format!("{:.4}", adf.critical_1pct)),
                metric("5% Critical", format!("{:.4}", adf.critical_5pct)),
                metric("10% Critical", format!("{:.4}", adf.critical_10pct)),
                metric("Lags", adf.used_lag.to_string()),
                metric("Samples", adf.sample_size.to_string()),
            ];
            let table = Table::new(rows, [Constraint::Length(14), Constraint::Min(10)])
                .block(block(format!("ADF {}", adf.series_name), panel.adf.is_stale()));
            f.render_widget(table, area);
        }
    }
}

fn correlation_color(value: f64) -> Color {
    if value >= 0.8 {
        Color::Green
    } else if value >= 0.5 {
        Color::Cyan
    } else if value >= 0.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Low => Color::Blue,
        Severity::Medium => Color::Yellow,
        Severity::High => Color::LightRed,
        Severity::Critical => Color::Red,
    }
}

fn render_alerts(f: &mut Frame, area: Rect, view: &AlertsView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let filter = view.filter();
    let mut header = vec![
        Span::raw(format!(
            " Total {}  Recent {}  ",
            view.total_alerts(),
            view.recent_count()
        )),
    ];
    for severity in Severity::ALL {
        let style = if filter.includes(severity) {
            Style::default()
                .fg(severity_color(severity))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        header.push(Span::styled(format!("[{severity}] "), style));
    }
    if view.is_exporting() {
        header.push(Span::styled(" Exporting...", Style::default().fg(Color::Yellow)));
    }
    f.render_widget(
        Paragraph::new(Line::from(header)).block(block("Alerts", view.feed().is_stale())),
        chunks[0],
    );

    let alerts = view.filtered_alerts();
    if alerts.is_empty() {
        let text = placeholder(view.feed(), "No alerts")
            .unwrap_or_else(|| "No alerts match the current filter".to_string());
        render_placeholder(f, chunks[1], "Recent", text);
        return;
    }

    let items = alerts
        .iter()
        .map(|alert| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<9}", alert.severity.to_string().to_uppercase()),
                    Style::default().fg(severity_color(alert.severity)),
                ),
                Span::raw(format!(
                    "{} {:<10} {} ",
                    alert.timestamp.format("%H:%M:%S"),
                    alert.symbol,
                    alert.rule_type
                )),
                Span::styled(alert.message.clone(), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect::<Vec<_>>();
    f.render_widget(List::new(items).block(block("Recent", false)), chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_updated_label() {
        struct TestCase {
            age: Option<Duration>,
            expected: Option<&'static str>,
        }

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let cases = vec![
            // TC0: never updated
            TestCase {
                age: None,
                expected: None,
            },
            // TC1: updated this second
            TestCase {
                age: Some(Duration::milliseconds(400)),
                expected: Some("updated just now"),
            },
            // TC2: clock skew puts the update in the future
            TestCase {
                age: Some(Duration::seconds(-3)),
                expected: Some("updated just now"),
            },
            // TC3: seconds old
            TestCase {
                age: Some(Duration::seconds(42)),
                expected: Some("updated 42s ago"),
            },
            // TC4: a minute or older shows the wall clock time
            TestCase {
                age: Some(Duration::seconds(90)),
                expected: Some("updated 11:58:30"),
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = updated_label(test.age.map(|age| now - age), now);
            assert_eq!(actual.as_deref(), test.expected, "TC{index} failed");
        }
    }
}
