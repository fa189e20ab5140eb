//! Analytics view.
//!
//! The view polls the service summary and owns the symbol, symbol pair and timeframe
//! selections. Exactly one tab panel is mounted at a time; switching tabs drops the old
//! panel (closing its fence) and mounts a fresh one with empty slots.

use std::time::Duration;

use derive_more::Display;

use super::{Mount, ViewContext};
use crate::{
    model::{
        AdfResult, CandleSeries, CorrelationKind, CorrelationList, CorrelationMatrix, PairSignal,
        RegressionResult, SpreadSnapshot, StatsSnapshot, Summary, Symbol, SymbolPair, Timeframe,
        ZScoreSnapshot,
    },
    pipeline::{PairsSlots, join_into, run_pairs_cycle},
    poll::{KeySourceExt, KeyedPoller},
    selection::SelectionCell,
    slot::Slot,
};

/// Observations the service needs before it can run a stationarity test.
pub const ADF_MIN_OBSERVATIONS: usize = 30;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalyticsTab {
    #[default]
    #[display("Price")]
    Price,
    #[display("Z-Score")]
    ZScore,
    #[display("Correlation")]
    Correlation,
    #[display("Pairs")]
    Pairs,
    #[display("ADF")]
    Adf,
}

impl AnalyticsTab {
    pub const ALL: [AnalyticsTab; 5] = [
        AnalyticsTab::Price,
        AnalyticsTab::ZScore,
        AnalyticsTab::Correlation,
        AnalyticsTab::Pairs,
        AnalyticsTab::Adf,
    ];

    pub fn next(&self) -> Self {
        match self {
            AnalyticsTab::Price => AnalyticsTab::ZScore,
            AnalyticsTab::ZScore => AnalyticsTab::Correlation,
            AnalyticsTab::Correlation => AnalyticsTab::Pairs,
            AnalyticsTab::Pairs => AnalyticsTab::Adf,
            AnalyticsTab::Adf => AnalyticsTab::Price,
        }
    }
}

/// Candles and stats of the selected symbol, fetched together.
#[derive(Debug)]
pub struct PricePanel {
    _mount: Mount,
    pub candles: Slot<CandleSeries>,
    pub stats: Slot<StatsSnapshot>,
}

impl PricePanel {
    fn mount(
        context: &ViewContext,
        symbol: &SelectionCell<Symbol>,
        timeframe: &SelectionCell<Timeframe>,
    ) -> Self {
        let mut mount = Mount::new("analytics.price");
        let candles = Slot::new();
        let stats = Slot::new();

        let period = context.intervals.price_chart;
        let limit = context.limits.ohlcv;
        let poller = KeyedPoller::new(
            "price_chart",
            mount.lane(),
            move |_: &(Symbol, Timeframe)| period,
            {
                let client = context.client.clone();
                let candles = candles.clone();
                let stats = stats.clone();
                move |(symbol, timeframe): (Symbol, Timeframe), generation| {
                    let client = client.clone();
                    let candles = candles.clone();
                    let stats = stats.clone();
                    async move {
                        join_into(
                            &generation,
                            (&candles, client.candles(symbol.clone(), timeframe, limit)),
                            (&stats, client.stats(symbol)),
                        )
                        .await;
                    }
                }
            },
        )
        .on_rekey({
            let candles = candles.clone();
            let stats = stats.clone();
            move |_| {
                candles.reset();
                stats.reset();
            }
        });
        mount.follow(symbol.subscribe().zip(timeframe.subscribe()), poller);

        Self {
            _mount: mount,
            candles,
            stats,
        }
    }
}

#[derive(Debug)]
pub struct ZScorePanel {
    _mount: Mount,
    pub zscore: Slot<ZScoreSnapshot>,
}

impl ZScorePanel {
    fn mount(context: &ViewContext, symbol: &SelectionCell<Symbol>) -> Self {
        let mut mount = Mount::new("analytics.zscore");
        let zscore = Slot::new();

        let period = context.intervals.zscore;
        let poller = KeyedPoller::new("zscore", mount.lane(), move |_: &Symbol| period, {
            let client = context.client.clone();
            let zscore = zscore.clone();
            move |symbol: Symbol, generation| {
                let client = client.clone();
                let zscore = zscore.clone();
                async move {
                    generation.apply(&zscore, client.zscore(symbol).await);
                }
            }
        })
        .on_rekey({
            let zscore = zscore.clone();
            move |_| zscore.reset()
        });
        mount.follow(symbol.subscribe(), poller);

        Self {
            _mount: mount,
            zscore,
        }
    }
}

/// Correlation heatmap plus the pairwise list; independent of any selection.
#[derive(Debug)]
pub struct CorrelationPanel {
    _mount: Mount,
    pub matrix: Slot<CorrelationMatrix>,
    pub pairs: Slot<CorrelationList>,
}

impl CorrelationPanel {
    fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("analytics.correlation");
        let matrix = Slot::new();
        let pairs = Slot::new();

        let client = context.client.clone();
        let (matrix_slot, pairs_slot) = (matrix.clone(), pairs.clone());
        mount.poll("correlation", context.intervals.correlation, move |generation| {
            let client = client.clone();
            let matrix = matrix_slot.clone();
            let pairs = pairs_slot.clone();
            async move {
                join_into(
                    &generation,
                    (&matrix, client.correlation_matrix()),
                    (&pairs, client.all_correlations(CorrelationKind::Pearson)),
                )
                .await;
            }
        });

        Self {
            _mount: mount,
            matrix,
            pairs,
        }
    }
}

/// Regression -> spread pipeline for the selected pair.
#[derive(Debug)]
pub struct PairsPanel {
    _mount: Mount,
    pair: SelectionCell<SymbolPair>,
    slots: PairsSlots,
}

impl PairsPanel {
    fn mount(context: &ViewContext, pair: &SelectionCell<SymbolPair>) -> Self {
        let mut mount = Mount::new("analytics.pairs");
        let slots = PairsSlots::default();

        let period = context.intervals.pairs;
        let poller = KeyedPoller::new("pairs", mount.lane(), move |_: &SymbolPair| period, {
            let client = context.client.clone();
            let slots = slots.clone();
            move |pair: SymbolPair, generation| {
                let client = client.clone();
                let slots = slots.clone();
                async move {
                    run_pairs_cycle(&client, &pair, &generation, &slots).await;
                }
            }
        })
        .on_rekey({
            let slots = slots.clone();
            move |_| slots.reset()
        });
        let source = pair
            .subscribe()
            .filter(|pair: &SymbolPair| !pair.is_degenerate());
        mount.follow(source, poller);

        Self {
            _mount: mount,
            pair: pair.clone(),
            slots,
        }
    }

    pub fn regression(&self) -> Option<RegressionResult> {
        self.slots.regression.ready()
    }

    pub fn slots(&self) -> &PairsSlots {
        &self.slots
    }

    /// Spread of the currently selected pair; nothing while a stale pair's spread lingers
    pub fn spread(&self) -> Option<SpreadSnapshot> {
        let pair = self.pair.current()?;
        self.slots.spread_for(&pair)
    }

    pub fn signal(&self) -> Option<PairSignal> {
        self.spread().map(|spread| spread.signal())
    }
}

#[derive(Debug)]
pub struct AdfPanel {
    _mount: Mount,
    pub adf: Slot<AdfResult>,
}

impl AdfPanel {
    fn mount(context: &ViewContext, symbol: &SelectionCell<Symbol>) -> Self {
        let mut mount = Mount::new("analytics.adf");
        let adf = Slot::new();

        let period = context.intervals.adf;
        let poller = KeyedPoller::new("adf", mount.lane(), move |_: &Symbol| period, {
            let client = context.client.clone();
            let adf = adf.clone();
            move |symbol: Symbol, generation| {
                let client = client.clone();
                let adf = adf.clone();
                async move {
                    generation.apply(&adf, client.adf(symbol).await);
                }
            }
        })
        .on_rekey({
            let adf = adf.clone();
            move |_| adf.reset()
        });
        mount.follow(symbol.subscribe(), poller);

        Self { _mount: mount, adf }
    }
}

/// The mounted tab.
#[derive(Debug)]
pub enum TabPanel {
    Price(PricePanel),
    ZScore(ZScorePanel),
    Correlation(CorrelationPanel),
    Pairs(PairsPanel),
    Adf(AdfPanel),
}

impl TabPanel {
    pub fn tab(&self) -> AnalyticsTab {
        match self {
            TabPanel::Price(_) => AnalyticsTab::Price,
            TabPanel::ZScore(_) => AnalyticsTab::ZScore,
            TabPanel::Correlation(_) => AnalyticsTab::Correlation,
            TabPanel::Pairs(_) => AnalyticsTab::Pairs,
            TabPanel::Adf(_) => AnalyticsTab::Adf,
        }
    }
}

#[derive(Debug)]
pub struct AnalyticsView {
    _mount: Mount,
    context: ViewContext,
    summary: Slot<Summary>,
    symbol: SelectionCell<Symbol>,
    pair: SelectionCell<SymbolPair>,
    timeframe: SelectionCell<Timeframe>,
    panel: TabPanel,
}

impl AnalyticsView {
    pub fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("analytics");
        let summary = Slot::new();
        let symbol = SelectionCell::default();
        let pair = SelectionCell::default();
        let timeframe = SelectionCell::new(Some(Timeframe::default()));

        {
            let client = context.client.clone();
            let summary = summary.clone();
            let symbol = symbol.clone();
            let pair = pair.clone();
            mount.poll("summary", context.intervals.analytics_summary, move |generation| {
                let client = client.clone();
                let summary = summary.clone();
                let symbol = symbol.clone();
                let pair = pair.clone();
                async move {
                    let outcome = client.summary().await;
                    generation.commit(|| {
                        if let Ok(latest) = &outcome {
                            symbol.reconcile_default(&latest.symbols);
                            pair.reconcile_with(|| default_pair(&latest.symbols));
                        }
                        summary.apply(outcome);
                    });
                }
            });
        }

        let panel = TabPanel::Price(PricePanel::mount(context, &symbol, &timeframe));

        Self {
            _mount: mount,
            context: context.clone(),
            summary,
            symbol,
            pair,
            timeframe,
            panel,
        }
    }

    pub fn tab(&self) -> AnalyticsTab {
        self.panel.tab()
    }

    pub fn panel(&self) -> &TabPanel {
        &self.panel
    }

    /// Unmount the current tab and mount `tab`. Re-selecting the current tab is a no-op.
    pub fn select_tab(&mut self, tab: AnalyticsTab) {
        if tab == self.tab() {
            return;
        }

        let context = &self.context;
        let next = match tab {
            AnalyticsTab::Price => {
                TabPanel::Price(PricePanel::mount(context, &self.symbol, &self.timeframe))
            }
            AnalyticsTab::ZScore => TabPanel::ZScore(ZScorePanel::mount(context, &self.symbol)),
            AnalyticsTab::Correlation => TabPanel::Correlation(CorrelationPanel::mount(context)),
            AnalyticsTab::Pairs => TabPanel::Pairs(PairsPanel::mount(context, &self.pair)),
            AnalyticsTab::Adf => TabPanel::Adf(AdfPanel::mount(context, &self.symbol)),
        };

        // Old panel dropped here, closing its fence
        self.panel = next;
    }

    pub fn summary(&self) -> &Slot<Summary> {
        &self.summary
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.summary
            .ready()
            .map(|summary| summary.symbols)
            .unwrap_or_default()
    }

    pub fn symbol(&self) -> Option<Symbol> {
        self.symbol.current()
    }

    pub fn select_symbol(&self, symbol: Symbol) {
        self.symbol.set_user_selection(symbol);
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe.current().unwrap_or_default()
    }

    pub fn select_timeframe(&self, timeframe: Timeframe) {
        self.timeframe.set_user_selection(timeframe);
    }

    pub fn pair(&self) -> Option<SymbolPair> {
        self.pair.current()
    }

    pub fn select_pair(&self, pair: SymbolPair) {
        self.pair.set_user_selection(pair);
    }

    /// Replace the dependent leg; no-op until a pair exists
    pub fn select_pair_first(&self, symbol: Symbol) {
        self.pair.update(|current| {
            if let Some(pair) = current {
                pair.first = symbol;
            }
        });
    }

    /// Replace the hedge leg; no-op until a pair exists
    pub fn select_pair_second(&self, symbol: Symbol) {
        self.pair.update(|current| {
            if let Some(pair) = current {
                pair.second = symbol;
            }
        });
    }

    pub fn poll_interval(&self) -> Duration {
        match self.tab() {
            AnalyticsTab::Price => self.context.intervals.price_chart,
            AnalyticsTab::ZScore => self.context.intervals.zscore,
            AnalyticsTab::Correlation => self.context.intervals.correlation,
            AnalyticsTab::Pairs => self.context.intervals.pairs,
            AnalyticsTab::Adf => self.context.intervals.adf,
        }
    }
}

/// First two active symbols, if there are two
fn default_pair(symbols: &[Symbol]) -> Option<SymbolPair> {
    match symbols {
        [first, second, ..] => Some(SymbolPair::new(first.clone(), second.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DashboardConfig,
        endpoint::Endpoint,
        error::{ClientError, TransportReason},
        mock::MockTransport,
        slot::Snapshot,
    };
    use serde_json::json;

    fn analytics_service() -> MockTransport {
        MockTransport::new(|endpoint| match endpoint {
            Endpoint::Summary => Ok(json!({
                "symbols": ["BTCUSDT", "ETHUSDT"],
                "symbol_count": 2,
                "window_size": 100,
                "stats_available": 2,
                "latest_prices": {"BTCUSDT": 65000.0, "ETHUSDT": 3200.0}
            })),
            Endpoint::ExportOhlcv {
                symbol, timeframe, ..
            } => Ok(json!({"symbol": symbol, "timeframe": timeframe.to_string(), "ohlcv": []})),
            Endpoint::Stats { symbol } => Ok(json!({"symbol": symbol, "current_price": 1.0})),
            Endpoint::ZScore { symbol } => Ok(json!({"symbol": symbol, "zscore": 0.4})),
            Endpoint::Regression { symbol_x, symbol_y } => Ok(json!({
                "symbol_x": symbol_x,
                "symbol_y": symbol_y,
                "beta": 0.05
            })),
            Endpoint::Spread {
                symbol1,
                symbol2,
                hedge_ratio,
            } => Ok(json!({
                "symbol1": symbol1,
                "symbol2": symbol2,
                "hedge_ratio": hedge_ratio,
                "spread_zscore": -2.5
            })),
            Endpoint::CorrelationMatrix => Ok(json!({
                "symbols": ["BTCUSDT", "ETHUSDT"],
                "matrix": [[1.0, 0.8], [0.8, 1.0]]
            })),
            Endpoint::AllCorrelations { .. } => Err(ClientError::transport(
                "/analytics/correlation",
                TransportReason::Status(500),
            )),
            // Not enough observations yet
            Endpoint::Adf { symbol } => Err(ClientError::empty(format!("/analytics/adf/{symbol}"))),
            other => Err(ClientError::empty(other.label())),
        })
    }

    fn view(mock: &MockTransport) -> AnalyticsView {
        AnalyticsView::mount(&ViewContext::new(mock.client(), &DashboardConfig::default()))
    }

    #[test]
    fn test_default_pair() {
        struct TestCase {
            input: Vec<&'static str>,
            expected: Option<(&'static str, &'static str)>,
        }

        let tests = vec![
            TestCase {
                // TC0: no symbols
                input: vec![],
                expected: None,
            },
            TestCase {
                // TC1: a single symbol has no pair
                input: vec!["BTCUSDT"],
                expected: None,
            },
            TestCase {
                // TC2: first two symbols in service order
                input: vec!["SOLUSDT", "BTCUSDT", "ETHUSDT"],
                expected: Some(("SOLUSDT", "BTCUSDT")),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let symbols = test.input.into_iter().map(Symbol::from).collect::<Vec<_>>();
            let expected = test
                .expected
                .map(|(first, second)| SymbolPair::new(first.into(), second.into()));
            assert_eq!(default_pair(&symbols), expected, "TC{} failed", index);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_defaults_do_not_override_user_choice() {
        let mock = analytics_service();
        let view = view(&mock);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(view.symbol(), Some(Symbol::from("BTCUSDT")));
        assert_eq!(
            view.pair(),
            Some(SymbolPair::new("BTCUSDT".into(), "ETHUSDT".into()))
        );

        view.select_symbol(Symbol::from("ETHUSDT"));
        view.select_pair_first(Symbol::from("SOLUSDT"));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(mock.count("/analytics/summary") >= 3);
        assert_eq!(view.symbol(), Some(Symbol::from("ETHUSDT")));
        assert_eq!(
            view.pair(),
            Some(SymbolPair::new("SOLUSDT".into(), "ETHUSDT".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_tab_fetches_candles_and_stats_for_selection() {
        let mock = analytics_service();
        let view = view(&mock);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let TabPanel::Price(panel) = view.panel() else {
            panic!("price tab mounted by default");
        };
        assert_eq!(
            panel.candles.ready().map(|series| series.timeframe),
            Some("1m".to_string())
        );
        assert!(panel.stats.ready().is_some());

        view.select_timeframe(Timeframe::FiveMinutes);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let TabPanel::Price(panel) = view.panel() else {
            panic!("price tab still mounted");
        };
        assert_eq!(
            panel.candles.ready().map(|series| series.timeframe),
            Some("5m".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_tabs_stops_previous_tab() {
        let mock = analytics_service();
        let mut view = view(&mock);
        tokio::time::sleep(Duration::from_millis(10)).await;

        view.select_tab(AnalyticsTab::ZScore);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let candles_before = mock.count("/export/ohlcv");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.count("/export/ohlcv"), candles_before);
        assert!(mock.count("/analytics/zscore/BTCUSDT") >= 10);
        assert_eq!(view.poll_interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairs_tab_renders_signal_for_current_pair_only() {
        let mock = analytics_service();
        let mut view = view(&mock);
        tokio::time::sleep(Duration::from_millis(10)).await;

        view.select_tab(AnalyticsTab::Pairs);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let TabPanel::Pairs(panel) = view.panel() else {
            panic!("pairs tab mounted");
        };
        assert_eq!(panel.signal(), Some(PairSignal::LongSpread));
        assert_eq!(panel.spread().map(|spread| spread.hedge_ratio), Some(0.05));

        // Degenerate pair: nothing fetched, nothing rendered
        let spreads = mock.count("/analytics/spread");
        view.select_pair_second(Symbol::from("BTCUSDT"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        let TabPanel::Pairs(panel) = view.panel() else {
            panic!("pairs tab mounted");
        };
        assert_eq!(mock.count("/analytics/spread"), spreads);
        assert!(panel.spread().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_correlation_and_adf_tabs() {
        let mock = analytics_service();
        let mut view = view(&mock);
        tokio::time::sleep(Duration::from_millis(10)).await;

        view.select_tab(AnalyticsTab::Correlation);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let TabPanel::Correlation(panel) = view.panel() else {
            panic!("correlation tab mounted");
        };
        // One leg failing leaves the other committed
        assert!(panel.matrix.ready().is_some_and(|matrix| matrix.is_renderable()));
        assert!(panel.pairs.is_stale());

        view.select_tab(AnalyticsTab::Adf);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let TabPanel::Adf(panel) = view.panel() else {
            panic!("adf tab mounted");
        };
        assert_eq!(panel.adf.snapshot(), Snapshot::Empty);
    }
}
