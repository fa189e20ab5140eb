use super::{Mount, ViewContext};
use crate::{
    config::RefreshRate,
    model::{LatestPrices, Symbol, Tick, TickBuffer},
    poll::{KeySourceExt, KeyedPoller},
    selection::SelectionCell,
    slot::Slot,
};

/// Latest prices and the recent ticks of one symbol, refreshed at a user-chosen rate.
#[derive(Debug)]
pub struct LiveView {
    _mount: Mount,
    symbol: SelectionCell<Symbol>,
    rate: SelectionCell<RefreshRate>,
    prices: Slot<LatestPrices>,
    ticks: Slot<TickBuffer>,
    tick_display: usize,
}

impl LiveView {
    pub fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("live");
        let symbol = SelectionCell::default();
        let rate = SelectionCell::new(Some(RefreshRate::default()));
        let prices = Slot::new();
        let ticks = Slot::new();

        let prices_poller = KeyedPoller::new(
            "latest_prices",
            mount.lane(),
            |rate: &RefreshRate| rate.interval(),
            {
                let client = context.client.clone();
                let prices = prices.clone();
                let symbol = symbol.clone();
                move |_rate, generation| {
                    let client = client.clone();
                    let prices = prices.clone();
                    let symbol = symbol.clone();
                    async move {
                        let outcome = client.latest_prices().await;
                        generation.commit(|| {
                            if let Ok(latest) = &outcome {
                                symbol.reconcile_default(&latest.symbols());
                            }
                            prices.apply(outcome);
                        });
                    }
                }
            },
        );
        mount.follow(rate.subscribe(), prices_poller);

        let limit = context.limits.tick_buffer;
        let ticks_poller = KeyedPoller::new(
            "tick_buffer",
            mount.lane(),
            |(_, rate): &(Symbol, RefreshRate)| rate.interval(),
            {
                let client = context.client.clone();
                let ticks = ticks.clone();
                move |(symbol, _rate): (Symbol, RefreshRate), generation| {
                    let client = client.clone();
                    let ticks = ticks.clone();
                    async move {
                        generation.apply(&ticks, client.tick_buffer(symbol, limit).await);
                    }
                }
            },
        );
        mount.follow(symbol.subscribe().zip(rate.subscribe()), ticks_poller);

        Self {
            _mount: mount,
            symbol,
            rate,
            prices,
            ticks,
            tick_display: context.limits.tick_display,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        self.symbol.current()
    }

    pub fn select_symbol(&self, symbol: Symbol) {
        self.symbol.set_user_selection(symbol);
    }

    pub fn refresh_rate(&self) -> RefreshRate {
        self.rate.current().unwrap_or_default()
    }

    pub fn set_refresh_rate(&self, rate: RefreshRate) {
        self.rate.set_user_selection(rate);
    }

    pub fn cycle_refresh_rate(&self) -> RefreshRate {
        let next = self.refresh_rate().next();
        self.set_refresh_rate(next);
        next
    }

    pub fn prices(&self) -> &Slot<LatestPrices> {
        &self.prices
    }

    pub fn ticks(&self) -> &Slot<TickBuffer> {
        &self.ticks
    }

    /// Symbols with a latest price, in the service's order
    pub fn symbols(&self) -> Vec<Symbol> {
        self.prices
            .ready()
            .map(|prices| prices.symbols())
            .unwrap_or_default()
    }

    /// First ticks of the buffer for the selected symbol, capped for display
    pub fn displayed_ticks(&self) -> Vec<Tick> {
        let Some(symbol) = self.symbol() else {
            return Vec::new();
        };

        self.ticks
            .ready()
            .filter(|buffer| buffer.symbol == symbol)
            .map(|buffer| buffer.ticks.into_iter().take(self.tick_display).collect())
            .unwrap_or_default()
    }
}
