use super::{Mount, ViewContext};
use crate::{
    model::{AllStats, OutlierLevel, StatsSnapshot, Symbol, ZScoreSnapshot},
    poll::KeyedPoller,
    selection::SelectionCell,
    slot::Slot,
};

/// Rolling statistics of every symbol plus the z-score of the selected one.
#[derive(Debug)]
pub struct StatisticsView {
    _mount: Mount,
    symbol: SelectionCell<Symbol>,
    stats: Slot<AllStats>,
    zscore: Slot<ZScoreSnapshot>,
}

impl StatisticsView {
    pub fn mount(context: &ViewContext) -> Self {
        let mut mount = Mount::new("statistics");
        let symbol = SelectionCell::default();
        let stats = Slot::new();
        let zscore = Slot::new();

        {
            let client = context.client.clone();
            let stats = stats.clone();
            let symbol = symbol.clone();
            mount.poll("all_stats", context.intervals.statistics, move |generation| {
                let client = client.clone();
                let stats = stats.clone();
                let symbol = symbol.clone();
                async move {
                    let outcome = client.all_stats().await;
                    generation.commit(|| {
                        if let Ok(all) = &outcome {
                            let available = all.keys().cloned().collect::<Vec<_>>();
                            symbol.reconcile_default(&available);
                        }
                        stats.apply(outcome);
                    });
                }
            });
        }

        let period = context.intervals.statistics_zscore;
        let zscore_poller = KeyedPoller::new("stats_zscore", mount.lane(), move |_: &Symbol| period, {
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
        // The previous symbol's z-score must not be shown against the new one
        .on_rekey({
            let zscore = zscore.clone();
            move |_| zscore.reset()
        });
        mount.follow(symbol.subscribe(), zscore_poller);

        Self {
            _mount: mount,
            symbol,
            stats,
            zscore,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        self.symbol.current()
    }

    pub fn select_symbol(&self, symbol: Symbol) {
        self.symbol.set_user_selection(symbol);
    }

    pub fn stats(&self) -> &Slot<AllStats> {
        &self.stats
    }

    pub fn zscore(&self) -> &Slot<ZScoreSnapshot> {
        &self.zscore
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.stats
            .ready()
            .map(|all| all.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn selected_stats(&self) -> Option<StatsSnapshot> {
        let symbol = self.symbol()?;
        self.stats.ready()?.swap_remove(&symbol)
    }

    /// Classification of the selected symbol's latest z-score; a missing value reads as 0
    pub fn outlier_level(&self) -> OutlierLevel {
        let zscore = self
            .zscore
            .ready()
            .map(|snapshot| snapshot.zscore)
            .unwrap_or_default();
        OutlierLevel::from_zscore(zscore)
    }
}
