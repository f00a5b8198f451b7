use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Settings;
use crate::gateway::Gateway;
use crate::models::{round_to_precision, ProtectiveKind, Side, Signal, Trade};
use crate::risk::{self, passes_price_floor, protective_levels, RiskConfig};
use crate::strategy::Strategy;

/// Attempts for each protective-order placement after entry
const PROTECTIVE_ATTEMPTS: u32 = 2;
const PROTECTIVE_DELAY: Duration = Duration::from_secs(2);

/// Per-symbol lifecycle state. Created once per configured symbol and
/// lives for the process lifetime; only its fields transition.
///
/// Invariants: an open position implies a trade on record, except within
/// the single tick where an exchange-side close has not yet been
/// reconciled locally. An armed cooldown implies no open position.
#[derive(Debug, Clone, Default)]
pub struct SymbolState {
    pub position_open: bool,
    pub cooling_until: Option<DateTime<Utc>>,
    pub trade: Option<Trade>,
}

/// Drives every symbol through scan -> enter -> protect -> exit -> cool
/// down, one pass per polling tick. Symbols are processed sequentially so
/// per-symbol state never races; the exchange session is shared.
pub struct LifecycleController {
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    strategy: Arc<dyn Strategy>,
    settings: Settings,
    risk: RiskConfig,
    states: HashMap<String, SymbolState>,
}

impl LifecycleController {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        clock: Arc<dyn Clock>,
        strategy: Arc<dyn Strategy>,
        settings: Settings,
    ) -> Self {
        let risk = RiskConfig::new(
            settings.strategy.leverage,
            settings.strategy.tp_pct,
            settings.strategy.sl_pct,
            settings.strategy.price_floor,
        );
        let states = settings
            .symbols
            .iter()
            .map(|s| (s.clone(), SymbolState::default()))
            .collect();
        Self {
            gateway,
            clock,
            strategy,
            settings,
            risk,
            states,
        }
    }

    pub fn state(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    /// Poll forever with a fixed inter-tick delay. The delay is a floor,
    /// not a precise period; processing time adds to it.
    pub async fn run(&mut self) {
        info!(
            "Starting polling loop: {} symbols, {} timeframes",
            self.settings.symbols.len(),
            self.settings.timeframes.len()
        );
        loop {
            self.tick().await;
            self.clock
                .sleep(Duration::from_secs(self.settings.poll_interval_secs))
                .await;
        }
    }

    /// One full pass over all configured symbols. A failure on one symbol
    /// never halts the others.
    pub async fn tick(&mut self) {
        for symbol in self.settings.symbols.clone() {
            let mut state = self.states.remove(&symbol).unwrap_or_default();
            if let Err(e) = self.poll_symbol(&symbol, &mut state).await {
                error!("Error processing {}: {}", symbol, e);
            }
            self.states.insert(symbol, state);
        }
    }

    async fn poll_symbol(&self, symbol: &str, state: &mut SymbolState) -> anyhow::Result<()> {
        let now = self.clock.now();

        if let Some(until) = state.cooling_until {
            if now < until {
                debug!("{} cooling down until {}", symbol, until);
                return Ok(());
            }
            info!("{} cooldown expired, resuming scans", symbol);
            state.cooling_until = None;
        }

        // Exchange truth wins over the local cache
        let size = self.gateway.position_size(symbol).await?;

        if state.position_open && size == 0.0 {
            self.reconcile_close(symbol, state, now).await;
            return Ok(());
        }
        if !state.position_open && size > 0.0 {
            info!("{} has a live position on the exchange, adopting it", symbol);
            state.position_open = true;
        }

        if state.position_open {
            return self.manage_open(symbol, state, now).await;
        }

        self.scan(symbol, state).await
    }

    /// The exchange reports flat while we thought a position was open:
    /// settle against the last 1-minute close and arm the cooldown. An
    /// accounting failure still forces the transition out of the open state
    /// since the position is factually flat; it just skips the cooldown.
    async fn reconcile_close(&self, symbol: &str, state: &mut SymbolState, now: DateTime<Utc>) {
        info!("{} position closed on the exchange", symbol);
        state.position_open = false;

        let Some(trade) = state.trade.take() else {
            error!("{} closed but no trade on record, skipping settlement", symbol);
            return;
        };
        let candles = self.gateway.fetch_candles(symbol, "1m", 2).await;
        let Some(last) = candles.last() else {
            error!("{} no exit price available, settlement skipped", symbol);
            return;
        };

        let outcome = risk::settle(&trade, last.close, self.settings.strategy.commission_pct);
        info!(
            "{} settled: gross {:.4}, commission {:.4}, net {:.4} ({:.4}%)",
            symbol, outcome.gross_pnl, outcome.commission, outcome.net_pnl, outcome.net_pnl_pct
        );
        state.cooling_until = Some(now + chrono::Duration::minutes(self.settings.cooldown_minutes));
    }

    /// An open position with a trade on record: recompute the take-profit
    /// from the entry and, when the latest close has reached it in the
    /// favorable direction, re-issue the take-profit and hand the rest of
    /// the exit to the exchange.
    async fn manage_open(
        &self,
        symbol: &str,
        state: &mut SymbolState,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let Some(trade) = state.trade.clone() else {
            debug!("{} open without a trade on record, waiting for close", symbol);
            return Ok(());
        };

        let candles = self.gateway.fetch_candles(symbol, "1m", 2).await;
        let Some(last) = candles.last() else {
            warn!("{} no current price, leaving position untouched", symbol);
            return Ok(());
        };

        let levels = protective_levels(trade.entry_price, trade.side, &self.risk);
        let touched = match trade.side {
            Side::Long => last.close >= levels.take_profit,
            Side::Short => last.close <= levels.take_profit,
        };
        if !touched {
            debug!(
                "{} holding: close {:.2}, take-profit {:.2}",
                symbol, last.close, levels.take_profit
            );
            return Ok(());
        }

        info!(
            "{} take-profit reached at {:.2}, re-issuing exit order",
            symbol, last.close
        );
        self.place_protective(symbol, &trade, ProtectiveKind::TakeProfit, levels.take_profit)
            .await;

        // The take-profit fill itself is delegated to the exchange; arm the
        // cooldown now and stop tracking the trade.
        state.trade = None;
        state.position_open = false;
        state.cooling_until = Some(now + chrono::Duration::minutes(self.settings.cooldown_minutes));
        Ok(())
    }

    /// Evaluate timeframes in priority order; the first actionable signal
    /// wins and ends evaluation for this tick, whether or not the entry
    /// succeeds.
    async fn scan(&self, symbol: &str, state: &mut SymbolState) -> anyhow::Result<()> {
        let balance = self.gateway.fetch_balance().await;
        if balance < self.settings.strategy.fixed_size_usd {
            info!(
                "{} skipped: balance {:.2} below position size {:.2}",
                symbol, balance, self.settings.strategy.fixed_size_usd
            );
            return Ok(());
        }

        for timeframe in &self.settings.timeframes {
            let candles = self
                .gateway
                .fetch_candles(symbol, timeframe, self.settings.candle_limit)
                .await;
            if candles.is_empty() {
                warn!("{} no candles on {}, skipping timeframe", symbol, timeframe);
                continue;
            }

            let signal = match self.strategy.generate_signal(&candles) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("{} signal on {} failed: {}", symbol, timeframe, e);
                    continue;
                }
            };
            let side = match signal {
                Signal::Buy => Side::Long,
                Signal::Sell => Side::Short,
                Signal::Hold => continue,
            };

            info!(
                "{} actionable {:?} signal on {} ({})",
                symbol,
                signal,
                timeframe,
                self.strategy.name()
            );
            let entry_price = candles.last().map(|c| c.close).unwrap_or_default();
            self.enter(symbol, state, side, entry_price).await?;
            break;
        }
        Ok(())
    }

    async fn enter(
        &self,
        symbol: &str,
        state: &mut SymbolState,
        side: Side,
        entry_price: f64,
    ) -> anyhow::Result<()> {
        if !passes_price_floor(entry_price, self.risk.price_floor) {
            warn!(
                "{} entry refused: price {:.2} below floor {:.2}",
                symbol, entry_price, self.risk.price_floor
            );
            return Ok(());
        }

        let info = self.gateway.market_info(symbol).await?;
        let notional = self.settings.strategy.fixed_size_usd * self.settings.strategy.leverage;
        let quantity = round_to_precision(notional / entry_price, info.quantity_precision);

        let Some(order) = self
            .gateway
            .submit_market_order(symbol, side, quantity)
            .await?
        else {
            warn!("{} market order rejected, staying flat", symbol);
            return Ok(());
        };
        if !order.is_filled() {
            warn!(
                "{} order {} not filled ({:?}), staying flat",
                symbol, order.id, order.status
            );
            return Ok(());
        }

        // Fills become visible on the position endpoint with a short lag
        self.clock
            .sleep(Duration::from_secs(self.settings.confirm_delay_secs))
            .await;
        let size = self.gateway.position_size(symbol).await?;
        if size == 0.0 {
            warn!("{} fill not confirmed by the exchange, staying flat", symbol);
            return Ok(());
        }

        let trade = Trade {
            entry_price,
            side,
            quantity,
        };
        info!(
            "{} entered {:?} {:.6} @ {:.2}",
            symbol, side, quantity, entry_price
        );
        state.trade = Some(trade.clone());
        state.position_open = true;

        let levels = protective_levels(entry_price, side, &self.risk);
        if levels.sl_clamped || levels.tp_clamped {
            warn!(
                "{} protective levels clamped: sl {:.2}, tp {:.2}",
                symbol, levels.stop_loss, levels.take_profit
            );
        }
        self.place_protective(symbol, &trade, ProtectiveKind::StopLoss, levels.stop_loss)
            .await;
        self.place_protective(symbol, &trade, ProtectiveKind::TakeProfit, levels.take_profit)
            .await;
        Ok(())
    }

    /// Place one protective order with a bounded local retry. An implausible
    /// trigger price aborts the placement without touching the position.
    async fn place_protective(
        &self,
        symbol: &str,
        trade: &Trade,
        kind: ProtectiveKind,
        trigger_price: f64,
    ) {
        if !passes_price_floor(trigger_price, self.risk.price_floor) {
            error!(
                "{} {:?} trigger {:.2} below floor {:.2}, placement aborted",
                symbol, kind, trigger_price, self.risk.price_floor
            );
            return;
        }

        for attempt in 1..=PROTECTIVE_ATTEMPTS {
            match self
                .gateway
                .submit_protective_order(symbol, kind, trade.side, trade.quantity, trigger_price)
                .await
            {
                Ok(()) => {
                    info!("{} {:?} placed @ {:.2}", symbol, kind, trigger_price);
                    return;
                }
                Err(e) if attempt < PROTECTIVE_ATTEMPTS && e.is_transient() => {
                    warn!(
                        "{} {:?} attempt {}/{} failed: {}",
                        symbol, kind, attempt, PROTECTIVE_ATTEMPTS, e
                    );
                    self.clock.sleep(PROTECTIVE_DELAY).await;
                }
                Err(e) => {
                    error!("{} {:?} placement failed: {}", symbol, kind, e);
                    return;
                }
            }
        }
    }
}
