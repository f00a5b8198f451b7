use crate::models::{Side, Trade};

/// Risk parameters for protective-order derivation
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub leverage: f64,
    pub tp_pct: f64,
    pub sl_pct: f64,
    /// Widest allowed distance between entry and a protective price,
    /// as a fraction of entry
    pub max_distance_pct: f64,
    /// Absolute floor below which a price is considered implausible for
    /// this instrument's regime
    pub price_floor: f64,
}

impl RiskConfig {
    pub fn new(leverage: f64, tp_pct: f64, sl_pct: f64, price_floor: f64) -> Self {
        Self {
            leverage,
            tp_pct,
            sl_pct,
            max_distance_pct: 0.05,
            price_floor,
        }
    }
}

/// Take-profit and stop-loss prices for one entry, with clamp flags for
/// diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectiveLevels {
    pub take_profit: f64,
    pub stop_loss: f64,
    pub tp_clamped: bool,
    pub sl_clamped: bool,
}

/// Derive leverage-scaled protective prices from an entry.
///
/// long:  tp = E * (1 + tp_pct/L), sl = E * (1 - sl_pct/L)
/// short: tp = E * (1 - tp_pct/L), sl = E * (1 + sl_pct/L)
///
/// A target farther than `max_distance_pct` from entry is pulled back to
/// that bound in the direction the side implies, and flagged.
pub fn protective_levels(entry: f64, side: Side, config: &RiskConfig) -> ProtectiveLevels {
    let (mut tp, mut sl) = match side {
        Side::Long => (
            entry * (1.0 + config.tp_pct / config.leverage),
            entry * (1.0 - config.sl_pct / config.leverage),
        ),
        Side::Short => (
            entry * (1.0 - config.tp_pct / config.leverage),
            entry * (1.0 + config.sl_pct / config.leverage),
        ),
    };

    let max = config.max_distance_pct;
    let mut tp_clamped = false;
    let mut sl_clamped = false;

    if ((tp - entry) / entry).abs() > max {
        tp = match side {
            Side::Long => entry * (1.0 + max),
            Side::Short => entry * (1.0 - max),
        };
        tp_clamped = true;
    }
    if ((sl - entry) / entry).abs() > max {
        sl = match side {
            Side::Long => entry * (1.0 - max),
            Side::Short => entry * (1.0 + max),
        };
        sl_clamped = true;
    }

    ProtectiveLevels {
        take_profit: tp,
        stop_loss: sl,
        tp_clamped,
        sl_clamped,
    }
}

/// Whether an absolute price clears the configured realism floor
pub fn passes_price_floor(price: f64, floor: f64) -> bool {
    price >= floor
}

/// Realized outcome of a closed trade, net of two-sided commission
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
    pub net_pnl_pct: f64,
}

/// Settle a closed trade against its exit price.
pub fn settle(trade: &Trade, exit_price: f64, commission_rate: f64) -> TradeOutcome {
    let gross_pnl = match trade.side {
        Side::Long => (exit_price - trade.entry_price) * trade.quantity,
        Side::Short => (trade.entry_price - exit_price) * trade.quantity,
    };
    let commission =
        (trade.entry_price * trade.quantity + exit_price * trade.quantity) * commission_rate;
    let net_pnl = gross_pnl - commission;
    let net_pnl_pct = (net_pnl / (trade.entry_price * trade.quantity)) * 100.0;

    TradeOutcome {
        gross_pnl,
        commission,
        net_pnl,
        net_pnl_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(leverage: f64, tp_pct: f64, sl_pct: f64) -> RiskConfig {
        RiskConfig::new(leverage, tp_pct, sl_pct, 50_000.0)
    }

    #[test]
    fn test_long_levels() {
        // entry 60000, lev 10, tp 7%, sl 2.5%
        let levels = protective_levels(60_000.0, Side::Long, &config(10.0, 0.07, 0.025));
        assert!((levels.take_profit - 60_420.0).abs() < 1e-9);
        assert!((levels.stop_loss - 59_850.0).abs() < 1e-9);
        assert!(!levels.tp_clamped);
        assert!(!levels.sl_clamped);
    }

    #[test]
    fn test_short_levels_mirror() {
        let levels = protective_levels(60_000.0, Side::Short, &config(10.0, 0.07, 0.025));
        assert!((levels.take_profit - 59_580.0).abs() < 1e-9);
        assert!((levels.stop_loss - 60_150.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_never_exceeds_five_percent() {
        // leverage 1 with tp 7% would put the target 7% away
        let levels = protective_levels(60_000.0, Side::Long, &config(1.0, 0.07, 0.08));
        assert!(levels.tp_clamped);
        assert!(levels.sl_clamped);
        assert!((levels.take_profit - 63_000.0).abs() < 1e-9);
        assert!((levels.stop_loss - 57_000.0).abs() < 1e-9);

        for side in [Side::Long, Side::Short] {
            let levels = protective_levels(60_000.0, side, &config(1.0, 0.50, 0.50));
            let entry = 60_000.0;
            assert!(((levels.take_profit - entry) / entry).abs() <= 0.05 + 1e-12);
            assert!(((levels.stop_loss - entry) / entry).abs() <= 0.05 + 1e-12);
        }
    }

    #[test]
    fn test_high_leverage_levels_approach_entry() {
        let levels = protective_levels(60_000.0, Side::Long, &config(1e9, 0.07, 0.025));
        assert!((levels.take_profit - 60_000.0).abs() < 0.01);
        assert!((levels.stop_loss - 60_000.0).abs() < 0.01);
    }

    #[test]
    fn test_price_floor() {
        assert!(passes_price_floor(60_000.0, 50_000.0));
        assert!(passes_price_floor(50_000.0, 50_000.0));
        assert!(!passes_price_floor(40_000.0, 50_000.0));
    }

    #[test]
    fn test_settle_long_net_of_commission() {
        let trade = Trade {
            entry_price: 60_000.0,
            side: Side::Long,
            quantity: 0.01,
        };
        let outcome = settle(&trade, 60_600.0, 0.0004);
        assert!((outcome.gross_pnl - 6.0).abs() < 1e-9);
        assert!((outcome.commission - 0.4824).abs() < 1e-9);
        assert!((outcome.net_pnl - 5.5176).abs() < 1e-9);
        assert!((outcome.net_pnl_pct - 0.9196).abs() < 1e-4);
    }

    #[test]
    fn test_settle_short() {
        let trade = Trade {
            entry_price: 60_000.0,
            side: Side::Short,
            quantity: 0.01,
        };
        let outcome = settle(&trade, 59_400.0, 0.0);
        assert!((outcome.gross_pnl - 6.0).abs() < 1e-9);
        assert_eq!(outcome.commission, 0.0);
    }
}
