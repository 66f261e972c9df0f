use crate::config::ExitPolicy;
use crate::data::BarSeries;
use crate::error::{Result, TradepulseError};
use crate::types::{Direction, ExitType};

/// Outcome of simulating one hypothetical position
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub exit_type: ExitType,
    /// Signed, direction-adjusted fractional return from entry to exit close
    pub realized_return: f64,
    /// Best favorable excursion over the whole simulated window, >= 0
    pub mfe: f64,
    /// Worst adverse excursion over the whole simulated window, <= 0
    pub mae: f64,
    pub bars_held: usize,
}

/// Working state for one simulator invocation. Never persisted or shared;
/// discarded once the outcome is computed.
struct SimulatedTrade {
    entry_price: f64,
    direction: Direction,
    /// Best price seen since entry, in the favorable direction
    best_price: f64,
    /// Worst price seen since entry, in the adverse direction
    worst_price: f64,
    trailing_stop: Option<f64>,
    bars_elapsed: usize,
}

impl SimulatedTrade {
    fn open(entry_price: f64, direction: Direction) -> Self {
        Self {
            entry_price,
            direction,
            best_price: entry_price,
            worst_price: entry_price,
            trailing_stop: None,
            bars_elapsed: 0,
        }
    }

    /// Direction-adjusted fractional return at `price`
    fn return_at(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price,
            Direction::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    fn favorable_excursion(&self) -> f64 {
        self.return_at(self.best_price).max(0.0)
    }

    fn adverse_excursion(&self) -> f64 {
        self.return_at(self.worst_price).min(0.0)
    }
}

/// Simulates the exit of a position opened at one entry candle, bar by bar,
/// under the configured policy. Exit conditions are checked in strict
/// priority order: stop-loss, early exit, trailing stop, time barrier.
/// Triggers are detected on intrabar extremes; every exit settles at the
/// triggering bar's close. Deterministic: no randomness, no wall clock.
pub struct BarrierSimulator<'a> {
    policy: &'a ExitPolicy,
}

impl<'a> BarrierSimulator<'a> {
    /// The policy must have passed [`ExitPolicy::validate`]
    pub fn new(policy: &'a ExitPolicy) -> Self {
        Self { policy }
    }

    pub fn simulate(
        &self,
        series: &BarSeries,
        entry_index: usize,
        direction: Direction,
    ) -> Result<TradeOutcome> {
        if entry_index + 1 >= series.len() {
            return Err(TradepulseError::Validation(format!(
                "entry index {} needs at least one forward bar in a series of {}",
                entry_index,
                series.len()
            )));
        }

        let entry_price = series.bar(entry_index).close;
        let mut trade = SimulatedTrade::open(entry_price, direction);

        let last_index = (entry_index + self.policy.max_holding_bars).min(series.len() - 1);

        for i in (entry_index + 1)..=last_index {
            let bar = series.bar(i);
            trade.bars_elapsed = i - entry_index;

            let (favorable_extreme, adverse_extreme) = match direction {
                Direction::Long => (bar.high, bar.low),
                Direction::Short => (bar.low, bar.high),
            };
            if trade.return_at(favorable_extreme) > trade.return_at(trade.best_price) {
                trade.best_price = favorable_extreme;
            }
            if trade.return_at(adverse_extreme) < trade.return_at(trade.worst_price) {
                trade.worst_price = adverse_extreme;
            }

            let drawdown = -trade.adverse_excursion();

            // a. Stop-loss: capital protection dominates everything else
            if drawdown >= self.policy.stop_loss_pct {
                return Ok(self.close(&trade, bar.close, ExitType::StopLoss));
            }

            // b. Early exit: smallest surviving tier wins
            if let Some(tier) = self
                .policy
                .early_exit_thresholds
                .iter()
                .find(|t| trade.bars_elapsed <= t.max_bars && drawdown >= t.adverse_excursion_pct)
            {
                return Ok(self.close(
                    &trade,
                    bar.close,
                    ExitType::EarlyExit(tier.label.clone()),
                ));
            }

            // c. Trailing stop: armed once favorable excursion has ever
            //    reached the activation threshold; the level follows the best
            //    price at a fixed distance
            if trade.favorable_excursion() >= self.policy.trailing_activation_pct {
                let level = match direction {
                    Direction::Long => {
                        trade.best_price * (1.0 - self.policy.trailing_distance_pct)
                    }
                    Direction::Short => {
                        trade.best_price * (1.0 + self.policy.trailing_distance_pct)
                    }
                };
                trade.trailing_stop = Some(level);

                let crossed = match direction {
                    Direction::Long => adverse_extreme <= level,
                    Direction::Short => adverse_extreme >= level,
                };
                if crossed {
                    return Ok(self.close(&trade, bar.close, ExitType::TrailingStop));
                }
            }

            // d. Time barrier
            if trade.bars_elapsed == self.policy.max_holding_bars {
                return Ok(self.close(&trade, bar.close, ExitType::TimeExit));
            }
        }

        // Series ended before any barrier resolved. Not an error; the entry
        // simply yields no label.
        let final_close = series.bar(last_index).close;
        Ok(self.close(&trade, final_close, ExitType::Incomplete))
    }

    fn close(&self, trade: &SimulatedTrade, exit_price: f64, exit_type: ExitType) -> TradeOutcome {
        TradeOutcome {
            exit_type,
            realized_return: trade.return_at(exit_price),
            mfe: trade.favorable_excursion(),
            mae: trade.adverse_excursion(),
            bars_held: trade.bars_elapsed,
        }
    }
}
