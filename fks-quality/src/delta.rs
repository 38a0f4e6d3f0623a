//! The delta scanner: stateful tick-level direction and micro-change
//! detection, plus a rolling up/down binary encoding.

use std::collections::VecDeque;

/// Direction of a tick relative to the previous price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Price rose by at least `min_change`.
    Up,
    /// Price fell by at least `min_change`.
    Down,
    /// Price moved by less than `min_change` in either direction.
    Neutral,
}

/// One scanned tick's result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaResult {
    /// Direction relative to the previous tick.
    pub direction: Direction,
    /// Percent change from the previous price: `100*(p-p_prev)/p_prev`.
    pub delta_pct: f64,
    /// Whether `|delta_pct|` is below the configured micro threshold.
    pub is_micro_change: bool,
}

/// Scanner configuration.
#[derive(Debug, Clone, Copy)]
pub struct DeltaScannerConfig {
    /// Minimum absolute price change to count as up/down rather than
    /// neutral.
    pub min_change: f64,
    /// Percent-change magnitude below which a move is classified micro.
    pub micro_threshold_pct: f64,
    /// Maximum number of binary symbols retained for
    /// [`DeltaScanner::get_binary_sequence`].
    pub max_history: usize,
}

impl Default for DeltaScannerConfig {
    fn default() -> Self {
        Self { min_change: 0.0, micro_threshold_pct: 0.01, max_history: 1_000 }
    }
}

/// Stateful per-symbol scanner: holds the previous price and a rolling
/// buffer of up/down binary symbols.
pub struct DeltaScanner {
    cfg: DeltaScannerConfig,
    prev_price: Option<f64>,
    binary_history: VecDeque<u8>,
}

impl DeltaScanner {
    /// Build a scanner with the given configuration and no prior tick.
    #[must_use]
    pub fn new(cfg: DeltaScannerConfig) -> Self {
        Self { cfg, prev_price: None, binary_history: VecDeque::with_capacity(cfg.max_history) }
    }

    /// Feed one tick's price. Returns `None` for the first tick (no
    /// previous price to compare against).
    pub fn on_tick(&mut self, price: f64) -> Option<DeltaResult> {
        let prev = self.prev_price.replace(price)?;

        let diff = price - prev;
        let direction = if diff >= self.cfg.min_change {
            Direction::Up
        } else if -diff >= self.cfg.min_change {
            Direction::Down
        } else {
            Direction::Neutral
        };

        let delta_pct = if prev == 0.0 { 0.0 } else { 100.0 * diff / prev };
        let is_micro_change = delta_pct.abs() < self.cfg.micro_threshold_pct;

        if let Some(symbol) = match direction {
            Direction::Up => Some(1u8),
            Direction::Down => Some(0u8),
            Direction::Neutral => None,
        } {
            if self.binary_history.len() == self.cfg.max_history {
                self.binary_history.pop_front();
            }
            self.binary_history.push_back(symbol);
        }

        Some(DeltaResult { direction, delta_pct, is_micro_change })
    }

    /// The most recent `max_length` binary symbols (`1`=up, `0`=down),
    /// oldest first, concatenated into a string. Neutral ticks never
    /// contribute a symbol.
    #[must_use]
    pub fn get_binary_sequence(&self, max_length: usize) -> String {
        let skip = self.binary_history.len().saturating_sub(max_length);
        self.binary_history.iter().skip(skip).map(|b| char::from(b'0' + b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_prior_to_compare_against() {
        let mut scanner = DeltaScanner::new(DeltaScannerConfig::default());
        assert!(scanner.on_tick(100.0).is_none());
    }

    #[test]
    fn up_and_down_directions_are_classified() {
        let mut scanner = DeltaScanner::new(DeltaScannerConfig::default());
        scanner.on_tick(100.0);
        let up = scanner.on_tick(101.0).unwrap();
        assert_eq!(up.direction, Direction::Up);
        let down = scanner.on_tick(99.0).unwrap();
        assert_eq!(down.direction, Direction::Down);
    }

    #[test]
    fn neutral_requires_min_change_threshold() {
        let cfg = DeltaScannerConfig { min_change: 1.0, ..DeltaScannerConfig::default() };
        let mut scanner = DeltaScanner::new(cfg);
        scanner.on_tick(100.0);
        let result = scanner.on_tick(100.5).unwrap();
        assert_eq!(result.direction, Direction::Neutral);
    }

    #[test]
    fn delta_pct_matches_documented_formula() {
        let mut scanner = DeltaScanner::new(DeltaScannerConfig::default());
        scanner.on_tick(100.0);
        let result = scanner.on_tick(110.0).unwrap();
        assert!((result.delta_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn small_moves_flagged_as_micro_change() {
        let mut scanner = DeltaScanner::new(DeltaScannerConfig::default());
        scanner.on_tick(100.0);
        let result = scanner.on_tick(100.005).unwrap();
        assert!(result.is_micro_change);
    }

    #[test]
    fn neutral_moves_do_not_extend_binary_history() {
        let cfg = DeltaScannerConfig { min_change: 1.0, ..DeltaScannerConfig::default() };
        let mut scanner = DeltaScanner::new(cfg);
        scanner.on_tick(100.0);
        scanner.on_tick(100.5);
        scanner.on_tick(102.0);
        assert_eq!(scanner.get_binary_sequence(10), "1");
    }

    #[test]
    fn binary_sequence_returns_most_recent_symbols_in_order() {
        let mut scanner = DeltaScanner::new(DeltaScannerConfig::default());
        let prices = [100.0, 101.0, 100.0, 102.0, 101.0, 103.0];
        for p in prices {
            scanner.on_tick(p);
        }
        // up, down, up, down, up -> "10101"
        assert_eq!(scanner.get_binary_sequence(10), "10101");
        assert_eq!(scanner.get_binary_sequence(2), "01");
    }

    #[test]
    fn history_buffer_respects_max_history_cap() {
        let cfg = DeltaScannerConfig { max_history: 3, ..DeltaScannerConfig::default() };
        let mut scanner = DeltaScanner::new(cfg);
        let mut price = 100.0;
        for _ in 0..10 {
            price += 1.0;
            scanner.on_tick(price);
        }
        assert_eq!(scanner.get_binary_sequence(100).len(), 3);
    }
}
