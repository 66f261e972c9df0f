use crate::types::LabelRecord;
use std::collections::BTreeMap;

/// Distribution of exit types across a label set, logged after generation so
/// the exit taxonomy ("how often does the system cut losers") stays visible
#[derive(Debug, Default)]
pub struct LabelStats {
    pub total_count: usize,
    pub by_exit_type: BTreeMap<String, ExitTypeStats>,
}

#[derive(Debug, Default, Clone)]
pub struct ExitTypeStats {
    pub count: usize,
    pub share_pct: f64,
    pub mean_return: f64,
}

impl LabelStats {
    pub fn analyze(records: &[LabelRecord]) -> LabelStats {
        let mut stats = LabelStats::default();
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();

        for record in records {
            let key = record.exit_type.as_label();
            let entry = stats.by_exit_type.entry(key.clone()).or_default();
            entry.count += 1;
            *sums.entry(key).or_default() += record.realized_return;
            stats.total_count += 1;
        }

        for (key, entry) in stats.by_exit_type.iter_mut() {
            entry.share_pct = (entry.count as f64 / stats.total_count as f64) * 100.0;
            entry.mean_return = sums[key] / entry.count as f64;
        }

        stats
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .by_exit_type
            .iter()
            .map(|(key, s)| {
                format!(
                    "{}: {} ({:.1}%, mean return {:.4})",
                    key, s.count, s.share_pct, s.mean_return
                )
            })
            .collect();
        format!("{} labels [{}]", self.total_count, parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, ExitType, Timeframe};
    use chrono::{TimeZone, Utc};

    fn record(exit_type: ExitType, realized_return: f64) -> LabelRecord {
        LabelRecord {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::H1,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            direction: Direction::Long,
            score: realized_return,
            realized_return,
            mfe: realized_return.max(0.0),
            mae: realized_return.min(0.0),
            bars_held: 5,
            exit_type,
        }
    }

    #[test]
    fn test_analyze_counts_and_means() {
        let records = vec![
            record(ExitType::StopLoss, -0.02),
            record(ExitType::StopLoss, -0.02),
            record(ExitType::TimeExit, 0.01),
            record(ExitType::TrailingStop, 0.01),
        ];

        let stats = LabelStats::analyze(&records);
        assert_eq!(stats.total_count, 4);

        let stop = &stats.by_exit_type["stop_loss"];
        assert_eq!(stop.count, 2);
        assert!((stop.share_pct - 50.0).abs() < 1e-9);
        assert!((stop.mean_return - (-0.02)).abs() < 1e-9);
    }
}
