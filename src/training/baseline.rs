use super::trainer::{
    DirectionReport, EvalMetrics, ModelTrainer, TrainingObserver, TrainingReport,
};
use crate::error::{Result, TradepulseError};
use crate::jobs::record::TrainingParams;
use crate::types::{Direction, LabelRecord, Timeframe};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MODEL_VERSION: &str = "baseline-0.1";

/// Deterministic stand-in for the external gradient-boosted trainer, so the
/// daemon runs end-to-end without it. Per direction: temporal (unshuffled)
/// train/test split, then a seeded trial loop that picks the constant
/// predictor with the lowest training error among sampled quantiles of the
/// train-score distribution.
pub struct BaselineTrainer {
    seed: u64,
}

impl BaselineTrainer {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for BaselineTrainer {
    fn default() -> Self {
        Self::new(42)
    }
}

impl ModelTrainer for BaselineTrainer {
    fn train(
        &self,
        records: &[LabelRecord],
        timeframe: Timeframe,
        params: &TrainingParams,
        observer: &dyn TrainingObserver,
    ) -> Result<TrainingReport> {
        params.validate()?;

        let mut reports = Vec::with_capacity(2);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let total_trials = params.n_trials * Direction::all().len();

        for (direction_index, direction) in Direction::all().into_iter().enumerate() {
            let mut scores: Vec<(i64, f64)> = records
                .iter()
                .filter(|r| r.direction == direction)
                .map(|r| (r.timestamp.timestamp_millis(), r.score))
                .collect();
            if scores.len() < 4 {
                return Err(TradepulseError::Training(format!(
                    "not enough {} labels to train on {}: {}",
                    direction.as_str(),
                    timeframe,
                    scores.len()
                )));
            }

            // Temporal split: train strictly precedes test, no shuffling, so
            // labels cannot leak across the boundary
            scores.sort_by_key(|(ts, _)| *ts);
            let split = ((scores.len() as f64) * params.train_ratio) as usize;
            let split = split.clamp(1, scores.len() - 1);
            let (train, test) = scores.split_at(split);

            let mut train_sorted: Vec<f64> = train.iter().map(|(_, s)| *s).collect();
            train_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let mut best_prediction = mean(&train_sorted);
            let mut best_train_rmse = rmse_of_constant(&train_sorted, best_prediction);

            for trial in 0..params.n_trials {
                if observer.should_cancel() {
                    return Err(TradepulseError::Cancelled);
                }

                let q: f64 = rng.gen_range(0.0..1.0);
                let idx = ((train_sorted.len() - 1) as f64 * q).round() as usize;
                let candidate = train_sorted[idx];
                let candidate_rmse = rmse_of_constant(&train_sorted, candidate);
                if candidate_rmse < best_train_rmse {
                    best_train_rmse = candidate_rmse;
                    best_prediction = candidate;
                }

                observer.on_trial_complete(
                    direction_index * params.n_trials + trial + 1,
                    total_trials,
                );
            }

            let test_scores: Vec<f64> = test.iter().map(|(_, s)| *s).collect();
            let metrics = EvalMetrics {
                rmse: rmse_of_constant(&test_scores, best_prediction),
                mean_abs_error: test_scores
                    .iter()
                    .map(|s| (s - best_prediction).abs())
                    .sum::<f64>()
                    / test_scores.len() as f64,
                hit_rate: test_scores
                    .iter()
                    .filter(|s| s.signum() == best_prediction.signum())
                    .count() as f64
                    / test_scores.len() as f64,
            };

            debug!(
                "{} {} baseline: prediction {:.5}, test rmse {:.5}",
                timeframe,
                direction.as_str(),
                best_prediction,
                metrics.rmse
            );

            reports.push(DirectionReport {
                direction,
                train_samples: train.len(),
                test_samples: test.len(),
                metrics,
            });
        }

        Ok(TrainingReport {
            model_version: MODEL_VERSION.to_string(),
            feature_names: vec![
                "score".to_string(),
                "mfe".to_string(),
                "mae".to_string(),
                "bars_held".to_string(),
            ],
            reports,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn rmse_of_constant(values: &[f64], prediction: f64) -> f64 {
    let mse = values
        .iter()
        .map(|v| (v - prediction) * (v - prediction))
        .sum::<f64>()
        / values.len() as f64;
    mse.sqrt()
}
