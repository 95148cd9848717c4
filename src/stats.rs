//! Aggregate statistics over a batch of roll records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::expression::{Expression, Value};
use crate::roller::RollRecord;

/// How often one total came up in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub count: u64,
    /// `count / batch size * 100`.
    pub percentage: f64,
}

/// Read-only aggregate over a completed batch of [`RollRecord`]s.
///
/// Derived once per batch and never mutated afterwards. The sample
/// standard deviation uses Bessel's correction (divide by `N - 1`); a
/// single-record batch is defined to have a standard deviation of 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    /// Number of records in the batch.
    pub count: u64,
    /// Arithmetic mean of the totals.
    pub mean: f64,
    /// Exact expected value of the expression, from closed form, not
    /// sampling. Deviation of `mean` from this shrinks as `count` grows.
    pub theoretical_mean: f64,
    pub std_dev: f64,
    pub min: Value,
    pub max: Value,
    /// Occurrences of each observed total, ascending by total.
    pub frequency: BTreeMap<Value, Frequency>,
}

impl StatisticsSummary {
    /// Derives the summary of a batch rolled for `expr`.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for an empty batch; there is nothing
    /// meaningful to summarize.
    pub fn from_records(expr: &Expression, records: &[RollRecord]) -> Result<Self, Error> {
        let totals: Vec<Value> = records.iter().map(|r| r.total).collect();
        Self::from_totals(expr, &totals)
    }

    /// Same as [`StatisticsSummary::from_records`] but over bare totals.
    pub fn from_totals(expr: &Expression, totals: &[Value]) -> Result<Self, Error> {
        if totals.is_empty() {
            return Err(Error::Validation(
                "cannot summarize an empty batch of rolls".into(),
            ));
        }

        let count = totals.len() as u64;
        let sum: f64 = totals.iter().map(|&t| t as f64).sum();
        let mean = sum / count as f64;

        let std_dev = if count < 2 {
            0.0
        } else {
            let squared_deviations: f64 =
                totals.iter().map(|&t| (t as f64 - mean).powi(2)).sum();
            (squared_deviations / (count - 1) as f64).sqrt()
        };

        let (min, max) = totals
            .iter()
            .fold((Value::MAX, Value::MIN), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });

        let mut counts: BTreeMap<Value, u64> = BTreeMap::new();
        for &total in totals {
            *counts.entry(total).or_insert(0) += 1;
        }
        let frequency = counts
            .into_iter()
            .map(|(total, n)| {
                let percentage = n as f64 / count as f64 * 100.0;
                (total, Frequency { count: n, percentage })
            })
            .collect();

        Ok(StatisticsSummary {
            count,
            mean,
            theoretical_mean: expr.theoretical_mean(),
            std_dev,
            min,
            max,
            frequency,
        })
    }

    /// Absolute difference between the empirical and the theoretical mean.
    pub fn mean_deviation(&self) -> f64 {
        (self.mean - self.theoretical_mean).abs()
    }
}
