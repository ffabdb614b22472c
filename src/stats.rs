//! Shared descriptive statistics over numeric samples
//!
//! The analyzers, the trend comparison and the top-sessions ranking all
//! summarize distributions the same way, so the fold lives here as a free
//! function instead of being re-derived per caller.

use serde::{Deserialize, Serialize};

/// Descriptive statistics for a sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    /// Sample size
    pub count: usize,
    /// Sum of all values
    pub sum: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Median (midpoint average for even-sized samples)
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

/// Compute [`BasicStats`] for a sample. An empty sample yields all zeros.
pub fn basic_stats(values: &[f64]) -> BasicStats {
    if values.is_empty() {
        return BasicStats::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("samples must not contain NaN"));

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;

    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    BasicStats {
        count,
        sum,
        mean,
        median,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[count - 1],
    }
}

/// Mean of a sample, zero when empty
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sample() {
        let stats = basic_stats(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_odd_sample() {
        let stats = basic_stats(&[3.0, 1.0, 2.0]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 6.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.median, 2.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_even_sample_median() {
        let stats = basic_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.median, 2.5);
    }

    #[test]
    fn test_std_dev() {
        // Population of {2, 4, 4, 4, 5, 5, 7, 9} has stddev exactly 2.
        let stats = basic_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_helper() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }
}
