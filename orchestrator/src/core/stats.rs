//! Mean and standard deviation over sentinel-free score sequences
//!
//! Every function here returns 0 for empty input, never NaN.

use shared::{is_valid_score, ScoreSummary};

/// Keep only real judge ratings, dropping the sentinel
pub fn valid_scores<I>(scores: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    scores.into_iter().filter(|s| is_valid_score(*s)).collect()
}

/// Arithmetic mean
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// Summary of raw scores; the sentinel is filtered out first
pub fn summarize<I>(scores: I) -> ScoreSummary
where
    I: IntoIterator<Item = f64>,
{
    let valid = valid_scores(scores);
    ScoreSummary {
        mean: mean(&valid),
        std_dev: std_dev(&valid),
        count: valid.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::SENTINEL_SCORE;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(summarize(Vec::new()), ScoreSummary::default());
    }

    #[test]
    fn test_mean_and_population_std_dev() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&xs), 5.0);
        assert_eq!(std_dev(&xs), 2.0);
    }

    #[test]
    fn test_single_value_has_no_spread() {
        assert_eq!(mean(&[7.5]), 7.5);
        assert_eq!(std_dev(&[7.5]), 0.0);
    }

    #[test]
    fn test_sentinel_never_contributes() {
        let summary = summarize(vec![8.0, SENTINEL_SCORE, 6.0, SENTINEL_SCORE]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 7.0);
        assert_eq!(summary.std_dev, 1.0);
    }

    #[test]
    fn test_all_sentinel_is_zero() {
        let summary = summarize(vec![SENTINEL_SCORE, SENTINEL_SCORE]);
        assert_eq!(summary, ScoreSummary::default());
        assert!(!summary.mean.is_nan());
    }
}
