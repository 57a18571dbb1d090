//! Distance-to-confidence calibration.
//!
//! Confidence is a linear map of the best match's squared distance onto
//! `[0, 1]`: `1 - d / max_distance`, clamped to zero at or beyond the
//! threshold, rounded to two decimals. It is a calibration, not a
//! probability.

use crate::models::SearchResult;

/// Distance threshold shared by confidence scoring and the
/// retrieval-strength guardrail.
pub const DEFAULT_MAX_DISTANCE: f32 = 1.5;

/// Confidence of an ordered result list (closest first).
///
/// ```rust
/// use ultradoc_core::confidence::calculate_confidence;
///
/// assert_eq!(calculate_confidence(&[], 1.5), 0.0);
/// ```
pub fn calculate_confidence(results: &[SearchResult], max_distance: f32) -> f64 {
    let Some(best) = results.first() else {
        return 0.0;
    };
    let d = best.distance as f64;
    let max = max_distance as f64;
    if d >= max {
        return 0.0;
    }
    round2(1.0 - d / max)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn at(distance: f32) -> Vec<SearchResult> {
        vec![SearchResult {
            chunk: Chunk {
                text: "t".to_string(),
                page: 1,
            },
            distance,
        }]
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(calculate_confidence(&[], DEFAULT_MAX_DISTANCE), 0.0);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(calculate_confidence(&at(0.0), DEFAULT_MAX_DISTANCE), 1.0);
        assert_eq!(calculate_confidence(&at(1.5), DEFAULT_MAX_DISTANCE), 0.0);
        assert_eq!(calculate_confidence(&at(3.0), DEFAULT_MAX_DISTANCE), 0.0);
    }

    #[test]
    fn test_linear_and_rounded() {
        assert_eq!(calculate_confidence(&at(0.75), DEFAULT_MAX_DISTANCE), 0.5);
        assert_eq!(calculate_confidence(&at(0.5), 2.0), 0.75);
        // 1 - 0.1/1.5 = 0.9333...
        assert_eq!(calculate_confidence(&at(0.1), DEFAULT_MAX_DISTANCE), 0.93);
    }

    #[test]
    fn test_only_first_result_counts() {
        let mut results = at(0.3);
        results.extend(at(0.0));
        assert_eq!(calculate_confidence(&results, DEFAULT_MAX_DISTANCE), 0.8);
    }

    #[test]
    fn test_monotonic_non_increasing() {
        let mut last = f64::INFINITY;
        for step in 0..=40 {
            let c = calculate_confidence(&at(step as f32 * 0.05), DEFAULT_MAX_DISTANCE);
            assert!((0.0..=1.0).contains(&c));
            assert!(c <= last);
            last = c;
        }
    }
}
