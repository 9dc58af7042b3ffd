//! Reputation tracking
//!
//! Pure scoring logic applied to a proxy record for every observed outcome,
//! whether it came from a live request or a health probe.

use crate::models::ProxyRecord;

/// Smoothing factor for the success-rate and latency moving averages
pub const SMOOTHING: f64 = 0.2;

/// Consecutive failures after which a proxy is pulled out of rotation
pub const DEACTIVATION_THRESHOLD: i32 = 3;

/// Fold one outcome into a record's quality metrics.
///
/// A success resets the failure streak; a failure streak reaching
/// [`DEACTIVATION_THRESHOLD`] forces `active = false`. A success never
/// reactivates a record on its own: reactivation is an explicit
/// administrative action.
pub fn apply_outcome(record: &mut ProxyRecord, success: bool, response_time_ms: Option<f64>) {
    let observation = if success { 1.0 } else { 0.0 };

    record.success_rate = if record.has_history() {
        record.success_rate * (1.0 - SMOOTHING) + observation * SMOOTHING
    } else {
        // First observation initializes the average directly rather than
        // blending against an undefined prior.
        observation
    };

    if let Some(rt) = response_time_ms {
        record.avg_response_time_ms = Some(match record.avg_response_time_ms {
            Some(avg) => avg * (1.0 - SMOOTHING) + rt * SMOOTHING,
            None => rt,
        });
    }

    record.consecutive_failures = if success {
        0
    } else {
        record.consecutive_failures + 1
    };
    record.total_uses += 1;

    record.reputation_score = compute_score(record);

    if record.consecutive_failures >= DEACTIVATION_THRESHOLD {
        record.active = false;
    }
}

/// Recompute the 0-100 reputation score from a record's current metrics.
pub fn compute_score(record: &ProxyRecord) -> i32 {
    let mut score = 50.0;

    score += ((record.success_rate - 0.5) * 60.0).clamp(-30.0, 30.0);
    score += latency_bonus(record.avg_response_time_ms);
    score -= record.consecutive_failures as f64 * 5.0;
    score += (record.total_uses as f64 / 10.0).min(10.0);

    score.round().clamp(0.0, 100.0) as i32
}

/// Latency contribution: +15 below 500ms, -15 above 2000ms, linear between,
/// neutral when no measurement exists yet.
fn latency_bonus(avg_response_time_ms: Option<f64>) -> f64 {
    match avg_response_time_ms {
        None => 0.0,
        Some(ms) if ms < 500.0 => 15.0,
        Some(ms) if ms > 2000.0 => -15.0,
        Some(ms) => 15.0 - (ms - 500.0) / 1500.0 * 30.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;

    #[test]
    fn test_first_observation_initializes_averages() {
        let mut record = test_support::record(1);
        apply_outcome(&mut record, true, Some(300.0));

        assert_eq!(record.success_rate, 1.0);
        assert_eq!(record.avg_response_time_ms, Some(300.0));
        assert_eq!(record.total_uses, 1);
        assert_eq!(record.consecutive_failures, 0);
    }

    #[test]
    fn test_success_rate_ema_blending() {
        let mut record = test_support::record(1);
        apply_outcome(&mut record, true, None);
        apply_outcome(&mut record, false, None);

        // 1.0 * 0.8 + 0.0 * 0.2
        assert!((record.success_rate - 0.8).abs() < 1e-9);

        apply_outcome(&mut record, true, None);
        assert!((record.success_rate - (0.8 * 0.8 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_latency_ema_only_updates_with_measurement() {
        let mut record = test_support::record(1);
        apply_outcome(&mut record, true, Some(1000.0));
        apply_outcome(&mut record, true, None);
        assert_eq!(record.avg_response_time_ms, Some(1000.0));

        apply_outcome(&mut record, true, Some(500.0));
        assert!((record.avg_response_time_ms.unwrap() - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut record = test_support::record(1);
        apply_outcome(&mut record, false, None);
        apply_outcome(&mut record, false, None);
        assert_eq!(record.consecutive_failures, 2);

        apply_outcome(&mut record, true, None);
        assert_eq!(record.consecutive_failures, 0);
    }

    #[test]
    fn test_three_failures_deactivate() {
        let mut record = test_support::record(1);
        apply_outcome(&mut record, false, None);
        apply_outcome(&mut record, false, None);
        assert!(record.active);

        apply_outcome(&mut record, false, None);
        assert!(!record.active);
        assert_eq!(record.consecutive_failures, 3);
    }

    #[test]
    fn test_success_never_reactivates() {
        let mut record = test_support::record(1);
        for _ in 0..3 {
            apply_outcome(&mut record, false, None);
        }
        assert!(!record.active);

        for _ in 0..10 {
            apply_outcome(&mut record, true, Some(100.0));
        }
        assert!(!record.active);
        assert_eq!(record.consecutive_failures, 0);
    }

    #[test]
    fn test_latency_bonus_interpolation() {
        assert_eq!(latency_bonus(None), 0.0);
        assert_eq!(latency_bonus(Some(100.0)), 15.0);
        assert_eq!(latency_bonus(Some(3000.0)), -15.0);
        // Midpoint of the linear band
        assert!((latency_bonus(Some(1250.0))).abs() < 1e-9);
        assert!((latency_bonus(Some(500.0)) - 15.0).abs() < 1e-9);
        assert!((latency_bonus(Some(2000.0)) + 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_usage_bonus_caps_at_ten() {
        let mut record = test_support::record(1);
        record.total_uses = 1000;
        record.success_rate = 0.5;
        let capped = compute_score(&record);

        record.total_uses = 100;
        assert_eq!(compute_score(&record), capped);

        record.total_uses = 50;
        assert_eq!(compute_score(&record), 55);
    }

    #[test]
    fn test_score_stays_in_range_for_any_outcome_sequence() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        let mut record = test_support::record(1);

        for _ in 0..5000 {
            let success = rng.gen_bool(0.5);
            let rt = if rng.gen_bool(0.7) {
                Some(rng.gen_range(1.0..10_000.0))
            } else {
                None
            };
            apply_outcome(&mut record, success, rt);

            assert!((0..=100).contains(&record.reputation_score));
            assert!(record.consecutive_failures >= 0);
            assert!((0.0..=1.0).contains(&record.success_rate));
        }
    }

    #[test]
    fn test_score_extremes() {
        let mut record = test_support::record(1);
        // Healthy proxy with long history and fast responses
        record.success_rate = 1.0;
        record.avg_response_time_ms = Some(100.0);
        record.total_uses = 200;
        record.consecutive_failures = 0;
        assert_eq!(compute_score(&record), 100);

        // Degraded proxy: slow, failing, long streak
        record.success_rate = 0.0;
        record.avg_response_time_ms = Some(5000.0);
        record.consecutive_failures = 10;
        record.total_uses = 10;
        assert_eq!(compute_score(&record), 0);
    }
}
