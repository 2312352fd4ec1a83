//! Sleep quality scoring.
//!
//! Three components: duration (50 points), composition (25 points) and
//! restoration (25 points). Stage summaries drive composition and the wake
//! penalty when present; classic logs without stage data fall back to a flat
//! composition and an interruption penalty.

/// Input snapshot for one sleep session, scores are derived once at insert
/// time and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepScoreInput {
    pub minutes_asleep: i32,
    /// Efficiency percentage, 0-100.
    pub efficiency: i32,
    pub detail: ScoreDetail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreDetail {
    /// Stage minute summaries from the interval-level payload.
    Stages {
        deep_minutes: i32,
        rem_minutes: i32,
        wake_minutes: i32,
    },
    /// Interruption counts from the classic payload.
    Classic {
        awake_count: i32,
        restless_count: i32,
        minutes_to_fall_asleep: i32,
    },
}

/// Derive a 0-100 quality score. Deterministic, each component is clamped
/// to its maximum before the rounded sum.
pub fn calculate_sleep_score(input: &SleepScoreInput) -> i32 {
    let total = duration_score(input.minutes_asleep)
        + composition_score(input)
        + restoration_score(input);
    total.round() as i32
}

// Duration, 50 points max. 7-9 hours scores full marks, shorter sleep drops
// off as 50 * (hours/7)^1.15, longer sleep loses 8 points per hour past 9.
fn duration_score(minutes_asleep: i32) -> f64 {
    let hours = f64::from(minutes_asleep) / 60.0;
    let score = if (7.0..=9.0).contains(&hours) {
        50.0
    } else if hours < 7.0 {
        50.0 * (hours / 7.0).powf(1.15)
    } else {
        50.0 - (hours - 9.0) * 8.0
    };
    score.clamp(0.0, 50.0)
}

// Composition, 25 points max. Deep sleep optimal at 13-23% of time asleep,
// REM optimal at 20-25%, 12.5 points each. Without stage summaries a flat 20.
fn composition_score(input: &SleepScoreInput) -> f64 {
    match input.detail {
        ScoreDetail::Stages {
            deep_minutes,
            rem_minutes,
            ..
        } if input.minutes_asleep > 0 => {
            let deep_pct = f64::from(deep_minutes) / f64::from(input.minutes_asleep) * 100.0;
            let rem_pct = f64::from(rem_minutes) / f64::from(input.minutes_asleep) * 100.0;
            band_score(deep_pct, 13.0, 23.0) + band_score(rem_pct, 20.0, 25.0)
        }
        _ => 20.0,
    }
}

// 12.5 points inside [lo, hi], linear ramp below, 1.5 points lost per
// percentage point above.
fn band_score(pct: f64, lo: f64, hi: f64) -> f64 {
    let score = if pct < lo {
        12.5 * pct / lo
    } else if pct <= hi {
        12.5
    } else {
        12.5 - (pct - hi) * 1.5
    };
    score.clamp(0.0, 12.5)
}

// Restoration, 25 points max: 15 from efficiency plus a 10 point wakefulness
// allowance, reduced by time awake (stage data) or by interruptions and
// minutes to fall asleep (classic data).
fn restoration_score(input: &SleepScoreInput) -> f64 {
    let efficiency = f64::from(input.efficiency).clamp(0.0, 100.0) / 100.0 * 15.0;
    let wakefulness = match input.detail {
        ScoreDetail::Stages { wake_minutes, .. } => {
            let wake_pct = if input.minutes_asleep > 0 {
                f64::from(wake_minutes) / f64::from(input.minutes_asleep) * 100.0
            } else {
                0.0
            };
            10.0 - wake_pct * 2.0
        }
        ScoreDetail::Classic {
            awake_count,
            restless_count,
            minutes_to_fall_asleep,
        } => {
            10.0 - 0.5 * f64::from(awake_count + restless_count)
                - 0.1 * f64::from(minutes_to_fall_asleep)
        }
    };
    (efficiency + wakefulness.clamp(0.0, 10.0)).clamp(0.0, 25.0)
}

#[cfg(test)]
mod tests {
    use crate::sleep_score::{
        calculate_sleep_score, duration_score, ScoreDetail, SleepScoreInput,
    };

    #[test]
    fn test_duration_score_bands() {
        assert!((duration_score(480) - 50.0).abs() < f64::EPSILON);
        assert!((duration_score(420) - 50.0).abs() < f64::EPSILON);
        assert!((duration_score(540) - 50.0).abs() < f64::EPSILON);
        assert!(duration_score(300) < duration_score(360));
        // never negative no matter how degenerate the input
        assert!(duration_score(0).abs() < f64::EPSILON);
        assert!(duration_score(20 * 60).abs() < f64::EPSILON);
    }

    #[test]
    fn test_optimal_night_with_stages() {
        // 8h asleep, 95% efficiency, deep and rem inside their optimal bands
        let input = SleepScoreInput {
            minutes_asleep: 480,
            efficiency: 95,
            detail: ScoreDetail::Stages {
                deep_minutes: 90,
                rem_minutes: 110,
                wake_minutes: 0,
            },
        };
        let score = calculate_sleep_score(&input);
        // 50 + 25 + (14.25 + 10) = 99.25
        assert_eq!(score, 99);
    }

    #[test]
    fn test_classic_without_interruptions() {
        let input = SleepScoreInput {
            minutes_asleep: 480,
            efficiency: 95,
            detail: ScoreDetail::Classic {
                awake_count: 0,
                restless_count: 0,
                minutes_to_fall_asleep: 0,
            },
        };
        // 50 + 20 + (14.25 + 10) = 94.25
        assert_eq!(calculate_sleep_score(&input), 94);
    }

    #[test]
    fn test_interruptions_reduce_restoration() {
        let restless = SleepScoreInput {
            minutes_asleep: 480,
            efficiency: 95,
            detail: ScoreDetail::Classic {
                awake_count: 4,
                restless_count: 10,
                minutes_to_fall_asleep: 45,
            },
        };
        let calm = SleepScoreInput {
            minutes_asleep: 480,
            efficiency: 95,
            detail: ScoreDetail::Classic {
                awake_count: 0,
                restless_count: 0,
                minutes_to_fall_asleep: 5,
            },
        };
        assert!(calculate_sleep_score(&restless) < calculate_sleep_score(&calm));
    }

    #[test]
    fn test_score_bounds() {
        let inputs = [
            SleepScoreInput {
                minutes_asleep: 0,
                efficiency: 0,
                detail: ScoreDetail::Stages {
                    deep_minutes: 0,
                    rem_minutes: 0,
                    wake_minutes: 600,
                },
            },
            SleepScoreInput {
                minutes_asleep: 266,
                efficiency: 84,
                detail: ScoreDetail::Stages {
                    deep_minutes: 120,
                    rem_minutes: 10,
                    wake_minutes: 95,
                },
            },
            SleepScoreInput {
                minutes_asleep: 540,
                efficiency: 100,
                detail: ScoreDetail::Stages {
                    deep_minutes: 100,
                    rem_minutes: 120,
                    wake_minutes: 5,
                },
            },
        ];
        for input in &inputs {
            let score = calculate_sleep_score(input);
            assert!((0..=100).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn test_deterministic() {
        let input = SleepScoreInput {
            minutes_asleep: 406,
            efficiency: 92,
            detail: ScoreDetail::Stages {
                deep_minutes: 60,
                rem_minutes: 85,
                wake_minutes: 40,
            },
        };
        assert_eq!(
            calculate_sleep_score(&input),
            calculate_sleep_score(&input)
        );
    }
}
