//! Priority scoring.
//!
//! `score = 2·impact + 1.5·urgency − effort`, plus a due-date bonus (+2 within 24h,
//! otherwise +1 within 72h) and +1 per active context bonus, clamped to [0, 100] and
//! rounded to one decimal. Buckets use inclusive lower bounds at 80/60/40.

use chrono::{DateTime, Duration, Utc};

use crate::fields::Bucket;

pub const DEFAULT_LEVEL: u8 = 2;

/// Everything the scoring function looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreInput {
    pub impact: u8,
    pub urgency: u8,
    pub effort: u8,
    pub due: Option<DateTime<Utc>>,
    /// All dependencies are finished.
    pub unblocked: bool,
    /// The task belongs to a meeting context.
    pub meeting: bool,
}

/// Compute the score for `input` as seen at `now`.
pub fn compute_score(input: &ScoreInput, now: DateTime<Utc>) -> f64 {
    let mut score =
        2.0 * f64::from(input.impact) + 1.5 * f64::from(input.urgency) - f64::from(input.effort);

    if let Some(due) = input.due {
        let remaining = due - now;
        if remaining <= Duration::hours(24) {
            score += 2.0;
        } else if remaining <= Duration::hours(72) {
            score += 1.0;
        }
    }
    if input.unblocked {
        score += 1.0;
    }
    if input.meeting {
        score += 1.0;
    }

    round1(score.clamp(0.0, 100.0))
}

/// Map a score to its bucket.
pub fn bucket_for_score(score: f64) -> Bucket {
    if score >= 80.0 {
        Bucket::P0
    } else if score >= 60.0 {
        Bucket::P1
    } else if score >= 40.0 {
        Bucket::P2
    } else {
        Bucket::P3
    }
}

/// Score and bucket together; an explicit bucket always wins over the computed one.
pub fn evaluate(input: &ScoreInput, explicit: Option<Bucket>, now: DateTime<Utc>) -> (f64, Bucket) {
    let score = compute_score(input, now);
    (score, explicit.unwrap_or_else(|| bucket_for_score(score)))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(impact: u8, urgency: u8, effort: u8) -> ScoreInput {
        ScoreInput { impact, urgency, effort, ..Default::default() }
    }

    #[test]
    fn test_base_formula() {
        let now = Utc::now();
        assert_eq!(compute_score(&input(2, 2, 2), now), 5.0);
        assert_eq!(compute_score(&input(5, 5, 0), now), 17.5);
        assert_eq!(compute_score(&input(0, 1, 0), now), 1.5);
    }

    #[test]
    fn test_score_is_clamped_at_zero() {
        assert_eq!(compute_score(&input(0, 0, 5), Utc::now()), 0.0);
    }

    #[test]
    fn test_impact_is_monotonic() {
        let now = Utc::now();
        for urgency in 0..=5 {
            for effort in 0..=5 {
                let mut prev = f64::MIN;
                for impact in 0..=5 {
                    let s = compute_score(&input(impact, urgency, effort), now);
                    assert!(s >= prev, "impact {impact} urgency {urgency} effort {effort}");
                    assert!((0.0..=100.0).contains(&s));
                    prev = s;
                }
            }
        }
    }

    #[test]
    fn test_due_windows_nearer_wins() {
        let now = Utc::now();
        let mut i = input(2, 2, 2);
        i.due = Some(now + Duration::hours(10));
        assert_eq!(compute_score(&i, now), 7.0);
        i.due = Some(now + Duration::hours(48));
        assert_eq!(compute_score(&i, now), 6.0);
        i.due = Some(now + Duration::hours(100));
        assert_eq!(compute_score(&i, now), 5.0);
        i.due = Some(now - Duration::hours(3));
        assert_eq!(compute_score(&i, now), 7.0);
    }

    #[test]
    fn test_bonus_flags() {
        let now = Utc::now();
        let mut i = input(2, 2, 2);
        i.unblocked = true;
        i.meeting = true;
        assert_eq!(compute_score(&i, now), 7.0);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket_for_score(80.0), Bucket::P0);
        assert_eq!(bucket_for_score(79.9), Bucket::P1);
        assert_eq!(bucket_for_score(60.0), Bucket::P1);
        assert_eq!(bucket_for_score(59.9), Bucket::P2);
        assert_eq!(bucket_for_score(40.0), Bucket::P2);
        assert_eq!(bucket_for_score(39.9), Bucket::P3);
        assert_eq!(bucket_for_score(0.0), Bucket::P3);
    }

    #[test]
    fn test_explicit_bucket_wins() {
        let now = Utc::now();
        let (score, bucket) = evaluate(&input(1, 1, 1), Some(Bucket::P0), now);
        assert_eq!(score, 2.5);
        assert_eq!(bucket, Bucket::P0);
        let (_, bucket) = evaluate(&input(1, 1, 1), None, now);
        assert_eq!(bucket, Bucket::P3);
    }
}
