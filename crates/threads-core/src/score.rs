//! Recommendation scoring: importance, temperature ordinal, and a smooth
//! recency decay combined into one number.

use chrono::{DateTime, Utc};

use crate::model::{Document, Status, Temperature, Thread};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fractional days between `moment` and `now`, clamped at zero so
/// future-dated activity reads as happening right now.
pub fn days_since(moment: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - moment).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).max(0.0)
}

/// Temperature implied by elapsed time since the last activity.
pub fn compute_temperature(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> Temperature {
    let days = days_since(last_activity, now);
    if days <= 1.0 {
        Temperature::Hot
    } else if days <= 3.0 {
        Temperature::Warm
    } else if days <= 7.0 {
        Temperature::Tepid
    } else if days <= 14.0 {
        Temperature::Cold
    } else if days <= 30.0 {
        Temperature::Freezing
    } else {
        Temperature::Frozen
    }
}

/// `5 / (1 + days/7)`: five points at day zero, half that after a week,
/// never reaching zero.
pub fn recency_points(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    5.0 / (1.0 + days_since(last_activity, now) / 7.0)
}

/// `importance*3 + temperature*2 + recency*1`.
pub fn score(thread: &Thread, now: DateTime<Utc>) -> f64 {
    f64::from(thread.importance) * 3.0
        + f64::from(thread.temperature.ordinal()) * 2.0
        + recency_points(thread.last_activity(), now)
}

/// Active threads ranked best-first. Ties keep document order.
pub fn rank_threads(doc: &Document, now: DateTime<Utc>) -> Vec<(&Thread, f64)> {
    let mut scored: Vec<(&Thread, f64)> = doc
        .threads
        .iter()
        .filter(|thread| thread.status == Status::Active)
        .map(|thread| (thread, score(thread, now)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn temperature_follows_the_boundary_table() {
        let now = Utc::now();
        let cases = [
            (Duration::hours(12), Temperature::Hot),
            (Duration::days(1), Temperature::Hot),
            (Duration::hours(36), Temperature::Warm),
            (Duration::days(3), Temperature::Warm),
            (Duration::days(4), Temperature::Tepid),
            (Duration::days(7), Temperature::Tepid),
            (Duration::days(8), Temperature::Cold),
            (Duration::days(14), Temperature::Cold),
            (Duration::days(15), Temperature::Freezing),
            (Duration::days(30), Temperature::Freezing),
            (Duration::days(31), Temperature::Frozen),
            (Duration::days(365), Temperature::Frozen),
        ];
        for (age, expected) in cases {
            assert_eq!(compute_temperature(now - age, now), expected, "age {age}");
        }
    }

    #[test]
    fn recency_decays_but_never_reaches_zero() {
        let now = Utc::now();
        assert!((recency_points(now, now) - 5.0).abs() < 1e-9);
        assert!((recency_points(now - Duration::days(7), now) - 2.5).abs() < 1e-9);

        let mut previous = f64::MAX;
        for days in [0, 1, 3, 10, 40, 400, 4000] {
            let points = recency_points(now - Duration::days(days), now);
            assert!(points > 0.0);
            assert!(points <= previous);
            previous = points;
        }
    }

    #[test]
    fn future_dated_activity_clamps_to_now() {
        let now = Utc::now();
        let ahead = now + Duration::days(2);
        assert_eq!(days_since(ahead, now), 0.0);
        assert_eq!(compute_temperature(ahead, now), Temperature::Hot);
        assert!((recency_points(ahead, now) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn important_hot_thread_outranks_unimportant_frozen_one() {
        let now = Utc::now();
        let mut doc = Document::default();

        let mut busy = Thread::new("A");
        busy.importance = 5;
        busy.temperature = Temperature::Hot;
        let mut idle = Thread::new("B");
        idle.importance = 1;
        idle.temperature = Temperature::Frozen;
        doc.threads.extend([idle, busy]);

        let ranked = rank_threads(&doc, now);
        assert_eq!(ranked[0].0.name, "A");
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn only_active_threads_are_scored_and_ties_keep_order() {
        let now = Utc::now();
        let mut doc = Document::default();

        let mut paused = Thread::new("Paused");
        paused.status = Status::Paused;
        doc.threads.push(paused);
        doc.threads.push(Thread::new("First"));
        doc.threads.push(Thread::new("Second"));

        let names: Vec<&str> = rank_threads(&doc, now)
            .iter()
            .map(|(thread, _)| thread.name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }
}
