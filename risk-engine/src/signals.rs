//! The five normalized sub-signals
//!
//! Every function returns a value in [0, 1]. Sparse histories degrade to 0
//! instead of failing.

use crate::history::Timeline;
use crate::RiskConfig;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Share of the `window` latest payments that did not succeed
pub fn recent_failure_rate(timeline: &Timeline<'_>, window: usize) -> f64 {
    let mut total = 0usize;
    let mut failed = 0usize;
    for p in timeline.latest(window) {
        total += 1;
        if p.payment.status.is_failure() {
            failed += 1;
        }
    }
    ratio(failed, total)
}

/// Share of all payments that did not succeed
pub fn global_failure_rate(timeline: &Timeline<'_>) -> f64 {
    ratio(timeline.failure_count(), timeline.payments().len())
}

/// 1.0 when the first payment succeeded and every later one failed
pub fn pay_once_then_decline(timeline: &Timeline<'_>) -> f64 {
    match timeline.payments() {
        [first, rest @ ..] if !rest.is_empty() => {
            let pattern = first.payment.status.is_succeeded()
                && rest.iter().all(|p| p.payment.status.is_failure());
            if pattern {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Downgrade from an earlier plan: `(highest earlier amount, current amount)`
pub fn detect_downgrade(timeline: &Timeline<'_>) -> Option<(Decimal, Decimal)> {
    let subscriptions = timeline.subscriptions();
    let (current, earlier) = subscriptions.split_last()?;
    let previous_max = earlier.iter().map(|s| s.monthly_amount).max()?;

    if current.monthly_amount < previous_max {
        Some((previous_max, current.monthly_amount))
    } else {
        None
    }
}

/// 1.0 on a downgrade, otherwise the low-amount signal of the current plan
pub fn downgrade_signal(timeline: &Timeline<'_>, config: &RiskConfig) -> f64 {
    if detect_downgrade(timeline).is_some() {
        return 1.0;
    }
    low_amount_signal(
        timeline.current_subscription().monthly_amount,
        config.low_amount_floor,
        config.low_amount_reference,
    )
}

/// Linear ramp: 1 at or below `floor`, 0 at or above `reference`
pub fn low_amount_signal(amount: Decimal, floor: Decimal, reference: Decimal) -> f64 {
    if amount <= floor {
        return 1.0;
    }
    if amount >= reference {
        return 0.0;
    }
    let fraction = (reference - amount) / (reference - floor);
    clamp_unit(fraction.to_f64().unwrap_or(0.0))
}

/// Linear ramp: 1 for a brand-new account, 0 once `cutoff_days` old
pub fn account_age_signal(created_at: DateTime<Utc>, as_of: DateTime<Utc>, cutoff_days: i64) -> f64 {
    let age_days = (as_of - created_at).num_seconds() as f64 / SECONDS_PER_DAY;
    let cutoff = cutoff_days as f64;

    if age_days <= 0.0 {
        1.0
    } else if age_days >= cutoff {
        0.0
    } else {
        clamp_unit(1.0 - age_days / cutoff)
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Payment, PaymentStatus, Subscription, User};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use crate::PaymentStatus::{Declined, Failed, Pending, Succeeded};

    fn user() -> User {
        User {
            id: Uuid::from_u128(1),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            is_active: true,
        }
    }

    fn plans(amounts: &[i64]) -> Vec<Subscription> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| Subscription {
                id: Uuid::from_u128(100 + i as u128),
                user_id: Uuid::from_u128(1),
                plan: format!("plan-{}", i),
                monthly_amount: Decimal::from(*amount),
                started_at: Utc.with_ymd_and_hms(2024, 1 + i as u32, 1, 0, 0, 0).unwrap(),
                ended_at: None,
                superseded_by: None,
            })
            .collect()
    }

    fn history(statuses: &[PaymentStatus]) -> Vec<Payment> {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| Payment {
                id: Uuid::from_u128(1000 + i as u128),
                subscription_id: Uuid::from_u128(100),
                user_id: Uuid::from_u128(1),
                amount: Decimal::from(10),
                status: *status,
                occurred_at: Some(start + Duration::days(30 * i as i64)),
            })
            .collect()
    }

    #[test]
    fn test_recent_failure_uses_latest_window() {
        let user = user();
        let subs = plans(&[10]);
        let payments = history(&[Failed, Failed, Succeeded, Failed, Declined]);
        let timeline = Timeline::build(&user, &subs, &payments).unwrap();

        assert!((recent_failure_rate(&timeline, 3) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(recent_failure_rate(&timeline, 2), 1.0);
        assert!((global_failure_rate(&timeline) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_recent_failure_short_history() {
        let user = user();
        let subs = plans(&[10]);

        let empty = Timeline::build(&user, &subs, &[]).unwrap();
        assert_eq!(recent_failure_rate(&empty, 3), 0.0);
        assert_eq!(global_failure_rate(&empty), 0.0);

        let payments = history(&[Succeeded, Pending]);
        let timeline = Timeline::build(&user, &subs, &payments).unwrap();
        assert_eq!(recent_failure_rate(&timeline, 3), 0.5);
    }

    #[test]
    fn test_pattern_detection() {
        let user = user();
        let subs = plans(&[10]);
        let cases: &[(&[PaymentStatus], f64)] = &[
            (&[], 0.0),
            (&[Succeeded], 0.0),
            (&[Succeeded, Failed], 1.0),
            (&[Succeeded, Failed, Declined, Pending], 1.0),
            (&[Succeeded, Failed, Succeeded, Failed], 0.0),
            (&[Failed, Failed, Failed], 0.0),
            (&[Succeeded, Succeeded], 0.0),
        ];

        for (statuses, expected) in cases {
            let payments = history(statuses);
            let timeline = Timeline::build(&user, &subs, &payments).unwrap();
            assert_eq!(pay_once_then_decline(&timeline), *expected, "{:?}", statuses);
        }
    }

    #[test]
    fn test_downgrade_detected_against_any_earlier_plan() {
        let user = user();
        let config = RiskConfig::default();

        let subs = plans(&[15, 5, 12]);
        let timeline = Timeline::build(&user, &subs, &[]).unwrap();
        assert_eq!(detect_downgrade(&timeline), Some((Decimal::from(15), Decimal::from(12))));
        assert_eq!(downgrade_signal(&timeline, &config), 1.0);

        let subs = plans(&[5, 15]);
        let timeline = Timeline::build(&user, &subs, &[]).unwrap();
        assert_eq!(detect_downgrade(&timeline), None);
        assert_eq!(downgrade_signal(&timeline, &config), 0.0);
    }

    #[test]
    fn test_low_amount_ramp_is_monotonic() {
        let floor = Decimal::new(120, 2);
        let reference = Decimal::from(10);

        assert_eq!(low_amount_signal(Decimal::ZERO, floor, reference), 1.0);
        assert_eq!(low_amount_signal(floor, floor, reference), 1.0);
        assert_eq!(low_amount_signal(reference, floor, reference), 0.0);
        assert_eq!(low_amount_signal(Decimal::from(50), floor, reference), 0.0);

        let mid = low_amount_signal(Decimal::new(560, 2), floor, reference);
        assert!((mid - 0.5).abs() < 1e-12);

        let mut previous = 1.0;
        for cents in (0..1200).step_by(7) {
            let value = low_amount_signal(Decimal::new(cents, 2), floor, reference);
            assert!(value <= previous);
            previous = value;
        }
    }

    #[test]
    fn test_account_age_ramp() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(account_age_signal(created, created, 180), 1.0);
        assert_eq!(account_age_signal(created, created - Duration::days(3), 180), 1.0);
        assert_eq!(account_age_signal(created, created + Duration::days(180), 180), 0.0);
        assert_eq!(account_age_signal(created, created + Duration::days(900), 180), 0.0);

        let half = account_age_signal(created, created + Duration::days(90), 180);
        assert!((half - 0.5).abs() < 1e-12);
    }
}
