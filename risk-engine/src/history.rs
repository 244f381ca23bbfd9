//! Chronological view of a user's billing history
//!
//! Payments from every subscription of a user are merged into one timeline
//! ordered by `(occurred_at, id)`; the payment ID breaks timestamp ties so
//! the ordering is reproducible. Subscriptions are ordered by
//! `(started_at, id)`.

use crate::{Error, Payment, Result, Subscription, User};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Payment with its validated timestamp
#[derive(Debug, Clone, Copy)]
pub struct TimedPayment<'a> {
    /// Underlying record
    pub payment: &'a Payment,

    /// `payment.occurred_at`, known to be present
    pub occurred_at: DateTime<Utc>,
}

/// Validated, ordered history of one user
#[derive(Debug, Clone)]
pub struct Timeline<'a> {
    user: &'a User,
    subscriptions: Vec<&'a Subscription>,
    payments: Vec<TimedPayment<'a>>,
}

impl<'a> Timeline<'a> {
    /// Validate the records of `user` and order them
    pub fn build(
        user: &'a User,
        subscriptions: &'a [Subscription],
        payments: &'a [Payment],
    ) -> Result<Self> {
        if subscriptions.is_empty() {
            return Err(Error::InsufficientData(format!(
                "User {} has no subscriptions",
                user.id
            )));
        }

        let mut ordered_subscriptions = Vec::with_capacity(subscriptions.len());
        let mut known_subscriptions: HashSet<Uuid> = HashSet::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            if subscription.user_id != user.id {
                return Err(Error::DataIntegrity(format!(
                    "Subscription {} belongs to user {}, not {}",
                    subscription.id, subscription.user_id, user.id
                )));
            }
            known_subscriptions.insert(subscription.id);
            ordered_subscriptions.push(subscription);
        }
        ordered_subscriptions.sort_by(|a, b| (a.started_at, a.id).cmp(&(b.started_at, b.id)));

        let mut timed = Vec::with_capacity(payments.len());
        for payment in payments {
            if payment.user_id != user.id {
                return Err(Error::DataIntegrity(format!(
                    "Payment {} belongs to user {}, not {}",
                    payment.id, payment.user_id, user.id
                )));
            }
            if !known_subscriptions.contains(&payment.subscription_id) {
                return Err(Error::DataIntegrity(format!(
                    "Payment {} references unknown subscription {}",
                    payment.id, payment.subscription_id
                )));
            }
            let occurred_at = payment.occurred_at.ok_or_else(|| {
                Error::DataIntegrity(format!("Payment {} has no timestamp", payment.id))
            })?;
            timed.push(TimedPayment { payment, occurred_at });
        }
        timed.sort_by(|a, b| (a.occurred_at, a.payment.id).cmp(&(b.occurred_at, b.payment.id)));

        Ok(Self {
            user,
            subscriptions: ordered_subscriptions,
            payments: timed,
        })
    }

    /// User the timeline belongs to
    pub fn user(&self) -> &'a User {
        self.user
    }

    /// Payments, oldest first
    pub fn payments(&self) -> &[TimedPayment<'a>] {
        &self.payments
    }

    /// Up to `n` payments, newest first
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &TimedPayment<'a>> + '_ {
        self.payments.iter().rev().take(n)
    }

    /// Subscriptions, oldest first
    pub fn subscriptions(&self) -> &[&'a Subscription] {
        &self.subscriptions
    }

    /// Most recently started subscription
    pub fn current_subscription(&self) -> &'a Subscription {
        // build() rejects empty subscription lists
        self.subscriptions[self.subscriptions.len() - 1]
    }

    /// Number of failed (non-succeeded) payments
    pub fn failure_count(&self) -> usize {
        self.payments
            .iter()
            .filter(|p| p.payment.status.is_failure())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaymentStatus;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn user() -> User {
        User {
            id: Uuid::from_u128(1),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            is_active: true,
        }
    }

    fn subscription(id: u128, month: u32, amount: i64) -> Subscription {
        Subscription {
            id: Uuid::from_u128(id),
            user_id: Uuid::from_u128(1),
            plan: "basic".to_string(),
            monthly_amount: Decimal::from(amount),
            started_at: Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
            ended_at: None,
            superseded_by: None,
        }
    }

    fn payment(id: u128, sub: u128, day: u32, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::from_u128(id),
            subscription_id: Uuid::from_u128(sub),
            user_id: Uuid::from_u128(1),
            amount: Decimal::from(5),
            status,
            occurred_at: Some(Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_payments_merged_across_subscriptions() {
        let user = user();
        let subs = vec![subscription(20, 3, 10), subscription(10, 1, 5)];
        let payments = vec![
            payment(103, 20, 9, PaymentStatus::Failed),
            payment(101, 10, 1, PaymentStatus::Succeeded),
            payment(102, 20, 5, PaymentStatus::Declined),
        ];

        let timeline = Timeline::build(&user, &subs, &payments).unwrap();
        let ids: Vec<u128> = timeline.payments().iter().map(|p| p.payment.id.as_u128()).collect();
        assert_eq!(ids, vec![101, 102, 103]);

        let newest: Vec<u128> = timeline.latest(2).map(|p| p.payment.id.as_u128()).collect();
        assert_eq!(newest, vec![103, 102]);

        assert_eq!(timeline.current_subscription().id, Uuid::from_u128(20));
        assert_eq!(timeline.subscriptions()[0].id, Uuid::from_u128(10));
        assert_eq!(timeline.failure_count(), 2);
    }

    #[test]
    fn test_timestamp_ties_broken_by_id() {
        let user = user();
        let subs = vec![subscription(10, 1, 5)];
        let payments = vec![
            payment(3, 10, 1, PaymentStatus::Failed),
            payment(1, 10, 1, PaymentStatus::Succeeded),
            payment(2, 10, 1, PaymentStatus::Failed),
        ];

        let timeline = Timeline::build(&user, &subs, &payments).unwrap();
        let ids: Vec<u128> = timeline.payments().iter().map(|p| p.payment.id.as_u128()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_subscriptions_is_insufficient_data() {
        let user = user();
        let result = Timeline::build(&user, &[], &[]);
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_missing_timestamp_is_integrity_error() {
        let user = user();
        let subs = vec![subscription(10, 1, 5)];
        let mut bad = payment(1, 10, 1, PaymentStatus::Failed);
        bad.occurred_at = None;

        let result = Timeline::build(&user, &subs, std::slice::from_ref(&bad));
        assert!(matches!(result, Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_foreign_records_rejected() {
        let user = user();
        let subs = vec![subscription(10, 1, 5)];

        let mut foreign = payment(1, 10, 1, PaymentStatus::Failed);
        foreign.user_id = Uuid::from_u128(99);
        assert!(matches!(
            Timeline::build(&user, &subs, std::slice::from_ref(&foreign)),
            Err(Error::DataIntegrity(_))
        ));

        let orphan = payment(1, 77, 1, PaymentStatus::Failed);
        assert!(matches!(
            Timeline::build(&user, &subs, std::slice::from_ref(&orphan)),
            Err(Error::DataIntegrity(_))
        ));

        let mut other_sub = subscription(11, 2, 5);
        other_sub.user_id = Uuid::from_u128(99);
        assert!(matches!(
            Timeline::build(&user, std::slice::from_ref(&other_sub), &[]),
            Err(Error::DataIntegrity(_))
        ));
    }
}
