//! Core types for risk engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Subscriber account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Contact email
    pub email: String,

    /// Account creation time (source of the account-age signal)
    pub created_at: DateTime<Utc>,

    /// Inactive users are left out of risky listings
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// One plan period of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Plan name (basic, premium, family...)
    pub plan: String,

    /// Amount billed per period
    pub monthly_amount: Decimal,

    /// When this plan became effective
    pub started_at: DateTime<Utc>,

    /// When this plan stopped being effective, if it did
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    /// Plan that replaced this one (upgrade or downgrade)
    #[serde(default)]
    pub superseded_by: Option<Uuid>,
}

/// Payment status as recorded by billing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Funds collected
    #[serde(alias = "success")]
    Succeeded,
    /// Charge failed
    Failed,
    /// Charge declined by the issuer
    Declined,
    /// Not settled yet
    Pending,
}

impl PaymentStatus {
    /// Only a collected payment counts as success; everything else is a failure signal.
    pub fn is_succeeded(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded)
    }

    /// Inverse of [`PaymentStatus::is_succeeded`]
    pub fn is_failure(&self) -> bool {
        !self.is_succeeded()
    }
}

/// Billing attempt against a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID (secondary ordering key)
    pub id: Uuid,

    /// Subscription charged
    pub subscription_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Amount charged
    pub amount: Decimal,

    /// Outcome
    pub status: PaymentStatus,

    /// When the attempt happened; a missing value is a data integrity error
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Already-loaded records of one user, as handed over by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    /// The user
    pub user: User,

    /// Every subscription of the user
    pub subscriptions: Vec<Subscription>,

    /// Every payment of the user, across subscriptions
    pub payments: Vec<Payment>,
}

/// Risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Below the high threshold
    Low,
    /// At or above the high threshold, below critical
    High,
    /// At or above the critical threshold
    Critical,
}

impl RiskTier {
    /// Classify a score. Boundaries are inclusive on the higher tier.
    pub fn classify(score: f64, high_threshold: f64, critical_threshold: f64) -> Self {
        if score >= critical_threshold {
            RiskTier::Critical
        } else if score >= high_threshold {
            RiskTier::High
        } else {
            RiskTier::Low
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five sub-signals feeding the aggregate score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Failures among the most recent payments
    RecentFailure,
    /// Plan downgrade or low current amount
    Downgrade,
    /// Failures over the whole history
    GlobalFailure,
    /// First payment succeeded, every later one failed
    Pattern,
    /// Young accounts
    AccountAge,
}

impl SignalKind {
    /// Aggregation order
    pub const ALL: [SignalKind; 5] = [
        SignalKind::RecentFailure,
        SignalKind::Downgrade,
        SignalKind::GlobalFailure,
        SignalKind::Pattern,
        SignalKind::AccountAge,
    ];
}

/// A signal's normalized value and what it added to the score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    /// Normalized value in [0, 1]
    pub value: f64,

    /// Configured weight
    pub weight: f64,

    /// `value * weight`
    pub contribution: f64,
}

/// Risk assessment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// User assessed
    pub user_id: Uuid,

    /// Risk score in [0, 1]
    pub score: f64,

    /// Risk tier
    pub tier: RiskTier,

    /// Per-signal breakdown
    pub signals: BTreeMap<SignalKind, SignalContribution>,

    /// Assessment timestamp
    pub evaluated_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Normalized value of one signal (0 if absent)
    pub fn signal(&self, kind: SignalKind) -> f64 {
        self.signals.get(&kind).map(|s| s.value).unwrap_or(0.0)
    }

    /// Critical users are the ones callers alert on
    pub fn is_critical(&self) -> bool {
        self.tier == RiskTier::Critical
    }
}
