//! Detailed per-user risk analysis for the support team
//!
//! Wraps a [`RiskAssessment`] with payment statistics, human readable risk
//! factors and the follow-up actions recommended for the tier.

use crate::history::Timeline;
use crate::signals;
use crate::{Payment, Result, RiskAssessment, RiskEngine, RiskTier, Subscription, UserHistory};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RECENT_HISTORY_LEN: usize = 10;
const RECENT_FAILURE_FACTOR: f64 = 0.4;
const OVERALL_FAILURE_FACTOR: f64 = 0.3;
const NEW_ACCOUNT_DAYS: i64 = 30;

/// Per-user analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysis {
    /// User ID
    pub user_id: Uuid,
    /// Display name
    pub user_name: String,
    /// Contact email
    pub user_email: String,
    /// Score, tier and signal breakdown
    pub assessment: RiskAssessment,
    /// All payments on record
    pub total_payments: usize,
    /// Non-succeeded payments
    pub failed_payments: usize,
    /// Succeeded payments
    pub successful_payments: usize,
    /// `failed_payments / total_payments`, 0 without payments
    pub failure_rate: f64,
    /// Plan of the latest subscription
    pub current_plan: String,
    /// Amount of the latest subscription
    pub current_amount: Decimal,
    /// Oldest first
    pub subscription_history: Vec<Subscription>,
    /// Newest first
    pub recent_payments: Vec<Payment>,
    /// Human readable reasons
    pub risk_factors: Vec<String>,
    /// Follow-up actions for the tier
    pub recommendations: Vec<String>,
}

/// Analyze one user's history as of `as_of`
pub fn analyze(engine: &RiskEngine, history: &UserHistory, as_of: DateTime<Utc>) -> Result<RiskAnalysis> {
    let timeline = Timeline::build(&history.user, &history.subscriptions, &history.payments)?;
    let assessment = engine.assess_timeline(&timeline, as_of);

    let total_payments = timeline.payments().len();
    let failed_payments = timeline.failure_count();
    let current = timeline.current_subscription();

    Ok(RiskAnalysis {
        user_id: history.user.id,
        user_name: history.user.name.clone(),
        user_email: history.user.email.clone(),
        total_payments,
        failed_payments,
        successful_payments: total_payments - failed_payments,
        failure_rate: signals::global_failure_rate(&timeline),
        current_plan: current.plan.clone(),
        current_amount: current.monthly_amount,
        subscription_history: timeline.subscriptions().iter().map(|s| (*s).clone()).collect(),
        recent_payments: timeline
            .latest(RECENT_HISTORY_LEN)
            .map(|p| p.payment.clone())
            .collect(),
        risk_factors: risk_factors(&timeline, engine, as_of),
        recommendations: recommendations(assessment.tier),
        assessment,
    })
}

/// Human readable reasons behind a score
pub fn risk_factors(timeline: &Timeline<'_>, engine: &RiskEngine, as_of: DateTime<Utc>) -> Vec<String> {
    if timeline.payments().is_empty() {
        return vec!["No payment history".to_string()];
    }

    let config = engine.config();
    let mut factors = Vec::new();

    let recent: Vec<_> = timeline.latest(config.recent_window).collect();
    if recent.len() >= 2 {
        let failed = recent.iter().filter(|p| p.payment.status.is_failure()).count();
        let rate = failed as f64 / recent.len() as f64;
        if rate > RECENT_FAILURE_FACTOR {
            factors.push(format!("High failure rate on recent payments ({})", percent(rate)));
            factors.push(format!("Failed {}/{} of last payments", failed, recent.len()));
        }
    }

    if signals::pay_once_then_decline(timeline) > 0.0 {
        factors.push("Classic pattern: paid initially, then declined subsequent payments".to_string());
    }

    if let Some((previous, current)) = signals::detect_downgrade(timeline) {
        factors.push(format!("Downgrade detected: {} -> {}", previous, current));
    }

    let current_amount = timeline.current_subscription().monthly_amount;
    if current_amount <= Decimal::new(300, 2) {
        factors.push(format!(
            "Low cost subscription ({}) - high departure risk",
            current_amount
        ));
    }

    let overall = signals::global_failure_rate(timeline);
    if overall > OVERALL_FAILURE_FACTOR {
        factors.push(format!("Overall failure rate: {}", percent(overall)));
    }

    if as_of - timeline.user().created_at < Duration::days(NEW_ACCOUNT_DAYS) {
        factors.push("New account (less than 30 days)".to_string());
    }

    let latest_two: Vec<_> = timeline.latest(2).collect();
    if latest_two.len() == 2 && latest_two.iter().all(|p| p.payment.status.is_failure()) {
        factors.push("Multiple consecutive recent failures".to_string());
    }

    if factors.is_empty() {
        factors.push("Low risk profile".to_string());
    }
    factors
}

/// Follow-up actions for a tier
pub fn recommendations(tier: RiskTier) -> Vec<String> {
    let actions: &[&str] = match tier {
        RiskTier::Critical => &[
            "Immediate contact required for payment method verification",
            "Consider temporary account restrictions",
            "Review subscription value proposition with user",
            "Implement payment retry with different methods",
        ],
        RiskTier::High => &[
            "Proactive outreach for payment method update",
            "Offer payment assistance or alternative methods",
            "Monitor closely for upcoming payments",
            "Consider retention campaigns",
        ],
        RiskTier::Low => &[
            "Continue standard monitoring",
            "Maintain regular communication",
        ],
    };
    actions.iter().map(|a| a.to_string()).collect()
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PaymentStatus, RiskConfig, User};
    use chrono::TimeZone;

    use crate::PaymentStatus::{Declined, Failed, Succeeded};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn history(account_age_days: i64, amounts: &[i64], statuses: &[PaymentStatus]) -> UserHistory {
        let user_id = Uuid::from_u128(42);
        let created_at = as_of() - Duration::days(account_age_days);
        let subscriptions: Vec<Subscription> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| Subscription {
                id: Uuid::from_u128(420 + i as u128),
                user_id,
                plan: format!("tier-{}", i),
                monthly_amount: Decimal::from(*amount),
                started_at: created_at + Duration::days(i as i64),
                ended_at: None,
                superseded_by: None,
            })
            .collect();
        let payments = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| Payment {
                id: Uuid::from_u128(4200 + i as u128),
                subscription_id: subscriptions[0].id,
                user_id,
                amount: subscriptions[0].monthly_amount,
                status: *status,
                occurred_at: Some(created_at + Duration::hours(1 + i as i64)),
            })
            .collect();

        UserHistory {
            user: User {
                id: user_id,
                name: "Margaret".to_string(),
                email: "margaret@example.com".to_string(),
                created_at,
                is_active: true,
            },
            subscriptions,
            payments,
        }
    }

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskConfig::default()).unwrap()
    }

    #[test]
    fn test_analysis_statistics() {
        let statuses = [Succeeded, Succeeded, Failed, Succeeded, Succeeded, Succeeded, Succeeded, Succeeded, Succeeded, Succeeded, Declined, Failed];
        let h = history(400, &[20], &statuses);

        let analysis = analyze(&engine(), &h, as_of()).unwrap();
        assert_eq!(analysis.total_payments, 12);
        assert_eq!(analysis.failed_payments, 3);
        assert_eq!(analysis.successful_payments, 9);
        assert_eq!(analysis.failure_rate, 0.25);
        assert_eq!(analysis.recent_payments.len(), 10);
        assert_eq!(analysis.recent_payments[0].id, Uuid::from_u128(4211));
        assert_eq!(analysis.current_plan, "tier-0");
        assert_eq!(analysis.assessment.user_id, h.user.id);
    }

    #[test]
    fn test_factors_for_declining_new_account() {
        let h = history(10, &[12, 2], &[Succeeded, Failed, Failed]);
        let analysis = analyze(&engine(), &h, as_of()).unwrap();
        let factors = &analysis.risk_factors;

        assert!(factors.iter().any(|f| f == "High failure rate on recent payments (66.7%)"));
        assert!(factors.iter().any(|f| f == "Failed 2/3 of last payments"));
        assert!(factors.iter().any(|f| f.starts_with("Classic pattern")));
        assert!(factors.iter().any(|f| f == "Downgrade detected: 12 -> 2"));
        assert!(factors.iter().any(|f| f.starts_with("Low cost subscription (2)")));
        assert!(factors.iter().any(|f| f == "Overall failure rate: 66.7%"));
        assert!(factors.iter().any(|f| f == "New account (less than 30 days)"));
        assert!(factors.iter().any(|f| f == "Multiple consecutive recent failures"));
        assert_eq!(analysis.assessment.tier, RiskTier::Critical);
        assert_eq!(analysis.recommendations, recommendations(RiskTier::Critical));
    }

    #[test]
    fn test_quiet_profile() {
        let h = history(365, &[15], &[Succeeded, Succeeded, Succeeded]);
        let analysis = analyze(&engine(), &h, as_of()).unwrap();
        assert_eq!(analysis.risk_factors, vec!["Low risk profile".to_string()]);
        assert_eq!(analysis.assessment.tier, RiskTier::Low);
    }

    #[test]
    fn test_no_payments() {
        let h = history(365, &[15], &[]);
        let analysis = analyze(&engine(), &h, as_of()).unwrap();
        assert_eq!(analysis.risk_factors, vec!["No payment history".to_string()]);
        assert_eq!(analysis.failure_rate, 0.0);
        assert!(analysis.recent_payments.is_empty());
    }

    #[test]
    fn test_recommendations_per_tier() {
        assert_eq!(recommendations(RiskTier::Low).len(), 2);
        assert_eq!(recommendations(RiskTier::High).len(), 4);
        assert!(recommendations(RiskTier::Critical)[0].starts_with("Immediate contact"));
    }
}
