//! Risk scoring engine

use crate::history::Timeline;
use crate::signals::{self, clamp_unit};
use crate::{
    Payment, Result, RiskAssessment, RiskConfig, RiskTier, SignalContribution, SignalKind,
    Subscription, User, UserHistory,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Risk scorer holding a validated configuration
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    /// Create new risk engine, rejecting invalid configuration
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Assess one user's billing history as of `as_of`
    pub fn assess(
        &self,
        user: &User,
        subscriptions: &[Subscription],
        payments: &[Payment],
        as_of: DateTime<Utc>,
    ) -> Result<RiskAssessment> {
        let timeline = Timeline::build(user, subscriptions, payments)?;
        Ok(self.assess_timeline(&timeline, as_of))
    }

    /// Assess a [`UserHistory`] as of `as_of`
    pub fn assess_history(&self, history: &UserHistory, as_of: DateTime<Utc>) -> Result<RiskAssessment> {
        self.assess(&history.user, &history.subscriptions, &history.payments, as_of)
    }

    pub(crate) fn assess_timeline(&self, timeline: &Timeline<'_>, as_of: DateTime<Utc>) -> RiskAssessment {
        let config = &self.config;
        let weights = &config.weights;
        let user = timeline.user();

        let mut breakdown = BTreeMap::new();
        let mut score = 0.0;
        for kind in SignalKind::ALL {
            let (value, weight) = match kind {
                SignalKind::RecentFailure => (
                    signals::recent_failure_rate(timeline, config.recent_window),
                    weights.recent_failure,
                ),
                SignalKind::Downgrade => (
                    signals::downgrade_signal(timeline, config),
                    weights.downgrade,
                ),
                SignalKind::GlobalFailure => (
                    signals::global_failure_rate(timeline),
                    weights.global_failure,
                ),
                SignalKind::Pattern => (
                    signals::pay_once_then_decline(timeline),
                    weights.pattern,
                ),
                SignalKind::AccountAge => (
                    signals::account_age_signal(user.created_at, as_of, config.age_cutoff_days),
                    weights.account_age,
                ),
            };
            let contribution = value * weight;
            score += contribution;
            breakdown.insert(kind, SignalContribution { value, weight, contribution });
        }

        let score = clamp_unit(score);
        let tier = RiskTier::classify(
            score,
            config.high_risk_threshold,
            config.critical_risk_threshold,
        );

        debug!(
            user_id = %user.id,
            score,
            tier = %tier,
            payments = timeline.payments().len(),
            "Assessed subscriber risk"
        );

        RiskAssessment {
            user_id: user.id,
            score,
            tier,
            signals: breakdown,
            evaluated_at: as_of,
        }
    }
}

/// One-shot assessment with an explicit configuration
pub fn assess(
    user: &User,
    subscriptions: &[Subscription],
    payments: &[Payment],
    config: &RiskConfig,
    as_of: DateTime<Utc>,
) -> Result<RiskAssessment> {
    RiskEngine::new(config.clone())?.assess(user, subscriptions, payments, as_of)
}
