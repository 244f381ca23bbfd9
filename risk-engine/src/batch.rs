//! Portfolio-wide scoring
//!
//! Users are independent, so a batch is a plain parallel map over user
//! histories on scoped worker threads. Results come back in input order.

use crate::history::Timeline;
use crate::{Error, Result, RiskAssessment, RiskEngine, RiskTier, UserHistory};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of scoring one user in a batch
#[derive(Debug)]
pub struct ScoredUser {
    /// User scored
    pub user_id: Uuid,

    /// Assessment or the reason it could not be produced
    pub outcome: Result<RiskAssessment>,
}

/// Entry of the risky subscriber listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskySubscriber {
    /// User ID
    pub user_id: Uuid,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Risk score
    pub score: f64,
    /// Risk tier
    pub tier: RiskTier,
    /// All-time failure rate
    pub failure_rate: f64,
    /// Payments on record
    pub total_payments: usize,
    /// Non-succeeded payments
    pub failed_payments: usize,
    /// Plan of the latest subscription
    pub subscription_plan: String,
    /// Amount of the latest subscription
    pub monthly_amount: Decimal,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

/// User left out of a listing because assessment failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedUser {
    /// User ID
    pub user_id: Uuid,

    /// Error message
    pub reason: String,
}

/// Risky subscriber listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskyReport {
    /// Highest score first
    pub subscribers: Vec<RiskySubscriber>,

    /// Users whose history could not be assessed
    pub skipped: Vec<SkippedUser>,
}

/// Portfolio statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    /// Users in the portfolio
    pub total_users: usize,
    /// Users flagged active
    pub active_users: usize,
    /// Active users in the high or critical tier
    pub high_risk_users: usize,
    /// Active users in the critical tier
    pub critical_users: usize,
    /// Payments across all users
    pub total_payments: usize,
    /// Non-succeeded payments across all users
    pub failed_payments: usize,
    /// `failed_payments / total_payments`
    pub overall_failure_rate: f64,
    /// Mean score over every assessable user
    pub avg_risk_score: f64,
    /// `high_risk_users / active_users * 100`
    pub risk_percentage: f64,
    /// Users whose history could not be assessed
    pub unassessable_users: usize,
}

/// Score every history in parallel
pub fn assess_all(
    engine: &RiskEngine,
    histories: &[UserHistory],
    as_of: DateTime<Utc>,
) -> Result<Vec<ScoredUser>> {
    par_map(histories, |history| ScoredUser {
        user_id: history.user.id,
        outcome: engine.assess_history(history, as_of),
    })
}

/// Active users scoring at least `min_score` (default: the high threshold),
/// highest first, truncated to `limit` (default: the configured list size)
pub fn risky_subscribers(
    engine: &RiskEngine,
    histories: &[UserHistory],
    min_score: Option<f64>,
    limit: Option<usize>,
    as_of: DateTime<Utc>,
) -> Result<RiskyReport> {
    let min_score = min_score.unwrap_or(engine.config().high_risk_threshold);
    let limit = limit.unwrap_or(engine.config().risky_list_limit);

    let active: Vec<&UserHistory> = histories.iter().filter(|h| h.user.is_active).collect();
    let rows = par_map(&active, |history| summarize(engine, history, as_of))?;

    let mut subscribers = Vec::new();
    let mut skipped = Vec::new();
    for (history, row) in active.iter().zip(rows) {
        match row {
            Ok(entry) if entry.score >= min_score => subscribers.push(entry),
            Ok(_) => {}
            Err(e) => {
                warn!(user_id = %history.user.id, error = %e, "Skipping unassessable user");
                skipped.push(SkippedUser {
                    user_id: history.user.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    subscribers.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.user_id.cmp(&b.user_id)));
    subscribers.truncate(limit);

    info!(
        risky = subscribers.len(),
        skipped = skipped.len(),
        min_score,
        "Built risky subscriber listing"
    );

    Ok(RiskyReport { subscribers, skipped })
}

/// Aggregate statistics over the whole portfolio
pub fn portfolio_stats(
    engine: &RiskEngine,
    histories: &[UserHistory],
    as_of: DateTime<Utc>,
) -> Result<PortfolioStats> {
    let scored = assess_all(engine, histories, as_of)?;

    let total_users = histories.len();
    let active_users = histories.iter().filter(|h| h.user.is_active).count();
    let total_payments: usize = histories.iter().map(|h| h.payments.len()).sum();
    let failed_payments: usize = histories
        .iter()
        .flat_map(|h| h.payments.iter())
        .filter(|p| p.status.is_failure())
        .count();

    let mut score_sum = 0.0;
    let mut assessed = 0usize;
    let mut high_risk_users = 0usize;
    let mut critical_users = 0usize;
    for (history, scored) in histories.iter().zip(&scored) {
        let Ok(assessment) = &scored.outcome else {
            continue;
        };
        score_sum += assessment.score;
        assessed += 1;
        if history.user.is_active {
            if assessment.tier >= RiskTier::High {
                high_risk_users += 1;
            }
            if assessment.tier == RiskTier::Critical {
                critical_users += 1;
            }
        }
    }

    let stats = PortfolioStats {
        total_users,
        active_users,
        high_risk_users,
        critical_users,
        total_payments,
        failed_payments,
        overall_failure_rate: ratio(failed_payments as f64, total_payments as f64),
        avg_risk_score: ratio(score_sum, assessed as f64),
        risk_percentage: ratio(high_risk_users as f64 * 100.0, active_users as f64),
        unassessable_users: total_users - assessed,
    };

    info!(
        users = stats.total_users,
        high_risk = stats.high_risk_users,
        critical = stats.critical_users,
        "Computed portfolio statistics"
    );

    Ok(stats)
}

fn summarize(engine: &RiskEngine, history: &UserHistory, as_of: DateTime<Utc>) -> Result<RiskySubscriber> {
    let timeline = Timeline::build(&history.user, &history.subscriptions, &history.payments)?;
    let assessment = engine.assess_timeline(&timeline, as_of);
    let current = timeline.current_subscription();
    let total_payments = timeline.payments().len();
    let failed_payments = timeline.failure_count();

    Ok(RiskySubscriber {
        user_id: history.user.id,
        name: history.user.name.clone(),
        email: history.user.email.clone(),
        score: assessment.score,
        tier: assessment.tier,
        failure_rate: ratio(failed_payments as f64, total_payments as f64),
        total_payments,
        failed_payments,
        subscription_plan: current.plan.clone(),
        monthly_amount: current.monthly_amount,
        created_at: history.user.created_at,
    })
}

/// Map `f` over `items` on scoped worker threads, keeping input order
fn par_map<I, T, F>(items: &[I], f: F) -> Result<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(items.len());
    let chunk_size = items.len().div_ceil(workers);
    let f = &f;

    crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move |_| chunk.iter().map(f).collect::<Vec<T>>()))
            .collect();

        let mut results = Vec::with_capacity(items.len());
        for handle in handles {
            let part = handle
                .join()
                .map_err(|_| Error::Worker("Scoring worker panicked".to_string()))?;
            results.extend(part);
        }
        Ok::<_, Error>(results)
    })
    .map_err(|_| Error::Worker("Scoring scope panicked".to_string()))?
}

fn ratio(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total
    }
}
