//! Subscriber risk engine
//!
//! Turns a subscriber's subscription and payment history into a normalized
//! churn/default risk score, a tier and the signals behind it, so a support
//! team can triage the accounts most likely to leave or stop paying.
//!
//! # Signals
//!
//! | Signal          | Default weight | Meaning                                          |
//! |-----------------|----------------|--------------------------------------------------|
//! | recent failure  | 0.50           | failed share of the latest 3 payments            |
//! | downgrade       | 0.20           | plan downgrade, else how low the current plan is |
//! | global failure  | 0.15           | failed share of all payments                     |
//! | pattern         | 0.10           | first payment paid, every later one failed       |
//! | account age     | 0.05           | young accounts                                   |
//!
//! The score is the weighted sum clamped to [0, 1]. Scores at or above the
//! high threshold (0.4) are `high`, at or above the critical threshold
//! (0.7) are `critical`.
//!
//! # Example
//!
//! ```no_run
//! use subscriber_risk::{RiskConfig, RiskEngine, UserHistory};
//!
//! fn triage(history: &UserHistory) -> subscriber_risk::Result<()> {
//!     let engine = RiskEngine::new(RiskConfig::default())?;
//!     let assessment = engine.assess_history(history, chrono::Utc::now())?;
//!     if assessment.is_critical() {
//!         println!("{} needs a call ({:.2})", assessment.user_id, assessment.score);
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analysis;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod history;
pub mod scoring;
pub mod signals;
pub mod types;

pub use analysis::{analyze, RiskAnalysis};
pub use batch::{assess_all, portfolio_stats, risky_subscribers, PortfolioStats, RiskyReport, RiskySubscriber};
pub use config::{RiskConfig, RiskWeights};
pub use dataset::Dataset;
pub use error::{Error, Result};
pub use scoring::{assess, RiskEngine};
pub use types::*;
