//! JSON dataset of already-loaded billing records
//!
//! ```json
//! { "users": [...], "subscriptions": [...], "payments": [...] }
//! ```

use crate::{Error, Payment, Result, Subscription, User, UserHistory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Flat record lists as exported by the persistence layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Users
    pub users: Vec<User>,

    /// Subscriptions of any user
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,

    /// Payments of any user
    #[serde(default)]
    pub payments: Vec<Payment>,
}

/// Records grouped per user
#[derive(Debug, Clone, Default)]
pub struct GroupedHistories {
    /// One entry per user, in dataset order
    pub histories: Vec<UserHistory>,

    /// Subscriptions whose user is not in the dataset
    pub orphan_subscriptions: usize,

    /// Payments whose user is not in the dataset
    pub orphan_payments: usize,
}

impl Dataset {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Group subscriptions and payments under their user
    pub fn into_histories(self) -> Result<GroupedHistories> {
        let mut index: HashMap<uuid::Uuid, usize> = HashMap::with_capacity(self.users.len());
        let mut histories = Vec::with_capacity(self.users.len());

        for user in self.users {
            if index.insert(user.id, histories.len()).is_some() {
                return Err(Error::DataIntegrity(format!("Duplicate user {}", user.id)));
            }
            histories.push(UserHistory {
                user,
                subscriptions: Vec::new(),
                payments: Vec::new(),
            });
        }

        let mut orphan_subscriptions = 0;
        for subscription in self.subscriptions {
            match index.get(&subscription.user_id) {
                Some(&i) => histories[i].subscriptions.push(subscription),
                None => {
                    warn!(
                        subscription_id = %subscription.id,
                        user_id = %subscription.user_id,
                        "Subscription references unknown user"
                    );
                    orphan_subscriptions += 1;
                }
            }
        }

        let mut orphan_payments = 0;
        for payment in self.payments {
            match index.get(&payment.user_id) {
                Some(&i) => histories[i].payments.push(payment),
                None => {
                    warn!(
                        payment_id = %payment.id,
                        user_id = %payment.user_id,
                        "Payment references unknown user"
                    );
                    orphan_payments += 1;
                }
            }
        }

        Ok(GroupedHistories {
            histories,
            orphan_subscriptions,
            orphan_payments,
        })
    }
}
