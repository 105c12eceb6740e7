//! Authorization subscriptions submitted to the decision point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SubscriptionId;

/// Access request: who (`subject`) wants to do what (`action`) with which
/// `resource`, in which `environment`.
///
/// Every element is an arbitrary JSON value; absent elements are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationSubscription {
    #[serde(default)]
    subject: Value,
    #[serde(default)]
    action: Value,
    #[serde(default)]
    resource: Value,
    #[serde(default)]
    environment: Value,
}

impl AuthorizationSubscription {
    /// Names of the subscription elements, in declaration order.
    pub const ELEMENTS: [&'static str; 4] = ["subject", "action", "resource", "environment"];

    /// Creates a subscription without an environment.
    #[must_use]
    pub fn new(subject: Value, action: Value, resource: Value) -> Self {
        Self {
            subject,
            action,
            resource,
            environment: Value::Null,
        }
    }

    /// Sets the environment element.
    #[must_use]
    pub fn with_environment(mut self, environment: Value) -> Self {
        self.environment = environment;
        self
    }

    /// Returns the subject element.
    #[must_use]
    pub fn subject(&self) -> &Value {
        &self.subject
    }

    /// Returns the action element.
    #[must_use]
    pub fn action(&self) -> &Value {
        &self.action
    }

    /// Returns the resource element.
    #[must_use]
    pub fn resource(&self) -> &Value {
        &self.resource
    }

    /// Returns the environment element.
    #[must_use]
    pub fn environment(&self) -> &Value {
        &self.environment
    }

    /// Looks up an element by name (`subject`, `action`, `resource`, `environment`).
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&Value> {
        match name {
            "subject" => Some(&self.subject),
            "action" => Some(&self.action),
            "resource" => Some(&self.resource),
            "environment" => Some(&self.environment),
            _ => None,
        }
    }
}

/// Bundle of subscriptions evaluated together, keyed by subscription id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiAuthorizationSubscription {
    #[serde(default)]
    subscriptions: BTreeMap<SubscriptionId, AuthorizationSubscription>,
}

impl MultiAuthorizationSubscription {
    /// Creates an empty multi-subscription.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription under a freshly generated id and returns the id.
    pub fn add(&mut self, subscription: AuthorizationSubscription) -> SubscriptionId {
        let id = SubscriptionId::random();
        self.subscriptions.insert(id, subscription);
        id
    }

    /// Adds a subscription under the supplied id, replacing any previous entry.
    #[must_use]
    pub fn with_subscription(
        mut self,
        id: SubscriptionId,
        subscription: AuthorizationSubscription,
    ) -> Self {
        self.subscriptions.insert(id, subscription);
        self
    }

    /// Returns `true` when no subscriptions are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns the number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Iterates the subscriptions in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&SubscriptionId, &AuthorizationSubscription)> {
        self.subscriptions.iter()
    }
}
