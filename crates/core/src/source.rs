//! Seams between the poll loop and its HTTP collaborators.

use std::fmt;

use async_trait::async_trait;

use crate::error::{AuthError, FeedError};
use crate::order::Order;

/// Short-lived bearer credential for the CRM API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn refresh(&self) -> Result<AccessToken, AuthError>;
}

#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch(&self, token: &AccessToken) -> Result<Vec<Order>, FeedError>;
}

/// Delivers a shipping notification. Returns `false` only when the request
/// could not be sent at all.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, order: &Order) -> bool;
}
