pub mod auth;
pub mod client;
pub mod extract;
pub mod notify;
pub mod orders;

#[cfg(test)]
mod testing;

pub use auth::{Credentials, RetryPolicy, TokenProvider};
pub use client::build_http;
pub use notify::{NotificationDispatcher, NotificationPayload};
pub use orders::{FeedSettings, OrderFeed};
