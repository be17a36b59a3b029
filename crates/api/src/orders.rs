use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use shipwatch_core::{AccessToken, FeedError, Order, OrderSource};

use crate::client::excerpt;
use crate::extract::{ListStrategy, describe_keys, first_list, order_list_strategies};

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const DEFAULT_MAX_PAGES: u32 = 1;

pub fn default_list_keys() -> Vec<String> {
    ["sale_orders", "orders", "items"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub url: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub list_keys: Vec<String>,
}

impl FeedSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            list_keys: default_list_keys(),
        }
    }
}

#[derive(Clone)]
pub struct OrderFeed {
    settings: FeedSettings,
    http: reqwest::Client,
    strategies: Arc<Vec<ListStrategy>>,
}

impl OrderFeed {
    pub fn new(settings: FeedSettings, http: reqwest::Client) -> Self {
        let strategies = Arc::new(order_list_strategies(&settings.list_keys));
        Self {
            settings,
            http,
            strategies,
        }
    }

    async fn get_page(&self, token: &AccessToken, page: u32) -> Result<Vec<Value>, FeedError> {
        let resp = self
            .http
            .get(&self.settings.url)
            .bearer_auth(token.as_str())
            .query(&[("page", page), ("page_size", self.settings.page_size)])
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;
        if !status.is_success() {
            warn!(%status, page, body = %excerpt(&body), "Order endpoint returned an error status");
        }

        parse_order_page(&self.strategies, &body)
    }

    /// Fetch every page up to `max_pages`. A failed page fails the whole fetch.
    pub async fn fetch_orders(&self, token: &AccessToken) -> Result<Vec<Order>, FeedError> {
        let mut raw = Vec::new();
        for page in 1..=self.settings.max_pages.max(1) {
            let records = self.get_page(token, page).await?;
            let count = records.len();
            raw.extend(records);
            debug!(page, items = count, "fetched order page");
            if count < self.settings.page_size as usize {
                break;
            }
        }
        Ok(raw.iter().map(Order::from_value).collect())
    }
}

#[async_trait]
impl OrderSource for OrderFeed {
    async fn fetch(&self, token: &AccessToken) -> Result<Vec<Order>, FeedError> {
        self.fetch_orders(token).await
    }
}

/// Locate the order array in one response body.
pub fn parse_order_page(strategies: &[ListStrategy], body: &str) -> Result<Vec<Value>, FeedError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FeedError::Format(e.to_string()))?;
    match first_list(strategies, &value) {
        Some((shape, records)) => {
            debug!(shape, "Order list located");
            Ok(records.to_vec())
        }
        None => Err(FeedError::Schema {
            keys: describe_keys(&value),
        }),
    }
}
