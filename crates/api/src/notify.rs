use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use shipwatch_core::{Notifier, Order};

use crate::client::excerpt;

/// Body posted to the notification endpoint for one shipped order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub phone: String,
    pub account_name: String,
    pub order_number: String,
    pub shipping_address: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl NotificationPayload {
    pub fn for_order(order: &Order, template_id: Option<&str>) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            phone: text(&order.phone),
            account_name: text(&order.customer_name),
            order_number: order.order_number().to_string(),
            shipping_address: text(&order.shipping_address),
            amount: text(&order.amount),
            template_id: template_id.map(String::from),
        }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    url: String,
    access_token: String,
    template_id: Option<String>,
    http: reqwest::Client,
}

impl NotificationDispatcher {
    pub fn new(
        url: impl Into<String>,
        access_token: impl Into<String>,
        template_id: Option<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            url: url.into(),
            access_token: access_token.into(),
            template_id,
            http,
        }
    }

    /// Post the notification. Any HTTP response counts as delivered; only a
    /// request that never got a response is a failure.
    pub async fn dispatch(&self, order: &Order) -> bool {
        let payload = NotificationPayload::for_order(order, self.template_id.as_deref());
        let result = self
            .http
            .post(&self.url)
            .header("access_token", &self.access_token)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    info!(order = %payload.order_number, %status, response = %excerpt(&body), "Notification sent");
                } else {
                    warn!(order = %payload.order_number, %status, response = %excerpt(&body), "Notification endpoint rejected request");
                }
                true
            }
            Err(e) => {
                warn!(order = %payload.order_number, error = %e, "Notification could not be sent");
                false
            }
        }
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn send(&self, order: &Order) -> bool {
        self.dispatch(order).await
    }
}
