use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use shipwatch_api::auth::{Credentials, TokenProvider};
use shipwatch_api::notify::NotificationDispatcher;
use shipwatch_api::orders::{FeedSettings, OrderFeed, default_list_keys};
use shipwatch_core::poll::{DEFAULT_DISPATCH_CONCURRENCY, PollLoop, PollSettings};
use shipwatch_core::state::StateStore;
use shipwatch_core::transition::{DEFAULT_FROM_STATUS, DEFAULT_TO_STATUS, TransitionRule};

const CONFIG_FILE: &str = "shipwatch.toml";

pub type ShipwatchLoop = PollLoop<TokenProvider, OrderFeed, NotificationDispatcher>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub crm: CrmConfig,
    pub notify: NotifyConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub token_url: String,
    pub orders_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub list_keys: Vec<String>,
    pub cache_token: bool,
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            token_url: "https://apisv2.misa.vn/auth/token".to_string(),
            orders_url: "https://apisv2.misa.vn/crm/sale-orders".to_string(),
            page_size: shipwatch_api::orders::DEFAULT_PAGE_SIZE,
            max_pages: shipwatch_api::orders::DEFAULT_MAX_PAGES,
            list_keys: default_list_keys(),
            cache_token: false,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub access_token: Option<String>,
    pub template_id: Option<String>,
    pub url: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            template_id: None,
            url: "https://business.openapi.zalo.me/message/template".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub state_file: PathBuf,
    pub transition_from: String,
    pub transition_to: String,
    pub dispatch_concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            state_file: PathBuf::from("sent.json"),
            transition_from: DEFAULT_FROM_STATUS.to_string(),
            transition_to: DEFAULT_TO_STATUS.to_string(),
            dispatch_concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }
}

/// Configuration with every required value present.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub app: AppConfig,
    pub credentials: Credentials,
    pub notify_token: String,
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shipwatch")
            .join(CONFIG_FILE)
    }

    /// Read the config file (explicit path, else the default location if it
    /// exists) and apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::config_path();
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("config not found at {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Override file values with environment variables. Each setting also
    /// accepts the older `AMIS_*` / `ZALO_*` names as a fallback.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = first_set(&lookup, &["CRM_CLIENT_ID", "AMIS_CLIENT_ID"]) {
            self.crm.client_id = Some(v);
        }
        if let Some(v) = first_set(&lookup, &["CRM_CLIENT_SECRET", "AMIS_CLIENT_SECRET"]) {
            self.crm.client_secret = Some(v);
        }
        if let Some(v) = first_set(&lookup, &["CRM_REFRESH_TOKEN", "AMIS_REFRESH_TOKEN"]) {
            self.crm.refresh_token = Some(v);
        }
        if let Some(v) = first_set(&lookup, &["CRM_TOKEN_URL"]) {
            self.crm.token_url = v;
        }
        if let Some(v) = first_set(&lookup, &["CRM_ORDERS_URL"]) {
            self.crm.orders_url = v;
        }
        if let Some(v) = first_set(&lookup, &["NOTIFY_ACCESS_TOKEN", "ZALO_ACCESS_TOKEN"]) {
            self.notify.access_token = Some(v);
        }
        if let Some(v) = first_set(&lookup, &["NOTIFY_TEMPLATE_ID", "ZALO_TEMPLATE_ID"]) {
            self.notify.template_id = Some(v);
        }
        if let Some(v) = first_set(&lookup, &["NOTIFY_URL"]) {
            self.notify.url = v;
        }
        if let Some(v) = first_set(&lookup, &["POLL_INTERVAL_SECS"]) {
            self.poll.interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("POLL_INTERVAL_SECS is not a number: {v}"))?;
        }
        if let Some(v) = first_set(&lookup, &["STATE_FILE"]) {
            self.poll.state_file = PathBuf::from(v);
        }
        if let Some(v) = first_set(&lookup, &["TRANSITION_FROM"]) {
            self.poll.transition_from = v;
        }
        if let Some(v) = first_set(&lookup, &["TRANSITION_TO"]) {
            self.poll.transition_to = v;
        }
        Ok(())
    }

    /// Check that every credential is present.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        let required = [
            ("CRM_CLIENT_ID", &self.crm.client_id),
            ("CRM_CLIENT_SECRET", &self.crm.client_secret),
            ("CRM_REFRESH_TOKEN", &self.crm.refresh_token),
            ("NOTIFY_ACCESS_TOKEN", &self.notify.access_token),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.as_deref().is_none_or(|s| s.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("missing required configuration: {}", missing.join(", "));
        }
        if self.poll.interval_secs == 0 {
            anyhow::bail!("poll interval must be at least 1 second");
        }
        if self.poll.transition_from == self.poll.transition_to {
            anyhow::bail!(
                "transition statuses must differ (both are '{}')",
                self.poll.transition_from
            );
        }

        let credentials = Credentials {
            client_id: self.crm.client_id.clone().unwrap_or_default(),
            client_secret: self.crm.client_secret.clone().unwrap_or_default(),
            refresh_token: self.crm.refresh_token.clone().unwrap_or_default(),
        };
        let notify_token = self.notify.access_token.clone().unwrap_or_default();
        Ok(ResolvedConfig {
            app: self,
            credentials,
            notify_token,
        })
    }

    pub fn state_store(&self) -> StateStore {
        StateStore::new(&self.poll.state_file)
    }

    pub fn transition_rule(&self) -> TransitionRule {
        TransitionRule::new(&self.poll.transition_from, &self.poll.transition_to)
    }
}

/// First non-blank value among `keys`.
fn first_set(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|&key| lookup(key).filter(|v| !v.trim().is_empty()))
}

impl ResolvedConfig {
    pub async fn open_poll_loop(&self) -> Result<ShipwatchLoop> {
        let app = &self.app;
        let http = shipwatch_api::build_http(Duration::from_secs(app.crm.timeout_secs))
            .context("failed to build HTTP client")?;

        let tokens = TokenProvider::new(self.credentials.clone(), &app.crm.token_url, http.clone())
            .with_cache(app.crm.cache_token);
        let feed = OrderFeed::new(
            FeedSettings {
                url: app.crm.orders_url.clone(),
                page_size: app.crm.page_size,
                max_pages: app.crm.max_pages,
                list_keys: app.crm.list_keys.clone(),
            },
            http.clone(),
        );
        let notifier = NotificationDispatcher::new(
            &app.notify.url,
            &self.notify_token,
            app.notify.template_id.clone(),
            http,
        );
        let settings = PollSettings {
            interval: Duration::from_secs(app.poll.interval_secs),
            rule: app.transition_rule(),
            dispatch_concurrency: app.poll.dispatch_concurrency,
        };

        Ok(PollLoop::new(tokens, feed, notifier, app.state_store(), settings).await)
    }
}
