use thiserror::Error;

/// Failure to obtain an access token. Fatal for the current cycle only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token endpoint unreachable after {attempts} attempts: {reason}")]
    Network { attempts: u32, reason: String },

    #[error("token response is not valid JSON: {0}")]
    Malformed(String),

    #[error("token response has no access token (keys: [{}])", keys.join(", "))]
    MissingToken { keys: Vec<String> },
}

/// Failure to fetch the order list. The cycle is aborted, never retried mid-cycle.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("order request failed: {0}")]
    Network(String),

    #[error("order response is not valid JSON: {0}")]
    Format(String),

    #[error("order response has no recognized order list (keys: [{}])", keys.join(", "))]
    Schema { keys: Vec<String> },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}
