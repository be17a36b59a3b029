//! Ordered response-shape strategies.
//!
//! Upstream responses come in several envelopes. Each strategy recognizes one
//! shape and returns `None` otherwise; the first match wins.

use serde_json::Value;

type ExtractFn<T> = Box<dyn for<'a> Fn(&'a Value) -> Option<T> + Send + Sync>;
type BorrowFn = Box<dyn for<'a> Fn(&'a Value) -> Option<&'a [Value]> + Send + Sync>;

pub struct Strategy<T> {
    pub name: String,
    extract: ExtractFn<T>,
}

impl<T> Strategy<T> {
    pub fn new(
        name: impl Into<String>,
        extract: impl for<'a> Fn(&'a Value) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            extract: Box::new(extract),
        }
    }

    pub fn apply(&self, value: &Value) -> Option<T> {
        (self.extract)(value)
    }
}

/// Return the first strategy result together with the strategy name.
pub fn first_match<'s, T>(strategies: &'s [Strategy<T>], value: &Value) -> Option<(&'s str, T)> {
    strategies
        .iter()
        .find_map(|s| s.apply(value).map(|v| (s.name.as_str(), v)))
}

/// Keys of a JSON object, or a description of the value kind otherwise.
pub fn describe_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(_) => vec!["<array>".to_string()],
        Value::Null => vec!["<null>".to_string()],
        _ => vec!["<scalar>".to_string()],
    }
}

// ---------------------------------------------------------------------------
// Token responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

fn grant_from(obj: &Value) -> Option<TokenGrant> {
    let access_token = obj.get("access_token")?.as_str()?;
    if access_token.is_empty() {
        return None;
    }
    let expires_in = obj.get("expires_in").and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });
    Some(TokenGrant {
        access_token: access_token.to_string(),
        expires_in,
    })
}

pub fn token_strategies() -> Vec<Strategy<TokenGrant>> {
    vec![
        Strategy::new("data.access_token", |v| v.get("data").and_then(grant_from)),
        Strategy::new("access_token", grant_from),
    ]
}

// ---------------------------------------------------------------------------
// Order list responses
// ---------------------------------------------------------------------------

/// Borrowing variant of [`Strategy`] for locating the order array.
pub struct ListStrategy {
    pub name: String,
    extract: BorrowFn,
}

impl ListStrategy {
    fn new(
        name: impl Into<String>,
        extract: impl for<'a> Fn(&'a Value) -> Option<&'a [Value]> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            extract: Box::new(extract),
        }
    }

    pub fn apply<'a>(&self, value: &'a Value) -> Option<&'a [Value]> {
        (self.extract)(value)
    }
}

pub fn first_list<'s, 'a>(
    strategies: &'s [ListStrategy],
    value: &'a Value,
) -> Option<(&'s str, &'a [Value])> {
    strategies
        .iter()
        .find_map(|s| s.apply(value).map(|v| (s.name.as_str(), v)))
}

fn array(value: Option<&Value>) -> Option<&[Value]> {
    value.and_then(Value::as_array).map(Vec::as_slice)
}

/// Order container shapes in priority order:
/// `data.<key>`, `data` as array, `<key>` at top level, top-level array.
pub fn order_list_strategies(list_keys: &[String]) -> Vec<ListStrategy> {
    let mut strategies = Vec::new();
    for key in list_keys {
        let k = key.clone();
        strategies.push(ListStrategy::new(format!("data.{key}"), move |v| {
            array(v.get("data").and_then(|d| d.get(k.as_str())))
        }));
    }
    strategies.push(ListStrategy::new("data", |v| array(v.get("data"))));
    for key in list_keys {
        let k = key.clone();
        strategies.push(ListStrategy::new(key.clone(), move |v| {
            array(v.get(k.as_str()))
        }));
    }
    strategies.push(ListStrategy::new("<root>", |v| array(Some(v))));
    strategies
}
