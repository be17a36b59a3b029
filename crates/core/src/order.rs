use serde_json::Value;

const IDENTIFIER_KEYS: &[&str] = &["id"];
const STATUS_KEYS: &[&str] = &["delivery_status"];
const PHONE_KEYS: &[&str] = &["phone", "customer_phone"];
const NAME_KEYS: &[&str] = &["customer_name", "account_name"];
const ADDRESS_KEYS: &[&str] = &["shipping_address"];
const AMOUNT_KEYS: &[&str] = &["amount", "total_amount", "sale_order_amount"];
const ORDER_CODE_KEYS: &[&str] = &["order_code", "sale_order_no"];

/// A CRM sale order as seen in one poll cycle.
///
/// Every field is optional on the wire. Numeric values are kept as their
/// string rendering so the notification payload can forward them verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Order {
    pub identifier: Option<String>,
    pub delivery_status: Option<String>,
    pub phone: Option<String>,
    pub customer_name: Option<String>,
    pub shipping_address: Option<String>,
    pub amount: Option<String>,
    pub order_code: Option<String>,
}

impl Order {
    /// Build an order from one raw record. Never fails: a record that is not
    /// an object yields an order without identifier, which the poll loop skips.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let field = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(scalar));

        Self {
            identifier: field(IDENTIFIER_KEYS).filter(|s| !s.trim().is_empty()),
            delivery_status: field(STATUS_KEYS),
            phone: field(PHONE_KEYS),
            customer_name: field(NAME_KEYS),
            shipping_address: field(ADDRESS_KEYS),
            amount: field(AMOUNT_KEYS),
            order_code: field(ORDER_CODE_KEYS),
        }
    }

    /// The human-facing order number: the CRM order code when present,
    /// otherwise the identifier.
    pub fn order_number(&self) -> &str {
        self.order_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.identifier.as_deref())
            .unwrap_or_default()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
