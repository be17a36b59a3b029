use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::order::Order;
use crate::state::Snapshot;

pub const DEFAULT_FROM_STATUS: &str = "not-shipped";
pub const DEFAULT_TO_STATUS: &str = "shipping";

/// The single status edge that triggers a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: String,
    pub to: String,
}

impl Default for TransitionRule {
    fn default() -> Self {
        Self {
            from: DEFAULT_FROM_STATUS.to_string(),
            to: DEFAULT_TO_STATUS.to_string(),
        }
    }
}

impl TransitionRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn triggers(&self, old: &str, new: &str) -> bool {
        old == self.from && new == self.to
    }
}

/// What one cycle will do once the order list is known.
#[derive(Debug, Default)]
pub struct CyclePlan {
    /// State after every observed order has been applied.
    pub next: Snapshot,
    /// Orders whose transition fired, in feed order.
    pub dispatches: Vec<Order>,
    pub seen: usize,
    pub seeded: usize,
    pub changed: usize,
    pub skipped: usize,
}

/// Diff the fetched orders against the previous snapshot.
///
/// Orders are applied one at a time to a working copy, so a repeated
/// identifier is compared against what its earlier occurrence recorded.
/// Orders without a delivery status are skipped rather than recorded as
/// an empty status.
pub fn plan_cycle(previous: &Snapshot, orders: Vec<Order>, rule: &TransitionRule) -> CyclePlan {
    let mut plan = CyclePlan {
        next: previous.clone(),
        ..CyclePlan::default()
    };

    for order in orders {
        let Some(id) = order.identifier.clone() else {
            debug!("Skipping order without identifier");
            plan.skipped += 1;
            continue;
        };
        let Some(new) = order.delivery_status.clone() else {
            debug!(order = %id, "Skipping order without delivery status");
            plan.skipped += 1;
            continue;
        };
        plan.seen += 1;

        match plan.next.get(&id) {
            None => {
                debug!(order = %id, status = %new, "First sighting, recording status");
                plan.seeded += 1;
            }
            Some(old) if old == new => continue,
            Some(old) => {
                if rule.triggers(old, &new) {
                    info!(order = %id, from = %old, to = %new, "Order shipped, queueing notification");
                    plan.dispatches.push(order);
                } else {
                    debug!(order = %id, from = %old, to = %new, "Status changed");
                }
                plan.changed += 1;
            }
        }
        plan.next.set(id, new);
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, status: &str) -> Order {
        Order {
            identifier: Some(id.to_string()),
            delivery_status: Some(status.to_string()),
            ..Order::default()
        }
    }

    #[test]
    fn first_sighting_seeds_without_dispatch() {
        let plan = plan_cycle(
            &Snapshot::new(),
            vec![order("SO-1", "not-shipped"), order("SO-2", "shipping")],
            &TransitionRule::default(),
        );
        assert!(plan.dispatches.is_empty());
        assert_eq!(plan.seeded, 2);
        assert_eq!(plan.next.get("SO-1"), Some("not-shipped"));
        assert_eq!(plan.next.get("SO-2"), Some("shipping"));
    }

    #[test]
    fn trigger_edge_dispatches_once() {
        let previous: Snapshot = [("SO-1", "not-shipped")].into_iter().collect();
        let plan = plan_cycle(
            &previous,
            vec![order("SO-1", "shipping")],
            &TransitionRule::default(),
        );
        assert_eq!(plan.dispatches.len(), 1);
        assert_eq!(plan.changed, 1);
        assert_eq!(plan.next.get("SO-1"), Some("shipping"));
    }

    #[test]
    fn other_changes_update_silently() {
        let previous: Snapshot = [("SO-1", "shipping"), ("SO-2", "draft")]
            .into_iter()
            .collect();
        let plan = plan_cycle(
            &previous,
            vec![order("SO-1", "delivered"), order("SO-2", "shipping")],
            &TransitionRule::default(),
        );
        assert!(plan.dispatches.is_empty());
        assert_eq!(plan.changed, 2);
        assert_eq!(plan.next.get("SO-1"), Some("delivered"));
        assert_eq!(plan.next.get("SO-2"), Some("shipping"));
    }

    #[test]
    fn unchanged_status_is_a_no_op() {
        let previous: Snapshot = [("SO-1", "not-shipped")].into_iter().collect();
        let plan = plan_cycle(
            &previous,
            vec![order("SO-1", "not-shipped")],
            &TransitionRule::default(),
        );
        assert!(plan.dispatches.is_empty());
        assert_eq!(plan.changed, 0);
        assert_eq!(plan.next, previous);
    }

    #[test]
    fn orders_without_identifier_or_status_are_skipped() {
        let no_status = Order {
            identifier: Some("SO-3".into()),
            ..Order::default()
        };
        let plan = plan_cycle(
            &Snapshot::new(),
            vec![Order::default(), no_status, order("SO-1", "shipping")],
            &TransitionRule::default(),
        );
        assert_eq!(plan.skipped, 2);
        assert_eq!(plan.seen, 1);
        assert_eq!(plan.next.len(), 1);
    }

    #[test]
    fn duplicate_identifier_within_a_list() {
        let previous: Snapshot = [("SO-1", "not-shipped")].into_iter().collect();
        let plan = plan_cycle(
            &previous,
            vec![order("SO-1", "shipping"), order("SO-1", "shipping")],
            &TransitionRule::default(),
        );
        assert_eq!(plan.dispatches.len(), 1);
    }

    #[test]
    fn custom_rule() {
        let rule = TransitionRule::new("ChuaGiaoHang", "DangGiaoHang");
        assert!(rule.triggers("ChuaGiaoHang", "DangGiaoHang"));
        assert!(!rule.triggers("not-shipped", "shipping"));
        assert!(!rule.triggers("DangGiaoHang", "ChuaGiaoHang"));
    }
}
