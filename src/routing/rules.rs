//! Rule-set evaluation: pick the first matching rule in priority order.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::condition::RoutingConditions;
use super::context::VisitContext;

/// A conditional redirect target attached to one short link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutingRule {
    pub id: i64,
    pub link_id: i64,
    pub name: String,
    pub target_url: String,
    /// Higher priority rules are evaluated first.
    pub priority: i64,
    pub is_active: bool,
    #[sqlx(json)]
    pub conditions: RoutingConditions,
    /// Times this rule decided a redirect. Incremented by the persistence
    /// layer after the decision, never by the evaluator.
    pub match_count: i64,
    pub created_at: i64,
}

/// Select the first active rule whose conditions match the visit.
///
/// Rules are ordered by priority descending; equal priorities keep their
/// input order (the caller supplies rules in creation order, and the sort is
/// stable), so ties deterministically go to the first-created rule. A plain
/// linear scan is deliberate: rule sets are tens of entries at most and this
/// runs on the synchronous redirect path.
pub fn select_rule<'a>(rules: &'a [RoutingRule], ctx: &VisitContext) -> Option<&'a RoutingRule> {
    let mut active: Vec<&RoutingRule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority));
    active.into_iter().find(|rule| rule.conditions.matches(ctx))
}
