//! Smart-routing core: condition evaluation, rule selection, weighted
//! variant selection, and the redirect resolver tying them together.
//!
//! Everything in here is pure and synchronous. Inputs are read-only
//! snapshots fetched by the caller; counter increments happen at the
//! persistence layer after the decision.

pub mod condition;
pub mod context;
pub mod resolver;
pub mod rules;
pub mod variants;

pub use condition::{
    CombineOperator, ConditionError, ConditionField, ConditionItem, ConditionOperator,
    ConditionValue, RoutingConditions,
};
pub use context::{DeviceType, VisitContext};
pub use resolver::{resolve, Mechanism, RedirectDecision};
pub use rules::{select_rule, RoutingRule};
pub use variants::{select_variant, Variant, VariantChoice};
