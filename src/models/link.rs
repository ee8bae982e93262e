use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::routing::RoutingConditions;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShortLink {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    /// Served when smart routing is enabled but no rule matches.
    pub default_url: Option<String>,
    pub is_smart_routing_enabled: bool,
    pub clicks: i64,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    pub custom_code: Option<String>,
    pub default_url: Option<String>,
    #[serde(default)]
    pub smart_routing: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkRequest {
    pub url: Option<String>,
    pub default_url: Option<String>,
    pub smart_routing: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub target_url: String,
    pub priority: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: RoutingConditions,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRuleRequest {
    pub name: Option<String>,
    pub target_url: Option<String>,
    pub priority: Option<i64>,
    pub is_active: Option<bool>,
    pub conditions: Option<RoutingConditions>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariantRequest {
    pub name: String,
    pub target_url: String,
    pub weight: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVariantRequest {
    pub name: Option<String>,
    pub target_url: Option<String>,
    pub weight: Option<i64>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}
