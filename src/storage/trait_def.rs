use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ShortLink, UpdateRuleRequest, UpdateVariantRequest};
use crate::routing::{RoutingConditions, RoutingRule, Variant};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Read-only snapshot of everything the resolver needs for one visit.
#[derive(Debug, Clone)]
pub struct RedirectBundle {
    pub link: ShortLink,
    /// Creation order, so equal-priority ties resolve deterministically.
    pub rules: Vec<RoutingRule>,
    /// Creation order, so the variant bucket walk is deterministic.
    pub variants: Vec<Variant>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (run migrations, etc.)
    async fn init(&self) -> Result<()>;

    // Links

    /// Create a new short link with a caller-provided code.
    async fn create_link(
        &self,
        short_code: &str,
        original_url: &str,
        default_url: Option<&str>,
        smart_routing: bool,
    ) -> StorageResult<ShortLink>;

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>>;

    /// Patch the mutable link fields; `None` leaves a field untouched.
    async fn update_link(
        &self,
        short_code: &str,
        original_url: Option<&str>,
        default_url: Option<&str>,
        smart_routing: Option<bool>,
    ) -> Result<Option<ShortLink>>;

    /// Deactivate a short link (soft delete)
    async fn deactivate_link(&self, short_code: &str) -> Result<bool>;

    /// Reactivate a short link
    async fn reactivate_link(&self, short_code: &str) -> Result<bool>;

    async fn list_links(&self, limit: i64, offset: i64) -> Result<Vec<ShortLink>>;

    /// Atomic click increment; safe under concurrent redirects.
    async fn increment_clicks(&self, link_id: i64) -> Result<()>;

    // Routing rules

    async fn create_rule(
        &self,
        link_id: i64,
        name: &str,
        target_url: &str,
        priority: i64,
        is_active: bool,
        conditions: &RoutingConditions,
    ) -> Result<RoutingRule>;

    async fn update_rule(
        &self,
        rule_id: i64,
        patch: &UpdateRuleRequest,
    ) -> Result<Option<RoutingRule>>;

    async fn delete_rule(&self, rule_id: i64) -> Result<bool>;

    /// Rules for one link, priority descending then creation order.
    async fn list_rules(&self, link_id: i64) -> Result<Vec<RoutingRule>>;

    /// Atomic match-count increment.
    async fn increment_rule_match(&self, rule_id: i64) -> Result<()>;

    // Variants

    async fn create_variant(
        &self,
        link_id: i64,
        name: &str,
        target_url: &str,
        weight: i64,
        is_active: bool,
    ) -> Result<Variant>;

    async fn update_variant(
        &self,
        variant_id: i64,
        patch: &UpdateVariantRequest,
    ) -> Result<Option<Variant>>;

    async fn delete_variant(&self, variant_id: i64) -> Result<bool>;

    /// Variants for one link, in creation order.
    async fn list_variants(&self, link_id: i64) -> Result<Vec<Variant>>;

    /// Atomic click-count increment.
    async fn increment_variant_click(&self, variant_id: i64) -> Result<()>;

    // Redirect hot path

    /// Fetch the link plus its rules and variants in one call.
    async fn find_for_redirect(&self, short_code: &str) -> Result<Option<RedirectBundle>>;
}
