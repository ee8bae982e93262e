use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::models::{ShortLink, UpdateRuleRequest, UpdateVariantRequest};
use crate::routing::{RoutingConditions, RoutingRule, Variant};
use crate::storage::{RedirectBundle, Storage, StorageError, StorageResult};

const LINK_COLUMNS: &str =
    "id, short_code, original_url, default_url, is_smart_routing_enabled, clicks, is_active, created_at";
const RULE_COLUMNS: &str =
    "id, link_id, name, target_url, priority, is_active, conditions, match_count, created_at";
const VARIANT_COLUMNS: &str =
    "id, link_id, name, target_url, weight, is_active, click_count, created_at";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn get_rule(&self, rule_id: i64) -> Result<Option<RoutingRule>> {
        let rule = sqlx::query_as::<_, RoutingRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM routing_rules WHERE id = ?"
        ))
        .bind(rule_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(rule)
    }

    async fn get_variant(&self, variant_id: i64) -> Result<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE id = ?"
        ))
        .bind(variant_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(variant)
    }
}

fn unix_now() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                default_url TEXT,
                is_smart_routing_enabled INTEGER NOT NULL DEFAULT 0,
                clicks INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_short_code ON links(short_code)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS routing_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                target_url TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                conditions TEXT NOT NULL,
                match_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rules_link_id ON routing_rules(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                target_url TEXT NOT NULL,
                weight INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                click_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_variants_link_id ON variants(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_link(
        &self,
        short_code: &str,
        original_url: &str,
        default_url: Option<&str>,
        smart_routing: bool,
    ) -> StorageResult<ShortLink> {
        let created_at = unix_now().map_err(StorageError::Other)?;

        let result = sqlx::query(
            r#"
            INSERT INTO links (short_code, original_url, default_url, is_smart_routing_enabled, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(short_code) DO NOTHING
            "#,
        )
        .bind(short_code)
        .bind(original_url)
        .bind(default_url)
        .bind(smart_routing)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = ?"
        ))
        .bind(short_code)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(link)
    }

    async fn get_link(&self, short_code: &str) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = ?"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(link)
    }

    async fn update_link(
        &self,
        short_code: &str,
        original_url: Option<&str>,
        default_url: Option<&str>,
        smart_routing: Option<bool>,
    ) -> Result<Option<ShortLink>> {
        sqlx::query(
            r#"
            UPDATE links SET
                original_url = COALESCE(?, original_url),
                default_url = COALESCE(?, default_url),
                is_smart_routing_enabled = COALESCE(?, is_smart_routing_enabled)
            WHERE short_code = ?
            "#,
        )
        .bind(original_url)
        .bind(default_url)
        .bind(smart_routing)
        .bind(short_code)
        .execute(self.pool.as_ref())
        .await?;

        self.get_link(short_code).await
    }

    async fn deactivate_link(&self, short_code: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE links SET is_active = 0 WHERE short_code = ?")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reactivate_link(&self, short_code: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE links SET is_active = 1 WHERE short_code = ?")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_links(&self, limit: i64, offset: i64) -> Result<Vec<ShortLink>> {
        let links = sqlx::query_as::<_, ShortLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM links ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(links)
    }

    async fn increment_clicks(&self, link_id: i64) -> Result<()> {
        sqlx::query("UPDATE links SET clicks = clicks + 1 WHERE id = ?")
            .bind(link_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn create_rule(
        &self,
        link_id: i64,
        name: &str,
        target_url: &str,
        priority: i64,
        is_active: bool,
        conditions: &RoutingConditions,
    ) -> Result<RoutingRule> {
        let created_at = unix_now()?;

        let result = sqlx::query(
            r#"
            INSERT INTO routing_rules (link_id, name, target_url, priority, is_active, conditions, match_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(link_id)
        .bind(name)
        .bind(target_url)
        .bind(priority)
        .bind(is_active)
        .bind(Json(conditions))
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        let rule = self
            .get_rule(result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow::anyhow!("rule vanished after insert"))?;
        Ok(rule)
    }

    async fn update_rule(
        &self,
        rule_id: i64,
        patch: &UpdateRuleRequest,
    ) -> Result<Option<RoutingRule>> {
        let conditions = patch
            .conditions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE routing_rules SET
                name = COALESCE(?, name),
                target_url = COALESCE(?, target_url),
                priority = COALESCE(?, priority),
                is_active = COALESCE(?, is_active),
                conditions = COALESCE(?, conditions)
            WHERE id = ?
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.target_url.as_deref())
        .bind(patch.priority)
        .bind(patch.is_active)
        .bind(conditions)
        .bind(rule_id)
        .execute(self.pool.as_ref())
        .await?;

        self.get_rule(rule_id).await
    }

    async fn delete_rule(&self, rule_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM routing_rules WHERE id = ?")
            .bind(rule_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_rules(&self, link_id: i64) -> Result<Vec<RoutingRule>> {
        let rules = sqlx::query_as::<_, RoutingRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM routing_rules WHERE link_id = ? ORDER BY priority DESC, id ASC"
        ))
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rules)
    }

    async fn increment_rule_match(&self, rule_id: i64) -> Result<()> {
        sqlx::query("UPDATE routing_rules SET match_count = match_count + 1 WHERE id = ?")
            .bind(rule_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn create_variant(
        &self,
        link_id: i64,
        name: &str,
        target_url: &str,
        weight: i64,
        is_active: bool,
    ) -> Result<Variant> {
        let created_at = unix_now()?;

        let result = sqlx::query(
            r#"
            INSERT INTO variants (link_id, name, target_url, weight, is_active, click_count, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(link_id)
        .bind(name)
        .bind(target_url)
        .bind(weight)
        .bind(is_active)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        let variant = self
            .get_variant(result.last_insert_rowid())
            .await?
            .ok_or_else(|| anyhow::anyhow!("variant vanished after insert"))?;
        Ok(variant)
    }

    async fn update_variant(
        &self,
        variant_id: i64,
        patch: &UpdateVariantRequest,
    ) -> Result<Option<Variant>> {
        sqlx::query(
            r#"
            UPDATE variants SET
                name = COALESCE(?, name),
                target_url = COALESCE(?, target_url),
                weight = COALESCE(?, weight),
                is_active = COALESCE(?, is_active)
            WHERE id = ?
            "#,
        )
        .bind(patch.name.as_deref())
        .bind(patch.target_url.as_deref())
        .bind(patch.weight)
        .bind(patch.is_active)
        .bind(variant_id)
        .execute(self.pool.as_ref())
        .await?;

        self.get_variant(variant_id).await
    }

    async fn delete_variant(&self, variant_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM variants WHERE id = ?")
            .bind(variant_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_variants(&self, link_id: i64) -> Result<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE link_id = ? ORDER BY id ASC"
        ))
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(variants)
    }

    async fn increment_variant_click(&self, variant_id: i64) -> Result<()> {
        sqlx::query("UPDATE variants SET click_count = click_count + 1 WHERE id = ?")
            .bind(variant_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn find_for_redirect(&self, short_code: &str) -> Result<Option<RedirectBundle>> {
        let Some(link) = self.get_link(short_code).await? else {
            return Ok(None);
        };

        // Creation order; the rule evaluator applies priority itself so
        // equal priorities keep a deterministic first-created tie-break.
        let rules = sqlx::query_as::<_, RoutingRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM routing_rules WHERE link_id = ? ORDER BY id ASC"
        ))
        .bind(link.id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let variants = self.list_variants(link.id).await?;

        Ok(Some(RedirectBundle {
            link,
            rules,
            variants,
        }))
    }
}
