use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{
    CreateLinkRequest, CreateRuleRequest, CreateVariantRequest, ShortLink, UpdateLinkRequest,
    UpdateRuleRequest, UpdateVariantRequest,
};
use crate::routing::{RoutingRule, Variant};
use crate::storage::{Storage, StorageError};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_found(message: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Generate a random short code
fn generate_short_code() -> String {
    use rand::distr::Alphanumeric;
    use rand::Rng;
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

// Links

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ShortLink>), ApiError> {
    if payload.url.is_empty() {
        return Err(bad_request("URL cannot be empty"));
    }

    let short_code = match payload.custom_code {
        Some(custom) => {
            if custom.is_empty() || custom.len() > 20 {
                return Err(bad_request("Custom code must be 1-20 characters"));
            }
            custom
        }
        None => generate_short_code(),
    };

    match state
        .storage
        .create_link(
            &short_code,
            &payload.url,
            payload.default_url.as_deref(),
            payload.smart_routing,
        )
        .await
    {
        Ok(link) => Ok((StatusCode::CREATED, Json(link))),
        Err(StorageError::Conflict) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Short code already exists".to_string(),
            }),
        )),
        Err(StorageError::Other(err)) => Err(internal(err)),
    }
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<ShortLink>, ApiError> {
    match state.storage.get_link(&code).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(not_found("Link not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<ShortLink>, ApiError> {
    if payload.url.as_deref() == Some("") {
        return Err(bad_request("URL cannot be empty"));
    }

    match state
        .storage
        .update_link(
            &code,
            payload.url.as_deref(),
            payload.default_url.as_deref(),
            payload.smart_routing,
        )
        .await
    {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(not_found("Link not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn deactivate_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.storage.deactivate_link(&code).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Link deactivated".to_string(),
        })),
        Ok(false) => Err(not_found("Link not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn reactivate_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.storage.reactivate_link(&code).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Link reactivated".to_string(),
        })),
        Ok(false) => Err(not_found("Link not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ShortLink>>, ApiError> {
    match state.storage.list_links(query.limit, query.offset).await {
        Ok(links) => Ok(Json(links)),
        Err(err) => Err(internal(err)),
    }
}

// Routing rules

async fn require_link(state: &AppState, code: &str) -> Result<ShortLink, ApiError> {
    match state.storage.get_link(code).await {
        Ok(Some(link)) => Ok(link),
        Ok(None) => Err(not_found("Link not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RoutingRule>), ApiError> {
    let link = require_link(&state, &code).await?;

    if payload.target_url.is_empty() {
        return Err(bad_request("Target URL cannot be empty"));
    }
    // Conditions are validated here, on the write path, so the evaluator
    // never sees an operator/value mismatch it would have to reject.
    if let Err(err) = payload.conditions.validate() {
        return Err(bad_request(err.to_string()));
    }

    match state
        .storage
        .create_rule(
            link.id,
            &payload.name,
            &payload.target_url,
            payload.priority,
            payload.is_active,
            &payload.conditions,
        )
        .await
    {
        Ok(rule) => Ok((StatusCode::CREATED, Json(rule))),
        Err(err) => Err(internal(err)),
    }
}

pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<RoutingRule>>, ApiError> {
    let link = require_link(&state, &code).await?;
    match state.storage.list_rules(link.id).await {
        Ok(rules) => Ok(Json(rules)),
        Err(err) => Err(internal(err)),
    }
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<i64>,
    Json(payload): Json<UpdateRuleRequest>,
) -> Result<Json<RoutingRule>, ApiError> {
    if let Some(conditions) = &payload.conditions {
        if let Err(err) = conditions.validate() {
            return Err(bad_request(err.to_string()));
        }
    }

    match state.storage.update_rule(rule_id, &payload).await {
        Ok(Some(rule)) => Ok(Json(rule)),
        Ok(None) => Err(not_found("Rule not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.storage.delete_rule(rule_id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Rule deleted".to_string(),
        })),
        Ok(false) => Err(not_found("Rule not found")),
        Err(err) => Err(internal(err)),
    }
}

// Variants

pub async fn create_variant(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(payload): Json<CreateVariantRequest>,
) -> Result<(StatusCode, Json<Variant>), ApiError> {
    let link = require_link(&state, &code).await?;

    if payload.target_url.is_empty() {
        return Err(bad_request("Target URL cannot be empty"));
    }
    if !(0..=100).contains(&payload.weight) {
        return Err(bad_request("Weight must be between 0 and 100"));
    }

    match state
        .storage
        .create_variant(
            link.id,
            &payload.name,
            &payload.target_url,
            payload.weight,
            payload.is_active,
        )
        .await
    {
        Ok(variant) => Ok((StatusCode::CREATED, Json(variant))),
        Err(err) => Err(internal(err)),
    }
}

pub async fn list_variants(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Variant>>, ApiError> {
    let link = require_link(&state, &code).await?;
    match state.storage.list_variants(link.id).await {
        Ok(variants) => Ok(Json(variants)),
        Err(err) => Err(internal(err)),
    }
}

pub async fn update_variant(
    State(state): State<Arc<AppState>>,
    Path(variant_id): Path<i64>,
    Json(payload): Json<UpdateVariantRequest>,
) -> Result<Json<Variant>, ApiError> {
    if let Some(weight) = payload.weight {
        if !(0..=100).contains(&weight) {
            return Err(bad_request("Weight must be between 0 and 100"));
        }
    }

    match state.storage.update_variant(variant_id, &payload).await {
        Ok(Some(variant)) => Ok(Json(variant)),
        Ok(None) => Err(not_found("Variant not found")),
        Err(err) => Err(internal(err)),
    }
}

pub async fn delete_variant(
    State(state): State<Arc<AppState>>,
    Path(variant_id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.storage.delete_variant(variant_id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Variant deleted".to_string(),
        })),
        Ok(false) => Err(not_found("Variant not found")),
        Err(err) => Err(internal(err)),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
