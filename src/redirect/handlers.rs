use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header::HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::middleware::RequestStart;
use crate::enrichment::Enricher;
use crate::routing::{resolve, Mechanism, RedirectDecision};
use crate::storage::{RedirectBundle, Storage};

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub enricher: Enricher,
}

/// Resolve a short code to its destination and redirect.
///
/// Uses 307 so browsers re-fetch every visit; a cached redirect would pin
/// one destination and bypass rules and variant weighting.
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let handler_start = Instant::now();

    let bundle = match state.storage.find_for_redirect(&code).await {
        Ok(Some(bundle)) => bundle,
        Ok(None) => return (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "redirect lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    if !bundle.link.is_active {
        return (StatusCode::GONE, "This link has been deactivated").into_response();
    }

    let ctx = state
        .enricher
        .visit_context(&headers, addr.ip(), &query, chrono::Utc::now());

    let decision = resolve(
        &bundle.link,
        &bundle.rules,
        &bundle.variants,
        &ctx,
        &mut rand::rng(),
    );

    let decision = match decision {
        Some(decision) => decision,
        None => return (StatusCode::NOT_FOUND, "Link has no destination").into_response(),
    };

    record_visit(&state, &bundle, &decision);

    let handler_time = handler_start.elapsed();
    let total_time = request_start.elapsed();

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = decision.mechanism.as_str().parse() {
        response_headers.insert("x-waypost-mechanism", value);
    }
    if let Ok(value) = total_time.as_millis().to_string().parse() {
        response_headers.insert("x-waypost-timing-total-ms", value);
    }
    if let Ok(value) = handler_time.as_millis().to_string().parse() {
        response_headers.insert("x-waypost-timing-handler-ms", value);
    }

    (
        response_headers,
        Redirect::temporary(&decision.target_url),
    )
        .into_response()
}

/// Bump counters off the hot path. Failures are logged, never surfaced to
/// the visitor.
fn record_visit(state: &Arc<RedirectState>, bundle: &RedirectBundle, decision: &RedirectDecision) {
    let storage = Arc::clone(&state.storage);
    let link_id = bundle.link.id;
    let short_code = bundle.link.short_code.clone();
    let mechanism = decision.mechanism;
    let rule_id = decision.matched_rule_id;
    let variant_id = decision.matched_variant_id;

    tokio::spawn(async move {
        if let Err(err) = storage.increment_clicks(link_id).await {
            tracing::warn!(short_code = %short_code, error = %err, "failed to record click");
        }
        match mechanism {
            Mechanism::Rule => {
                if let Some(rule_id) = rule_id {
                    if let Err(err) = storage.increment_rule_match(rule_id).await {
                        tracing::warn!(rule_id, error = %err, "failed to record rule match");
                    }
                }
            }
            Mechanism::Variant => {
                if let Some(variant_id) = variant_id {
                    if let Err(err) = storage.increment_variant_click(variant_id).await {
                        tracing::warn!(variant_id, error = %err, "failed to record variant click");
                    }
                }
            }
            Mechanism::Control | Mechanism::Fallback => {}
        }
    });
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
