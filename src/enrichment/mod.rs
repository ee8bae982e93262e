//! Builds the per-request `VisitContext` from raw HTTP metadata:
//! client IP (proxy-aware) -> GeoIP, User-Agent -> device/os/browser,
//! Accept-Language, Referer, and UTM query parameters.

pub mod geoip;
pub mod ip_extractor;
pub mod user_agent;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::EnrichmentConfig;
use crate::routing::VisitContext;

pub use geoip::{GeoInfo, GeoIpService};
pub use ip_extractor::extract_client_ip;
pub use user_agent::{classify, UserAgentInfo};

/// Assembles visit contexts. Cheap to clone; the GeoIP reader is shared.
#[derive(Clone)]
pub struct Enricher {
    config: EnrichmentConfig,
    geoip: Option<GeoIpService>,
}

impl Enricher {
    /// Opens the GeoIP database when configured. A missing or unreadable
    /// database degrades to no geo enrichment rather than failing startup.
    pub fn new(config: EnrichmentConfig) -> Self {
        let geoip = config.geoip_db_path.as_deref().and_then(|path| {
            match GeoIpService::new(path) {
                Ok(service) => Some(service),
                Err(err) => {
                    warn!(error = %err, "GeoIP database unavailable, geo conditions will not match");
                    None
                }
            }
        });
        Self { config, geoip }
    }

    pub fn visit_context(
        &self,
        headers: &HeaderMap,
        socket_ip: IpAddr,
        query: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> VisitContext {
        let mut ctx = VisitContext::at(now);

        if let Some(geoip) = &self.geoip {
            let client_ip = extract_client_ip(headers, socket_ip, &self.config);
            let geo = geoip.lookup(client_ip);
            ctx.country = geo.country;
            ctx.region = geo.region;
            ctx.city = geo.city;
        }

        if let Some(ua) = header_str(headers, "user-agent") {
            let info = classify(ua);
            ctx.device_type = info.device_type;
            ctx.os = info.os;
            ctx.browser = info.browser;
        }

        ctx.language = header_str(headers, "accept-language").and_then(primary_language);
        ctx.referer = header_str(headers, "referer").map(str::to_string);

        ctx.utm_source = query.get("utm_source").cloned();
        ctx.utm_medium = query.get("utm_medium").cloned();
        ctx.utm_campaign = query.get("utm_campaign").cloned();
        ctx.utm_term = query.get("utm_term").cloned();
        ctx.utm_content = query.get("utm_content").cloned();

        ctx
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// First tag of Accept-Language, quality weights stripped:
/// "en-US,en;q=0.9" -> "en-US"
fn primary_language(value: &str) -> Option<String> {
    let tag = value.split(',').next()?.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" {
        None
    } else {
        Some(tag.to_string())
    }
}
