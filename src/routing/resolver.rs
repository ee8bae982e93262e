//! The redirect resolver: turns a link, its rules, its variants, and one
//! visit into a single redirect decision.
//!
//! The resolver is a pure function. It never touches storage and never
//! mutates counters; the caller records the decision (HTTP redirect plus
//! counter increments) using the attribution carried in `RedirectDecision`.

use rand::Rng;
use serde::Serialize;

use crate::models::ShortLink;

use super::context::VisitContext;
use super::rules::{select_rule, RoutingRule};
use super::variants::{select_variant, Variant, VariantChoice};

/// Why a particular target was chosen, for analytics attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    /// A smart-routing rule matched.
    Rule,
    /// A weighted A/B variant won the draw.
    Variant,
    /// The implicit control bucket won the draw.
    Control,
    /// Default or original URL, no rule or variant involved.
    Fallback,
}

impl Mechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::Rule => "rule",
            Mechanism::Variant => "variant",
            Mechanism::Control => "control",
            Mechanism::Fallback => "fallback",
        }
    }
}

/// The outcome of resolving one visit. Constructed fresh per request and
/// consumed immediately by the redirect handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedirectDecision {
    pub target_url: String,
    pub mechanism: Mechanism,
    pub matched_rule_id: Option<i64>,
    pub matched_variant_id: Option<i64>,
}

impl RedirectDecision {
    fn fallback(target_url: &str) -> Self {
        Self {
            target_url: target_url.to_string(),
            mechanism: Mechanism::Fallback,
            matched_rule_id: None,
            matched_variant_id: None,
        }
    }
}

/// Decide where this visit redirects to.
///
/// Decision order, terminal on first hit:
/// 1. smart routing enabled and a rule matches -> that rule's target;
/// 2. smart routing enabled, no rule matched, `default_url` set -> default;
/// 3. any active variant -> weighted draw (variant or control bucket);
/// 4. the link's original URL.
///
/// Returns `None` only when nothing above produced a usable target (a link
/// with an empty original URL and no matching rule or default); the caller
/// decides what to serve then, typically a 404.
pub fn resolve<R: Rng + ?Sized>(
    link: &ShortLink,
    rules: &[RoutingRule],
    variants: &[Variant],
    ctx: &VisitContext,
    rng: &mut R,
) -> Option<RedirectDecision> {
    if link.is_smart_routing_enabled {
        if let Some(rule) = select_rule(rules, ctx) {
            return Some(RedirectDecision {
                target_url: rule.target_url.clone(),
                mechanism: Mechanism::Rule,
                matched_rule_id: Some(rule.id),
                matched_variant_id: None,
            });
        }
        if let Some(default_url) = link.default_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(RedirectDecision::fallback(default_url));
        }
    }

    match select_variant(variants, rng) {
        Some(VariantChoice::Variant(variant)) => {
            return Some(RedirectDecision {
                target_url: variant.target_url.clone(),
                mechanism: Mechanism::Variant,
                matched_rule_id: None,
                matched_variant_id: Some(variant.id),
            });
        }
        Some(VariantChoice::Control) if !link.original_url.is_empty() => {
            return Some(RedirectDecision {
                target_url: link.original_url.clone(),
                mechanism: Mechanism::Control,
                matched_rule_id: None,
                matched_variant_id: None,
            });
        }
        _ => {}
    }

    if link.original_url.is_empty() {
        return None;
    }
    Some(RedirectDecision::fallback(&link.original_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::condition::{
        ConditionField, ConditionItem, ConditionOperator, ConditionValue, RoutingConditions,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn link(smart_routing: bool, default_url: Option<&str>) -> ShortLink {
        ShortLink {
            id: 1,
            short_code: "abc1234".to_string(),
            original_url: "https://example.com".to_string(),
            default_url: default_url.map(str::to_string),
            is_smart_routing_enabled: smart_routing,
            clicks: 0,
            is_active: true,
            created_at: 0,
        }
    }

    fn os_rule(id: i64, priority: i64, os: &str, target: &str) -> RoutingRule {
        RoutingRule {
            id,
            link_id: 1,
            name: format!("os-{os}"),
            target_url: target.to_string(),
            priority,
            is_active: true,
            conditions: RoutingConditions {
                operator: Default::default(),
                items: vec![ConditionItem {
                    field: ConditionField::Os,
                    operator: ConditionOperator::Equals,
                    value: ConditionValue::Text(os.to_string()),
                }],
            },
            match_count: 0,
            created_at: id,
        }
    }

    fn variant(id: i64, weight: i64) -> Variant {
        Variant {
            id,
            link_id: 1,
            name: format!("variant-{id}"),
            target_url: format!("https://variant/{id}"),
            weight,
            is_active: true,
            click_count: 0,
            created_at: id,
        }
    }

    fn ctx_with_os(os: &str) -> VisitContext {
        VisitContext {
            os: Some(os.to_string()),
            ..VisitContext::default()
        }
    }

    #[test]
    fn test_matching_rule_wins_with_attribution() {
        let link = link(true, Some("https://fallback"));
        let rules = vec![os_rule(7, 100, "iOS", "store://ios")];
        let mut rng = StdRng::seed_from_u64(0);

        let decision = resolve(&link, &rules, &[], &ctx_with_os("iOS"), &mut rng).unwrap();
        assert_eq!(decision.target_url, "store://ios");
        assert_eq!(decision.mechanism, Mechanism::Rule);
        assert_eq!(decision.matched_rule_id, Some(7));
        assert_eq!(decision.matched_variant_id, None);
    }

    #[test]
    fn test_no_rule_match_uses_default_url() {
        let link = link(true, Some("https://fallback"));
        let rules = vec![os_rule(7, 100, "iOS", "store://ios")];
        let mut rng = StdRng::seed_from_u64(0);

        let decision = resolve(&link, &rules, &[], &ctx_with_os("Android"), &mut rng).unwrap();
        assert_eq!(decision.target_url, "https://fallback");
        assert_eq!(decision.mechanism, Mechanism::Fallback);
    }

    #[test]
    fn test_smart_routing_disabled_ignores_rules_and_defaults() {
        let link = link(false, Some("https://fallback"));
        let rules = vec![os_rule(7, 100, "iOS", "store://ios")];
        let mut rng = StdRng::seed_from_u64(0);

        let decision = resolve(&link, &rules, &[], &ctx_with_os("iOS"), &mut rng).unwrap();
        assert_eq!(decision.target_url, "https://example.com");
        assert_eq!(decision.mechanism, Mechanism::Fallback);
    }

    #[test]
    fn test_variants_run_when_no_rules_apply() {
        let link = link(false, None);
        let variants = vec![variant(3, 100)];
        let mut rng = StdRng::seed_from_u64(0);

        let decision = resolve(&link, &[], &variants, &VisitContext::default(), &mut rng).unwrap();
        assert_eq!(decision.mechanism, Mechanism::Variant);
        assert_eq!(decision.matched_variant_id, Some(3));
        assert_eq!(decision.target_url, "https://variant/3");
    }

    #[test]
    fn test_control_bucket_targets_original_url() {
        let link = link(false, None);
        let variants = vec![variant(3, 0)];
        let mut rng = StdRng::seed_from_u64(0);

        let decision = resolve(&link, &[], &variants, &VisitContext::default(), &mut rng).unwrap();
        assert_eq!(decision.mechanism, Mechanism::Control);
        assert_eq!(decision.target_url, "https://example.com");
        assert_eq!(decision.matched_variant_id, None);
    }

    #[test]
    fn test_default_url_shadows_variants_when_routing_enabled() {
        let link = link(true, Some("https://fallback"));
        let variants = vec![variant(3, 100)];
        let mut rng = StdRng::seed_from_u64(0);

        let decision = resolve(&link, &[], &variants, &VisitContext::default(), &mut rng).unwrap();
        assert_eq!(decision.target_url, "https://fallback");
        assert_eq!(decision.mechanism, Mechanism::Fallback);
    }

    #[test]
    fn test_bare_link_falls_back_to_original() {
        let link = link(false, None);
        let mut rng = StdRng::seed_from_u64(0);
        let decision = resolve(&link, &[], &[], &VisitContext::default(), &mut rng).unwrap();
        assert_eq!(decision.target_url, "https://example.com");
        assert_eq!(decision.mechanism, Mechanism::Fallback);
    }

    #[test]
    fn test_no_target_available_sentinel() {
        let mut bare = link(false, None);
        bare.original_url = String::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(resolve(&bare, &[], &[], &VisitContext::default(), &mut rng).is_none());

        // A matching rule still produces a target even without an original URL.
        bare.is_smart_routing_enabled = true;
        let rules = vec![os_rule(1, 10, "iOS", "store://ios")];
        let decision = resolve(&bare, &rules, &[], &ctx_with_os("iOS"), &mut rng).unwrap();
        assert_eq!(decision.target_url, "store://ios");
    }
}
