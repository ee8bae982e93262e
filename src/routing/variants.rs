//! Weighted A/B variant selection with an implicit control bucket.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An A/B test arm attached to one short link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Variant {
    pub id: i64,
    pub link_id: i64,
    pub name: String,
    pub target_url: String,
    /// Relative weight, 0..=100. Weights are not required to sum to 100:
    /// the control bucket absorbs any remainder and disappears when the
    /// configured weights reach or exceed 100.
    pub weight: i64,
    pub is_active: bool,
    /// Incremented by the persistence layer when this variant wins.
    pub click_count: i64,
    pub created_at: i64,
}

/// Outcome of a weighted draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantChoice<'a> {
    /// The implicit bucket: visitor stays on the link's original target.
    Control,
    Variant(&'a Variant),
}

/// Weighted-random selection among active variants plus the control bucket.
///
/// Returns `None` when no variant is active, which the resolver turns into
/// a plain fallback to the original URL. Buckets are walked in a fixed
/// order (control first, then variants in creation order), so a given draw
/// value always lands in the same bucket. The RNG is injected so tests can
/// seed it for exact reproducibility.
pub fn select_variant<'a, R: Rng + ?Sized>(
    variants: &'a [Variant],
    rng: &mut R,
) -> Option<VariantChoice<'a>> {
    let active: Vec<&Variant> = variants.iter().filter(|v| v.is_active).collect();
    if active.is_empty() {
        return None;
    }

    // Negative weights never pass write-time validation; clamping keeps a
    // corrupt row from skewing the draw instead of panicking.
    let variant_weight: i64 = active.iter().map(|v| v.weight.max(0)).sum();
    let control_weight = (100 - variant_weight).max(0);
    let total = control_weight + variant_weight;

    let mut draw = rng.random_range(0..total);
    if draw < control_weight {
        return Some(VariantChoice::Control);
    }
    draw -= control_weight;

    for variant in active {
        let weight = variant.weight.max(0);
        if draw < weight {
            return Some(VariantChoice::Variant(variant));
        }
        draw -= weight;
    }

    // The active weights sum to exactly the remaining interval, so the walk
    // cannot run past the last bucket.
    unreachable!("draw exceeded total bucket weight")
}
