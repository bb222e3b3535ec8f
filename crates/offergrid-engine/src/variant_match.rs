//! Per-variant matching against a target master product's variant set.
//!
//! Strategies apply in strict priority order and stop at the first hit:
//! explicit admin mapping, GTIN within the target, GTIN anywhere in the
//! catalog, MPN scoped to the resolved vendor brand, then normalized
//! attribute-map equality. The function is pure — it never writes; the
//! pipeline turns its results into offers and new variants.

use std::collections::BTreeMap;

use offergrid_db::CatalogVariantRow;
use serde::Serialize;

use crate::identifier::IdentifierIndex;

pub const MANUAL_CONFIDENCE: i32 = 100;
pub const GTIN_CONFIDENCE: i32 = 100;
pub const MPN_BRAND_CONFIDENCE: i32 = 95;
/// Attribute matching requires exact set equality after normalization, so no
/// per-key penalty ever applies; kept as a single tunable.
pub const ATTRIBUTE_CONFIDENCE: i32 = 90;

/// How a staging variant was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Manual,
    GtinExact,
    GtinGlobal,
    MpnBrand,
    AttributeExact,
    None,
}

impl MatchStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrategy::Manual => "manual",
            MatchStrategy::GtinExact => "gtin_exact",
            MatchStrategy::GtinGlobal => "gtin_global",
            MatchStrategy::MpnBrand => "mpn_brand",
            MatchStrategy::AttributeExact => "attribute_exact",
            MatchStrategy::None => "none",
        }
    }
}

/// Result of matching one staging variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantMatch {
    pub strategy: MatchStrategy,
    /// The resolved master variant; `None` means "create a new variant".
    pub matched_variant_id: Option<i64>,
    /// Product owning the matched variant, when known.
    pub matched_product_id: Option<i64>,
    /// 0–100.
    pub confidence: i32,
    /// Advisory only — a warning never blocks a merge.
    pub warning: Option<String>,
}

impl VariantMatch {
    fn none() -> Self {
        Self {
            strategy: MatchStrategy::None,
            matched_variant_id: None,
            matched_product_id: None,
            confidence: 0,
            warning: None,
        }
    }
}

/// An explicit admin-supplied mapping for one staging variant. Honored
/// unconditionally, including the explicit instruction to create a new
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitMapping {
    UseVariant(i64),
    CreateNew,
}

/// The staging-variant fields the matcher reads.
#[derive(Debug, Clone)]
pub struct VariantInput<'a> {
    pub sku: Option<&'a str>,
    pub barcode: Option<&'a str>,
    /// Raw option map as the feed declared it; normalized internally.
    pub options: &'a BTreeMap<String, String>,
}

/// Matches one staging variant against a target product's variant set.
///
/// `target_variants` must be the active variants of `target_product_id`
/// (empty when unscoped). `index` covers the whole active catalog and drives
/// the global GTIN and brand-scoped MPN strategies. `vendor_brand_id` is the
/// staging product's resolved vendor brand, if any.
#[must_use]
pub fn match_variant(
    input: &VariantInput<'_>,
    target_product_id: Option<i64>,
    target_variants: &[CatalogVariantRow],
    index: &IdentifierIndex<'_>,
    vendor_brand_id: Option<i64>,
    explicit: Option<ExplicitMapping>,
) -> VariantMatch {
    // 1. Explicit admin mapping wins unconditionally.
    match explicit {
        Some(ExplicitMapping::UseVariant(variant_id)) => {
            let matched_product_id = target_variants
                .iter()
                .find(|v| v.id == variant_id)
                .map(|v| v.product_id)
                .or(target_product_id);
            return VariantMatch {
                strategy: MatchStrategy::Manual,
                matched_variant_id: Some(variant_id),
                matched_product_id,
                confidence: MANUAL_CONFIDENCE,
                warning: None,
            };
        }
        Some(ExplicitMapping::CreateNew) => {
            return VariantMatch {
                strategy: MatchStrategy::Manual,
                matched_variant_id: None,
                matched_product_id: target_product_id,
                confidence: MANUAL_CONFIDENCE,
                warning: None,
            };
        }
        None => {}
    }

    // 2. GTIN exact within the target product.
    if let Some(barcode) = input.barcode {
        if target_product_id.is_some() {
            if let Some(hit) = target_variants
                .iter()
                .find(|v| v.gtin.as_deref() == Some(barcode))
            {
                return VariantMatch {
                    strategy: MatchStrategy::GtinExact,
                    matched_variant_id: Some(hit.id),
                    matched_product_id: Some(hit.product_id),
                    confidence: GTIN_CONFIDENCE,
                    warning: None,
                };
            }
        }

        // 3. GTIN anywhere in the active catalog. A hit on a different
        // product than the target is a cross-listing signal worth a human
        // look, but it never blocks the merge.
        if let Some(hit) = index.lookup_by_gtin(barcode) {
            let warning = target_product_id
                .filter(|target| *target != hit.product_id)
                .map(|target| {
                    format!(
                        "GTIN {barcode} already belongs to \"{}\" (product {}), not target product {target}",
                        hit.product_title, hit.product_id
                    )
                });
            return VariantMatch {
                strategy: MatchStrategy::GtinGlobal,
                matched_variant_id: Some(hit.id),
                matched_product_id: Some(hit.product_id),
                confidence: GTIN_CONFIDENCE,
                warning,
            };
        }
    }

    // 4. Raw SKU as MPN, scoped to the resolved vendor brand.
    if let (Some(sku), Some(brand_id)) = (input.sku, vendor_brand_id) {
        if let Some(hit) = index.lookup_by_mpn_and_brand(sku, brand_id) {
            return VariantMatch {
                strategy: MatchStrategy::MpnBrand,
                matched_variant_id: Some(hit.id),
                matched_product_id: Some(hit.product_id),
                confidence: MPN_BRAND_CONFIDENCE,
                warning: None,
            };
        }
    }

    // 5. Normalized attribute-map equality within the target product. Exact
    // set equality (same key count, same values) keeps "Size" from matching
    // "Size (US)" by overlap. Variants with no options skip this step —
    // an empty map would alias every single-variant product.
    if !input.options.is_empty() {
        let staged = normalize_attributes(input.options);
        for candidate in target_variants {
            let candidate_attrs = normalize_attributes(&attributes_from_value(&candidate.attributes));
            if candidate_attrs == staged {
                return VariantMatch {
                    strategy: MatchStrategy::AttributeExact,
                    matched_variant_id: Some(candidate.id),
                    matched_product_id: Some(candidate.product_id),
                    confidence: ATTRIBUTE_CONFIDENCE,
                    warning: None,
                };
            }
        }
    }

    // 6. No match — the caller creates a new master variant.
    VariantMatch::none()
}

/// Lower-cases keys and values. Attribute identity must survive
/// `{"Color":"Red"}` vs `{"color":"red"}`.
#[must_use]
pub fn normalize_attributes(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
        .collect()
}

/// Extracts a string attribute map from a JSONB value. Non-object values
/// yield an empty map; non-string scalars are stringified.
#[must_use]
pub fn attributes_from_value(value: &serde_json::Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(object) = value.as_object() {
        for (key, val) in object {
            let rendered = match val {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            map.insert(key.clone(), rendered);
        }
    }
    map
}
