//! Normalization from raw feed payloads to [`offergrid_core::FeedProduct`].
//!
//! The raw payload is parsed into the fixed intake schema here, once, at the
//! ingestion boundary; rows that do not conform are rejected with a typed
//! error instead of carrying an untyped blob into the matching logic.

use std::collections::BTreeMap;
use std::str::FromStr;

use offergrid_core::{FeedProduct, FeedVariant};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::FeedError;
use crate::types::{ShopifyProduct, ShopifyVariant};

/// Normalizes one raw feed product (as returned by
/// [`crate::FeedClient::fetch_products`]) into a [`FeedProduct`].
///
/// The verbatim payload is retained in `FeedProduct::raw`.
///
/// # Errors
///
/// Returns [`FeedError::Normalization`] if the payload does not conform to
/// the intake schema: missing id/title, no variants, or an unparseable price.
pub fn normalize_product(raw: &serde_json::Value) -> Result<FeedProduct, FeedError> {
    let external_id = raw
        .get("id")
        .map(ToString::to_string)
        .unwrap_or_else(|| "<unknown>".to_string());

    let product: ShopifyProduct =
        serde_json::from_value(raw.clone()).map_err(|e| FeedError::Normalization {
            external_product_id: external_id.clone(),
            reason: format!("payload does not match feed schema: {e}"),
        })?;

    if product.title.trim().is_empty() {
        return Err(FeedError::Normalization {
            external_product_id: external_id,
            reason: "product title is empty".into(),
        });
    }

    if product.variants.is_empty() {
        return Err(FeedError::Normalization {
            external_product_id: external_id,
            reason: "product has no variants".into(),
        });
    }

    let external_product_id = product.id.to_string();

    // Option definition names, positionally paired with variant option slots.
    let option_names: Vec<&str> = product.options.iter().map(|o| o.name.as_str()).collect();

    let variants = product
        .variants
        .iter()
        .map(|variant| normalize_variant(variant, &option_names, &external_product_id))
        .collect::<Result<Vec<_>, _>>()?;

    let image_url = product
        .image
        .as_ref()
        .map(|i| i.src.clone())
        .or_else(|| product.images.first().map(|i| i.src.clone()));

    // Tags arrive as a comma-separated string; split into individual tags.
    let tags = product
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect();

    Ok(FeedProduct {
        external_product_id,
        title: product.title,
        body_html: product.body_html.filter(|s| !s.is_empty()),
        vendor: product.vendor.filter(|s| !s.trim().is_empty()),
        product_type: product.product_type.filter(|s| !s.is_empty()),
        tags,
        handle: product.handle.filter(|s| !s.is_empty()),
        image_url,
        variants,
        raw: raw.clone(),
    })
}

fn normalize_variant(
    variant: &ShopifyVariant,
    option_names: &[&str],
    external_product_id: &str,
) -> Result<FeedVariant, FeedError> {
    let price_minor = parse_price_minor(&variant.price).ok_or_else(|| FeedError::Normalization {
        external_product_id: external_product_id.to_owned(),
        reason: format!(
            "variant {} has unparseable price \"{}\"",
            variant.id, variant.price
        ),
    })?;

    // Fold positional option values into a named key/value map. Slots without
    // a matching option definition are dropped.
    let mut options = BTreeMap::new();
    let values = [&variant.option1, &variant.option2, &variant.option3];
    for (name, value) in option_names.iter().zip(values) {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            options.insert((*name).to_string(), value.to_string());
        }
    }

    // Empty-string identifiers must never participate in matching.
    let sku = variant.sku.clone().filter(|s| !s.trim().is_empty());
    let barcode = variant.barcode.clone().filter(|s| !s.trim().is_empty());

    Ok(FeedVariant {
        external_variant_id: variant.id.to_string(),
        sku,
        barcode,
        price_minor,
        stock: variant.inventory_quantity.unwrap_or(0),
        options,
    })
}

/// Parses a decimal price string into integer minor units.
///
/// `"24.99"` → `2499`. Returns `None` for unparseable input or prices with
/// more precision than two decimal places would round away silently.
fn parse_price_minor(price: &str) -> Option<i64> {
    let decimal = Decimal::from_str(price.trim()).ok()?;
    let minor = decimal.checked_mul(Decimal::ONE_HUNDRED)?;
    if minor.fract() != Decimal::ZERO {
        return None;
    }
    minor.to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_product() -> serde_json::Value {
        json!({
            "id": 6789,
            "title": "Prestige Pressure Cooker 5L",
            "handle": "prestige-pressure-cooker-5l",
            "body_html": "<p>Spillage control.</p>",
            "vendor": "Prestige",
            "product_type": "Kitchen",
            "tags": "cookware, kitchen",
            "options": [
                {"name": "Size", "position": 1},
                {"name": "Color", "position": 2}
            ],
            "image": {"src": "https://cdn.example.com/cooker.jpg"},
            "images": [{"src": "https://cdn.example.com/cooker.jpg"}],
            "variants": [
                {
                    "id": 111,
                    "sku": "PRE-SC-5L",
                    "barcode": "8901234567890",
                    "price": "24.99",
                    "inventory_quantity": 50,
                    "option1": "5L",
                    "option2": "Silver"
                },
                {
                    "id": 112,
                    "sku": "",
                    "barcode": "",
                    "price": "29.99",
                    "inventory_quantity": 0,
                    "option1": "7L",
                    "option2": "Silver"
                }
            ]
        })
    }

    #[test]
    fn normalize_product_maps_identity_fields() {
        let product = normalize_product(&raw_product()).unwrap();
        assert_eq!(product.external_product_id, "6789");
        assert_eq!(product.title, "Prestige Pressure Cooker 5L");
        assert_eq!(product.vendor.as_deref(), Some("Prestige"));
        assert_eq!(product.handle.as_deref(), Some("prestige-pressure-cooker-5l"));
        assert_eq!(
            product.image_url.as_deref(),
            Some("https://cdn.example.com/cooker.jpg")
        );
    }

    #[test]
    fn normalize_product_splits_comma_separated_tags() {
        let product = normalize_product(&raw_product()).unwrap();
        assert_eq!(product.tags, vec!["cookware", "kitchen"]);
    }

    #[test]
    fn normalize_product_retains_raw_payload() {
        let raw = raw_product();
        let product = normalize_product(&raw).unwrap();
        assert_eq!(product.raw, raw);
    }

    #[test]
    fn normalize_variant_builds_named_option_map() {
        let product = normalize_product(&raw_product()).unwrap();
        let options = &product.variants[0].options;
        assert_eq!(options.get("Size").map(String::as_str), Some("5L"));
        assert_eq!(options.get("Color").map(String::as_str), Some("Silver"));
    }

    #[test]
    fn normalize_variant_converts_price_to_minor_units() {
        let product = normalize_product(&raw_product()).unwrap();
        assert_eq!(product.variants[0].price_minor, 2499);
        assert_eq!(product.variants[1].price_minor, 2999);
    }

    #[test]
    fn normalize_variant_scrubs_empty_identifiers() {
        let product = normalize_product(&raw_product()).unwrap();
        assert_eq!(product.variants[0].barcode.as_deref(), Some("8901234567890"));
        assert!(product.variants[1].sku.is_none());
        assert!(product.variants[1].barcode.is_none());
    }

    #[test]
    fn normalize_product_rejects_missing_variants() {
        let mut raw = raw_product();
        raw["variants"] = json!([]);
        let err = normalize_product(&raw).unwrap_err();
        assert!(
            matches!(err, FeedError::Normalization { reason, .. } if reason.contains("no variants"))
        );
    }

    #[test]
    fn normalize_product_rejects_empty_title() {
        let mut raw = raw_product();
        raw["title"] = json!("   ");
        let err = normalize_product(&raw).unwrap_err();
        assert!(
            matches!(err, FeedError::Normalization { reason, .. } if reason.contains("title"))
        );
    }

    #[test]
    fn normalize_product_rejects_unparseable_price() {
        let mut raw = raw_product();
        raw["variants"][0]["price"] = json!("free");
        let err = normalize_product(&raw).unwrap_err();
        assert!(
            matches!(err, FeedError::Normalization { reason, .. } if reason.contains("price"))
        );
    }

    #[test]
    fn normalize_product_rejects_non_conforming_payload() {
        let raw = json!({"id": "not-a-number", "title": 3});
        let err = normalize_product(&raw).unwrap_err();
        assert!(matches!(err, FeedError::Normalization { .. }));
    }

    #[test]
    fn parse_price_minor_handles_integers_and_decimals() {
        assert_eq!(parse_price_minor("100"), Some(10000));
        assert_eq!(parse_price_minor("24.99"), Some(2499));
        assert_eq!(parse_price_minor("0.01"), Some(1));
        assert_eq!(parse_price_minor("0"), Some(0));
    }

    #[test]
    fn parse_price_minor_rejects_sub_minor_precision() {
        assert_eq!(parse_price_minor("24.999"), None);
    }

    #[test]
    fn parse_price_minor_rejects_garbage() {
        assert_eq!(parse_price_minor("free"), None);
        assert_eq!(parse_price_minor(""), None);
    }
}
