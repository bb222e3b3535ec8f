use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A merchant-submitted product, parsed from the raw feed payload into the
/// fixed schema the reconciliation engine operates on.
///
/// The original payload is carried alongside in `raw` for audit and
/// resubmission; the engine itself only reads the typed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedProduct {
    /// The merchant's own product id, stored as a string to avoid precision loss.
    pub external_product_id: String,
    pub title: String,
    /// Raw HTML description from the source feed.
    pub body_html: Option<String>,
    /// Vendor string as the merchant supplied it; resolved to a brand at
    /// match time, never trusted as an identifier on its own.
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    /// Source URL slug, e.g. `"prestige-pressure-cooker-5l"`.
    pub handle: Option<String>,
    pub image_url: Option<String>,
    pub variants: Vec<FeedVariant>,
    /// The merchant's native JSON representation, verbatim.
    pub raw: serde_json::Value,
}

impl FeedProduct {
    /// Returns the total number of variants for this product.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Returns `true` if at least one variant carries a barcode candidate.
    #[must_use]
    pub fn has_barcodes(&self) -> bool {
        self.variants.iter().any(|v| v.barcode.is_some())
    }
}

/// A single variant inside a [`FeedProduct`], denormalized for matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedVariant {
    /// The merchant's own variant id, stored as a string.
    pub external_variant_id: String,
    pub sku: Option<String>,
    /// Raw barcode; a candidate GTIN until matching says otherwise.
    pub barcode: Option<String>,
    /// Listed price in minor units (e.g. cents).
    ///
    /// Boundary note: feed sources send prices as decimal strings; conversion
    /// to minor units happens once at normalization time so everything past
    /// the intake boundary works in integers.
    pub price_minor: i64,
    pub stock: i32,
    /// Option key/value pairs as the feed declared them, e.g. `{"Size": "L"}`.
    /// Key casing is preserved here; matching normalizes both sides.
    pub options: BTreeMap<String, String>,
}

impl FeedVariant {
    /// Returns `true` when the variant declares at least one option pair.
    #[must_use]
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }
}
