//! Merchant feed wire types for the Shopify-format `products.json` endpoint.
//!
//! ## Observed shape
//!
//! ### Tags
//! The REST products endpoint returns tags as a single **comma-separated
//! string** (e.g. `"cookware, kitchen"`), unlike the storefront JSON which
//! uses an array. Normalization splits on commas.
//!
//! ### Options
//! Products carry up to three named option definitions (`options[0..3]`);
//! each variant carries the positional values `option1`/`option2`/`option3`.
//! The pair is folded into a per-variant key/value map at normalization time.
//!
//! ### `barcode`
//! Present but frequently an empty string. An empty barcode is normalized to
//! absent — an empty string must never participate in GTIN matching.
//!
//! ### `price`
//! A decimal string (e.g. `"24.99"`). Converted to integer minor units once,
//! at normalization time.

use serde::Deserialize;

/// Top-level response from `GET /products.json`.
///
/// Products are kept as raw JSON values so the verbatim payload can be stored
/// alongside the typed projection; see [`crate::normalize::normalize_product`].
#[derive(Debug, Deserialize)]
pub struct FeedProductsResponse {
    pub products: Vec<serde_json::Value>,
}

/// A single product from the merchant's feed.
#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    /// Source numeric product ID (e.g., `6789012345678`).
    pub id: i64,

    /// Display name of the product.
    pub title: String,

    /// URL slug for the product page. May be absent on minimal feeds.
    #[serde(default)]
    pub handle: Option<String>,

    /// Raw HTML product description. May be `null` or absent.
    #[serde(default)]
    pub body_html: Option<String>,

    /// Vendor / brand name as configured by the merchant.
    #[serde(default)]
    pub vendor: Option<String>,

    /// Product category string; may be empty — normalized to `None`.
    #[serde(default)]
    pub product_type: Option<String>,

    /// Comma-separated tag string. Empty when no tags.
    #[serde(default)]
    pub tags: Option<String>,

    /// Named option definitions, positionally paired with variant
    /// `option1`/`option2`/`option3` values.
    #[serde(default)]
    pub options: Vec<ShopifyOption>,

    /// Primary image object.
    #[serde(default)]
    pub image: Option<ShopifyImage>,

    /// Full image gallery for the product.
    #[serde(default)]
    pub images: Vec<ShopifyImage>,

    /// All purchasable variants for this product.
    pub variants: Vec<ShopifyVariant>,
}

/// A single purchasable variant of a [`ShopifyProduct`].
#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    /// Source numeric variant ID.
    pub id: i64,

    /// Stock-keeping unit. Present but may be an empty string.
    #[serde(default)]
    pub sku: Option<String>,

    /// Barcode / GTIN candidate. Present but may be an empty string.
    #[serde(default)]
    pub barcode: Option<String>,

    /// Current price as a decimal string (e.g., `"30.00"`).
    pub price: String,

    /// Units in stock; absent on feeds without inventory tracking.
    #[serde(default)]
    pub inventory_quantity: Option<i32>,

    /// First option value, named by `options[0]`.
    #[serde(default)]
    pub option1: Option<String>,

    /// Second option value, named by `options[1]`.
    #[serde(default)]
    pub option2: Option<String>,

    /// Third option value, named by `options[2]`.
    #[serde(default)]
    pub option3: Option<String>,
}

/// A named option definition on a [`ShopifyProduct`].
#[derive(Debug, Deserialize)]
pub struct ShopifyOption {
    pub name: String,
    /// 1-based position matching the variant's `option{n}` slot.
    #[serde(default)]
    pub position: Option<i32>,
}

/// A product image.
#[derive(Debug, Deserialize)]
pub struct ShopifyImage {
    /// Canonical CDN URL.
    pub src: String,
    /// Optional alt text.
    #[serde(default)]
    pub alt: Option<String>,
    /// 1-based image position.
    #[serde(default)]
    pub position: Option<i32>,
}
