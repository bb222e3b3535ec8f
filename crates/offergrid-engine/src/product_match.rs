//! Product-level match suggestion for a staging product.
//!
//! Two-tier rule, precision over recall: a barcode identity on any active
//! master variant implies a product match outright; otherwise a fuzzy title
//! match is accepted only above a high threshold so common generic names do
//! not produce spurious suggestions.

use offergrid_db::ProductTitleRow;
use serde::Serialize;

use crate::identifier::IdentifierIndex;
use crate::similarity::best_title_match;

/// Minimum title similarity for a suggestion. Tunable.
pub const TITLE_ACCEPT_THRESHOLD: f64 = 0.8;

/// Which tier produced the suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    BarcodeIdentity,
    TitleSimilarity,
}

/// A suggested master product for a staging product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSuggestion {
    pub product_id: i64,
    /// 0–100.
    pub confidence: i32,
    pub source: SuggestionSource,
}

/// Suggests a master product for a staging product, or `None` when neither
/// tier fires (the admin then picks "approve as new" or searches manually).
///
/// `barcodes` are the staging variants' raw barcodes; `title` is the staged
/// product title; `candidates` are all active master product titles.
#[must_use]
pub fn suggest_product(
    barcodes: &[&str],
    title: &str,
    index: &IdentifierIndex<'_>,
    candidates: &[ProductTitleRow],
) -> Option<ProductSuggestion> {
    // Tier 1: a staged barcode equal to any active GTIN implies the product.
    for barcode in barcodes {
        if let Some(hit) = index.lookup_by_gtin(barcode) {
            return Some(ProductSuggestion {
                product_id: hit.product_id,
                confidence: 100,
                source: SuggestionSource::BarcodeIdentity,
            });
        }
    }

    // Tier 2: fuzzy title similarity, accepted only above the threshold.
    if let Some((product_id, score)) = best_title_match(title, candidates) {
        if score > TITLE_ACCEPT_THRESHOLD {
            #[allow(clippy::cast_possible_truncation)] // score is in [0,1]
            let confidence = (score * 100.0).round() as i32;
            return Some(ProductSuggestion {
                product_id,
                confidence,
                source: SuggestionSource::TitleSimilarity,
            });
        }
    }

    None
}
