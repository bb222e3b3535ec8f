//! The reconciliation engine: matches merchant-staged products and variants
//! against the master catalog and promotes admin decisions into catalog
//! entities and priced merchant offers.

pub mod error;
pub mod identifier;
pub mod pipeline;
pub mod pricing;
pub mod product_match;
pub mod similarity;
pub mod variant_match;

pub use error::EngineError;
pub use identifier::IdentifierIndex;
pub use pipeline::{
    auto_match_pending, decide, ingest_products, resync_staging, sync_merchant, variant_matches,
    Decision, DecisionAction, IngestSummary, MatchSummary, MergeOutcome, VariantMatchEntry,
    VariantMatchReport,
};
pub use pricing::settlement_price_minor;
pub use product_match::{suggest_product, ProductSuggestion, SuggestionSource};
pub use variant_match::{
    attributes_from_value, match_variant, normalize_attributes, ExplicitMapping, MatchStrategy,
    VariantInput, VariantMatch,
};
