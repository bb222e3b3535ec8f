//! Integration tests for the staging reconciliation pipeline.
//!
//! Each test runs against a fresh migrated database via `#[sqlx::test]`.
//! Catalog and merchant fixtures are seeded with plain SQL; the pipeline is
//! driven through its public entry points only.

use serde_json::json;
use sqlx::PgPool;

use offergrid_engine::{
    auto_match_pending, decide, ingest_products, variant_matches, Decision, DecisionAction,
    EngineError,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

async fn seed_merchant(pool: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO merchants (name, source_type, source_config, is_active) \
         VALUES ($1, 'SHOPIFY', '{\"store_url\": \"https://example.com\"}'::jsonb, true) \
         RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("seed merchant")
}

async fn seed_product(pool: &PgPool, title: &str, slug: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (title, slug, base_price_minor, status) \
         VALUES ($1, $2, 0, 'ACTIVE') RETURNING id",
    )
    .bind(title)
    .bind(slug)
    .fetch_one(pool)
    .await
    .expect("seed product")
}

async fn seed_variant(
    pool: &PgPool,
    product_id: i64,
    internal_sku: &str,
    gtin: Option<&str>,
    attributes: serde_json::Value,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO variants (product_id, internal_sku, gtin, attributes, is_active) \
         VALUES ($1, $2, $3, $4, true) RETURNING id",
    )
    .bind(product_id)
    .bind(internal_sku)
    .bind(gtin)
    .bind(attributes)
    .fetch_one(pool)
    .await
    .expect("seed variant")
}

/// Raw feed product in the merchant's native shape.
fn raw_feed_product(
    id: i64,
    title: &str,
    variants: &[(i64, Option<&str>, Option<&str>, &str, &[(&str, &str)])],
) -> serde_json::Value {
    // Option definitions are derived from the first variant's option keys.
    let option_defs: Vec<serde_json::Value> = variants
        .first()
        .map(|(_, _, _, _, opts)| {
            opts.iter()
                .enumerate()
                .map(|(i, (name, _))| json!({"name": name, "position": i + 1}))
                .collect()
        })
        .unwrap_or_default();

    let variant_values: Vec<serde_json::Value> = variants
        .iter()
        .map(|(vid, sku, barcode, price, opts)| {
            let mut v = json!({
                "id": vid,
                "sku": sku.unwrap_or(""),
                "barcode": barcode.unwrap_or(""),
                "price": price,
                "inventory_quantity": 5
            });
            for (i, (_, value)) in opts.iter().enumerate() {
                v[format!("option{}", i + 1)] = json!(value);
            }
            v
        })
        .collect();

    json!({
        "id": id,
        "title": title,
        "handle": offergrid_core::slugify(title),
        "vendor": "Test Vendor",
        "product_type": "Test",
        "tags": "alpha, beta",
        "options": option_defs,
        "variants": variant_values
    })
}

async fn staging_row(pool: &PgPool, merchant_id: i64, external_id: &str) -> (i64, String, Option<i64>, i32) {
    let row: (i64, String, Option<i64>, i32) = sqlx::query_as(
        "SELECT id, status, suggested_product_id, match_confidence_score \
         FROM staging_products WHERE merchant_id = $1 AND external_product_id = $2",
    )
    .bind(merchant_id)
    .bind(external_id)
    .fetch_one(pool)
    .await
    .expect("staging row");
    row
}

async fn count_variants(pool: &PgPool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM variants WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("count variants")
}

async fn count_offers(pool: &PgPool, merchant_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM merchant_offers WHERE merchant_id = $1")
        .bind(merchant_id)
        .fetch_one(pool)
        .await
        .expect("count offers")
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_creates_pending_sync_rows(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(
        100,
        "Prestige Pressure Cooker 5L",
        &[(1001, Some("PRE-SC-5L"), None, "24.99", &[("Size", "5L")])],
    )];

    let summary = ingest_products(&pool, merchant, &feed).await.expect("ingest");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);

    let (staging_id, status, suggestion, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "PENDING_SYNC");
    assert!(suggestion.is_none());

    let variant_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM staging_variants WHERE staging_product_id = $1")
            .bind(staging_id)
            .fetch_one(&pool)
            .await
            .expect("count staging variants");
    assert_eq!(variant_count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_is_per_product_resilient(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![
        raw_feed_product(100, "Good Product", &[(1001, None, None, "10.00", &[])]),
        json!({"id": 101, "title": "No Variants", "variants": []}),
    ];

    let summary = ingest_products(&pool, merchant, &feed).await.expect("ingest");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let log_status: String = sqlx::query_scalar("SELECT status FROM sync_logs WHERE id = $1")
        .bind(summary.sync_log_id)
        .fetch_one(&pool)
        .await
        .expect("sync log");
    assert_eq!(log_status, "PARTIAL_SUCCESS");
}

#[sqlx::test(migrations = "../../migrations")]
async fn reingest_preserves_status_and_reopens_rejected(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(
        100,
        "Widget",
        &[(1001, None, None, "10.00", &[])],
    )];

    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");

    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "NEEDS_REVIEW");

    // Re-ingest must not silently re-open adjudication state.
    ingest_products(&pool, merchant, &feed).await.expect("re-ingest");
    let (staging_id, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "NEEDS_REVIEW");

    // A rejected row re-opens to PENDING_SYNC with its reason cleared.
    decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::Reject,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: Some("bad data".to_string()),
            admin_notes: None,
        },
    )
    .await
    .expect("reject");

    ingest_products(&pool, merchant, &feed).await.expect("resubmit");
    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "PENDING_SYNC");

    let reason: Option<String> =
        sqlx::query_scalar("SELECT rejection_reason FROM staging_products WHERE id = $1")
            .bind(staging_id)
            .fetch_one(&pool)
            .await
            .expect("rejection reason");
    assert!(reason.is_none());
}

// ---------------------------------------------------------------------------
// Auto-match
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn automatch_suggests_product_on_barcode_identity(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Prestige Pressure Cooker 5L", "prestige-cooker").await;
    seed_variant(&pool, product, "PRE-SC-5L", Some("0001"), json!({})).await;

    let feed = vec![raw_feed_product(
        100,
        "Totally Different Listing Name",
        &[(1001, None, Some("0001"), "24.99", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");

    let (_, status, suggestion, confidence) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "NEEDS_REVIEW");
    assert_eq!(suggestion, Some(product));
    assert_eq!(confidence, 100);
}

#[sqlx::test(migrations = "../../migrations")]
async fn automatch_suggests_product_on_title_similarity(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Samsung Galaxy Buds Pro", "samsung-galaxy-buds-pro").await;

    let feed = vec![raw_feed_product(
        100,
        "Samsung Galaxy Buds Pro 2",
        &[(1001, None, None, "49.99", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");

    let (_, _, suggestion, confidence) = staging_row(&pool, merchant, "100").await;
    assert_eq!(suggestion, Some(product));
    assert!(confidence > 80, "expected confidence above threshold, got {confidence}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn automatch_is_idempotent(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Nike Air Max 270", "nike-air-max-270").await;
    seed_variant(&pool, product, "NIK-AM270", Some("0002"), json!({})).await;

    let feed = vec![raw_feed_product(
        100,
        "Nike Air Max 270",
        &[(1001, None, Some("0002"), "79.99", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("first automatch");
    let first = staging_row(&pool, merchant, "100").await;

    // Re-ingest + rerun: suggestion and confidence must be unchanged.
    ingest_products(&pool, merchant, &feed).await.expect("re-ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("second automatch");
    let second = staging_row(&pool, merchant, "100").await;

    assert_eq!(first.2, second.2);
    assert_eq!(first.3, second.3);

    // The second pass had nothing in PENDING_SYNC to touch.
    let matched = auto_match_pending(&pool, Some(merchant)).await.expect("third automatch");
    assert_eq!(matched, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn automatch_leaves_unsuggested_products_reviewable(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;

    let feed = vec![raw_feed_product(
        100,
        "Entirely Novel Product",
        &[(1001, None, None, "5.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");

    let (_, status, suggestion, confidence) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "NEEDS_REVIEW");
    assert!(suggestion.is_none());
    assert_eq!(confidence, 0);
}

// ---------------------------------------------------------------------------
// Approve as match
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn approve_match_reuses_existing_variant_and_goes_live(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Prestige Pressure Cooker 5L", "prestige-cooker").await;
    let variant = seed_variant(&pool, product, "PRE-SC-5L", Some("0001"), json!({})).await;

    let feed = vec![raw_feed_product(
        100,
        "Prestige Cooker Listing",
        &[(1001, Some("SELLER-SKU"), Some("0001"), "100.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, suggestion, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(suggestion, Some(product));

    let outcome = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveMatch,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .expect("approve match");

    assert_eq!(outcome.product_id, Some(product));
    assert_eq!(outcome.variants_matched, 1);
    assert_eq!(outcome.variants_created, 0);

    // No duplicate variant; the existing one carries the offer.
    assert_eq!(count_variants(&pool, product).await, 1);
    let offer = offergrid_db::offers::get_offer(&pool, merchant, variant)
        .await
        .expect("offer query")
        .expect("offer exists");
    assert_eq!(offer.offer_status, "LIVE");
    assert_eq!(offer.cached_price_minor, 10_000);
    assert_eq!(offer.cached_settlement_price_minor, 10_000);
    assert_eq!(offer.merchant_sku.as_deref(), Some("SELLER-SKU"));

    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "APPROVED");
}

#[sqlx::test(migrations = "../../migrations")]
async fn approve_match_applies_margin_rule_to_settlement(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Prestige Pressure Cooker 5L", "prestige-cooker").await;
    seed_variant(&pool, product, "PRE-SC-5L", Some("0001"), json!({})).await;

    sqlx::query(
        "INSERT INTO margin_rules (merchant_id, margin_percentage, valid_from, is_active) \
         VALUES ($1, 5.00, NOW() - INTERVAL '1 day', true)",
    )
    .bind(merchant)
    .execute(&pool)
    .await
    .expect("seed margin rule");

    let feed = vec![raw_feed_product(
        100,
        "Prestige Cooker Listing",
        &[(1001, None, Some("0001"), "100.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveMatch,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .expect("approve match");

    let settlement: i64 = sqlx::query_scalar(
        "SELECT cached_settlement_price_minor FROM merchant_offers WHERE merchant_id = $1",
    )
    .bind(merchant)
    .fetch_one(&pool)
    .await
    .expect("offer settlement");
    assert_eq!(settlement, 9_500);
}

#[sqlx::test(migrations = "../../migrations")]
async fn two_merchants_with_identical_attributes_share_one_variant(pool: PgPool) {
    let merchant_a = seed_merchant(&pool, "Seller A").await;
    let merchant_b = seed_merchant(&pool, "Seller B").await;
    let product = seed_product(&pool, "Samsung Galaxy Buds Pro", "samsung-galaxy-buds-pro").await;

    // Merchant A: no barcode, title similar to the master, options {"Size": "S"}.
    let feed_a = vec![raw_feed_product(
        100,
        "Samsung Galaxy Buds Pro 2",
        &[(1001, None, None, "49.99", &[("Size", "S")])],
    )];
    ingest_products(&pool, merchant_a, &feed_a).await.expect("ingest A");
    auto_match_pending(&pool, Some(merchant_a)).await.expect("automatch A");
    let (staging_a, _, suggestion_a, _) = staging_row(&pool, merchant_a, "100").await;
    assert_eq!(suggestion_a, Some(product));

    // Merchant B: identical configuration up to key/value casing.
    let feed_b = vec![raw_feed_product(
        200,
        "Samsung Galaxy Buds  Pro 2",
        &[(2001, None, None, "48.99", &[("size", "s")])],
    )];
    ingest_products(&pool, merchant_b, &feed_b).await.expect("ingest B");
    auto_match_pending(&pool, Some(merchant_b)).await.expect("automatch B");
    let (staging_b, _, suggestion_b, _) = staging_row(&pool, merchant_b, "200").await;
    assert_eq!(suggestion_b, Some(product));

    let approve = Decision {
        action: DecisionAction::ApproveMatch,
        target_product_id: None,
        variant_mappings: Default::default(),
        brand_id: None,
        category_id: None,
        rejection_reason: None,
        admin_notes: None,
    };

    let outcome_a = decide(&pool, staging_a, &approve).await.expect("approve A");
    assert_eq!(outcome_a.variants_created, 1);

    // The second merge must find the first-created variant by attribute
    // equality instead of creating a duplicate.
    let outcome_b = decide(&pool, staging_b, &approve).await.expect("approve B");
    assert_eq!(outcome_b.variants_created, 0);
    assert_eq!(outcome_b.variants_matched, 1);

    assert_eq!(count_variants(&pool, product).await, 1);
    assert_eq!(count_offers(&pool, merchant_a).await, 1);
    assert_eq!(count_offers(&pool, merchant_b).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn explicit_create_new_mapping_overrides_identifier_match(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Prestige Pressure Cooker 5L", "prestige-cooker").await;
    seed_variant(&pool, product, "PRE-SC-5L", Some("0001"), json!({})).await;

    // Barcode 0001 would normally match; the admin explicitly says create-new.
    // The new variant carries no GTIN conflict because its barcode is absent.
    let feed = vec![raw_feed_product(
        100,
        "Prestige Cooker Listing",
        &[(1001, Some("NEW-SKU"), None, "90.00", &[("Size", "7L")])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let mut mappings = std::collections::HashMap::new();
    mappings.insert("1001".to_string(), None);

    let outcome = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveMatch,
            target_product_id: Some(product),
            variant_mappings: mappings,
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .expect("approve match");

    assert_eq!(outcome.variants_created, 1);
    assert_eq!(count_variants(&pool, product).await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn approve_match_without_target_or_suggestion_is_a_validation_error(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(
        100,
        "Entirely Novel Product",
        &[(1001, None, None, "5.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let err = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveMatch,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Approve as new
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn approve_new_creates_product_variants_and_live_offers(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    offergrid_db::categories::create_category(&pool, None, "Kitchen", "kitchen")
        .await
        .expect("seed category");

    let feed = vec![raw_feed_product(
        100,
        "Entirely Novel Cooker",
        &[
            (1001, Some("NOV-1"), None, "100.00", &[("Size", "5L")]),
            (1002, Some("NOV-2"), None, "120.00", &[("Size", "7L")]),
        ],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let outcome = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveNew,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: Some("looks good".to_string()),
        },
    )
    .await
    .expect("approve new");

    let product_id = outcome.product_id.expect("new product id");
    assert_eq!(outcome.variants_created, 2);
    assert_eq!(outcome.offers_written, 2);
    assert_eq!(count_variants(&pool, product_id).await, 2);

    let live_offers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM merchant_offers WHERE merchant_id = $1 AND offer_status = 'LIVE'",
    )
    .bind(merchant)
    .fetch_one(&pool)
    .await
    .expect("live offers");
    assert_eq!(live_offers, 2);

    // Default category link: the sole top-level category.
    let linked: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM product_categories WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&pool)
            .await
            .expect("category links");
    assert_eq!(linked, 1);

    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "APPROVED");
}

#[sqlx::test(migrations = "../../migrations")]
async fn approve_new_links_resolved_vendor_brand(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let brand = offergrid_db::brands::create_brand(&pool, "Test Vendor", "test-vendor")
        .await
        .expect("seed brand");

    // raw_feed_product sets the vendor string to "Test Vendor".
    let feed = vec![raw_feed_product(
        100,
        "Branded Novelty",
        &[(1001, Some("BRD-1"), None, "10.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let outcome = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveNew,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .expect("approve new");

    let product = offergrid_db::catalog::get_product(&pool, outcome.product_id.expect("product"))
        .await
        .expect("product query")
        .expect("product exists");
    assert_eq!(product.brand_id, Some(brand));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_merge_commits_nothing_and_stays_reviewable(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let other = seed_product(&pool, "Occupied", "occupied").await;
    seed_variant(&pool, other, "DUP-SKU", None, json!({})).await;

    // Second of three variants collides with an existing internal SKU; the
    // unique violation aborts the whole merge.
    let feed = vec![raw_feed_product(
        100,
        "Entirely Novel Cooker",
        &[
            (1001, Some("NOV-1"), None, "10.00", &[]),
            (1002, Some("DUP-SKU"), None, "11.00", &[]),
            (1003, Some("NOV-3"), None, "12.00", &[]),
        ],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let err = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveNew,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // Zero new catalog rows or offers committed; status unchanged.
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await
        .expect("count products");
    assert_eq!(products, 1);

    let variants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variants")
        .fetch_one(&pool)
        .await
        .expect("count variants");
    assert_eq!(variants, 1);

    assert_eq!(count_offers(&pool, merchant).await, 0);

    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "NEEDS_REVIEW");
}

// ---------------------------------------------------------------------------
// Reject
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn reject_without_reason_is_a_validation_error(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(100, "Widget", &[(1001, None, None, "1.00", &[])])];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let err = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::Reject,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: Some("   ".to_string()),
            admin_notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "NEEDS_REVIEW");
}

#[sqlx::test(migrations = "../../migrations")]
async fn reject_records_reason_and_downgrades_prior_offers(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(
        100,
        "Entirely Novel Cooker",
        &[(1001, Some("NOV-1"), None, "10.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveNew,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .expect("approve new");

    // Requeue for review (operator path), then reject.
    sqlx::query("UPDATE staging_products SET status = 'NEEDS_REVIEW' WHERE id = $1")
        .bind(staging_id)
        .execute(&pool)
        .await
        .expect("requeue");

    let outcome = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::Reject,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: Some("wrong pricing".to_string()),
            admin_notes: None,
        },
    )
    .await
    .expect("reject");
    assert_eq!(outcome.offers_rejected, 1);

    let (_, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "REJECTED");

    let reason: Option<String> =
        sqlx::query_scalar("SELECT rejection_reason FROM staging_products WHERE id = $1")
            .bind(staging_id)
            .fetch_one(&pool)
            .await
            .expect("reason");
    assert_eq!(reason.as_deref(), Some("wrong pricing"));

    let offer_status: String = sqlx::query_scalar(
        "SELECT offer_status FROM merchant_offers WHERE merchant_id = $1",
    )
    .bind(merchant)
    .fetch_one(&pool)
    .await
    .expect("offer status");
    assert_eq!(offer_status, "REJECTED");
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn deciding_on_a_pending_sync_row_is_an_invalid_transition(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(100, "Widget", &[(1001, None, None, "1.00", &[])])];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    let (staging_id, status, _, _) = staging_row(&pool, merchant, "100").await;
    assert_eq!(status, "PENDING_SYNC");

    let err = decide(
        &pool,
        staging_id,
        &Decision {
            action: DecisionAction::ApproveNew,
            target_product_id: None,
            variant_mappings: Default::default(),
            brand_id: None,
            category_id: None,
            rejection_reason: None,
            admin_notes: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn deciding_twice_is_an_invalid_transition(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let feed = vec![raw_feed_product(100, "Widget", &[(1001, None, None, "1.00", &[])])];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let approve = Decision {
        action: DecisionAction::ApproveNew,
        target_product_id: None,
        variant_mappings: Default::default(),
        brand_id: None,
        category_id: None,
        rejection_reason: None,
        admin_notes: None,
    };
    decide(&pool, staging_id, &approve).await.expect("first approval");

    let err = decide(&pool, staging_id, &approve).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

// ---------------------------------------------------------------------------
// Variant-match report
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn variant_match_report_summarizes_hits_and_misses(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let product = seed_product(&pool, "Prestige Pressure Cooker 5L", "prestige-cooker").await;
    seed_variant(&pool, product, "PRE-SC-5L", Some("0001"), json!({})).await;

    let feed = vec![raw_feed_product(
        100,
        "Prestige Cooker Listing",
        &[
            (1001, None, Some("0001"), "100.00", &[]),
            (1002, None, None, "110.00", &[("Size", "9L")]),
        ],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let report = variant_matches(&pool, staging_id, None)
        .await
        .expect("variant match report");

    assert_eq!(report.target_product_id, Some(product));
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.summary.unmatched, 1);
    assert_eq!(report.summary.warnings, 0);

    let barcode_entry = report
        .entries
        .iter()
        .find(|e| e.external_variant_id == "1001")
        .expect("barcode entry");
    assert_eq!(
        barcode_entry.result.strategy,
        offergrid_engine::MatchStrategy::GtinExact
    );

    let report_err = variant_matches(&pool, staging_id, Some(999_999)).await.unwrap_err();
    assert!(matches!(report_err, EngineError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn variant_match_report_warns_on_cross_product_gtin(pool: PgPool) {
    let merchant = seed_merchant(&pool, "Seller A").await;
    let target = seed_product(&pool, "Target Product", "target-product").await;
    let other = seed_product(&pool, "Other Product", "other-product").await;
    seed_variant(&pool, other, "OTH-1", Some("0001"), json!({})).await;

    let feed = vec![raw_feed_product(
        100,
        "Listing",
        &[(1001, None, Some("0001"), "10.00", &[])],
    )];
    ingest_products(&pool, merchant, &feed).await.expect("ingest");
    auto_match_pending(&pool, Some(merchant)).await.expect("automatch");
    let (staging_id, _, _, _) = staging_row(&pool, merchant, "100").await;

    let report = variant_matches(&pool, staging_id, Some(target))
        .await
        .expect("variant match report");

    assert_eq!(report.summary.warnings, 1);
    let entry = &report.entries[0];
    assert_eq!(
        entry.result.strategy,
        offergrid_engine::MatchStrategy::GtinGlobal
    );
    assert!(entry
        .result
        .warning
        .as_deref()
        .is_some_and(|w| w.contains(&format!("target product {target}"))));
}
