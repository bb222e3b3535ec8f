//! Lookup structures over the master catalog keyed by global trade
//! identifier (GTIN) and by (brand, manufacturer part number).
//!
//! Pure read path: the index is built from a catalog snapshot and never
//! mutates it. GTIN is unique across *all* active variants system-wide, so a
//! GTIN hit may point at a different product than the one a merge is
//! targeting — the matcher surfaces that as a data-quality warning instead of
//! silently overriding the target.

use std::collections::HashMap;

use offergrid_db::CatalogVariantRow;

pub struct IdentifierIndex<'a> {
    by_gtin: HashMap<&'a str, &'a CatalogVariantRow>,
    by_brand_mpn: HashMap<(i64, &'a str), &'a CatalogVariantRow>,
}

impl<'a> IdentifierIndex<'a> {
    /// Builds the index from the active-variant snapshot.
    ///
    /// GTINs are unique among active variants (enforced by a partial unique
    /// index), so first-wins insertion is exact. MPNs are brand-scoped; the
    /// first variant per (brand, MPN) pair wins, matching the lowest-id
    /// deterministic pick the rest of the matcher uses.
    #[must_use]
    pub fn build(variants: &'a [CatalogVariantRow]) -> Self {
        let mut by_gtin = HashMap::new();
        let mut by_brand_mpn = HashMap::new();

        for variant in variants {
            if let Some(gtin) = variant.gtin.as_deref() {
                by_gtin.entry(gtin).or_insert(variant);
            }
            if let (Some(brand_id), Some(mpn)) = (variant.product_brand_id, variant.mpn.as_deref())
            {
                by_brand_mpn.entry((brand_id, mpn)).or_insert(variant);
            }
        }

        Self {
            by_gtin,
            by_brand_mpn,
        }
    }

    /// Returns the unique active master variant with the given GTIN, if any.
    #[must_use]
    pub fn lookup_by_gtin(&self, gtin: &str) -> Option<&'a CatalogVariantRow> {
        self.by_gtin.get(gtin).copied()
    }

    /// Returns the active master variant with the given MPN under the given
    /// brand, if any.
    #[must_use]
    pub fn lookup_by_mpn_and_brand(&self, mpn: &str, brand_id: i64) -> Option<&'a CatalogVariantRow> {
        self.by_brand_mpn.get(&(brand_id, mpn)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_variant(
        id: i64,
        product_id: i64,
        brand_id: Option<i64>,
        gtin: Option<&str>,
        mpn: Option<&str>,
    ) -> CatalogVariantRow {
        CatalogVariantRow {
            id,
            product_id,
            product_title: format!("Product {product_id}"),
            product_brand_id: brand_id,
            internal_sku: format!("SKU-{id}"),
            gtin: gtin.map(ToString::to_string),
            mpn: mpn.map(ToString::to_string),
            attributes: serde_json::json!({}),
        }
    }

    #[test]
    fn gtin_lookup_finds_the_owning_variant() {
        let variants = vec![
            make_variant(1, 10, None, Some("0001"), None),
            make_variant(2, 11, None, Some("0002"), None),
        ];
        let index = IdentifierIndex::build(&variants);

        let hit = index.lookup_by_gtin("0002").expect("expected a GTIN hit");
        assert_eq!(hit.id, 2);
        assert_eq!(hit.product_id, 11);
    }

    #[test]
    fn gtin_lookup_misses_unknown_codes() {
        let variants = vec![make_variant(1, 10, None, Some("0001"), None)];
        let index = IdentifierIndex::build(&variants);

        assert!(index.lookup_by_gtin("9999").is_none());
    }

    #[test]
    fn variants_without_gtin_are_not_indexed() {
        let variants = vec![make_variant(1, 10, None, None, None)];
        let index = IdentifierIndex::build(&variants);

        assert!(index.lookup_by_gtin("").is_none());
    }

    #[test]
    fn mpn_lookup_is_brand_scoped() {
        let variants = vec![
            make_variant(1, 10, Some(5), None, Some("MPN-1")),
            make_variant(2, 11, Some(6), None, Some("MPN-1")),
        ];
        let index = IdentifierIndex::build(&variants);

        let brand_5 = index
            .lookup_by_mpn_and_brand("MPN-1", 5)
            .expect("expected an MPN hit for brand 5");
        assert_eq!(brand_5.id, 1);

        let brand_6 = index
            .lookup_by_mpn_and_brand("MPN-1", 6)
            .expect("expected an MPN hit for brand 6");
        assert_eq!(brand_6.id, 2);

        assert!(index.lookup_by_mpn_and_brand("MPN-1", 7).is_none());
    }

    #[test]
    fn mpn_without_brand_is_not_indexed() {
        let variants = vec![make_variant(1, 10, None, None, Some("MPN-1"))];
        let index = IdentifierIndex::build(&variants);

        assert!(index.lookup_by_mpn_and_brand("MPN-1", 5).is_none());
    }

    #[test]
    fn duplicate_brand_mpn_pairs_resolve_to_lowest_id() {
        let variants = vec![
            make_variant(3, 10, Some(5), None, Some("MPN-1")),
            make_variant(7, 11, Some(5), None, Some("MPN-1")),
        ];
        let index = IdentifierIndex::build(&variants);

        let hit = index
            .lookup_by_mpn_and_brand("MPN-1", 5)
            .expect("expected an MPN hit");
        assert_eq!(hit.id, 3);
    }
}
