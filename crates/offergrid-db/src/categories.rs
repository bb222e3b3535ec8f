//! Database operations for `categories` and the `product_categories` join.

use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

/// Returns a category by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category(pool: &PgPool, id: i64) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, parent_id, name, slug, is_active FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the default category for new products: the lowest-id active
/// top-level category. This is a placeholder linking policy, not a matching
/// algorithm — the admin can recategorize during review.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn default_top_level_category(conn: &mut PgConnection) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM categories \
         WHERE parent_id IS NULL AND is_active = true \
         ORDER BY id \
         LIMIT 1",
    )
    .fetch_optional(conn)
    .await?;

    Ok(id)
}

/// Links a product to a category, ignoring an already-existing link.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn link_product_category(
    conn: &mut PgConnection,
    product_id: i64,
    category_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO product_categories (product_id, category_id) \
         VALUES ($1, $2) \
         ON CONFLICT (product_id, category_id) DO NOTHING",
    )
    .bind(product_id)
    .bind(category_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Returns the first category linked to a product, if any. Used to resolve
/// the category scope for margin lookups.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn first_category_for_product(
    conn: &mut PgConnection,
    product_id: i64,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT category_id FROM product_categories \
         WHERE product_id = $1 \
         ORDER BY category_id \
         LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?;

    Ok(id)
}

/// Creates a category row and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_category(
    pool: &PgPool,
    parent_id: Option<i64>,
    name: &str,
    slug: &str,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO categories (parent_id, name, slug, is_active) \
         VALUES ($1, $2, $3, true) \
         RETURNING id",
    )
    .bind(parent_id)
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
