use offergrid_core::StagingStatus;
use offergrid_db::DbError;
use offergrid_feed::FeedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid transition: cannot {action} a staging product in status {status}")]
    InvalidTransition {
        status: StagingStatus,
        action: &'static str,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream feed error: {0}")]
    Upstream(#[from] FeedError),

    #[error("persistence error: {0}")]
    Persistence(DbError),
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DbError> for EngineError {
    /// Unique-constraint violations (duplicate slug, SKU, GTIN, offer pair)
    /// surface as [`EngineError::Conflict`]; everything else is a
    /// persistence failure.
    fn from(err: DbError) -> Self {
        if err.is_unique_violation() {
            EngineError::Conflict(err.to_string())
        } else {
            EngineError::Persistence(err)
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}
