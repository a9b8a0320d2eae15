use thiserror::Error;

use catalog_core::{DomainError, FieldErrors};

use crate::store::StoreError;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Error surfaced to callers of the catalog service.
///
/// Callers branch on the variant; messages are for logs and humans only.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The record (or record + parent pair) does not exist.
    #[error("record not found")]
    NotFound,

    /// Every field violation found, keyed by field name.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The caller's expected version is stale; nothing was written.
    #[error("edit conflict: {0}")]
    Conflict(String),

    /// Opaque storage failure (connectivity, timeout, unexpected constraint).
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for CatalogError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(errors) => CatalogError::Validation(errors),
            DomainError::NotFound => CatalogError::NotFound,
            DomainError::Conflict(msg) => CatalogError::Conflict(msg),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => CatalogError::NotFound,
            StoreError::Conflict(msg) => CatalogError::Conflict(msg),
            other => CatalogError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outcomes_callers_act_on_get_their_own_variants() {
        assert!(matches!(
            CatalogError::from(StoreError::NotFound),
            CatalogError::NotFound
        ));
        assert!(matches!(
            CatalogError::from(StoreError::Conflict("stale".into())),
            CatalogError::Conflict(msg) if msg == "stale"
        ));
        assert!(matches!(
            CatalogError::from(StoreError::Timeout { operation: "get_product" }),
            CatalogError::Store(StoreError::Timeout { operation: "get_product" })
        ));
    }

    #[test]
    fn domain_validation_keeps_every_field() {
        let mut errors = FieldErrors::new();
        errors.add("name", "must be provided");
        errors.add("category", "must be provided");

        match CatalogError::from(DomainError::Validation(errors)) {
            CatalogError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation, got {other:?}"),
        }
    }
}
